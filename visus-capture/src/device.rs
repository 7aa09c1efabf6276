use async_trait::async_trait;
use thiserror::Error;

/// Encoded audio handed back by a finished recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSample {
    /// e.g. `audio/webm` or `audio/wav`
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl AudioSample {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn empty(mime_type: impl Into<String>) -> Self {
        Self::new(mime_type, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// The microphone could not be acquired (missing, busy, permission denied).
    #[error("microphone unavailable: {0}")]
    Device(String),
    /// The recording window elapsed without any buffered audio.
    #[error("no audio was captured")]
    EmptyCapture,
}

/// A microphone that can be opened for one recording at a time.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    async fn open(&self) -> Result<Box<dyn CaptureStream>, CaptureError>;
}

/// An open recording. Dropping it must release the device.
#[async_trait]
pub trait CaptureStream: Send {
    /// Stops the device and returns whatever was buffered.
    async fn finish(self: Box<Self>) -> AudioSample;
}
