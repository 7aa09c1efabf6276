//! In-memory capture device that plays back a prepared script of recordings.

use crate::device::{AudioSample, CaptureDevice, CaptureError, CaptureStream};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedTake {
    Sample(AudioSample),
    /// Opens fine but buffers nothing.
    Empty,
    /// Refuses to open with the given reason.
    Deny(String),
}

#[derive(Debug, Default)]
struct DeviceStats {
    opened: AtomicUsize,
    released: AtomicUsize,
}

/// Each `open` consumes the next scripted take, then falls back to `fallback`.
#[derive(Debug)]
pub struct ScriptedDevice {
    script: Mutex<VecDeque<ScriptedTake>>,
    fallback: ScriptedTake,
    stats: Arc<DeviceStats>,
}

impl ScriptedDevice {
    pub fn always(sample: AudioSample) -> Self {
        Self::with_script([], ScriptedTake::Sample(sample))
    }

    pub fn with_script(
        takes: impl IntoIterator<Item = ScriptedTake>,
        fallback: ScriptedTake,
    ) -> Self {
        Self {
            script: Mutex::new(takes.into_iter().collect()),
            fallback,
            stats: Arc::new(DeviceStats::default()),
        }
    }

    /// Successful opens so far.
    pub fn opened(&self) -> usize {
        self.stats.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.stats.released.load(Ordering::SeqCst)
    }

    pub fn is_open(&self) -> bool {
        self.opened() > self.released()
    }

    fn next_take(&self) -> ScriptedTake {
        let mut script = match self.script.lock() {
            Ok(script) => script,
            Err(poisoned) => poisoned.into_inner(),
        };
        script.pop_front().unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl CaptureDevice for ScriptedDevice {
    async fn open(&self) -> Result<Box<dyn CaptureStream>, CaptureError> {
        let sample = match self.next_take() {
            ScriptedTake::Sample(sample) => sample,
            ScriptedTake::Empty => AudioSample::empty("audio/wav"),
            ScriptedTake::Deny(reason) => return Err(CaptureError::Device(reason)),
        };
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedStream {
            sample: Some(sample),
            stats: Arc::clone(&self.stats),
        }))
    }
}

struct ScriptedStream {
    sample: Option<AudioSample>,
    stats: Arc<DeviceStats>,
}

#[async_trait]
impl CaptureStream for ScriptedStream {
    async fn finish(self: Box<Self>) -> AudioSample {
        let mut stream = self;
        stream
            .sample
            .take()
            .unwrap_or_else(|| AudioSample::empty("audio/wav"))
    }
}

impl Drop for ScriptedStream {
    fn drop(&mut self) {
        self.stats.released.fetch_add(1, Ordering::SeqCst);
    }
}
