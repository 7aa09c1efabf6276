//! Microphone capture lifecycle: one recording at a time, with progress ticks,
//! a forced stop once the recording window elapses, and token-based
//! invalidation of anything left over from a previous recording.

pub mod controller;
pub mod device;
pub mod scripted;

pub use controller::{CaptureController, CaptureEvent, CaptureSession, DEFAULT_TICK};
pub use device::{AudioSample, CaptureDevice, CaptureError, CaptureStream};
pub use scripted::{ScriptedDevice, ScriptedTake};
