use chrono::{DateTime, Utc};
use visus_core::{EyePhase, StimulusItem};

/// The trial currently on screen, before it becomes a `TrialRecord`.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveTrial {
    pub phase: EyePhase,
    pub index: usize,
    pub stimulus: StimulusItem,
    pub started_at: DateTime<Utc>,
    /// Set once the recording has finished.
    pub response_ms: Option<u64>,
    /// Automatic re-records after an empty capture.
    pub empty_retries: u32,
}

impl ActiveTrial {
    pub fn is_for(&self, phase: EyePhase, index: usize) -> bool {
        self.phase == phase && self.index == index
    }
}
