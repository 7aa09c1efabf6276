use crate::EyePhase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const PHASE_SKIPPED_TEXT: &str = "Phase Skipped";
pub const PHASE_NOT_COMPLETED_TEXT: &str = "Phase not completed";

/// Recorded outcome for one (phase, stimulus) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialRecord {
    pub stimulus_index: usize,
    pub stimulus_name: String,
    pub phase: EyePhase,
    pub start_time: DateTime<Utc>,
    pub response_time_ms: Option<u64>,
    pub is_correct: bool,
    pub transcribed_text: String,
    pub was_skipped: bool,
}

impl TrialRecord {
    /// Result of a finished capture and validation cycle.
    pub fn answered(
        phase: EyePhase,
        stimulus_index: usize,
        stimulus_name: impl Into<String>,
        start_time: DateTime<Utc>,
        response_time_ms: u64,
        is_correct: bool,
        transcribed_text: impl Into<String>,
    ) -> Self {
        Self {
            stimulus_index,
            stimulus_name: stimulus_name.into(),
            phase,
            start_time,
            response_time_ms: Some(response_time_ms),
            is_correct,
            transcribed_text: transcribed_text.into(),
            was_skipped: false,
        }
    }

    /// Placeholder for a stimulus that was never answered.
    pub fn skipped(
        phase: EyePhase,
        stimulus_index: usize,
        stimulus_name: impl Into<String>,
        start_time: DateTime<Utc>,
        note: &str,
    ) -> Self {
        Self {
            stimulus_index,
            stimulus_name: stimulus_name.into(),
            phase,
            start_time,
            response_time_ms: Some(0),
            is_correct: false,
            transcribed_text: note.to_string(),
            was_skipped: true,
        }
    }

    /// Time at which the participant finished responding.
    pub fn end_time(&self) -> DateTime<Utc> {
        let ms = self.response_time_ms.unwrap_or(0);
        self.start_time + chrono::Duration::milliseconds(ms as i64)
    }
}
