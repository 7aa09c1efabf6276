//! Scores one recording against the word the participant was expected to say.

pub mod encode;
pub mod error;
pub mod http;
pub mod matcher;
pub mod transcriber;

pub use encode::encode_sample;
pub use error::ValidationError;
pub use http::{HttpMatchService, MatchServiceConfig};
pub use matcher::{contains_word, normalize_transcription};
pub use transcriber::{Transcriber, TranscribingValidator};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use visus_capture::AudioSample;

/// Normalized answer from the matching service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOutcome {
    pub matches: bool,
    /// Lowercase transcription of what was heard.
    pub transcribed_text: String,
}

#[async_trait]
pub trait TrialValidator: Send + Sync {
    async fn validate(
        &self,
        sample: &AudioSample,
        target_word: &str,
    ) -> Result<MatchOutcome, ValidationError>;
}
