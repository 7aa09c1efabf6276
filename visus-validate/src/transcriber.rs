use crate::{MatchOutcome, TrialValidator, ValidationError, contains_word, encode_sample};
use async_trait::async_trait;
use tracing::debug;
use visus_capture::AudioSample;

/// Speech-to-text backend without any matching logic of its own.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, sample: &AudioSample) -> Result<String, ValidationError>;
}

/// Applies the whole-word matching rule on top of any [`Transcriber`].
pub struct TranscribingValidator<T> {
    transcriber: T,
}

impl<T: Transcriber> TranscribingValidator<T> {
    pub fn new(transcriber: T) -> Self {
        Self { transcriber }
    }
}

#[async_trait]
impl<T: Transcriber> TrialValidator for TranscribingValidator<T> {
    async fn validate(
        &self,
        sample: &AudioSample,
        target_word: &str,
    ) -> Result<MatchOutcome, ValidationError> {
        encode_sample(sample)?;
        let transcribed_text = self.transcriber.transcribe(sample).await?.trim().to_lowercase();
        let matches = contains_word(&transcribed_text, target_word);
        debug!(target_word, %transcribed_text, matches, "transcription scored");
        Ok(MatchOutcome {
            matches,
            transcribed_text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    #[async_trait]
    impl Transcriber for Fixed {
        async fn transcribe(&self, _sample: &AudioSample) -> Result<String, ValidationError> {
            Ok(self.0.to_string())
        }
    }

    struct Offline;

    #[async_trait]
    impl Transcriber for Offline {
        async fn transcribe(&self, _sample: &AudioSample) -> Result<String, ValidationError> {
            Err(ValidationError::service("network unreachable"))
        }
    }

    fn sample() -> AudioSample {
        AudioSample::new("audio/wav", vec![0; 16])
    }

    #[tokio::test]
    async fn lowercases_and_matches_transcription() {
        let validator = TranscribingValidator::new(Fixed("I see a Cat."));
        let outcome = validator.validate(&sample(), "cat").await.unwrap();
        assert!(outcome.matches);
        assert_eq!(outcome.transcribed_text, "i see a cat.");

        let outcome = TranscribingValidator::new(Fixed("Kitty"))
            .validate(&sample(), "cat")
            .await
            .unwrap();
        assert!(!outcome.matches);
        assert_eq!(outcome.transcribed_text, "kitty");
    }

    #[tokio::test]
    async fn failures_are_propagated() {
        let err = TranscribingValidator::new(Offline)
            .validate(&sample(), "cat")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("network unreachable"));

        let err = TranscribingValidator::new(Fixed("cat"))
            .validate(&AudioSample::empty("audio/wav"), "cat")
            .await
            .unwrap_err();
        assert!(err.is_encoding());
    }
}
