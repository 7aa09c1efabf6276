use crate::error::SessionError;
use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use visus_report::ScoringConfig;
use visus_validate::MatchServiceConfig;

/// Pacing and scoring parameters for a session. All times in milliseconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Recording window per picture.
    pub capture_duration_ms: u64,
    pub progress_tick_ms: u64,
    /// Pause between the instruction screen and the first capture.
    pub phase_settle_ms: u64,
    /// Pause before the capture of each following picture.
    pub trial_settle_ms: u64,
    /// Pause before a capture is retried.
    pub retry_settle_ms: u64,
    pub success_feedback_ms: u64,
    pub failure_feedback_ms: u64,
    pub skip_notice_ms: u64,
    /// Pause between the last trial and report generation.
    pub finalize_settle_ms: u64,
    /// Automatic retries when a recording comes back empty.
    pub empty_capture_retries: u32,
    pub scoring: ScoringConfig,
    pub match_service: Option<MatchServiceConfig>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capture_duration_ms: 3000,
            progress_tick_ms: 100,
            phase_settle_ms: 200,
            trial_settle_ms: 100,
            retry_settle_ms: 50,
            success_feedback_ms: 1500,
            failure_feedback_ms: 3000,
            skip_notice_ms: 1000,
            finalize_settle_ms: 300,
            empty_capture_retries: 1,
            scoring: ScoringConfig::default(),
            match_service: None,
        }
    }
}

impl SessionConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Reads a TOML file, then applies `VISUS_*` environment overrides.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config = Self::from_toml_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.capture_duration_ms == 0 {
            return Err(SessionError::Config("capture_duration_ms must be positive".into()));
        }
        if self.progress_tick_ms == 0 {
            return Err(SessionError::Config("progress_tick_ms must be positive".into()));
        }
        if self.scoring.max_acceptable_ms <= self.scoring.ideal_response_ms {
            return Err(SessionError::Config(format!(
                "scoring.max_acceptable_ms ({}) must exceed ideal_response_ms ({})",
                self.scoring.max_acceptable_ms, self.scoring.ideal_response_ms
            )));
        }
        Ok(())
    }

    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<()> {
        if let Some(v) = lookup("VISUS_CAPTURE_MS") {
            self.capture_duration_ms = v
                .trim()
                .parse()
                .with_context(|| format!("VISUS_CAPTURE_MS is not a number: {v}"))?;
        }
        if let Some(v) = lookup("VISUS_MATCH_ENDPOINT") {
            match self.match_service.as_mut() {
                Some(service) => service.endpoint = v,
                None => self.match_service = Some(MatchServiceConfig::new(v)),
            }
        }
        Ok(())
    }

    pub fn capture_duration(&self) -> Duration {
        Duration::from_millis(self.capture_duration_ms)
    }

    pub fn progress_tick(&self) -> Duration {
        Duration::from_millis(self.progress_tick_ms)
    }

    pub fn feedback_delay(&self, correct: bool) -> Duration {
        Duration::from_millis(if correct {
            self.success_feedback_ms
        } else {
            self.failure_feedback_ms
        })
    }
}
