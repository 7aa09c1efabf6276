use crate::{MatchOutcome, TrialValidator, ValidationError, encode_sample};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use visus_capture::AudioSample;

fn default_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MatchServiceConfig {
    pub endpoint: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl MatchServiceConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MatchRequest<'a> {
    audio_sample: String,
    target_word: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MatchResponse {
    matches: bool,
    transcribed_text: String,
}

/// Client for the remote transcription/matching service.
#[derive(Debug, Clone)]
pub struct HttpMatchService {
    client: Client,
    endpoint: Url,
}

impl HttpMatchService {
    pub fn new(config: &MatchServiceConfig) -> Result<Self, ValidationError> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            ValidationError::service_with_source(
                format!("invalid endpoint '{}'", config.endpoint),
                e,
            )
        })?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ValidationError::service_with_source("failed to build HTTP client", e))?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl TrialValidator for HttpMatchService {
    async fn validate(
        &self,
        sample: &AudioSample,
        target_word: &str,
    ) -> Result<MatchOutcome, ValidationError> {
        let audio_sample = encode_sample(sample)?;
        let target_word = target_word.trim().to_lowercase();
        let request = MatchRequest {
            audio_sample,
            target_word: &target_word,
        };

        debug!(endpoint = %self.endpoint, %target_word, bytes = sample.len(), "submitting recording");
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_timeout() {
                    "the speech service timed out".to_string()
                } else if e.is_connect() {
                    "could not reach the speech service".to_string()
                } else {
                    "the speech service request failed".to_string()
                };
                ValidationError::service_with_source(message, e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ValidationError::service_with_source("failed to read speech service response", e)
        })?;
        if !status.is_success() {
            warn!(%status, "speech service rejected recording");
            let detail = body.trim();
            return Err(ValidationError::service(if detail.is_empty() {
                format!("status {status}")
            } else {
                format!("status {status}: {detail}")
            }));
        }

        let parsed: MatchResponse = serde_json::from_str(&body)
            .map_err(|e| ValidationError::MalformedResponse(e.to_string()))?;
        Ok(MatchOutcome {
            matches: parsed.matches,
            transcribed_text: parsed.transcribed_text.to_lowercase(),
        })
    }
}
