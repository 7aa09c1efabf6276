//! Runs a whole assessment against a scripted microphone.
//!
//! ```text
//! cargo run -p visus-session --example scripted_session -- [config.toml] [catalog.json]
//! ```
//!
//! Without a `[match_service]` section the participant is simulated: each
//! answer is right about four times out of five. With one, recordings are
//! posted to the configured endpoint.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use visus_capture::{AudioSample, ScriptedDevice};
use visus_core::{EyePhase, StimulusCatalog};
use visus_session::{SessionConfig, SessionHandle, SessionStage};
use visus_validate::{
    HttpMatchService, Transcriber, TranscribingValidator, TrialValidator, ValidationError,
};

const DEFAULT_PICTURES: [&str; 6] = ["apple", "house", "fish", "chair", "flower", "car"];

/// Answers with the expected word most of the time, otherwise mumbles.
struct SimulatedParticipant {
    answers: std::sync::Mutex<Vec<String>>,
}

#[async_trait]
impl Transcriber for SimulatedParticipant {
    async fn transcribe(&self, _sample: &AudioSample) -> Result<String, ValidationError> {
        let mut answers = self
            .answers
            .lock()
            .map_err(|_| ValidationError::service("participant script poisoned"))?;
        Ok(answers.pop().unwrap_or_default())
    }
}

fn noise_sample(rng: &mut impl Rng) -> AudioSample {
    let data = (0..4096).map(|_| rng.random::<u8>()).collect();
    AudioSample::new("audio/wav", data)
}

fn simulated_answers(catalog: &StimulusCatalog, rng: &mut impl Rng) -> Vec<String> {
    let mut answers: Vec<String> = EyePhase::ALL
        .iter()
        .flat_map(|_| catalog.iter())
        .map(|item| {
            if rng.random_bool(0.8) {
                format!("that is a {}", item.canonical_name)
            } else {
                "i am not sure".to_string()
            }
        })
        .collect();
    answers.reverse();
    answers
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("visus_session=debug,visus_capture=info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => SessionConfig::load(&path)?,
        None => {
            let mut config = SessionConfig {
                capture_duration_ms: 1200,
                ..SessionConfig::default()
            };
            config.apply_overrides(|key| std::env::var(key).ok())?;
            config.validate()?;
            config
        }
    };
    let catalog = match args.next() {
        Some(path) => StimulusCatalog::load(&path)
            .with_context(|| format!("failed to load catalog {path}"))?,
        None => StimulusCatalog::from_names(DEFAULT_PICTURES)?,
    };
    let catalog = Arc::new(catalog);

    let mut rng = rand::rng();
    let validator: Arc<dyn TrialValidator> = match &config.match_service {
        Some(service) => {
            info!(endpoint = %service.endpoint, "using remote match service");
            Arc::new(HttpMatchService::new(service)?)
        }
        None => Arc::new(TranscribingValidator::new(SimulatedParticipant {
            answers: std::sync::Mutex::new(simulated_answers(&catalog, &mut rng)),
        })),
    };
    let device = Arc::new(ScriptedDevice::always(noise_sample(&mut rng)));

    let handle = SessionHandle::spawn(Arc::clone(&catalog), config, device, validator);
    let mut notices = handle.notices();
    tokio::spawn(async move {
        loop {
            match notices.recv().await {
                Ok(notice) => info!(kind = ?notice.kind, "{}", notice.message),
                Err(RecvError::Lagged(missed)) => warn!(missed, "notice display fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    handle.start().await?;
    for phase in EyePhase::ALL {
        handle
            .wait_for_stage(SessionStage::PhaseInstruction(phase))
            .await?;
        info!(%phase, "{}", phase.instruction());
        handle.begin_phase().await?;
    }

    let report = handle.wait_for_report().await?;
    println!("{report}");
    match report.to_json() {
        Ok(json) => info!(bytes = json.len(), "report serialized"),
        Err(err) => warn!(error = %err, "report could not be serialized"),
    }
    handle.shutdown().await;
    Ok(())
}
