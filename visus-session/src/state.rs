use crate::config::SessionConfig;
use crate::error::StateError;
use crate::notice::SessionNotice;
use crate::trial::ActiveTrial;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use visus_capture::{AudioSample, CaptureError, CaptureEvent};
use visus_core::{
    EyePhase, PHASE_SKIPPED_TEXT, SessionHistory, StimulusCatalog, StimulusItem, TrialRecord,
};
use visus_report::{Report, compute_report};
use visus_timing::Timer;
use visus_validate::{MatchOutcome, ValidationError};

/// Where the session is in its flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStage {
    #[default]
    NotStarted,
    PhaseInstruction(EyePhase),
    /// Recording, or showing feedback once the trial is recorded.
    Presenting { phase: EyePhase, index: usize },
    Validating { phase: EyePhase, index: usize },
    Complete,
}

impl SessionStage {
    pub fn phase(&self) -> Option<EyePhase> {
        match *self {
            SessionStage::PhaseInstruction(phase)
            | SessionStage::Presenting { phase, .. }
            | SessionStage::Validating { phase, .. } => Some(phase),
            SessionStage::NotStarted | SessionStage::Complete => None,
        }
    }
}

/// Everything the presentation layer needs to draw the current screen.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionState {
    pub stage: SessionStage,
    /// Recording progress, 0-100.
    pub progress: u8,
    pub transcription: Option<String>,
    pub image_blurred: bool,
    pub trial_started_at: Option<DateTime<Utc>>,
    pub skip_in_progress: bool,
    /// Set when the microphone failed; cleared by a retry or skip.
    pub capture_fault: Option<String>,
    pub last_correct: Option<bool>,
}

impl SessionState {
    fn clear_transient(&mut self) {
        self.progress = 0;
        self.transcription = None;
        self.image_blurred = false;
        self.trial_started_at = None;
        self.capture_fault = None;
        self.last_correct = None;
    }
}

/// Immutable view published after every transition.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub stimulus: Option<StimulusItem>,
    pub recorded_trials: usize,
    pub total_trials: usize,
    /// (1-based position, catalog length) within the current phase.
    pub phase_progress: Option<(usize, usize)>,
    pub report: Option<Arc<Report>>,
}

/// Timer-driven follow-ups the machine asks to be woken for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferred {
    StartTrial,
    Advance,
    NextPhase,
    Finalize,
}

#[derive(Debug)]
pub enum SessionInput {
    Start,
    BeginPhase,
    SkipPhase,
    RetryCapture,
    StopCapture,
    Reset,
    Capture {
        epoch: u64,
        event: CaptureEvent,
    },
    Validated {
        epoch: u64,
        result: Result<MatchOutcome, ValidationError>,
    },
    Deferred {
        epoch: u64,
        action: Deferred,
    },
}

/// Side effects requested by a transition, carried out by the runner.
#[derive(Debug)]
pub enum SessionEffect {
    BeginCapture {
        epoch: u64,
        duration: Duration,
    },
    StopCapture,
    CancelCapture,
    Validate {
        epoch: u64,
        sample: AudioSample,
        target: String,
    },
    Schedule {
        epoch: u64,
        delay: Duration,
        action: Deferred,
    },
    Notify(SessionNotice),
    ReportReady(Arc<Report>),
}

/// Phase/stimulus state machine.
///
/// Every timer, capture event and validation result is tagged with the
/// epoch that requested it; anything carrying an older epoch is dropped.
pub struct SessionStateMachine<T: Timer> {
    pub timer: T,
    config: SessionConfig,
    catalog: Arc<StimulusCatalog>,
    state: SessionState,
    history: SessionHistory,
    current: Option<ActiveTrial>,
    epoch: u64,
    report: Option<Arc<Report>>,
}

impl<T: Timer> SessionStateMachine<T> {
    pub fn new(catalog: Arc<StimulusCatalog>, config: SessionConfig, timer: T) -> Self {
        Self {
            timer,
            config,
            catalog,
            state: SessionState::default(),
            history: SessionHistory::new(),
            current: None,
            epoch: 0,
            report: None,
        }
    }

    pub fn handle(&mut self, input: SessionInput) -> Result<Vec<SessionEffect>, StateError> {
        match input {
            SessionInput::Start => self.start(),
            SessionInput::BeginPhase => self.begin_phase(),
            SessionInput::SkipPhase => self.skip_phase(),
            SessionInput::RetryCapture => self.retry_capture(),
            SessionInput::StopCapture => self.stop_capture(),
            SessionInput::Reset => Ok(self.reset()),
            SessionInput::Capture { epoch, event } => {
                if self.is_stale(epoch, "capture event") {
                    return Ok(Vec::new());
                }
                self.on_capture(event)
            }
            SessionInput::Validated { epoch, result } => {
                if self.is_stale(epoch, "validation result") {
                    return Ok(Vec::new());
                }
                self.on_validated(result)
            }
            SessionInput::Deferred { epoch, action } => {
                if self.is_stale(epoch, "timer") {
                    return Ok(Vec::new());
                }
                match action {
                    Deferred::StartTrial => Ok(self.start_trial()),
                    Deferred::Advance => Ok(self.advance()),
                    Deferred::NextPhase => Ok(self.move_to_next_phase()),
                    Deferred::Finalize => Ok(self.finalize()),
                }
            }
        }
    }

    fn is_stale(&self, epoch: u64, what: &str) -> bool {
        if epoch != self.epoch {
            debug!(epoch, current = self.epoch, what, "discarding stale input");
            return true;
        }
        false
    }

    fn invalidate(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    fn not_allowed(&self, action: &'static str) -> StateError {
        StateError::NotAllowed {
            action,
            stage: self.state.stage,
        }
    }

    /// Next stimulus for `phase`, derived from what is already recorded.
    fn next_index(&self, phase: EyePhase) -> Option<usize> {
        let recorded = self.history.count_for(phase);
        if recorded >= self.catalog.len() {
            None
        } else {
            Some(recorded % self.catalog.len())
        }
    }

    /// The trial on screen is already recorded and its feedback is showing.
    fn showing_feedback(&self) -> bool {
        match self.state.stage {
            SessionStage::Presenting { phase, index } => self.history.contains(phase, index),
            _ => false,
        }
    }

    fn schedule(&self, delay: Duration, action: Deferred) -> SessionEffect {
        SessionEffect::Schedule {
            epoch: self.epoch,
            delay,
            action,
        }
    }

    fn start(&mut self) -> Result<Vec<SessionEffect>, StateError> {
        if self.state.stage != SessionStage::NotStarted {
            return Err(self.not_allowed("start"));
        }
        self.state.stage = SessionStage::PhaseInstruction(EyePhase::LeftEye);
        info!(stimuli = self.catalog.len(), "session started");
        Ok(Vec::new())
    }

    fn begin_phase(&mut self) -> Result<Vec<SessionEffect>, StateError> {
        let SessionStage::PhaseInstruction(phase) = self.state.stage else {
            return Err(self.not_allowed("begin phase"));
        };
        let Some(index) = self.next_index(phase) else {
            return Ok(self.move_to_next_phase());
        };
        self.invalidate();
        self.state.clear_transient();
        self.state.stage = SessionStage::Presenting { phase, index };
        info!(%phase, index, "phase begun");
        Ok(vec![self.schedule(
            Duration::from_millis(self.config.phase_settle_ms),
            Deferred::StartTrial,
        )])
    }

    fn start_trial(&mut self) -> Vec<SessionEffect> {
        let SessionStage::Presenting { phase, index } = self.state.stage else {
            debug!(stage = ?self.state.stage, "trial start no longer applies");
            return Vec::new();
        };
        if self.history.contains(phase, index) {
            warn!(%phase, index, "trial already recorded, advancing");
            return self.advance();
        }
        let Some(stimulus) = self.catalog.get(index).cloned() else {
            return Vec::new();
        };

        let empty_retries = self
            .current
            .as_ref()
            .filter(|t| t.is_for(phase, index))
            .map_or(0, |t| t.empty_retries);
        let started_at = self.timer.now();
        let epoch = self.invalidate();

        self.state.clear_transient();
        self.state.trial_started_at = Some(started_at);
        self.current = Some(ActiveTrial {
            phase,
            index,
            stimulus,
            started_at,
            response_ms: None,
            empty_retries,
        });
        debug!(%phase, index, epoch, "trial started");

        vec![SessionEffect::BeginCapture {
            epoch,
            duration: self.config.capture_duration(),
        }]
    }

    fn on_capture(&mut self, event: CaptureEvent) -> Result<Vec<SessionEffect>, StateError> {
        let SessionStage::Presenting { phase, index } = self.state.stage else {
            return Ok(Vec::new());
        };
        if self.showing_feedback() {
            return Ok(Vec::new());
        }
        let Some(trial) = self.current.as_mut().filter(|t| t.is_for(phase, index)) else {
            return Ok(Vec::new());
        };

        match event {
            CaptureEvent::Progress(pct) => {
                self.state.progress = pct.min(100);
                Ok(Vec::new())
            }
            CaptureEvent::Completed(sample) => {
                let response_ms = self.timer.elapsed_ms(trial.started_at);
                trial.response_ms = Some(response_ms);
                let target = trial.stimulus.canonical_name.clone();
                self.state.stage = SessionStage::Validating { phase, index };
                self.state.progress = 100;
                self.state.image_blurred = true;
                debug!(%phase, index, response_ms, bytes = sample.len(), "capture complete");
                Ok(vec![SessionEffect::Validate {
                    epoch: self.epoch,
                    sample,
                    target,
                }])
            }
            CaptureEvent::Failed(CaptureError::Device(reason)) => {
                error!(%phase, index, %reason, "capture device failed");
                self.state.progress = 0;
                self.state.capture_fault = Some(reason.clone());
                Ok(vec![
                    SessionEffect::CancelCapture,
                    SessionEffect::Notify(SessionNotice::error(format!(
                        "Microphone unavailable: {reason}. Retry or skip this phase."
                    ))),
                ])
            }
            CaptureEvent::Failed(CaptureError::EmptyCapture) => {
                if trial.empty_retries < self.config.empty_capture_retries {
                    trial.empty_retries += 1;
                    debug!(%phase, index, attempt = trial.empty_retries, "empty capture, retrying");
                    self.state.progress = 0;
                    return Ok(vec![
                        SessionEffect::Notify(SessionNotice::info(
                            "No speech was recorded. Please try again.",
                        )),
                        self.schedule(
                            Duration::from_millis(self.config.retry_settle_ms),
                            Deferred::StartTrial,
                        ),
                    ]);
                }
                warn!(%phase, index, "capture stayed empty, recording a miss");
                trial.response_ms = Some(self.timer.elapsed_ms(trial.started_at));
                self.record_answer(false, String::new(), Some("No speech was recorded.".into()))
            }
        }
    }

    fn on_validated(
        &mut self,
        result: Result<MatchOutcome, ValidationError>,
    ) -> Result<Vec<SessionEffect>, StateError> {
        if !matches!(self.state.stage, SessionStage::Validating { .. }) {
            return Ok(Vec::new());
        }
        match result {
            Ok(outcome) => self.record_answer(outcome.matches, outcome.transcribed_text, None),
            Err(err) => {
                warn!(error = ?err, "validation failed, recording a miss");
                self.record_answer(false, String::new(), Some(err.message()))
            }
        }
    }

    /// Appends the finished trial and schedules the move to the next one.
    fn record_answer(
        &mut self,
        correct: bool,
        transcribed_text: String,
        error: Option<String>,
    ) -> Result<Vec<SessionEffect>, StateError> {
        let Some(trial) = self.current.as_ref() else {
            return Ok(Vec::new());
        };
        let response_ms = trial
            .response_ms
            .unwrap_or_else(|| self.timer.elapsed_ms(trial.started_at));
        let record = TrialRecord::answered(
            trial.phase,
            trial.index,
            trial.stimulus.canonical_name.clone(),
            trial.started_at,
            response_ms,
            correct,
            transcribed_text.clone(),
        );
        let expected = trial.stimulus.canonical_name.clone();
        let (phase, index) = (trial.phase, trial.index);
        self.history.push(record)?;
        info!(%phase, index, correct, response_ms, "trial recorded");

        self.state.stage = SessionStage::Presenting { phase, index };
        self.state.image_blurred = true;
        self.state.last_correct = Some(correct);
        self.state.transcription = Some(transcribed_text.clone());

        let notice = match error {
            Some(message) => SessionNotice::error(message),
            None if correct => SessionNotice::success(format!("Correct! \"{expected}\"")),
            None if transcribed_text.is_empty() => {
                SessionNotice::failure(format!("Nothing recognized. Expected \"{expected}\"."))
            }
            None => SessionNotice::failure(format!(
                "Heard \"{transcribed_text}\", expected \"{expected}\"."
            )),
        };
        Ok(vec![
            SessionEffect::Notify(notice),
            self.schedule(self.config.feedback_delay(correct), Deferred::Advance),
        ])
    }

    fn advance(&mut self) -> Vec<SessionEffect> {
        let Some(phase) = self.state.stage.phase() else {
            return Vec::new();
        };
        match self.next_index(phase) {
            Some(index) => {
                self.current = None;
                self.state.clear_transient();
                self.state.stage = SessionStage::Presenting { phase, index };
                vec![self.schedule(
                    Duration::from_millis(self.config.trial_settle_ms),
                    Deferred::StartTrial,
                )]
            }
            None => {
                info!(%phase, "phase complete");
                self.move_to_next_phase()
            }
        }
    }

    fn skip_phase(&mut self) -> Result<Vec<SessionEffect>, StateError> {
        if self.state.skip_in_progress {
            return Err(StateError::SkipInProgress);
        }
        let (phase, from) = match self.state.stage {
            SessionStage::PhaseInstruction(phase) => {
                (phase, self.next_index(phase).unwrap_or(self.catalog.len()))
            }
            SessionStage::Presenting { phase, index } => (phase, index),
            _ => return Err(self.not_allowed("skip phase")),
        };

        let now = self.timer.now();
        let mut skipped = 0;
        for item in self.catalog.items().iter().skip(from) {
            if self.history.contains(phase, item.id) {
                continue;
            }
            self.history.push(TrialRecord::skipped(
                phase,
                item.id,
                item.canonical_name.clone(),
                now,
                PHASE_SKIPPED_TEXT,
            ))?;
            skipped += 1;
        }
        info!(%phase, from, skipped, "phase skipped");

        self.invalidate();
        self.current = None;
        self.state.clear_transient();
        self.state.skip_in_progress = true;
        Ok(vec![
            SessionEffect::CancelCapture,
            SessionEffect::Notify(SessionNotice::info(format!("{phase} test skipped"))),
            self.schedule(
                Duration::from_millis(self.config.skip_notice_ms),
                Deferred::NextPhase,
            ),
        ])
    }

    fn move_to_next_phase(&mut self) -> Vec<SessionEffect> {
        let Some(phase) = self.state.stage.phase() else {
            return Vec::new();
        };
        self.invalidate();
        self.current = None;
        self.state.clear_transient();
        self.state.skip_in_progress = false;

        match phase.next() {
            Some(next) => {
                self.state.stage = SessionStage::PhaseInstruction(next);
                info!(from = %phase, to = %next, "moving to next phase");
                vec![SessionEffect::CancelCapture]
            }
            None => {
                self.state.stage = SessionStage::Complete;
                info!(trials = self.history.len(), "session complete");
                vec![
                    SessionEffect::CancelCapture,
                    self.schedule(
                        Duration::from_millis(self.config.finalize_settle_ms),
                        Deferred::Finalize,
                    ),
                ]
            }
        }
    }

    fn finalize(&mut self) -> Vec<SessionEffect> {
        if self.state.stage != SessionStage::Complete {
            return Vec::new();
        }
        match compute_report(self.history.records(), &self.catalog, &self.config.scoring) {
            Some(report) => {
                let report = Arc::new(report);
                info!(
                    level = report.acuity_level.label(),
                    overall = report.overall_score,
                    referral = report.should_flag_referral,
                    "report ready"
                );
                self.report = Some(Arc::clone(&report));
                vec![SessionEffect::ReportReady(report)]
            }
            None => Vec::new(),
        }
    }

    fn retry_capture(&mut self) -> Result<Vec<SessionEffect>, StateError> {
        if !matches!(self.state.stage, SessionStage::Presenting { .. })
            || self.state.capture_fault.is_none()
        {
            return Err(self.not_allowed("retry capture"));
        }
        self.invalidate();
        self.state.capture_fault = None;
        Ok(vec![self.schedule(
            Duration::from_millis(self.config.retry_settle_ms),
            Deferred::StartTrial,
        )])
    }

    fn stop_capture(&mut self) -> Result<Vec<SessionEffect>, StateError> {
        let recording = matches!(self.state.stage, SessionStage::Presenting { .. })
            && !self.showing_feedback()
            && self.state.trial_started_at.is_some()
            && self.state.capture_fault.is_none();
        if !recording {
            return Err(self.not_allowed("stop capture"));
        }
        Ok(vec![SessionEffect::StopCapture])
    }

    fn reset(&mut self) -> Vec<SessionEffect> {
        self.invalidate();
        self.history.clear();
        self.current = None;
        self.report = None;
        self.state = SessionState::default();
        info!("session reset");
        vec![SessionEffect::CancelCapture]
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn stage(&self) -> SessionStage {
        self.state.stage
    }

    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    pub fn report(&self) -> Option<&Arc<Report>> {
        self.report.as_ref()
    }

    pub fn catalog(&self) -> &StimulusCatalog {
        &self.catalog
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let stimulus = match self.state.stage {
            SessionStage::Presenting { index, .. } | SessionStage::Validating { index, .. } => {
                self.catalog.get(index).cloned()
            }
            _ => None,
        };
        let phase_progress = match self.state.stage {
            SessionStage::Presenting { index, .. } | SessionStage::Validating { index, .. } => {
                Some((index + 1, self.catalog.len()))
            }
            _ => None,
        };
        SessionSnapshot {
            state: self.state.clone(),
            stimulus,
            recorded_trials: self.history.len(),
            total_trials: self.catalog.session_trials(),
            phase_progress,
            report: self.report.clone(),
        }
    }
}
