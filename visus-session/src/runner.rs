//! Async driver around [`SessionStateMachine`].
//!
//! A single task owns the machine. Participant commands arrive over a
//! bounded channel with a reply; capture events, validation results and
//! timers come back over an internal channel tagged with the epoch that
//! requested them.

use crate::config::SessionConfig;
use crate::error::{SessionError, StateError};
use crate::notice::SessionNotice;
use crate::state::{SessionEffect, SessionInput, SessionSnapshot, SessionStage, SessionStateMachine};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use visus_capture::{CaptureController, CaptureDevice};
use visus_core::{StimulusCatalog, TrialRecord};
use visus_report::Report;
use visus_timing::{SessionTimer, Timer};
use visus_validate::TrialValidator;

const COMMAND_BUFFER: usize = 32;
const NOTICE_BUFFER: usize = 64;

enum Command {
    Input {
        input: SessionInput,
        reply: oneshot::Sender<Result<(), StateError>>,
    },
    History(oneshot::Sender<Vec<TrialRecord>>),
}

/// Front end of a running session. Dropping it (or `shutdown`) stops the task.
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
    notices: broadcast::Sender<SessionNotice>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Spawns the session task on the current tokio runtime.
    pub fn spawn(
        catalog: Arc<StimulusCatalog>,
        config: SessionConfig,
        device: Arc<dyn CaptureDevice>,
        validator: Arc<dyn TrialValidator>,
    ) -> Self {
        Self::spawn_with_timer(catalog, config, device, validator, SessionTimer::new())
    }

    pub fn spawn_with_timer<T: Timer>(
        catalog: Arc<StimulusCatalog>,
        config: SessionConfig,
        device: Arc<dyn CaptureDevice>,
        validator: Arc<dyn TrialValidator>,
        timer: T,
    ) -> Self {
        let capture = CaptureController::with_tick(device, config.progress_tick());
        let machine = SessionStateMachine::new(catalog, config, timer);

        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();
        let (snapshots_tx, snapshots_rx) = watch::channel(machine.snapshot());
        let (notices_tx, _) = broadcast::channel(NOTICE_BUFFER);

        let runner = SessionRunner {
            machine,
            capture: Arc::new(capture),
            validator,
            inputs: inputs_tx,
            snapshots: snapshots_tx,
            notices: notices_tx.clone(),
        };
        let task = tokio::spawn(runner.run(commands_rx, inputs_rx));

        Self {
            commands: commands_tx,
            snapshots: snapshots_rx,
            notices: notices_tx,
            task,
        }
    }

    async fn send(&self, input: SessionInput) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Input { input, reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)??;
        Ok(())
    }

    /// Leaves the welcome screen for the first phase instruction.
    pub async fn start(&self) -> Result<(), SessionError> {
        self.send(SessionInput::Start).await
    }

    /// Dismisses the instruction screen and starts the phase's first trial.
    pub async fn begin_phase(&self) -> Result<(), SessionError> {
        self.send(SessionInput::BeginPhase).await
    }

    pub async fn skip_phase(&self) -> Result<(), SessionError> {
        self.send(SessionInput::SkipPhase).await
    }

    /// Re-opens the microphone after a device failure.
    pub async fn retry_capture(&self) -> Result<(), SessionError> {
        self.send(SessionInput::RetryCapture).await
    }

    /// Ends the current recording early.
    pub async fn stop_capture(&self) -> Result<(), SessionError> {
        self.send(SessionInput::StopCapture).await
    }

    pub async fn reset(&self) -> Result<(), SessionError> {
        self.send(SessionInput::Reset).await
    }

    pub async fn history(&self) -> Result<Vec<TrialRecord>, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::History(reply))
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn notices(&self) -> broadcast::Receiver<SessionNotice> {
        self.notices.subscribe()
    }

    /// Resolves with the first snapshot matching `predicate`, including the current one.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Result<SessionSnapshot, SessionError> {
        let mut rx = self.snapshots.clone();
        let snapshot = rx.wait_for(predicate).await.map_err(|_| SessionError::Closed)?;
        Ok(snapshot.clone())
    }

    pub async fn wait_for_stage(&self, stage: SessionStage) -> Result<SessionSnapshot, SessionError> {
        self.wait_for(|s| s.state.stage == stage).await
    }

    pub async fn wait_for_report(&self) -> Result<Arc<Report>, SessionError> {
        let snapshot = self.wait_for(|s| s.report.is_some()).await?;
        snapshot.report.ok_or(SessionError::Closed)
    }

    /// Stops the session task and releases the microphone.
    pub async fn shutdown(self) {
        drop(self.commands);
        if let Err(err) = self.task.await {
            warn!(error = %err, "session task ended abnormally");
        }
    }
}

struct SessionRunner<T: Timer> {
    machine: SessionStateMachine<T>,
    capture: Arc<CaptureController>,
    validator: Arc<dyn TrialValidator>,
    inputs: mpsc::UnboundedSender<SessionInput>,
    snapshots: watch::Sender<SessionSnapshot>,
    notices: broadcast::Sender<SessionNotice>,
}

impl<T: Timer> SessionRunner<T> {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut inputs: mpsc::UnboundedReceiver<SessionInput>,
    ) {
        info!(stimuli = self.machine.catalog().len(), "session task running");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Input { input, reply }) => {
                        let result = self.dispatch(input).await;
                        let _ = reply.send(result);
                    }
                    Some(Command::History(reply)) => {
                        let _ = reply.send(self.machine.history().records().to_vec());
                    }
                    None => break,
                },
                Some(input) = inputs.recv() => {
                    if let Err(err) = self.dispatch(input).await {
                        warn!(error = %err, "internal session input rejected");
                    }
                }
            }
        }
        self.capture.cancel().await;
        info!("session task stopped");
    }

    async fn dispatch(&mut self, input: SessionInput) -> Result<(), StateError> {
        let effects = self.machine.handle(input).inspect_err(|err| {
            debug!(error = %err, "input rejected");
        })?;
        for effect in effects {
            self.apply(effect).await;
        }
        self.snapshots.send_replace(self.machine.snapshot());
        Ok(())
    }

    async fn apply(&mut self, effect: SessionEffect) {
        match effect {
            SessionEffect::BeginCapture { epoch, duration } => {
                let mut session = self.capture.begin(duration).await;
                let inputs = self.inputs.clone();
                tokio::spawn(async move {
                    while let Some(event) = session.events.recv().await {
                        if inputs.send(SessionInput::Capture { epoch, event }).is_err() {
                            break;
                        }
                    }
                });
            }
            SessionEffect::StopCapture => {
                if !self.capture.stop().await {
                    debug!("stop requested with no recording active");
                }
            }
            SessionEffect::CancelCapture => self.capture.cancel().await,
            SessionEffect::Validate {
                epoch,
                sample,
                target,
            } => {
                let validator = Arc::clone(&self.validator);
                let inputs = self.inputs.clone();
                tokio::spawn(async move {
                    let result = validator.validate(&sample, &target).await;
                    let _ = inputs.send(SessionInput::Validated { epoch, result });
                });
            }
            SessionEffect::Schedule {
                epoch,
                delay,
                action,
            } => {
                let inputs = self.inputs.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = inputs.send(SessionInput::Deferred { epoch, action });
                });
            }
            SessionEffect::Notify(notice) => {
                debug!(kind = ?notice.kind, message = %notice.message, "notice");
                let _ = self.notices.send(notice);
            }
            SessionEffect::ReportReady(report) => {
                info!(
                    completed = report.completed_tests,
                    skipped = report.skipped_tests,
                    duration = %report.formatted_duration(),
                    "assessment finished"
                );
            }
        }
    }
}
