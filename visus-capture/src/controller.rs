use crate::device::{AudioSample, CaptureDevice, CaptureError};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Interval between progress reports.
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// Percentage of the recording window elapsed, 0-100.
    Progress(u8),
    Completed(AudioSample),
    Failed(CaptureError),
}

/// Event stream for one `begin` call. Events stop as soon as the token is
/// superseded, even if the receiver is still held.
#[derive(Debug)]
pub struct CaptureSession {
    pub token: u64,
    pub events: mpsc::UnboundedReceiver<CaptureEvent>,
}

struct ActiveCapture {
    token: u64,
    cancel: CancellationToken,
    finish: CancellationToken,
    task: JoinHandle<()>,
}

pub struct CaptureController {
    device: Arc<dyn CaptureDevice>,
    tick: Duration,
    current: Arc<AtomicU64>,
    active: Mutex<Option<ActiveCapture>>,
}

impl CaptureController {
    pub fn new(device: Arc<dyn CaptureDevice>) -> Self {
        Self::with_tick(device, DEFAULT_TICK)
    }

    pub fn with_tick(device: Arc<dyn CaptureDevice>, tick: Duration) -> Self {
        Self {
            device,
            tick: tick.max(Duration::from_millis(1)),
            current: Arc::new(AtomicU64::new(0)),
            active: Mutex::new(None),
        }
    }

    pub async fn is_active(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(|a| !a.task.is_finished())
    }

    /// Starts a new recording of at most `duration`.
    ///
    /// Any recording still running is cancelled and its device released
    /// before the new one opens.
    pub async fn begin(&self, duration: Duration) -> CaptureSession {
        let mut active = self.active.lock().await;
        let token = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = active.take() {
            debug!(previous = previous.token, next = token, "superseding capture");
            shutdown(previous).await;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let finish = CancellationToken::new();
        let run = CaptureRun {
            device: Arc::clone(&self.device),
            duration,
            tick: self.tick,
            cancel: cancel.clone(),
            finish: finish.clone(),
            emitter: Emitter {
                token,
                current: Arc::clone(&self.current),
                events: tx,
            },
        };
        let task = tokio::spawn(run.run());
        *active = Some(ActiveCapture {
            token,
            cancel,
            finish,
            task,
        });
        debug!(token, duration_ms = duration.as_millis() as u64, "capture started");

        CaptureSession { token, events: rx }
    }

    /// Ends the active recording early; it completes with the buffered audio.
    /// Returns false when nothing is recording.
    pub async fn stop(&self) -> bool {
        match self.active.lock().await.as_ref() {
            Some(active) if !active.task.is_finished() => {
                active.finish.cancel();
                true
            }
            _ => false,
        }
    }

    /// Cancels the active recording without completing it. Safe when idle.
    pub async fn cancel(&self) {
        let mut active = self.active.lock().await;
        self.current.fetch_add(1, Ordering::SeqCst);
        if let Some(previous) = active.take() {
            debug!(token = previous.token, "capture cancelled");
            shutdown(previous).await;
        }
    }
}

async fn shutdown(capture: ActiveCapture) {
    capture.cancel.cancel();
    if let Err(err) = capture.task.await {
        if err.is_panic() {
            warn!(token = capture.token, "capture task panicked");
        }
    }
}

struct Emitter {
    token: u64,
    current: Arc<AtomicU64>,
    events: mpsc::UnboundedSender<CaptureEvent>,
}

impl Emitter {
    fn emit(&self, event: CaptureEvent) {
        if self.current.load(Ordering::SeqCst) != self.token {
            debug!(token = self.token, ?event, "dropping stale capture event");
            return;
        }
        let _ = self.events.send(event);
    }
}

struct CaptureRun {
    device: Arc<dyn CaptureDevice>,
    duration: Duration,
    tick: Duration,
    cancel: CancellationToken,
    finish: CancellationToken,
    emitter: Emitter,
}

impl CaptureRun {
    async fn run(self) {
        let opened = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            opened = self.device.open() => opened,
        };
        let stream = match opened {
            Ok(stream) => stream,
            Err(err) => {
                warn!(token = self.emitter.token, error = %err, "capture device unavailable");
                self.emitter.emit(CaptureEvent::Failed(err));
                return;
            }
        };

        let started = Instant::now();
        let deadline = tokio::time::sleep_until(started + self.duration);
        tokio::pin!(deadline);
        let mut ticker = tokio::time::interval_at(started + self.tick, self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    let _ = stream.finish().await;
                    return;
                }
                _ = self.finish.cancelled() => {
                    debug!(token = self.emitter.token, "capture stopped manually");
                    break;
                }
                _ = &mut deadline => {
                    debug!(token = self.emitter.token, "capture window elapsed");
                    break;
                }
                _ = ticker.tick() => {
                    let pct = progress_percent(started.elapsed(), self.duration);
                    self.emitter.emit(CaptureEvent::Progress(pct));
                }
            }
        }

        let sample = stream.finish().await;
        if self.cancel.is_cancelled() {
            return;
        }
        self.emitter.emit(CaptureEvent::Progress(100));
        if sample.is_empty() {
            self.emitter.emit(CaptureEvent::Failed(CaptureError::EmptyCapture));
        } else {
            self.emitter.emit(CaptureEvent::Completed(sample));
        }
    }
}

/// `elapsed / window * 100`, clamped to 100.
pub fn progress_percent(elapsed: Duration, window: Duration) -> u8 {
    if window.is_zero() {
        return 100;
    }
    let pct = elapsed.as_secs_f64() / window.as_secs_f64() * 100.0;
    pct.clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::{ScriptedDevice, ScriptedTake};

    fn sample() -> AudioSample {
        AudioSample::new("audio/wav", vec![1, 2, 3, 4])
    }

    async fn drain(session: &mut CaptureSession) -> Vec<CaptureEvent> {
        let mut events = Vec::new();
        while let Some(event) = session.events.recv().await {
            events.push(event);
        }
        events
    }

    #[test]
    fn progress_is_clamped() {
        let window = Duration::from_millis(3000);
        assert_eq!(progress_percent(Duration::from_millis(1500), window), 50);
        assert_eq!(progress_percent(Duration::from_millis(4500), window), 100);
        assert_eq!(progress_percent(Duration::from_millis(10), Duration::ZERO), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn forced_stop_reports_full_progress_then_completes() {
        let device = Arc::new(ScriptedDevice::always(sample()));
        let controller = CaptureController::new(device.clone());

        let mut session = controller.begin(Duration::from_millis(1000)).await;
        let events = drain(&mut session).await;

        let progress: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                CaptureEvent::Progress(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert_eq!(progress.first(), Some(&10));
        assert_eq!(progress.last(), Some(&100));
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(events.last(), Some(&CaptureEvent::Completed(sample())));
        assert_eq!(device.opened(), 1);
        assert!(!device.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn manual_stop_completes_early() {
        let device = Arc::new(ScriptedDevice::always(sample()));
        let controller = CaptureController::new(device.clone());

        let mut session = controller.begin(Duration::from_secs(10)).await;
        tokio::time::sleep(Duration::from_millis(450)).await;
        assert!(controller.stop().await);

        let started = Instant::now();
        let events = drain(&mut session).await;
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(matches!(events.last(), Some(CaptureEvent::Completed(_))));
        assert!(!controller.stop().await);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_capture_never_fires_again() {
        let device = Arc::new(ScriptedDevice::always(sample()));
        let controller = CaptureController::new(device.clone());

        let mut first = controller.begin(Duration::from_millis(500)).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        let mut second = controller.begin(Duration::from_millis(500)).await;
        assert!(second.token > first.token);

        let second_events = drain(&mut second).await;
        let first_events = drain(&mut first).await;

        assert!(
            first_events
                .iter()
                .all(|e| matches!(e, CaptureEvent::Progress(p) if *p < 100))
        );
        let completions = second_events
            .iter()
            .filter(|e| matches!(e, CaptureEvent::Completed(_)))
            .count();
        assert_eq!(completions, 1);
        assert_eq!(device.opened(), 2);
        assert!(!device.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn device_failure_reports_once() {
        let device = Arc::new(ScriptedDevice::with_script(
            [ScriptedTake::Deny("permission denied".into())],
            ScriptedTake::Sample(sample()),
        ));
        let controller = CaptureController::new(device.clone());

        let mut session = controller.begin(Duration::from_millis(300)).await;
        let events = drain(&mut session).await;
        assert_eq!(
            events,
            vec![CaptureEvent::Failed(CaptureError::Device(
                "permission denied".into()
            ))]
        );
        assert_eq!(device.opened(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_buffer_is_surfaced() {
        let device = Arc::new(ScriptedDevice::with_script(
            [ScriptedTake::Empty],
            ScriptedTake::Sample(sample()),
        ));
        let controller = CaptureController::new(device);

        let mut session = controller.begin(Duration::from_millis(200)).await;
        let events = drain(&mut session).await;
        assert_eq!(
            events.last(),
            Some(&CaptureEvent::Failed(CaptureError::EmptyCapture))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_releases_device_and_is_idempotent() {
        let device = Arc::new(ScriptedDevice::always(sample()));
        let controller = CaptureController::new(device.clone());
        controller.cancel().await;

        let mut session = controller.begin(Duration::from_secs(5)).await;
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(device.is_open());

        controller.cancel().await;
        controller.cancel().await;
        assert!(!device.is_open());
        assert!(!controller.is_active().await);

        let events = drain(&mut session).await;
        assert!(!events.iter().any(|e| matches!(e, CaptureEvent::Completed(_))));
    }
}
