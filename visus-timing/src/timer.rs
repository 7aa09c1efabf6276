use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Clock used to timestamp trials and measure response times.
pub trait Timer: Clone + Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;

    fn elapsed(&self, since: DateTime<Utc>) -> Duration {
        (self.now() - since).to_std().unwrap_or(Duration::ZERO)
    }

    fn elapsed_ms(&self, since: DateTime<Utc>) -> u64 {
        self.elapsed(since).as_millis() as u64
    }
}

/// Wall clock anchored once, then advanced by tokio's monotonic clock.
///
/// Follows `tokio::time::pause`, so paced sessions can run on virtual time.
#[derive(Debug, Clone)]
pub struct SessionTimer {
    pub anchor_wall: DateTime<Utc>,
    pub anchor: tokio::time::Instant,
}

impl SessionTimer {
    pub fn new() -> Self {
        Self {
            anchor_wall: Utc::now(),
            anchor: tokio::time::Instant::now(),
        }
    }
}

impl Default for SessionTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer for SessionTimer {
    fn now(&self) -> DateTime<Utc> {
        let since = self.anchor.elapsed();
        self.anchor_wall + chrono::Duration::from_std(since).unwrap_or_else(|_| chrono::Duration::zero())
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualTimer {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualTimer {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, d: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now = *now + chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::zero());
        }
    }
}

impl Default for ManualTimer {
    fn default() -> Self {
        Self::new(DateTime::<Utc>::default())
    }
}

impl Timer for ManualTimer {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_timer_moves_only_when_advanced() {
        let timer = ManualTimer::default();
        let start = timer.now();
        assert_eq!(timer.elapsed_ms(start), 0);
        timer.advance(Duration::from_millis(1250));
        assert_eq!(timer.elapsed_ms(start), 1250);
        assert_eq!(timer.clone().elapsed_ms(start), 1250);
    }

    #[tokio::test(start_paused = true)]
    async fn session_timer_follows_paused_tokio_clock() {
        let timer = SessionTimer::new();
        let start = timer.now();
        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(timer.elapsed_ms(start), 3000);
    }

    #[test]
    fn elapsed_saturates_for_future_timestamps() {
        let timer = ManualTimer::default();
        let later = timer.now() + chrono::Duration::seconds(5);
        assert_eq!(timer.elapsed(later), Duration::ZERO);
    }
}
