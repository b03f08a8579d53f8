use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::{self, Instant};

/// Time source for every bounded hardware wait.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Monotonic time since the clock was created
    fn now(&self) -> Duration;
    async fn sleep(&self, period: Duration);
}

pub struct TokioClock {
    start: Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    async fn sleep(&self, period: Duration) {
        time::sleep(period).await
    }
}

/// Clock which only advances when slept on. Waits finish instantly and
/// deterministically, which is what the tests need.
#[derive(Default)]
pub struct ManualClock {
    elapsed: Mutex<Duration>,
    sleeps: AtomicUsize,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, period: Duration) {
        let mut elapsed = self.elapsed.lock().unwrap_or_else(|e| e.into_inner());
        *elapsed += period;
    }

    /// Number of sleeps taken so far
    pub fn sleeps(&self) -> usize {
        self.sleeps.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn sleep(&self, period: Duration) {
        self.sleeps.fetch_add(1, Ordering::SeqCst);
        self.advance(period);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_clock_advances_on_sleep() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);
        clock.sleep(Duration::from_secs(1)).await;
        clock.sleep(Duration::from_secs(1)).await;
        assert_eq!(clock.now(), Duration::from_secs(2));
        assert_eq!(clock.sleeps(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_tracks_sleep() {
        let clock = TokioClock::new();
        clock.sleep(Duration::from_secs(5)).await;
        assert!(clock.now() >= Duration::from_secs(5));
    }
}
