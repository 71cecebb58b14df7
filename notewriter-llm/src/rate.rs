use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Process-wide spacing of LLM calls.
///
/// Semantics:
/// - `wait_if_needed` returns once at least `min_interval` has passed since the
///   previously granted slot.
/// - The next slot is reserved under the lock before sleeping, so concurrent
///   callers queue behind each other instead of waking together.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_slot: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Reserves the earliest permitted slot at or after `now`.
    fn reserve(&self, last: &mut Option<Instant>, now: Instant) -> Instant {
        let slot = match *last {
            Some(prev) => (prev + self.min_interval).max(now),
            None => now,
        };
        *last = Some(slot);
        slot
    }

    pub async fn wait_if_needed(&self) {
        let now = Instant::now();
        let slot = {
            let mut last = self.last_slot.lock().await;
            self.reserve(&mut last, now)
        };

        if slot > now {
            tracing::debug!(
                wait_ms = (slot - now).as_millis() as u64,
                "llm.rate.waiting"
            );
            sleep_until(slot).await;
        }
    }
}
