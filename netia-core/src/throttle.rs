use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Spaces outbound calls by a fixed minimum interval.
///
/// Every API call and every reply post goes through [`RequestThrottle::acquire`].
/// The lock is held across the wait so concurrent callers queue up in order.
#[derive(Debug)]
pub struct RequestThrottle {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RequestThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until at least `min_interval` has passed since the previous call.
    /// Returns how long the caller waited.
    pub async fn acquire(&self) -> Duration {
        let mut last = self.last_request.lock().await;
        let now = Instant::now();
        let mut waited = Duration::ZERO;

        if let Some(previous) = *last {
            let ready_at = previous + self.min_interval;
            if ready_at > now {
                waited = ready_at - now;
                tracing::debug!("Throttling request for {:?}", waited);
                sleep_until(ready_at).await;
            }
        }

        *last = Some(Instant::now());
        waited
    }
}

impl Default for RequestThrottle {
    fn default() -> Self {
        Self::from_millis(1000)
    }
}
