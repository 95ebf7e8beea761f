//! Cooperative rate limiter: a minimum interval between consecutive
//! requests against one vendor.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Blocks for `min_interval - elapsed` before the next request is issued.
/// One pacer per vendor; different vendors do not share a budget.
#[derive(Debug)]
pub struct RequestPacer {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RequestPacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// Waits until the minimum interval since the previous call has passed,
    /// then records the new request time.
    pub async fn pause(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}
