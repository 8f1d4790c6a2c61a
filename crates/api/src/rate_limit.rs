use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Per-client sliding window. Each key may make `max_requests` calls in
/// any `window`-long interval.
#[derive(Debug, Clone)]
pub struct SlidingWindowLimiter {
    hits: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
    window: Duration,
    max_requests: usize,
}

impl SlidingWindowLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            hits: Arc::new(Mutex::new(HashMap::new())),
            window,
            max_requests: max_requests.max(1),
        }
    }

    /// Records a hit for `key`, or returns how long until the oldest hit
    /// leaves the window.
    pub fn check(&self, key: &str) -> Result<(), Duration> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), Duration> {
        let mut hits = self.hits.lock();
        let window = self.window;
        hits.retain(|_, queue| {
            while queue
                .front()
                .is_some_and(|oldest| now.saturating_duration_since(*oldest) >= window)
            {
                queue.pop_front();
            }
            !queue.is_empty()
        });

        let queue = hits.entry(key.to_string()).or_default();

        if queue.len() >= self.max_requests {
            let oldest = queue.front().copied().unwrap_or(now);
            return Err(self.window.saturating_sub(now.duration_since(oldest)));
        }

        queue.push_back(now);
        Ok(())
    }

    pub fn tracked_keys(&self) -> usize {
        self.hits.lock().len()
    }
}
