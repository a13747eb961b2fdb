//! Token-bucket limiter shared by every call to the language model.
//!
//! - `requests_per_second` is the steady refill rate
//! - `burst` is the bucket capacity
//!
//! Callers that find the bucket short reserve their token up front and sleep
//! outside the lock, so concurrent waiters queue fairly instead of stampeding.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};

const MIN_QPS: f64 = 0.01;

#[derive(Clone, Copy, Debug)]
struct BucketCfg {
    qps: f64,
    burst: f64,
}

#[derive(Debug)]
struct BucketState {
    cfg: BucketCfg,
    tokens: f64,
    last: Instant,
}

impl BucketState {
    fn new(cfg: BucketCfg, now: Instant) -> Self {
        Self {
            cfg,
            tokens: cfg.burst,
            last: now,
        }
    }

    /// Takes `need` tokens and returns how long the caller must wait before
    /// using them (zero if they were already available).
    fn needed_wait(&mut self, need: f64, now: Instant) -> Duration {
        let dt = now.saturating_duration_since(self.last).as_secs_f64();
        self.last = now;
        self.tokens = (self.tokens + dt * self.cfg.qps).min(self.cfg.burst);

        self.tokens -= need;
        if self.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-self.tokens / self.cfg.qps)
        }
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<BucketState>,
}

impl RateLimiter {
    pub fn new(requests_per_second: f64, burst: u32) -> Self {
        let qps = if requests_per_second.is_finite() {
            requests_per_second.max(MIN_QPS)
        } else {
            MIN_QPS
        };
        let cfg = BucketCfg {
            qps,
            burst: f64::from(burst.max(1)),
        };
        Self {
            state: Mutex::new(BucketState::new(cfg, Instant::now())),
        }
    }

    /// Wait until one request may be sent.
    pub async fn acquire(&self) {
        let wait = {
            let mut state = self.state.lock().await;
            state.needed_wait(1.0, Instant::now())
        };
        if !wait.is_zero() {
            tracing::debug!(wait_ms = wait.as_millis() as u64, "llm.rate.waiting");
            sleep(wait).await;
        }
    }
}
