//! Token bucket rate limiter for the external vision analyzer.
//!
//! Admits one call per token; tokens refill at a constant rate up to a
//! fixed capacity. Callers that find the bucket empty queue up and are
//! released strictly in arrival order as tokens accrue. A spent token
//! is never refunded, even when the downstream call fails.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{oneshot, Mutex};
use tokio::time::Instant;
use tracing::debug;

/// Default bucket: 15 requests per 60 seconds
pub const DEFAULT_CAPACITY: f64 = 15.0;
pub const DEFAULT_REFILL_RATE: f64 = 15.0 / 60.0;

/// Snapshot of limiter state for diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct RateLimiterStatus {
    pub tokens_available: f64,
    pub capacity: f64,
    pub queue_depth: usize,
    pub refill_rate_per_sec: f64,
    pub estimated_wait_secs: f64,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
    waiters: VecDeque<oneshot::Sender<()>>,
    draining: bool,
}

struct Inner {
    capacity: f64,
    refill_rate: f64,
    state: Mutex<BucketState>,
}

impl Inner {
    /// Lazy refill: `min(capacity, tokens + elapsed * rate)`
    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_rate).min(self.capacity);
        state.last_refill = now;
    }
}

/// Shared token bucket; cheap to clone, all clones share one bucket.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_REFILL_RATE)
    }
}

impl RateLimiter {
    pub fn new(capacity: f64, refill_rate: f64) -> Self {
        Self {
            inner: Arc::new(Inner {
                capacity,
                refill_rate,
                state: Mutex::new(BucketState {
                    tokens: capacity,
                    last_refill: Instant::now(),
                    waiters: VecDeque::new(),
                    draining: false,
                }),
            }),
        }
    }

    /// Acquire one token, waiting up to `timeout` if the bucket is
    /// empty. Returns false if the timeout elapses first; the queue
    /// slot is abandoned and no token is consumed in that case.
    pub async fn acquire(&self, timeout: Duration) -> bool {
        let rx = {
            let mut state = self.inner.state.lock().await;
            self.inner.refill(&mut state);

            if state.tokens >= 1.0 && state.waiters.is_empty() {
                state.tokens -= 1.0;
                debug!(tokens = state.tokens, "token acquired");
                return true;
            }

            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            debug!(queue_depth = state.waiters.len(), "bucket empty, queued");

            if !state.draining {
                state.draining = true;
                tokio::spawn(drain(Arc::clone(&self.inner)));
            }
            rx
        };

        matches!(tokio::time::timeout(timeout, rx).await, Ok(Ok(())))
    }

    /// Current tokens, queue depth and a coarse wait estimate.
    pub async fn status(&self) -> RateLimiterStatus {
        let mut state = self.inner.state.lock().await;
        self.inner.refill(&mut state);

        let queue_depth = state.waiters.len();
        let estimated_wait_secs = if queue_depth > 0 {
            queue_depth as f64 / self.inner.refill_rate
        } else {
            0.0
        };

        RateLimiterStatus {
            tokens_available: state.tokens,
            capacity: self.inner.capacity,
            queue_depth,
            refill_rate_per_sec: self.inner.refill_rate,
            estimated_wait_secs,
        }
    }
}

/// Background task that releases waiters in arrival order. Runs only
/// while the queue is non-empty, then parks itself.
async fn drain(inner: Arc<Inner>) {
    loop {
        let sleep_for = {
            let mut state = inner.state.lock().await;
            inner.refill(&mut state);

            // Timed-out callers drop their receiver; skip them.
            while matches!(state.waiters.front(), Some(tx) if tx.is_closed()) {
                state.waiters.pop_front();
            }

            if state.waiters.is_empty() {
                state.draining = false;
                return;
            }

            if state.tokens >= 1.0 {
                while let Some(tx) = state.waiters.pop_front() {
                    if tx.send(()).is_ok() {
                        state.tokens -= 1.0;
                        break;
                    }
                }
                None
            } else {
                // Time until the next whole token accrues
                Some(Duration::from_secs_f64(
                    (1.0 - state.tokens) / inner.refill_rate,
                ))
            }
        };

        if let Some(wait) = sleep_for {
            tokio::time::sleep(wait).await;
        }
    }
}
