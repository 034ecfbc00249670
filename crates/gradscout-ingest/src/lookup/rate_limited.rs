//! Throttled, retrying wrapper around a [`Lookup`]

use super::{is_rate_limit, Lookup};
use crate::retry::RetryPolicy;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Text returned when every attempt failed
pub fn fallback_text(query: &str) -> String {
    format!("Information about {}", query)
}

/// Enforces a minimum interval between outbound lookups
///
/// The throttle check, the call and the timestamp update all happen under one
/// mutex, so concurrent callers are serialized and observe a consistent
/// "last call" time. The timestamp only moves on success.
pub struct RateLimitedLookup<L> {
    inner: L,
    min_interval: Duration,
    retry: RetryPolicy,
    last_call: Mutex<Option<Instant>>,
}

impl<L: Lookup> RateLimitedLookup<L> {
    /// Backoff after a rate-limited attempt is `min_interval * 2^attempt`
    pub fn new(inner: L, min_interval: Duration, max_attempts: u32) -> Self {
        Self {
            inner,
            min_interval,
            retry: RetryPolicy::new(max_attempts, min_interval),
            last_call: Mutex::new(None),
        }
    }

    /// Run a lookup; never fails, falling back to [`fallback_text`]
    pub async fn run(&self, query: &str) -> String {
        let mut last_call = self.last_call.lock().await;

        for attempt in 0..self.retry.max_attempts {
            if let Some(previous) = *last_call {
                let elapsed = previous.elapsed();
                if elapsed < self.min_interval {
                    let wait = self.min_interval - elapsed;
                    debug!(wait_ms = wait.as_millis() as u64, "Rate limiting: waiting");
                    tokio::time::sleep(wait).await;
                }
            }

            match self.inner.lookup(query).await {
                Ok(text) => {
                    *last_call = Some(Instant::now());
                    return text;
                },
                Err(err) if is_rate_limit(&err) && self.retry.has_attempt_after(attempt) => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Lookup rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                },
                Err(err) => {
                    warn!(
                        attempt = attempt + 1,
                        query = %query,
                        error = %err,
                        "Lookup failed, using fallback text"
                    );
                    break;
                },
            }
        }

        fallback_text(query)
    }
}
