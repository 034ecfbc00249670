//! Deduplicated detail resolution
//!
//! Every detail key is fetched at most once per run. Concurrent tasks asking
//! for the same key wait on a single in-flight fetch and observe the same
//! record. Transient failures (network, throttling, 5xx) are retried with
//! exponential backoff before the fetch is reported as failed. Tasks already
//! waiting on that fetch receive the same failure; the key is not cached and a
//! later task attempts it again.

use crate::cache::ResultCache;
use crate::error::{IngestError, Result};
use crate::retry::RetryPolicy;
use crate::types::DetailRecord;
use crate::upstream::DetailSource;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

type Outcome = std::result::Result<Arc<DetailRecord>, Arc<IngestError>>;

pub struct DetailFetcher<D> {
    source: D,
    cache: ResultCache<Outcome>,
    retry: RetryPolicy,
    upstream_calls: AtomicUsize,
}

impl<D: DetailSource> DetailFetcher<D> {
    /// `cache_size` of 0 keeps every record for the lifetime of the fetcher
    pub fn new(source: D, cache_size: usize, retry: RetryPolicy) -> Self {
        Self {
            source,
            cache: ResultCache::with_capacity(cache_size),
            retry,
            upstream_calls: AtomicUsize::new(0),
        }
    }

    /// Resolve the record for `key`, from cache when already fetched
    pub async fn fetch(&self, key: &str) -> Result<Arc<DetailRecord>> {
        let key = key.trim();
        self.cache
            .get_or_compute_retaining(
                key,
                || async {
                    self.fetch_with_retry(key)
                        .await
                        .map(Arc::new)
                        .map_err(Arc::new)
                },
                |outcome| outcome.is_ok(),
            )
            .await
            .map_err(IngestError::Shared)
    }

    async fn fetch_with_retry(&self, key: &str) -> Result<DetailRecord> {
        let mut attempt = 0;
        loop {
            self.upstream_calls.fetch_add(1, Ordering::Relaxed);
            debug!(username = %key, attempt = attempt + 1, "Fetching detail record");

            match self.source.fetch_detail(key).await {
                Ok(record) => return Ok(record),
                Err(e) if e.is_transient() && self.retry.has_attempt_after(attempt) => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        username = %key,
                        attempt = attempt + 1,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Detail fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
                Err(e) => return Err(e),
            }
        }
    }

    /// Outbound detail requests issued so far, retries included
    pub fn upstream_calls(&self) -> usize {
        self.upstream_calls.load(Ordering::Relaxed)
    }

    /// Distinct keys resolved successfully
    pub fn cached_records(&self) -> usize {
        self.cache.len()
    }
}
