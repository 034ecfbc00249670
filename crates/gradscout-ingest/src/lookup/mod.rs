//! Text lookup capability used to enrich records with outside context
//!
//! The search backend is opaque: anything that maps a query string to text
//! implements [`Lookup`]. [`RateLimitedLookup`] wraps an implementation with a
//! minimum-interval throttle and rate-limit aware retries.

mod http;
mod rate_limited;

pub use http::HttpLookup;
pub use rate_limited::{fallback_text, RateLimitedLookup};

use crate::error::{IngestError, Result};
use async_trait::async_trait;

/// External text lookup
#[async_trait]
pub trait Lookup: Send + Sync {
    async fn lookup(&self, query: &str) -> Result<String>;
}

#[async_trait]
impl<T: Lookup + ?Sized> Lookup for std::sync::Arc<T> {
    async fn lookup(&self, query: &str) -> Result<String> {
        (**self).lookup(query).await
    }
}

/// Whether a failure carries a rate-limit signal
///
/// Upstreams are inconsistent: some answer 429, others fail with a message
/// mentioning the rate limit.
pub fn is_rate_limit(err: &IngestError) -> bool {
    match err {
        IngestError::RateLimited(_) => true,
        other => {
            let message = other.to_string().to_lowercase();
            message.contains("rate limit") || message.contains("ratelimit")
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_classification() {
        assert!(is_rate_limit(&IngestError::rate_limited("429")));
        assert!(is_rate_limit(&IngestError::transient(
            "202 Ratelimit: Rate Limit exceeded"
        )));
        assert!(!is_rate_limit(&IngestError::transient("connection reset")));
        assert!(!is_rate_limit(&IngestError::malformed("not json")));
    }
}
