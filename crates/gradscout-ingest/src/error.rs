//! Error types for the extraction pipeline
//!
//! Variants follow the containment rules of the pipeline: transient upstream
//! failures are retried where a retry policy exists, malformed responses end a
//! subject's pagination, validation failures drop a single input row, and only
//! configuration errors are fatal to a run.

use std::sync::Arc;
use thiserror::Error;

/// Result type alias for ingest operations
pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    /// Network failure or retryable status (5xx)
    #[error("Transient upstream error: {0}")]
    Transient(String),

    /// Upstream signalled throttling (HTTP 429 or a rate-limit marker)
    #[error("Rate limited by upstream: {0}")]
    RateLimited(String),

    /// Non-retryable status from upstream (4xx other than 429)
    #[error("Upstream returned {status} for {url}")]
    Status { status: u16, url: String },

    /// Response body did not have the expected JSON shape
    #[error("Malformed upstream response: {0}")]
    Malformed(String),

    /// Bad input row
    #[error("Invalid input row {row}: {reason}")]
    Validation { row: usize, reason: String },

    /// A fan-out task failed or panicked
    #[error("Task failed: {0}")]
    TaskFailure(String),

    /// Missing credentials or invalid settings
    #[error("Configuration error: {0}. Check your environment variables or .env file.")]
    Config(String),

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// One failure observed by every task that waited on the same fetch
    #[error(transparent)]
    Shared(Arc<IngestError>),
}

impl IngestError {
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    pub fn validation(row: usize, reason: impl Into<String>) -> Self {
        Self::Validation {
            row,
            reason: reason.into(),
        }
    }

    pub fn task_failure(msg: impl Into<String>) -> Self {
        Self::TaskFailure(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether a retry with backoff may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Shared(inner) => inner.is_transient(),
            other => matches!(other, Self::Transient(_) | Self::RateLimited(_)),
        }
    }

    /// The underlying error, looking through shared failures
    pub fn root(&self) -> &IngestError {
        match self {
            Self::Shared(inner) => inner.root(),
            other => other,
        }
    }

    /// Map a reqwest failure onto the taxonomy
    ///
    /// Connection, timeout and body-read failures are transient; decode failures
    /// mean the upstream sent something we cannot interpret.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Malformed(err.to_string());
        }
        if let Some(status) = err.status() {
            return Self::from_status(status, err.url().map(|u| u.as_str()).unwrap_or_default());
        }
        Self::Transient(err.to_string())
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: reqwest::StatusCode, url: &str) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Self::RateLimited(format!("{} for {}", status, url))
        } else if status.is_server_error() {
            Self::Transient(format!("{} for {}", status, url))
        } else {
            Self::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }
        }
    }
}
