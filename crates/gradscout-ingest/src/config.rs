//! Configuration for extraction runs
//!
//! Values come from `DEFAULT_*` constants, then a `.env` file and environment
//! variables, then command-line overrides applied by the binary.

use crate::error::{IngestError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Upstream Endpoint Defaults
// ============================================================================

/// Listing endpoint paginated per subject
pub const DEFAULT_LISTING_URL: &str =
    "https://api.yocket.com/connect/filter/v2/53c05359-a796-4381-9f9a-44e7ad00bf1f";

/// Detail endpoint; `{username}` is substituted per fetch
pub const DEFAULT_PROFILE_URL_TEMPLATE: &str = "https://api.yocket.com/users/profile/{username}/1";

/// Directory endpoint listing universities
pub const DEFAULT_DIRECTORY_URL: &str = "https://api.yocket.com/explore/list";

/// Ranked program search; `_page` is appended per request
pub const DEFAULT_RANKINGS_URL: &str =
    "https://www.usnews.com/best-graduate-schools/api/search?format=json&program=top-computer-science-schools";

/// Text lookup endpoint used for college context
pub const DEFAULT_LOOKUP_URL: &str = "https://html.duckduckgo.com/html/";

/// Fixed listing filters in query-string form
pub const DEFAULT_LISTING_FILTERS: &str =
    "application_status=6,7&course_taxonomy_id=23989&country_id=1&level=2";

// ============================================================================
// Pagination / Fan-out Defaults
// ============================================================================

pub const DEFAULT_PAGE_SIZE: u32 = 9;
pub const DEFAULT_FIRST_PAGE: u32 = 0;

/// The listing API stops serving results after 31 pages
pub const DEFAULT_MAX_PAGES: u32 = 31;

pub const DEFAULT_MAX_WORKERS: usize = 10;

/// Pause between pages in the simple (non fan-out) variant
pub const DEFAULT_PAGE_DELAY_MS: u64 = 500;

// ============================================================================
// Retry / Rate-limit / Cache Defaults
// ============================================================================

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 2_000;
pub const DEFAULT_LOOKUP_INTERVAL_MS: u64 = 2_000;
pub const DEFAULT_LOOKUP_CACHE_SIZE: usize = 100;

/// 0 keeps every profile for the run so each username is fetched once
pub const DEFAULT_DETAIL_CACHE_SIZE: usize = 0;

/// 0 leaves the transport default in place
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 0;

pub const DEFAULT_DIRECTORY_PAGES: u32 = 42;
pub const DEFAULT_DIRECTORY_PAGE_SIZE: u32 = 21;
pub const DEFAULT_RANKINGS_PAGES: u32 = 109;

/// What the pipeline does when one fan-out task fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TaskFailurePolicy {
    /// Finish the batch, write its successful rows, then stop paginating the subject
    #[default]
    AbortSubject,
    /// Drop the failed row and keep paginating
    SkipRow,
}

impl std::str::FromStr for TaskFailurePolicy {
    type Err = IngestError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "abort-subject" | "abort" => Ok(Self::AbortSubject),
            "skip-row" | "skip" => Ok(Self::SkipRow),
            other => Err(IngestError::config(format!(
                "unknown task failure policy '{}' (expected abort-subject or skip-row)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for TaskFailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AbortSubject => f.write_str("abort-subject"),
            Self::SkipRow => f.write_str("skip-row"),
        }
    }
}

/// Upstream endpoints and credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Static bearer credential; required for any network command
    #[serde(skip_serializing)]
    pub api_token: Option<String>,
    pub listing_url: String,
    pub profile_url_template: String,
    pub directory_url: String,
    /// Public rankings search; requested without the bearer credential
    pub rankings_url: String,
    pub lookup_url: String,
    /// Extra query parameters sent with every listing request
    pub listing_filters: Vec<(String, String)>,
    pub http_timeout_secs: u64,
}

/// Pagination and fan-out sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    pub page_size: u32,
    pub first_page: u32,
    pub max_pages: u32,
    pub max_workers: usize,
    pub page_delay_ms: u64,
    pub task_failure_policy: TaskFailurePolicy,
}

impl PaginationConfig {
    /// Pause between listing pages in the application variant
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

/// Retry, throttle and cache sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub lookup_interval_ms: u64,
    pub lookup_cache_size: usize,
    pub detail_cache_size: usize,
}

/// Full configuration for a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub upstream: UpstreamConfig,
    pub pagination: PaginationConfig,
    pub resilience: ResilienceConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            upstream: UpstreamConfig {
                api_token: None,
                listing_url: DEFAULT_LISTING_URL.to_string(),
                profile_url_template: DEFAULT_PROFILE_URL_TEMPLATE.to_string(),
                directory_url: DEFAULT_DIRECTORY_URL.to_string(),
                rankings_url: DEFAULT_RANKINGS_URL.to_string(),
                lookup_url: DEFAULT_LOOKUP_URL.to_string(),
                listing_filters: parse_filters(DEFAULT_LISTING_FILTERS),
                http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            },
            pagination: PaginationConfig {
                page_size: DEFAULT_PAGE_SIZE,
                first_page: DEFAULT_FIRST_PAGE,
                max_pages: DEFAULT_MAX_PAGES,
                max_workers: DEFAULT_MAX_WORKERS,
                page_delay_ms: DEFAULT_PAGE_DELAY_MS,
                task_failure_policy: TaskFailurePolicy::default(),
            },
            resilience: ResilienceConfig {
                max_attempts: DEFAULT_MAX_ATTEMPTS,
                backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
                lookup_interval_ms: DEFAULT_LOOKUP_INTERVAL_MS,
                lookup_cache_size: DEFAULT_LOOKUP_CACHE_SIZE,
                detail_cache_size: DEFAULT_DETAIL_CACHE_SIZE,
            },
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl IngestConfig {
    /// Load configuration from `.env`, environment variables and defaults
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let task_failure_policy = match std::env::var("GRADSCOUT_TASK_FAILURE_POLICY") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.pagination.task_failure_policy,
        };

        let listing_filters = std::env::var("GRADSCOUT_LISTING_FILTERS")
            .map(|s| parse_filters(&s))
            .unwrap_or(defaults.upstream.listing_filters);

        let config = Self {
            upstream: UpstreamConfig {
                api_token: std::env::var("GRADSCOUT_API_TOKEN")
                    .ok()
                    .filter(|t| !t.trim().is_empty()),
                listing_url: env_string("GRADSCOUT_LISTING_URL", DEFAULT_LISTING_URL),
                profile_url_template: env_string(
                    "GRADSCOUT_PROFILE_URL_TEMPLATE",
                    DEFAULT_PROFILE_URL_TEMPLATE,
                ),
                directory_url: env_string("GRADSCOUT_DIRECTORY_URL", DEFAULT_DIRECTORY_URL),
                rankings_url: env_string("GRADSCOUT_RANKINGS_URL", DEFAULT_RANKINGS_URL),
                lookup_url: env_string("GRADSCOUT_LOOKUP_URL", DEFAULT_LOOKUP_URL),
                listing_filters,
                http_timeout_secs: env_parse("GRADSCOUT_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS),
            },
            pagination: PaginationConfig {
                page_size: env_parse("GRADSCOUT_PAGE_SIZE", DEFAULT_PAGE_SIZE),
                first_page: env_parse("GRADSCOUT_FIRST_PAGE", DEFAULT_FIRST_PAGE),
                max_pages: env_parse("GRADSCOUT_MAX_PAGES", DEFAULT_MAX_PAGES),
                max_workers: env_parse("GRADSCOUT_MAX_WORKERS", DEFAULT_MAX_WORKERS),
                page_delay_ms: env_parse("GRADSCOUT_PAGE_DELAY_MS", DEFAULT_PAGE_DELAY_MS),
                task_failure_policy,
            },
            resilience: ResilienceConfig {
                max_attempts: env_parse("GRADSCOUT_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS),
                backoff_base_ms: env_parse("GRADSCOUT_BACKOFF_BASE_MS", DEFAULT_BACKOFF_BASE_MS),
                lookup_interval_ms: env_parse(
                    "GRADSCOUT_LOOKUP_INTERVAL_MS",
                    DEFAULT_LOOKUP_INTERVAL_MS,
                ),
                lookup_cache_size: env_parse(
                    "GRADSCOUT_LOOKUP_CACHE_SIZE",
                    DEFAULT_LOOKUP_CACHE_SIZE,
                ),
                detail_cache_size: env_parse(
                    "GRADSCOUT_DETAIL_CACHE_SIZE",
                    DEFAULT_DETAIL_CACHE_SIZE,
                ),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate sizing values
    pub fn validate(&self) -> Result<()> {
        if self.pagination.page_size == 0 {
            return Err(IngestError::config("page_size must be greater than 0"));
        }

        if self.pagination.max_pages == 0 {
            return Err(IngestError::config("max_pages must be greater than 0"));
        }

        if self.pagination.max_workers == 0 {
            return Err(IngestError::config("max_workers must be greater than 0"));
        }

        if self.resilience.max_attempts == 0 {
            return Err(IngestError::config("max_attempts must be greater than 0"));
        }

        if self.resilience.lookup_cache_size == 0 {
            return Err(IngestError::config("lookup_cache_size must be greater than 0"));
        }

        if !self.upstream.profile_url_template.contains("{username}") {
            return Err(IngestError::config(
                "profile_url_template must contain a {username} placeholder",
            ));
        }

        Ok(())
    }

    /// The bearer token, or a configuration error when none was supplied
    pub fn require_token(&self) -> Result<&str> {
        self.upstream
            .api_token
            .as_deref()
            .ok_or_else(|| IngestError::config("GRADSCOUT_API_TOKEN is not set"))
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.resilience.backoff_base_ms)
    }

    pub fn lookup_interval(&self) -> Duration {
        Duration::from_millis(self.resilience.lookup_interval_ms)
    }

    pub fn http_timeout(&self) -> Option<Duration> {
        match self.upstream.http_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Parse `a=1&b=2,3` into ordered key/value pairs
pub fn parse_filters(raw: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(raw.trim().as_bytes())
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = IngestConfig::default();
        config.validate().unwrap();
        assert_eq!(config.pagination.page_size, 9);
        assert_eq!(config.pagination.max_pages, 31);
        assert_eq!(config.pagination.max_workers, 10);
        assert_eq!(config.resilience.lookup_cache_size, 100);
        assert!(config.http_timeout().is_none());
        assert_eq!(config.pagination.page_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_parse_filters_keeps_order_and_commas() {
        let filters = parse_filters(DEFAULT_LISTING_FILTERS);
        assert_eq!(filters[0], ("application_status".to_string(), "6,7".to_string()));
        assert_eq!(filters.len(), 4);
        assert_eq!(filters[3].0, "level");
    }

    #[test]
    fn test_missing_token_is_config_error() {
        let config = IngestConfig::default();
        assert!(matches!(config.require_token(), Err(IngestError::Config(_))));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = IngestConfig::default();
        config.pagination.max_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_template_without_placeholder_rejected() {
        let mut config = IngestConfig::default();
        config.upstream.profile_url_template = "https://example.com/profile".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_task_failure_policy_from_str() {
        assert_eq!(
            "skip-row".parse::<TaskFailurePolicy>().unwrap(),
            TaskFailurePolicy::SkipRow
        );
        assert_eq!(
            "ABORT".parse::<TaskFailurePolicy>().unwrap(),
            TaskFailurePolicy::AbortSubject
        );
        assert!("ignore".parse::<TaskFailurePolicy>().is_err());
    }
}
