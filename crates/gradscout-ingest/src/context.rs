//! College/program context enrichment
//!
//! Combines the lookup cache and the rate-limited lookup: repeated requests for
//! the same college and program are answered from memory, and only first-time
//! subjects go out to the search backend.

use crate::cache::{cache_key, ResultCache};
use crate::lookup::{Lookup, RateLimitedLookup};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// The subject a context lookup is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollegeInfo {
    pub name: String,
    pub program: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
}

impl CollegeInfo {
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            department: None,
            keywords: None,
        }
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = Some(keywords);
        self
    }

    /// Normalized cache identity
    pub fn cache_key(&self) -> String {
        let keywords = self.keywords.as_ref().map(|k| k.join(","));
        cache_key([
            Some(self.name.as_str()),
            Some(self.program.as_str()),
            self.department.as_deref(),
            keywords.as_deref(),
        ])
    }

    /// Search query sent to the lookup backend
    pub fn search_query(&self) -> String {
        format!(
            "{} {} {} graduate program requirements admission criteria",
            self.name,
            self.program,
            self.department.as_deref().unwrap_or_default()
        )
    }
}

/// Cached, throttled context provider
pub struct CollegeContext<L> {
    cache: ResultCache<String>,
    lookup: RateLimitedLookup<L>,
}

impl<L: Lookup> CollegeContext<L> {
    pub fn new(lookup: RateLimitedLookup<L>, cache_size: usize) -> Self {
        Self {
            cache: ResultCache::bounded(cache_size),
            lookup,
        }
    }

    /// Context text for `info`, looked up at most once while cached
    pub async fn context_for(&self, info: &CollegeInfo) -> String {
        let key = info.cache_key();
        if self.cache.contains_key(&key) {
            debug!(key = %key, "Context served from cache");
        }

        self.cache
            .get_or_compute(&key, || async {
                info!(college = %info.name, program = %info.program, "Looking up college context");
                self.lookup.run(&info.search_query()).await
            })
            .await
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }
}
