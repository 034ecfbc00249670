//! `gradscout-ingest context` command implementation

use crate::config::IngestConfig;
use crate::context::{CollegeContext, CollegeInfo};
use crate::error::{IngestError, Result};
use crate::lookup::{HttpLookup, RateLimitedLookup};
use reqwest::Client;

/// Look up and print context for one college program
pub async fn run(config: &IngestConfig, info: CollegeInfo) -> Result<String> {
    let mut builder = Client::builder();
    if let Some(timeout) = config.http_timeout() {
        builder = builder.timeout(timeout);
    }
    let client = builder
        .build()
        .map_err(|e| IngestError::config(format!("failed to build HTTP client: {}", e)))?;

    let lookup = RateLimitedLookup::new(
        HttpLookup::new(client, config.upstream.lookup_url.clone()),
        config.lookup_interval(),
        config.resilience.max_attempts,
    );
    let context = CollegeContext::new(lookup, config.resilience.lookup_cache_size);

    let text = context.context_for(&info).await;
    println!("{}", text);
    Ok(text)
}
