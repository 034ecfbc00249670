//! `gradscout-ingest profiles` command implementation
//!
//! Full fan-out extraction: one row per application, with profile details.

use crate::config::IngestConfig;
use crate::detail::DetailFetcher;
use crate::error::Result;
use crate::pipeline::{ProfilePipeline, RunSummary};
use crate::projector::HEADER;
use crate::retry::RetryPolicy;
use crate::sink::CsvSink;
use crate::subjects::{load_subjects, SubjectColumns};
use crate::upstream::UpstreamClient;
use std::path::Path;
use std::sync::Arc;

pub async fn run(
    config: &IngestConfig,
    input: &Path,
    output: &Path,
    show_progress: bool,
) -> Result<RunSummary> {
    config.require_token()?;

    let load = load_subjects(input, &SubjectColumns::default())?;
    let client = Arc::new(UpstreamClient::new(config.upstream.clone())?);
    let fetcher = DetailFetcher::new(
        Arc::clone(&client),
        config.resilience.detail_cache_size,
        RetryPolicy::new(config.resilience.max_attempts, config.backoff_base()),
    );
    let pipeline = ProfilePipeline::new(client, fetcher, config.pagination.clone())
        .with_progress(show_progress);

    let mut sink = CsvSink::create(output, &HEADER)?;
    let summary = pipeline.run(&load.subjects, &mut sink).await?;

    super::print_summary(&summary, output);
    Ok(summary)
}
