//! `gradscout-ingest applications` command implementation
//!
//! Sequential variant without profile fetches; pauses between pages.

use crate::config::IngestConfig;
use crate::error::Result;
use crate::pipeline::{ApplicationPipeline, RunSummary};
use crate::projector::APPLICATION_HEADER;
use crate::sink::CsvSink;
use crate::subjects::{load_subjects, SubjectColumns};
use crate::upstream::UpstreamClient;
use std::path::Path;

pub async fn run(
    config: &IngestConfig,
    input: &Path,
    output: &Path,
    show_progress: bool,
) -> Result<RunSummary> {
    config.require_token()?;

    let load = load_subjects(input, &SubjectColumns::default())?;
    let client = UpstreamClient::new(config.upstream.clone())?;
    let pipeline =
        ApplicationPipeline::new(client, config.pagination.clone()).with_progress(show_progress);

    let mut sink = CsvSink::create(output, &APPLICATION_HEADER)?;
    let summary = pipeline.run(&load.subjects, &mut sink).await?;

    super::print_summary(&summary, output);
    Ok(summary)
}
