//! `gradscout-ingest rankings` command implementation

use crate::config::IngestConfig;
use crate::directory::{collect_rankings, DirectoryReport, RANKINGS_HEADER};
use crate::error::Result;
use crate::sink::CsvSink;
use crate::upstream::UpstreamClient;
use colored::Colorize;
use std::path::Path;

/// Collect the ranked program list into `output`
pub async fn run(config: &IngestConfig, output: &Path, pages: u32) -> Result<DirectoryReport> {
    let client = UpstreamClient::new(config.upstream.clone())?;
    let mut sink = CsvSink::create(output, &RANKINGS_HEADER)?;

    let report = collect_rankings(&client, pages, &mut sink).await?;

    println!(
        "{} {} ranked programs written to {}",
        "✓".green(),
        report.entries,
        output.display()
    );
    if !report.failed_pages.is_empty() {
        println!("{} Skipped pages: {:?}", "!".yellow(), report.failed_pages);
    }
    Ok(report)
}
