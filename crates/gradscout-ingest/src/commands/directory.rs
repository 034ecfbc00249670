//! `gradscout-ingest directory` command implementation

use crate::config::IngestConfig;
use crate::directory::{collect_directory, DirectoryReport, DIRECTORY_HEADER};
use crate::error::Result;
use crate::sink::CsvSink;
use crate::upstream::UpstreamClient;
use colored::Colorize;
use std::path::Path;

/// Collect the university directory into `output`
pub async fn run(
    config: &IngestConfig,
    output: &Path,
    pages: u32,
    page_size: u32,
) -> Result<DirectoryReport> {
    let client = UpstreamClient::new(config.upstream.clone())?;
    let mut sink = CsvSink::create(output, &DIRECTORY_HEADER)?;

    let report = collect_directory(&client, pages, page_size, &mut sink).await?;

    println!(
        "{} {} universities written to {}",
        "✓".green(),
        report.entries,
        output.display()
    );
    if !report.failed_pages.is_empty() {
        println!(
            "{} Skipped pages: {:?}",
            "!".yellow(),
            report.failed_pages
        );
    }
    Ok(report)
}
