//! Gradscout Ingest - Main entry point

use anyhow::Context;
use clap::Parser;
use gradscout_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use gradscout_ingest::context::CollegeInfo;
use gradscout_ingest::{commands, Cli, Commands, IngestConfig};
use tracing::error;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Progress bar and log lines share the terminal, so stay at warn unless asked
    let log_config = LogConfig::builder()
        .level(if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Warn
        })
        .output(LogOutput::Console)
        .log_file_prefix("gradscout-ingest")
        .build()
        .merge_env()
        .context("Invalid logging configuration")?;
    let _guard = init_logging(&log_config).context("Failed to initialize logging")?;

    let result = execute(&cli).await;
    if let Err(e) = &result {
        error!(error = %e, "Command failed");
    }
    result
}

async fn execute(cli: &Cli) -> anyhow::Result<()> {
    let mut config = IngestConfig::from_env().context("Failed to load configuration")?;
    cli.apply_overrides(&mut config);
    config.validate().context("Invalid configuration")?;

    let show_progress = !cli.quiet && !cli.verbose;

    match &cli.command {
        Commands::Profiles { input, output, .. } => {
            commands::profiles::run(&config, input, output, show_progress)
                .await
                .context("Profile extraction failed")?;
        },
        Commands::Applications { input, output } => {
            commands::applications::run(&config, input, output, show_progress)
                .await
                .context("Application extraction failed")?;
        },
        Commands::Directory {
            output,
            pages,
            page_size,
        } => {
            commands::directory::run(&config, output, *pages, *page_size)
                .await
                .context("Directory collection failed")?;
        },
        Commands::Rankings { output, pages } => {
            commands::rankings::run(&config, output, *pages)
                .await
                .context("Rankings collection failed")?;
        },
        Commands::Context {
            name,
            program,
            department,
            keywords,
        } => {
            let mut info = CollegeInfo::new(name, program);
            if let Some(department) = department {
                info = info.with_department(department);
            }
            if !keywords.is_empty() {
                info = info.with_keywords(keywords.clone());
            }
            commands::context::run(&config, info).await?;
        },
    }

    Ok(())
}
