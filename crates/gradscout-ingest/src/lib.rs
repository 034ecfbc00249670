//! Gradscout Ingest Library
//!
//! Paginated fan-out extraction of admitted-student profiles.
//!
//! # Overview
//!
//! For every subject (university) in an input list, the pipeline pages through
//! the upstream listing, expands each page into one task per application,
//! resolves each task's profile through a deduplicating detail fetcher on a
//! bounded worker pool, and writes one flat CSV row per application.
//!
//! - **Pagination**: [`pagination::PageIterator`] stops on an empty page, an
//!   upstream error or the page ceiling
//! - **Fan-out**: [`executor::FanOutExecutor`] runs a page's tasks with a
//!   worker bound and yields them in completion order
//! - **Deduplication**: [`detail::DetailFetcher`] fetches each username once
//!   per run through [`cache::ResultCache`]
//! - **Projection**: [`projector::RecordProjector`] flattens profiles into
//!   [`projector::OutputRow`]s
//! - **Context lookups**: [`lookup::RateLimitedLookup`] throttles and retries
//!   an opaque text lookup, cached per college by [`context::CollegeContext`]

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod cache;
pub mod commands;
pub mod config;
pub mod context;
pub mod detail;
pub mod directory;
pub mod error;
pub mod executor;
pub mod lookup;
pub mod pagination;
pub mod pipeline;
pub mod progress;
pub mod projector;
pub mod retry;
pub mod sink;
pub mod subjects;
pub mod types;
pub mod upstream;

pub use config::IngestConfig;
pub use error::{IngestError, Result};
pub use pipeline::{ApplicationPipeline, ProfilePipeline, RunSummary};

use clap::{Parser, Subcommand};
use config::TaskFailurePolicy;
use std::path::PathBuf;

/// Gradscout - admitted-student profile extraction
#[derive(Parser, Debug)]
#[command(name = "gradscout-ingest")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Hide the progress bar
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Listing page size
    #[arg(long, global = true)]
    pub page_size: Option<u32>,

    /// Maximum pages requested per subject
    #[arg(long, global = true)]
    pub max_pages: Option<u32>,

    /// Concurrent detail fetches per page
    #[arg(long, global = true)]
    pub max_workers: Option<usize>,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration
    pub fn apply_overrides(&self, config: &mut IngestConfig) {
        if let Some(page_size) = self.page_size {
            config.pagination.page_size = page_size;
        }
        if let Some(max_pages) = self.max_pages {
            config.pagination.max_pages = max_pages;
        }
        if let Some(max_workers) = self.max_workers {
            config.pagination.max_workers = max_workers;
        }
        if let Commands::Profiles {
            on_task_failure: Some(policy),
            ..
        } = &self.command
        {
            config.pagination.task_failure_policy = *policy;
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract one row per application with profile details
    Profiles {
        /// Subject list (university_id plus name or university_name)
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV
        #[arg(short, long, default_value = "final_pp.csv")]
        output: PathBuf,

        /// What to do when a profile fetch fails (abort-subject, skip-row)
        #[arg(long)]
        on_task_failure: Option<TaskFailurePolicy>,
    },

    /// Extract student and university ids without profile details
    Applications {
        /// Subject list (university_id plus name or university_name)
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV
        #[arg(short, long, default_value = "student_university_results.csv")]
        output: PathBuf,
    },

    /// Collect the university list used as subject input
    Directory {
        /// Output CSV
        #[arg(short, long, default_value = "universities.csv")]
        output: PathBuf,

        /// Number of directory pages to fetch
        #[arg(long, default_value_t = config::DEFAULT_DIRECTORY_PAGES)]
        pages: u32,

        /// Entries per directory page
        #[arg(long, default_value_t = config::DEFAULT_DIRECTORY_PAGE_SIZE)]
        page_size: u32,
    },

    /// Collect the public graduate program rankings
    Rankings {
        /// Output CSV
        #[arg(short, long, default_value = "top_computer_science_schools.csv")]
        output: PathBuf,

        /// Number of ranking pages to fetch
        #[arg(long, default_value_t = config::DEFAULT_RANKINGS_PAGES)]
        pages: u32,
    },

    /// Print admission context for a college program
    Context {
        /// College name
        #[arg(long)]
        name: String,

        /// Program name
        #[arg(long)]
        program: String,

        /// Department
        #[arg(long)]
        department: Option<String>,

        /// Extra keywords (repeatable)
        #[arg(long = "keyword")]
        keywords: Vec<String>,
    },
}
