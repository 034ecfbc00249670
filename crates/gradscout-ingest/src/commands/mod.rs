//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function.

pub mod applications;
pub mod context;
pub mod directory;
pub mod profiles;
pub mod rankings;

use crate::pipeline::RunSummary;
use colored::Colorize;
use std::path::Path;

/// Print the end-of-run report shared by the extraction commands
pub(crate) fn print_summary(summary: &RunSummary, output: &Path) {
    println!("{}", "Summary:".cyan().bold());
    println!("  Run:             {}", summary.run_id);
    println!("  Subjects:        {}", summary.subjects.len());
    println!("  Pages:           {}", summary.pages());
    println!("  Rows written:    {}", summary.rows);
    if summary.detail_requests > 0 {
        println!("  Profile fetches: {}", summary.detail_requests);
    }
    if summary.failed_tasks() > 0 {
        println!("  Failed tasks:    {}", summary.failed_tasks().to_string().yellow());
    }
    if summary.failed_subjects() > 0 {
        println!(
            "  Stopped early:   {}",
            summary.failed_subjects().to_string().yellow()
        );
    }
    println!("  Output:          {}", output.display().to_string().green());
}
