//! Build automation tasks for gradscout
//!
//! Currently renders the CLI reference from the clap definitions so the
//! documented flags cannot drift from the binary.

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for gradscout", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference as markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<gradscout_ingest::Cli>();

    let content = format!(
        r#"# gradscout-ingest CLI Reference

Generated from the CLI source code on {}.

## Configuration

Every network command reads `GRADSCOUT_*` variables from the environment or a
`.env` file. `GRADSCOUT_API_TOKEN` is required by `profiles` and
`applications`. Logging is controlled with `LOG_LEVEL`, `LOG_OUTPUT`,
`LOG_FORMAT` and `LOG_DIR`.

## Typical Run

```bash
# Build the subject list
gradscout-ingest directory --output universities.csv

# Extract one row per admitted application
gradscout-ingest profiles --input universities.csv --output final_pp.csv
```

## Commands

{}

---

*Regenerate with `cargo run --manifest-path xtask/Cargo.toml -- generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("Generated CLI documentation at: {}", file_path.display());

    Ok(())
}
