//! gradscout Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared setup used by the gradscout binaries.
//!
//! - **Logging**: `tracing` subscriber configuration (console, rolling file, JSON)
//!
//! # Example
//!
//! ```no_run
//! use gradscout_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     Ok(())
//! }
//! ```

pub mod logging;
