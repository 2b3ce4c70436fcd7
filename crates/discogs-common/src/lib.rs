//! Discogs Load Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared plumbing for the discogs-load workspace members:
//!
//! - **Error Handling**: `CommonError` and the `Result` alias
//! - **Environment**: typed lookups of environment variables
//! - **Logging**: `tracing` subscriber initialisation
//!
//! # Example
//!
//! ```no_run
//! use discogs_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod env;
pub mod error;
pub mod logging;

pub use error::{CommonError, Result};
