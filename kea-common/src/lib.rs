//! # kea Common Library
//!
//! Shared code for the kea feature preparation tools:
//! - Error taxonomy (`Error`, `Result`)
//! - TOML configuration loading
//! - Reporting collaborator (verbosity, warning counts, progress)
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod report;
pub mod time;

pub use error::{Error, Result};
pub use report::{Reporter, ReporterConfig};
