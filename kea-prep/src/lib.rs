//! kea-prep library interface
//!
//! Prepares Marsyas `bextract` feature tables for `kea` auto-tagging:
//! validate and merge per-track tables, attach ground-truth labels, and
//! write stratified train/test folds.

pub mod cli;
pub mod format;
pub mod pipeline;
pub mod services;

pub use crate::format::TableProfile;
pub use crate::pipeline::{Pipeline, PipelineConfig, RunSummary};
