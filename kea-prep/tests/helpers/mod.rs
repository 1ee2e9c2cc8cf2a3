//! Test Helper Utilities
//!
//! Shared fixtures for kea-prep integration tests

#![allow(dead_code)]

pub mod arff_generator;

pub use arff_generator::{
    body, header_block, identifier, write_export, write_mismatched_export,
    write_truncated_export, FEATURE_COUNT,
};

use std::path::Path;

/// Data rows (non-header, non-comment, non-blank) of a table
pub fn data_rows(content: &str, header_lines: usize) -> Vec<String> {
    content
        .lines()
        .skip(header_lines)
        .filter(|l| !l.trim().is_empty() && !l.starts_with('%'))
        .map(str::to_string)
        .collect()
}

/// Read a file's data rows
pub fn read_data_rows(path: &Path, header_lines: usize) -> Vec<String> {
    data_rows(&std::fs::read_to_string(path).unwrap(), header_lines)
}
