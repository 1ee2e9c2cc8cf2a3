//! Feature file validation with quarantine
//!
//! A `bextract` export is usable only if it is complete and belongs to the
//! track its file name claims. Rejected files are moved (never deleted) into
//! an `empty/` or `invalid/` directory next to them for manual inspection.

use crate::format::{raw_lines, TableProfile};
use kea_common::Result;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

/// Quarantine directory for undersized exports
pub const EMPTY_DIR: &str = "empty";
/// Quarantine directory for identifier mismatches
pub const INVALID_DIR: &str = "invalid";

/// Why a feature file was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Not an existing regular file
    NotFound,
    /// Smaller than the profile's minimum size
    TooSmall { size: u64 },
    /// File name and embedded header identifier disagree
    IdentifierMismatch {
        filename: String,
        header: Option<String>,
    },
}

/// Validation outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// Absolute path of a usable file, left in place
    Valid(PathBuf),
    /// Rejected file and where it was moved (if it was)
    Rejected {
        reason: RejectReason,
        quarantined: Option<PathBuf>,
    },
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid(_))
    }
}

/// Record validator
pub struct RecordValidator<'a> {
    profile: &'a TableProfile,
}

impl<'a> RecordValidator<'a> {
    pub fn new(profile: &'a TableProfile) -> Self {
        Self { profile }
    }

    /// Validate one feature file, quarantining it on structural rejection
    ///
    /// Only I/O failures while reading or moving the file are errors.
    pub fn validate(&self, path: &Path) -> Result<Validation> {
        let metadata = match fs::metadata(path) {
            Ok(m) if m.is_file() => m,
            _ => {
                tracing::debug!(path = %path.display(), "Not a regular file");
                return Ok(Validation::Rejected {
                    reason: RejectReason::NotFound,
                    quarantined: None,
                });
            }
        };
        let path = absolute_path(path)?;

        let size = metadata.len();
        if size < self.profile.min_file_bytes {
            let moved = quarantine(&path, EMPTY_DIR)?;
            tracing::debug!(
                path = %path.display(),
                size,
                min = self.profile.min_file_bytes,
                "Feature file too small, quarantined"
            );
            return Ok(Validation::Rejected {
                reason: RejectReason::TooSmall { size },
                quarantined: Some(moved),
            });
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let filename_id = self.profile.filename_identifier(&file_name);
        let header_id = self.read_header_identifier(&path)?;

        if header_id.as_deref() != Some(filename_id.as_str()) {
            let moved = quarantine(&path, INVALID_DIR)?;
            tracing::debug!(
                path = %path.display(),
                filename_id = %filename_id,
                header_id = ?header_id,
                "Identifier mismatch, quarantined"
            );
            return Ok(Validation::Rejected {
                reason: RejectReason::IdentifierMismatch {
                    filename: filename_id,
                    header: header_id,
                },
                quarantined: Some(moved),
            });
        }

        Ok(Validation::Valid(path))
    }

    /// Identifier token from the profile's identifier line, if the file has one
    ///
    /// A line that is not UTF-8 carries no identifier.
    fn read_header_identifier(&self, path: &Path) -> Result<Option<String>> {
        let target = self.profile.identifier_line_index;
        for (idx, line) in raw_lines(path)?.enumerate() {
            let line = line?;
            if idx == target {
                return Ok(std::str::from_utf8(&line)
                    .ok()
                    .and_then(|text| self.profile.header_identifier(text)));
            }
        }
        Ok(None)
    }
}

/// Absolute form of `path` with its directory resolved
///
/// The file itself is not resolved, so a symlinked export is validated and
/// quarantined as the link.
fn absolute_path(path: &Path) -> Result<PathBuf> {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            Ok(parent.canonicalize()?.join(name))
        }
        _ => Ok(path.canonicalize()?),
    }
}

/// Move `path` into `<parent>/<dir_name>/`, creating the directory if needed
///
/// An earlier quarantined file of the same name is kept; the new one gets a
/// `.1`, `.2`, ... suffix.
fn quarantine(path: &Path, dir_name: &str) -> Result<PathBuf> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let target_dir = parent.join(dir_name);
    fs::create_dir_all(&target_dir)?;

    let file_name = path.file_name().unwrap_or(path.as_os_str());
    let target = free_target(&target_dir, file_name);
    fs::rename(path, &target)?;
    Ok(target)
}

fn free_target(dir: &Path, file_name: &OsStr) -> PathBuf {
    let target = dir.join(file_name);
    if !target.exists() {
        return target;
    }
    (1u32..)
        .map(|n| {
            let mut name = file_name.to_os_string();
            name.push(format!(".{}", n));
            dir.join(name)
        })
        .find(|candidate| !candidate.exists())
        .unwrap_or(target)
}
