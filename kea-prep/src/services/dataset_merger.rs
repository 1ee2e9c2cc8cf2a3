//! Merge per-track feature tables into one dataset
//!
//! `bextract` writes one table per track. The merged dataset keeps a single
//! header block, copied verbatim from the first valid file, followed by the
//! body of every valid file in file-name order.

use crate::format::{raw_lines, TableProfile};
use crate::services::record_validator::{RecordValidator, RejectReason, Validation};
use kea_common::{Error, Reporter, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Merge statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub output: PathBuf,
    /// Files whose body was appended
    pub merged: usize,
    /// Files moved to `empty/`
    pub rejected_empty: usize,
    /// Files moved to `invalid/`
    pub rejected_invalid: usize,
}

impl MergeReport {
    pub fn rejected(&self) -> usize {
        self.rejected_empty + self.rejected_invalid
    }
}

/// Dataset merger
pub struct DatasetMerger<'a> {
    profile: &'a TableProfile,
    reporter: &'a Reporter,
}

impl<'a> DatasetMerger<'a> {
    pub fn new(profile: &'a TableProfile, reporter: &'a Reporter) -> Self {
        Self { profile, reporter }
    }

    /// Merge every valid feature file in `input_dir` into `output_path`
    pub fn merge(&self, input_dir: &Path, output_path: &Path) -> Result<MergeReport> {
        self.reporter.success("Preprocessing ARFFs");
        if !input_dir.is_dir() {
            return Err(Error::InvalidPath(input_dir.to_path_buf()));
        }

        let candidates = list_feature_files(input_dir)?;
        tracing::debug!(
            dir = %input_dir.display(),
            count = candidates.len(),
            "Feature files discovered"
        );

        let report = match self.merge_files(&candidates, output_path) {
            Ok(report) => report,
            Err(e) => {
                self.reporter.end_progress();
                if output_path.exists() {
                    if let Err(cleanup) = fs::remove_file(output_path) {
                        tracing::warn!(
                            "Could not remove partial merge output {}: {}",
                            output_path.display(),
                            cleanup
                        );
                    }
                }
                return Err(e);
            }
        };

        if report.rejected() > 0 {
            self.reporter.warning(format!(
                "{} invalid ARFF found ({} empty, {} identifier mismatch)",
                report.rejected(),
                report.rejected_empty,
                report.rejected_invalid
            ));
        }
        if report.merged == 0 {
            self.reporter.warning(format!(
                "No valid feature file in {}; merged dataset is empty",
                input_dir.display()
            ));
        }
        self.reporter.success(format!(
            "Preprocessing done: {} files merged into {}",
            report.merged,
            output_path.display()
        ));
        Ok(report)
    }

    fn merge_files(&self, candidates: &[PathBuf], output_path: &Path) -> Result<MergeReport> {
        let validator = RecordValidator::new(self.profile);
        let mut out = BufWriter::new(File::create(output_path)?);
        let mut report = MergeReport {
            output: output_path.to_path_buf(),
            ..MergeReport::default()
        };
        let mut header_written = false;

        for (idx, candidate) in candidates.iter().enumerate() {
            self.reporter.progress("Analysing file", idx + 1, candidates.len());

            let path = match validator.validate(candidate)? {
                Validation::Valid(path) => path,
                Validation::Rejected { reason, quarantined } => {
                    match reason {
                        RejectReason::TooSmall { .. } => report.rejected_empty += 1,
                        RejectReason::IdentifierMismatch { .. } => report.rejected_invalid += 1,
                        // Vanished between listing and validation
                        RejectReason::NotFound => {}
                    }
                    tracing::debug!(
                        file = %candidate.display(),
                        reason = ?reason,
                        moved_to = ?quarantined,
                        "Feature file rejected"
                    );
                    continue;
                }
            };

            self.append_record(&path, &mut out, !header_written)?;
            header_written = true;
            report.merged += 1;
        }
        out.flush()?;
        self.reporter.end_progress();
        Ok(report)
    }

    /// Copy the body of `path` (and its header when `with_header`) to `out`
    fn append_record<W: Write>(&self, path: &Path, out: &mut W, with_header: bool) -> Result<()> {
        let mut header_seen = 0;
        for (idx, line) in raw_lines(path)?.enumerate() {
            let line = line?;
            let in_header = idx < self.profile.header_lines;
            if in_header {
                header_seen += 1;
                if !with_header {
                    continue;
                }
            }
            out.write_all(&line)?;
            if !line.ends_with(b"\n") {
                out.write_all(b"\n")?;
            }
        }
        if with_header && header_seen < self.profile.header_lines {
            self.reporter.warning(format!(
                "{} has only {} of {} header lines",
                path.display(),
                header_seen,
                self.profile.header_lines
            ));
        }
        Ok(())
    }
}

/// Regular files (or links to them) directly inside `dir`, sorted by file name
///
/// Subdirectories (including quarantine directories) are not descended.
pub fn list_feature_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        match entry {
            Ok(entry) => {
                if entry.path().is_file() {
                    files.push(entry.into_path());
                }
            }
            Err(e) => {
                tracing::warn!("Error accessing entry: {}", e);
            }
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn profile() -> TableProfile {
        TableProfile {
            header_lines: 4,
            relation_line: 1,
            label_declaration_line: 3,
            identifier_line_index: 2,
            min_file_bytes: 64,
            ..TableProfile::default()
        }
    }

    fn header(id: &str) -> String {
        format!(
            "@relation {id}\n\
             @attribute Mean_Acc1000_Mean_Mem20_Centroid_Power_powerFFT real\n\
             @attribute output {{{id}_track.wav}}\n\
             @data\n"
        )
    }

    fn write_record(dir: &Path, id: &str, value: &str) {
        let content = format!("{}% {id}.wav\n{value},{id}_track.wav\n", header(id));
        fs::write(dir.join(format!("{id}.arff")), content).unwrap();
    }

    #[test]
    fn test_merge_keeps_one_header_and_all_bodies_in_name_order() {
        let dir = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        write_record(dir.path(), "USRC17607839", "0.3");
        write_record(dir.path(), "GBAYE0601498", "0.1");
        write_record(dir.path(), "FRZ039800212", "0.2");

        let output = out_dir.path().join("merged.arff");
        let reporter = Reporter::quiet();
        let report = DatasetMerger::new(&profile(), &reporter)
            .merge(dir.path(), &output)
            .unwrap();

        assert_eq!(report.merged, 3);
        assert_eq!(report.rejected(), 0);

        let merged = fs::read_to_string(&output).unwrap();
        let expected = format!(
            "{}% FRZ039800212.wav\n0.2,FRZ039800212_track.wav\n\
             % GBAYE0601498.wav\n0.1,GBAYE0601498_track.wav\n\
             % USRC17607839.wav\n0.3,USRC17607839_track.wav\n",
            header("FRZ039800212")
        );
        assert_eq!(merged, expected);
        assert_eq!(merged.matches("@relation").count(), 1);
    }

    #[test]
    fn test_merge_skips_and_counts_rejected_files() {
        let dir = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        write_record(dir.path(), "GBAYE0601498", "0.1");
        fs::write(dir.path().join("AAAAA0000001.arff"), "tiny\n").unwrap();
        // Header claims a different track than the file name
        fs::write(
            dir.path().join("ZZZZZ0000009.arff"),
            format!("{}0.9,GBAYE0601498_track.wav\n", header("GBAYE0601498")),
        )
        .unwrap();

        let output = out_dir.path().join("merged.arff");
        let reporter = Reporter::quiet();
        let report = DatasetMerger::new(&profile(), &reporter)
            .merge(dir.path(), &output)
            .unwrap();

        assert_eq!(report.merged, 1);
        assert_eq!(report.rejected_empty, 1);
        assert_eq!(report.rejected_invalid, 1);
        assert_eq!(reporter.warning_count(), 1);
        assert!(dir.path().join("empty/AAAAA0000001.arff").exists());
        assert!(dir.path().join("invalid/ZZZZZ0000009.arff").exists());

        // Header comes from the first *valid* file
        let merged = fs::read_to_string(&output).unwrap();
        assert!(merged.starts_with(&header("GBAYE0601498")));
        assert!(!merged.contains("0.9,"));
    }

    #[test]
    fn test_merge_terminates_unterminated_last_line() {
        let dir = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        for id in ["GBAYE0601498", "USRC17607839"] {
            let content = format!("{}0.5,{id}_track.wav", header(id));
            fs::write(dir.path().join(format!("{id}.arff")), content).unwrap();
        }

        let output = out_dir.path().join("merged.arff");
        let reporter = Reporter::quiet();
        DatasetMerger::new(&profile(), &reporter)
            .merge(dir.path(), &output)
            .unwrap();

        let merged = fs::read_to_string(&output).unwrap();
        assert!(merged.ends_with("0.5,GBAYE0601498_track.wav\n0.5,USRC17607839_track.wav\n"));
    }

    #[test]
    fn test_merge_missing_dir_is_invalid_path() {
        let out_dir = TempDir::new().unwrap();
        let reporter = Reporter::quiet();
        let err = DatasetMerger::new(&profile(), &reporter)
            .merge(
                &out_dir.path().join("missing"),
                &out_dir.path().join("merged.arff"),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPath(_)));
    }

    #[test]
    fn test_merge_quarantines_binary_file_and_keeps_bytes() {
        let dir = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        write_record(dir.path(), "GBAYE0601498", "0.1");
        let mut latin1 = header("USRC17607839").into_bytes();
        latin1.extend_from_slice(b"% Beyonc\xe9 - Halo.wav\n0.2,USRC17607839_track.wav\n");
        fs::write(dir.path().join("USRC17607839.arff"), &latin1).unwrap();
        fs::write(dir.path().join("ZZZZZ0000009.arff"), vec![0xFFu8; 9000]).unwrap();

        let output = out_dir.path().join("merged.arff");
        let reporter = Reporter::quiet();
        let report = DatasetMerger::new(&profile(), &reporter)
            .merge(dir.path(), &output)
            .unwrap();

        assert_eq!(report.merged, 2);
        assert_eq!(report.rejected_invalid, 1);
        assert!(dir.path().join("invalid/ZZZZZ0000009.arff").exists());

        let merged = fs::read(&output).unwrap();
        assert!(merged.ends_with(b"% Beyonc\xe9 - Halo.wav\n0.2,USRC17607839_track.wav\n"));
    }

    #[test]
    fn test_failed_merge_removes_partial_output() {
        let dir = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        write_record(dir.path(), "GBAYE0601498", "0.1");

        // Output inside a missing directory cannot be created
        let output = out_dir.path().join("missing").join("merged.arff");
        let reporter = Reporter::quiet();
        let err = DatasetMerger::new(&profile(), &reporter)
            .merge(dir.path(), &output)
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(!output.exists());
        // Validation never ran, so nothing was moved
        assert!(dir.path().join("GBAYE0601498.arff").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_merge_follows_symlinked_records() {
        let dir = TempDir::new().unwrap();
        let store = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        write_record(store.path(), "GBAYE0601498", "0.1");
        std::os::unix::fs::symlink(
            store.path().join("GBAYE0601498.arff"),
            dir.path().join("GBAYE0601498.arff"),
        )
        .unwrap();

        let output = out_dir.path().join("merged.arff");
        let reporter = Reporter::quiet();
        let report = DatasetMerger::new(&profile(), &reporter)
            .merge(dir.path(), &output)
            .unwrap();
        assert_eq!(report.merged, 1);
        assert!(fs::read_to_string(&output)
            .unwrap()
            .ends_with("0.1,GBAYE0601498_track.wav\n"));
    }

    #[test]
    fn test_list_ignores_subdirectories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("invalid")).unwrap();
        fs::write(dir.path().join("invalid/old.arff"), "x").unwrap();
        fs::write(dir.path().join("b.arff"), "x").unwrap();
        fs::write(dir.path().join("a.arff"), "x").unwrap();

        let files = list_feature_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.arff", "b.arff"]);
    }
}
