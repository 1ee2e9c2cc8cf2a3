//! Stratified k-fold partitioning of a labeled dataset
//!
//! Rows are dealt to folds label by label so every fold receives the same
//! share of each class (within one row). Fold `i` yields a minority file
//! holding only bucket `i` and a majority file holding every other bucket;
//! by default the minority side is the test set.

use crate::format::{
    decode_line, raw_lines, trailing_field, trim_line_ending, FeatureTable, TableProfile,
};
use kea_common::{Error, Reporter, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// File name for the single-fold case (train and test are the same data)
pub const SINGLE_FOLD_FILE: &str = "train_test.arff";

/// Split `number` into `nb_folds` parts differing by at most one
///
/// The first `number % nb_folds` parts receive the remainder. Fails when a
/// fold would be left with no row at all.
pub fn split_number(number: usize, nb_folds: usize) -> Result<Vec<usize>> {
    if nb_folds == 0 {
        return Err(Error::InvalidFoldCount(nb_folds));
    }
    if number < nb_folds {
        return Err(Error::InsufficientRowsForFolds {
            label: String::new(),
            rows: number,
            folds: nb_folds,
        });
    }
    let min_num = number / nb_folds;
    let remainder = number % nb_folds;
    Ok((0..nb_folds)
        .map(|i| if i < remainder { min_num + 1 } else { min_num })
        .collect())
}

/// One train/test file pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldPair {
    pub train: PathBuf,
    pub test: PathBuf,
}

/// Partition result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionReport {
    /// `01_fold` or `NN_folds` directory
    pub directory: PathBuf,
    pub fold_count: usize,
    pub pairs: Vec<FoldPair>,
    /// Rows per label (empty for the single-fold copy)
    pub rows_per_label: BTreeMap<String, usize>,
}

/// Per-label quota and cursor while rows are dealt out
struct LabelQuota {
    remaining: Vec<usize>,
    cursor: usize,
}

impl LabelQuota {
    /// Fold for the next row of this label
    fn take(&mut self) -> Option<usize> {
        while self.cursor < self.remaining.len() && self.remaining[self.cursor] == 0 {
            self.cursor += 1;
        }
        let slot = self.remaining.get_mut(self.cursor)?;
        *slot -= 1;
        Some(self.cursor)
    }
}

/// Fold partitioner
pub struct FoldPartitioner<'a> {
    profile: &'a TableProfile,
    reporter: &'a Reporter,
    output_root: PathBuf,
}

impl<'a> FoldPartitioner<'a> {
    /// Fold directories are created under `output_root`
    pub fn new(profile: &'a TableProfile, reporter: &'a Reporter, output_root: PathBuf) -> Self {
        Self {
            profile,
            reporter,
            output_root,
        }
    }

    /// Partition `labeled_path` into `fold_count` train/test pairs
    ///
    /// `invert` puts the single bucket in the train file and the remaining
    /// buckets in the test file.
    pub fn partition(
        &self,
        labeled_path: &Path,
        fold_count: usize,
        invert: bool,
    ) -> Result<PartitionReport> {
        if fold_count < 1 {
            return Err(Error::InvalidFoldCount(fold_count));
        }
        if !labeled_path.is_file() {
            return Err(Error::InvalidPath(labeled_path.to_path_buf()));
        }

        if fold_count == 1 {
            return self.single_fold(labeled_path);
        }

        self.reporter.success(format!("Generating {} folds", fold_count));

        // First pass: per-label quotas, all checked before anything is written
        let table = FeatureTable::load(labeled_path, self.profile)?;
        let rows_per_label = table.label_counts();
        let mut quotas = HashMap::with_capacity(rows_per_label.len());
        for (label, &rows) in &rows_per_label {
            let remaining = split_number(rows, fold_count).map_err(|e| match e {
                Error::InsufficientRowsForFolds { rows, folds, .. } => {
                    Error::InsufficientRowsForFolds {
                        label: label.clone(),
                        rows,
                        folds,
                    }
                }
                other => other,
            })?;
            tracing::debug!(label = %label, rows, quota = ?remaining, "Fold quota");
            quotas.insert(label.clone(), LabelQuota { remaining, cursor: 0 });
        }

        // Second pass: deal rows (with their leading comments) into buckets
        let (header, buckets) = self.assign_rows(labeled_path, fold_count, &mut quotas)?;

        let directory = self
            .output_root
            .join(format!("{:02}_folds", fold_count));
        match self.write_folds(&directory, &header, &buckets, invert) {
            Ok(pairs) => {
                self.reporter.success(format!(
                    "{} folds written to {}",
                    fold_count,
                    directory.display()
                ));
                Ok(PartitionReport {
                    directory,
                    fold_count,
                    pairs,
                    rows_per_label,
                })
            }
            Err(e) => {
                // Do not leave a half-written fold set behind
                if let Err(cleanup) = fs::remove_dir_all(&directory) {
                    tracing::warn!(
                        "Could not remove partial fold directory {}: {}",
                        directory.display(),
                        cleanup
                    );
                }
                Err(e)
            }
        }
    }

    /// Verbatim copy of the dataset as the shared train/test file
    fn single_fold(&self, labeled_path: &Path) -> Result<PartitionReport> {
        let directory = self.output_root.join("01_fold");
        fs::create_dir_all(&directory)?;
        let target = directory.join(SINGLE_FOLD_FILE);
        fs::copy(labeled_path, &target)?;
        self.reporter
            .success(format!("Single fold written to {}", target.display()));

        Ok(PartitionReport {
            directory,
            fold_count: 1,
            pairs: vec![FoldPair {
                train: target.clone(),
                test: target,
            }],
            rows_per_label: BTreeMap::new(),
        })
    }

    fn assign_rows(
        &self,
        labeled_path: &Path,
        fold_count: usize,
        quotas: &mut HashMap<String, LabelQuota>,
    ) -> Result<(Vec<u8>, Vec<Vec<u8>>)> {
        let mut header = Vec::new();
        let mut buckets = vec![Vec::new(); fold_count];
        let mut pending_comments = Vec::new();

        for (idx, line) in raw_lines(labeled_path)?.enumerate() {
            let mut line = line?;
            if !line.ends_with(b"\n") {
                line.push(b'\n');
            }

            if idx < self.profile.header_lines {
                header.extend_from_slice(&line);
                continue;
            }

            // Same classification as the counting pass in FeatureTable::load
            let decoded = decode_line(&line);
            let row = trim_line_ending(&decoded).trim();
            if row.is_empty() {
                continue;
            }
            if self.profile.is_comment(row) {
                pending_comments.extend_from_slice(&line);
                continue;
            }

            let label = trailing_field(row);
            let fold = quotas
                .get_mut(label)
                .and_then(LabelQuota::take)
                .ok_or_else(|| {
                    Error::Format(format!(
                        "{} line {}: label '{}' changed between passes",
                        labeled_path.display(),
                        idx + 1,
                        label
                    ))
                })?;
            let bucket = &mut buckets[fold];
            bucket.extend_from_slice(&pending_comments);
            bucket.extend_from_slice(&line);
            pending_comments.clear();
        }

        Ok((header, buckets))
    }

    fn write_folds(
        &self,
        directory: &Path,
        header: &[u8],
        buckets: &[Vec<u8>],
        invert: bool,
    ) -> Result<Vec<FoldPair>> {
        fs::create_dir_all(directory)?;
        let mut pairs = Vec::with_capacity(buckets.len());

        for fold in 0..buckets.len() {
            let number = fold + 1;
            let train = directory.join(format!("train_{:02}.arff", number));
            let test = directory.join(format!("test_{:02}.arff", number));
            let (min_path, max_path) = if invert { (&train, &test) } else { (&test, &train) };

            let mut min_file = BufWriter::new(File::create(min_path)?);
            min_file.write_all(header)?;
            min_file.write_all(&buckets[fold])?;
            min_file.flush()?;

            let mut max_file = BufWriter::new(File::create(max_path)?);
            max_file.write_all(header)?;
            for (other, bucket) in buckets.iter().enumerate() {
                if other != fold {
                    max_file.write_all(bucket)?;
                }
            }
            max_file.flush()?;

            tracing::debug!(fold = number, "Fold files written");
            pairs.push(FoldPair { train, test });
        }

        Ok(pairs)
    }
}
