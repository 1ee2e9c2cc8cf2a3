//! End-to-end feature preparation run
//!
//! merge → join → partition → (optional) classify, strictly in sequence.
//! Every stage finishes and closes its output before the next one starts.
//! All paths for one run live under `<analysis_dir>/<input dir name>/`.

use crate::format::TableProfile;
use crate::services::{
    ClassifierInvoker, DatasetMerger, FoldPartitioner, GroundTruthJoiner, JoinOptions,
};
use chrono::{DateTime, Utc};
use kea_common::config::ClassifierConfig;
use kea_common::{time, Error, Reporter, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Merged dataset before labels are attached; removed after the join
pub const INTERMEDIATE_FILE: &str = "feat_without_groundtruth.arff";
pub const SUMMARY_FILE: &str = "run_summary.json";
pub const DEFAULT_INPUT_DIR: &str = "data";
pub const DEFAULT_OUTPUT_FILE: &str = "feat_with_groundtruth.txt";
pub const DEFAULT_GROUNDTRUTH_FILE: &str = "groundtruth.txt";
pub const DEFAULT_ANALYSIS_DIR: &str = "analysis";
pub const DEFAULT_NB_FOLDS: usize = 1;

/// Fully resolved settings for one run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    /// File name of the labeled dataset inside the working directory
    pub output_file: String,
    pub groundtruth_file: PathBuf,
    pub nb_folds: usize,
    pub invert: bool,
    pub analysis_dir: PathBuf,
    /// Root for fold directories (working directory when `None`)
    pub folds_dir: Option<PathBuf>,
    pub join: JoinOptions,
    pub profile: TableProfile,
    pub classifier: ClassifierConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            output_file: DEFAULT_OUTPUT_FILE.to_string(),
            groundtruth_file: PathBuf::from(DEFAULT_GROUNDTRUTH_FILE),
            nb_folds: DEFAULT_NB_FOLDS,
            invert: false,
            analysis_dir: PathBuf::from(DEFAULT_ANALYSIS_DIR),
            folds_dir: None,
            join: JoinOptions::default(),
            profile: TableProfile::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Precondition checks that need no filesystem access
    pub fn validate(&self) -> Result<()> {
        if self.nb_folds < 1 {
            return Err(Error::InvalidFoldCount(self.nb_folds));
        }
        if self.output_file.trim().is_empty()
            || Path::new(&self.output_file).file_name().is_none()
        {
            return Err(Error::Config(format!(
                "output_file '{}' is not a file name",
                self.output_file
            )));
        }
        self.profile.validate()
    }
}

/// One fold as recorded in the run summary
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FoldSummary {
    pub train: PathBuf,
    pub test: PathBuf,
    pub result: Option<PathBuf>,
}

/// What a run produced, written as `run_summary.json`
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub input_dir: PathBuf,
    pub working_dir: PathBuf,
    pub dataset: PathBuf,
    pub files_merged: usize,
    pub files_rejected_empty: usize,
    pub files_rejected_invalid: usize,
    pub rows_written: usize,
    pub rows_dropped: usize,
    pub dropped_identifiers: Vec<String>,
    pub observed_labels: Vec<String>,
    pub fold_count: usize,
    pub folds_directory: PathBuf,
    pub folds: Vec<FoldSummary>,
    pub rows_per_label: BTreeMap<String, usize>,
    pub warnings: usize,
    pub elapsed_ms: u64,
}

/// Pipeline runner
pub struct Pipeline<'a> {
    config: PipelineConfig,
    reporter: &'a Reporter,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: PipelineConfig, reporter: &'a Reporter) -> Self {
        Self { config, reporter }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Working directory for this run: `<analysis_dir>/<input dir name>`
    pub fn working_dir(&self) -> Result<PathBuf> {
        let input = self
            .config
            .input_dir
            .canonicalize()
            .map_err(|_| Error::InvalidPath(self.config.input_dir.clone()))?;
        let name = input
            .file_name()
            .ok_or_else(|| Error::InvalidPath(self.config.input_dir.clone()))?;
        Ok(self.config.analysis_dir.join(name))
    }

    /// Run every stage; fatal errors abort before later stages start
    pub fn run(&self) -> Result<RunSummary> {
        let started_at = time::now();
        let start = Instant::now();
        let config = &self.config;

        config.validate()?;
        if !config.input_dir.is_dir() {
            return Err(Error::InvalidPath(config.input_dir.clone()));
        }
        if !config.groundtruth_file.is_file() {
            return Err(Error::InvalidPath(config.groundtruth_file.clone()));
        }

        let working_dir = self.working_dir()?;
        fs::create_dir_all(&working_dir)?;
        tracing::info!(
            input = %config.input_dir.display(),
            working_dir = %working_dir.display(),
            folds = config.nb_folds,
            "Starting feature preparation"
        );

        let intermediate = working_dir.join(INTERMEDIATE_FILE);
        let merge = DatasetMerger::new(&config.profile, self.reporter)
            .merge(&config.input_dir, &intermediate)?;

        let dataset = working_dir.join(&config.output_file);
        let joined = GroundTruthJoiner::new(&config.profile, self.reporter, config.join).join(
            &intermediate,
            &config.groundtruth_file,
            &dataset,
        );
        if intermediate.exists() {
            fs::remove_file(&intermediate)?;
        }
        let join = joined?;

        let folds_root = config
            .folds_dir
            .clone()
            .unwrap_or_else(|| working_dir.clone());
        let partition = FoldPartitioner::new(&config.profile, self.reporter, folds_root)
            .partition(&dataset, config.nb_folds, config.invert)?;

        let mut folds: Vec<FoldSummary> = partition
            .pairs
            .iter()
            .map(|pair| FoldSummary {
                train: pair.train.clone(),
                test: pair.test.clone(),
                result: None,
            })
            .collect();

        if config.classifier.enabled {
            self.classify(&working_dir, &mut folds)?;
        }

        let summary = RunSummary {
            started_at,
            input_dir: config.input_dir.clone(),
            working_dir: working_dir.clone(),
            dataset,
            files_merged: merge.merged,
            files_rejected_empty: merge.rejected_empty,
            files_rejected_invalid: merge.rejected_invalid,
            rows_written: join.rows_written,
            rows_dropped: join.rows_dropped,
            dropped_identifiers: join.dropped_identifiers,
            observed_labels: join.observed_labels.into_iter().collect(),
            fold_count: partition.fold_count,
            folds_directory: partition.directory,
            folds,
            rows_per_label: partition.rows_per_label,
            warnings: self.reporter.warning_count(),
            elapsed_ms: time::elapsed_millis(start),
        };

        let summary_path = working_dir.join(SUMMARY_FILE);
        fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)?;
        tracing::debug!(path = %summary_path.display(), "Run summary written");

        Ok(summary)
    }

    /// One classifier run per fold, results in `results/fold_NN.txt`
    fn classify(&self, working_dir: &Path, folds: &mut [FoldSummary]) -> Result<()> {
        let results_dir = self
            .config
            .classifier
            .results_dir
            .clone()
            .unwrap_or_else(|| working_dir.join("results"));
        fs::create_dir_all(&results_dir)?;

        let invoker = ClassifierInvoker::new(self.config.classifier.program.clone());
        self.reporter.success(format!(
            "Classifying {} fold(s) with {}",
            folds.len(),
            invoker.program().display()
        ));
        for (idx, fold) in folds.iter_mut().enumerate() {
            let output = results_dir.join(format!("fold_{:02}.txt", idx + 1));
            fold.result = Some(invoker.invoke(&fold.train, &fold.test, &output)?);
        }
        Ok(())
    }
}
