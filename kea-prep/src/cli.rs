//! Command-line arguments and settings resolution
//!
//! Precedence per setting: command line, then environment variable (via
//! clap's `env`), then the TOML file, then the built-in default.

use crate::format::TableProfile;
use crate::pipeline::{
    PipelineConfig, DEFAULT_ANALYSIS_DIR, DEFAULT_GROUNDTRUTH_FILE, DEFAULT_INPUT_DIR,
    DEFAULT_NB_FOLDS, DEFAULT_OUTPUT_FILE,
};
use crate::services::{JoinOptions, LabelDomainMode};
use clap::Parser;
use kea_common::config::TomlConfig;
use kea_common::{ReporterConfig, Result};
use std::path::PathBuf;

/// Command-line arguments for kea-prep
#[derive(Parser, Debug, Default)]
#[command(name = "kea-prep")]
#[command(about = "Merge, label and fold Marsyas feature tables for kea auto-tagging")]
#[command(version)]
pub struct Args {
    /// Directory containing one ARFF file per track (bextract output)
    #[arg(short = 'i', long = "input_dir", env = "KEA_INPUT_DIR")]
    pub input_dir: Option<PathBuf>,

    /// File name of the labeled dataset, written under analysis/<input dir>/
    #[arg(short = 'o', long = "output_file", env = "KEA_OUTPUT_FILE")]
    pub output_file: Option<String>,

    /// Two-column identifier,label file
    #[arg(short = 'g', long = "groundtruth_file", env = "KEA_GROUNDTRUTH")]
    pub groundtruth_file: Option<PathBuf>,

    /// Number of folds (1 writes a single train_test file)
    #[arg(short = 'n', long = "nb_folds", env = "KEA_NB_FOLDS")]
    pub nb_folds: Option<usize>,

    /// Put the single fold in the train file instead of the test file
    #[arg(long)]
    pub invert: bool,

    /// Root of the per-run working directories
    #[arg(long = "analysis_dir")]
    pub analysis_dir: Option<PathBuf>,

    /// Where fold directories are created (defaults to the working directory)
    #[arg(long = "folds_dir")]
    pub folds_dir: Option<PathBuf>,

    /// Label domain written to the header: placeholder or observed
    #[arg(long = "label_domain", value_name = "MODE")]
    pub label_domain: Option<String>,

    /// List the identifiers of rows dropped for lack of ground truth
    #[arg(long = "collect_dropped")]
    pub collect_dropped: bool,

    /// Run the external classifier on every fold
    #[arg(long)]
    pub classify: bool,

    /// Only print warnings and errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Configuration file
    #[arg(long, env = "KEA_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Reporter settings after applying the TOML file
    pub fn reporter_config(&self, toml: &TomlConfig) -> ReporterConfig {
        ReporterConfig {
            verbose: !self.quiet && toml.pipeline.verbose.unwrap_or(true),
        }
    }

    /// Merge arguments over the TOML file over the defaults
    pub fn into_pipeline_config(self, toml: &TomlConfig) -> Result<PipelineConfig> {
        let section = &toml.pipeline;

        let label_domain = match self.label_domain.as_ref().or(section.label_domain.as_ref()) {
            Some(mode) => mode.parse::<LabelDomainMode>()?,
            None => LabelDomainMode::default(),
        };

        let mut classifier = toml.classifier.clone();
        classifier.enabled |= self.classify;

        let config = PipelineConfig {
            input_dir: self
                .input_dir
                .or_else(|| section.input_dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_INPUT_DIR)),
            output_file: self
                .output_file
                .or_else(|| section.output_file.clone())
                .unwrap_or_else(|| DEFAULT_OUTPUT_FILE.to_string()),
            groundtruth_file: self
                .groundtruth_file
                .or_else(|| section.groundtruth_file.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_GROUNDTRUTH_FILE)),
            nb_folds: self
                .nb_folds
                .or(section.nb_folds)
                .unwrap_or(DEFAULT_NB_FOLDS),
            invert: self.invert || section.invert.unwrap_or(false),
            analysis_dir: self
                .analysis_dir
                .or_else(|| section.analysis_dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ANALYSIS_DIR)),
            folds_dir: self.folds_dir.or_else(|| section.folds_dir.clone()),
            join: JoinOptions {
                domain: label_domain,
                collect_dropped: self.collect_dropped || section.collect_dropped.unwrap_or(false),
            },
            profile: TableProfile::from_config(&toml.format)?,
            classifier,
        };
        config.validate()?;
        Ok(config)
    }
}
