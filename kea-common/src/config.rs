//! TOML configuration loading and config file resolution
//!
//! Settings sources, highest priority first:
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)
//!
//! This module only covers tier 3 and the location of the file itself; the
//! binary merges the tiers. A missing config file is not an error: the caller
//! gets defaults and a warning is logged.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "KEA_CONFIG";

/// Config file name under the platform config directory
pub const CONFIG_FILE_NAME: &str = "kea-prep.toml";

/// Configuration loaded from TOML file
///
/// Every field is optional so a partial file only overrides what it names.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// Pipeline paths and behaviour switches
    #[serde(default)]
    pub pipeline: PipelineSection,

    /// Feature table layout overrides
    #[serde(default)]
    pub format: FormatSection,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// External classifier configuration
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

/// `[pipeline]` section
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PipelineSection {
    pub input_dir: Option<PathBuf>,
    pub output_file: Option<String>,
    pub groundtruth_file: Option<PathBuf>,
    pub nb_folds: Option<usize>,
    pub invert: Option<bool>,
    pub analysis_dir: Option<PathBuf>,
    pub folds_dir: Option<PathBuf>,
    pub verbose: Option<bool>,
    /// `placeholder` or `observed`
    pub label_domain: Option<String>,
    pub collect_dropped: Option<bool>,
}

/// `[format]` section
///
/// Overrides for the feature table layout. Line numbers follow the
/// conventions of the table profile: declaration lines are 1-based, the
/// identifier line is a 0-based index.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct FormatSection {
    pub header_lines: Option<usize>,
    pub relation_line: Option<usize>,
    pub label_declaration_line: Option<usize>,
    pub identifier_line_index: Option<usize>,
    pub identifier_len: Option<usize>,
    pub min_file_bytes: Option<u64>,
    pub comment_marker: Option<char>,
    pub relation_declaration: Option<String>,
    pub label_attribute: Option<String>,
    pub placeholder_domain: Option<Vec<String>>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// External classifier configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ClassifierConfig {
    /// Run the classifier on every fold after partitioning
    #[serde(default)]
    pub enabled: bool,

    /// Classifier executable
    #[serde(default = "default_classifier_program")]
    pub program: PathBuf,

    /// Where result files go (defaults to `results/` in the working directory)
    #[serde(default)]
    pub results_dir: Option<PathBuf>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            program: default_classifier_program(),
            results_dir: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_classifier_program() -> PathBuf {
    PathBuf::from("kea")
}

impl TomlConfig {
    /// Parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }

    /// Parse config from a TOML string
    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load the resolved config file, or defaults when there is none
    ///
    /// A file that exists but cannot be parsed is an error; a file that does
    /// not exist only produces a warning.
    pub fn load_or_default(cli_arg: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        match resolve_config_path(cli_arg, CONFIG_ENV_VAR) {
            Some(path) if path.is_file() => {
                let config = Self::load(&path)?;
                info!("Loaded configuration from {}", path.display());
                Ok((config, Some(path)))
            }
            Some(path) => {
                warn!(
                    "Config file not found: {} (using built-in defaults)",
                    path.display()
                );
                Ok((Self::default(), None))
            }
            None => Ok((Self::default(), None)),
        }
    }
}

/// Resolve which config file to read
///
/// Priority: explicit argument, then `env_var_name`, then
/// `<config_dir>/kea/kea-prep.toml` if that file exists.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path().filter(|p| p.exists())
}

/// Platform config file location (`~/.config/kea/kea-prep.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("kea").join(CONFIG_FILE_NAME))
}
