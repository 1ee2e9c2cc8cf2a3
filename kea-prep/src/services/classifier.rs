//! External classifier invocation
//!
//! Runs Marsyas `kea` in tag mode on one train/test pair:
//! `kea -m tags -w <train> -tw <test> -pr <output>`.
//! The result file format is opaque to this crate.

use kea_common::{Error, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Classifier invoker
#[derive(Debug, Clone)]
pub struct ClassifierInvoker {
    program: PathBuf,
}

impl ClassifierInvoker {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Command-line arguments for one fold
    pub fn arguments(train: &Path, test: &Path, output: &Path) -> Vec<OsString> {
        vec![
            "-m".into(),
            "tags".into(),
            "-w".into(),
            train.as_os_str().to_os_string(),
            "-tw".into(),
            test.as_os_str().to_os_string(),
            "-pr".into(),
            output.as_os_str().to_os_string(),
        ]
    }

    /// Run the classifier and wait for it; returns the result file path
    pub fn invoke(&self, train: &Path, test: &Path, output: &Path) -> Result<PathBuf> {
        let args = Self::arguments(train, test, output);
        tracing::info!(
            program = %self.program.display(),
            train = %train.display(),
            test = %test.display(),
            "Running classifier"
        );

        let result = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| {
                Error::Classifier(format!("Failed to run {}: {}", self.program.display(), e))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(Error::Classifier(format!(
                "{} exited with {}: {}",
                self.program.display(),
                result.status,
                stderr.trim()
            )));
        }

        Ok(output.to_path_buf())
    }
}
