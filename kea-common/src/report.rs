//! Console reporting collaborator
//!
//! Pipeline components receive a `&Reporter` instead of consulting a
//! process-wide verbosity flag. Messages go through `tracing`; the reporter
//! only decides what is shown and keeps a count of warnings so callers can
//! surface them in a run summary.

use std::cell::Cell;
use std::io::Write;
use tracing::{info, warn};

/// Reporter configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReporterConfig {
    /// Show success/info messages and progress counters
    pub verbose: bool,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self { verbose: true }
    }
}

/// Reporting collaborator shared by one pipeline run
///
/// Not `Sync`: the pipeline is single-threaded and the warning counter is a
/// plain `Cell`.
#[derive(Debug, Default)]
pub struct Reporter {
    config: ReporterConfig,
    warnings: Cell<usize>,
    progress_open: Cell<bool>,
}

impl Reporter {
    pub fn new(config: ReporterConfig) -> Self {
        Self {
            config,
            warnings: Cell::new(0),
            progress_open: Cell::new(false),
        }
    }

    /// Reporter that only emits warnings
    pub fn quiet() -> Self {
        Self::new(ReporterConfig { verbose: false })
    }

    pub fn is_verbose(&self) -> bool {
        self.config.verbose
    }

    /// Stage completion message
    pub fn success(&self, msg: impl AsRef<str>) {
        if self.config.verbose {
            self.end_progress();
            info!(target: "kea::report", status = "ok", "{}", msg.as_ref());
        }
    }

    /// Informational message
    pub fn info(&self, msg: impl AsRef<str>) {
        if self.config.verbose {
            self.end_progress();
            info!(target: "kea::report", "{}", msg.as_ref());
        }
    }

    /// Non-fatal problem needing attention; always emitted and counted
    pub fn warning(&self, msg: impl AsRef<str>) {
        self.end_progress();
        self.warnings.set(self.warnings.get() + 1);
        warn!(target: "kea::report", "{}", msg.as_ref());
    }

    /// Per-item progress counter, redrawn in place on stderr
    pub fn progress(&self, label: &str, current: usize, total: usize) {
        if !self.config.verbose {
            return;
        }
        let mut stderr = std::io::stderr().lock();
        // Progress is cosmetic; a closed stderr must not fail the run
        let _ = write!(stderr, "\r\t{}\t{}/{}", label, current, total);
        let _ = stderr.flush();
        self.progress_open.set(true);
    }

    /// Terminate an open progress line
    pub fn end_progress(&self) {
        if self.progress_open.replace(false) {
            let _ = writeln!(std::io::stderr());
        }
    }

    /// Number of warnings emitted so far
    pub fn warning_count(&self) -> usize {
        self.warnings.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_verbose() {
        assert!(Reporter::default().is_verbose());
        assert!(!Reporter::quiet().is_verbose());
    }

    #[test]
    fn test_warnings_counted_even_when_quiet() {
        let reporter = Reporter::quiet();
        reporter.info("hidden");
        reporter.success("hidden");
        assert_eq!(reporter.warning_count(), 0);

        reporter.warning("first");
        reporter.warning("second");
        assert_eq!(reporter.warning_count(), 2);
    }

    #[test]
    fn test_progress_closes_before_next_message() {
        let reporter = Reporter::new(ReporterConfig { verbose: true });
        reporter.progress("Analysing file", 1, 3);
        assert!(reporter.progress_open.get());
        reporter.info("done");
        assert!(!reporter.progress_open.get());
    }

    #[test]
    fn test_quiet_progress_is_silent() {
        let reporter = Reporter::quiet();
        reporter.progress("Analysing file", 1, 3);
        assert!(!reporter.progress_open.get());
    }
}
