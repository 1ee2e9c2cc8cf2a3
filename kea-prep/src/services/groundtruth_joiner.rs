//! Attach ground-truth labels to a merged feature dataset
//!
//! Each data row ends with a `bextract` token `<IDENTIFIER>_<file>`. The
//! joiner replaces that token with the label the ground-truth table assigns
//! to the identifier and drops rows whose identifier has no label. Comment
//! lines in the body travel with the row that follows them.

use crate::format::{decode_line, raw_lines, row_identifier, trim_line_ending_bytes, TableProfile};
use kea_common::{Error, Reporter, Result};
use std::collections::{BTreeSet, HashMap};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// How the label attribute declaration is rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelDomainMode {
    /// Fixed placeholder domain (`{i,s}` by default); observed labels are
    /// only reported
    #[default]
    Placeholder,
    /// Domain derived from the labels actually written
    Observed,
}

impl FromStr for LabelDomainMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "placeholder" => Ok(Self::Placeholder),
            "observed" => Ok(Self::Observed),
            other => Err(Error::Config(format!(
                "Unknown label domain mode '{}' (expected 'placeholder' or 'observed')",
                other
            ))),
        }
    }
}

/// Joiner options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinOptions {
    pub domain: LabelDomainMode,
    /// Record every dropped identifier instead of only counting them
    pub collect_dropped: bool,
}

/// Join statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinReport {
    pub output: PathBuf,
    pub rows_written: usize,
    pub rows_dropped: usize,
    /// Distinct labels written, sorted
    pub observed_labels: BTreeSet<String>,
    /// Identifiers of dropped rows in encounter order (only with `collect_dropped`)
    pub dropped_identifiers: Vec<String>,
}

/// Identifier → label table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroundTruth {
    labels: HashMap<String, String>,
}

impl GroundTruth {
    /// Load a two-column `identifier,label` CSV file
    ///
    /// Later rows win over earlier rows with the same identifier. Extra
    /// columns are ignored. Quoted fields are unquoted.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file).map_err(|e| Error::Format(format!("{}: {}", path.display(), e)))
    }

    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        Self::from_reader(content.as_bytes())
    }

    fn from_reader<R: Read>(reader: R) -> std::result::Result<Self, String> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut labels = HashMap::new();
        for record in reader.records() {
            let record = record.map_err(|e| e.to_string())?;
            if record.iter().all(str::is_empty) {
                continue;
            }
            match (record.get(0), record.get(1)) {
                (Some(id), Some(label)) if !id.is_empty() && !label.is_empty() => {
                    labels.insert(id.to_string(), label.to_string());
                }
                _ => {
                    let line = record.position().map_or(0, |p| p.line());
                    let fields: Vec<&str> = record.iter().collect();
                    return Err(format!(
                        "line {}: expected 'identifier,label', got '{}'",
                        line,
                        fields.join(",")
                    ));
                }
            }
        }
        Ok(Self { labels })
    }

    pub fn get(&self, identifier: &str) -> Option<&str> {
        self.labels.get(identifier).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Ground-truth joiner
pub struct GroundTruthJoiner<'a> {
    profile: &'a TableProfile,
    reporter: &'a Reporter,
    options: JoinOptions,
}

impl<'a> GroundTruthJoiner<'a> {
    pub fn new(profile: &'a TableProfile, reporter: &'a Reporter, options: JoinOptions) -> Self {
        Self {
            profile,
            reporter,
            options,
        }
    }

    /// Write `features_path` with ground-truth labels to `output_path`
    pub fn join(
        &self,
        features_path: &Path,
        groundtruth_path: &Path,
        output_path: &Path,
    ) -> Result<JoinReport> {
        self.reporter.success("Adding groundtruth");
        for path in [features_path, groundtruth_path] {
            if !path.is_file() {
                return Err(Error::InvalidPath(path.to_path_buf()));
            }
        }
        if output_path.exists() {
            self.reporter.warning(format!(
                "Overwriting existing output file: {}",
                output_path.display()
            ));
        }

        let groundtruth = GroundTruth::load(groundtruth_path)?;
        tracing::debug!(entries = groundtruth.len(), "Ground truth loaded");

        let report = match self.options.domain {
            LabelDomainMode::Placeholder => {
                let declaration = self.profile.placeholder_declaration();
                self.write_joined(features_path, &groundtruth, output_path, &declaration)?
            }
            LabelDomainMode::Observed => {
                self.join_with_observed_domain(features_path, &groundtruth, output_path)?
            }
        };

        if report.rows_dropped > 0 {
            if self.options.collect_dropped {
                self.reporter.warning(format!(
                    "{} rows dropped without ground truth: {}",
                    report.rows_dropped,
                    report.dropped_identifiers.join(", ")
                ));
            } else {
                tracing::debug!(dropped = report.rows_dropped, "Rows without ground truth dropped");
            }
        }

        let labels: Vec<&str> = report.observed_labels.iter().map(String::as_str).collect();
        match self.options.domain {
            LabelDomainMode::Placeholder => self.reporter.warning(format!(
                "Label domain declared as {{{}}}; observed labels are {{{}}}",
                self.profile.placeholder_domain.join(","),
                labels.join(",")
            )),
            LabelDomainMode::Observed => self
                .reporter
                .info(format!("Label domain set to {{{}}}", labels.join(","))),
        }

        self.reporter.success(format!(
            "Groundtruth added: {} rows written, {} dropped",
            report.rows_written, report.rows_dropped
        ));
        Ok(report)
    }

    /// Two passes: rows go to a sibling temp file, then the header is
    /// rewritten with the domain that is only known once all rows are seen.
    fn join_with_observed_domain(
        &self,
        features_path: &Path,
        groundtruth: &GroundTruth,
        output_path: &Path,
    ) -> Result<JoinReport> {
        let tmp_path = sibling_tmp_path(output_path);
        let result = self
            .write_joined(
                features_path,
                groundtruth,
                &tmp_path,
                &self.profile.placeholder_declaration(),
            )
            .and_then(|mut report| {
                let domain: Vec<&String> = report.observed_labels.iter().collect();
                let declaration = self.profile.label_declaration(&domain);
                self.rewrite_declaration(&tmp_path, output_path, &declaration)?;
                report.output = output_path.to_path_buf();
                Ok(report)
            });

        if tmp_path.exists() {
            fs::remove_file(&tmp_path)?;
        }
        result
    }

    fn rewrite_declaration(&self, from: &Path, to: &Path, declaration: &str) -> Result<()> {
        let mut out = BufWriter::new(File::create(to)?);
        for (idx, line) in raw_lines(from)?.enumerate() {
            let line = line?;
            if idx + 1 == self.profile.label_declaration_line {
                writeln!(out, "{}", declaration)?;
            } else {
                out.write_all(&line)?;
            }
        }
        out.flush()?;
        Ok(())
    }

    /// Single streaming pass over the features file
    fn write_joined(
        &self,
        features_path: &Path,
        groundtruth: &GroundTruth,
        output_path: &Path,
        declaration: &str,
    ) -> Result<JoinReport> {
        let mut out = BufWriter::new(File::create(output_path)?);
        let mut report = JoinReport {
            output: output_path.to_path_buf(),
            ..JoinReport::default()
        };
        let mut pending_comments: Vec<Vec<u8>> = Vec::new();

        for (idx, line) in raw_lines(features_path)?.enumerate() {
            let line = line?;
            let line_num = idx + 1;

            if line_num <= self.profile.header_lines {
                if line_num == self.profile.relation_line {
                    writeln!(out, "{}", self.profile.relation_declaration)?;
                } else if line_num == self.profile.label_declaration_line {
                    writeln!(out, "{}", declaration)?;
                } else {
                    out.write_all(&line)?;
                }
                continue;
            }

            let row = trim_line_ending_bytes(&line);
            let text = decode_line(row);
            if text.trim().is_empty() {
                continue;
            }
            if self.profile.is_comment(&text) {
                pending_comments.push(row.to_vec());
                continue;
            }

            let (features, token) = match row.iter().rposition(|&b| b == b',') {
                Some(pos) => (&row[..pos], decode_line(&row[pos + 1..])),
                None => (&row[..0], text),
            };
            let identifier = row_identifier(token.trim());

            match groundtruth.get(identifier) {
                Some(label) => {
                    for comment in pending_comments.drain(..) {
                        out.write_all(&comment)?;
                        out.write_all(b"\n")?;
                    }
                    if features.is_empty() {
                        writeln!(out, "{}", label)?;
                    } else {
                        out.write_all(features)?;
                        writeln!(out, ",{}", label)?;
                    }
                    report.rows_written += 1;
                    report.observed_labels.insert(label.to_string());
                }
                None => {
                    pending_comments.clear();
                    report.rows_dropped += 1;
                    if self.options.collect_dropped {
                        report.dropped_identifiers.push(identifier.to_string());
                    }
                }
            }
        }
        out.flush()?;
        Ok(report)
    }
}

fn sibling_tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
