//! Feature table format profile and line-level helpers
//!
//! Marsyas `bextract` writes one ARFF table per analysed track: a fixed-size
//! header block (relation, one `@attribute` per feature, the nominal label
//! attribute, `@data`) followed by the data-bearing body. Every component of
//! the pipeline depends on the same line numbers, so they live here as one
//! validated profile rather than as constants scattered through the code.

use kea_common::config::FormatSection;
use kea_common::{Error, Result};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Lines in the header block of a `bextract` table
pub const DEFAULT_HEADER_LINES: usize = 74;
/// 1-based line of the `@relation` declaration
pub const DEFAULT_RELATION_LINE: usize = 2;
/// 1-based line of the label attribute declaration
pub const DEFAULT_LABEL_DECLARATION_LINE: usize = 71;
/// 0-based header line carrying the embedded track identifier
pub const DEFAULT_IDENTIFIER_LINE_INDEX: usize = 70;
/// Identifier length in characters (ISRC)
pub const DEFAULT_IDENTIFIER_LEN: usize = 12;
/// Smallest plausible complete export, in bytes
pub const DEFAULT_MIN_FILE_BYTES: u64 = 8100;
pub const DEFAULT_COMMENT_MARKER: char = '%';
pub const DEFAULT_RELATION_DECLARATION: &str = "@relation kea";
pub const DEFAULT_LABEL_ATTRIBUTE: &str = "output";

/// Layout of a feature table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableProfile {
    pub header_lines: usize,
    pub relation_line: usize,
    pub label_declaration_line: usize,
    pub identifier_line_index: usize,
    pub identifier_len: usize,
    pub min_file_bytes: u64,
    pub comment_marker: char,
    pub relation_declaration: String,
    pub label_attribute: String,
    pub placeholder_domain: Vec<String>,
}

impl Default for TableProfile {
    fn default() -> Self {
        Self {
            header_lines: DEFAULT_HEADER_LINES,
            relation_line: DEFAULT_RELATION_LINE,
            label_declaration_line: DEFAULT_LABEL_DECLARATION_LINE,
            identifier_line_index: DEFAULT_IDENTIFIER_LINE_INDEX,
            identifier_len: DEFAULT_IDENTIFIER_LEN,
            min_file_bytes: DEFAULT_MIN_FILE_BYTES,
            comment_marker: DEFAULT_COMMENT_MARKER,
            relation_declaration: DEFAULT_RELATION_DECLARATION.to_string(),
            label_attribute: DEFAULT_LABEL_ATTRIBUTE.to_string(),
            placeholder_domain: vec!["i".to_string(), "s".to_string()],
        }
    }
}

impl TableProfile {
    /// Apply `[format]` overrides on top of the defaults and validate
    pub fn from_config(section: &FormatSection) -> Result<Self> {
        let defaults = Self::default();
        let profile = Self {
            header_lines: section.header_lines.unwrap_or(defaults.header_lines),
            relation_line: section.relation_line.unwrap_or(defaults.relation_line),
            label_declaration_line: section
                .label_declaration_line
                .unwrap_or(defaults.label_declaration_line),
            identifier_line_index: section
                .identifier_line_index
                .unwrap_or(defaults.identifier_line_index),
            identifier_len: section.identifier_len.unwrap_or(defaults.identifier_len),
            min_file_bytes: section.min_file_bytes.unwrap_or(defaults.min_file_bytes),
            comment_marker: section.comment_marker.unwrap_or(defaults.comment_marker),
            relation_declaration: section
                .relation_declaration
                .clone()
                .unwrap_or(defaults.relation_declaration),
            label_attribute: section
                .label_attribute
                .clone()
                .unwrap_or(defaults.label_attribute),
            placeholder_domain: section
                .placeholder_domain
                .clone()
                .unwrap_or(defaults.placeholder_domain),
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Check that the line numbers describe a coherent header block
    pub fn validate(&self) -> Result<()> {
        if self.header_lines == 0 {
            return Err(Error::Config("header_lines must be at least 1".to_string()));
        }
        for (name, line) in [
            ("relation_line", self.relation_line),
            ("label_declaration_line", self.label_declaration_line),
        ] {
            if line == 0 || line > self.header_lines {
                return Err(Error::Config(format!(
                    "{} {} is outside the {}-line header",
                    name, line, self.header_lines
                )));
            }
        }
        if self.relation_line == self.label_declaration_line {
            return Err(Error::Config(
                "relation_line and label_declaration_line must differ".to_string(),
            ));
        }
        if self.identifier_line_index >= self.header_lines {
            return Err(Error::Config(format!(
                "identifier_line_index {} is outside the {}-line header",
                self.identifier_line_index, self.header_lines
            )));
        }
        if self.identifier_len == 0 {
            return Err(Error::Config("identifier_len must be at least 1".to_string()));
        }
        if self.placeholder_domain.is_empty() {
            return Err(Error::Config("placeholder_domain must not be empty".to_string()));
        }
        Ok(())
    }

    /// True for lines whose first non-blank character is the comment marker
    pub fn is_comment(&self, line: &str) -> bool {
        line.trim_start().starts_with(self.comment_marker)
    }

    /// `@attribute <label_attribute> {a,b,...}`
    pub fn label_declaration<S: AsRef<str>>(&self, domain: &[S]) -> String {
        let values: Vec<&str> = domain.iter().map(|v| v.as_ref()).collect();
        format!("@attribute {} {{{}}}", self.label_attribute, values.join(","))
    }

    /// Label declaration using the fixed placeholder domain
    pub fn placeholder_declaration(&self) -> String {
        self.label_declaration(&self.placeholder_domain)
    }

    /// Identifier embedded in a header line
    ///
    /// Third whitespace-delimited field, skipping its opening brace, first
    /// `identifier_len` characters.
    pub fn header_identifier(&self, line: &str) -> Option<String> {
        let field = line.split_whitespace().nth(2)?;
        Some(field.chars().skip(1).take(self.identifier_len).collect())
    }

    /// Identifier encoded in a file name (its first `identifier_len` chars)
    pub fn filename_identifier(&self, file_name: &str) -> String {
        file_name.chars().take(self.identifier_len).collect()
    }
}

/// Strip a trailing `\n` or `\r\n`
pub fn trim_line_ending(line: &str) -> &str {
    line.strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(line)
}

/// Byte-level `trim_line_ending`
pub fn trim_line_ending_bytes(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\n")
        .map(|l| l.strip_suffix(b"\r").unwrap_or(l))
        .unwrap_or(line)
}

/// Text of a raw line for classification; bytes that are not UTF-8 become
/// U+FFFD
pub fn decode_line(line: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(line)
}

/// Trailing comma-separated field of a data row, without line ending
pub fn trailing_field(row: &str) -> &str {
    let row = trim_line_ending(row);
    row.rsplit(',').next().unwrap_or(row).trim()
}

/// Identifier part of a `bextract` row label (`USRC17607839_track.wav`)
pub fn row_identifier(label_token: &str) -> &str {
    label_token.split('_').next().unwrap_or(label_token)
}

/// Lines of a reader as raw bytes, terminators kept
///
/// Exports may carry Latin-1 file names in their comments, so lines are
/// copied byte for byte and only decoded (lossily) where their text matters.
pub struct RawLines<R> {
    reader: R,
}

impl<R: BufRead> RawLines<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> Iterator for RawLines<R> {
    type Item = std::io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = Vec::new();
        match self.reader.read_until(b'\n', &mut line) {
            Ok(0) => None,
            Ok(_) => Some(Ok(line)),
            Err(e) => Some(Err(e)),
        }
    }
}

/// Open a file as raw lines
pub fn raw_lines(path: &Path) -> Result<RawLines<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(RawLines::new(BufReader::new(file)))
}

/// One data row of a loaded table
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    /// 1-based line number in the source file
    pub line: usize,
    pub values: Vec<String>,
    pub label: String,
}

/// Parsed feature table: header attributes plus data rows
///
/// Used for the counting pass of the partitioner. Rows must all have the
/// same number of fields as the header declares attributes (when the header
/// declares any), so a truncated export is reported instead of silently
/// shifting labels.
#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    pub relation: Option<String>,
    pub attributes: Vec<String>,
    pub rows: Vec<TableRow>,
}

impl FeatureTable {
    /// Load a table according to `profile`
    pub fn load(path: &Path, profile: &TableProfile) -> Result<Self> {
        let mut table = FeatureTable::default();

        for (idx, line) in raw_lines(path)?.enumerate() {
            let line = line?;
            let line_num = idx + 1;
            let decoded = decode_line(&line);
            let text = trim_line_ending(&decoded).trim();

            if line_num <= profile.header_lines {
                let lower = text.to_ascii_lowercase();
                if lower.starts_with("@relation") {
                    table.relation = text.split_whitespace().nth(1).map(str::to_string);
                } else if lower.starts_with("@attribute") {
                    if let Some(name) = text.split_whitespace().nth(1) {
                        table.attributes.push(name.to_string());
                    }
                }
                continue;
            }

            if text.is_empty() || profile.is_comment(text) {
                continue;
            }

            let values: Vec<String> = text.split(',').map(|v| v.trim().to_string()).collect();
            if !table.attributes.is_empty() && values.len() != table.attributes.len() {
                return Err(Error::Format(format!(
                    "{} line {}: {} fields, header declares {} attributes",
                    path.display(),
                    line_num,
                    values.len(),
                    table.attributes.len()
                )));
            }
            let label = trailing_field(text).to_string();
            table.rows.push(TableRow {
                line: line_num,
                values,
                label,
            });
        }

        Ok(table)
    }

    /// Row count per label, ordered by label
    pub fn label_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            *counts.entry(row.label.clone()).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn test_default_profile_is_valid() {
        let profile = TableProfile::default();
        profile.validate().unwrap();
        assert_eq!(profile.header_lines, 74);
        assert_eq!(profile.placeholder_declaration(), "@attribute output {i,s}");
    }

    #[test]
    fn test_profile_rejects_declarations_outside_header() {
        let profile = TableProfile {
            label_declaration_line: 80,
            ..TableProfile::default()
        };
        assert!(matches!(profile.validate(), Err(Error::Config(_))));

        let profile = TableProfile {
            identifier_line_index: 74,
            ..TableProfile::default()
        };
        assert!(profile.validate().is_err());

        let profile = TableProfile {
            header_lines: 0,
            ..TableProfile::default()
        };
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_profile_from_config_overrides() {
        let section = FormatSection {
            header_lines: Some(10),
            relation_line: Some(1),
            label_declaration_line: Some(8),
            identifier_line_index: Some(7),
            min_file_bytes: Some(0),
            ..FormatSection::default()
        };
        let profile = TableProfile::from_config(&section).unwrap();
        assert_eq!(profile.header_lines, 10);
        assert_eq!(profile.identifier_len, DEFAULT_IDENTIFIER_LEN);
        assert_eq!(profile.min_file_bytes, 0);

        // Defaults put the label declaration at 71, beyond a 10-line header
        let section = FormatSection {
            header_lines: Some(10),
            ..FormatSection::default()
        };
        assert!(TableProfile::from_config(&section).is_err());
    }

    #[test]
    fn test_header_identifier() {
        let profile = TableProfile::default();
        assert_eq!(
            profile
                .header_identifier("@attribute output {USRC17607839_track.wav}")
                .as_deref(),
            Some("USRC17607839")
        );
        assert_eq!(profile.header_identifier("@attribute output"), None);
        assert_eq!(profile.filename_identifier("USRC17607839.mp3.arff"), "USRC17607839");
        assert_eq!(profile.filename_identifier("short"), "short");
    }

    #[test]
    fn test_row_helpers() {
        assert_eq!(trailing_field("0.1,0.2,USRC17607839_a.wav\r\n"), "USRC17607839_a.wav");
        assert_eq!(row_identifier("USRC17607839_a.wav"), "USRC17607839");
        assert_eq!(row_identifier("NOUNDERSCORE"), "NOUNDERSCORE");
        assert_eq!(trim_line_ending("abc\r\n"), "abc");
        assert_eq!(trim_line_ending("abc"), "abc");
    }

    #[test]
    fn test_raw_lines_keep_terminators() {
        let lines: Vec<Vec<u8>> = RawLines::new(Cursor::new(&b"a\r\nBeyonc\xe9\nc"[..]))
            .collect::<std::io::Result<_>>()
            .unwrap();
        assert_eq!(lines, vec![b"a\r\n".to_vec(), b"Beyonc\xe9\n".to_vec(), b"c".to_vec()]);
        assert_eq!(trim_line_ending_bytes(&lines[0]), b"a");
        assert_eq!(decode_line(&lines[1]), "Beyonc\u{fffd}\n");
    }

    #[test]
    fn test_indented_comment_is_comment() {
        let profile = TableProfile::default();
        assert!(profile.is_comment("% a.wav"));
        assert!(profile.is_comment("   % a.wav"));
        assert!(!profile.is_comment("0.1,a%b"));
    }

    #[test]
    fn test_feature_table_load() {
        let profile = TableProfile {
            header_lines: 5,
            relation_line: 1,
            label_declaration_line: 4,
            identifier_line_index: 3,
            ..TableProfile::default()
        };
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.arff");
        std::fs::write(
            &path,
            "@relation tracks\n\
             @attribute mean real\n\
             @attribute std real\n\
             @attribute output {a,b}\n\
             @data\n\
             % first.wav\n\
             0.1,0.2,a\n\
             \n\
             0.3,0.4,b\n\
             0.5,0.6,a\n",
        )
        .unwrap();

        let table = FeatureTable::load(&path, &profile).unwrap();
        assert_eq!(table.relation.as_deref(), Some("tracks"));
        assert_eq!(table.attributes, vec!["mean", "std", "output"]);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[0].line, 7);

        let counts = table.label_counts();
        assert_eq!(counts.get("a"), Some(&2));
        assert_eq!(counts.get("b"), Some(&1));
    }

    #[test]
    fn test_feature_table_rejects_ragged_rows() {
        let profile = TableProfile {
            header_lines: 3,
            relation_line: 1,
            label_declaration_line: 2,
            identifier_line_index: 1,
            ..TableProfile::default()
        };
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.arff");
        std::fs::write(&path, "@relation t\n@attribute output {a}\n@data\n0.1,a\na\n").unwrap();

        assert!(matches!(
            FeatureTable::load(&path, &profile),
            Err(Error::Format(_))
        ));
    }
}
