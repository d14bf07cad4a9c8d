// crates/refcheck-core/src/diagnostics.rs
// ============================================================================
// Module: Trace Diagnostics
// Description: Marker-line parsing, result tables, and pass/fail summaries.
// Purpose: Aggregate verify traces produced during the current task.
// Dependencies: serde, thiserror, std
// ============================================================================

//! ## Overview
//! Verify runs write their combined output into trace files. Lines starting
//! with a marker prefix carry `key <separator> value` pairs. This module
//! discovers the traces written during the current task, parses them into
//! [`DiagnosticRecord`]s, projects records onto a rectangular
//! [`ResultTable`], and summarizes status and time columns.
//!
//! ## Invariants
//! - Marker parsing resolves both the prefix and the separator by their
//!   rightmost occurrence.
//! - Within one trace, a repeated key keeps its last value.
//! - Every record carries a `trace` field holding its source path.
//! - Only traces modified strictly after the freshness threshold are read.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fs;
use std::fs::File;
use std::io;
use std::io::BufRead;
use std::io::BufReader;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;

use serde::Serialize;
use thiserror::Error;

use crate::paths::FileTree;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default marker prefix for diagnostic lines.
pub const DEFAULT_MARKER_PREFIX: &str = ">>>>";
/// Default key/value separator for diagnostic lines.
pub const DEFAULT_MARKER_SEPARATOR: &str = "::";
/// Implicit record key holding the trace path.
pub const TRACE_KEY: &str = "trace";
/// Column holding the pass/fail status.
pub const STATUS_KEY: &str = "status";
/// Column holding the run time.
pub const TIME_KEY: &str = "time";
/// Status value counted as a pass.
pub const STATUS_SUCCEED: &str = "succeed";
/// Status value counted as a failure.
pub const STATUS_FAILED: &str = "failed";

// ============================================================================
// SECTION: Marker Grammar
// ============================================================================

/// Prefix and separator of diagnostic marker lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerGrammar {
    /// Line prefix introducing a marker.
    pub prefix: String,
    /// Separator between key and value.
    pub separator: String,
}

impl Default for MarkerGrammar {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_MARKER_PREFIX.to_string(),
            separator: DEFAULT_MARKER_SEPARATOR.to_string(),
        }
    }
}

impl MarkerGrammar {
    /// Creates a grammar.
    #[must_use]
    pub fn new(prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            separator: separator.into(),
        }
    }

    /// Parses one line into a key/value pair.
    ///
    /// Returns `None` for lines that do not start with the prefix, lack the
    /// separator after it, or have an empty key.
    #[must_use]
    pub fn parse_line(&self, line: &str) -> Option<(String, String)> {
        if self.prefix.is_empty() || !line.starts_with(&self.prefix) {
            return None;
        }
        let start = line.rfind(&self.prefix)? + self.prefix.len();
        let pair = line[start ..].trim();
        let split = pair.rfind(&self.separator)?;
        let key = pair[.. split].trim();
        let value = pair[split + self.separator.len() ..].trim();
        if key.is_empty() {
            return None;
        }
        Some((key.to_string(), value.to_string()))
    }
}

// ============================================================================
// SECTION: Records
// ============================================================================

/// Key/value pairs parsed from one trace file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticRecord {
    /// Parsed fields, including `trace`.
    fields: BTreeMap<String, String>,
}

impl DiagnosticRecord {
    /// Creates a record holding only the `trace` field.
    #[must_use]
    pub fn for_trace(path: &Path) -> Self {
        let mut record = Self::default();
        record.insert(TRACE_KEY, path.display().to_string());
        record
    }

    /// Inserts or overwrites a field.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Returns a field value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Returns the source trace path.
    #[must_use]
    pub fn trace(&self) -> Option<&str> {
        self.get(TRACE_KEY)
    }

    /// Returns all fields.
    #[must_use]
    pub const fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }
}

/// Trace file that could not be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("cannot parse trace {}: {reason}", path.display())]
pub struct TraceParseError {
    /// Trace path.
    pub path: PathBuf,
    /// Failure description.
    pub reason: String,
}

/// Parses one trace file.
///
/// Lines are decoded independently and invalid UTF-8 sequences are replaced,
/// so stray bytes in processor output never hide the markers around them.
///
/// # Errors
///
/// Returns [`TraceParseError`] when the file cannot be opened or read.
pub fn parse_trace(path: &Path, grammar: &MarkerGrammar) -> Result<DiagnosticRecord, TraceParseError> {
    let failure = |err: io::Error| TraceParseError {
        path: path.to_path_buf(),
        reason: err.to_string(),
    };
    let reader = BufReader::new(File::open(path).map_err(failure)?);
    let mut record = DiagnosticRecord::default();
    for raw in reader.split(b'\n') {
        let raw = raw.map_err(failure)?;
        let decoded = String::from_utf8_lossy(&raw);
        let line = decoded.strip_suffix('\r').unwrap_or(&decoded);
        if let Some((key, value)) = grammar.parse_line(line) {
            record.insert(key, value);
        }
    }
    record.insert(TRACE_KEY, path.display().to_string());
    Ok(record)
}

// ============================================================================
// SECTION: Scanning
// ============================================================================

/// Trace discovery parameters.
#[derive(Debug, Clone)]
pub struct TraceScan {
    /// Trace directory, or a single trace file.
    pub root: PathBuf,
    /// Whether subdirectories are scanned.
    pub recursive: bool,
    /// Trace file extension, without the leading dot.
    pub extension: String,
    /// Marker grammar.
    pub grammar: MarkerGrammar,
    /// Only files modified strictly after this instant are read.
    pub fresh_after: Option<SystemTime>,
    /// Traces this run created; fresh regardless of their mtime.
    pub written: BTreeSet<PathBuf>,
}

/// Records gathered by a scan plus the traces that failed to parse.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// One record per fresh trace, in discovery order.
    pub records: Vec<DiagnosticRecord>,
    /// Traces that failed to parse (their records hold only `trace`).
    pub skipped: Vec<TraceParseError>,
}

/// Trace discovery failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DiagnosticsError {
    /// Trace root cannot be listed.
    #[error("cannot scan traces under {}: {reason}", path.display())]
    Unreadable {
        /// Trace root.
        path: PathBuf,
        /// Failure description.
        reason: String,
    },
}

/// Discovers and parses fresh trace files.
///
/// A trace that fails to parse still yields a record holding its `trace`
/// path, so the record count always equals the number of fresh traces.
///
/// # Errors
///
/// Returns [`DiagnosticsError`] when the trace root cannot be listed.
pub fn scan(scan: &TraceScan) -> Result<ScanReport, DiagnosticsError> {
    let candidates = if scan.root.is_file() {
        vec![scan.root.clone()]
    } else {
        FileTree::new(&scan.root, scan.recursive).files_with_extension(&scan.extension).map_err(
            |err| DiagnosticsError::Unreadable {
                path: scan.root.clone(),
                reason: err.to_string(),
            },
        )?
    };

    let mut report = ScanReport::default();
    for path in candidates {
        if !scan.written.contains(&path) && !is_fresh(&path, scan.fresh_after) {
            continue;
        }
        match parse_trace(&path, &scan.grammar) {
            Ok(record) => report.records.push(record),
            Err(err) => {
                report.records.push(DiagnosticRecord::for_trace(&path));
                report.skipped.push(err);
            }
        }
    }
    Ok(report)
}

/// Returns true when `path` was modified strictly after `threshold`.
fn is_fresh(path: &Path, threshold: Option<SystemTime>) -> bool {
    let Some(threshold) = threshold else {
        return true;
    };
    fs::metadata(path).and_then(|meta| meta.modified()).is_ok_and(|modified| modified > threshold)
}

// ============================================================================
// SECTION: Tables
// ============================================================================

/// Records projected onto a fixed column set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultTable {
    /// Column keys.
    pub columns: Vec<String>,
    /// Rows aligned with `columns`; `None` marks a missing key.
    pub rows: Vec<Vec<Option<String>>>,
}

impl ResultTable {
    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true when the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the index of `key` among the columns.
    #[must_use]
    pub fn column(&self, key: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == key)
    }
}

/// Builds one row per record over `keys`.
#[must_use]
pub fn project_to_table(records: &[DiagnosticRecord], keys: &[String]) -> ResultTable {
    let rows = records
        .iter()
        .map(|record| keys.iter().map(|key| record.get(key).map(str::to_string)).collect())
        .collect();
    ResultTable {
        columns: keys.to_vec(),
        rows,
    }
}

// ============================================================================
// SECTION: Summary
// ============================================================================

/// Pass/fail counts and accumulated times.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Summary {
    /// Rows with status `succeed`.
    pub succeeded: usize,
    /// Rows with status `failed`.
    pub failed: usize,
    /// `succeeded + failed`.
    pub total: usize,
    /// Time summed over succeeded rows.
    pub succeeded_time: f64,
    /// `total_time - succeeded_time`.
    pub failed_time: f64,
    /// Time summed over every row with a numeric time.
    pub total_time: f64,
}

/// Summarizes the `status` and `time` columns of `table`.
///
/// Returns `None` when either column is absent. Statuses other than
/// `succeed` and `failed` are not counted; non-numeric times are ignored.
#[must_use]
pub fn summarize(table: &ResultTable) -> Option<Summary> {
    let status_column = table.column(STATUS_KEY)?;
    let time_column = table.column(TIME_KEY)?;
    let mut summary = Summary::default();
    for row in &table.rows {
        let status = row.get(status_column).and_then(Option::as_deref);
        let time = row
            .get(time_column)
            .and_then(Option::as_deref)
            .and_then(|raw| raw.trim().parse::<f64>().ok());
        match status {
            Some(STATUS_SUCCEED) => summary.succeeded += 1,
            Some(STATUS_FAILED) => summary.failed += 1,
            _ => {}
        }
        if let Some(time) = time.filter(|value| value.is_finite()) {
            summary.total_time += time;
            if status == Some(STATUS_SUCCEED) {
                summary.succeeded_time += time;
            }
        }
    }
    summary.total = summary.succeeded + summary.failed;
    summary.failed_time = summary.total_time - summary.succeeded_time;
    Some(summary)
}
