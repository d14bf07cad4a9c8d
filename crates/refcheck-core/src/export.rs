// crates/refcheck-core/src/export.rs
// ============================================================================
// Module: Result Export
// Description: CSV export of verify result tables.
// Purpose: Persist one row per trace for spreadsheet tooling.
// Dependencies: thiserror, std
// ============================================================================

//! ## Overview
//! Tables are written as comma-separated text, UTF-8 with a byte-order mark,
//! a header row of column keys, and one row per trace. Missing values are
//! empty fields. Fields containing commas, quotes, or line breaks are quoted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;

use crate::diagnostics::ResultTable;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Extension marking an export destination as a file path.
pub const EXPORT_EXTENSION: &str = "csv";
/// UTF-8 byte-order mark.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Export write failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("cannot write export {}: {reason}", path.display())]
pub struct ExportError {
    /// Destination path.
    pub path: PathBuf,
    /// Failure description.
    pub reason: String,
}

// ============================================================================
// SECTION: Export
// ============================================================================

/// Resolves where a task's table is written.
///
/// A destination ending in `.csv` is used as-is; anything else is treated as
/// a directory receiving `<task_name>.csv`.
#[must_use]
pub fn resolve_export_path(destination: &Path, task_name: &str) -> PathBuf {
    if destination.extension().is_some_and(|ext| ext == EXPORT_EXTENSION) {
        destination.to_path_buf()
    } else {
        destination.join(format!("{task_name}.{EXPORT_EXTENSION}"))
    }
}

/// Writes `table` to `path`, creating parent directories.
///
/// # Errors
///
/// Returns [`ExportError`] when the directory or file cannot be written.
pub fn write_csv(table: &ResultTable, path: &Path) -> Result<(), ExportError> {
    let failure = |err: std::io::Error| ExportError {
        path: path.to_path_buf(),
        reason: err.to_string(),
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(failure)?;
    }
    let mut writer = BufWriter::new(fs::File::create(path).map_err(failure)?);
    writer.write_all(UTF8_BOM).map_err(failure)?;
    write_row(&mut writer, table.columns.iter().map(String::as_str)).map_err(failure)?;
    for row in &table.rows {
        write_row(&mut writer, row.iter().map(|cell| cell.as_deref().unwrap_or(""))).map_err(failure)?;
    }
    writer.flush().map_err(failure)
}

/// Writes one CSV record terminated by CRLF.
fn write_row<'a, W: Write>(
    writer: &mut W,
    cells: impl Iterator<Item = &'a str>,
) -> std::io::Result<()> {
    for (index, cell) in cells.enumerate() {
        if index > 0 {
            writer.write_all(b",")?;
        }
        writer.write_all(escape_field(cell).as_bytes())?;
    }
    writer.write_all(b"\r\n")
}

/// Quotes a field when it contains CSV metacharacters.
fn escape_field(value: &str) -> String {
    if value.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
