// crates/refcheck-cli/src/i18n.rs
// ============================================================================
// Module: CLI Message Catalog
// Description: Message catalog and translation utilities for the CLI.
// Purpose: Centralize user-facing strings for consistent console output.
// Dependencies: Standard library collections and formatting utilities.
// ============================================================================

//! ## Overview
//! User-facing strings live in a small catalog keyed by stable identifiers.
//! All console output is routed through the [`t!`](crate::t) macro.
//!
//! ## Invariants
//! - The catalog is initialized once and read-only thereafter.
//! - Missing keys fall back to the key itself to avoid panics.
//! - Placeholder substitutions preserve deterministic order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::OnceLock;

// ============================================================================
// SECTION: Types
// ============================================================================

/// A formatted message argument captured by the [`macro@crate::t`] macro.
#[derive(Clone)]
pub struct MessageArg {
    /// The placeholder name used in message templates (e.g., `"path"`).
    pub key: &'static str,
    /// The formatted string value to substitute for this placeholder.
    pub value: String,
}

impl MessageArg {
    /// Constructs a new [`MessageArg`] from a key and displayable value.
    pub fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Static catalog entries.
pub(crate) const CATALOG_ITEMS: &[(&str, &str)] = &[
    ("main.version", "refcheck {version}"),
    ("output.stream.stdout", "stdout"),
    ("output.stream.stderr", "stderr"),
    ("output.stream.unknown", "output"),
    ("output.write_failed", "Failed to write to {stream}: {error}"),
    ("config.load_failed", "Failed to load config: {error}"),
    ("cli.missing_argument", "Missing required argument {flag} (or use --config)."),
    ("cli.invalid_task", "Invalid task: {error}"),
    ("cli.event_log_failed", "Cannot open event log {path}: {error}"),
    ("mode.generate", "GENERATE"),
    ("mode.verify", "VERIFY"),
    ("task.started", "Task {task}: {mode} started."),
    ("task.directory_created", "Created directory {path}"),
    ("task.jobs_matched", "Task {task}: {count} job(s) matched."),
    ("task.failed", "Task {task} failed: {reason}"),
    ("task.finished", "Task {task} finished: {jobs} job(s), {failed} failed."),
    (
        "task.finished_verify",
        "Task {task} finished: {jobs} job(s), {failed} failed, {records} record(s).",
    ),
    ("job.succeeded", "[{index}/{total}] Succeeded: {paths}"),
    ("job.failed", "[{index}/{total}] Failed ({cause}): {paths}"),
    ("job.paths.generate", "{input} -> {output}"),
    ("job.paths.verify", "{input} vs {reference} -> {output}"),
    ("job.cause.succeeded", "succeeded"),
    ("job.cause.exited", "exit code {code}"),
    ("job.cause.signaled", "terminated by signal"),
    ("job.cause.timed_out", "timed out after {deadline} ms"),
    ("job.cause.spawn_failed", "spawn failed: {reason}"),
    ("job.cause.aborted", "aborted: {reason}"),
    ("trace.skipped", "Skipped unreadable trace {path}: {reason}"),
    ("summary.succeeded", "Succeeded: {count} ({time} s)"),
    ("summary.failed", "Failed:    {count} ({time} s)"),
    ("summary.total", "Total:     {count} ({time} s)"),
    ("export.written", "Exported {rows} row(s) to {path}"),
    ("export.failed", "Export to {path} failed: {reason}"),
];

// ============================================================================
// SECTION: Translation
// ============================================================================

/// Translates `key` using the catalog while substituting `args`.
#[must_use]
pub fn translate(key: &str, args: Vec<MessageArg>) -> String {
    let template = catalog().get(key).copied().unwrap_or(key);
    if args.is_empty() {
        return template.to_string();
    }

    let mut result = template.to_string();
    for arg in args {
        let placeholder = format!("{{{}}}", arg.key);
        result = result.replace(&placeholder, &arg.value);
    }
    result
}

/// Returns the message catalog.
pub(crate) fn catalog() -> &'static HashMap<&'static str, &'static str> {
    static CATALOG: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();

    CATALOG.get_or_init(|| CATALOG_ITEMS.iter().copied().collect())
}

// ============================================================================
// SECTION: Macro
// ============================================================================

/// Formats a catalog message from a key and named arguments.
///
/// # Arguments
///
/// - `$key` must match a catalog entry.
/// - Named arguments are substituted into `{placeholder}` positions.
#[macro_export]
macro_rules! t {
    ($key:literal $(, $name:ident = $value:expr )* $(,)?) => {{
        let args = ::std::vec![
            $(
                $crate::i18n::MessageArg::new(stringify!($name), $value.to_string()),
            )*
        ];
        $crate::i18n::translate($key, args)
    }};
}
