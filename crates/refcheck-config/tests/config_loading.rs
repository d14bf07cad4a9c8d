// crates/refcheck-config/tests/config_loading.rs
// ============================================================================
// Module: Task Document Tests
// Description: Integration tests for loading and validating task documents.
// Purpose: Ensure defaults apply, both formats parse, and bad input fails closed.
// Dependencies: refcheck-config, refcheck-core, tempfile
// ============================================================================

//! ## Overview
//! Writes task documents to scratch directories and loads them through the
//! public API, checking defaults, conversions, and validation failures.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;

use refcheck_config::ConfigError;
use refcheck_config::DocumentFormat;
use refcheck_config::HarnessConfig;
use refcheck_config::MAX_CONFIG_FILE_SIZE;
use refcheck_core::SuccessStatus;
use refcheck_core::TaskMode;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const MINIMAL_JSON: &str = r#"{
  "tasks": [{
    "name": "nightly",
    "executable": "/opt/proc/bin/processor",
    "input": {"path": "in", "recursive": true},
    "output": {"path": "out"},
    "reference": {"path": "ref", "flatten": true}
  }]
}"#;

fn invalid(content: &str) -> String {
    let config = HarnessConfig::parse(content, DocumentFormat::Json).unwrap();
    match config.validate() {
        Err(ConfigError::Invalid(message)) => message,
        other => panic!("expected invalid config, got {other:?}"),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn json_document_applies_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.json");
    fs::write(&path, MINIMAL_JSON).unwrap();

    let config = HarnessConfig::load(Some(&path)).unwrap();
    let specs = config.to_specs();
    assert_eq!(specs.len(), 1);
    let spec = &specs[0];
    assert_eq!(spec.name, "nightly");
    assert_eq!(spec.mode(), TaskMode::Verify);
    assert_eq!(spec.jobs, 1);
    assert!((spec.timeout_factor - 600.0).abs() < f64::EPSILON);
    assert_eq!(spec.keys, vec!["status".to_string(), "time".to_string()]);
    assert_eq!(spec.grammar.prefix, ">>>>");
    assert_eq!(spec.grammar.separator, "::");
    assert_eq!(spec.layout.source_extension, "dwg");
    assert_eq!(spec.success_status, SuccessStatus::Zero);
    assert!(spec.input.recursive);
    assert!(!spec.output.flatten);
    assert!(spec.reference.as_ref().unwrap().flatten);
    assert!(spec.export.is_none());
}

#[test]
fn toml_document_is_selected_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.toml");
    fs::write(
        &path,
        r#"
[[tasks]]
executable = "/bin/sh"
executable-args = ["processor.sh"]
generate-only = true
jobs = 8
timeout-factor = 30.0
success-exit = "non-zero"
source-extension = "step"
export-csv = "reports/"

[tasks.input]
path = "in"

[tasks.output]
path = "out"
flatten = true
"#,
    )
    .unwrap();

    let spec = HarnessConfig::load(Some(&path)).unwrap().to_specs().remove(0);
    assert_eq!(spec.mode(), TaskMode::Generate);
    assert!(spec.name.starts_with("task-"));
    assert_eq!(spec.processor.executable, PathBuf::from("/bin/sh"));
    assert_eq!(spec.processor.leading_args, vec![OsString::from("processor.sh")]);
    assert_eq!(spec.jobs, 8);
    assert_eq!(spec.success_status, SuccessStatus::NonZero);
    assert_eq!(spec.layout.source_extension, "step");
    assert_eq!(spec.export, Some(PathBuf::from("reports/")));
}

#[test]
fn empty_export_destination_uses_task_name() {
    let content = MINIMAL_JSON.replace(r#""name": "nightly","#, r#""name": "nightly", "export-csv": "","#);
    let config = HarnessConfig::parse(&content, DocumentFormat::Json).unwrap();
    config.validate().unwrap();
    assert_eq!(config.to_specs()[0].export, Some(PathBuf::from("nightly.csv")));
}

#[test]
fn path_fields_are_trimmed_like_validation_reads_them() {
    let content = r#"{"tasks": [{
      "name": "padded",
      "executable": " /opt/proc/bin/processor ",
      "input": {"path": " in "},
      "output": {"path": "out\t"},
      "reference": {"path": "  ref"},
      "export-csv": " reports/run.csv "
    }]}"#;
    let config = HarnessConfig::parse(content, DocumentFormat::Json).unwrap();
    config.validate().unwrap();
    let spec = config.to_specs().remove(0);
    assert_eq!(spec.processor.executable, PathBuf::from("/opt/proc/bin/processor"));
    assert_eq!(spec.input.path, PathBuf::from("in"));
    assert_eq!(spec.output.path, PathBuf::from("out"));
    assert_eq!(spec.reference.unwrap().path, PathBuf::from("ref"));
    assert_eq!(spec.export, Some(PathBuf::from("reports/run.csv")));
}

#[test]
fn generate_only_ignores_reference_section() {
    let content = MINIMAL_JSON.replace(r#""name": "nightly","#, r#""name": "g", "generate-only": true,"#);
    let config = HarnessConfig::parse(&content, DocumentFormat::Json).unwrap();
    config.validate().unwrap();
    assert!(config.to_specs()[0].reference.is_none());
}

#[test]
fn missing_reference_without_generate_only_is_rejected() {
    let message = invalid(
        r#"{"tasks": [{"executable": "p", "input": {"path": "in"}, "output": {"path": "out"}}]}"#,
    );
    assert!(message.contains("tasks[0]"));
    assert!(message.contains("reference is required"));
}

#[test]
fn out_of_range_fields_are_rejected() {
    assert!(invalid(&MINIMAL_JSON.replace(r#""name": "nightly","#, r#""jobs": 0,"#)).contains("jobs"));
    assert!(invalid(&MINIMAL_JSON.replace(r#""name": "nightly","#, r#""jobs": 999,"#)).contains("jobs"));
    assert!(
        invalid(&MINIMAL_JSON.replace(r#""name": "nightly","#, r#""timeout-factor": -1.0,"#))
            .contains("timeout-factor")
    );
    assert!(invalid(&MINIMAL_JSON.replace(r#""name": "nightly","#, r#""keys": [],"#)).contains("keys"));
    assert!(
        invalid(&MINIMAL_JSON.replace(r#""name": "nightly","#, r#""marker-prefix": "","#))
            .contains("marker-prefix")
    );
    assert!(invalid(&MINIMAL_JSON.replace(r#""name": "nightly","#, r#""name": "a/b","#)).contains("name"));
}

#[test]
fn empty_document_is_rejected() {
    assert!(invalid(r#"{"tasks": []}"#).contains("at least one task"));
}

#[test]
fn unknown_fields_fail_to_parse() {
    let content = MINIMAL_JSON.replace(r#""name": "nightly","#, r#""threads": 4,"#);
    let err = HarnessConfig::parse(&content, DocumentFormat::Json).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn oversized_document_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("huge.json");
    fs::write(&path, " ".repeat(MAX_CONFIG_FILE_SIZE + 1)).unwrap();
    let err = HarnessConfig::load(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("size limit"));
}

#[test]
fn non_utf8_document_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(&path, [0xFF, 0xFE, 0x00]).unwrap();
    let err = HarnessConfig::load(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("utf-8"));
}

#[test]
fn missing_document_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = HarnessConfig::load(Some(&dir.path().join("absent.json"))).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}
