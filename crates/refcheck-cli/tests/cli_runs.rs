// crates/refcheck-cli/tests/cli_runs.rs
// ============================================================================
// Module: CLI Run Tests
// Description: Integration tests running the refcheck binary end to end.
// Purpose: Ensure flag and config driven runs report progress and exit codes.
// Dependencies: refcheck binary, tempfile
// ============================================================================

//! ## Overview
//! Runs the CLI binary against a scripted fake processor and checks files,
//! console output, event logs, and exit codes.

#![cfg(unix)]
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

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const FAKE_PROCESSOR: &str = r#"
while [ $# -gt 0 ]; do
  case "$1" in
    --generate-only) generate=1; shift ;;
    -i) input="$2"; shift 2 ;;
    -o) output="$2"; shift 2 ;;
    -r) reference="$2"; shift 2 ;;
    *) shift ;;
  esac
done
if [ -n "$generate" ]; then
  echo "generated" > "$output"
  exit 0
fi
case "$input" in
  *bad*) echo ">>>> status :: failed"; echo ">>>> time :: 0.5"; exit 1 ;;
esac
echo ">>>> status :: succeed"
echo ">>>> time :: 0.25"
"#;

fn refcheck_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_refcheck"))
}

fn write_script(root: &Path) -> PathBuf {
    let script = root.join("processor.sh");
    fs::write(&script, FAKE_PROCESSOR).unwrap();
    script
}

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"geometry").unwrap();
}

fn run(args: &[&str]) -> Output {
    Command::new(refcheck_bin())
        .args(args)
        .env_remove("REFCHECK_CONFIG")
        .output()
        .expect("run refcheck")
}

fn arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn version_flag_prints_package_version() {
    let output = run(&["--version"]);
    assert!(output.status.success());
    assert_eq!(text(&output.stdout).trim(), format!("refcheck {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn generate_then_verify_round_trip_with_export() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let script = write_script(root);
    touch(&root.join("in/a.dwg"));
    touch(&root.join("in/sub/b.dwg"));
    let script_arg = arg(&script);
    let input = arg(&root.join("in"));
    let refs = arg(&root.join("ref"));
    let traces = arg(&root.join("traces"));
    let export = arg(&root.join("reports/run.csv"));

    let generated = run(&[
        "-E",
        "/bin/sh",
        "--exec-arg",
        script_arg.as_str(),
        "-I",
        input.as_str(),
        "-O",
        refs.as_str(),
        "-g",
        "-r",
        "-j",
        "2",
    ]);
    assert!(generated.status.success(), "stderr: {}", text(&generated.stderr));
    assert!(root.join("ref/a.json").is_file());
    assert!(root.join("ref/sub/b.json").is_file());
    assert!(text(&generated.stdout).contains("2 job(s) matched"));

    let verified = run(&[
        "-E",
        "/bin/sh",
        "--exec-arg",
        script_arg.as_str(),
        "-I",
        input.as_str(),
        "-O",
        traces.as_str(),
        "-R",
        refs.as_str(),
        "-r",
        "-p",
        "--name",
        "nightly",
        "--export-csv",
        export.as_str(),
    ]);
    assert!(verified.status.success(), "stderr: {}", text(&verified.stderr));
    let stdout = text(&verified.stdout);
    assert!(stdout.contains("[1/2] Succeeded"));
    assert!(stdout.contains("Succeeded: 2 (0.500 s)"));
    assert!(stdout.contains("Task nightly finished: 2 job(s), 0 failed, 2 record(s)."));
    assert!(root.join("traces/sub/b.trace").is_file());
    let csv = fs::read(root.join("reports/run.csv")).unwrap();
    assert!(text(&csv[3 ..]).starts_with("status,time\r\n"));
}

#[test]
fn failing_job_sets_failure_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let script = write_script(root);
    touch(&root.join("in/bad.dwg"));
    touch(&root.join("golden.json"));

    let output = run(&[
        "-E",
        "/bin/sh",
        "--exec-arg",
        arg(&script).as_str(),
        "-I",
        arg(&root.join("in")).as_str(),
        "-O",
        arg(&root.join("out")).as_str(),
        "-R",
        arg(&root.join("golden.json")).as_str(),
        "-p",
    ]);
    assert!(!output.status.success());
    let stdout = text(&output.stdout);
    assert!(stdout.contains("Failed (exit code 1)"));
    assert!(stdout.contains("Failed:    1 (0.500 s)"));
}

#[test]
fn config_batch_runs_every_task_and_logs_events() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let script = write_script(root);
    touch(&root.join("in/a.dwg"));
    let config = root.join("tasks.json");
    let document = format!(
        r#"{{"tasks": [
  {{"name": "broken", "executable": "/bin/sh", "executable-args": ["{script}"],
    "generate-only": true, "input": {{"path": "{missing}"}}, "output": {{"path": "{out1}"}}}},
  {{"name": "working", "executable": "/bin/sh", "executable-args": ["{script}"],
    "generate-only": true, "input": {{"path": "{input}"}}, "output": {{"path": "{out2}"}}}}
]}}"#,
        script = script.display(),
        missing = root.join("missing").display(),
        out1 = root.join("out1").display(),
        input = root.join("in").display(),
        out2 = root.join("out2").display(),
    );
    fs::write(&config, document).unwrap();
    let log = root.join("events.jsonl");

    let output = run(&[
        "--config",
        arg(&config).as_str(),
        "--event-log",
        arg(&log).as_str(),
    ]);
    assert!(!output.status.success());
    assert!(root.join("out2/a.json").is_file());
    let stdout = text(&output.stdout);
    assert!(stdout.contains("Task broken failed: invalid input path"));
    assert!(stdout.contains("Task working finished: 1 job(s), 0 failed."));

    let events = fs::read_to_string(&log).unwrap();
    assert!(events.lines().count() >= 4);
    assert!(events.contains(r#""event":"task_failed""#));
    assert!(events.contains(r#""event":"job_finished""#));
}

#[test]
fn missing_reference_flag_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(&[
        "-E",
        "/bin/sh",
        "-I",
        arg(dir.path()).as_str(),
        "-O",
        arg(&dir.path().join("out")).as_str(),
    ]);
    assert!(!output.status.success());
    assert!(text(&output.stderr).contains("--ref-path"));
}

#[test]
fn invalid_jobs_value_is_rejected_before_running() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(&[
        "-E",
        "/bin/sh",
        "-g",
        "-I",
        arg(dir.path()).as_str(),
        "-O",
        arg(&dir.path().join("out")).as_str(),
        "-j",
        "0",
    ]);
    assert!(!output.status.success());
    assert!(text(&output.stderr).contains("Invalid task: jobs"));
    assert!(!dir.path().join("out").exists());
}
