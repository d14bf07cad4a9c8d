// crates/refcheck-cli/src/tests/console.rs
// ============================================================================
// Module: Console Sink Tests
// Description: Unit tests for human-readable event rendering.
// Purpose: Ensure verbosity gating, job lines, and the statistics block.
// Dependencies: refcheck-cli console module, refcheck-core
// ============================================================================

//! ## Overview
//! Renders representative events and checks the console lines they produce.

use std::path::PathBuf;
use std::time::Duration;

use refcheck_core::EventSink;
use refcheck_core::HarnessEvent;
use refcheck_core::JobTicket;
use refcheck_core::RunOutcome;
use refcheck_core::Summary;
use refcheck_core::TaskMode;

use crate::console::ConsoleSink;
use crate::console::render;

fn job_finished(outcome: RunOutcome, reference: Option<&str>) -> HarnessEvent {
    HarnessEvent::JobFinished {
        task: "nightly".to_string(),
        mode: TaskMode::Verify,
        ticket: JobTicket {
            index: 2,
            total: 3,
        },
        input: PathBuf::from("in/a.dwg"),
        reference: reference.map(PathBuf::from),
        output: PathBuf::from("out/a.trace"),
        outcome,
        elapsed_ms: Duration::from_millis(5).as_millis(),
    }
}

#[test]
fn job_lines_require_verbose_sink() {
    let event = job_finished(RunOutcome::Succeeded, Some("ref/a.json"));
    assert!(render(&event, false).is_empty());
    assert_eq!(
        render(&event, true),
        vec!["[2/3] Succeeded: in/a.dwg vs ref/a.json -> out/a.trace".to_string()]
    );
}

#[test]
fn failed_jobs_name_their_cause() {
    let timed_out = job_finished(
        RunOutcome::TimedOut {
            deadline_ms: 500,
        },
        None,
    );
    assert_eq!(
        render(&timed_out, true),
        vec!["[2/3] Failed (timed out after 500 ms): in/a.dwg -> out/a.trace".to_string()]
    );
    let exited = job_finished(
        RunOutcome::Exited {
            code: Some(4),
        },
        None,
    );
    assert!(render(&exited, true)[0].contains("exit code 4"));
}

#[test]
fn summary_renders_three_line_block() {
    let event = HarnessEvent::TaskSummary {
        task: "nightly".to_string(),
        summary: Summary {
            succeeded: 1,
            failed: 1,
            total: 2,
            succeeded_time: 0.42,
            failed_time: 0.1,
            total_time: 0.52,
        },
    };
    let lines = render(&event, false);
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "Succeeded: 1 (0.420 s)");
    assert_eq!(lines[1], "Failed:    1 (0.100 s)");
    assert_eq!(lines[2], "Total:     2 (0.520 s)");
}

#[test]
fn sink_writes_task_lines_regardless_of_verbosity() {
    let sink = ConsoleSink::new(Vec::new(), false);
    sink.record(&HarnessEvent::TaskStarted {
        task: "nightly".to_string(),
        mode: TaskMode::Generate,
    });
    sink.record(&HarnessEvent::DirectoryCreated {
        path: PathBuf::from("out/sub"),
    });
    sink.record(&HarnessEvent::TaskFinished {
        task: "nightly".to_string(),
        jobs: 3,
        failed_jobs: 1,
        records: None,
    });
    let text = String::from_utf8(sink.into_inner().unwrap()).unwrap();
    assert_eq!(
        text,
        "Task nightly: GENERATE started.\nTask nightly finished: 3 job(s), 1 failed.\n"
    );
}
