// crates/refcheck-cli/src/console.rs
// ============================================================================
// Module: Console Progress Sink
// Description: Human-readable rendering of harness events.
// Purpose: Print task progress, per-job results, and verify statistics.
// Dependencies: refcheck-core
// ============================================================================

//! ## Overview
//! [`ConsoleSink`] renders [`HarnessEvent`]s through the message catalog.
//! Task-level lines are always written; per-job lines, created directories,
//! and skipped traces are written only when the sink is verbose (the task's
//! `print` setting).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use refcheck_core::EventSink;
use refcheck_core::HarnessEvent;
use refcheck_core::RunOutcome;
use refcheck_core::Summary;
use refcheck_core::TaskMode;

use crate::t;

// ============================================================================
// SECTION: Sink
// ============================================================================

/// Event sink writing localized progress lines.
pub struct ConsoleSink<W: Write + Send> {
    /// Output writer.
    writer: Mutex<W>,
    /// Whether per-job detail is written.
    verbose: bool,
}

impl<W: Write + Send> ConsoleSink<W> {
    /// Creates a console sink.
    pub const fn new(writer: W, verbose: bool) -> Self {
        Self {
            writer: Mutex::new(writer),
            verbose,
        }
    }

    /// Consumes the sink and returns the writer.
    ///
    /// # Errors
    ///
    /// Returns the poisoned mutex error when a writer panicked.
    pub fn into_inner(self) -> Result<W, std::sync::PoisonError<W>> {
        self.writer.into_inner()
    }

    /// Writes rendered lines, ignoring I/O failures.
    fn emit(&self, lines: &[String]) {
        let Ok(mut guard) = self.writer.lock() else {
            return;
        };
        for line in lines {
            let _ = writeln!(guard, "{line}");
        }
        let _ = guard.flush();
    }
}

impl<W: Write + Send> EventSink for ConsoleSink<W> {
    fn record(&self, event: &HarnessEvent) {
        let lines = render(event, self.verbose);
        if !lines.is_empty() {
            self.emit(&lines);
        }
    }
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Renders one event into zero or more console lines.
#[must_use]
pub fn render(event: &HarnessEvent, verbose: bool) -> Vec<String> {
    match event {
        HarnessEvent::TaskStarted {
            task,
            mode,
        } => vec![t!("task.started", task = task, mode = mode_label(*mode))],
        HarnessEvent::DirectoryCreated {
            path,
        } if verbose => vec![t!("task.directory_created", path = path.display())],
        HarnessEvent::JobsMatched {
            task,
            count,
        } => vec![t!("task.jobs_matched", task = task, count = count)],
        HarnessEvent::JobFinished {
            ticket,
            input,
            reference,
            output,
            outcome,
            ..
        } if verbose => {
            let paths = job_paths(input, reference.as_deref(), output);
            let line = if outcome.succeeded() {
                t!("job.succeeded", index = ticket.index, total = ticket.total, paths = paths)
            } else {
                t!(
                    "job.failed",
                    index = ticket.index,
                    total = ticket.total,
                    cause = outcome_cause(outcome),
                    paths = paths
                )
            };
            vec![line]
        }
        HarnessEvent::TraceSkipped {
            path,
            reason,
        } if verbose => vec![t!("trace.skipped", path = path.display(), reason = reason)],
        HarnessEvent::TaskSummary {
            summary, ..
        } => summary_lines(summary),
        HarnessEvent::ExportWritten {
            path,
            rows,
        } => vec![t!("export.written", rows = rows, path = path.display())],
        HarnessEvent::ExportFailed {
            path,
            reason,
        } => vec![t!("export.failed", path = path.display(), reason = reason)],
        HarnessEvent::TaskFailed {
            task,
            reason,
        } => vec![t!("task.failed", task = task, reason = reason)],
        HarnessEvent::TaskFinished {
            task,
            jobs,
            failed_jobs,
            records,
        } => {
            let line = match records {
                Some(records) => t!(
                    "task.finished_verify",
                    task = task,
                    jobs = jobs,
                    failed = failed_jobs,
                    records = records
                ),
                None => t!("task.finished", task = task, jobs = jobs, failed = failed_jobs),
            };
            vec![line]
        }
        HarnessEvent::DirectoryCreated {
            ..
        }
        | HarnessEvent::JobFinished {
            ..
        }
        | HarnessEvent::TraceSkipped {
            ..
        } => Vec::new(),
    }
}

/// Returns the display label of a mode.
fn mode_label(mode: TaskMode) -> String {
    match mode {
        TaskMode::Generate => t!("mode.generate"),
        TaskMode::Verify => t!("mode.verify"),
    }
}

/// Formats the paths of a job.
fn job_paths(input: &Path, reference: Option<&Path>, output: &Path) -> String {
    match reference {
        Some(reference) => t!(
            "job.paths.verify",
            input = input.display(),
            reference = reference.display(),
            output = output.display()
        ),
        None => t!("job.paths.generate", input = input.display(), output = output.display()),
    }
}

/// Describes why a job ended the way it did.
fn outcome_cause(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Succeeded => t!("job.cause.succeeded"),
        RunOutcome::Exited {
            code: Some(code),
        } => t!("job.cause.exited", code = code),
        RunOutcome::Exited {
            code: None,
        } => t!("job.cause.signaled"),
        RunOutcome::TimedOut {
            deadline_ms,
        } => t!("job.cause.timed_out", deadline = deadline_ms),
        RunOutcome::SpawnFailed {
            reason,
        } => t!("job.cause.spawn_failed", reason = reason),
        RunOutcome::Aborted {
            reason,
        } => t!("job.cause.aborted", reason = reason),
    }
}

/// Renders the three-line statistics block.
fn summary_lines(summary: &Summary) -> Vec<String> {
    vec![
        t!(
            "summary.succeeded",
            count = summary.succeeded,
            time = format!("{:.3}", summary.succeeded_time)
        ),
        t!("summary.failed", count = summary.failed, time = format!("{:.3}", summary.failed_time)),
        t!("summary.total", count = summary.total, time = format!("{:.3}", summary.total_time)),
    ]
}
