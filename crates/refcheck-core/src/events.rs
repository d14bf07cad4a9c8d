// crates/refcheck-core/src/events.rs
// ============================================================================
// Module: Harness Events
// Description: Structured events and sinks for task progress logging.
// Purpose: Emit machine-readable records without hard logging dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The orchestrator reports everything it does as [`HarnessEvent`]s. Sinks
//! decide where they go: [`JsonLineSink`] writes one JSON object per line,
//! [`FanoutSink`] forwards to several sinks, and [`NoopSink`] drops them.
//! Front-ends add their own sinks for human-readable progress.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::diagnostics::Summary;
use crate::runner::RunOutcome;
use crate::scheduler::JobTicket;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Task mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskMode {
    /// Produce reference artifacts.
    Generate,
    /// Check inputs against references and collect traces.
    Verify,
}

/// Structured harness event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HarnessEvent {
    /// A task began.
    TaskStarted {
        /// Task name.
        task: String,
        /// Task mode.
        mode: TaskMode,
    },
    /// The matcher created a directory.
    DirectoryCreated {
        /// Created directory.
        path: PathBuf,
    },
    /// The job list was computed.
    JobsMatched {
        /// Task name.
        task: String,
        /// Number of jobs.
        count: usize,
    },
    /// One job finished.
    JobFinished {
        /// Task name.
        task: String,
        /// Task mode.
        mode: TaskMode,
        /// Submission position.
        ticket: JobTicket,
        /// Input file.
        input: PathBuf,
        /// Reference file (verify only).
        reference: Option<PathBuf>,
        /// Output or trace file.
        output: PathBuf,
        /// Run outcome.
        outcome: RunOutcome,
        /// Wall-clock duration in milliseconds.
        elapsed_ms: u128,
    },
    /// A trace failed to parse and contributed only its path.
    TraceSkipped {
        /// Trace path.
        path: PathBuf,
        /// Failure description.
        reason: String,
    },
    /// Verify results were summarized.
    TaskSummary {
        /// Task name.
        task: String,
        /// Summary values.
        summary: Summary,
    },
    /// The result table was exported.
    ExportWritten {
        /// Export path.
        path: PathBuf,
        /// Number of rows written.
        rows: usize,
    },
    /// The result table could not be exported.
    ExportFailed {
        /// Export path.
        path: PathBuf,
        /// Failure description.
        reason: String,
    },
    /// A task stopped during pre-flight or scanning.
    TaskFailed {
        /// Task name.
        task: String,
        /// Failure description.
        reason: String,
    },
    /// A task completed.
    TaskFinished {
        /// Task name.
        task: String,
        /// Number of jobs executed.
        jobs: usize,
        /// Number of unsuccessful jobs.
        failed_jobs: usize,
        /// Number of result rows (verify only).
        records: Option<usize>,
    },
}

/// Event envelope carrying the emission time.
#[derive(Debug, Clone, Serialize)]
struct EventRecord<'a> {
    /// Emission time (milliseconds since epoch).
    timestamp_ms: u128,
    /// Event payload.
    #[serde(flatten)]
    event: &'a HarnessEvent,
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Destination for harness events.
pub trait EventSink: Send + Sync {
    /// Records one event. Sinks must not fail the task.
    fn record(&self, event: &HarnessEvent);
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn record(&self, _event: &HarnessEvent) {}
}

/// Sink writing one JSON object per line.
pub struct JsonLineSink<W: Write + Send> {
    /// Output writer.
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLineSink<W> {
    /// Creates a sink over `writer`.
    pub const fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Consumes the sink and returns the writer.
    ///
    /// # Errors
    ///
    /// Returns the writer's poisoned mutex error when a writer panicked.
    pub fn into_inner(self) -> Result<W, std::sync::PoisonError<W>> {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> EventSink for JsonLineSink<W> {
    fn record(&self, event: &HarnessEvent) {
        let record = EventRecord {
            timestamp_ms: now_millis(),
            event,
        };
        let Ok(mut guard) = self.writer.lock() else {
            return;
        };
        if serde_json::to_writer(&mut *guard, &record).is_ok() {
            let _ = guard.write_all(b"\n");
            let _ = guard.flush();
        }
    }
}

/// Sink forwarding every event to each inner sink in order.
#[derive(Clone, Default)]
pub struct FanoutSink {
    /// Inner sinks.
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    /// Creates an empty fan-out.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sink.
    #[must_use]
    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutSink {
    fn record(&self, event: &HarnessEvent) {
        for sink in &self.sinks {
            sink.record(event);
        }
    }
}

/// Returns the current time in milliseconds since the Unix epoch.
fn now_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
