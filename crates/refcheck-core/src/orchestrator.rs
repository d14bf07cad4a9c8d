// crates/refcheck-core/src/orchestrator.rs
// ============================================================================
// Module: Task Orchestrator
// Description: Sequences matching, dispatch, trace aggregation, and export.
// Purpose: Run one task (or a batch of tasks) from an immutable spec.
// Dependencies: thiserror, tokio
// ============================================================================

//! ## Overview
//! A [`TaskSpec`] is the complete, immutable configuration of one task. The
//! [`TaskOrchestrator`] resolves its mode, matches jobs, runs them through the
//! scheduler and the timed runner, and in verify mode scans the fresh traces
//! into a summarized result table that may be exported.
//!
//! ## Invariants
//! - Tasks in a batch run one after another; only jobs within a task run in
//!   parallel.
//! - Path resolution failures abort the task before any job starts.
//! - Job failures and export failures never abort the task.
//! - Trace scanning starts only after every job of the task has finished.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use std::time::SystemTime;

use thiserror::Error;

use crate::diagnostics::DiagnosticsError;
use crate::diagnostics::MarkerGrammar;
use crate::diagnostics::ResultTable;
use crate::diagnostics::STATUS_KEY;
use crate::diagnostics::Summary;
use crate::diagnostics::TIME_KEY;
use crate::diagnostics::TraceScan;
use crate::diagnostics::project_to_table;
use crate::diagnostics::scan;
use crate::diagnostics::summarize;
use crate::events::EventSink;
use crate::events::HarnessEvent;
use crate::events::TaskMode;
use crate::export::resolve_export_path;
use crate::export::write_csv;
use crate::paths::FileTree;
use crate::paths::GENERATED_EXTENSION;
use crate::paths::Job;
use crate::paths::MatchError;
use crate::paths::MatchPlan;
use crate::paths::PathPolicy;
use crate::paths::PathTarget;
use crate::paths::SOURCE_EXTENSION;
use crate::paths::TRACE_EXTENSION;
use crate::paths::match_jobs;
use crate::runner::ProcessInvocation;
use crate::runner::ProcessorCommand;
use crate::runner::SuccessStatus;
use crate::runner::TimedProcessRunner;
use crate::runner::job_deadline;
use crate::scheduler::JobResult;
use crate::scheduler::run_all;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default seconds of deadline per input megabyte.
pub const DEFAULT_TIMEOUT_FACTOR: f64 = 600.0;
/// Default parallelism budget.
pub const DEFAULT_JOBS: usize = 1;

/// Returns the default collected keys.
#[must_use]
pub fn default_keys() -> Vec<String> {
    vec![STATUS_KEY.to_string(), TIME_KEY.to_string()]
}

// ============================================================================
// SECTION: Task Spec
// ============================================================================

/// Input tree of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSpec {
    /// Input file or directory.
    pub path: PathBuf,
    /// Walk subdirectories.
    pub recursive: bool,
}

/// Output location of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSpec {
    /// Output file or directory.
    pub path: PathBuf,
    /// Place every output directly under `path`.
    pub flatten: bool,
}

/// Reference location of a verify task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSpec {
    /// Reference file or directory.
    pub path: PathBuf,
    /// References are stored flat under `path`.
    pub flatten: bool,
}

/// File extensions used by a task, without leading dots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Extension selecting input files.
    pub source_extension: String,
    /// Extension of generated artifacts (and of references).
    pub generated_extension: String,
    /// Extension of verify traces.
    pub trace_extension: String,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            source_extension: SOURCE_EXTENSION.to_string(),
            generated_extension: GENERATED_EXTENSION.to_string(),
            trace_extension: TRACE_EXTENSION.to_string(),
        }
    }
}

/// Immutable configuration of one task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
    /// Task name (also names directory exports).
    pub name: String,
    /// Processor executable and leading arguments.
    pub processor: ProcessorCommand,
    /// Input tree.
    pub input: InputSpec,
    /// Output location.
    pub output: OutputSpec,
    /// Reference location; `None` selects generate mode.
    pub reference: Option<ReferenceSpec>,
    /// Parallelism budget (`< 2` runs sequentially).
    pub jobs: usize,
    /// Seconds of deadline per input megabyte.
    pub timeout_factor: f64,
    /// Exit status convention.
    pub success_status: SuccessStatus,
    /// Marker grammar for traces.
    pub grammar: MarkerGrammar,
    /// File extensions.
    pub layout: Layout,
    /// Keys projected into the result table.
    pub keys: Vec<String>,
    /// Optional export destination (file ending in `.csv`, or a directory).
    pub export: Option<PathBuf>,
}

impl TaskSpec {
    /// Creates a generate task with default settings.
    #[must_use]
    pub fn generate(
        name: impl Into<String>,
        processor: ProcessorCommand,
        input: InputSpec,
        output: OutputSpec,
    ) -> Self {
        Self {
            name: name.into(),
            processor,
            input,
            output,
            reference: None,
            jobs: DEFAULT_JOBS,
            timeout_factor: DEFAULT_TIMEOUT_FACTOR,
            success_status: SuccessStatus::default(),
            grammar: MarkerGrammar::default(),
            layout: Layout::default(),
            keys: default_keys(),
            export: None,
        }
    }

    /// Creates a verify task with default settings.
    #[must_use]
    pub fn verify(
        name: impl Into<String>,
        processor: ProcessorCommand,
        input: InputSpec,
        output: OutputSpec,
        reference: ReferenceSpec,
    ) -> Self {
        Self {
            reference: Some(reference),
            ..Self::generate(name, processor, input, output)
        }
    }

    /// Returns the task mode.
    #[must_use]
    pub const fn mode(&self) -> TaskMode {
        if self.reference.is_some() { TaskMode::Verify } else { TaskMode::Generate }
    }

    /// Builds the matcher plan for this task.
    #[must_use]
    pub fn match_plan(&self) -> MatchPlan {
        let output_extension = match self.mode() {
            TaskMode::Generate => &self.layout.generated_extension,
            TaskMode::Verify => &self.layout.trace_extension,
        };
        MatchPlan {
            input: FileTree::new(&self.input.path, self.input.recursive),
            source_extension: self.layout.source_extension.clone(),
            output: PathTarget::new(
                &self.output.path,
                PathPolicy::new(self.output.flatten, output_extension.clone()),
            ),
            reference: self.reference.as_ref().map(|reference| {
                PathTarget::new(
                    &reference.path,
                    PathPolicy::new(reference.flatten, self.layout.generated_extension.clone()),
                )
            }),
        }
    }

    /// Builds the trace scan for this task's output.
    ///
    /// `written` lists the traces the run just created; other files must be
    /// modified strictly after `fresh_after`.
    #[must_use]
    pub fn trace_scan(
        &self,
        fresh_after: SystemTime,
        written: impl IntoIterator<Item = PathBuf>,
    ) -> TraceScan {
        TraceScan {
            root: self.output.path.clone(),
            recursive: self.input.recursive && !self.output.flatten,
            extension: self.layout.trace_extension.clone(),
            grammar: self.grammar.clone(),
            fresh_after: Some(fresh_after),
            written: written.into_iter().collect(),
        }
    }
}

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Verify-mode report.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyReport {
    /// Result table over the task's keys.
    pub table: ResultTable,
    /// Summary, when the table has `status` and `time` columns.
    pub summary: Option<Summary>,
    /// Traces that failed to parse.
    pub skipped_traces: usize,
    /// Export path, when the export was written.
    pub export: Option<PathBuf>,
}

/// Result of one task run.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutcome {
    /// Task name.
    pub name: String,
    /// Task mode.
    pub mode: TaskMode,
    /// One result per job, in submission order.
    pub results: Vec<JobResult>,
    /// Verify report (verify mode only).
    pub report: Option<VerifyReport>,
}

impl TaskOutcome {
    /// Returns true when every job succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(JobResult::exit_succeeded)
    }

    /// Returns the number of unsuccessful jobs.
    #[must_use]
    pub fn failed_jobs(&self) -> usize {
        self.results.iter().filter(|result| !result.exit_succeeded()).count()
    }

    /// Returns the number of result rows (zero in generate mode).
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.report.as_ref().map_or(0, |report| report.table.len())
    }
}

/// Task-level failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Path resolution failed before dispatch.
    #[error(transparent)]
    Match(#[from] MatchError),
    /// Trace discovery failed after dispatch.
    #[error(transparent)]
    Diagnostics(#[from] DiagnosticsError),
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// Runs tasks and reports progress to an event sink.
#[derive(Clone)]
pub struct TaskOrchestrator {
    /// Event destination.
    sink: Arc<dyn EventSink>,
}

impl TaskOrchestrator {
    /// Creates an orchestrator reporting to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
        }
    }

    /// Runs a batch of tasks one after another.
    ///
    /// A failing task does not stop the remaining ones.
    pub async fn run_batch(&self, specs: &[TaskSpec]) -> Vec<Result<TaskOutcome, TaskError>> {
        let mut outcomes = Vec::with_capacity(specs.len());
        for spec in specs {
            outcomes.push(self.run_task(spec).await);
        }
        outcomes
    }

    /// Runs one task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError`] when path resolution fails (no job runs) or when
    /// the trace root cannot be scanned after a verify run.
    pub async fn run_task(&self, spec: &TaskSpec) -> Result<TaskOutcome, TaskError> {
        let started_at = SystemTime::now();
        let mode = spec.mode();
        self.sink.record(&HarnessEvent::TaskStarted {
            task: spec.name.clone(),
            mode,
        });

        let plan = match_jobs(&spec.match_plan()).map_err(|err| self.fail(spec, err))?;
        for path in plan.created_directories {
            self.sink.record(&HarnessEvent::DirectoryCreated {
                path,
            });
        }
        self.sink.record(&HarnessEvent::JobsMatched {
            task: spec.name.clone(),
            count: plan.jobs.len(),
        });

        let results = self.dispatch(spec, plan.jobs).await;

        let report = match mode {
            TaskMode::Generate => None,
            TaskMode::Verify => Some(self.collect(spec, started_at, &results)?),
        };

        let outcome = TaskOutcome {
            name: spec.name.clone(),
            mode,
            results,
            report,
        };
        self.sink.record(&HarnessEvent::TaskFinished {
            task: spec.name.clone(),
            jobs: outcome.results.len(),
            failed_jobs: outcome.failed_jobs(),
            records: outcome.report.as_ref().map(|report| report.table.len()),
        });
        Ok(outcome)
    }

    /// Runs every job of `spec` through the scheduler.
    async fn dispatch(&self, spec: &TaskSpec, jobs: Vec<Job>) -> Vec<JobResult> {
        let runner = TimedProcessRunner::new(spec.success_status);
        let processor = Arc::new(spec.processor.clone());
        let sink = Arc::clone(&self.sink);
        let task = Arc::new(spec.name.clone());
        let timeout_factor = spec.timeout_factor;
        let mode = spec.mode();

        run_all(jobs, spec.jobs, move |job, ticket| {
            let processor = Arc::clone(&processor);
            let sink = Arc::clone(&sink);
            let task = Arc::clone(&task);
            async move {
                let invocation = ProcessInvocation::for_job(&processor, &job);
                let deadline = job_deadline(timeout_factor, job.size_hint_mb);
                let started = Instant::now();
                let outcome = runner.run(&invocation, deadline).await;
                let result = JobResult::new(job, ticket, outcome, started.elapsed());
                sink.record(&HarnessEvent::JobFinished {
                    task: task.as_ref().clone(),
                    mode,
                    ticket,
                    input: result.job.input.clone(),
                    reference: result.job.reference.clone(),
                    output: result.job.output.clone(),
                    outcome: result.outcome.clone(),
                    elapsed_ms: result.elapsed.as_millis(),
                });
                result
            }
        })
        .await
    }

    /// Scans fresh traces, summarizes them, and writes the optional export.
    fn collect(
        &self,
        spec: &TaskSpec,
        started_at: SystemTime,
        results: &[JobResult],
    ) -> Result<VerifyReport, TaskError> {
        let written = results.iter().map(|result| result.job.output.clone());
        let scanned =
            scan(&spec.trace_scan(started_at, written)).map_err(|err| self.fail(spec, err))?;
        for skipped in &scanned.skipped {
            self.sink.record(&HarnessEvent::TraceSkipped {
                path: skipped.path.clone(),
                reason: skipped.reason.clone(),
            });
        }

        let table = project_to_table(&scanned.records, &spec.keys);
        let summary = summarize(&table);
        if let Some(summary) = summary {
            self.sink.record(&HarnessEvent::TaskSummary {
                task: spec.name.clone(),
                summary,
            });
        }

        let export = match &spec.export {
            Some(destination) if !table.is_empty() => {
                let path = resolve_export_path(destination, &spec.name);
                match write_csv(&table, &path) {
                    Ok(()) => {
                        self.sink.record(&HarnessEvent::ExportWritten {
                            path: path.clone(),
                            rows: table.len(),
                        });
                        Some(path)
                    }
                    Err(err) => {
                        self.sink.record(&HarnessEvent::ExportFailed {
                            path: err.path,
                            reason: err.reason,
                        });
                        None
                    }
                }
            }
            _ => None,
        };

        Ok(VerifyReport {
            table,
            summary,
            skipped_traces: scanned.skipped.len(),
            export,
        })
    }

    /// Records a task failure and converts it into a [`TaskError`].
    fn fail(&self, spec: &TaskSpec, err: impl Into<TaskError>) -> TaskError {
        let err = err.into();
        self.sink.record(&HarnessEvent::TaskFailed {
            task: spec.name.clone(),
            reason: err.to_string(),
        });
        err
    }
}
