// crates/refcheck-core/src/runner.rs
// ============================================================================
// Module: Timed Process Runner
// Description: Single processor invocation under a size-proportional deadline.
// Purpose: Spawn, wait, and forcibly terminate external processes.
// Dependencies: serde, tokio
// ============================================================================

//! ## Overview
//! A [`ProcessInvocation`] is a literal argv plus a stream target. The
//! [`TimedProcessRunner`] spawns it with stdin closed and both output streams
//! redirected, waits up to the deadline, and kills the child on expiry.
//! Arguments are never passed through a shell.
//!
//! ## Invariants
//! - A run is successful only when the child exited on its own and its exit
//!   status satisfies the configured [`SuccessStatus`].
//! - Spawn failures, timeouts, and non-matching exits are all failures.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::ffi::OsString;
use std::fs::File;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use tokio::process::Command;
use tokio::time::timeout;

use crate::paths::DEFAULT_SIZE_HINT_MB;
use crate::paths::Job;

// ============================================================================
// SECTION: Deadlines
// ============================================================================

/// Returns the deadline for a job of `size_hint_mb` megabytes.
///
/// Inputs smaller than one megabyte (or of unknown size) still receive the
/// full `timeout_factor` seconds.
#[must_use]
pub fn job_deadline(timeout_factor: f64, size_hint_mb: f64) -> Duration {
    let size = if size_hint_mb.is_finite() {
        size_hint_mb.max(DEFAULT_SIZE_HINT_MB)
    } else {
        DEFAULT_SIZE_HINT_MB
    };
    Duration::try_from_secs_f64(timeout_factor * size).unwrap_or(Duration::MAX)
}

// ============================================================================
// SECTION: Invocation
// ============================================================================

/// Destination for a child's stdout and stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTarget {
    /// Both streams go to the null device.
    Discard,
    /// Both streams are written into this file (truncated first).
    File(PathBuf),
}

/// Processor executable plus arguments prepended to every invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorCommand {
    /// Executable path.
    pub executable: PathBuf,
    /// Arguments placed before the job arguments.
    pub leading_args: Vec<OsString>,
}

impl ProcessorCommand {
    /// Creates a processor command without leading arguments.
    #[must_use]
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            leading_args: Vec::new(),
        }
    }

    /// Appends a leading argument.
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<OsString>) -> Self {
        self.leading_args.push(arg.into());
        self
    }
}

/// Literal process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInvocation {
    /// Program to execute.
    pub program: PathBuf,
    /// Arguments, one argv entry each.
    pub args: Vec<OsString>,
    /// Stream destination.
    pub output: StreamTarget,
}

impl ProcessInvocation {
    /// Creates an invocation with no arguments and discarded output.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            output: StreamTarget::Discard,
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Redirects both output streams into `path`.
    #[must_use]
    pub fn capture_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = StreamTarget::File(path.into());
        self
    }

    /// Builds the invocation for `job`.
    ///
    /// Generate jobs (no reference) run
    /// `--generate-only -i <input> -o <output>` with output discarded. Verify
    /// jobs run `-i <input> -o <trace> -r <reference>` and capture both
    /// streams into the trace file.
    #[must_use]
    pub fn for_job(processor: &ProcessorCommand, job: &Job) -> Self {
        let mut invocation = Self::new(&processor.executable);
        invocation.args.extend(processor.leading_args.iter().cloned());
        match &job.reference {
            None => invocation
                .arg("--generate-only")
                .arg("-i")
                .arg(&job.input)
                .arg("-o")
                .arg(&job.output),
            Some(reference) => invocation
                .arg("-i")
                .arg(&job.input)
                .arg("-o")
                .arg(&job.output)
                .arg("-r")
                .arg(reference)
                .capture_to(&job.output),
        }
    }
}

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Exit status convention treated as success.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuccessStatus {
    /// Exit code zero is success (platform convention).
    #[default]
    Zero,
    /// Any non-zero exit code is success.
    NonZero,
}

impl SuccessStatus {
    /// Returns true when `status` counts as success.
    #[must_use]
    pub fn accepts(self, status: ExitStatus) -> bool {
        match self {
            Self::Zero => status.success(),
            Self::NonZero => status.code().is_some_and(|code| code != 0),
        }
    }
}

/// Result of a single timed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The process exited with a success status.
    Succeeded,
    /// The process exited with a non-success status (`None` when killed by a signal).
    Exited {
        /// Exit code, when available.
        code: Option<i32>,
    },
    /// The deadline elapsed and the process was killed.
    TimedOut {
        /// Deadline in milliseconds.
        deadline_ms: u128,
    },
    /// The process could not be started.
    SpawnFailed {
        /// Failure description.
        reason: String,
    },
    /// Waiting failed or the execution was torn down.
    Aborted {
        /// Failure description.
        reason: String,
    },
}

impl RunOutcome {
    /// Returns true only for [`RunOutcome::Succeeded`].
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

// ============================================================================
// SECTION: Runner
// ============================================================================

/// Runs one external command under a deadline.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimedProcessRunner {
    /// Exit status convention.
    success: SuccessStatus,
}

impl TimedProcessRunner {
    /// Creates a runner using `success` to classify exit statuses.
    #[must_use]
    pub const fn new(success: SuccessStatus) -> Self {
        Self {
            success,
        }
    }

    /// Runs `invocation`, killing it if it outlives `deadline`.
    pub async fn run(&self, invocation: &ProcessInvocation, deadline: Duration) -> RunOutcome {
        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);
        command.stdin(Stdio::null());
        command.kill_on_drop(true);
        match &invocation.output {
            StreamTarget::Discard => {
                command.stdout(Stdio::null());
                command.stderr(Stdio::null());
            }
            StreamTarget::File(path) => match capture_streams(path) {
                Ok((stdout, stderr)) => {
                    command.stdout(stdout);
                    command.stderr(stderr);
                }
                Err(reason) => return RunOutcome::SpawnFailed { reason },
            },
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                return RunOutcome::SpawnFailed {
                    reason: format!("spawn {} failed: {err}", invocation.program.display()),
                };
            }
        };

        let waited = timeout(deadline, child.wait()).await;
        match waited {
            Ok(Ok(status)) if self.success.accepts(status) => RunOutcome::Succeeded,
            Ok(Ok(status)) => RunOutcome::Exited {
                code: status.code(),
            },
            Ok(Err(err)) => RunOutcome::Aborted {
                reason: format!("wait failed: {err}"),
            },
            Err(_) => {
                // kill() also reaps the child.
                let _ = child.kill().await;
                RunOutcome::TimedOut {
                    deadline_ms: deadline.as_millis(),
                }
            }
        }
    }
}

/// Opens `path` for both output streams of a child.
fn capture_streams(path: &Path) -> Result<(Stdio, Stdio), String> {
    let stdout = File::create(path)
        .map_err(|err| format!("cannot create {}: {err}", path.display()))?;
    let stderr =
        stdout.try_clone().map_err(|err| format!("cannot share {}: {err}", path.display()))?;
    Ok((Stdio::from(stdout), Stdio::from(stderr)))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
