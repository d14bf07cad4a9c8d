// crates/refcheck-core/src/scheduler.rs
// ============================================================================
// Module: Concurrency Scheduler
// Description: Bounded fan-out of jobs with per-job failure isolation.
// Purpose: Execute every job exactly once under a parallelism budget.
// Dependencies: serde, tokio
// ============================================================================

//! ## Overview
//! [`run_all`] admits jobs in submission order through a semaphore. With a
//! budget below two the semaphore has a single permit, so jobs run strictly
//! one after another in list order. Otherwise at most `max_parallel`
//! executions are in flight and a freed permit is handed to the next queued
//! job.
//!
//! ## Invariants
//! - Exactly one [`JobResult`] is produced per submitted job.
//! - A panicking execution becomes an [`RunOutcome::Aborted`] result; sibling
//!   jobs are unaffected.
//! - Results are returned in submission order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::paths::Job;
use crate::runner::RunOutcome;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Display position of a job within its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobTicket {
    /// 1-based submission index.
    pub index: usize,
    /// Number of jobs in the batch.
    pub total: usize,
}

/// Outcome of one executed job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobResult {
    /// The executed job.
    pub job: Job,
    /// Submission position.
    pub ticket: JobTicket,
    /// Run outcome.
    pub outcome: RunOutcome,
    /// Wall-clock duration of the execution.
    pub elapsed: Duration,
}

impl JobResult {
    /// Creates a job result.
    #[must_use]
    pub const fn new(job: Job, ticket: JobTicket, outcome: RunOutcome, elapsed: Duration) -> Self {
        Self {
            job,
            ticket,
            outcome,
            elapsed,
        }
    }

    /// Returns true when the process exited successfully before its deadline.
    #[must_use]
    pub const fn exit_succeeded(&self) -> bool {
        self.outcome.succeeded()
    }
}

/// Scheduling policy derived from a parallelism budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulePolicy {
    /// One job at a time, in list order.
    Sequential,
    /// Up to this many jobs at once.
    Bounded(usize),
}

impl SchedulePolicy {
    /// Selects the policy for `max_parallel`.
    #[must_use]
    pub const fn from_max_parallel(max_parallel: usize) -> Self {
        if max_parallel < 2 { Self::Sequential } else { Self::Bounded(max_parallel) }
    }

    /// Returns the number of concurrent execution slots.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::Sequential => 1,
            Self::Bounded(width) => width,
        }
    }
}

// ============================================================================
// SECTION: Scheduling
// ============================================================================

/// Runs every job through `execute` under the `max_parallel` budget.
///
/// Submission blocks while all slots are busy; there is no polling. Every job
/// yields exactly one result, including jobs whose execution panicked.
pub async fn run_all<F, Fut>(jobs: Vec<Job>, max_parallel: usize, execute: F) -> Vec<JobResult>
where
    F: Fn(Job, JobTicket) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = JobResult> + Send + 'static,
{
    let total = jobs.len();
    let slots = Arc::new(Semaphore::new(SchedulePolicy::from_max_parallel(max_parallel).width()));
    let execute = Arc::new(execute);
    let mut joins = JoinSet::new();
    let mut results = Vec::with_capacity(total);

    for (offset, job) in jobs.into_iter().enumerate() {
        let ticket = JobTicket {
            index: offset + 1,
            total,
        };
        let Ok(permit) = Arc::clone(&slots).acquire_owned().await else {
            results.push(aborted(job, ticket, "scheduler slots closed".to_string()));
            continue;
        };
        let execute = Arc::clone(&execute);
        joins.spawn(async move {
            let _permit = permit;
            let fallback = job.clone();
            match tokio::spawn((*execute)(job, ticket)).await {
                Ok(result) => result,
                Err(err) => aborted(fallback, ticket, format!("job execution failed: {err}")),
            }
        });
    }

    while let Some(joined) = joins.join_next().await {
        // The outer task only awaits the inner one, so it cannot fail on its own.
        if let Ok(result) = joined {
            results.push(result);
        }
    }
    results.sort_by_key(|result| result.ticket.index);
    results
}

/// Builds an aborted result.
fn aborted(job: Job, ticket: JobTicket, reason: String) -> JobResult {
    JobResult::new(
        job,
        ticket,
        RunOutcome::Aborted {
            reason,
        },
        Duration::ZERO,
    )
}
