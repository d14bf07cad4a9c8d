// crates/refcheck-core/src/lib.rs
// ============================================================================
// Module: Refcheck Core Library
// Description: Batch regression harness for an external geometry processor.
// Purpose: Match inputs to outputs, run processors in parallel, aggregate traces.
// Dependencies: serde, serde_json, thiserror, tokio
// ============================================================================

//! ## Overview
//! `refcheck-core` drives an external file processor over trees of input
//! files. In generate mode it produces reference artifacts next to a mirrored
//! or flattened output tree. In verify mode it runs the processor against
//! those references, captures each run into a trace file, and aggregates the
//! diagnostic markers found in fresh traces into a summarized result table.
//!
//! Processor arguments are always passed as a literal argv; no shell is
//! involved.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod diagnostics;
pub mod events;
pub mod export;
pub mod orchestrator;
pub mod paths;
pub mod runner;
pub mod scheduler;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use diagnostics::DiagnosticRecord;
pub use diagnostics::MarkerGrammar;
pub use diagnostics::ResultTable;
pub use diagnostics::Summary;
pub use events::EventSink;
pub use events::FanoutSink;
pub use events::HarnessEvent;
pub use events::JsonLineSink;
pub use events::NoopSink;
pub use events::TaskMode;
pub use orchestrator::InputSpec;
pub use orchestrator::Layout;
pub use orchestrator::OutputSpec;
pub use orchestrator::ReferenceSpec;
pub use orchestrator::TaskError;
pub use orchestrator::TaskOrchestrator;
pub use orchestrator::TaskOutcome;
pub use orchestrator::TaskSpec;
pub use orchestrator::VerifyReport;
pub use paths::Job;
pub use paths::MatchError;
pub use runner::ProcessorCommand;
pub use runner::RunOutcome;
pub use runner::SuccessStatus;
pub use scheduler::JobResult;
pub use scheduler::JobTicket;
