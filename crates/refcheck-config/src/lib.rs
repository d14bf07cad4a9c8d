// crates/refcheck-config/src/lib.rs
// ============================================================================
// Module: Refcheck Config Library
// Description: Task document model, validation, and spec conversion.
// Purpose: Single source of truth for task document semantics.
// Dependencies: refcheck-core, serde, serde_json, time, toml
// ============================================================================

//! ## Overview
//! `refcheck-config` reads batch task documents (JSON or TOML), validates
//! them with hard limits, and turns each entry into an immutable
//! [`refcheck_core::TaskSpec`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
