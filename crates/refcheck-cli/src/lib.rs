// crates/refcheck-cli/src/lib.rs
// ============================================================================
// Module: Refcheck CLI Library
// Description: Shared helpers for the refcheck command-line interface.
// Purpose: Provide the message catalog and console sink to the binary and tests.
// Dependencies: refcheck-core
// ============================================================================

//! ## Overview
//! This library houses the CLI's message catalog and the console event sink.
//! The binary entry point (`src/main.rs`) imports these helpers to keep all
//! user-facing output consistent.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Console rendering of harness events.
pub mod console;
/// Message catalog and translation helpers.
pub mod i18n;

#[cfg(test)]
mod tests;
