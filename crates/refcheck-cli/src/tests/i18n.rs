// crates/refcheck-cli/src/tests/i18n.rs
// ============================================================================
// Module: CLI Catalog Tests
// Description: Unit tests for the message catalog and translation helpers.
// Purpose: Ensure catalog keys are unique and substitution is deterministic.
// Dependencies: refcheck-cli i18n module
// ============================================================================

//! ## Overview
//! Verifies catalog uniqueness, placeholder substitution, and the fallback
//! for unknown keys.

use crate::i18n::CATALOG_ITEMS;
use crate::i18n::MessageArg;
use crate::i18n::catalog;
use crate::i18n::translate;

#[test]
fn catalog_keys_are_unique() {
    assert_eq!(catalog().len(), CATALOG_ITEMS.len(), "duplicate catalog keys");
}

#[test]
fn translate_substitutes_placeholders() {
    let output = translate(
        "job.failed",
        vec![
            MessageArg::new("index", "2"),
            MessageArg::new("total", "5"),
            MessageArg::new("cause", "exit code 3"),
            MessageArg::new("paths", "a.dwg -> a.json"),
        ],
    );
    assert_eq!(output, "[2/5] Failed (exit code 3): a.dwg -> a.json");
}

#[test]
fn unknown_key_falls_back_to_key() {
    assert_eq!(translate("no.such.key", Vec::new()), "no.such.key");
}

#[test]
fn macro_formats_named_arguments() {
    assert_eq!(crate::t!("main.version", version = "1.2.3"), "refcheck 1.2.3");
}
