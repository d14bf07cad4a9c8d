// crates/refcheck-core/src/paths.rs
// ============================================================================
// Module: Path Matching
// Description: Input tree enumeration and output/reference path mapping.
// Purpose: Turn an input tree plus layout policies into an immutable job list.
// Dependencies: thiserror, std
// ============================================================================

//! ## Overview
//! The matcher walks an input root, selects files carrying the source
//! extension, and maps each one onto an output path (and, in verify mode, a
//! reference path) under a flatten or mirror policy.
//!
//! ## Invariants
//! - Flatten places every mapped path directly under the target root.
//! - Mirror preserves the input's directory relative to the input root.
//! - Mirror output directories are created here, once, before any job runs.
//! - Path resolution errors are terminal for the whole match call.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Extension of processor input files.
pub const SOURCE_EXTENSION: &str = "dwg";
/// Extension of generated reference artifacts.
pub const GENERATED_EXTENSION: &str = "json";
/// Extension of verify-mode trace files.
pub const TRACE_EXTENSION: &str = "trace";
/// Size hint used when the input size is unknown.
pub const DEFAULT_SIZE_HINT_MB: f64 = 1.0;

/// Bytes per megabyte used for size hints.
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

// ============================================================================
// SECTION: Types
// ============================================================================

/// A root path plus a recursion flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTree {
    /// Root directory (or single file) of the tree.
    pub root: PathBuf,
    /// Whether subdirectories are walked.
    pub recursive: bool,
}

impl FileTree {
    /// Creates a file tree description.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, recursive: bool) -> Self {
        Self {
            root: root.into(),
            recursive,
        }
    }

    /// Lists regular files under the root whose extension equals `extension`.
    ///
    /// Symlinked directories are never descended into. The listing is sorted
    /// so progress logs are reproducible between runs.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when a directory cannot be read.
    pub fn files_with_extension(&self, extension: &str) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        collect_files(&self.root, self.recursive, extension, &mut files)?;
        files.sort();
        Ok(files)
    }
}

/// Layout rule mapping an input path to a sibling output path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPolicy {
    /// Discard the input's relative directory structure.
    pub flatten: bool,
    /// Extension of mapped paths, without the leading dot.
    pub extension: String,
}

impl PathPolicy {
    /// Creates a policy.
    #[must_use]
    pub fn new(flatten: bool, extension: impl Into<String>) -> Self {
        Self {
            flatten,
            extension: extension.into(),
        }
    }

    /// Maps `input` (located under `input_root`) onto `target_root`.
    #[must_use]
    pub fn map_path(&self, input: &Path, input_root: &Path, target_root: &Path) -> PathBuf {
        let name = self.file_name_for(input);
        if self.flatten {
            return target_root.join(name);
        }
        let relative_parent = input
            .parent()
            .and_then(|parent| parent.strip_prefix(input_root).ok())
            .unwrap_or_else(|| Path::new(""));
        target_root.join(relative_parent).join(name)
    }

    /// Returns the input's file name with this policy's extension.
    fn file_name_for(&self, input: &Path) -> PathBuf {
        let name = PathBuf::from(input.file_name().unwrap_or_default());
        if self.extension.is_empty() { name } else { name.with_extension(&self.extension) }
    }
}

/// Target root plus the policy mapping inputs under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTarget {
    /// Target root (directory or single file).
    pub root: PathBuf,
    /// Mapping policy.
    pub policy: PathPolicy,
}

impl PathTarget {
    /// Creates a path target.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, policy: PathPolicy) -> Self {
        Self {
            root: root.into(),
            policy,
        }
    }
}

/// Everything the matcher needs for one task.
#[derive(Debug, Clone)]
pub struct MatchPlan {
    /// Input tree.
    pub input: FileTree,
    /// Extension selecting input files, without the leading dot.
    pub source_extension: String,
    /// Output target.
    pub output: PathTarget,
    /// Reference target; `None` selects generate mode.
    pub reference: Option<PathTarget>,
}

/// One unit of work: a single processor invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// Input file.
    pub input: PathBuf,
    /// Reference file (verify mode only).
    pub reference: Option<PathBuf>,
    /// Output artifact or trace file.
    pub output: PathBuf,
    /// Input size in megabytes, driving the job deadline.
    pub size_hint_mb: f64,
}

impl Job {
    /// Creates a job, reading the input size for the size hint.
    #[must_use]
    pub fn new(input: PathBuf, reference: Option<PathBuf>, output: PathBuf) -> Self {
        let size_hint_mb = size_hint_mb(&input);
        Self {
            input,
            reference,
            output,
            size_hint_mb,
        }
    }
}

/// Matcher result: the job list plus directories created for it.
#[derive(Debug, Clone, Default)]
pub struct JobPlan {
    /// Jobs in enumeration order.
    pub jobs: Vec<Job>,
    /// Directories created while preparing the output layout.
    pub created_directories: Vec<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Pre-flight path resolution failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MatchError {
    /// Input root is missing or unusable.
    #[error("invalid input path {}: {reason}", path.display())]
    InvalidInputPath {
        /// Offending path.
        path: PathBuf,
        /// Failure description.
        reason: String,
    },
    /// Output root is unusable.
    #[error("invalid output path {}: {reason}", path.display())]
    InvalidOutputPath {
        /// Offending path.
        path: PathBuf,
        /// Failure description.
        reason: String,
    },
    /// Reference root is missing or unusable.
    #[error("invalid reference path {}: {reason}", path.display())]
    InvalidReferencePath {
        /// Offending path.
        path: PathBuf,
        /// Failure description.
        reason: String,
    },
}

impl MatchError {
    /// Builds an input path error.
    fn input(path: &Path, reason: impl Into<String>) -> Self {
        Self::InvalidInputPath {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Builds an output path error.
    fn output(path: &Path, reason: impl Into<String>) -> Self {
        Self::InvalidOutputPath {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Builds a reference path error.
    fn reference(path: &Path, reason: impl Into<String>) -> Self {
        Self::InvalidReferencePath {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

// ============================================================================
// SECTION: Matching
// ============================================================================

/// Computes the job list for `plan`.
///
/// A single input file yields exactly one job. A directory yields one job
/// per file carrying the source extension. Output directories required by a
/// mirror layout are created before this returns.
///
/// # Errors
///
/// Returns [`MatchError`] when the input, output, or reference root cannot
/// be used. No jobs are produced in that case.
pub fn match_jobs(plan: &MatchPlan) -> Result<JobPlan, MatchError> {
    let input_root = &plan.input.root;
    let metadata = fs::metadata(input_root)
        .map_err(|err| MatchError::input(input_root, format!("cannot stat input: {err}")))?;
    if metadata.is_file() {
        single_file_plan(plan)
    } else if metadata.is_dir() {
        directory_plan(plan)
    } else {
        Err(MatchError::input(input_root, "input is neither a file nor a directory"))
    }
}

/// Builds the plan for a single input file.
fn single_file_plan(plan: &MatchPlan) -> Result<JobPlan, MatchError> {
    let input = plan.input.root.clone();
    let reference = match &plan.reference {
        Some(target) => Some(single_reference(&input, target)?),
        None => None,
    };
    let mut created_directories = Vec::new();
    let output = single_output(&input, &plan.output, &mut created_directories)?;
    Ok(JobPlan {
        jobs: vec![Job::new(input, reference, output)],
        created_directories,
    })
}

/// Resolves the reference for a single input file.
fn single_reference(input: &Path, target: &PathTarget) -> Result<PathBuf, MatchError> {
    let root = &target.root;
    if root.is_file() {
        return Ok(root.clone());
    }
    if !root.is_dir() {
        return Err(MatchError::reference(root, "reference does not exist"));
    }
    let candidate = root.join(target.policy.file_name_for(input));
    if candidate.is_file() {
        Ok(candidate)
    } else {
        Err(MatchError::reference(&candidate, "reference file does not exist"))
    }
}

/// Resolves the output for a single input file.
///
/// An existing file is replaced: it is removed here, before dispatch.
fn single_output(
    input: &Path,
    target: &PathTarget,
    created: &mut Vec<PathBuf>,
) -> Result<PathBuf, MatchError> {
    let root = &target.root;
    if root.is_file() {
        fs::remove_file(root).map_err(|err| {
            MatchError::output(root, format!("cannot replace existing output: {err}"))
        })?;
        return Ok(root.clone());
    }
    ensure_directory(root, created)?;
    Ok(root.join(target.policy.file_name_for(input)))
}

/// Builds the plan for an input directory.
fn directory_plan(plan: &MatchPlan) -> Result<JobPlan, MatchError> {
    let input_root = &plan.input.root;
    let mut created_directories = Vec::new();
    ensure_directory(&plan.output.root, &mut created_directories)?;

    let reference = match &plan.reference {
        Some(target) if target.root.is_file() => Some(ReferenceLayout::Single(&target.root)),
        Some(target) if target.root.is_dir() => Some(ReferenceLayout::Mapped(target)),
        Some(target) => {
            return Err(MatchError::reference(&target.root, "reference does not exist"));
        }
        None => None,
    };

    let inputs = plan
        .input
        .files_with_extension(&plan.source_extension)
        .map_err(|err| MatchError::input(input_root, format!("cannot list input: {err}")))?;

    let jobs: Vec<Job> = inputs
        .into_iter()
        .map(|input| {
            let output = plan.output.policy.map_path(&input, input_root, &plan.output.root);
            let reference = reference.as_ref().map(|layout| layout.resolve(&input, input_root));
            Job::new(input, reference, output)
        })
        .collect();

    if !plan.output.policy.flatten {
        let parents: BTreeSet<&Path> = jobs.iter().filter_map(|job| job.output.parent()).collect();
        for parent in parents {
            ensure_directory(parent, &mut created_directories)?;
        }
    }

    Ok(JobPlan {
        jobs,
        created_directories,
    })
}

/// Reference layout resolved once per directory match.
enum ReferenceLayout<'a> {
    /// Every input pairs with this single file.
    Single(&'a Path),
    /// Inputs map through the target's policy.
    Mapped(&'a PathTarget),
}

impl ReferenceLayout<'_> {
    /// Returns the reference path for `input`.
    fn resolve(&self, input: &Path, input_root: &Path) -> PathBuf {
        match self {
            Self::Single(path) => path.to_path_buf(),
            Self::Mapped(target) => target.policy.map_path(input, input_root, &target.root),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures `path` is a directory, creating it when missing.
fn ensure_directory(path: &Path, created: &mut Vec<PathBuf>) -> Result<(), MatchError> {
    if path.is_dir() {
        return Ok(());
    }
    if path.exists() {
        return Err(MatchError::output(path, "exists but is not a directory"));
    }
    fs::create_dir_all(path)
        .map_err(|err| MatchError::output(path, format!("cannot create directory: {err}")))?;
    created.push(path.to_path_buf());
    Ok(())
}

/// Recursively collects files with `extension` under `dir`.
fn collect_files(
    dir: &Path,
    recursive: bool,
    extension: &str,
    out: &mut Vec<PathBuf>,
) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            if recursive {
                collect_files(&path, recursive, extension, out)?;
            }
        } else if path.is_file() && has_extension(&path, extension) {
            out.push(path);
        }
    }
    Ok(())
}

/// Returns true when `path` has exactly `extension`.
fn has_extension(path: &Path, extension: &str) -> bool {
    match path.extension() {
        Some(ext) => ext == extension,
        None => extension.is_empty(),
    }
}

/// Returns the input size in megabytes, or the default when unreadable.
#[allow(clippy::cast_precision_loss, reason = "Size hints tolerate precision loss.")]
fn size_hint_mb(path: &Path) -> f64 {
    fs::metadata(path).map_or(DEFAULT_SIZE_HINT_MB, |meta| meta.len() as f64 / BYTES_PER_MB)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use std::path::Path;
    use std::path::PathBuf;

    use super::PathPolicy;
    use super::has_extension;

    #[test]
    fn map_path_flatten_drops_subdirectories() {
        let policy = PathPolicy::new(true, "json");
        let mapped =
            policy.map_path(Path::new("/in/a/b/c.dwg"), Path::new("/in"), Path::new("/out"));
        assert_eq!(mapped, PathBuf::from("/out/c.json"));
    }

    #[test]
    fn map_path_mirror_keeps_relative_parent() {
        let policy = PathPolicy::new(false, "trace");
        let mapped =
            policy.map_path(Path::new("/in/a/b/c.dwg"), Path::new("/in"), Path::new("/out"));
        assert_eq!(mapped, PathBuf::from("/out/a/b/c.trace"));
    }

    #[test]
    fn map_path_keeps_inner_dots_in_stem() {
        let policy = PathPolicy::new(true, "json");
        let mapped = policy.map_path(Path::new("/in/v1.2.dwg"), Path::new("/in"), Path::new("/o"));
        assert_eq!(mapped, PathBuf::from("/o/v1.2.json"));
    }

    #[test]
    fn empty_extension_keeps_file_name() {
        let policy = PathPolicy::new(true, "");
        let mapped = policy.map_path(Path::new("/in/x.dwg"), Path::new("/in"), Path::new("/o"));
        assert_eq!(mapped, PathBuf::from("/o/x.dwg"));
    }

    #[test]
    fn extension_match_is_exact() {
        assert!(has_extension(Path::new("a.dwg"), "dwg"));
        assert!(!has_extension(Path::new("a.DWG"), "dwg"));
        assert!(!has_extension(Path::new("a.dwgx"), "dwg"));
        assert!(!has_extension(Path::new(".dwg"), "dwg"));
    }
}
