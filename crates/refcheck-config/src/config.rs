// crates/refcheck-config/src/config.rs
// ============================================================================
// Module: Task Configuration
// Description: Task document loading, validation, and conversion to specs.
// Purpose: Provide strict config parsing with hard limits for batch runs.
// Dependencies: refcheck-core, serde, serde_json, thiserror, time, toml
// ============================================================================

//! ## Overview
//! A task document lists one or more tasks. It is read from a JSON or TOML
//! file (chosen by extension) with strict size and path limits, validated as
//! a whole, and converted into immutable [`TaskSpec`] records for the
//! orchestrator. Field names are kebab-case in both formats.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use refcheck_core::InputSpec;
use refcheck_core::Layout;
use refcheck_core::MarkerGrammar;
use refcheck_core::OutputSpec;
use refcheck_core::ProcessorCommand;
use refcheck_core::ReferenceSpec;
use refcheck_core::SuccessStatus;
use refcheck_core::TaskSpec;
use refcheck_core::diagnostics::DEFAULT_MARKER_PREFIX;
use refcheck_core::diagnostics::DEFAULT_MARKER_SEPARATOR;
use refcheck_core::orchestrator::DEFAULT_JOBS;
use refcheck_core::orchestrator::DEFAULT_TIMEOUT_FACTOR;
use refcheck_core::orchestrator::default_keys;
use refcheck_core::paths::SOURCE_EXTENSION;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default task document name when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "tasks.json";
/// Environment variable used to override the task document path.
pub const CONFIG_ENV_VAR: &str = "REFCHECK_CONFIG";
/// Maximum task document size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of tasks in one document.
pub const MAX_TASKS: usize = 1024;
/// Maximum parallelism budget per task.
pub const MAX_JOBS: usize = 256;
/// Maximum number of collected keys per task.
pub const MAX_KEYS: usize = 256;
/// Maximum length of a task name.
pub const MAX_NAME_LENGTH: usize = 128;
/// Prefix of generated task names.
const DEFAULT_NAME_PREFIX: &str = "task";
/// Layout of the timestamp in generated task names.
const DEFAULT_NAME_TIMESTAMP: &str = "[year][month][day]T[hour][minute][second]Z";

// ============================================================================
// SECTION: Document Model
// ============================================================================

/// Task document root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarnessConfig {
    /// Tasks in execution order.
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
}

/// Input section of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputConfig {
    /// Input file or directory.
    pub path: String,
    /// Walk subdirectories.
    #[serde(default)]
    pub recursive: bool,
}

/// Output or reference section of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocationConfig {
    /// File or directory.
    pub path: String,
    /// Flat layout instead of mirroring the input tree.
    #[serde(default)]
    pub flatten: bool,
}

/// One task entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TaskConfig {
    /// Task name; generated from the current UTC time when absent.
    #[serde(default)]
    pub name: Option<String>,
    /// Processor executable.
    pub executable: String,
    /// Arguments prepended to every invocation.
    #[serde(default)]
    pub executable_args: Vec<String>,
    /// Run in generate mode (the reference section is ignored).
    #[serde(default)]
    pub generate_only: bool,
    /// Input section.
    pub input: InputConfig,
    /// Output section.
    pub output: LocationConfig,
    /// Reference section, required unless `generate-only`.
    #[serde(default)]
    pub reference: Option<LocationConfig>,
    /// Parallelism budget.
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    /// Seconds of deadline per input megabyte.
    #[serde(default = "default_timeout_factor")]
    pub timeout_factor: f64,
    /// Show per-job progress on the console.
    #[serde(default)]
    pub print: bool,
    /// Export destination; an empty string means `<name>.csv`.
    #[serde(default)]
    pub export_csv: Option<String>,
    /// Keys collected into the result table.
    #[serde(default = "default_keys")]
    pub keys: Vec<String>,
    /// Marker line prefix.
    #[serde(default = "default_marker_prefix")]
    pub marker_prefix: String,
    /// Marker key/value separator.
    #[serde(default = "default_marker_separator")]
    pub marker_separator: String,
    /// Extension selecting input files.
    #[serde(default = "default_source_extension")]
    pub source_extension: String,
    /// Exit status convention.
    #[serde(default)]
    pub success_exit: SuccessStatus,
}

// ============================================================================
// SECTION: Loading
// ============================================================================

impl HarnessConfig {
    /// Loads a task document using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config = Self::parse(content, DocumentFormat::for_path(&resolved))?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a task document without validating it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the content is malformed.
    pub fn parse(content: &str, format: DocumentFormat) -> Result<Self, ConfigError> {
        match format {
            DocumentFormat::Json => {
                serde_json::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
            }
            DocumentFormat::Toml => {
                toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
            }
        }
    }

    /// Validates every task in the document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending task.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tasks.is_empty() {
            return Err(ConfigError::Invalid("config must define at least one task".to_string()));
        }
        if self.tasks.len() > MAX_TASKS {
            return Err(ConfigError::Invalid(format!("config exceeds {MAX_TASKS} tasks")));
        }
        for (index, task) in self.tasks.iter().enumerate() {
            task.validate()
                .map_err(|err| ConfigError::Invalid(format!("tasks[{index}]: {}", err.detail())))?;
        }
        Ok(())
    }

    /// Converts every task into a [`TaskSpec`].
    #[must_use]
    pub fn to_specs(&self) -> Vec<TaskSpec> {
        self.tasks.iter().map(TaskConfig::to_spec).collect()
    }
}

/// Serialization format of a task document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// JSON document.
    Json,
    /// TOML document.
    Toml,
}

impl DocumentFormat {
    /// Selects the format from the file extension (`.toml`, otherwise JSON).
    #[must_use]
    pub fn for_path(path: &Path) -> Self {
        if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("toml")) {
            Self::Toml
        } else {
            Self::Json
        }
    }
}

// ============================================================================
// SECTION: Task Validation
// ============================================================================

impl TaskConfig {
    /// Validates the task entry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a field is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(name) = &self.name {
            let trimmed = name.trim();
            if trimmed.is_empty() || trimmed.len() > MAX_NAME_LENGTH {
                return Err(ConfigError::Invalid(format!(
                    "name must be 1..={MAX_NAME_LENGTH} characters"
                )));
            }
            if trimmed.contains(['/', '\\']) {
                return Err(ConfigError::Invalid("name must not contain path separators".to_string()));
            }
        }
        validate_path_string("executable", &self.executable)?;
        validate_path_string("input.path", &self.input.path)?;
        validate_path_string("output.path", &self.output.path)?;
        match (&self.reference, self.generate_only) {
            (Some(reference), false) => validate_path_string("reference.path", &reference.path)?,
            (None, false) => {
                return Err(ConfigError::Invalid(
                    "reference is required unless generate-only is set".to_string(),
                ));
            }
            (_, true) => {}
        }
        if let Some(export) = &self.export_csv
            && !export.trim().is_empty()
        {
            validate_path_string("export-csv", export)?;
        }
        if self.jobs == 0 || self.jobs > MAX_JOBS {
            return Err(ConfigError::Invalid(format!("jobs must be in 1..={MAX_JOBS}")));
        }
        if !self.timeout_factor.is_finite() || self.timeout_factor <= 0.0 {
            return Err(ConfigError::Invalid("timeout-factor must be finite and positive".to_string()));
        }
        if self.keys.is_empty() || self.keys.len() > MAX_KEYS {
            return Err(ConfigError::Invalid(format!("keys must list 1..={MAX_KEYS} entries")));
        }
        if self.keys.iter().any(|key| key.trim().is_empty()) {
            return Err(ConfigError::Invalid("keys must be non-empty".to_string()));
        }
        if self.marker_prefix.is_empty() {
            return Err(ConfigError::Invalid("marker-prefix must be non-empty".to_string()));
        }
        if self.marker_separator.is_empty() {
            return Err(ConfigError::Invalid("marker-separator must be non-empty".to_string()));
        }
        if self.source_extension.starts_with('.') {
            return Err(ConfigError::Invalid(
                "source-extension must not start with a dot".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the configured name or a generated `task-<utc timestamp>`.
    #[must_use]
    pub fn resolved_name(&self) -> String {
        self.name.as_ref().map_or_else(default_task_name, |name| name.trim().to_string())
    }

    /// Converts the entry into an immutable [`TaskSpec`].
    ///
    /// Path fields are trimmed the same way validation reads them.
    #[must_use]
    pub fn to_spec(&self) -> TaskSpec {
        let name = self.resolved_name();
        let processor = self
            .executable_args
            .iter()
            .fold(ProcessorCommand::new(self.executable.trim()), |command, arg| {
                command.with_arg(arg)
            });
        let export = self.export_csv.as_ref().map(|destination| {
            let destination = destination.trim();
            if destination.is_empty() {
                PathBuf::from(format!("{name}.csv"))
            } else {
                PathBuf::from(destination)
            }
        });
        TaskSpec {
            processor,
            input: InputSpec {
                path: PathBuf::from(self.input.path.trim()),
                recursive: self.input.recursive,
            },
            output: OutputSpec {
                path: PathBuf::from(self.output.path.trim()),
                flatten: self.output.flatten,
            },
            reference: if self.generate_only {
                None
            } else {
                self.reference.as_ref().map(|reference| ReferenceSpec {
                    path: PathBuf::from(reference.path.trim()),
                    flatten: reference.flatten,
                })
            },
            jobs: self.jobs,
            timeout_factor: self.timeout_factor,
            success_status: self.success_exit,
            grammar: MarkerGrammar::new(&self.marker_prefix, &self.marker_separator),
            layout: Layout {
                source_extension: self.source_extension.clone(),
                ..Layout::default()
            },
            keys: self.keys.clone(),
            export,
            name,
        }
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default parallelism budget.
const fn default_jobs() -> usize {
    DEFAULT_JOBS
}

/// Default timeout factor.
const fn default_timeout_factor() -> f64 {
    DEFAULT_TIMEOUT_FACTOR
}

/// Default marker prefix.
fn default_marker_prefix() -> String {
    DEFAULT_MARKER_PREFIX.to_string()
}

/// Default marker separator.
fn default_marker_separator() -> String {
    DEFAULT_MARKER_SEPARATOR.to_string()
}

/// Default source extension.
fn default_source_extension() -> String {
    SOURCE_EXTENSION.to_string()
}

/// Generates `task-<utc timestamp>` from the current time.
#[must_use]
pub fn default_task_name() -> String {
    let now = OffsetDateTime::now_utc();
    let stamp = format_description::parse(DEFAULT_NAME_TIMESTAMP)
        .ok()
        .and_then(|layout| now.format(&layout).ok())
        .unwrap_or_else(|| now.unix_timestamp().to_string());
    format!("{DEFAULT_NAME_PREFIX}-{stamp}")
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// JSON or TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Returns the message without the category prefix.
    #[must_use]
    pub fn detail(&self) -> &str {
        match self {
            Self::Io(detail) | Self::Parse(detail) | Self::Invalid(detail) => detail,
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
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

    use super::MAX_PATH_COMPONENT_LENGTH;
    use super::MAX_TOTAL_PATH_LENGTH;
    use super::default_task_name;
    use super::validate_path_string;

    #[test]
    fn validate_path_string_accepts_valid_path() {
        assert!(validate_path_string("input.path", "./geometry/parts").is_ok());
    }

    #[test]
    fn validate_path_string_rejects_blank_values() {
        let err = validate_path_string("input.path", "   ").unwrap_err();
        assert!(err.to_string().contains("non-empty"));
    }

    #[test]
    fn validate_path_string_rejects_long_values() {
        let err = validate_path_string("input.path", &"a".repeat(MAX_TOTAL_PATH_LENGTH + 1))
            .unwrap_err();
        assert!(err.to_string().contains("max length"));
        let component = format!("dir/{}", "b".repeat(MAX_PATH_COMPONENT_LENGTH + 1));
        let err = validate_path_string("input.path", &component).unwrap_err();
        assert!(err.to_string().contains("component too long"));
    }

    #[test]
    fn generated_task_name_is_filename_safe() {
        let name = default_task_name();
        assert!(name.starts_with("task-"));
        assert!(name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-'));
    }
}
