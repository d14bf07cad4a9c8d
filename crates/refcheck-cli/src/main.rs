// crates/refcheck-cli/src/main.rs
// ============================================================================
// Module: Refcheck CLI Entry Point
// Description: Flag-driven single task or config-driven batch runs.
// Purpose: Drive the processor regression harness from the command line.
// Dependencies: clap, refcheck-cli, refcheck-config, refcheck-core, thiserror, tokio
// ============================================================================

//! ## Overview
//! The CLI builds one task from flags, or loads a batch from a task document,
//! and runs each task through the orchestrator. Progress goes to stdout via
//! the console sink; `--event-log` additionally appends JSON lines to a file.
//! The exit code is success only when every task ran and every job
//! succeeded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::ArgAction;
use clap::Parser;
use clap::ValueEnum;
use refcheck_cli::console::ConsoleSink;
use refcheck_cli::t;
use refcheck_config::HarnessConfig;
use refcheck_config::InputConfig;
use refcheck_config::LocationConfig;
use refcheck_config::TaskConfig;
use refcheck_core::EventSink;
use refcheck_core::FanoutSink;
use refcheck_core::JsonLineSink;
use refcheck_core::SuccessStatus;
use refcheck_core::TaskOrchestrator;
use refcheck_core::TaskSpec;
use refcheck_core::diagnostics::DEFAULT_MARKER_PREFIX;
use refcheck_core::diagnostics::DEFAULT_MARKER_SEPARATOR;
use refcheck_core::orchestrator::DEFAULT_JOBS;
use refcheck_core::orchestrator::DEFAULT_TIMEOUT_FACTOR;
use refcheck_core::orchestrator::default_keys;
use refcheck_core::paths::SOURCE_EXTENSION;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Definitions
// ============================================================================

/// Batch regression harness for an external file processor.
#[derive(Parser, Debug)]
#[command(name = "refcheck", disable_version_flag = true)]
struct Cli {
    /// Print the version and exit.
    #[arg(long = "version", action = ArgAction::SetTrue)]
    show_version: bool,
    /// Task document (JSON or TOML); replaces the single-task flags.
    #[arg(
        short = 'c',
        long,
        value_name = "PATH",
        conflicts_with_all = ["executable", "input_path", "output_path", "ref_path"]
    )]
    config: Option<PathBuf>,
    /// Processor executable.
    #[arg(short = 'E', long = "exec", value_name = "PATH")]
    executable: Option<String>,
    /// Argument placed before the job arguments (repeatable).
    #[arg(long = "exec-arg", value_name = "ARG", allow_hyphen_values = true)]
    exec_args: Vec<String>,
    /// Input file or directory.
    #[arg(short = 'I', long = "input-path", value_name = "PATH")]
    input_path: Option<String>,
    /// Output file or directory.
    #[arg(short = 'O', long = "output-path", value_name = "PATH")]
    output_path: Option<String>,
    /// Reference file or directory (verify mode).
    #[arg(short = 'R', long = "ref-path", value_name = "PATH")]
    ref_path: Option<String>,
    /// Generate references instead of verifying.
    #[arg(short = 'g', long = "generate-only", action = ArgAction::SetTrue)]
    generate_only: bool,
    /// Walk input subdirectories.
    #[arg(short = 'r', long, action = ArgAction::SetTrue)]
    recursive: bool,
    /// Place every output directly under the output path.
    #[arg(short = 'f', long, action = ArgAction::SetTrue)]
    flatten: bool,
    /// References are stored flat under the reference path.
    #[arg(long = "ref-flattened", action = ArgAction::SetTrue)]
    ref_flattened: bool,
    /// Export verify results as CSV (file ending in .csv, or a directory).
    #[arg(long = "export-csv", value_name = "DEST", num_args = 0 ..= 1, default_missing_value = "")]
    export_csv: Option<String>,
    /// Maximum number of concurrent processor runs.
    #[arg(short = 'j', long, value_name = "N", default_value_t = DEFAULT_JOBS)]
    jobs: usize,
    /// Seconds of deadline per input megabyte.
    #[arg(short = 't', long = "timeout-factor", value_name = "SECONDS", default_value_t = DEFAULT_TIMEOUT_FACTOR)]
    timeout_factor: f64,
    /// Show per-job progress.
    #[arg(short = 'p', long, action = ArgAction::SetTrue)]
    print: bool,
    /// Task name (defaults to a timestamp).
    #[arg(long, value_name = "NAME")]
    name: Option<String>,
    /// Keys collected from traces (comma separated).
    #[arg(long, value_name = "KEY", value_delimiter = ',')]
    keys: Vec<String>,
    /// Exit status convention of the processor.
    #[arg(long = "success-exit", value_enum, default_value_t = SuccessExit::Zero)]
    success_exit: SuccessExit,
    /// Append structured JSON events to this file.
    #[arg(long = "event-log", value_name = "PATH")]
    event_log: Option<PathBuf>,
}

/// Exit status convention selectable on the command line.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SuccessExit {
    /// Exit code zero is success.
    Zero,
    /// Any non-zero exit code is success.
    NonZero,
}

impl From<SuccessExit> for SuccessStatus {
    fn from(value: SuccessExit) -> Self {
        match value {
            SuccessExit::Zero => Self::Zero,
            SuccessExit::NonZero => Self::NonZero,
        }
    }
}

/// A resolved task plus its console verbosity.
struct PlannedTask {
    /// Immutable task configuration.
    spec: TaskSpec,
    /// Whether per-job progress is shown.
    print: bool,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing failures.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a catalog message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&t!("main.version", version = version))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let tasks = plan_tasks(&cli)?;
    let event_log = cli.event_log.as_deref().map(open_event_log).transpose()?;

    let mut all_passed = true;
    for task in &tasks {
        let mut sink =
            FanoutSink::new().with(Arc::new(ConsoleSink::new(std::io::stdout(), task.print)));
        if let Some(log) = &event_log {
            sink = sink.with(Arc::clone(log));
        }
        let orchestrator = TaskOrchestrator::new(Arc::new(sink));
        match orchestrator.run_task(&task.spec).await {
            Ok(outcome) => all_passed &= outcome.all_succeeded(),
            Err(_) => all_passed = false,
        }
    }

    Ok(if all_passed { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

// ============================================================================
// SECTION: Task Planning
// ============================================================================

/// Resolves the tasks to run from a task document or from flags.
fn plan_tasks(cli: &Cli) -> CliResult<Vec<PlannedTask>> {
    if cli.executable.is_none() {
        let config = HarnessConfig::load(cli.config.as_deref())
            .map_err(|err| CliError::new(t!("config.load_failed", error = err)))?;
        return Ok(config
            .tasks
            .iter()
            .map(|task| PlannedTask {
                spec: task.to_spec(),
                print: task.print,
            })
            .collect());
    }

    let task = task_from_flags(cli)?;
    task.validate().map_err(|err| CliError::new(t!("cli.invalid_task", error = err.detail())))?;
    Ok(vec![PlannedTask {
        spec: task.to_spec(),
        print: task.print,
    }])
}

/// Builds a task entry from the single-task flags.
fn task_from_flags(cli: &Cli) -> CliResult<TaskConfig> {
    let required = |value: Option<&str>, flag: &str| {
        value
            .map(str::to_string)
            .ok_or_else(|| CliError::new(t!("cli.missing_argument", flag = flag)))
    };
    let executable = required(cli.executable.as_deref(), "--exec")?;
    let input = required(cli.input_path.as_deref(), "--input-path")?;
    let output = required(cli.output_path.as_deref(), "--output-path")?;
    let reference = if cli.generate_only {
        None
    } else {
        Some(required(cli.ref_path.as_deref(), "--ref-path")?)
    };

    Ok(TaskConfig {
        name: cli.name.clone(),
        executable,
        executable_args: cli.exec_args.clone(),
        generate_only: cli.generate_only,
        input: InputConfig {
            path: input,
            recursive: cli.recursive,
        },
        output: LocationConfig {
            path: output,
            flatten: cli.flatten,
        },
        reference: reference.map(|path| LocationConfig {
            path,
            flatten: cli.ref_flattened,
        }),
        jobs: cli.jobs,
        timeout_factor: cli.timeout_factor,
        print: cli.print,
        export_csv: cli.export_csv.clone(),
        keys: if cli.keys.is_empty() { default_keys() } else { cli.keys.clone() },
        marker_prefix: DEFAULT_MARKER_PREFIX.to_string(),
        marker_separator: DEFAULT_MARKER_SEPARATOR.to_string(),
        source_extension: SOURCE_EXTENSION.to_string(),
        success_exit: cli.success_exit.into(),
    })
}

/// Opens the structured event log in append mode.
fn open_event_log(path: &Path) -> CliResult<Arc<dyn EventSink>> {
    let file: File = OpenOptions::new().create(true).append(true).open(path).map_err(|err| {
        CliError::new(t!("cli.event_log_failed", path = path.display(), error = err))
    })?;
    Ok(Arc::new(JsonLineSink::new(file)))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    let stream_label = match stream {
        "stdout" => t!("output.stream.stdout"),
        "stderr" => t!("output.stream.stderr"),
        _ => t!("output.stream.unknown"),
    };
    t!("output.write_failed", stream = stream_label, error = error)
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
