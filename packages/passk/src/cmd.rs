//! Subcommands, and the flags they share.

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;

use passk::Settings;

pub mod compare;
pub mod generate;
pub mod list;
pub mod report;
pub mod run;

/// Where a run writes its files unless told otherwise.
pub const DEFAULT_OUTPUT_DIR: &str = "evaluation";

/// Flags that affect how results are summarized.
#[derive(Args, Clone, Debug)]
pub struct SettingsArgs {
    /// Settings file. Defaults to `passk.toml` in the working directory, if
    /// it exists.
    #[arg(long, env = "PASSK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Failing task ids shown per model/strategy in the summary.
    #[arg(long, env = "PASSK_FAILURE_CAP")]
    pub failure_cap: Option<usize>,

    /// The `k` shown in report headers, e.g. `pass@10 (%)`.
    #[arg(long = "k", env = "PASSK_K")]
    pub k_label: Option<usize>,
}

impl SettingsArgs {
    /// Read the settings file and apply these flags on top.
    pub fn resolve(&self) -> Result<Settings> {
        let mut settings = Settings::discover(self.config.as_deref())?;
        if let Some(cap) = self.failure_cap {
            settings.failure_cap = cap;
        }
        if let Some(k) = self.k_label {
            settings.k_label = k;
        }
        Ok(settings)
    }
}

/// Flags that affect how candidates are executed.
#[derive(Args, Clone, Debug)]
pub struct ExecutionArgs {
    /// Interpreter used to run candidates.
    #[arg(long, env = "PASSK_INTERPRETER")]
    pub interpreter: Option<String>,

    /// Argument passed to the interpreter before the program (repeatable).
    #[arg(long = "interpreter-arg", allow_hyphen_values = true)]
    pub interpreter_args: Vec<String>,

    /// Seconds a candidate may run before it is killed.
    #[arg(short, long, env = "PASSK_TIMEOUT")]
    pub timeout: Option<f64>,

    /// Directory in which per-execution scratch directories are created.
    #[arg(long, env = "PASSK_SCRATCH_DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Candidate code equal to this marker fails without running (repeatable).
    /// Replaces the configured markers.
    #[arg(long = "sentinel")]
    pub sentinels: Vec<String>,

    /// Do not call the problem's checks after its tests.
    #[arg(long)]
    pub no_entry_point: bool,

    /// Run replies as-is instead of extracting fenced code blocks.
    #[arg(long)]
    pub no_extract: bool,

    /// Number of evaluations run at once.
    #[arg(short, long, env = "PASSK_JOBS")]
    pub jobs: Option<usize>,
}

impl ExecutionArgs {
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(interpreter) = &self.interpreter {
            settings.interpreter = interpreter.clone();
        }
        if !self.interpreter_args.is_empty() {
            settings.interpreter_args = self.interpreter_args.clone();
        }
        if let Some(timeout) = self.timeout {
            settings.timeout_secs = timeout;
        }
        if let Some(dir) = &self.scratch_dir {
            settings.scratch_dir = Some(dir.clone());
        }
        if !self.sentinels.is_empty() {
            settings.sentinels = self.sentinels.clone();
        }
        if self.no_entry_point {
            settings.invoke_entry_point = false;
        }
        if self.no_extract {
            settings.extract_fenced_code = false;
        }
        if let Some(jobs) = self.jobs {
            settings.jobs = jobs;
        }
    }
}
