//! Harness settings, read from an optional `passk.toml`.
//!
//! Every field has a default, so an empty file (or no file at all) is a valid
//! configuration. Command line flags are layered on top by the CLI.

use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::{
    Result, Section, SectionExt,
    eyre::{Context, ensure},
};
use serde::{Deserialize, Serialize};
use tap::Tap;

use crate::aggregate::{Aggregator, DEFAULT_FAILURE_CAP};
use crate::candidate::DEFAULT_SENTINEL;
use crate::executor::{DEFAULT_TIMEOUT, Executor};
use crate::harness::{DEFAULT_CHECK_CALL, Harness};

/// The settings file looked for in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "passk.toml";

/// The `k` shown in report headers, e.g. `pass@10 (%)`.
pub const DEFAULT_K_LABEL: usize = 10;

/// The longest timeout accepted for a single execution.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Interpreter used to run candidates.
    pub interpreter: String,

    /// Arguments passed to the interpreter before the program path.
    pub interpreter_args: Vec<String>,

    /// Extension given to the program file.
    pub extension: String,

    /// Wall-clock limit per candidate, in seconds.
    pub timeout_secs: f64,

    /// Where per-execution scratch directories are created.
    pub scratch_dir: Option<PathBuf>,

    /// Failing task ids sampled per model/strategy in the summary.
    pub failure_cap: usize,

    /// The `k` shown in report headers.
    pub k_label: usize,

    /// Candidate code equal to one of these is rejected without running it.
    pub sentinels: Vec<String>,

    /// Call the problem's checks after its tests when it names an entry point.
    pub invoke_entry_point: bool,

    /// The statement that calls a problem's checks.
    pub check_call: String,

    /// Reduce replies wrapped in a fenced Markdown block to the block.
    pub extract_fenced_code: bool,

    /// Number of evaluations run at once.
    pub jobs: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interpreter: String::from("python3"),
            interpreter_args: Vec::new(),
            extension: String::from("py"),
            timeout_secs: DEFAULT_TIMEOUT.as_secs_f64(),
            scratch_dir: None,
            failure_cap: DEFAULT_FAILURE_CAP,
            k_label: DEFAULT_K_LABEL,
            sentinels: vec![DEFAULT_SENTINEL.to_string()],
            invoke_entry_point: true,
            check_call: String::from(DEFAULT_CHECK_CALL),
            extract_fenced_code: true,
            jobs: 1,
        }
    }
}

impl Settings {
    /// Read settings from a TOML file.
    #[tracing::instrument]
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            read_to_string(path).with_context(|| format!("read settings file: {path:?}"))?;
        toml::from_str::<Self>(&content)
            .with_context(|| format!("parse settings file: {path:?}"))
            .with_section(|| content.clone().header("File content:"))
            .tap(|settings| tracing::debug!(?settings, "parsed settings file"))
    }

    /// Read settings from `explicit` if given, otherwise from
    /// [`DEFAULT_CONFIG_FILE`] if it exists, otherwise use the defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.is_file() {
                    Self::load(path)
                } else {
                    tracing::debug!("no settings file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    /// Check values that cannot be expressed in the types.
    pub fn validate(&self) -> Result<()> {
        self.timeout()?;
        ensure!(!self.interpreter.trim().is_empty(), "interpreter must not be empty");
        Ok(())
    }

    /// The per-execution timeout, if it is positive and at most [`MAX_TIMEOUT`].
    pub fn timeout(&self) -> Result<Duration> {
        let timeout = Duration::try_from_secs_f64(self.timeout_secs)
            .with_context(|| format!("invalid timeout: {} seconds", self.timeout_secs))?;
        ensure!(
            !timeout.is_zero(),
            "timeout must be a positive number of seconds, got {}",
            self.timeout_secs
        );
        ensure!(
            timeout <= MAX_TIMEOUT,
            "timeout must be at most {} seconds, got {}",
            MAX_TIMEOUT.as_secs(),
            self.timeout_secs
        );
        Ok(timeout)
    }

    pub fn executor(&self) -> Result<Executor> {
        self.validate()?;
        Ok(Executor::builder()
            .interpreter(self.interpreter.clone())
            .interpreter_args(self.interpreter_args.clone())
            .extension(self.extension.clone())
            .timeout(self.timeout()?)
            .maybe_scratch_dir(self.scratch_dir.clone())
            .build())
    }

    pub fn harness(&self) -> Result<Harness> {
        Ok(Harness::builder()
            .executor(self.executor()?)
            .sentinels(self.sentinels.clone())
            .extract_fenced_code(self.extract_fenced_code)
            .invoke_entry_point(self.invoke_entry_point)
            .check_call(self.check_call.clone())
            .build())
    }

    pub fn aggregator(&self) -> Aggregator {
        Aggregator::builder().failure_cap(self.failure_cap).build()
    }
}
