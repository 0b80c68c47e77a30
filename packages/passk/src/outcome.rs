//! Structured outcomes for candidate executions.
//!
//! This module provides types for representing what happened when a candidate
//! was run against its problem's tests, in a way that supports:
//! - Nice CLI rendering
//! - JSON serialization for reports
//! - Reduction to the boolean pass/fail used by pass@k
//!
//! Harness failures (the interpreter could not be spawned, the scratch file
//! could not be written) are not outcomes. They are returned as errors and
//! never counted against a candidate.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use color_print::cformat;
use serde::{Deserialize, Serialize};

/// The outcome of executing a single candidate against its tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The combined program exited successfully within the timeout.
    Pass,

    /// The candidate did not pass.
    Fail {
        /// Why the candidate did not pass.
        reason: Failure,
    },
}

impl Outcome {
    /// Create a passing outcome.
    pub fn pass() -> Self {
        Self::Pass
    }

    /// Create a failing outcome.
    pub fn fail(reason: Failure) -> Self {
        Self::Fail { reason }
    }

    /// Returns true if this outcome is a pass.
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    /// Returns true if this outcome is a failure.
    pub fn is_fail(&self) -> bool {
        matches!(self, Self::Fail { .. })
    }

    /// Returns the failure reason, if this is a failure.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Pass => None,
            Self::Fail { reason } => Some(reason),
        }
    }
}

impl From<Failure> for Outcome {
    fn from(reason: Failure) -> Self {
        Self::fail(reason)
    }
}

/// The reason a candidate failed.
///
/// Timeouts and non-zero exits both count as a plain failure for pass@k; the
/// distinction is kept here for diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Failure {
    /// The candidate was never executed.
    Rejected {
        /// What was wrong with the candidate code.
        rejection: Rejection,
    },

    /// The process exited unsuccessfully: a failed assertion, an unhandled
    /// exception, a syntax error, or termination by a signal.
    Exited {
        /// The exit code, if the process exited normally.
        exit_code: Option<i32>,

        /// The tail of the process's stderr.
        stderr: String,
    },

    /// The process did not finish before the deadline and was killed.
    TimedOut {
        /// The timeout that was exceeded, in milliseconds.
        after_ms: u64,
    },
}

impl Failure {
    /// Create a rejection failure.
    pub fn rejected(rejection: Rejection) -> Self {
        Self::Rejected { rejection }
    }

    /// Create a failure for an unsuccessful exit.
    pub fn exited(exit_code: Option<i32>, stderr: impl Into<String>) -> Self {
        Self::Exited {
            exit_code,
            stderr: stderr.into(),
        }
    }

    /// Create a failure for a run that exceeded `timeout`.
    pub fn timed_out(timeout: Duration) -> Self {
        Self::TimedOut {
            after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// A short, stable label for this kind of failure.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Rejected { .. } => "rejected",
            Self::Exited { .. } => "exited",
            Self::TimedOut { .. } => "timed_out",
        }
    }
}

/// Why candidate code was rejected without being executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rejection {
    /// The code was empty or only whitespace.
    Missing,

    /// The code was an error marker written by the generation stage.
    Sentinel {
        /// The marker that matched.
        marker: String,
    },
}

impl Display for Outcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "{}", cformat!("<green>✓</> Passed")),
            Self::Fail { reason } => {
                writeln!(f, "{}", cformat!("<red>✗</> Failed"))?;
                write!(f, "{reason}")
            }
        }
    }
}

impl Display for Failure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { rejection } => {
                writeln!(f, "    {} {rejection}", cformat!("<yellow>rejected:</>"))
            }
            Self::Exited { exit_code, stderr } => {
                match exit_code {
                    Some(code) => writeln!(f, "    {} {code}", cformat!("<yellow>exit code:</>"))?,
                    None => writeln!(f, "    {}", cformat!("<yellow>killed by signal</>"))?,
                }
                if !stderr.is_empty() {
                    writeln!(f, "      {}", cformat!("<green,bold>stderr:</>"))?;
                    for line in stderr.lines() {
                        writeln!(f, "        {}", cformat!("<dim>{line}</>"))?;
                    }
                }
                Ok(())
            }
            Self::TimedOut { after_ms } => {
                writeln!(f, "    {} after {after_ms}ms", cformat!("<yellow>timed out</>"))
            }
        }
    }
}

impl Display for Rejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "no code"),
            Self::Sentinel { marker } => write!(f, "error marker {marker:?}"),
        }
    }
}
