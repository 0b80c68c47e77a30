//! Evaluation harness for LLM-generated code.
//!
//! Candidates are solutions generated by some model under some prompting
//! strategy (chain-of-thought, self-debug, multi-role refinement). Each one is
//! run against its problem's test suite in an isolated child process:
//! - Correct code exits successfully: the candidate passes.
//! - Failed assertions, exceptions, syntax errors, and timeouts all fail.
//! - Missing code and the generation stage's error marker fail without ever
//!   being executed.
//!
//! Outcomes are folded into pass@k per (model, strategy), where the
//! denominator is the number of problems actually attempted for that pair,
//! plus an any-strategy-passes ensemble across pairs.
//!
//! A harness failure (the interpreter is missing, a candidate names an unknown
//! problem) is never counted as a failing candidate. It is reported on its own
//! and left out of every aggregate.

pub use crate::aggregate::{AggregateKey, AggregateResult, Aggregator, Attempt};
pub use crate::candidate::{Candidate, CandidateCode, load_candidates, save_candidates};
pub use crate::config::Settings;
pub use crate::executor::Executor;
pub use crate::harness::{Evaluation, Harness, Verdict};
pub use crate::model::{Model, ModelClaudeCode, generate};
pub use crate::outcome::{Failure, Outcome, Rejection};
pub use crate::problem::{Problem, ProblemSet, TaskId};
pub use crate::report::{Report, Summary, compare};
pub use crate::strategy::Strategy;

pub mod aggregate;
pub mod candidate;
pub mod config;
pub mod executor;
pub mod harness;
pub mod model;
pub mod outcome;
pub mod problem;
pub mod report;
pub mod strategy;
