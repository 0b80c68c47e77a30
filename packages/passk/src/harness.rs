//! Evaluates candidates against the problems they were generated for.
//!
//! The harness is the glue between the problem set, the candidates, and the
//! executor: it looks each candidate's problem up by task id, rejects code
//! that should never be run, and turns harness errors into per-candidate
//! [`Verdict::Error`]s so one broken evaluation never stops the rest.

use std::time::Instant;

use bon::Builder;
use color_eyre::{
    Result,
    eyre::{Context, bail},
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::aggregate::Attempt;
use crate::candidate::{Candidate, CandidateCode, DEFAULT_SENTINEL};
use crate::executor::{Executor, combine};
use crate::outcome::{Failure, Outcome, Rejection};
use crate::problem::{Problem, ProblemSet, TaskId};

/// Runs a HumanEval test suite, which defines `check` but never calls it.
pub const DEFAULT_CHECK_CALL: &str = "check({entry_point})";

/// Evaluates candidates with a configured executor.
#[derive(Debug, Clone, Builder)]
pub struct Harness {
    /// Runs the combined programs.
    #[builder(default)]
    executor: Executor,

    /// Code equal to any of these markers is rejected without running it.
    #[builder(into, default = vec![DEFAULT_SENTINEL.to_string()])]
    sentinels: Vec<String>,

    /// Reduce replies wrapped in a fenced Markdown block to the block.
    #[builder(default = true)]
    extract_fenced_code: bool,

    /// Append the check call for problems that name an entry point.
    #[builder(default = true)]
    invoke_entry_point: bool,

    /// The statement that runs a problem's checks; `{entry_point}` is
    /// replaced with the problem's entry point.
    #[builder(into, default = String::from(DEFAULT_CHECK_CALL))]
    check_call: String,
}

impl Default for Harness {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Harness {
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Evaluate `candidate` against `problem`'s tests.
    ///
    /// Missing code and error markers fail without spawning anything. An
    /// `Err` means the harness could not evaluate the candidate; it says
    /// nothing about the candidate's correctness.
    #[tracing::instrument(
        skip_all,
        fields(
            task_id = %candidate.task_id,
            model = %candidate.model,
            strategy = %candidate.strategy,
        )
    )]
    pub fn evaluate(&self, problem: &Problem, candidate: &Candidate) -> Result<Outcome> {
        if problem.task_id != candidate.task_id {
            bail!(
                "candidate for {} cannot be evaluated against tests for {}",
                candidate.task_id,
                problem.task_id
            );
        }

        match candidate.classify(&self.sentinels, self.extract_fenced_code) {
            CandidateCode::Missing => Ok(Outcome::fail(Failure::rejected(Rejection::Missing))),
            CandidateCode::Sentinel(marker) => {
                Ok(Outcome::fail(Failure::rejected(Rejection::Sentinel {
                    marker: marker.to_string(),
                })))
            }
            CandidateCode::Source(code) => {
                let check_call = problem
                    .entry_point
                    .as_deref()
                    .filter(|_| self.invoke_entry_point)
                    .map(|entry_point| self.check_call.replace("{entry_point}", entry_point));
                let program = combine(&code, &problem.test, check_call.as_deref());
                self.executor.run_program(&program)
            }
        }
    }

    /// Evaluate one candidate, looking its problem up by task id.
    ///
    /// Never fails: harness errors are captured in the returned evaluation.
    pub fn evaluate_in(&self, problems: &ProblemSet, candidate: &Candidate) -> Evaluation {
        let started = Instant::now();
        let result = problems
            .get(&candidate.task_id)
            .and_then(|problem| self.evaluate(problem, candidate))
            .with_context(|| {
                format!(
                    "evaluate {} from {}_{}",
                    candidate.task_id, candidate.model, candidate.strategy
                )
            });

        let verdict = match result {
            Ok(outcome) => Verdict::Outcome(outcome),
            Err(error) => {
                tracing::error!(?error, "harness error");
                Verdict::Error(format!("{error:#}"))
            }
        };

        Evaluation {
            task_id: candidate.task_id.clone(),
            model: candidate.model.clone(),
            strategy: candidate.strategy.clone(),
            verdict,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Evaluate every candidate.
    ///
    /// With `jobs` of 1 or less candidates are evaluated one at a time in
    /// order; otherwise they run on a pool of `jobs` threads. Either way each
    /// evaluation gets its own process and scratch directory. `on_evaluated`
    /// is called as each evaluation finishes. The returned evaluations are in
    /// candidate order.
    pub fn evaluate_all(
        &self,
        problems: &ProblemSet,
        candidates: &[Candidate],
        jobs: usize,
        on_evaluated: impl Fn(&Evaluation) + Sync,
    ) -> Result<Vec<Evaluation>> {
        let evaluate = |candidate: &Candidate| {
            let evaluation = self.evaluate_in(problems, candidate);
            on_evaluated(&evaluation);
            evaluation
        };

        if jobs <= 1 {
            return Ok(candidates.iter().map(evaluate).collect());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .thread_name(|i| format!("passk-eval-{i}"))
            .build()
            .context("build evaluation thread pool")?;

        Ok(pool.install(|| candidates.par_iter().map(evaluate).collect()))
    }
}

/// What the harness concluded about one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The candidate was evaluated.
    Outcome(Outcome),

    /// The harness failed; the candidate was not judged.
    Error(String),
}

/// A candidate's identity together with its verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub task_id: TaskId,
    pub model: String,
    pub strategy: String,
    pub verdict: Verdict,

    /// Wall-clock time spent on this evaluation.
    pub duration_ms: u64,
}

impl Evaluation {
    /// The outcome, unless the harness failed.
    pub fn outcome(&self) -> Option<&Outcome> {
        match &self.verdict {
            Verdict::Outcome(outcome) => Some(outcome),
            Verdict::Error(_) => None,
        }
    }

    /// The harness error message, if the harness failed.
    pub fn error(&self) -> Option<&str> {
        match &self.verdict {
            Verdict::Outcome(_) => None,
            Verdict::Error(message) => Some(message),
        }
    }

    /// The pass/fail attempt for aggregation; `None` for harness errors,
    /// which are never counted as failures.
    pub fn attempt(&self) -> Option<Attempt> {
        self.outcome().map(|outcome| {
            Attempt::builder()
                .task_id(self.task_id.clone())
                .model(self.model.clone())
                .strategy(self.strategy.clone())
                .passed(outcome.is_pass())
                .build()
        })
    }
}
