//! Benchmark problems and the id-keyed set they are looked up from.

use std::cmp::Ordering;
use std::fs::read_to_string;
use std::path::Path;

use bon::Builder;
use color_eyre::{
    Result,
    eyre::{Context, bail, eyre},
};
use derive_more::{Display, From};
use itertools::{EitherOrBoth, Itertools};
use serde::{Deserialize, Serialize};

/// Identifier of a benchmark problem, e.g. `HumanEval/12`.
///
/// Ids order naturally: runs of digits compare by value, so `HumanEval/2`
/// sorts before `HumanEval/10`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, From, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into alternating runs of digits and non-digits.
    fn chunks(&self) -> Vec<&str> {
        let bytes = self.0.as_bytes();
        let mut chunks = Vec::new();
        let mut start = 0;
        for i in 1..bytes.len() {
            if bytes[i].is_ascii_digit() != bytes[i - 1].is_ascii_digit() {
                chunks.push(&self.0[start..i]);
                start = i;
            }
        }
        if start < bytes.len() {
            chunks.push(&self.0[start..]);
        }
        chunks
    }
}

impl Ord for TaskId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.chunks()
            .into_iter()
            .zip_longest(other.chunks())
            .map(|pair| match pair {
                EitherOrBoth::Both(a, b) => compare_chunks(a, b),
                EitherOrBoth::Left(_) => Ordering::Greater,
                EitherOrBoth::Right(_) => Ordering::Less,
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for TaskId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn compare_chunks(a: &str, b: &str) -> Ordering {
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if digits(a) && digits(b) {
        let (a, b) = (a.trim_start_matches('0'), b.trim_start_matches('0'));
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    } else {
        a.cmp(b)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A single benchmark problem.
///
/// Field names follow the HumanEval dataset so records can be read directly
/// from its JSON Lines export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[non_exhaustive]
pub struct Problem {
    /// The problem's identifier.
    #[builder(into)]
    pub task_id: TaskId,

    /// The prompt shown to the model: usually a signature and docstring.
    #[builder(into, default)]
    #[serde(default)]
    pub prompt: String,

    /// The held-out test suite, run after the candidate's code.
    #[builder(into)]
    pub test: String,

    /// The name of the function under test.
    ///
    /// When present the harness calls `check(<entry_point>)` after the test
    /// suite, since HumanEval test suites only define `check`.
    #[builder(into)]
    #[serde(default)]
    pub entry_point: Option<String>,
}

/// Problems keyed by task id, in dataset order.
#[derive(Debug, Clone, Default)]
pub struct ProblemSet {
    problems: Vec<Problem>,
}

impl ProblemSet {
    /// Build a problem set, rejecting duplicate task ids.
    pub fn new(problems: impl IntoIterator<Item = Problem>) -> Result<Self> {
        let problems = problems.into_iter().collect::<Vec<_>>();
        if let Some(task_id) = problems.iter().map(|p| &p.task_id).duplicates().next() {
            bail!("duplicate task id in problem set: {task_id}");
        }
        Ok(Self { problems })
    }

    /// Load problems from a `.jsonl` file (one record per line) or a `.json`
    /// file containing an array of records.
    #[tracing::instrument]
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            read_to_string(path).with_context(|| format!("read problem file: {path:?}"))?;

        let problems = if path.extension().is_some_and(|ext| ext == "jsonl") {
            content
                .lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(i, line)| {
                    serde_json::from_str::<Problem>(line)
                        .with_context(|| format!("parse problem at {path:?} line {}", i + 1))
                })
                .collect::<Result<Vec<_>>>()?
        } else {
            serde_json::from_str::<Vec<Problem>>(&content)
                .with_context(|| format!("parse problem file: {path:?}"))?
        };

        tracing::info!(count = problems.len(), "loaded problems");
        Self::new(problems)
    }

    /// Keep only the first `n` problems in dataset order.
    pub fn limit(mut self, n: usize) -> Self {
        self.problems.truncate(n);
        self
    }

    /// Look up a problem by its task id.
    pub fn get(&self, task_id: &TaskId) -> Result<&Problem> {
        self.problems
            .iter()
            .find(|p| &p.task_id == task_id)
            .ok_or_else(|| eyre!("no problem with task id {task_id}"))
    }

    /// Returns true if a problem with this id is in the set.
    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.problems.iter().any(|p| &p.task_id == task_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Problem> {
        self.problems.iter()
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }
}
