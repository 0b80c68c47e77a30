//! Reduces execution outcomes into pass@k statistics.
//!
//! Aggregation is a pure fold. Results never depend on the order outcomes
//! arrive in: problems are tracked per key in a sorted map, a problem counts
//! once per key no matter how many outcomes it has (it passes if any of them
//! passed), and the sampled failures are the lowest failing task ids in
//! natural order.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::problem::TaskId;

/// The default number of failing task ids sampled per key.
pub const DEFAULT_FAILURE_CAP: usize = 2;

/// Groups outcomes: one model prompted with one strategy.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AggregateKey {
    pub model: String,
    pub strategy: String,
}

impl AggregateKey {
    pub fn new(model: impl Into<String>, strategy: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            strategy: strategy.into(),
        }
    }
}

impl Display for AggregateKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.model, self.strategy)
    }
}

/// The boolean result of one candidate, keyed for aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
pub struct Attempt {
    #[builder(into)]
    pub task_id: TaskId,

    #[builder(into)]
    pub model: String,

    #[builder(into)]
    pub strategy: String,

    pub passed: bool,
}

impl Attempt {
    pub fn key(&self) -> AggregateKey {
        AggregateKey::new(&self.model, &self.strategy)
    }
}

/// Pass statistics for one key (or for an ensemble of keys).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateResult {
    /// Problems with at least one passing outcome.
    pub passed: usize,

    /// Distinct problems with any outcome.
    pub attempted: usize,

    /// A sample of failing task ids, lowest first (`HumanEval/2` before
    /// `HumanEval/10`).
    pub failures: Vec<TaskId>,
}

impl AggregateResult {
    /// Percentage of attempted problems that passed.
    ///
    /// The denominator is the number of problems actually attempted for this
    /// key; nothing attempted gives 0.
    pub fn pass_at_k(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            100.0 * self.passed as f64 / self.attempted as f64
        }
    }

    fn from_problems(problems: &BTreeMap<TaskId, bool>, failure_cap: usize) -> Self {
        Self {
            passed: problems.values().filter(|passed| **passed).count(),
            attempted: problems.len(),
            failures: problems
                .iter()
                .filter(|(_, passed)| !**passed)
                .map(|(task_id, _)| task_id.clone())
                .take(failure_cap)
                .collect(),
        }
    }
}

/// Folds attempts into per-key results.
#[derive(Debug, Clone, Copy, Builder)]
pub struct Aggregator {
    /// How many failing task ids to keep per key.
    #[builder(default = DEFAULT_FAILURE_CAP)]
    failure_cap: usize,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Aggregator {
    /// Group attempts by (model, strategy) and compute each group's result.
    pub fn aggregate(
        &self,
        attempts: impl IntoIterator<Item = Attempt>,
    ) -> BTreeMap<AggregateKey, AggregateResult> {
        let mut groups = BTreeMap::<AggregateKey, BTreeMap<TaskId, bool>>::new();
        for attempt in attempts {
            let passed = groups
                .entry(attempt.key())
                .or_default()
                .entry(attempt.task_id)
                .or_insert(false);
            *passed |= attempt.passed;
        }

        groups
            .into_iter()
            .map(|(key, problems)| {
                let result = AggregateResult::from_problems(&problems, self.failure_cap);
                (key, result)
            })
            .collect()
    }

    /// Any-strategy-passes: a problem passes if any attempt for it passed.
    ///
    /// When `keys` is given only attempts under those keys are considered.
    pub fn ensemble(
        &self,
        attempts: impl IntoIterator<Item = Attempt>,
        keys: Option<&[AggregateKey]>,
    ) -> AggregateResult {
        let mut problems = BTreeMap::<TaskId, bool>::new();
        for attempt in attempts {
            if keys.is_some_and(|keys| !keys.contains(&attempt.key())) {
                continue;
            }
            *problems.entry(attempt.task_id).or_insert(false) |= attempt.passed;
        }

        AggregateResult::from_problems(&problems, self.failure_cap)
    }
}
