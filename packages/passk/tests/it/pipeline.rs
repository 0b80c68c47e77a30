//! Evaluation through aggregation, the way `passk run` drives it.

use std::time::Duration;

use pretty_assertions::assert_eq as pretty_assert_eq;

use passk::{AggregateKey, Aggregator, ProblemSet, Report, Settings, TaskId};

use crate::{candidate, problem, sh_harness};

fn problems() -> ProblemSet {
    ProblemSet::new([
        problem("double", "[ \"$(f 2)\" = 4 ]"),
        problem("negate", "[ \"$(f 2)\" = -2 ]"),
        problem("square", "[ \"$(f 3)\" = 9 ]"),
    ])
    .unwrap()
}

#[test]
fn pass_at_k_uses_attempted_problems() {
    let problems = problems();
    let candidates = vec![
        // gpt_cot attempts everything and solves two.
        candidate("double", "gpt", "cot", "f() { echo $(($1 * 2)); }"),
        candidate("negate", "gpt", "cot", "f() { echo $((0 - $1)); }"),
        candidate("square", "gpt", "cot", "f() { echo $(($1 + $1)); }"),
        // qwen_selfdebug was only generated for one problem, and solved it in
        // a fenced reply.
        candidate(
            "square",
            "qwen",
            "selfdebug",
            "Here you go:\n```sh\nf() { echo $(($1 * $1)); }\n```\n",
        ),
        // A failed generation, never executed.
        candidate("double", "claude", "rcotd", "API error"),
    ];

    let evaluations = sh_harness(Duration::from_secs(5))
        .evaluate_all(&problems, &candidates, 2, |_| {})
        .unwrap();
    let attempts = evaluations.iter().filter_map(|e| e.attempt()).collect::<Vec<_>>();
    let results = Aggregator::default().aggregate(attempts.clone());

    let gpt = &results[&AggregateKey::new("gpt", "cot")];
    pretty_assert_eq!((gpt.passed, gpt.attempted), (2, 3));
    pretty_assert_eq!(format!("{:.1}", gpt.pass_at_k()), "66.7");
    pretty_assert_eq!(gpt.failures, vec![TaskId::from("square")]);

    let qwen = &results[&AggregateKey::new("qwen", "selfdebug")];
    pretty_assert_eq!((qwen.passed, qwen.attempted), (1, 1));
    pretty_assert_eq!(qwen.pass_at_k(), 100.0);

    let claude = &results[&AggregateKey::new("claude", "rcotd")];
    pretty_assert_eq!((claude.passed, claude.attempted), (0, 1));

    // Every problem was solved by at least one model and strategy.
    let ensemble = Aggregator::default().ensemble(attempts, None);
    pretty_assert_eq!((ensemble.passed, ensemble.attempted), (3, 3));
}

#[test]
fn report_keeps_harness_errors_out_of_aggregates() {
    let problems = problems();
    let candidates = vec![
        candidate("double", "gpt", "cot", "f() { echo $(($1 * 2)); }"),
        candidate("cube", "gpt", "cot", "f() { echo $(($1 * $1 * $1)); }"),
    ];

    let evaluations = sh_harness(Duration::from_secs(5))
        .evaluate_all(&problems, &candidates, 1, |_| {})
        .unwrap();
    let report = Report::new(Settings::default(), evaluations);

    pretty_assert_eq!(report.errors().count(), 1);
    pretty_assert_eq!(report.result_rows().len(), 1);

    let summary = report.summary();
    pretty_assert_eq!(summary.rows.len(), 1);
    pretty_assert_eq!(summary.rows[0].key, "gpt_cot");
    pretty_assert_eq!(summary.rows[0].pass_at_k, 100.0);
}
