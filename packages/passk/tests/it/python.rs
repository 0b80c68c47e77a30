//! HumanEval-style problems run with the real Python interpreter.

use std::time::Duration;

use indoc::indoc;
use pretty_assertions::assert_eq as pretty_assert_eq;
use simple_test_case::test_case;

use passk::{Executor, Failure, Harness, Problem, ProblemSet};

use crate::{candidate, python3_available};

const SUM_PRODUCT_TEST: &str = indoc! {r#"
    METADATA = {}


    def check(candidate):
        assert candidate([]) == (0, 1)
        assert candidate([1, 1, 1]) == (3, 1)
        assert candidate([100, 0]) == (100, 0)
        assert candidate([3, 5, 7]) == (3 + 5 + 7, 3 * 5 * 7)
        assert candidate([10]) == (10, 10)
"#};

const FILTER_BY_SUBSTRING_TEST: &str = indoc! {r#"
    def check(candidate):
        assert candidate([], 'john') == []
        assert candidate(['xxx', 'asd', 'xxy', 'john doe', 'xxxAAA', 'xxx'], 'xxx') == ['xxx', 'xxxAAA', 'xxx']
        assert candidate(['grunt', 'trumpet', 'prune', 'gruesome'], 'run') == ['grunt', 'prune']
"#};

fn problems() -> ProblemSet {
    ProblemSet::new([
        Problem::builder()
            .task_id("HumanEval/8")
            .prompt("def sum_product(numbers):")
            .test(SUM_PRODUCT_TEST)
            .entry_point("sum_product")
            .build(),
        Problem::builder()
            .task_id("HumanEval/7")
            .prompt("def filter_by_substring(strings, substring):")
            .test(FILTER_BY_SUBSTRING_TEST)
            .entry_point("filter_by_substring")
            .build(),
    ])
    .unwrap()
}

fn harness(timeout: Duration) -> Harness {
    Harness::builder()
        .executor(Executor::builder().timeout(timeout).build())
        .build()
}

#[test_case(
    "HumanEval/8",
    "def sum_product(numbers):\n    s, p = 0, 1\n    for n in numbers:\n        s += n\n        p *= n\n    return s, p\n",
    true;
    "correct sum product"
)]
#[test_case(
    "HumanEval/8",
    "def sum_product(numbers):\n    return sum(numbers), 0\n",
    false;
    "wrong product"
)]
#[test_case(
    "HumanEval/8",
    "def sum_product(numbers):\n    s, p = 0, 1\n    for n in numbers:\n        s += n\n        p *= n\n    return [s, p]\n",
    false;
    "list instead of tuple"
)]
#[test_case(
    "HumanEval/7",
    "```python\ndef filter_by_substring(strings, substring):\n    return [s for s in strings if substring in s]\n```",
    true;
    "fenced filter by substring"
)]
#[test_case(
    "HumanEval/7",
    "def filter_by_substring(strings, substring):\n    raise ValueError('nope')\n",
    false;
    "raises"
)]
#[test_case(
    "HumanEval/7",
    "def filter_by_substring(strings, substring)\n    return strings\n",
    false;
    "syntax error"
)]
#[test]
fn evaluates_python_candidates(task: &str, code: &str, passes: bool) {
    if !python3_available() {
        eprintln!("skipping: python3 not available");
        return;
    }

    let problems = problems();
    let evaluation = harness(Duration::from_secs(10))
        .evaluate_in(&problems, &candidate(task, "gpt", "cot", code));
    pretty_assert_eq!(evaluation.outcome().map(|o| o.is_pass()), Some(passes));
}

#[test]
fn uncalled_check_is_invoked() {
    if !python3_available() {
        eprintln!("skipping: python3 not available");
        return;
    }

    // Without the check call the wrong answer would pass: the test suite only
    // defines `check`.
    let problems = problems();
    let wrong = candidate("HumanEval/8", "gpt", "cot", "def sum_product(numbers):\n    return 0, 0\n");

    let with_call = harness(Duration::from_secs(10)).evaluate_in(&problems, &wrong);
    let without_call = Harness::builder()
        .invoke_entry_point(false)
        .build()
        .evaluate_in(&problems, &wrong);

    assert!(with_call.outcome().unwrap().is_fail());
    assert!(without_call.outcome().unwrap().is_pass());
}

#[test]
fn assertion_failure_keeps_stderr() {
    if !python3_available() {
        eprintln!("skipping: python3 not available");
        return;
    }

    let problems = problems();
    let evaluation = harness(Duration::from_secs(10)).evaluate_in(
        &problems,
        &candidate("HumanEval/7", "gpt", "cot", "def filter_by_substring(s, sub):\n    return []\n"),
    );

    match evaluation.outcome().and_then(|o| o.failure()) {
        Some(Failure::Exited { exit_code, stderr }) => {
            pretty_assert_eq!(*exit_code, Some(1));
            assert!(stderr.contains("AssertionError"), "stderr: {stderr}");
        }
        other => panic!("expected an unsuccessful exit, got {other:?}"),
    }
}

#[test]
fn infinite_loop_times_out() {
    if !python3_available() {
        eprintln!("skipping: python3 not available");
        return;
    }

    let problems = problems();
    let evaluation = harness(Duration::from_millis(500)).evaluate_in(
        &problems,
        &candidate(
            "HumanEval/8",
            "gpt",
            "cot",
            "def sum_product(numbers):\n    while True:\n        pass\n",
        ),
    );

    assert!(matches!(
        evaluation.outcome().and_then(|o| o.failure()),
        Some(Failure::TimedOut { after_ms: 500 })
    ));
}
