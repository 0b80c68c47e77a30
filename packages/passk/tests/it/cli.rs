//! CLI Subcommand Smoke Tests

use pretty_assertions::assert_eq as pretty_assert_eq;
use serde_json::json;
use xshell::Shell;

use crate::{run_passk, write_jsonl};

/// Write a problem set and candidates into `dir`; returns their paths.
fn fixtures(sh: &Shell, dir: &std::path::Path) -> (String, String) {
    let problems = dir.join("problems.jsonl");
    let candidates = dir.join("candidates.jsonl");

    write_jsonl(
        &problems,
        &[
            json!({"task_id": "double", "prompt": "", "test": "[ \"$(f 2)\" = 4 ]"}),
            json!({"task_id": "negate", "prompt": "", "test": "[ \"$(f 2)\" = -2 ]"}),
        ],
    );
    write_jsonl(
        &candidates,
        &[
            json!({"task_id": "double", "model": "gpt", "strategy": "cot", "code": "f() { echo $(($1 * 2)); }"}),
            json!({"task_id": "negate", "model": "gpt", "strategy": "cot", "code": "f() { echo 0; }"}),
            json!({"task_id": "negate", "model": "qwen", "strategy": "cot", "code": "API error"}),
        ],
    );
    assert!(sh.path_exists(&problems));

    (
        problems.display().to_string(),
        candidates.display().to_string(),
    )
}

#[test]
fn test_run_writes_result_files() {
    let sh = Shell::new().unwrap();
    let dir = sh.create_temp_dir().unwrap();
    let (problems, candidates) = fixtures(&sh, dir.path());
    let output = dir.path().join("evaluation");
    let output = output.display().to_string();

    let (exit_code, stdout, stderr) = run_passk(&[
        "run",
        "--problems",
        &problems,
        "--candidates",
        &candidates,
        "--output-dir",
        &output,
        "--interpreter",
        "sh",
    ]);

    pretty_assert_eq!(exit_code, 0, "run should exit 0, stderr: {stderr}");
    assert!(stdout.contains("gpt_cot"), "stdout: {stdout}");

    let results = sh
        .read_file(format!("{output}/evaluation_results.csv"))
        .unwrap();
    pretty_assert_eq!(
        results,
        "Problem,Model,Strategy,Pass\n\
         double,gpt,cot,True\n\
         negate,gpt,cot,False\n\
         negate,qwen,cot,False\n"
    );

    let summary = sh.read_file(format!("{output}/pass_at_k_results.csv")).unwrap();
    pretty_assert_eq!(
        summary,
        "Model_Strategy,pass@10 (%),Example Failures\n\
         gpt_cot,50.0,negate\n\
         qwen_cot,0.0,negate\n"
    );

    assert!(sh.path_exists(format!("{output}/report.json")));
}

#[test]
fn test_run_fails_after_reporting_harness_errors() {
    let sh = Shell::new().unwrap();
    let dir = sh.create_temp_dir().unwrap();
    let (problems, candidates) = fixtures(&sh, dir.path());
    let output = dir.path().join("evaluation").display().to_string();

    let (exit_code, _stdout, _stderr) = run_passk(&[
        "run",
        "--problems",
        &problems,
        "--candidates",
        &candidates,
        "--output-dir",
        &output,
        "--interpreter",
        "/nonexistent/interpreter",
    ]);

    assert!(exit_code != 0, "run should fail when the interpreter is missing");
    // Only the sentinel candidate could be judged without the interpreter.
    let results = sh
        .read_file(format!("{output}/evaluation_results.csv"))
        .unwrap();
    pretty_assert_eq!(results, "Problem,Model,Strategy,Pass\nnegate,qwen,cot,False\n");
}

#[test]
fn test_run_rejects_out_of_range_timeout() {
    let sh = Shell::new().unwrap();
    let dir = sh.create_temp_dir().unwrap();
    let (problems, candidates) = fixtures(&sh, dir.path());
    let output = dir.path().join("evaluation");

    let (exit_code, _stdout, stderr) = run_passk(&[
        "run",
        "--problems",
        &problems,
        "--candidates",
        &candidates,
        "--output-dir",
        &output.display().to_string(),
        "--timeout",
        "1e30",
    ]);

    assert!(exit_code != 0, "run should reject the timeout");
    assert!(stderr.contains("timeout"), "stderr: {stderr}");
    assert!(!stderr.contains("panicked"), "stderr: {stderr}");
    assert!(!output.exists());
}

#[test]
fn test_report_rebuilds_summary_from_results() {
    let sh = Shell::new().unwrap();
    let dir = sh.create_temp_dir().unwrap();
    let results = dir.path().join("evaluation_results.csv");
    sh.write_file(
        &results,
        "Problem,Model,Strategy,Pass\n\
         p1,gpt,cot,True\n\
         p2,gpt,cot,False\n\
         p3,gpt,cot,False\n\
         p4,gpt,cot,False\n",
    )
    .unwrap();

    let (exit_code, stdout, stderr) = run_passk(&[
        "report",
        "--input",
        &results.display().to_string(),
        "--format",
        "csv",
    ]);

    pretty_assert_eq!(exit_code, 0, "report should exit 0, stderr: {stderr}");
    pretty_assert_eq!(
        stdout,
        "Model_Strategy,pass@10 (%),Example Failures\ngpt_cot,25.0,\"p2, p3\"\n"
    );
}

#[test]
fn test_compare_writes_change_column() {
    let sh = Shell::new().unwrap();
    let dir = sh.create_temp_dir().unwrap();
    let original = dir.path().join("original.csv");
    let refined = dir.path().join("refined.csv");
    let output = dir.path().join("comparison.csv");
    sh.write_file(
        &original,
        "Model_Strategy,pass@10 (%),Example Failures\ngpt_cot,40.0,\"p2, p3\"\n",
    )
    .unwrap();
    sh.write_file(
        &refined,
        "Model_Strategy,pass@10 (%),Example Failures\ngpt_cot,30.0,p2\n",
    )
    .unwrap();

    let (exit_code, _stdout, stderr) = run_passk(&[
        "compare",
        &original.display().to_string(),
        &refined.display().to_string(),
        "--output",
        &output.display().to_string(),
    ]);

    pretty_assert_eq!(exit_code, 0, "compare should exit 0, stderr: {stderr}");
    pretty_assert_eq!(
        sh.read_file(&output).unwrap(),
        "Model_Strategy,pass@10 (%),Refined pass@10 (%),Example Failures,Example Failures (Refined),Change\n\
         gpt_cot,40.0,30.0,\"p2, p3\",p2,↓ -10.0\n"
    );
}

#[test]
fn test_list_shows_problems() {
    let sh = Shell::new().unwrap();
    let dir = sh.create_temp_dir().unwrap();
    let (problems, _) = fixtures(&sh, dir.path());

    let (exit_code, stdout, _stderr) = run_passk(&["list", "--problems", &problems, "--limit", "1"]);

    pretty_assert_eq!(exit_code, 0, "list should exit 0");
    assert!(stdout.contains("double"), "stdout: {stdout}");
    assert!(!stdout.contains("negate"), "stdout: {stdout}");
}
