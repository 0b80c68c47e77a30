//! Integration tests for the evaluation harness.
//!
//! Most tests run candidates with `sh` as the interpreter so they do not need
//! Python; the tests in `python` skip themselves when `python3` is missing.

mod cli;
mod executor;
mod pipeline;
mod python;

use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use passk::{Candidate, Executor, Harness, Problem};

/// An executor that runs programs with `sh`.
pub fn sh_executor(timeout: Duration) -> Executor {
    Executor::builder()
        .interpreter("sh")
        .extension("sh")
        .timeout(timeout)
        .build()
}

/// A harness that runs programs with `sh`, calling `check <entry point>`.
pub fn sh_harness(timeout: Duration) -> Harness {
    Harness::builder()
        .executor(sh_executor(timeout))
        .check_call("check {entry_point}")
        .build()
}

pub fn candidate(task: &str, model: &str, strategy: &str, code: &str) -> Candidate {
    Candidate::builder()
        .task_id(task)
        .model(model)
        .strategy(strategy)
        .code(code)
        .build()
}

pub fn problem(task: &str, test: &str) -> Problem {
    Problem::builder().task_id(task).test(test).build()
}

/// Whether `python3` can be run; Python tests return early without it.
pub fn python3_available() -> bool {
    Command::new("python3")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

/// Write records as JSON Lines.
pub fn write_jsonl(path: &Path, records: &[serde_json::Value]) {
    let content = records
        .iter()
        .map(|record| record.to_string())
        .collect::<Vec<_>>()
        .join("\n");
    std::fs::write(path, content).expect("write jsonl fixture");
}

/// Whether a process is gone: no such pid, or a zombie waiting to be reaped.
pub fn process_is_dead(pid: i32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid), None) {
        Err(Errno::ESRCH) => true,
        _ => std::fs::read_to_string(format!("/proc/{pid}/stat"))
            .map(|stat| stat.contains(") Z "))
            .unwrap_or(false),
    }
}

/// Poll until `pid` is dead or `within` elapses.
pub fn wait_for_death(pid: i32, within: Duration) -> bool {
    let deadline = std::time::Instant::now() + within;
    loop {
        if process_is_dead(pid) {
            return true;
        }
        if std::time::Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

/// Run a passk subcommand and return (exit_code, stdout, stderr).
pub fn run_passk(args: &[&str]) -> (i32, String, String) {
    let status = Command::new("cargo")
        .args(["build", "--quiet", "-p", "passk"])
        .status()
        .expect("failed to build passk");
    assert!(status.success(), "cargo build failed");

    let mut cmd_args = vec!["run", "--quiet", "-p", "passk", "--"];
    cmd_args.extend(args);

    let output = Command::new("cargo")
        .args(&cmd_args)
        .env_remove("PASSK_CONFIG")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("failed to run passk");

    let exit_code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    (exit_code, stdout, stderr)
}
