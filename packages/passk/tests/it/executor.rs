//! Process isolation: timeouts, descendants, and concurrent executions.

use std::fs::read_to_string;
use std::thread;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq as pretty_assert_eq;

use passk::{Failure, Outcome};

use crate::{sh_executor, wait_for_death};

#[test]
fn infinite_loop_fails_within_timeout() {
    let timeout = Duration::from_millis(300);
    let started = Instant::now();

    let outcome = sh_executor(timeout)
        .execute("while true; do :; done", "exit 0")
        .unwrap();

    pretty_assert_eq!(outcome, Outcome::fail(Failure::timed_out(timeout)));
    let elapsed = started.elapsed();
    assert!(elapsed >= timeout, "returned early: {elapsed:?}");
    assert!(elapsed < timeout + Duration::from_secs(2), "took {elapsed:?}");
}

#[test]
fn descendants_are_killed_on_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let pidfile = dir.path().join("pid");

    let outcome = sh_executor(Duration::from_millis(300))
        .run_program(&format!(
            "sleep 30 &\necho $! > '{}'\nwait\n",
            pidfile.display()
        ))
        .unwrap();
    assert!(matches!(
        outcome.failure(),
        Some(Failure::TimedOut { .. })
    ));

    let pid = read_to_string(&pidfile).unwrap().trim().parse::<i32>().unwrap();
    assert!(
        wait_for_death(pid, Duration::from_secs(2)),
        "background process {pid} survived the timeout"
    );
}

#[test]
fn descendants_are_killed_after_normal_exit() {
    let dir = tempfile::tempdir().unwrap();
    let pidfile = dir.path().join("pid");

    let outcome = sh_executor(Duration::from_secs(5))
        .run_program(&format!(
            "sleep 30 &\necho $! > '{}'\nexit 0\n",
            pidfile.display()
        ))
        .unwrap();
    pretty_assert_eq!(outcome, Outcome::pass());

    let pid = read_to_string(&pidfile).unwrap().trim().parse::<i32>().unwrap();
    assert!(
        wait_for_death(pid, Duration::from_secs(2)),
        "background process {pid} outlived its candidate"
    );
}

#[test]
fn concurrent_executions_do_not_interfere() {
    let executor = sh_executor(Duration::from_secs(10));

    // Each program writes its own id to a file in its working directory,
    // waits for the others to do the same, then checks the file is still its
    // own. A shared file or directory would make some of them fail.
    let outcomes = thread::scope(|scope| {
        let handles = (0..8)
            .map(|id| {
                let executor = &executor;
                scope.spawn(move || {
                    let expected = if id % 2 == 0 { id } else { id + 100 };
                    executor
                        .execute(
                            &format!("echo {id} > marker\nsleep 0.2"),
                            &format!("[ \"$(cat marker)\" = {expected} ]"),
                        )
                        .unwrap()
                })
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap().is_pass())
            .collect::<Vec<_>>()
    });

    pretty_assert_eq!(
        outcomes,
        vec![true, false, true, false, true, false, true, false]
    );
}
