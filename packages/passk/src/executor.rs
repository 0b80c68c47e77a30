//! Runs a candidate program against its tests in a fresh child process.
//!
//! Each execution gets its own scratch directory (named with a fresh uuid)
//! holding the combined program, and its own process group. The process group
//! is killed when the execution finishes, whether the program passed, failed,
//! or ran past its deadline, so no descendant of the candidate outlives the
//! call.

use std::fs::{File, write};
use std::io::{Read as _, Seek as _, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use bon::Builder;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use tempfile::TempDir;
use uuid::Uuid;

use crate::outcome::{Failure, Outcome};

/// The default wall-clock limit for a single execution.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);
const DEFAULT_STDERR_LIMIT: usize = 4096;

/// Runs programs in an interpreter with a hard timeout.
#[derive(Debug, Clone, Builder)]
pub struct Executor {
    /// The interpreter binary, or its name if it is in `$PATH`.
    #[builder(into, default = String::from("python3"))]
    interpreter: String,

    /// Arguments passed to the interpreter before the program path.
    #[builder(into, default)]
    interpreter_args: Vec<String>,

    /// Extension of the program file, without the dot.
    #[builder(into, default = String::from("py"))]
    extension: String,

    /// How long the program may run before it is killed.
    #[builder(default = DEFAULT_TIMEOUT)]
    timeout: Duration,

    /// How often the child is checked for completion.
    #[builder(default = DEFAULT_POLL_INTERVAL)]
    poll_interval: Duration,

    /// Where per-execution scratch directories are created.
    ///
    /// Defaults to the system temporary directory.
    #[builder(into)]
    scratch_dir: Option<PathBuf>,

    /// How many trailing bytes of stderr are kept for diagnostics.
    #[builder(default = DEFAULT_STDERR_LIMIT)]
    stderr_limit: usize,
}

impl Default for Executor {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Executor {
    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `candidate_code` followed by `test_code` as one program.
    ///
    /// Returns `Ok(Outcome::Pass)` if the program exits successfully before
    /// the timeout, `Ok(Outcome::Fail)` if it exits unsuccessfully or is
    /// killed at the deadline, and `Err` if the harness itself could not run
    /// it (for example the interpreter does not exist).
    pub fn execute(&self, candidate_code: &str, test_code: &str) -> Result<Outcome> {
        self.run_program(&combine(candidate_code, test_code, None))
    }

    /// Run a complete program.
    #[tracing::instrument(
        skip_all,
        fields(interpreter = %self.interpreter, timeout_secs = self.timeout.as_secs_f64())
    )]
    pub fn run_program(&self, program: &str) -> Result<Outcome> {
        let scratch = self.scratch()?;
        let script = scratch.path().join(format!("candidate.{}", self.extension));
        write(&script, program).with_context(|| format!("write program to {script:?}"))?;

        let deadline = Instant::now()
            .checked_add(self.timeout)
            .ok_or_else(|| eyre!("timeout of {:?} is out of range", self.timeout))?;

        let mut stderr = tempfile::tempfile().context("create stderr capture file")?;
        let child = self
            .command(&script, scratch.path(), &stderr)?
            .spawn()
            .with_context(|| format!("spawn interpreter {:?}", self.interpreter))?;

        let mut group = ProcessGroup::new(child);
        let exited = group.wait_until(deadline, self.poll_interval)?;
        let status = group.reap()?;

        let outcome = if !exited {
            tracing::debug!("program exceeded its timeout and was killed");
            Outcome::fail(Failure::timed_out(self.timeout))
        } else if status.success() {
            Outcome::pass()
        } else {
            let stderr = read_tail(&mut stderr, self.stderr_limit)?;
            Outcome::fail(Failure::exited(status.code(), stderr))
        };

        tracing::debug!(pass = outcome.is_pass(), "execution finished");
        Ok(outcome)
    }

    fn scratch(&self) -> Result<TempDir> {
        let prefix = format!("candidate-{}-", Uuid::new_v4());
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);

        match &self.scratch_dir {
            Some(dir) => builder
                .tempdir_in(dir)
                .with_context(|| format!("create scratch directory in {dir:?}")),
            None => builder.tempdir().context("create scratch directory"),
        }
    }

    fn command(&self, script: &Path, cwd: &Path, stderr: &File) -> Result<Command> {
        let stderr = stderr.try_clone().context("share stderr capture file")?;

        let mut command = Command::new(&self.interpreter);
        command
            .args(&self.interpreter_args)
            .arg(script)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr));

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt as _;
            command.process_group(0);
        }

        Ok(command)
    }
}

/// Join candidate code and tests into one program.
///
/// If `check_call` is given it is appended after the tests, so that a test
/// suite which only defines its checks is actually run.
pub fn combine(candidate_code: &str, test_code: &str, check_call: Option<&str>) -> String {
    let mut program = format!("{candidate_code}\n{test_code}\n");
    if let Some(call) = check_call {
        program.push_str(&format!("\n{call}\n"));
    }
    program
}

/// A spawned child that leads its own process group.
///
/// The leader is only reaped after its group has been killed, so its pid
/// (and with it the process group id) cannot be reused by an unrelated
/// process while the group is signalled. Dropping this without calling
/// [`ProcessGroup::reap`] kills the group and reaps the child.
struct ProcessGroup {
    child: Child,
    status: Option<ExitStatus>,
}

impl ProcessGroup {
    fn new(child: Child) -> Self {
        Self {
            child,
            status: None,
        }
    }

    /// Wait for the child to exit, or until `deadline`.
    ///
    /// Returns `false` if the deadline passed first. The child is left
    /// unreaped either way.
    fn wait_until(&mut self, deadline: Instant, poll: Duration) -> Result<bool> {
        loop {
            if self.has_exited()? {
                return Ok(true);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            thread::sleep(poll.min(deadline - now));
        }
    }

    /// Kill the group, then reap the leader and return its exit status.
    fn reap(&mut self) -> Result<ExitStatus> {
        if let Some(status) = self.status {
            return Ok(status);
        }

        self.kill();
        let status = self.child.wait().context("reap child process")?;
        self.status = Some(status);
        Ok(status)
    }

    #[cfg(target_os = "linux")]
    fn has_exited(&mut self) -> Result<bool> {
        use nix::sys::wait::{Id, WaitPidFlag, WaitStatus, waitid};
        use nix::unistd::Pid;

        let pid = i32::try_from(self.child.id()).context("child pid out of range")?;
        let flags = WaitPidFlag::WEXITED | WaitPidFlag::WNOHANG | WaitPidFlag::WNOWAIT;
        let status = waitid(Id::Pid(Pid::from_raw(pid)), flags).context("wait for child process")?;
        Ok(!matches!(status, WaitStatus::StillAlive))
    }

    // Without `WNOWAIT` the leader is reaped here; the group id stays taken
    // only while other members of the group are alive.
    #[cfg(not(target_os = "linux"))]
    fn has_exited(&mut self) -> Result<bool> {
        let status = self.child.try_wait().context("wait for child process")?;
        Ok(status.is_some())
    }

    #[cfg(unix)]
    fn kill(&mut self) {
        use nix::errno::Errno;
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        let killed = match i32::try_from(self.child.id()) {
            Ok(pgid) => match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
                Ok(()) | Err(Errno::ESRCH) => true,
                Err(error) => {
                    tracing::warn!(%error, pgid, "kill process group");
                    false
                }
            },
            Err(_) => false,
        };

        // The group is gone or unreachable; make sure the leader at least dies
        // so the reap cannot block.
        if !killed {
            let _ = self.child.kill();
        }
    }

    #[cfg(not(unix))]
    fn kill(&mut self) {
        if let Err(error) = self.child.kill() {
            tracing::debug!(%error, "kill child process");
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if let Err(error) = self.reap() {
            tracing::warn!(?error, "reap child process");
        }
    }
}

/// Read at most the last `limit` bytes written to `file`.
fn read_tail(file: &mut File, limit: usize) -> Result<String> {
    let len = file.seek(SeekFrom::End(0)).context("measure stderr capture")?;
    let start = len.saturating_sub(u64::try_from(limit).unwrap_or(u64::MAX));
    file.seek(SeekFrom::Start(start)).context("seek stderr capture")?;

    let mut bytes = Vec::new();
    file.take(len - start)
        .read_to_end(&mut bytes)
        .context("read stderr capture")?;

    let tail = String::from_utf8_lossy(&bytes);
    Ok(tail.trim_end().to_string())
}
