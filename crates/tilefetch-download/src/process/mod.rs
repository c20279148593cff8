//! External tool lifecycle.
//!
//! A [`RunningProcess`] owns a spawned child with piped stdout/stderr. The
//! child itself is moved into a waiter task; callers keep a [`KillSwitch`]
//! that can terminate it from anywhere (including the cancellation
//! registry) without needing mutable access to the child.

mod locate;
mod stream;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use tilefetch_core::TransferError;
use tokio::process::{ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub use locate::{
    HF_CLI_CANDIDATES, HostOs, OM_CLI_NAME, detect_host_os, hf_install_hint, locate_hf_cli,
    locate_om_cli,
};
pub use stream::{STDERR_TAIL_LIMIT, spawn_capture, spawn_drain, spawn_progress_reader};

// ============================================================================
// Command description
// ============================================================================

/// Everything needed to start an external tool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program path or name.
    pub program: PathBuf,
    /// Arguments, in order.
    pub args: Vec<String>,
    /// Extra environment variables.
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Program name for log and error messages.
    #[must_use]
    pub fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

// ============================================================================
// Kill switch
// ============================================================================

/// Handle that forcefully terminates a running process.
///
/// Triggering is idempotent and never blocks; triggering after the process
/// exited does nothing.
#[derive(Clone, Debug, Default)]
pub struct KillSwitch {
    token: CancellationToken,
}

impl KillSwitch {
    fn new() -> Self {
        Self::default()
    }

    /// Request termination.
    pub fn kill(&self) {
        self.token.cancel();
    }

    /// Whether termination was requested.
    #[must_use]
    pub fn triggered(&self) -> bool {
        self.token.is_cancelled()
    }
}

// ============================================================================
// Running process
// ============================================================================

/// A spawned external tool.
#[derive(Debug)]
pub struct RunningProcess {
    program: String,
    pid: Option<u32>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    kill: KillSwitch,
    exit: JoinHandle<Result<ExitStatus, TransferError>>,
}

/// Spawn a process with piped output streams.
///
/// A program that cannot be found is reported as a launch error; the
/// child is killed if the returned handle is dropped before it exits.
pub fn spawn(spec: &CommandSpec) -> Result<RunningProcess, TransferError> {
    let program = spec.program_name();

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .envs(&spec.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| {
        let message = if e.kind() == std::io::ErrorKind::NotFound {
            format!("program not found: {e}")
        } else {
            e.to_string()
        };
        TransferError::launch(&program, message)
    })?;

    let pid = child.id();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    // Arguments can carry auth tokens; only their count is logged.
    debug!(%program, ?pid, arg_count = spec.args.len(), "Spawned process");

    let kill = KillSwitch::new();
    let switch = kill.clone();
    let waiter_program = program.clone();
    let exit = tokio::spawn(async move {
        tokio::select! {
            biased;
            status = child.wait() => status
                .map_err(|e| TransferError::from_io(format!("waiting for {waiter_program}"), &e)),
            () = switch.token.cancelled() => {
                debug!(program = %waiter_program, "Killing process");
                if let Err(e) = child.kill().await {
                    // Already exited between the cancel and the kill.
                    debug!(program = %waiter_program, error = %e, "Kill failed");
                }
                child
                    .wait()
                    .await
                    .map_err(|e| TransferError::from_io(format!("waiting for {waiter_program}"), &e))
            }
        }
    });

    Ok(RunningProcess {
        program,
        pid,
        stdout,
        stderr,
        kill,
        exit,
    })
}

impl RunningProcess {
    /// Program name.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// OS process id, if the process had not already been reaped.
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Take the stdout stream. Returns `None` on the second call.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    /// Take the stderr stream. Returns `None` on the second call.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.stderr.take()
    }

    /// Handle that terminates this process.
    #[must_use]
    pub fn kill_switch(&self) -> KillSwitch {
        self.kill.clone()
    }

    /// Forcefully terminate the process. Idempotent.
    pub fn kill(&self) {
        self.kill.kill();
    }

    /// Wait for the process to exit.
    pub async fn wait(self) -> Result<ExitStatus, TransferError> {
        match self.exit.await {
            Ok(result) => result,
            Err(e) => {
                warn!(program = %self.program, error = %e, "Process waiter task failed");
                Err(TransferError::Io {
                    context: format!("waiting for {}", self.program),
                    kind: "Other".to_string(),
                    message: e.to_string(),
                })
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn builder_collects_args_and_env() {
        let spec = CommandSpec::new("om")
            .arg("download-product")
            .args(["-p", "cf"])
            .env("HF_HUB_DISABLE_TELEMETRY", "1");
        assert_eq!(spec.args, vec!["download-product", "-p", "cf"]);
        assert_eq!(spec.env.get("HF_HUB_DISABLE_TELEMETRY").map(String::as_str), Some("1"));
        assert_eq!(spec.program_name(), "om");
    }

    #[tokio::test]
    async fn missing_program_is_a_launch_error() {
        let err = spawn(&CommandSpec::new("tilefetch-definitely-not-installed")).unwrap_err();
        assert!(matches!(err, TransferError::Launch { .. }));
    }

    #[tokio::test]
    async fn wait_reports_exit_status() {
        let process = spawn(&CommandSpec::new("sh").args(["-c", "exit 3"])).unwrap();
        let status = process.wait().await.unwrap();
        assert_eq!(status.code(), Some(3));
    }

    #[tokio::test]
    async fn kill_terminates_and_is_idempotent() {
        let process = spawn(&CommandSpec::new("sleep").arg("30")).unwrap();
        assert!(process.pid().is_some());
        process.kill();
        process.kill();
        let status = tokio::time::timeout(Duration::from_secs(5), process.wait())
            .await
            .expect("killed process should exit promptly")
            .unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    async fn kill_after_exit_is_a_no_op() {
        let process = spawn(&CommandSpec::new("true")).unwrap();
        let switch = process.kill_switch();
        let status = process.wait().await.unwrap();
        assert!(status.success());
        switch.kill();
        assert!(switch.triggered());
    }
}
