//! Scoped child-process execution with a hard deadline.
//!
//! The engine is an external, occasionally hung program. [`TokioCommandRunner`]
//! drains stdout and stderr concurrently (so a chatty child cannot block on a
//! full pipe) and relies on `kill_on_drop`: when the deadline fires the
//! wait future is dropped, which drops the `Child`, which kills it.
//!
//! The [`CommandRunner`] trait is the seam tests use to simulate crashes,
//! timeouts and engines that "succeed" without output, and to count spawns.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Captured result of a child that exited on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `None` if the child was terminated by a signal.
    pub code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    /// The stream worth showing to a user: stderr, or stdout if stderr is blank.
    pub fn diagnostics(&self) -> &str {
        if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

/// How a scoped run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Exited(ProcessOutput),
    /// The deadline passed and the child was killed.
    TimedOut,
}

/// Runs a program to completion or until a deadline.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// `Err` only when the program could not be started at all.
    async fn run(
        &self,
        program: &Path,
        args: &[OsString],
        deadline: Duration,
    ) -> std::io::Result<RunOutcome>;
}

/// Real runner on top of `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(
        &self,
        program: &Path,
        args: &[OsString],
        deadline: Duration,
    ) -> std::io::Result<RunOutcome> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        {
            // CREATE_NO_WINDOW: no console flash for the headless engine.
            command.creation_flags(0x0800_0000);
        }

        let child = command.spawn()?;
        debug!("Spawned {} (pid {:?})", program.display(), child.id());

        match tokio::time::timeout(deadline, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                Ok(RunOutcome::Exited(ProcessOutput {
                    code: output.status.code(),
                    success: output.status.success(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                }))
            }
            Err(_) => {
                warn!(
                    "{} exceeded {}s, killed",
                    program.display(),
                    deadline.as_secs()
                );
                Ok(RunOutcome::TimedOut)
            }
        }
    }
}
