/*!
runner.rs - the single seam through which external processes are started.

`ProcessRunner` spawns real processes with tokio; tests plug in scripted
runners. Nothing else in the crate touches `tokio::process`.
*/

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::Invocation;
use crate::error::CommandError;

/// Captured result of a process that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    #[cfg(test)]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with an exit code and captured streams.
    #[cfg(test)]
    pub fn failed(code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Turn an unsuccessful exit into `CommandError::Exit`.
    pub fn into_checked(self, program: &str) -> Result<CommandOutput, CommandError> {
        if self.success {
            Ok(self)
        } else {
            Err(CommandError::Exit {
                program: program.to_string(),
                code: self.code,
                stdout: self.stdout,
                stderr: self.stderr,
            })
        }
    }
}

/// Executes one invocation and captures its output.
///
/// Returns `Err` only when the process could not be launched; exit status
/// is reported through `CommandOutput::success`.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError>;
}

/// Production runner: real child processes via `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        // kill_on_drop: a unit abandoned by its timeout must not leave nvr behind.
        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| CommandError::Launch {
                program: invocation.program.clone(),
                source,
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
