// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Shell executor
//!
//! Executes `cmd(..)` lines through the platform shell.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::debug;

use super::{ActionContext, CommandOutput, CommandRunner};
use crate::errors::{PipeflowError, PipeflowResult};
use crate::pipeline::Stream;

#[cfg(windows)]
const DEFAULT_SHELL: (&str, &str) = ("cmd", "/C");
#[cfg(not(windows))]
const DEFAULT_SHELL: (&str, &str) = ("sh", "-c");

/// Shell executor
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    program: PathBuf,
    arg: String,
}

impl ShellExecutor {
    /// The platform shell: `sh -c`, or `cmd /C` on Windows
    pub fn new() -> PipeflowResult<Self> {
        Self::with_shell(DEFAULT_SHELL.0, DEFAULT_SHELL.1)
    }

    /// A specific shell, looked up on `PATH` unless given as a path
    pub fn with_shell(shell: &str, arg: &str) -> PipeflowResult<Self> {
        let program = which::which(shell).map_err(|_| PipeflowError::ShellNotFound {
            shell: shell.to_string(),
        })?;
        debug!(shell = %program.display(), arg, "resolved shell");
        Ok(Self {
            program,
            arg: arg.to_string(),
        })
    }

    /// Shell from optional overrides, falling back to the platform default
    pub fn from_settings(shell: Option<&str>, arg: Option<&str>) -> PipeflowResult<Self> {
        match (shell, arg) {
            (None, None) => Self::new(),
            (Some(shell), arg) => Self::with_shell(shell, arg.unwrap_or(DEFAULT_SHELL.1)),
            (None, Some(arg)) => Self::with_shell(DEFAULT_SHELL.0, arg),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

async fn pump<R>(reader: Option<R>, stream: Stream, ctx: &ActionContext)
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return;
    };
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                ctx.line(stream, line.trim_end_matches(['\n', '\r']));
            }
            Err(e) => {
                debug!(error = %e, %stream, "stopped reading command output");
                break;
            }
        }
    }
}

#[async_trait]
impl CommandRunner for ShellExecutor {
    async fn run(&self, command: &str, ctx: &ActionContext) -> PipeflowResult<CommandOutput> {
        if !ctx.workspace.is_dir() {
            return Err(PipeflowError::WorkspaceNotFound {
                path: ctx.workspace.clone(),
            });
        }

        let start = Instant::now();

        let mut cmd = Command::new(&self.program);
        cmd.arg(&self.arg).arg(command);
        cmd.current_dir(&ctx.workspace);
        cmd.envs(&ctx.env);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| PipeflowError::SpawnFailed {
            command: command.to_string(),
            error: e.to_string(),
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (_, _, status) = tokio::join!(
            pump(stdout, Stream::Stdout, ctx),
            pump(stderr, Stream::Stderr, ctx),
            child.wait()
        );
        let status = status.map_err(|e| PipeflowError::SpawnFailed {
            command: command.to_string(),
            error: e.to_string(),
        })?;

        Ok(CommandOutput {
            success: status.success(),
            exit_code: status.code().unwrap_or(-1),
            duration: start.elapsed(),
        })
    }

    async fn check_available(&self) -> PipeflowResult<bool> {
        Ok(self.program.exists())
    }
}
