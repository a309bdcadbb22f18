// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Action executors
//!
//! This module provides the command runner trait, the shell runner and the
//! file operations behind `move`, `copy` and `replace`.

mod files;
mod shell;

pub use files::FileOps;
pub use shell::ShellExecutor;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::PipeflowResult;
use crate::pipeline::{ExecutionEvent, SharedSink, Stream};

/// Where and for whom an action runs
#[derive(Clone)]
pub struct ActionContext {
    pub pipeline: String,
    pub step: String,
    /// Absolute or script-relative working directory
    pub workspace: PathBuf,
    pub env: BTreeMap<String, String>,
    pub sink: SharedSink,
}

impl ActionContext {
    /// Report one line of output for this step
    pub fn line(&self, stream: Stream, line: impl Into<String>) {
        self.sink.emit(ExecutionEvent::Output {
            pipeline: self.pipeline.clone(),
            step: self.step.clone(),
            stream,
            line: line.into(),
        });
    }
}

/// Result of running one command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Whether the command exited with status 0
    pub success: bool,

    /// Exit code, -1 when killed by a signal
    pub exit_code: i32,

    /// Execution duration
    pub duration: Duration,
}

/// Runs command lines
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command, streaming its output through `ctx`
    async fn run(&self, command: &str, ctx: &ActionContext) -> PipeflowResult<CommandOutput>;

    /// Check if the runner can be used
    async fn check_available(&self) -> PipeflowResult<bool>;
}
