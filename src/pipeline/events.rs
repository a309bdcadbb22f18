// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Events emitted while pipelines run

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::pipeline::StepKind;

/// Which output stream a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Stdout => write!(f, "stdout"),
            Stream::Stderr => write!(f, "stderr"),
        }
    }
}

/// Events that can occur during pipeline execution
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    PipelineStarted {
        pipeline: String,
        steps: usize,
    },
    StepStarted {
        pipeline: String,
        step: String,
        kind: StepKind,
    },
    ActionStarted {
        pipeline: String,
        step: String,
        action: String,
    },
    Output {
        pipeline: String,
        step: String,
        stream: Stream,
        line: String,
    },
    StepFinished {
        pipeline: String,
        step: String,
        status: StepOutcome,
        duration: Duration,
    },
    PipelineFinished {
        pipeline: String,
        success: bool,
        duration: Duration,
    },
}

/// How a step ended, as reported in events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded,
    Failed(String),
    Aborted,
}

/// Receives execution events; called from whichever task produced them
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ExecutionEvent);
}

impl<F> EventSink for F
where
    F: Fn(ExecutionEvent) + Send + Sync,
{
    fn emit(&self, event: ExecutionEvent) {
        self(event)
    }
}

/// Shared sink handle
pub type SharedSink = Arc<dyn EventSink>;

/// Sink that drops every event
pub fn null_sink() -> SharedSink {
    Arc::new(|_: ExecutionEvent| {})
}

/// Sink that keeps every event, mostly for tests and `--json` style reporting
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<ExecutionEvent>>,
}

impl EventLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<ExecutionEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Output lines of one step, in arrival order
    pub fn lines_of(&self, step: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ExecutionEvent::Output { step: s, line, .. } if s == step => Some(line),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: ExecutionEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
