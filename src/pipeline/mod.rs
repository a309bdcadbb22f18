// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Pipeline model, planning and execution
//!
//! A script evaluates to a [`PipelineSet`]; a [`Target`] selects what to run,
//! [`PipelineValidator`] checks it and [`PipelineExecutor`] runs it.

mod definition;
pub mod events;
mod executor;
mod plan;
pub mod selector;
mod validation;

pub use definition::*;
pub use events::{EventLog, EventSink, ExecutionEvent, SharedSink, StepOutcome, Stream};
pub use executor::{
    ExecutionOptions, PipelineExecutor, PipelineReport, RunReport, StepReport, StepStatus,
};
pub use plan::{ExecutionPlan, Node};
pub use selector::{Selection, Target};
pub use validation::{PipelineValidator, ValidationResult};
