// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Graph command - visualize pipelines as graphs

use miette::Result;
use std::path::PathBuf;

use super::{GraphFormat, Session};
use crate::pipeline::{ExecutionPlan, Target};

/// Run the graph command
pub async fn run(
    session: &Session,
    pipeline: Option<String>,
    file: Option<PathBuf>,
    format: GraphFormat,
) -> Result<()> {
    let (_, set) = session.load(file)?;

    // Graphs always cover whole pipelines
    let target = Target {
        step: None,
        ..Target::parse(pipeline.as_deref())?
    };
    let outputs: Vec<String> = target
        .select(&set)?
        .iter()
        .map(|selection| {
            let plan = ExecutionPlan::for_selection(selection);
            match format {
                GraphFormat::Text => plan.to_text(),
                GraphFormat::Dot => plan.to_dot(),
                GraphFormat::Mermaid => plan.to_mermaid(),
            }
        })
        .collect();

    print!("{}", outputs.join("\n"));
    Ok(())
}
