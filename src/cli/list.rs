// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! List command - show pipelines and their steps

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use super::{ListFormat, Session};
use crate::pipeline::PipelineSet;

/// Run the list command
pub async fn run(session: &Session, file: Option<PathBuf>, format: ListFormat) -> Result<()> {
    let (_, set) = session.load(file)?;

    match format {
        ListFormat::Json => println!("{}", set.to_json()?),
        ListFormat::Yaml => print!("{}", set.to_yaml()?),
        ListFormat::Text => print!("{}", render_text(&set, session.verbose)),
    }
    Ok(())
}

fn render_text(set: &PipelineSet, verbose: bool) -> String {
    let mut out = String::new();
    for pipeline in &set.pipelines {
        out.push_str(&format!("{}\n", pipeline.name.bold()));
        for step in &pipeline.steps {
            out.push_str(&format!(
                "  {}.{} {}\n",
                pipeline.name,
                step.name,
                format!("({}, {})", step.kind, step.workspace.display()).dimmed()
            ));
            if verbose {
                for action in &step.actions {
                    out.push_str(&format!("      {}\n", action));
                }
            }
        }
    }
    out
}
