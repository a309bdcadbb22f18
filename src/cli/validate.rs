// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Validate command - check the pipeline script

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use super::Session;
use crate::pipeline::PipelineValidator;
use crate::utils::{print_error, print_header, print_section, print_success, print_warning};

/// Run the validate command
pub async fn run(session: &Session, file: Option<PathBuf>) -> Result<()> {
    print_header("Validating pipeline script");

    let (_, set) = session.load(file)?;
    print_success("Script evaluates");

    let validation = PipelineValidator::validate(&set);
    let missing_workspaces = PipelineValidator::validate_workspaces(&set, &set.base_dir());

    if !validation.errors.is_empty() {
        print_section(&"Errors".red().to_string());
        for error in &validation.errors {
            print_error(error);
        }
    }

    if !validation.warnings.is_empty() || !missing_workspaces.is_empty() {
        print_section(&"Warnings".yellow().to_string());
        for warning in validation.warnings.iter().chain(&missing_workspaces) {
            print_warning(warning);
        }
    }

    if session.verbose {
        print_section("Pipelines");
        for pipeline in &set.pipelines {
            println!("  {}", pipeline.name.bold());
            for step in &pipeline.steps {
                println!(
                    "    - {} ({}, {} action{})",
                    step.name,
                    step.kind,
                    step.actions.len(),
                    if step.actions.len() == 1 { "" } else { "s" }
                );
            }
        }
    }

    println!();

    if !validation.is_valid() {
        Err(miette::miette!("Pipeline validation failed"))
    } else if validation.has_warnings() || !missing_workspaces.is_empty() {
        println!("{}", "Pipeline script is valid but has warnings.".yellow().bold());
        Ok(())
    } else {
        println!("{}", "Pipeline script is valid!".green().bold());
        Ok(())
    }
}
