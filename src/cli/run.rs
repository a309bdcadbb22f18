// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Run command - execute pipelines

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;
use std::sync::Arc;

use super::output::TerminalReporter;
use super::{check, Session};
use crate::config::Config;
use crate::errors::PipeflowError;
use crate::executors::ShellExecutor;
use crate::pipeline::{
    ExecutionOptions, ExecutionPlan, PipelineExecutor, PipelineSet, PipelineValidator, RunReport,
    Target,
};
use crate::utils::print_warning;

/// Run the pipelines selected by `target`
pub async fn run(
    session: &Session,
    target: Option<String>,
    file: Option<PathBuf>,
    dry_run: bool,
    fail_fast: bool,
    keep_going: bool,
) -> Result<()> {
    let (config, set) = session.load(file)?;
    check(&set, session.verbose)?;

    let options = config.execution_options(dry_run, fail_fast, keep_going);
    let report = execute(session, &config, &set, target.as_deref(), &options).await?;

    if !report.success {
        let failures = report.failures();
        return Err(PipeflowError::ExecutionFailed {
            message: if failures.is_empty() {
                "a step was aborted".to_string()
            } else {
                format!("failed steps: {}", failures.join(", "))
            },
            help: Some("Run with -v to see each action as it starts".into()),
        }
        .into());
    }

    Ok(())
}

/// Run one evaluated script; shared with watch mode
pub(crate) async fn execute(
    session: &Session,
    config: &Config,
    set: &PipelineSet,
    target: Option<&str>,
    options: &ExecutionOptions,
) -> Result<RunReport> {
    let selections = Target::parse(target)?.select(set)?;

    for missing in PipelineValidator::validate_workspaces(set, &set.base_dir()) {
        print_warning(&missing);
    }

    if options.dry_run {
        println!("{}", "Dry run, nothing will be executed".yellow().bold());
        println!();
        for selection in &selections {
            print!("{}", ExecutionPlan::for_selection(selection).to_text());
        }
    }

    let runner =
        ShellExecutor::from_settings(config.shell.as_deref(), config.shell_arg.as_deref())?;
    let reporter = Arc::new(TerminalReporter::new(session.verbose));
    let report = PipelineExecutor::new(Arc::new(runner))
        .with_sink(reporter.clone())
        .execute(set, &selections, options)
        .await?;

    if !options.dry_run {
        reporter.summary(&report);
    }
    Ok(report)
}
