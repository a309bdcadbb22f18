// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Terminal reporter for execution events

use std::collections::HashMap;
use std::sync::Mutex;

use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar};

use crate::pipeline::{EventSink, ExecutionEvent, RunReport, StepOutcome, StepStatus, Stream};
use crate::utils::{multi_progress, step_prefix, step_spinner};

/// Prints step output tagged with its step, with a spinner per running step
pub struct TerminalReporter {
    multi: MultiProgress,
    spinners: Mutex<HashMap<String, ProgressBar>>,
    verbose: bool,
}

impl TerminalReporter {
    pub fn new(verbose: bool) -> Self {
        Self {
            multi: multi_progress(),
            spinners: Mutex::new(HashMap::new()),
            verbose,
        }
    }

    fn key(pipeline: &str, step: &str) -> String {
        format!("{}.{}", pipeline, step)
    }

    /// Print above the spinners
    fn print(&self, line: String, to_stderr: bool) {
        self.multi.suspend(|| {
            if to_stderr {
                eprintln!("{}", line);
            } else {
                println!("{}", line);
            }
        });
    }

    fn start_spinner(&self, pipeline: &str, step: &str) {
        let key = Self::key(pipeline, step);
        let spinner = step_spinner(&self.multi, key.clone());
        if let Ok(mut spinners) = self.spinners.lock() {
            spinners.insert(key, spinner);
        }
    }

    fn stop_spinner(&self, pipeline: &str, step: &str) {
        let removed = self
            .spinners
            .lock()
            .ok()
            .and_then(|mut spinners| spinners.remove(&Self::key(pipeline, step)));
        if let Some(spinner) = removed {
            spinner.finish_and_clear();
            self.multi.remove(&spinner);
        }
    }

    /// Final summary after a run
    pub fn summary(&self, report: &RunReport) {
        println!();
        for pipeline in &report.pipelines {
            let mark = if pipeline.success {
                "✓".green()
            } else {
                "✗".red()
            };
            println!(
                "{} {} ({:.2}s)",
                mark,
                pipeline.name.bold(),
                pipeline.duration.as_secs_f64()
            );
            for step in &pipeline.steps {
                let line = match &step.status {
                    StepStatus::Succeeded => format!("  {} {}", "✓".green(), step.name),
                    StepStatus::Failed { error } => {
                        format!("  {} {} - {}", "✗".red(), step.name, error.dimmed())
                    }
                    StepStatus::Skipped => {
                        format!("  {} {} (skipped)", "○".dimmed(), step.name.dimmed())
                    }
                    StepStatus::Aborted => {
                        format!("  {} {} (aborted)", "■".yellow(), step.name)
                    }
                };
                println!("{}", line);
            }
        }

        println!();
        let elapsed = report.duration.as_secs_f64();
        if report.success {
            println!(
                "{}",
                format!("Completed successfully in {:.2}s", elapsed).green().bold()
            );
        } else {
            println!("{}", format!("Failed after {:.2}s", elapsed).red().bold());
        }
    }
}

impl EventSink for TerminalReporter {
    fn emit(&self, event: ExecutionEvent) {
        match event {
            ExecutionEvent::PipelineStarted { pipeline, steps } => {
                self.print(
                    format!("{} {} ({} steps)", "▶".blue(), pipeline.bold(), steps),
                    false,
                );
            }
            ExecutionEvent::StepStarted {
                pipeline,
                step,
                kind,
            } => {
                if self.verbose {
                    self.print(
                        format!("{} {} {}", step_prefix(&pipeline, &step), "started".dimmed(), kind),
                        false,
                    );
                }
                self.start_spinner(&pipeline, &step);
            }
            ExecutionEvent::ActionStarted {
                pipeline,
                step,
                action,
            } => {
                if self.verbose {
                    self.print(
                        format!("{} {} {}", step_prefix(&pipeline, &step), "$".dimmed(), action),
                        false,
                    );
                }
            }
            ExecutionEvent::Output {
                pipeline,
                step,
                stream,
                line,
            } => {
                let prefix = step_prefix(&pipeline, &step);
                match stream {
                    Stream::Stdout => self.print(format!("{} {}", prefix, line), false),
                    Stream::Stderr => self.print(format!("{} {}", prefix, line.red()), true),
                }
            }
            ExecutionEvent::StepFinished {
                pipeline,
                step,
                status,
                duration,
            } => {
                self.stop_spinner(&pipeline, &step);
                let prefix = step_prefix(&pipeline, &step);
                let line = match status {
                    StepOutcome::Succeeded => format!(
                        "{} {} ({:.2}s)",
                        prefix,
                        "✓".green(),
                        duration.as_secs_f64()
                    ),
                    StepOutcome::Failed(error) => format!("{} {} {}", prefix, "✗".red(), error),
                    StepOutcome::Aborted => format!("{} {}", prefix, "aborted".yellow()),
                };
                self.print(line, false);
            }
            ExecutionEvent::PipelineFinished { .. } => {}
        }
    }
}
