// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for pipeflow.

pub mod graph;
pub mod init;
pub mod layout;
pub mod list;
pub mod output;
pub mod run;
pub mod template;
pub mod validate;
pub mod watch;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use miette::Result;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::pipeline::{PipelineSet, PipelineValidator};
use crate::templates::TemplateStore;
use crate::utils::{print_error, print_warning};

/// Script-driven pipeline runner
///
/// Evaluates a pipeline script and runs its steps.
#[derive(Parser, Debug)]
#[clap(
    name = "pipeflow",
    version,
    about = "Run pipelines declared in a small Kotlin-style script",
    long_about = None,
    after_help = "Examples:\n\
        pipeflow init                   Create pipeline.kts\n\
        pipeflow run                    Run every pipeline\n\
        pipeflow run dev.build          Run step 'build' of pipeline 'dev'\n\
        pipeflow graph dev -F mermaid   Show pipeline 'dev' as a Mermaid graph\n\n\
        See 'pipeflow <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Directory holding templates, layouts and config.toml
    #[clap(long, global = true, env = "PIPEFLOW_HOME", value_name = "DIR")]
    pub home: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run pipelines
    Run {
        /// What to run: `pipeline` or `pipeline.step`, `all` by default
        target: Option<String>,

        /// Pipeline script
        #[clap(short, long)]
        file: Option<PathBuf>,

        /// Dry run (show what would be done)
        #[clap(long)]
        dry_run: bool,

        /// Abort running parallel steps as soon as a step fails
        #[clap(long)]
        fail_fast: bool,

        /// Run the remaining pipelines after one fails
        #[clap(long)]
        keep_going: bool,
    },

    /// Validate the pipeline script
    Validate {
        /// Pipeline script
        #[clap(short, long)]
        file: Option<PathBuf>,
    },

    /// List pipelines and steps
    List {
        /// Pipeline script
        #[clap(short, long)]
        file: Option<PathBuf>,

        /// Output format
        #[clap(short = 'F', long, value_enum, default_value_t = ListFormat::Text)]
        format: ListFormat,
    },

    /// Show pipelines as graphs
    Graph {
        /// Pipeline to draw, all by default
        pipeline: Option<String>,

        /// Pipeline script
        #[clap(short, long)]
        file: Option<PathBuf>,

        /// Output format
        #[clap(short = 'F', long, value_enum, default_value_t = GraphFormat::Text)]
        format: GraphFormat,
    },

    /// Create a pipeline script
    Init {
        /// Stored template to start from
        #[clap(short, long)]
        template: Option<String>,

        /// Overwrite an existing script
        #[clap(long)]
        force: bool,
    },

    /// Manage stored script templates
    Template {
        #[clap(subcommand)]
        action: TemplateAction,
    },

    /// Generate folders and files from a stored layout
    Layout {
        /// Layout name; lists layouts when omitted
        name: Option<String>,

        /// Directory to generate into
        #[clap(short, long, default_value = ".")]
        target: PathBuf,
    },

    /// Watch mode - re-run on file changes
    Watch {
        /// What to run: `pipeline` or `pipeline.step`
        target: Option<String>,

        /// Pipeline script
        #[clap(short, long)]
        file: Option<PathBuf>,

        /// Debounce delay in milliseconds
        #[clap(long, default_value = "500")]
        debounce: u64,
    },
}

/// Template actions
#[derive(Subcommand, Debug, Clone)]
pub enum TemplateAction {
    /// Save a script as a template
    Add {
        name: String,

        /// Script to save, the project script by default
        #[clap(short, long)]
        file: Option<PathBuf>,

        /// Replace an existing template
        #[clap(long)]
        force: bool,
    },

    /// Delete a template
    Remove { name: String },

    /// List templates and layouts
    List,
}

/// Output format for the list command
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListFormat {
    Text,
    Json,
    Yaml,
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

/// Settings shared by every command
#[derive(Debug, Clone)]
pub struct Session {
    pub verbose: bool,
    pub home: Option<PathBuf>,
}

impl Session {
    pub fn new(verbose: bool, home: Option<PathBuf>) -> Self {
        Self { verbose, home }
    }

    pub fn store(&self) -> Result<TemplateStore> {
        Ok(TemplateStore::locate(self.home.clone())?)
    }

    /// Configuration for the current directory
    pub fn config(&self) -> Result<Config> {
        let store = TemplateStore::locate(self.home.clone()).ok();
        Ok(Config::resolve(
            Path::new("."),
            store.as_ref().map(TemplateStore::root),
        )?)
    }

    /// Evaluate the script, `file` or the configured default
    pub fn load(&self, file: Option<PathBuf>) -> Result<(Config, PipelineSet)> {
        let config = self.config()?;
        let path = config.script_path(file);
        let set = PipelineSet::from_file(&path)?;
        Ok((config, set))
    }
}

/// Print validation problems; fails when there are errors
pub(crate) fn check(set: &PipelineSet, verbose: bool) -> Result<()> {
    let validation = PipelineValidator::validate(set);

    if !validation.is_valid() {
        eprintln!("{}", "Pipeline validation failed:".red().bold());
        for error in &validation.errors {
            print_error(error);
        }
        return Err(miette::miette!("Pipeline script is invalid"));
    }

    if verbose && validation.has_warnings() {
        println!("{}", "Warnings:".yellow().bold());
        for warning in &validation.warnings {
            print_warning(warning);
        }
        println!();
    }
    Ok(())
}
