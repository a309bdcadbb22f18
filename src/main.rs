// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! pipeflow - Script-driven pipeline runner
//!
//! Evaluate a pipeline script and run its steps.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pipeflow::cli::{self, Cli, Commands, Session};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "pipeflow=debug"
    } else {
        "pipeflow=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    pipeflow::utils::init();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    let session = Session::new(cli.verbose, cli.home);

    // Dispatch to command handlers
    match cli.command {
        Commands::Run {
            target,
            file,
            dry_run,
            fail_fast,
            keep_going,
        } => cli::run::run(&session, target, file, dry_run, fail_fast, keep_going).await,
        Commands::Validate { file } => cli::validate::run(&session, file).await,
        Commands::List { file, format } => cli::list::run(&session, file, format).await,
        Commands::Graph {
            pipeline,
            file,
            format,
        } => cli::graph::run(&session, pipeline, file, format).await,
        Commands::Init { template, force } => cli::init::run(&session, template, force).await,
        Commands::Template { action } => cli::template::run(&session, action).await,
        Commands::Layout { name, target } => cli::layout::run(&session, name, target).await,
        Commands::Watch {
            target,
            file,
            debounce,
        } => cli::watch::run(&session, target, file, debounce).await,
    }
}
