// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! # pipeflow - Script-driven pipeline runner
//!
//! `pipeflow` evaluates a small Kotlin-style script that declares pipelines,
//! then runs their steps as shell commands and file operations.
//!
//! ## Features
//!
//! - **Pipeline scripts** - Variables, functions, loops and closures around `pipeline`/`step`
//! - **Parallel steps** - Run beside the sequential chain, joined before the pipeline ends
//! - **Selection** - Run everything, one pipeline, or a single `pipeline.step`
//! - **Templates and layouts** - Reusable scripts and folder scaffolds under `~/.pipeline`
//!
//! ## Quick Start
//!
//! ```bash
//! # Create pipeline.kts from the built-in template
//! pipeflow init
//!
//! # Run every pipeline, then a single step
//! pipeflow run
//! pipeflow run dev.test
//!
//! # Re-run on file changes
//! pipeflow watch dev
//! ```
//!
//! ## Library use
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use pipeflow::executors::ShellExecutor;
//! use pipeflow::pipeline::{ExecutionOptions, PipelineExecutor, PipelineSet, Target};
//!
//! # async fn demo() -> pipeflow::PipeflowResult<()> {
//! let set = PipelineSet::from_file(Path::new("pipeline.kts"))?;
//! let selections = Target::parse(Some("dev"))?.select(&set)?;
//! let report = PipelineExecutor::new(Arc::new(ShellExecutor::new()?))
//!     .execute(&set, &selections, &ExecutionOptions::default())
//!     .await?;
//! assert!(report.success);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod errors;
pub mod executors;
pub mod pipeline;
pub mod script;
pub mod templates;
pub mod utils;

// Re-export commonly used types
pub use errors::{PipeflowError, PipeflowResult};
pub use pipeline::{Action, Pipeline, PipelineSet, Step};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
