// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Error types with helpful messages
//!
//! Script problems are reported against the script source with a labelled
//! span; everything else carries a short help line pointing at the fix.

mod recovery;

pub use recovery::RecoverySuggestion;

use miette::{Diagnostic, NamedSource, SourceSpan};
use std::path::PathBuf;
use thiserror::Error;

use crate::script::ScriptError;

/// Result type for pipeflow operations
pub type PipeflowResult<T> = Result<T, PipeflowError>;

/// Main error type for pipeflow
#[derive(Error, Debug, Diagnostic)]
pub enum PipeflowError {
    // ─────────────────────────────────────────────────────────────────────────
    // Script Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(code(pipeflow::script))]
    Script {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("{label}")]
        span: SourceSpan,
        label: String,
        #[help]
        help: Option<String>,
    },

    #[error("Script file not found: {path}")]
    #[diagnostic(
        code(pipeflow::script_not_found),
        help("Create one with 'pipeflow init' or pass another file with --file")
    )]
    ScriptNotFound { path: PathBuf },

    // ─────────────────────────────────────────────────────────────────────────
    // Pipeline Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Pipeline '{name}' is not defined")]
    #[diagnostic(code(pipeflow::pipeline_not_found))]
    PipelineNotFound {
        name: String,
        #[help]
        help: Option<String>,
    },

    #[error("Step '{step}' is not defined in pipeline '{pipeline}'")]
    #[diagnostic(code(pipeflow::step_not_found))]
    StepNotFound {
        pipeline: String,
        step: String,
        #[help]
        help: Option<String>,
    },

    #[error("Invalid target '{target}': {reason}")]
    #[diagnostic(
        code(pipeflow::invalid_target),
        help("Targets look like 'pipeline' or 'pipeline.step'; 'all' matches everything")
    )]
    InvalidTarget { target: String, reason: String },

    #[error("Invalid pipeline script: {reason}")]
    #[diagnostic(code(pipeflow::invalid_pipeline))]
    InvalidPipeline {
        reason: String,
        #[help]
        help: Option<String>,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Execution Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Shell '{shell}' not found")]
    #[diagnostic(
        code(pipeflow::shell_not_found),
        help("Set 'shell' in pipeflow.toml to a shell available on PATH")
    )]
    ShellNotFound { shell: String },

    #[error("Workspace '{path}' does not exist")]
    #[diagnostic(
        code(pipeflow::workspace_not_found),
        help("Workspaces are resolved relative to the script directory")
    )]
    WorkspaceNotFound { path: PathBuf },

    #[error("Command `{command}` exited with code {code}")]
    #[diagnostic(code(pipeflow::command_failed))]
    CommandFailed { command: String, code: i32 },

    #[error("Failed to spawn `{command}`: {error}")]
    #[diagnostic(code(pipeflow::spawn_failed))]
    SpawnFailed { command: String, error: String },

    #[error("Step '{step}' failed: {reason}")]
    #[diagnostic(code(pipeflow::step_failed))]
    StepFailed { step: String, reason: String },

    #[error("Execution failed: {message}")]
    #[diagnostic(code(pipeflow::execution_failed))]
    ExecutionFailed {
        message: String,
        #[help]
        help: Option<String>,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // File Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("File not found: {path}")]
    #[diagnostic(code(pipeflow::file_not_found))]
    FileNotFound {
        path: PathBuf,
        #[help]
        help: Option<String>,
    },

    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(pipeflow::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Failed to write file '{path}': {error}")]
    #[diagnostic(code(pipeflow::file_write_error))]
    FileWriteError { path: PathBuf, error: String },

    #[error("No files matched pattern: {pattern}")]
    #[diagnostic(
        code(pipeflow::no_matches),
        help("Patterns are resolved relative to the step workspace")
    )]
    NoMatches { pattern: String },

    #[error("Cannot copy '{source_path}' into itself ('{target}')")]
    #[diagnostic(
        code(pipeflow::copy_into_itself),
        help("Choose a target outside the source directory")
    )]
    CopyIntoItself {
        source_path: PathBuf,
        target: PathBuf,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Template Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Template '{name}' not found")]
    #[diagnostic(
        code(pipeflow::template_not_found),
        help("List stored templates with 'pipeflow template list'")
    )]
    TemplateNotFound { name: String },

    #[error("'{name}' is not a valid template name")]
    #[diagnostic(
        code(pipeflow::invalid_template_name),
        help("Use letters, digits, '-' and '_' only")
    )]
    InvalidTemplateName { name: String },

    #[error("Layout '{name}' not found at {path}")]
    #[diagnostic(code(pipeflow::layout_not_found))]
    LayoutNotFound { name: String, path: PathBuf },

    #[error("{path} already exists")]
    #[diagnostic(code(pipeflow::already_exists), help("Pass --force to overwrite it"))]
    AlreadyExists { path: PathBuf },

    #[error("Could not determine the home directory")]
    #[diagnostic(
        code(pipeflow::no_home),
        help("Set PIPEFLOW_HOME to the directory holding templates and layouts")
    )]
    NoHomeDirectory,

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("IO error: {message}")]
    #[diagnostic(code(pipeflow::io_error))]
    Io { message: String },

    #[error("Invalid regex '{pattern}': {message}")]
    #[diagnostic(code(pipeflow::regex_error))]
    Regex { pattern: String, message: String },

    #[error("Config error in {path}: {message}")]
    #[diagnostic(code(pipeflow::config_error))]
    Config { path: PathBuf, message: String },

    #[error("YAML error: {message}")]
    #[diagnostic(code(pipeflow::yaml_error))]
    Yaml { message: String },

    #[error("JSON error: {message}")]
    #[diagnostic(code(pipeflow::json_error))]
    Json { message: String },

    #[error("Glob pattern error: {message}")]
    #[diagnostic(code(pipeflow::glob_error))]
    GlobPattern { message: String },
}

impl From<std::io::Error> for PipeflowError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for PipeflowError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for PipeflowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<glob::PatternError> for PipeflowError {
    fn from(e: glob::PatternError) -> Self {
        Self::GlobPattern { message: e.to_string() }
    }
}

impl PipeflowError {
    /// Attach script source to a script error so miette can point at it
    pub fn from_script(error: ScriptError, name: &str, source: &str) -> Self {
        let help = RecoverySuggestion::for_script_error(&error.kind).map(|s| s.render());
        let span = error.span.clamp_to(source.len());

        Self::Script {
            message: error.kind.to_string(),
            src: NamedSource::new(name, source.to_string()),
            span: span.into(),
            label: error.kind.label().to_string(),
            help,
        }
    }

    /// Pipeline lookup failure with the known names as help
    pub fn pipeline_not_found(name: &str, known: &[&str]) -> Self {
        Self::PipelineNotFound {
            name: name.to_string(),
            help: RecoverySuggestion::known_names("pipelines", known).map(|s| s.render()),
        }
    }

    /// Step lookup failure with the known step names as help
    pub fn step_not_found(pipeline: &str, step: &str, known: &[&str]) -> Self {
        Self::StepNotFound {
            pipeline: pipeline.to_string(),
            step: step.to_string(),
            help: RecoverySuggestion::known_names("steps", known).map(|s| s.render()),
        }
    }

    /// Regex compile failure
    pub fn regex(pattern: &str, error: regex::Error) -> Self {
        Self::Regex {
            pattern: pattern.to_string(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{ScriptErrorKind, Span};

    #[test]
    fn test_script_error_keeps_source_and_hint() {
        let source = "pipeline(\"dev\") {}";
        let error = ScriptError::new(
            ScriptErrorKind::UndefinedFunction("pipeline".into()),
            Span::new(0, 8),
        );

        match PipeflowError::from_script(error, "pipeline.kts", source) {
            PipeflowError::Script { message, span, help, .. } => {
                assert!(message.contains("pipeline"));
                assert_eq!(span.offset(), 0);
                assert_eq!(span.len(), 8);
                assert!(help.unwrap().contains("import pipe"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_span_is_clamped_to_source() {
        let error = ScriptError::new(ScriptErrorKind::UnterminatedString, Span::new(3, 100));
        match PipeflowError::from_script(error, "x.kts", "let") {
            PipeflowError::Script { span, .. } => {
                assert_eq!(span.offset(), 3);
                assert_eq!(span.len(), 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_pipeline_not_found_lists_names() {
        let err = PipeflowError::pipeline_not_found("stage", &["dev", "prod"]);
        match err {
            PipeflowError::PipelineNotFound { help, .. } => {
                let help = help.unwrap();
                assert!(help.contains("dev"));
                assert!(help.contains("prod"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
