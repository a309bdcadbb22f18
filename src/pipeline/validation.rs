// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Pipeline validation
//!
//! Validates a pipeline set before execution.

use std::collections::HashSet;
use std::path::Path;

use regex::Regex;

use crate::pipeline::{Action, Pipeline, PipelineSet, Step};
use crate::pipeline::selector::WILDCARD;

/// Pipeline validator
pub struct PipelineValidator;

impl PipelineValidator {
    /// Validate every pipeline of a set
    pub fn validate(set: &PipelineSet) -> ValidationResult {
        let mut result = ValidationResult::new();

        if set.pipelines.is_empty() {
            result.add_warning("Script declares no pipelines");
        }

        // Check for duplicate pipeline names
        let mut seen_names = HashSet::new();
        for pipeline in &set.pipelines {
            if !seen_names.insert(&pipeline.name) {
                result.add_error(&format!("Duplicate pipeline name: '{}'", pipeline.name));
            }
            Self::check_name("Pipeline", &pipeline.name, &mut result);
            Self::validate_pipeline(pipeline, &mut result);
        }

        result
    }

    fn check_name(what: &str, name: &str, result: &mut ValidationResult) {
        if name.trim().is_empty() {
            result.add_error(&format!("{} name is empty", what));
        } else if name.contains('.') {
            result.add_error(&format!(
                "{} name '{}' contains '.', which separates pipeline and step in targets",
                what, name
            ));
        } else if name == WILDCARD {
            result.add_error(&format!(
                "{} name '{}' is reserved, it selects everything",
                what, name
            ));
        }
    }

    fn validate_pipeline(pipeline: &Pipeline, result: &mut ValidationResult) {
        if pipeline.steps.is_empty() {
            result.add_warning(&format!("Pipeline '{}' has no steps", pipeline.name));
        }

        let mut seen_names = HashSet::new();
        for step in &pipeline.steps {
            if !seen_names.insert(&step.name) {
                result.add_error(&format!(
                    "Pipeline '{}': Duplicate step name '{}'",
                    pipeline.name, step.name
                ));
            }
            Self::check_name(&format!("Pipeline '{}': Step", pipeline.name), &step.name, result);
            Self::validate_step(pipeline, step, result);
        }
    }

    fn validate_step(pipeline: &Pipeline, step: &Step, result: &mut ValidationResult) {
        let at = format!("{}.{}", pipeline.name, step.name);

        if step.actions.is_empty() {
            result.add_warning(&format!("Step '{}' has no actions", at));
        }

        for action in &step.actions {
            match action {
                Action::Cmd { command } if command.trim().is_empty() => {
                    result.add_error(&format!("Step '{}': Command is empty", at));
                }
                Action::Replace { pattern, .. } => {
                    if let Err(e) = Regex::new(pattern) {
                        result.add_error(&format!(
                            "Step '{}': Invalid regex '{}': {}",
                            at, pattern, e
                        ));
                    }
                }
                Action::Move { from, to } if from.as_os_str().is_empty() || to.as_os_str().is_empty() => {
                    result.add_error(&format!("Step '{}': move needs a source and a target", at));
                }
                Action::Copy { from, to } if from.is_empty() || to.as_os_str().is_empty() => {
                    result.add_error(&format!("Step '{}': copy needs a source and a target", at));
                }
                _ => {}
            }
        }
    }

    /// Check that workspace directories exist (runtime validation)
    pub fn validate_workspaces(set: &PipelineSet, base_path: &Path) -> Vec<String> {
        let mut missing = Vec::new();

        for pipeline in &set.pipelines {
            for step in &pipeline.steps {
                let switches = step.actions.iter().filter_map(|a| match a {
                    Action::Workspace { path } => Some(path),
                    _ => None,
                });
                for workspace in std::iter::once(&step.workspace).chain(switches) {
                    if !base_path.join(workspace).is_dir() {
                        missing.push(format!(
                            "Step '{}.{}': Workspace not found: {}",
                            pipeline.name,
                            step.name,
                            workspace.display()
                        ));
                    }
                }
            }
        }

        missing
    }
}

/// Result of pipeline validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::StepKind;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn step(name: &str, actions: Vec<Action>) -> Step {
        let mut step = Step::new(name, StepKind::Sequential);
        step.actions = actions;
        step
    }

    fn set_of(pipelines: Vec<Pipeline>) -> PipelineSet {
        PipelineSet {
            pipelines,
            ..Default::default()
        }
    }

    fn pipeline(name: &str, steps: Vec<Step>) -> Pipeline {
        let mut pipeline = Pipeline::new(name);
        pipeline.steps = steps;
        pipeline
    }

    #[test]
    fn test_valid_set() {
        let set = set_of(vec![pipeline("dev", vec![step("go", vec![Action::cmd("go test")])])]);
        let result = PipelineValidator::validate(&set);
        assert!(result.is_valid());
        assert!(!result.has_warnings());
    }

    #[test]
    fn test_duplicate_names() {
        let set = set_of(vec![
            pipeline(
                "dev",
                vec![
                    step("go", vec![Action::cmd("a")]),
                    step("go", vec![Action::cmd("b")]),
                ],
            ),
            pipeline("dev", vec![]),
        ]);
        let result = PipelineValidator::validate(&set);
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.contains("Duplicate pipeline")));
        assert!(result.errors.iter().any(|e| e.contains("Duplicate step")));
    }

    #[test]
    fn test_dotted_and_reserved_names() {
        let set = set_of(vec![
            pipeline("a.b", vec![step("all", vec![Action::cmd("x")])]),
            pipeline("", vec![]),
        ]);
        let result = PipelineValidator::validate(&set);
        assert_eq!(result.errors.len(), 3);
        assert!(result.errors[0].contains("contains '.'"));
        assert!(result.errors[1].contains("reserved"));
        assert!(result.errors[2].contains("empty"));
    }

    #[test]
    fn test_bad_actions() {
        let set = set_of(vec![pipeline(
            "p",
            vec![step(
                "s",
                vec![
                    Action::cmd("  "),
                    Action::Replace {
                        path: PathBuf::from("f"),
                        pattern: "(".into(),
                        replacement: "".into(),
                    },
                ],
            )],
        )]);
        let result = PipelineValidator::validate(&set);
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].contains("Command is empty"));
        assert!(result.errors[1].contains("Invalid regex"));
    }

    #[test]
    fn test_empty_things_are_warnings() {
        let set = set_of(vec![pipeline("p", vec![step("s", vec![])]), pipeline("q", vec![])]);
        let result = PipelineValidator::validate(&set);
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 2);
    }

    #[test]
    fn test_missing_workspaces() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("app")).unwrap();

        let mut ok = step("ok", vec![Action::cmd("x")]);
        ok.workspace = PathBuf::from("app");
        let mut missing = step(
            "missing",
            vec![
                Action::cmd("x"),
                Action::Workspace {
                    path: PathBuf::from("nowhere"),
                },
            ],
        );
        missing.workspace = PathBuf::from("app");

        let set = set_of(vec![pipeline("p", vec![ok, missing])]);
        let problems = PipelineValidator::validate_workspaces(&set, dir.path());
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("p.missing"));
        assert!(problems[0].contains("nowhere"));
    }
}
