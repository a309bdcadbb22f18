// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Run targets: `pipeline[.step]`

use std::fmt;
use std::str::FromStr;

use crate::errors::{PipeflowError, PipeflowResult};
use crate::pipeline::{Pipeline, PipelineSet};

/// Name that selects every pipeline or every step
pub const WILDCARD: &str = "all";

/// A parsed run target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Target {
    /// `None` means all pipelines
    pub pipeline: Option<String>,
    /// `None` means all steps
    pub step: Option<String>,
}

/// A pipeline picked by a target, with the steps to run
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    pub pipeline: &'a Pipeline,
    /// `None` runs every step
    pub step: Option<&'a str>,
}

impl<'a> Selection<'a> {
    /// Whether the step at `name` is part of this selection
    pub fn includes(&self, name: &str) -> bool {
        self.step.map_or(true, |s| s == name)
    }
}

fn part(raw: &str) -> Option<String> {
    match raw {
        "" | WILDCARD => None,
        name => Some(name.to_string()),
    }
}

impl Target {
    /// Everything in the script
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse an optional command line target
    pub fn parse(target: Option<&str>) -> PipeflowResult<Self> {
        target.map(str::parse).unwrap_or_else(|| Ok(Self::all()))
    }

    /// Resolve against a pipeline set
    ///
    /// `all.<step>` picks the pipelines that have such a step and fails only
    /// when none has it.
    pub fn select<'a>(&self, set: &'a PipelineSet) -> PipeflowResult<Vec<Selection<'a>>> {
        let Some(name) = &self.pipeline else {
            let selected: Vec<Selection<'a>> = set
                .pipelines
                .iter()
                .filter_map(|pipeline| match &self.step {
                    Some(step) => pipeline.get_step(step).map(|s| Selection {
                        pipeline,
                        step: Some(s.name.as_str()),
                    }),
                    None => Some(Selection {
                        pipeline,
                        step: None,
                    }),
                })
                .collect();
            return match &self.step {
                Some(step) if selected.is_empty() => {
                    Err(PipeflowError::step_not_found(WILDCARD, step, &[]))
                }
                _ => Ok(selected),
            };
        };

        let pipeline = set
            .get(name)
            .ok_or_else(|| PipeflowError::pipeline_not_found(name, &set.names()))?;
        let step = match &self.step {
            Some(step) => Some(
                pipeline
                    .get_step(step)
                    .map(|s| s.name.as_str())
                    .ok_or_else(|| {
                        PipeflowError::step_not_found(&pipeline.name, step, &pipeline.step_names())
                    })?,
            ),
            None => None,
        };
        Ok(vec![Selection { pipeline, step }])
    }
}

impl FromStr for Target {
    type Err = PipeflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| PipeflowError::InvalidTarget {
            target: s.to_string(),
            reason: reason.to_string(),
        };

        let s = s.trim();
        let mut parts = s.splitn(3, '.');
        let pipeline = parts.next().unwrap_or_default();
        let step = parts.next();
        if parts.next().is_some() {
            return Err(invalid("expected `pipeline` or `pipeline.step`"));
        }
        if step == Some("") {
            return Err(invalid("step name after '.' is empty"));
        }
        if pipeline.is_empty() && step.is_some() {
            return Err(invalid("pipeline name before '.' is empty"));
        }

        Ok(Self {
            pipeline: part(pipeline),
            step: step.and_then(part),
        })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}",
            self.pipeline.as_deref().unwrap_or(WILDCARD),
            self.step.as_deref().unwrap_or(WILDCARD)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn set() -> PipelineSet {
        PipelineSet::from_script(
            r#"
            pipeline("dev") {
                step("go") { cmd("go run .") }
                parallel("echo") { cmd("echo hi") }
            }
            pipeline("prod") {
                step("go") { cmd("go build") }
            }
            "#,
            Path::new("pipeline.kts"),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_targets() {
        assert_eq!(Target::parse(None).unwrap(), Target::all());
        assert_eq!("all".parse::<Target>().unwrap(), Target::all());
        assert_eq!("all.all".parse::<Target>().unwrap(), Target::all());
        assert_eq!(
            "dev".parse::<Target>().unwrap(),
            "dev.all".parse::<Target>().unwrap()
        );

        let t: Target = "dev.go".parse().unwrap();
        assert_eq!(t.pipeline.as_deref(), Some("dev"));
        assert_eq!(t.step.as_deref(), Some("go"));
        assert_eq!(t.to_string(), "dev.go");

        let t: Target = "all.go".parse().unwrap();
        assert_eq!(t.pipeline, None);
        assert_eq!(t.to_string(), "all.go");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["a.b.c", "dev.", ".go"] {
            assert!(
                matches!(bad.parse::<Target>(), Err(PipeflowError::InvalidTarget { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_select_everything() {
        let set = set();
        let selected = Target::all().select(&set).unwrap();
        assert_eq!(selected.len(), 2);
        assert!(selected.iter().all(|s| s.step.is_none()));
    }

    #[test]
    fn test_select_single_step() {
        let set = set();
        let selected = "dev.go".parse::<Target>().unwrap().select(&set).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].pipeline.name, "dev");
        assert!(selected[0].includes("go"));
        assert!(!selected[0].includes("echo"));
    }

    #[test]
    fn test_step_across_pipelines() {
        let set = set();
        let selected = "all.go".parse::<Target>().unwrap().select(&set).unwrap();
        assert_eq!(selected.len(), 2);

        let selected = "all.echo".parse::<Target>().unwrap().select(&set).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].pipeline.name, "dev");

        let err = "all.lint".parse::<Target>().unwrap().select(&set).unwrap_err();
        assert!(matches!(err, PipeflowError::StepNotFound { .. }));
    }

    #[test]
    fn test_unknown_names() {
        let set = set();
        let err = "stage".parse::<Target>().unwrap().select(&set).unwrap_err();
        assert!(matches!(err, PipeflowError::PipelineNotFound { .. }));

        let err = "dev.lint".parse::<Target>().unwrap().select(&set).unwrap_err();
        assert!(matches!(err, PipeflowError::StepNotFound { .. }));
    }
}
