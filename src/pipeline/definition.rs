// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Pipeline definition structures
//!
//! The model a pipeline script evaluates to. Nothing here runs anything.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::{PipeflowError, PipeflowResult};
use crate::script::{self, Interpreter, Span};

/// Every pipeline declared by one script
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PipelineSet {
    /// Pipelines in declaration order
    pub pipelines: Vec<Pipeline>,

    /// Environment set at the top level of the script
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// Script the set was loaded from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl PipelineSet {
    /// Load and evaluate a pipeline script
    pub fn from_file(path: &Path) -> PipeflowResult<Self> {
        if !path.exists() {
            return Err(PipeflowError::ScriptNotFound {
                path: path.to_path_buf(),
            });
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| PipeflowError::FileReadError {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;

        Self::from_script(&content, path)
    }

    /// Evaluate script text; `path` is used for diagnostics and as the base
    /// directory for workspaces
    pub fn from_script(source: &str, path: &Path) -> PipeflowResult<Self> {
        let name = path.display().to_string();
        let to_diagnostic = |e| PipeflowError::from_script(e, &name, source);

        let program = script::parse(source).map_err(to_diagnostic)?;
        let mut interpreter = Interpreter::for_pipelines();
        interpreter.run(&program).map_err(to_diagnostic)?;

        let mut set = interpreter.into_recorder().finish();
        set.source = Some(path.to_path_buf());
        debug!(
            script = %name,
            pipelines = set.pipelines.len(),
            "evaluated pipeline script"
        );
        Ok(set)
    }

    /// Get a pipeline by name
    pub fn get(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines.iter().find(|p| p.name == name)
    }

    /// Get all pipeline names
    pub fn names(&self) -> Vec<&str> {
        self.pipelines.iter().map(|p| p.name.as_str()).collect()
    }

    /// Directory workspaces are relative to
    pub fn base_dir(&self) -> PathBuf {
        self.source
            .as_deref()
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> PipeflowResult<String> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> PipeflowResult<String> {
        serde_json::to_string_pretty(self).map_err(Into::into)
    }
}

/// A named, ordered list of steps
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Steps in declaration order
    pub steps: Vec<Step>,

    /// Environment for every step of this pipeline
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    #[serde(skip)]
    pub span: Span,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Get a step by name
    pub fn get_step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Get all step names
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }
}

/// How a step is scheduled relative to its siblings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// Runs after the previous step finished
    #[default]
    Sequential,
    /// Starts when reached and runs alongside the following steps
    Parallel,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Sequential => write!(f, "step"),
            StepKind::Parallel => write!(f, "parallel"),
        }
    }
}

/// A named unit of work
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    /// Step name (unique within its pipeline)
    pub name: String,

    #[serde(default)]
    pub kind: StepKind,

    /// Working directory, relative to the script directory
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,

    /// Environment for this step only
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// Actions in order
    #[serde(default)]
    pub actions: Vec<Action>,

    #[serde(skip)]
    pub span: Span,
}

fn default_workspace() -> PathBuf {
    PathBuf::from(".")
}

impl Step {
    pub fn new(name: impl Into<String>, kind: StepKind) -> Self {
        Self {
            name: name.into(),
            kind,
            workspace: default_workspace(),
            env: BTreeMap::new(),
            actions: Vec::new(),
            span: Span::default(),
        }
    }

    pub fn is_parallel(&self) -> bool {
        self.kind == StepKind::Parallel
    }
}

/// One thing a step does
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
    /// Shell command line
    Cmd { command: String },
    /// Move a file or directory
    Move { from: PathBuf, to: PathBuf },
    /// Copy a file or directory; `from` may be a glob
    Copy { from: String, to: PathBuf },
    /// Regex replace-all inside a file
    Replace {
        path: PathBuf,
        pattern: String,
        replacement: String,
    },
    /// Print a line
    Echo { message: String },
    /// Switch the working directory for the remaining actions
    Workspace { path: PathBuf },
}

impl Action {
    pub fn cmd(command: impl Into<String>) -> Self {
        Action::Cmd {
            command: command.into(),
        }
    }

    /// Short name of the action kind
    pub fn kind_name(&self) -> &'static str {
        match self {
            Action::Cmd { .. } => "cmd",
            Action::Move { .. } => "move",
            Action::Copy { .. } => "copy",
            Action::Replace { .. } => "replace",
            Action::Echo { .. } => "echo",
            Action::Workspace { .. } => "workspace",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Cmd { command } => write!(f, "{}", command),
            Action::Move { from, to } => write!(f, "move {} → {}", from.display(), to.display()),
            Action::Copy { from, to } => write!(f, "copy {} → {}", from, to.display()),
            Action::Replace { path, pattern, .. } => {
                write!(f, "replace /{}/ in {}", pattern, path.display())
            }
            Action::Echo { message } => write!(f, "echo {}", message),
            Action::Workspace { path } => write!(f, "workspace {}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL: &str = r#"pipeline("dev"){
    step("go"){
        workspace("./test")
        cmd("go run main.go")
    }
    parallel("echo"){
         workspace("./test")
         cmd("go run main.go")
    }
}


pipeline("prod"){
    step("go"){
        workspace("./test")
        cmd("go run main.go")
    }
}"#;

    #[test]
    fn test_canonical_script() {
        let set = PipelineSet::from_script(CANONICAL, Path::new("pipeline.kts")).unwrap();
        assert_eq!(set.names(), vec!["dev", "prod"]);

        let dev = set.get("dev").unwrap();
        assert_eq!(dev.step_names(), vec!["go", "echo"]);
        assert_eq!(dev.steps[0].kind, StepKind::Sequential);
        assert!(dev.steps[1].is_parallel());
        assert_eq!(dev.steps[0].workspace, PathBuf::from("./test"));
        assert_eq!(dev.steps[0].actions, vec![Action::cmd("go run main.go")]);

        let prod = set.get("prod").unwrap();
        assert_eq!(prod.steps.len(), 1);
    }

    #[test]
    fn test_base_dir() {
        let set = PipelineSet::from_script("", Path::new("ci/pipeline.kts")).unwrap();
        assert_eq!(set.base_dir(), PathBuf::from("ci"));

        let set = PipelineSet::from_script("", Path::new("pipeline.kts")).unwrap();
        assert_eq!(set.base_dir(), PathBuf::from("."));
    }

    #[test]
    fn test_script_error_becomes_diagnostic() {
        let err = PipelineSet::from_script("pipeline(\"x\") {\n  cmd(1)\n}", Path::new("p.kts"))
            .unwrap_err();
        assert!(matches!(err, PipeflowError::Script { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = PipelineSet::from_file(Path::new("/definitely/not/here.kts")).unwrap_err();
        assert!(matches!(err, PipeflowError::ScriptNotFound { .. }));
    }

    #[test]
    fn test_yaml_dump() {
        let set = PipelineSet::from_script(
            "pipeline(\"dev\") { step(\"a\") { cmd(\"make\") } }",
            Path::new("p.kts"),
        )
        .unwrap();
        let yaml = set.to_yaml().unwrap();
        assert!(yaml.contains("name: dev"));
        assert!(yaml.contains("kind: sequential"));
        assert!(yaml.contains("type: cmd"));

        let parsed: PipelineSet = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.pipelines, set.pipelines);
    }
}
