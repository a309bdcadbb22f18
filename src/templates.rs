// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Template store
//!
//! Stored scripts live as `<home>/<name>.kts`, layouts as
//! `<home>/layout/<name>/layout.kts` with their template files beside it.
//! The home is `$PIPEFLOW_HOME`, or `~/.pipeline`.

use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use tracing::debug;

use crate::errors::{PipeflowError, PipeflowResult};
use crate::script::{self, Created, Interpreter};

/// Environment variable overriding the home directory
pub const HOME_ENV: &str = "PIPEFLOW_HOME";

const HOME_DIR_NAME: &str = ".pipeline";
const SCRIPT_EXT: &str = "kts";
const LAYOUT_SCRIPT: &str = "layout.kts";

/// Script written by `init` when no template is named
pub const DEFAULT_TEMPLATE: &str = r#"pipeline("dev") {
    step("build") {
        workspace(".")
        cmd("echo building")
    }
    parallel("lint") {
        cmd("echo linting")
    }
    step("test") {
        cmd("echo testing")
    }
}
"#;

/// Stored scripts and layouts
#[derive(Debug, Clone)]
pub struct TemplateStore {
    root: PathBuf,
}

fn io_error(path: &Path, e: std::io::Error) -> PipeflowError {
    PipeflowError::FileWriteError {
        path: path.to_path_buf(),
        error: e.to_string(),
    }
}

fn check_name(name: &str) -> PipeflowResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(PipeflowError::InvalidTemplateName {
            name: name.to_string(),
        })
    }
}

/// Names of entries in `dir` accepted by `pick`, sorted
fn names_in(dir: &Path, pick: impl Fn(&Path) -> Option<String>) -> PipeflowResult<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        if let Some(name) = pick(&entry?.path()) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

impl TemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `home` when given (usually from `$PIPEFLOW_HOME`), else `~/.pipeline`
    pub fn locate(home: Option<PathBuf>) -> PipeflowResult<Self> {
        let root = match home {
            Some(home) => home,
            None => BaseDirs::new()
                .map(|dirs| dirs.home_dir().join(HOME_DIR_NAME))
                .ok_or(PipeflowError::NoHomeDirectory)?,
        };
        debug!(home = %root.display(), "template store");
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn template_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.{}", name, SCRIPT_EXT))
    }

    /// Stored script names, without extension
    pub fn list(&self) -> PipeflowResult<Vec<String>> {
        names_in(&self.root, |path| {
            let is_script = path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(SCRIPT_EXT);
            is_script
                .then(|| path.file_stem()?.to_str().map(str::to_string))
                .flatten()
        })
    }

    /// Content of a stored script
    pub fn read(&self, name: &str) -> PipeflowResult<String> {
        check_name(name)?;
        let path = self.template_path(name);
        if !path.is_file() {
            return Err(PipeflowError::TemplateNotFound {
                name: name.to_string(),
            });
        }
        fs::read_to_string(&path).map_err(|e| PipeflowError::FileReadError {
            path,
            error: e.to_string(),
        })
    }

    /// Store `script` as template `name`
    pub fn add(&self, name: &str, script: &Path, force: bool) -> PipeflowResult<PathBuf> {
        check_name(name)?;
        if !script.is_file() {
            return Err(PipeflowError::ScriptNotFound {
                path: script.to_path_buf(),
            });
        }

        let path = self.template_path(name);
        if path.exists() && !force {
            return Err(PipeflowError::AlreadyExists { path });
        }
        fs::create_dir_all(&self.root).map_err(|e| io_error(&self.root, e))?;
        fs::copy(script, &path).map_err(|e| io_error(&path, e))?;
        Ok(path)
    }

    /// Delete template `name`
    pub fn remove(&self, name: &str) -> PipeflowResult<()> {
        check_name(name)?;
        let path = self.template_path(name);
        if !path.is_file() {
            return Err(PipeflowError::TemplateNotFound {
                name: name.to_string(),
            });
        }
        fs::remove_file(&path).map_err(|e| io_error(&path, e))
    }

    /// Directory of layout `name`
    pub fn layout_dir(&self, name: &str) -> PathBuf {
        self.root.join("layout").join(name)
    }

    /// `layout.kts` of layout `name`, which must exist
    pub fn layout_script(&self, name: &str) -> PipeflowResult<PathBuf> {
        check_name(name)?;
        let path = self.layout_dir(name).join(LAYOUT_SCRIPT);
        if path.is_file() {
            Ok(path)
        } else {
            Err(PipeflowError::LayoutNotFound {
                name: name.to_string(),
                path,
            })
        }
    }

    /// Names of layouts that have a `layout.kts`
    pub fn layouts(&self) -> PipeflowResult<Vec<String>> {
        names_in(&self.root.join("layout"), |path| {
            path.join(LAYOUT_SCRIPT)
                .is_file()
                .then(|| path.file_name()?.to_str().map(str::to_string))
                .flatten()
        })
    }

    /// Evaluate layout `name`, creating its folders and files under `target`
    pub fn apply_layout(&self, name: &str, target: &Path) -> PipeflowResult<Vec<Created>> {
        let path = self.layout_script(name)?;
        let source = fs::read_to_string(&path).map_err(|e| PipeflowError::FileReadError {
            path: path.clone(),
            error: e.to_string(),
        })?;
        let label = path.display().to_string();
        let to_diagnostic = |e| PipeflowError::from_script(e, &label, &source);

        let program = script::parse(&source).map_err(to_diagnostic)?;
        let mut interpreter = Interpreter::for_layout(self.layout_dir(name), target);
        interpreter.run(&program).map_err(to_diagnostic)?;
        Ok(interpreter.layout_state().created().to_vec())
    }

    /// Write a new pipeline script at `target` from template `name`, or the
    /// built-in default
    pub fn init_script(
        &self,
        template: Option<&str>,
        target: &Path,
        force: bool,
    ) -> PipeflowResult<()> {
        if target.exists() && !force {
            return Err(PipeflowError::AlreadyExists {
                path: target.to_path_buf(),
            });
        }
        let content = match template {
            Some(name) => self.read(name)?,
            None => DEFAULT_TEMPLATE.to_string(),
        };
        fs::write(target, content).map_err(|e| io_error(target, e))
    }
}
