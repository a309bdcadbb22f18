// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Configuration loading
//!
//! `pipeflow.toml` in the project directory overrides `config.toml` in the
//! pipeflow home directory. Every key is optional.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{PipeflowError, PipeflowResult};
use crate::pipeline::ExecutionOptions;

/// Project configuration file name
pub const PROJECT_CONFIG: &str = "pipeflow.toml";

/// Configuration file name inside the pipeflow home
pub const HOME_CONFIG: &str = "config.toml";

/// Script looked for when `-f` is not given
pub const DEFAULT_SCRIPT: &str = "pipeline.kts";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Shell program running `cmd(..)` lines
    pub shell: Option<String>,

    /// Argument passed before the command, `-c` for `sh`
    pub shell_arg: Option<String>,

    /// Default script file name
    pub script: Option<String>,

    pub fail_fast: Option<bool>,

    pub keep_going: Option<bool>,
}

impl Config {
    /// Load one file; a missing file is an empty config
    pub fn load(path: &Path) -> PipeflowResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| PipeflowError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| PipeflowError::Config {
            path: path.to_path_buf(),
            message: e.message().to_string(),
        })
    }

    /// Project config layered over the home config
    pub fn resolve(project_dir: &Path, home: Option<&Path>) -> PipeflowResult<Self> {
        let base = match home {
            Some(home) => Self::load(&home.join(HOME_CONFIG))?,
            None => Self::default(),
        };
        let config = Self::load(&project_dir.join(PROJECT_CONFIG))?.over(base);
        debug!(?config, "resolved configuration");
        Ok(config)
    }

    /// Keys set here win over `base`
    pub fn over(self, base: Config) -> Config {
        Config {
            shell: self.shell.or(base.shell),
            shell_arg: self.shell_arg.or(base.shell_arg),
            script: self.script.or(base.script),
            fail_fast: self.fail_fast.or(base.fail_fast),
            keep_going: self.keep_going.or(base.keep_going),
        }
    }

    /// Script path, `explicit` first
    pub fn script_path(&self, explicit: Option<PathBuf>) -> PathBuf {
        explicit.unwrap_or_else(|| {
            PathBuf::from(self.script.as_deref().unwrap_or(DEFAULT_SCRIPT))
        })
    }

    /// Execution options; command line flags can only switch things on
    pub fn execution_options(
        &self,
        dry_run: bool,
        fail_fast: bool,
        keep_going: bool,
    ) -> ExecutionOptions {
        ExecutionOptions {
            dry_run,
            fail_fast: fail_fast || self.fail_fast.unwrap_or(false),
            keep_going: keep_going || self.keep_going.unwrap_or(false),
        }
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> PipeflowResult<String> {
        toml::to_string_pretty(self).map_err(|e| PipeflowError::Io {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_files_give_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::resolve(dir.path(), Some(dir.path())).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.script_path(None), PathBuf::from("pipeline.kts"));
    }

    #[test]
    fn test_project_overrides_home() {
        let home = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        std::fs::write(
            home.path().join(HOME_CONFIG),
            "shell = \"bash\"\nfail_fast = true\nscript = \"ci.kts\"\n",
        )
        .unwrap();
        std::fs::write(project.path().join(PROJECT_CONFIG), "script = \"build.kts\"\n").unwrap();

        let config = Config::resolve(project.path(), Some(home.path())).unwrap();
        assert_eq!(config.shell.as_deref(), Some("bash"));
        assert_eq!(config.script.as_deref(), Some("build.kts"));

        let options = config.execution_options(false, false, false);
        assert!(options.fail_fast);
        assert!(!options.keep_going);

        assert_eq!(
            config.script_path(Some(PathBuf::from("x.kts"))),
            PathBuf::from("x.kts")
        );
    }

    #[test]
    fn test_unknown_key_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(PROJECT_CONFIG), "shel = \"bash\"\n").unwrap();
        let err = Config::resolve(dir.path(), None).unwrap_err();
        assert!(matches!(err, PipeflowError::Config { .. }));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = Config {
            shell: Some("zsh".into()),
            keep_going: Some(true),
            ..Default::default()
        };
        let parsed: Config = toml::from_str(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }
}
