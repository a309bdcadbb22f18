// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! File operations: `move`, `copy` and `replace`
//!
//! Paths are relative to the step workspace. These are blocking calls; the
//! executor runs them on the blocking pool.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use regex::Regex;
use tracing::debug;

use crate::errors::{PipeflowError, PipeflowResult};

/// File operations
pub struct FileOps;

fn write_error(path: &Path, e: io::Error) -> PipeflowError {
    PipeflowError::FileWriteError {
        path: path.to_path_buf(),
        error: e.to_string(),
    }
}

fn require(path: &Path) -> PipeflowResult<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(PipeflowError::FileNotFound {
            path: path.to_path_buf(),
            help: Some("Paths are relative to the step workspace".into()),
        })
    }
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// `path` with `.` and `..` resolved without touching the file system
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// A directory cannot be copied into its own tree
fn check_not_inside(source: &Path, target: &Path) -> PipeflowResult<()> {
    if source.is_dir() && normalize(target).starts_with(normalize(source)) {
        return Err(PipeflowError::CopyIntoItself {
            source_path: source.to_path_buf(),
            target: target.to_path_buf(),
        });
    }
    Ok(())
}

/// Copy a file or a directory tree to `target`
fn copy_all(source: &Path, target: &Path) -> io::Result<()> {
    if source.is_dir() {
        fs::create_dir_all(target)?;
        for entry in fs::read_dir(source)? {
            let entry = entry?;
            copy_all(&entry.path(), &target.join(entry.file_name()))?;
        }
    } else {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source, target)?;
    }
    Ok(())
}

fn remove_all(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

impl FileOps {
    /// Move a file or directory, copying and deleting when a rename fails
    /// (for example across file systems)
    pub fn move_path(workspace: &Path, from: &Path, to: &Path) -> PipeflowResult<()> {
        let source = workspace.join(from);
        let target = workspace.join(to);
        require(&source)?;
        check_not_inside(&source, &target)?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| write_error(parent, e))?;
        }

        if let Err(e) = fs::rename(&source, &target) {
            debug!(error = %e, "rename failed, copying instead");
            copy_all(&source, &target).map_err(|e| write_error(&target, e))?;
            remove_all(&source).map_err(|e| write_error(&source, e))?;
        }
        Ok(())
    }

    /// Copy `from` to `to`; a glob pattern copies every match into the
    /// directory `to`. Returns the copied sources.
    pub fn copy(workspace: &Path, from: &str, to: &Path) -> PipeflowResult<Vec<PathBuf>> {
        let target = workspace.join(to);

        if !is_glob(from) {
            let source = workspace.join(from);
            require(&source)?;
            check_not_inside(&source, &target)?;
            copy_all(&source, &target).map_err(|e| write_error(&target, e))?;
            return Ok(vec![source]);
        }

        let pattern = workspace.join(from).to_string_lossy().to_string();
        let sources: Vec<PathBuf> = glob::glob(&pattern)?.filter_map(Result::ok).collect();
        if sources.is_empty() {
            return Err(PipeflowError::NoMatches {
                pattern: from.to_string(),
            });
        }

        for source in &sources {
            check_not_inside(source, &target)?;
        }
        fs::create_dir_all(&target).map_err(|e| write_error(&target, e))?;
        for source in &sources {
            let Some(name) = source.file_name() else {
                continue;
            };
            let dest = target.join(name);
            copy_all(source, &dest).map_err(|e| write_error(&dest, e))?;
        }
        Ok(sources)
    }

    /// Regex replace-all inside a file; returns the number of matches
    pub fn replace(
        workspace: &Path,
        path: &Path,
        pattern: &str,
        replacement: &str,
    ) -> PipeflowResult<usize> {
        let file = workspace.join(path);
        require(&file)?;

        let re = Regex::new(pattern).map_err(|e| PipeflowError::regex(pattern, e))?;
        let content = fs::read_to_string(&file).map_err(|e| PipeflowError::FileReadError {
            path: file.clone(),
            error: e.to_string(),
        })?;

        let count = re.find_iter(&content).count();
        if count > 0 {
            let replaced = re.replace_all(&content, replacement);
            fs::write(&file, replaced.as_bytes()).map_err(|e| write_error(&file, e))?;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_move_file_relative_to_workspace() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "data").unwrap();

        FileOps::move_path(dir.path(), Path::new("a.txt"), Path::new("out/b.txt")).unwrap();

        assert!(!dir.path().join("a.txt").exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("out/b.txt")).unwrap(),
            "data"
        );
    }

    #[test]
    fn test_move_missing_source() {
        let dir = TempDir::new().unwrap();
        let err = FileOps::move_path(dir.path(), Path::new("nope"), Path::new("x")).unwrap_err();
        assert!(matches!(err, PipeflowError::FileNotFound { .. }));
    }

    #[test]
    fn test_copy_directory_tree() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        fs::write(dir.path().join("src/nested/f.txt"), "x").unwrap();

        FileOps::copy(dir.path(), "src", Path::new("dst")).unwrap();

        assert!(dir.path().join("src/nested/f.txt").exists());
        assert!(dir.path().join("dst/nested/f.txt").exists());
    }

    #[test]
    fn test_copy_directory_into_itself_is_rejected() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/f.txt"), "x").unwrap();

        for target in ["src/sub", "src", "./src/../src/deeper/x"] {
            let err = FileOps::copy(dir.path(), "src", Path::new(target)).unwrap_err();
            assert!(matches!(err, PipeflowError::CopyIntoItself { .. }), "{target}");
        }
        let err = FileOps::move_path(dir.path(), Path::new("src"), Path::new("src/sub"))
            .unwrap_err();
        assert!(matches!(err, PipeflowError::CopyIntoItself { .. }));
        assert!(!dir.path().join("src/sub").exists());

        // A sibling that merely shares the prefix is fine
        FileOps::copy(dir.path(), "src", Path::new("src-copy")).unwrap();
        assert!(dir.path().join("src-copy/f.txt").exists());
    }

    #[test]
    fn test_copy_glob_into_directory() {
        let dir = TempDir::new().unwrap();
        for name in ["a.js", "b.js", "c.css"] {
            fs::write(dir.path().join(name), name).unwrap();
        }

        let copied = FileOps::copy(dir.path(), "*.js", Path::new("public")).unwrap();

        assert_eq!(copied.len(), 2);
        assert!(dir.path().join("public/a.js").exists());
        assert!(dir.path().join("public/b.js").exists());
        assert!(!dir.path().join("public/c.css").exists());
    }

    #[test]
    fn test_copy_glob_without_matches() {
        let dir = TempDir::new().unwrap();
        let err = FileOps::copy(dir.path(), "*.none", Path::new("out")).unwrap_err();
        assert!(matches!(err, PipeflowError::NoMatches { .. }));
    }

    #[test]
    fn test_replace_in_place() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "app-v1.js app-v12.js").unwrap();

        let count =
            FileOps::replace(dir.path(), Path::new("index.html"), r"v[0-9]+", "v2").unwrap();

        assert_eq!(count, 2);
        assert_eq!(
            fs::read_to_string(dir.path().join("index.html")).unwrap(),
            "app-v2.js app-v2.js"
        );
    }

    #[test]
    fn test_replace_capture_groups() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("f"), "name=old").unwrap();
        FileOps::replace(dir.path(), Path::new("f"), r"name=(\w+)", "name=${1}_new").unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("f")).unwrap(), "name=old_new");
    }

    #[test]
    fn test_replace_bad_regex() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("f"), "").unwrap();
        let err = FileOps::replace(dir.path(), Path::new("f"), "(", "").unwrap_err();
        assert!(matches!(err, PipeflowError::Regex { .. }));
    }
}
