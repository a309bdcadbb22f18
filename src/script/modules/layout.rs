// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! The `layout` module: scaffolds folders and files from templates
//!
//! Unlike `pipe`, these functions act while the script is evaluated.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use regex::{Captures, Regex};
use tracing::debug;

use crate::script::error::{ScriptError, ScriptErrorKind, ScriptResult};
use crate::script::interpreter::Interpreter;
use crate::script::value::Value;

use super::{Call, Module};

pub fn module() -> Module {
    Module::new("layout")
        .register("layout", layout)
        .register("folder", folder)
        .register("template", template)
        .register("set", set)
}

/// What a layout script created
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Created {
    Folder(PathBuf),
    File { path: PathBuf, template: String },
}

#[derive(Debug, Default)]
pub struct LayoutState {
    /// Directory holding `layout.kts` and its template files
    layout_dir: PathBuf,
    /// Directory new folders and files are written under
    target_dir: PathBuf,
    name: Option<String>,
    vars: Option<BTreeMap<String, String>>,
    created: Vec<Created>,
}

impl LayoutState {
    pub fn new(layout_dir: PathBuf, target_dir: PathBuf) -> Self {
        Self {
            layout_dir,
            target_dir,
            ..Default::default()
        }
    }

    /// Name passed to `layout(..)`, once the script called it
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn created(&self) -> &[Created] {
        &self.created
    }
}

const PLACEHOLDER: &str = r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}";

/// Substitute `${key}` placeholders, failing on the first unknown key
pub fn render(template: &str, vars: &BTreeMap<String, String>) -> Result<String, String> {
    let placeholder = Regex::new(PLACEHOLDER).map_err(|e| e.to_string())?;
    let mut missing = None;
    let rendered = placeholder.replace_all(template, |caps: &Captures| {
        let key = &caps[1];
        match vars.get(key) {
            Some(value) => value.clone(),
            None => {
                missing.get_or_insert_with(|| key.to_string());
                String::new()
            }
        }
    });
    match missing {
        Some(key) => Err(format!("template variable '{}' was never set", key)),
        None => Ok(rendered.into_owned()),
    }
}

fn io_error(call: &Call, what: &str, path: &Path, e: std::io::Error) -> ScriptError {
    call.error(ScriptErrorKind::Io(format!(
        "failed to {} {}: {}",
        what,
        path.display(),
        e
    )))
}

fn layout(interp: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    call.arity(2)?;
    let name = call.str(0)?;
    let block = call.block(1)?;
    debug!(layout = %name, "applying layout");
    interp.layout.name = Some(name.clone());
    interp.call_closure(&block, &[("layoutName", Value::Str(name))])?;
    Ok(Value::Unit)
}

fn folder(interp: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    call.arity(1)?;
    let path = interp.layout.target_dir.join(call.str(0)?);
    std::fs::create_dir_all(&path).map_err(|e| io_error(call, "create", &path, e))?;
    interp.layout.created.push(Created::Folder(path));
    Ok(Value::Unit)
}

/// `template(target, file) { set(key, value) ... }`
fn template(interp: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    call.arity_range(2, 3)?;
    let target = interp.layout.target_dir.join(call.str(0)?);
    let file = call.str(1)?;

    if interp.layout.vars.is_some() {
        return Err(call.invalid("templates cannot be nested"));
    }
    interp.layout.vars = Some(BTreeMap::new());
    let evaluated = match call.args.len() {
        3 => {
            let block = call.block(2)?;
            interp.call_closure(&block, &[])
        }
        _ => Ok(Value::Unit),
    };
    let vars = interp.layout.vars.take().unwrap_or_default();
    evaluated?;

    let source = interp.layout.layout_dir.join(&file);
    let content = std::fs::read_to_string(&source)
        .map_err(|e| io_error(call, "read template", &source, e))?;
    let rendered = render(&content, &vars).map_err(|message| call.invalid(message))?;

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_error(call, "create", parent, e))?;
    }
    std::fs::write(&target, rendered).map_err(|e| io_error(call, "write", &target, e))?;

    interp.layout.created.push(Created::File {
        path: target,
        template: file,
    });
    Ok(Value::Unit)
}

fn set(interp: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    call.arity(2)?;
    let key = call.str(0)?;
    let value = call.arg(1)?.to_string();
    let vars = interp.layout.vars.as_mut().ok_or_else(|| {
        call.error(ScriptErrorKind::OutsideContext {
            function: "set".into(),
            context: "template".into(),
        })
    })?;
    vars.insert(key, value);
    Ok(Value::Unit)
}
