// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Native function modules
//!
//! A module is a named table of native functions. `std` is imported into
//! every interpreter; pipeline scripts also see `pipe`, layout scripts see
//! `layout`, and anything registered can be reached as `module.function(..)`
//! or brought in unqualified with `import`.

pub mod layout;
pub mod math;
pub mod pipe;
pub mod std;

use ::std::collections::BTreeMap;
use ::std::rc::Rc;

use super::error::{ScriptError, ScriptErrorKind, ScriptResult};
use super::interpreter::Interpreter;
use super::token::Span;
use super::value::{Closure, Value};

/// Signature shared by every native function
pub type NativeFn = fn(&mut Interpreter, &mut Call) -> ScriptResult<Value>;

#[derive(Debug, Clone)]
pub struct Module {
    name: &'static str,
    functions: BTreeMap<&'static str, NativeFn>,
}

impl Module {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            functions: BTreeMap::new(),
        }
    }

    pub fn register(mut self, name: &'static str, f: NativeFn) -> Self {
        self.functions.insert(name, f);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn get(&self, name: &str) -> Option<NativeFn> {
        self.functions.get(name).copied()
    }

    pub fn functions(&self) -> impl Iterator<Item = (&'static str, NativeFn)> + '_ {
        self.functions.iter().map(|(name, f)| (*name, *f))
    }
}

/// Arguments of one native call, with the spans needed for errors
#[derive(Debug)]
pub struct Call {
    pub name: String,
    pub span: Span,
    pub args: Vec<Value>,
    pub arg_spans: Vec<Span>,
}

impl Call {
    pub fn error(&self, kind: ScriptErrorKind) -> ScriptError {
        ScriptError::new(kind, self.span)
    }

    pub fn invalid(&self, message: impl Into<String>) -> ScriptError {
        self.error(ScriptErrorKind::InvalidArgument {
            function: self.name.clone(),
            message: message.into(),
        })
    }

    pub fn arity(&self, expected: usize) -> ScriptResult<()> {
        self.arity_range(expected, expected)
    }

    pub fn arity_range(&self, min: usize, max: usize) -> ScriptResult<()> {
        let found = self.args.len();
        if (min..=max).contains(&found) {
            return Ok(());
        }
        let expected = if min == max {
            min.to_string()
        } else if max == usize::MAX {
            format!("at least {}", min)
        } else {
            format!("{} to {}", min, max)
        };
        Err(self.error(ScriptErrorKind::ArityMismatch {
            function: self.name.clone(),
            expected,
            found,
        }))
    }

    pub fn arg(&self, index: usize) -> ScriptResult<&Value> {
        self.args.get(index).ok_or_else(|| {
            self.error(ScriptErrorKind::ArityMismatch {
                function: self.name.clone(),
                expected: format!("at least {}", index + 1),
                found: self.args.len(),
            })
        })
    }

    fn at(&self, index: usize, kind: ScriptErrorKind) -> ScriptError {
        let span = self.arg_spans.get(index).copied().unwrap_or(self.span);
        ScriptError::new(kind, span)
    }

    pub fn str(&self, index: usize) -> ScriptResult<String> {
        let value = self.arg(index)?;
        value
            .as_str()
            .map(str::to_string)
            .map_err(|k| self.at(index, k))
    }

    pub fn int(&self, index: usize) -> ScriptResult<i64> {
        self.arg(index)?.as_int().map_err(|k| self.at(index, k))
    }

    pub fn float(&self, index: usize) -> ScriptResult<f64> {
        self.arg(index)?.as_float().map_err(|k| self.at(index, k))
    }

    pub fn closure(&self, index: usize) -> ScriptResult<Rc<Closure>> {
        self.arg(index)?
            .as_closure()
            .cloned()
            .map_err(|k| self.at(index, k))
    }

    /// Trailing block of a pipe/layout call
    pub fn block(&self, index: usize) -> ScriptResult<Rc<Closure>> {
        match self.args.get(index) {
            Some(Value::Closure(c)) => Ok(c.clone()),
            Some(other) => Err(self.at(
                index,
                ScriptErrorKind::TypeMismatch {
                    expected: "a { ... } block".into(),
                    found: other.type_name().into(),
                },
            )),
            None => Err(self.invalid(format!(
                "expected a block: {}(...) {{ ... }}",
                self.name
            ))),
        }
    }
}
