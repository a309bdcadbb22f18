// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Tree-walking interpreter
//!
//! Evaluation is single threaded and deterministic. Pipe functions do not run
//! anything; they record pipelines into [`Recorder`], which the loader turns
//! into a [`PipelineSet`](crate::pipeline::PipelineSet) after the script ends.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use tracing::debug;

use super::ast::{BinaryOp, Callee, Expr, ExprKind, FnDecl, Stmt, UnaryOp};
use super::error::{ScriptError, ScriptErrorKind, ScriptResult};
use super::modules::layout::LayoutState;
use super::modules::pipe::Recorder;
use super::modules::{self, Call, Module, NativeFn};
use super::token::{Span, StrPart};
use super::value::{Closure, Value};

/// Default limit on nested function and block calls
pub const MAX_CALL_DEPTH: usize = 256;

pub type ScopeRef = Rc<RefCell<Scope>>;

/// One level of lexical scope
#[derive(Debug, Default)]
pub struct Scope {
    vars: HashMap<String, Value>,
    fns: HashMap<String, Rc<ScriptFn>>,
    parent: Option<ScopeRef>,
}

#[derive(Debug)]
pub struct ScriptFn {
    decl: Rc<FnDecl>,
    scope: ScopeRef,
}

impl Scope {
    pub fn root() -> ScopeRef {
        Rc::new(RefCell::new(Scope::default()))
    }

    pub fn child(parent: &ScopeRef) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            parent: Some(parent.clone()),
            ..Default::default()
        }))
    }

    pub fn define(scope: &ScopeRef, name: &str, value: Value) {
        scope.borrow_mut().vars.insert(name.to_string(), value);
    }

    pub fn lookup(scope: &ScopeRef, name: &str) -> Option<Value> {
        let mut current = Some(scope.clone());
        while let Some(s) = current {
            let s = s.borrow();
            if let Some(v) = s.vars.get(name) {
                return Some(v.clone());
            }
            current = s.parent.clone();
        }
        None
    }

    /// Overwrite an existing binding, searching outwards
    fn assign(scope: &ScopeRef, name: &str, value: Value) -> bool {
        let mut current = Some(scope.clone());
        while let Some(s) = current {
            let mut s = s.borrow_mut();
            if let Some(slot) = s.vars.get_mut(name) {
                *slot = value;
                return true;
            }
            current = s.parent.clone();
        }
        false
    }

    fn lookup_fn(scope: &ScopeRef, name: &str) -> Option<Rc<ScriptFn>> {
        let mut current = Some(scope.clone());
        while let Some(s) = current {
            let s = s.borrow();
            if let Some(f) = s.fns.get(name) {
                return Some(f.clone());
            }
            current = s.parent.clone();
        }
        None
    }
}

/// Non-local control flow out of a block
#[derive(Debug)]
enum Flow {
    Normal,
    Return(Value),
    Break(Span),
    Continue(Span),
}

/// Where `print`/`println` outside a step go
#[derive(Debug)]
enum Output {
    Stdout,
    Captured(String),
}

#[derive(Debug)]
pub struct Interpreter {
    globals: ScopeRef,
    modules: HashMap<&'static str, Rc<Module>>,
    visible: HashMap<&'static str, NativeFn>,
    pub(crate) pipe: Recorder,
    pub(crate) layout: LayoutState,
    output: Output,
    depth: usize,
    max_depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Interpreter with `std` imported and `math`/`pipe` importable
    pub fn new() -> Self {
        let mut interpreter = Self {
            globals: Scope::root(),
            modules: HashMap::new(),
            visible: HashMap::new(),
            pipe: Recorder::default(),
            layout: LayoutState::default(),
            output: Output::Stdout,
            depth: 0,
            max_depth: MAX_CALL_DEPTH,
        };
        interpreter.register(modules::std::module());
        interpreter.register(modules::math::module());
        interpreter.register(modules::pipe::module());
        interpreter.import_module("std");
        interpreter
    }

    /// Interpreter for pipeline scripts: `pipe` needs no import
    pub fn for_pipelines() -> Self {
        let mut interpreter = Self::new();
        interpreter.import_module("pipe");
        interpreter
    }

    /// Interpreter for layout scripts, writing below `target_dir`
    pub fn for_layout(layout_dir: impl Into<PathBuf>, target_dir: impl Into<PathBuf>) -> Self {
        let mut interpreter = Self::new();
        interpreter.layout = LayoutState::new(layout_dir.into(), target_dir.into());
        interpreter.register(modules::layout::module());
        interpreter.import_module("layout");
        interpreter
    }

    pub fn register(&mut self, module: Module) {
        self.modules.insert(module.name(), Rc::new(module));
    }

    fn import_module(&mut self, name: &str) -> bool {
        let Some(module) = self.modules.get(name).cloned() else {
            return false;
        };
        for (fname, f) in module.functions() {
            self.visible.insert(fname, f);
        }
        debug!(module = name, "imported module");
        true
    }

    /// Capture `print` output instead of writing to stdout
    pub fn capture_output(mut self) -> Self {
        self.output = Output::Captured(String::new());
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Captured output so far, if capturing
    pub fn output(&self) -> Option<&str> {
        match &self.output {
            Output::Captured(s) => Some(s),
            Output::Stdout => None,
        }
    }

    pub fn write_out(&mut self, text: &str) {
        match &mut self.output {
            Output::Captured(buffer) => buffer.push_str(text),
            Output::Stdout => print!("{}", text),
        }
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        Scope::lookup(&self.globals, name)
    }

    pub fn into_recorder(self) -> Recorder {
        self.pipe
    }

    pub fn layout_state(&self) -> &LayoutState {
        &self.layout
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    /// Run a parsed program in the global scope
    pub fn run(&mut self, program: &[Stmt]) -> ScriptResult<()> {
        let globals = self.globals.clone();
        match self.exec_block(program, &globals)? {
            Flow::Normal | Flow::Return(_) => Ok(()),
            Flow::Break(span) => Err(ScriptError::new(
                ScriptErrorKind::LoopControlOutsideLoop("break".into()),
                span,
            )),
            Flow::Continue(span) => Err(ScriptError::new(
                ScriptErrorKind::LoopControlOutsideLoop("continue".into()),
                span,
            )),
        }
    }

    fn exec_block(&mut self, stmts: &[Stmt], scope: &ScopeRef) -> ScriptResult<Flow> {
        // Functions are visible to the whole block they are declared in
        for stmt in stmts {
            if let Stmt::Fn(decl) = stmt {
                let f = Rc::new(ScriptFn {
                    decl: decl.clone(),
                    scope: scope.clone(),
                });
                scope.borrow_mut().fns.insert(decl.name.clone(), f);
            }
        }

        for stmt in stmts {
            match self.exec(stmt, scope)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt, scope: &ScopeRef) -> ScriptResult<Flow> {
        match stmt {
            Stmt::Let { name, value, .. } => {
                let value = self.eval(value, scope)?;
                Scope::define(scope, name, value);
            }
            Stmt::Assign { name, value, span } => {
                let value = self.eval(value, scope)?;
                if !Scope::assign(scope, name, value) {
                    return Err(ScriptError::new(
                        ScriptErrorKind::UndefinedVariable(name.clone()),
                        *span,
                    ));
                }
            }
            Stmt::IndexAssign {
                target,
                index,
                value,
                ..
            } => {
                let array = self.eval(target, scope)?;
                let array = array
                    .as_array()
                    .map_err(|k| ScriptError::new(k, target.span))?;
                let i = self.eval_index(index, scope, array.borrow().len())?;
                let value = self.eval(value, scope)?;
                array.borrow_mut()[i] = value;
            }
            Stmt::Fn(_) => {}
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Value::Unit,
                };
                return Ok(Flow::Return(value));
            }
            Stmt::If {
                cond,
                then,
                otherwise,
                ..
            } => {
                if self.eval_condition(cond, scope)? {
                    return self.exec_block(then, &Scope::child(scope));
                } else if let Some(otherwise) = otherwise {
                    return self.exec_block(otherwise, &Scope::child(scope));
                }
            }
            Stmt::While { cond, body, .. } => {
                while self.eval_condition(cond, scope)? {
                    match self.exec_block(body, &Scope::child(scope))? {
                        Flow::Break(_) => break,
                        Flow::Normal | Flow::Continue(_) => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
            }
            Stmt::For {
                var, iter, body, ..
            } => {
                let items = match self.eval(iter, scope)? {
                    Value::Array(items) => items.borrow().clone(),
                    Value::Str(s) => s.chars().map(|c| Value::Str(c.to_string())).collect(),
                    other => {
                        return Err(ScriptError::new(
                            ScriptErrorKind::TypeMismatch {
                                expected: "Array or String".into(),
                                found: other.type_name().into(),
                            },
                            iter.span,
                        ))
                    }
                };
                for item in items {
                    let inner = Scope::child(scope);
                    Scope::define(&inner, var, item);
                    match self.exec_block(body, &inner)? {
                        Flow::Break(_) => break,
                        Flow::Normal | Flow::Continue(_) => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
            }
            Stmt::Break(span) => return Ok(Flow::Break(*span)),
            Stmt::Continue(span) => return Ok(Flow::Continue(*span)),
            Stmt::Import { module, span } => {
                if !self.import_module(module) {
                    return Err(ScriptError::new(
                        ScriptErrorKind::UnknownModule(module.clone()),
                        *span,
                    ));
                }
            }
            Stmt::Expr(expr) => {
                self.eval(expr, scope)?;
            }
        }
        Ok(Flow::Normal)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    fn eval(&mut self, expr: &Expr, scope: &ScopeRef) -> ScriptResult<Value> {
        let at = |kind| ScriptError::new(kind, expr.span);

        match &expr.kind {
            ExprKind::Int(i) => Ok(Value::Int(*i)),
            ExprKind::Float(f) => Ok(Value::Float(*f)),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::Interp(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        StrPart::Lit(s) => out.push_str(s),
                        StrPart::Var(name, span) => {
                            let value = Scope::lookup(scope, name).ok_or_else(|| {
                                ScriptError::new(
                                    ScriptErrorKind::UndefinedVariable(name.clone()),
                                    *span,
                                )
                            })?;
                            out.push_str(&value.to_string());
                        }
                    }
                }
                Ok(Value::Str(out))
            }
            ExprKind::Array(items) => {
                let values = items
                    .iter()
                    .map(|item| self.eval(item, scope))
                    .collect::<ScriptResult<Vec<_>>>()?;
                Ok(Value::array(values))
            }
            ExprKind::Var(name) => Scope::lookup(scope, name)
                .ok_or_else(|| at(ScriptErrorKind::UndefinedVariable(name.clone()))),
            ExprKind::Unary { op, expr: inner } => {
                let value = self.eval(inner, scope)?;
                match (op, value) {
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Neg, Value::Int(i)) => i
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or_else(|| at(ScriptErrorKind::Overflow("-".into()))),
                    (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
                    (op, other) => Err(at(ScriptErrorKind::TypeMismatch {
                        expected: match op {
                            UnaryOp::Not => "Bool".into(),
                            UnaryOp::Neg => "Number".into(),
                        },
                        found: other.type_name().into(),
                    })),
                }
            }
            ExprKind::Binary { op, left, right } => self.eval_binary(*op, left, right, scope, expr.span),
            ExprKind::Call { callee, args } => self.eval_call(callee, args, scope, expr.span),
            ExprKind::Index { target, index } => {
                let value = self.eval(target, scope)?;
                match value {
                    Value::Array(items) => {
                        let len = items.borrow().len();
                        let i = self.eval_index(index, scope, len)?;
                        let item = items.borrow()[i].clone();
                        Ok(item)
                    }
                    Value::Str(s) => {
                        let chars: Vec<char> = s.chars().collect();
                        let i = self.eval_index(index, scope, chars.len())?;
                        Ok(Value::Str(chars[i].to_string()))
                    }
                    other => Err(ScriptError::new(
                        ScriptErrorKind::TypeMismatch {
                            expected: "Array or String".into(),
                            found: other.type_name().into(),
                        },
                        target.span,
                    )),
                }
            }
            ExprKind::Closure(body) => Ok(Value::Closure(Rc::new(Closure {
                body: body.clone(),
                scope: scope.clone(),
                span: expr.span,
            }))),
        }
    }

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        scope: &ScopeRef,
        span: Span,
    ) -> ScriptResult<Value> {
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            let l = self.eval_bool(left, scope)?;
            if (op == BinaryOp::And && !l) || (op == BinaryOp::Or && l) {
                return Ok(Value::Bool(l));
            }
            return Ok(Value::Bool(self.eval_bool(right, scope)?));
        }

        let l = self.eval(left, scope)?;
        let r = self.eval(right, scope)?;
        Value::binary(op, &l, &r).map_err(|kind| ScriptError::new(kind, span))
    }

    fn eval_bool(&mut self, expr: &Expr, scope: &ScopeRef) -> ScriptResult<bool> {
        self.eval(expr, scope)?
            .as_bool()
            .map_err(|kind| ScriptError::new(kind, expr.span))
    }

    fn eval_condition(&mut self, cond: &Expr, scope: &ScopeRef) -> ScriptResult<bool> {
        match self.eval(cond, scope)? {
            Value::Bool(b) => Ok(b),
            other => Err(ScriptError::new(
                ScriptErrorKind::NonBoolCondition {
                    found: other.type_name().into(),
                },
                cond.span,
            )),
        }
    }

    fn eval_index(&mut self, index: &Expr, scope: &ScopeRef, len: usize) -> ScriptResult<usize> {
        let i = self
            .eval(index, scope)?
            .as_int()
            .map_err(|kind| ScriptError::new(kind, index.span))?;
        if i < 0 || i as usize >= len {
            return Err(ScriptError::new(
                ScriptErrorKind::IndexOutOfBounds { index: i, len },
                index.span,
            ));
        }
        Ok(i as usize)
    }

    fn eval_call(
        &mut self,
        callee: &Callee,
        args: &[Expr],
        scope: &ScopeRef,
        span: Span,
    ) -> ScriptResult<Value> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, scope)?);
        }
        let arg_spans = args.iter().map(|a| a.span).collect();

        let name_span = Span::new(span.offset, callee.to_string().len());
        let native = match callee {
            Callee::Name(name) => {
                if let Some(f) = Scope::lookup_fn(scope, name) {
                    return self.call_script_fn(&f, values, arg_spans, span);
                }
                self.visible.get(name.as_str()).copied()
            }
            Callee::Qualified { module, name } => {
                let module_ref = self.modules.get(module.as_str()).ok_or_else(|| {
                    ScriptError::new(
                        ScriptErrorKind::UnknownModule(module.clone()),
                        Span::new(span.offset, module.len()),
                    )
                })?;
                module_ref.get(name)
            }
        };

        let Some(f) = native else {
            return Err(ScriptError::new(
                ScriptErrorKind::UndefinedFunction(callee.to_string()),
                name_span,
            ));
        };

        let mut call = Call {
            name: callee.to_string(),
            span,
            args: values,
            arg_spans,
        };
        f(self, &mut call)
    }

    fn call_script_fn(
        &mut self,
        f: &ScriptFn,
        args: Vec<Value>,
        arg_spans: Vec<Span>,
        span: Span,
    ) -> ScriptResult<Value> {
        let decl = &f.decl;
        if args.len() != decl.params.len() {
            return Err(ScriptError::new(
                ScriptErrorKind::ArityMismatch {
                    function: decl.name.clone(),
                    expected: decl.params.len().to_string(),
                    found: args.len(),
                },
                span,
            ));
        }

        let frame = Scope::child(&f.scope);
        for (i, (param, value)) in decl.params.iter().zip(args).enumerate() {
            if let Some(ty) = &param.ty {
                if !value.matches_type(ty) {
                    return Err(ScriptError::new(
                        ScriptErrorKind::TypeMismatch {
                            expected: ty.clone(),
                            found: value.type_name().into(),
                        },
                        arg_spans.get(i).copied().unwrap_or(span),
                    ));
                }
            }
            Scope::define(&frame, &param.name, value);
        }

        self.enter(span)?;
        let result = self.exec_block(&decl.body, &frame);
        self.depth -= 1;
        Self::finish_call(result?)
    }

    /// Run a block value, binding `bindings` in a fresh scope first
    pub fn call_closure(
        &mut self,
        closure: &Closure,
        bindings: &[(&str, Value)],
    ) -> ScriptResult<Value> {
        let frame = Scope::child(&closure.scope);
        for (name, value) in bindings {
            Scope::define(&frame, name, value.clone());
        }

        self.enter(closure.span)?;
        let result = self.exec_block(&closure.body, &frame);
        self.depth -= 1;
        Self::finish_call(result?)
    }

    fn enter(&mut self, span: Span) -> ScriptResult<()> {
        if self.depth >= self.max_depth {
            return Err(ScriptError::new(
                ScriptErrorKind::RecursionLimit(self.max_depth),
                span,
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn finish_call(flow: Flow) -> ScriptResult<Value> {
        match flow {
            Flow::Normal => Ok(Value::Unit),
            Flow::Return(value) => Ok(value),
            Flow::Break(span) => Err(ScriptError::new(
                ScriptErrorKind::LoopControlOutsideLoop("break".into()),
                span,
            )),
            Flow::Continue(span) => Err(ScriptError::new(
                ScriptErrorKind::LoopControlOutsideLoop("continue".into()),
                span,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse;

    fn run(src: &str) -> ScriptResult<Interpreter> {
        let program = parse(src)?;
        let mut interpreter = Interpreter::new().capture_output();
        interpreter.run(&program)?;
        Ok(interpreter)
    }

    fn output(src: &str) -> String {
        run(src).unwrap().output().unwrap_or_default().to_string()
    }

    #[test]
    fn test_variables_and_arithmetic() {
        let i = run("let a = 2\nlet b = a * 3 + 1\na = b - a").unwrap();
        assert_eq!(i.global("a"), Some(Value::Int(5)));
        assert_eq!(i.global("b"), Some(Value::Int(7)));
    }

    #[test]
    fn test_functions_return_and_recursion() {
        let out = output(
            r#"
            fn fib(n: Int) {
                if n < 2 { return n }
                return fib(n - 1) + fib(n - 2)
            }
            println(fib(10))
            "#,
        );
        assert_eq!(out, "55\n");
    }

    #[test]
    fn test_functions_are_hoisted() {
        assert_eq!(output("println(twice(4))\nfn twice(x) { return x * 2 }"), "8\n");
    }

    #[test]
    fn test_loops_with_break_and_continue() {
        let out = output(
            r#"
            let total = 0
            for x in [1, 2, 3, 4, 5] {
                if x == 2 { continue }
                if x == 5 { break }
                total = total + x
            }
            let i = 0
            while i < 3 { i = i + 1 }
            println(total, " ", i)
            "#,
        );
        assert_eq!(out, "8 3\n");
    }

    #[test]
    fn test_block_scoping() {
        let err = run("if true { let inner = 1 }\nprintln(inner)").unwrap_err();
        assert_eq!(err.kind, ScriptErrorKind::UndefinedVariable("inner".into()));
    }

    #[test]
    fn test_short_circuit() {
        // The right side would fail with an undefined variable
        let i = run("let ok = false && missing\nlet yes = true || missing").unwrap();
        assert_eq!(i.global("ok"), Some(Value::Bool(false)));
        assert_eq!(i.global("yes"), Some(Value::Bool(true)));
    }

    #[test]
    fn test_interpolation_reads_scope() {
        assert_eq!(output("let who = \"dev\"\nprintln(\"hi ${who}\")"), "hi dev\n");
        let err = run("println(\"${nobody}\")").unwrap_err();
        assert_eq!(err.kind, ScriptErrorKind::UndefinedVariable("nobody".into()));
        assert_eq!(err.span, Span::new(11, 6));
    }

    #[test]
    fn test_arrays_index_and_assign() {
        let i = run("let xs = [1, 2]\nlet ys = xs\nys[0] = 9\nlet first = xs[0]").unwrap();
        assert_eq!(i.global("first"), Some(Value::Int(9)));

        let err = run("let xs = [1]\nxs[3]").unwrap_err();
        assert_eq!(err.kind, ScriptErrorKind::IndexOutOfBounds { index: 3, len: 1 });
    }

    #[test]
    fn test_conditions_must_be_bool() {
        let err = run("if 1 { }").unwrap_err();
        assert_eq!(
            err.kind,
            ScriptErrorKind::NonBoolCondition {
                found: "Int".into()
            }
        );
    }

    #[test]
    fn test_closures_capture_scope() {
        let out = output(
            r#"
            let greeting = "hello"
            fn run_block(block) { call(block) }
            run_block() { println(greeting) }
            "#,
        );
        assert_eq!(out, "hello\n");
    }

    #[test]
    fn test_undefined_function_span_is_name() {
        let err = run("  deploy(1)").unwrap_err();
        assert_eq!(err.kind, ScriptErrorKind::UndefinedFunction("deploy".into()));
        assert_eq!(err.span, Span::new(2, 6));
    }

    #[test]
    fn test_typed_parameters() {
        let err = run("fn f(a: Int) { }\nf(\"x\")").unwrap_err();
        assert_eq!(
            err.kind,
            ScriptErrorKind::TypeMismatch {
                expected: "Int".into(),
                found: "String".into()
            }
        );
        assert_eq!(err.span, Span::new(19, 3));
    }

    #[test]
    fn test_arity_mismatch() {
        let err = run("fn f(a) { }\nf()").unwrap_err();
        assert!(matches!(err.kind, ScriptErrorKind::ArityMismatch { found: 0, .. }));
    }

    #[test]
    fn test_import_and_qualified_calls() {
        assert_eq!(output("println(math.max(1, 7, 3))"), "7\n");
        assert_eq!(output("import math\nprintln(min(4, 2))"), "2\n");

        let err = run("max(1, 2)").unwrap_err();
        assert_eq!(err.kind, ScriptErrorKind::UndefinedFunction("max".into()));

        let err = run("import nope").unwrap_err();
        assert_eq!(err.kind, ScriptErrorKind::UnknownModule("nope".into()));
    }

    #[test]
    fn test_recursion_limit() {
        let program = parse("fn forever(n) { return forever(n + 1) }\nforever(0)").unwrap();
        let mut interpreter = Interpreter::new().with_max_depth(16);
        let err = interpreter.run(&program).unwrap_err();
        assert_eq!(err.kind, ScriptErrorKind::RecursionLimit(16));
    }

    #[test]
    fn test_break_outside_loop() {
        let err = run("fn f() { break }\nf()").unwrap_err();
        assert_eq!(
            err.kind,
            ScriptErrorKind::LoopControlOutsideLoop("break".into())
        );
    }
}
