// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! The `std` module, imported into every script

use crate::pipeline::Action;
use crate::script::error::{ScriptErrorKind, ScriptResult};
use crate::script::interpreter::Interpreter;
use crate::script::value::Value;

use super::{Call, Module};

pub fn module() -> Module {
    Module::new("std")
        .register("print", print)
        .register("println", println)
        .register("len", len)
        .register("type", type_of)
        .register("str", to_str)
        .register("int", to_int)
        .register("float", to_float)
        .register("clone", clone)
        .register("append", append)
        .register("remove", remove)
        .register("contains", contains)
        .register("join", join)
        .register("split", split)
        .register("call", call)
        .register("env", env)
}

fn concat(call: &Call) -> String {
    call.args.iter().map(Value::to_string).collect()
}

/// Inside a step, output becomes an `echo` action so it shows up at run time
fn emit(interp: &mut Interpreter, text: String) -> ScriptResult<Value> {
    if let Some(step) = interp.pipe.current_step_mut() {
        let text = text.strip_suffix('\n').map(str::to_string).unwrap_or(text);
        step.actions.push(Action::Echo { message: text });
    } else {
        interp.write_out(&text);
    }
    Ok(Value::Unit)
}

fn print(interp: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    emit(interp, concat(call))
}

fn println(interp: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    let mut text = concat(call);
    text.push('\n');
    emit(interp, text)
}

fn len(_: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    call.arity(1)?;
    let n = match call.arg(0)? {
        Value::Str(s) => s.chars().count(),
        Value::Array(items) => items.borrow().len(),
        other => {
            return Err(call.error(ScriptErrorKind::TypeMismatch {
                expected: "String or Array".into(),
                found: other.type_name().into(),
            }))
        }
    };
    Ok(Value::Int(n as i64))
}

fn type_of(_: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    call.arity(1)?;
    Ok(Value::from(call.arg(0)?.type_name()))
}

fn to_str(_: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    call.arity(1)?;
    Ok(Value::Str(call.arg(0)?.to_string()))
}

fn to_int(_: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    call.arity(1)?;
    match call.arg(0)? {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Float(f) => Ok(Value::Int(f.trunc() as i64)),
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        Value::Str(s) => s
            .trim()
            .parse()
            .map(Value::Int)
            .map_err(|_| call.invalid(format!("'{}' is not an integer", s))),
        other => Err(call.error(ScriptErrorKind::TypeMismatch {
            expected: "Number, Bool or String".into(),
            found: other.type_name().into(),
        })),
    }
}

fn to_float(_: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    call.arity(1)?;
    match call.arg(0)? {
        Value::Str(s) => s
            .trim()
            .parse()
            .map(Value::Float)
            .map_err(|_| call.invalid(format!("'{}' is not a number", s))),
        _ => Ok(Value::Float(call.float(0)?)),
    }
}

fn clone(_: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    call.arity(1)?;
    Ok(call.arg(0)?.deep_clone())
}

fn append(_: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    call.arity_range(2, usize::MAX)?;
    let items = call
        .arg(0)?
        .as_array()
        .map_err(|k| call.error(k))?
        .clone();
    items.borrow_mut().extend(call.args[1..].iter().cloned());
    Ok(Value::Unit)
}

fn remove(_: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    call.arity(2)?;
    let items = call.arg(0)?.as_array().map_err(|k| call.error(k))?.clone();
    let index = call.int(1)?;
    let len = items.borrow().len();
    if index < 0 || index as usize >= len {
        return Err(call.error(ScriptErrorKind::IndexOutOfBounds { index, len }));
    }
    let removed = items.borrow_mut().remove(index as usize);
    Ok(removed)
}

fn contains(_: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    call.arity(2)?;
    let needle = call.arg(1)?;
    let found = match call.arg(0)? {
        Value::Array(items) => items.borrow().iter().any(|item| item == needle),
        Value::Str(s) => s.contains(needle.to_string().as_str()),
        other => {
            return Err(call.error(ScriptErrorKind::TypeMismatch {
                expected: "String or Array".into(),
                found: other.type_name().into(),
            }))
        }
    };
    Ok(Value::Bool(found))
}

fn join(_: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    call.arity_range(1, 2)?;
    let items = call.arg(0)?.as_array().map_err(|k| call.error(k))?;
    let separator = if call.args.len() > 1 {
        call.str(1)?
    } else {
        String::new()
    };
    let parts: Vec<String> = items.borrow().iter().map(Value::to_string).collect();
    Ok(Value::Str(parts.join(&separator)))
}

fn split(_: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    call.arity(2)?;
    let text = call.str(0)?;
    let separator = call.str(1)?;
    if separator.is_empty() {
        return Err(call.invalid("separator must not be empty"));
    }
    Ok(Value::array(
        text.split(separator.as_str()).map(Value::from).collect(),
    ))
}

/// `call(block, args...)`: one extra argument is bound as `it`, several as an array
fn call(interp: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    call.arity_range(1, usize::MAX)?;
    let closure = call.closure(0)?;
    let bindings = match call.args.len() {
        1 => vec![],
        2 => vec![("it", call.args[1].clone())],
        _ => vec![("it", Value::array(call.args[1..].to_vec()))],
    };
    interp.call_closure(&closure, &bindings)
}

/// `env(key, value)` applies to the innermost step, pipeline or whole script
fn env(interp: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    call.arity(2)?;
    let key = call.str(0)?;
    let value = call.arg(1)?.to_string();
    if key.is_empty() || key.contains('=') {
        return Err(call.invalid(format!("'{}' is not a valid variable name", key)));
    }
    interp.pipe.set_env(key, value);
    Ok(Value::Unit)
}

#[cfg(test)]
mod tests {
    use crate::script::{parse, Interpreter, ScriptErrorKind, Value};

    fn eval(src: &str) -> Interpreter {
        let mut interpreter = Interpreter::new().capture_output();
        interpreter.run(&parse(src).unwrap()).unwrap();
        interpreter
    }

    fn eval_err(src: &str) -> ScriptErrorKind {
        let mut interpreter = Interpreter::new().capture_output();
        interpreter.run(&parse(src).unwrap()).unwrap_err().kind
    }

    #[test]
    fn test_print_concatenates_arguments() {
        let i = eval("print(\"a\", 1, true)\nprintln()\nprintln([1, \"b\"])");
        assert_eq!(i.output(), Some("a1true\n[1, \"b\"]\n"));
    }

    #[test]
    fn test_array_helpers() {
        let i = eval(
            r#"
            let xs = [1]
            append(xs, 2, 3)
            let gone = remove(xs, 0)
            let n = len(xs)
            let has = contains(xs, 3)
            let joined = join(xs, "-")
            let parts = split("a,b", ",")
            "#,
        );
        assert_eq!(i.global("gone"), Some(Value::Int(1)));
        assert_eq!(i.global("n"), Some(Value::Int(2)));
        assert_eq!(i.global("has"), Some(Value::Bool(true)));
        assert_eq!(i.global("joined"), Some(Value::from("2-3")));
        assert_eq!(i.global("parts").unwrap().to_string(), "[\"a\", \"b\"]");
    }

    #[test]
    fn test_array_appended_to_itself() {
        let i = eval(
            r#"
            let a = [1]
            append(a, a)
            let s = str(a)
            let j = join(a, ",")
            let same = a == clone(a)
            "#,
        );
        assert_eq!(i.global("s"), Some(Value::from("[1, [...]]")));
        assert_eq!(i.global("j"), Some(Value::from("1,[1, [...]]")));
        assert_eq!(i.global("same"), Some(Value::Bool(true)));
    }

    #[test]
    fn test_conversions() {
        let i = eval("let a = int(\"42\")\nlet b = float(2)\nlet c = str(1.5)\nlet t = type([])");
        assert_eq!(i.global("a"), Some(Value::Int(42)));
        assert_eq!(i.global("b"), Some(Value::Float(2.0)));
        assert_eq!(i.global("c"), Some(Value::from("1.5")));
        assert_eq!(i.global("t"), Some(Value::from("Array")));

        assert!(matches!(
            eval_err("int(\"x\")"),
            ScriptErrorKind::InvalidArgument { .. }
        ));
    }

    #[test]
    fn test_clone_breaks_aliasing() {
        let i = eval("let a = [1]\nlet b = clone(a)\nappend(b, 2)\nlet n = len(a)");
        assert_eq!(i.global("n"), Some(Value::Int(1)));
    }

    #[test]
    fn test_call_binds_it() {
        let i = eval(
            r#"
            fn each(items, block) { for x in items { call(block, x) } }
            let seen = []
            each([1, 2]) { append(seen, it * 10) }
            "#,
        );
        assert_eq!(i.global("seen").unwrap().to_string(), "[10, 20]");
    }

    #[test]
    fn test_remove_out_of_bounds() {
        assert_eq!(
            eval_err("remove([], 0)"),
            ScriptErrorKind::IndexOutOfBounds { index: 0, len: 0 }
        );
    }

    #[test]
    fn test_len_arity() {
        assert!(matches!(
            eval_err("len()"),
            ScriptErrorKind::ArityMismatch { found: 0, .. }
        ));
    }
}
