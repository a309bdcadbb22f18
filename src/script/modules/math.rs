// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! The `math` module

use crate::script::error::{ScriptErrorKind, ScriptResult};
use crate::script::interpreter::Interpreter;
use crate::script::value::Value;

use super::{Call, Module};

pub fn module() -> Module {
    Module::new("math")
        .register("max", max)
        .register("min", min)
        .register("abs", abs)
        .register("pow", pow)
        .register("floor", floor)
        .register("ceil", ceil)
}

/// Pick the extreme of all arguments; stays an Int when every argument is one
fn extreme(call: &Call, pick_greater: bool) -> ScriptResult<Value> {
    call.arity_range(1, usize::MAX)?;
    let mut best = call.arg(0)?.clone();
    call.float(0)?;
    for i in 1..call.args.len() {
        let candidate = call.float(i)?;
        let current = best.as_float().map_err(|k| call.error(k))?;
        if (pick_greater && candidate > current) || (!pick_greater && candidate < current) {
            best = call.args[i].clone();
        }
    }
    Ok(best)
}

fn max(_: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    extreme(call, true)
}

fn min(_: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    extreme(call, false)
}

fn abs(_: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    call.arity(1)?;
    match call.arg(0)? {
        Value::Int(i) => i
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| call.error(ScriptErrorKind::Overflow("abs".into()))),
        _ => Ok(Value::Float(call.float(0)?.abs())),
    }
}

fn pow(_: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    call.arity(2)?;
    match (call.arg(0)?, call.arg(1)?) {
        (Value::Int(base), Value::Int(exp)) if *exp >= 0 => {
            let exp = u32::try_from(*exp).map_err(|_| call.error(ScriptErrorKind::Overflow("pow".into())))?;
            base.checked_pow(exp)
                .map(Value::Int)
                .ok_or_else(|| call.error(ScriptErrorKind::Overflow("pow".into())))
        }
        _ => Ok(Value::Float(call.float(0)?.powf(call.float(1)?))),
    }
}

fn floor(_: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    call.arity(1)?;
    Ok(Value::Int(call.float(0)?.floor() as i64))
}

fn ceil(_: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    call.arity(1)?;
    Ok(Value::Int(call.float(0)?.ceil() as i64))
}
