// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! The `pipe` module: declares pipelines, steps and their actions
//!
//! Calls are recorded, not executed. `pipeline` and `step` run their block
//! immediately so the actions inside land in the right place.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::pipeline::{Action, Pipeline, PipelineSet, Step, StepKind};
use crate::script::error::{ScriptErrorKind, ScriptResult};
use crate::script::interpreter::Interpreter;
use crate::script::value::Value;

use super::{Call, Module};

pub fn module() -> Module {
    Module::new("pipe")
        .register("pipeline", pipeline)
        .register("step", step)
        .register("parallel", parallel)
        .register("workspace", workspace)
        .register("cmd", cmd)
        .register("move", move_path)
        .register("copy", copy)
        .register("replace", replace)
        .register("echo", echo)
}

/// Pipelines recorded while a script runs
#[derive(Debug, Default)]
pub struct Recorder {
    env: BTreeMap<String, String>,
    pipelines: Vec<Pipeline>,
    current_pipeline: Option<Pipeline>,
    current_step: Option<Step>,
}

impl Recorder {
    pub fn current_step_mut(&mut self) -> Option<&mut Step> {
        self.current_step.as_mut()
    }

    /// Set an env var on the innermost open step, pipeline or the whole set
    pub fn set_env(&mut self, key: String, value: String) {
        let env = if let Some(step) = self.current_step.as_mut() {
            &mut step.env
        } else if let Some(pipeline) = self.current_pipeline.as_mut() {
            &mut pipeline.env
        } else {
            &mut self.env
        };
        env.insert(key, value);
    }

    pub fn finish(self) -> PipelineSet {
        PipelineSet {
            pipelines: self.pipelines,
            env: self.env,
            source: None,
        }
    }
}

fn pipeline(interp: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    call.arity(2)?;
    let name = call.str(0)?;
    let block = call.block(1)?;

    if interp.pipe.current_pipeline.is_some() {
        return Err(call.invalid("pipelines cannot be nested"));
    }

    let mut pipeline = Pipeline::new(name);
    pipeline.span = call.span;
    interp.pipe.current_pipeline = Some(pipeline);

    interp.call_closure(&block, &[])?;

    if let Some(pipeline) = interp.pipe.current_pipeline.take() {
        interp.pipe.pipelines.push(pipeline);
    }
    Ok(Value::Unit)
}

fn open_step(interp: &mut Interpreter, call: &Call, kind: StepKind) -> ScriptResult<Value> {
    call.arity(2)?;
    let name = call.str(0)?;
    let block = call.block(1)?;

    if interp.pipe.current_pipeline.is_none() {
        return Err(call.error(ScriptErrorKind::OutsideContext {
            function: call.name.clone(),
            context: "pipeline".into(),
        }));
    }
    if interp.pipe.current_step.is_some() {
        return Err(call.invalid("steps cannot be nested"));
    }

    let mut step = Step::new(name, kind);
    step.span = call.span;
    interp.pipe.current_step = Some(step);

    interp.call_closure(&block, &[])?;

    if let (Some(step), Some(pipeline)) = (
        interp.pipe.current_step.take(),
        interp.pipe.current_pipeline.as_mut(),
    ) {
        pipeline.steps.push(step);
    }
    Ok(Value::Unit)
}

fn step(interp: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    open_step(interp, call, StepKind::Sequential)
}

fn parallel(interp: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    open_step(interp, call, StepKind::Parallel)
}

fn in_step<'a>(interp: &'a mut Interpreter, call: &Call) -> ScriptResult<&'a mut Step> {
    interp.pipe.current_step.as_mut().ok_or_else(|| {
        call.error(ScriptErrorKind::OutsideContext {
            function: call.name.clone(),
            context: "step".into(),
        })
    })
}

/// Before any action this sets the step workspace; afterwards it switches
/// directory for the actions that follow
fn workspace(interp: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    call.arity(1)?;
    let path = PathBuf::from(call.str(0)?);
    let step = in_step(interp, call)?;
    if step.actions.is_empty() {
        step.workspace = path;
    } else {
        step.actions.push(Action::Workspace { path });
    }
    Ok(Value::Unit)
}

fn cmd(interp: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    call.arity(1)?;
    let command = call.str(0)?;
    in_step(interp, call)?.actions.push(Action::Cmd { command });
    Ok(Value::Unit)
}

fn move_path(interp: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    call.arity(2)?;
    let from = PathBuf::from(call.str(0)?);
    let to = PathBuf::from(call.str(1)?);
    in_step(interp, call)?.actions.push(Action::Move { from, to });
    Ok(Value::Unit)
}

fn copy(interp: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    call.arity(2)?;
    let from = call.str(0)?;
    let to = PathBuf::from(call.str(1)?);
    in_step(interp, call)?.actions.push(Action::Copy { from, to });
    Ok(Value::Unit)
}

fn replace(interp: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    call.arity(3)?;
    let path = PathBuf::from(call.str(0)?);
    let pattern = call.str(1)?;
    let replacement = call.str(2)?;
    in_step(interp, call)?.actions.push(Action::Replace {
        path,
        pattern,
        replacement,
    });
    Ok(Value::Unit)
}

fn echo(interp: &mut Interpreter, call: &mut Call) -> ScriptResult<Value> {
    let message: String = call.args.iter().map(Value::to_string).collect();
    in_step(interp, call)?.actions.push(Action::Echo { message });
    Ok(Value::Unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse;

    fn record(src: &str) -> ScriptResult<PipelineSet> {
        let mut interpreter = Interpreter::for_pipelines().capture_output();
        interpreter.run(&parse(src)?)?;
        Ok(interpreter.into_recorder().finish())
    }

    #[test]
    fn test_records_actions_in_order() {
        let set = record(
            r#"
            pipeline("build") {
                step("prepare") {
                    workspace("app")
                    cmd("make deps")
                    copy("dist/*.js", "public")
                    workspace("public")
                    move("a.txt", "b.txt")
                    replace("index.html", "v[0-9]+", "v2")
                    println("done")
                }
            }
            "#,
        )
        .unwrap();

        let step = &set.pipelines[0].steps[0];
        assert_eq!(step.workspace, PathBuf::from("app"));
        let kinds: Vec<&str> = step.actions.iter().map(Action::kind_name).collect();
        assert_eq!(
            kinds,
            vec!["cmd", "copy", "workspace", "move", "replace", "echo"]
        );
        assert_eq!(
            step.actions[5],
            Action::Echo {
                message: "done".into()
            }
        );
    }

    #[test]
    fn test_env_scoping() {
        let set = record(
            r#"
            env("GLOBAL", "1")
            pipeline("p") {
                env("PIPE", "2")
                step("s") { env("STEP", 3) }
            }
            "#,
        )
        .unwrap();
        assert_eq!(set.env.get("GLOBAL").map(String::as_str), Some("1"));
        assert_eq!(set.pipelines[0].env.get("PIPE").map(String::as_str), Some("2"));
        assert_eq!(
            set.pipelines[0].steps[0].env.get("STEP").map(String::as_str),
            Some("3")
        );
    }

    #[test]
    fn test_steps_can_be_generated() {
        let set = record(
            r#"
            let targets = ["linux", "windows"]
            pipeline("release") {
                for t in targets {
                    parallel("build-${t}") { cmd("cargo build --target ${t}") }
                }
            }
            "#,
        )
        .unwrap();
        let steps = &set.pipelines[0].steps;
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].name, "build-windows");
        assert!(steps[1].is_parallel());
        assert_eq!(steps[1].actions[0], Action::cmd("cargo build --target windows"));
    }

    #[test]
    fn test_cmd_outside_step() {
        let err = record("pipeline(\"p\") { cmd(\"ls\") }").unwrap_err();
        assert_eq!(
            err.kind,
            ScriptErrorKind::OutsideContext {
                function: "cmd".into(),
                context: "step".into()
            }
        );
    }

    #[test]
    fn test_step_outside_pipeline() {
        let err = record("step(\"s\") { }").unwrap_err();
        assert!(matches!(err.kind, ScriptErrorKind::OutsideContext { .. }));
    }

    #[test]
    fn test_nesting_is_rejected() {
        let err = record("pipeline(\"a\") { pipeline(\"b\") { } }").unwrap_err();
        assert!(matches!(err.kind, ScriptErrorKind::InvalidArgument { .. }));

        let err = record("pipeline(\"a\") { step(\"s\") { step(\"t\") { } } }").unwrap_err();
        assert!(matches!(err.kind, ScriptErrorKind::InvalidArgument { .. }));
    }

    #[test]
    fn test_missing_block() {
        let err = record("pipeline(\"a\")").unwrap_err();
        assert!(matches!(err.kind, ScriptErrorKind::ArityMismatch { .. }));
    }

    #[test]
    fn test_pipe_needs_import_in_plain_interpreter() {
        let mut interpreter = Interpreter::new();
        let err = interpreter
            .run(&parse("pipeline(\"a\") { }").unwrap())
            .unwrap_err();
        assert_eq!(
            err.kind,
            ScriptErrorKind::UndefinedFunction("pipeline".into())
        );

        let mut interpreter = Interpreter::new();
        interpreter
            .run(&parse("import pipe\npipeline(\"a\") { }").unwrap())
            .unwrap();
        assert_eq!(interpreter.into_recorder().finish().pipelines.len(), 1);
    }
}
