// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Pipeline executor
//!
//! Runs selected pipelines one after another. Inside a pipeline, sequential
//! steps are awaited in order while parallel steps are spawned on a
//! `JoinSet` and joined when the pipeline ends.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::task::{Id, JoinSet};
use tracing::{debug, info, warn};

use crate::errors::{PipeflowError, PipeflowResult};
use crate::executors::{ActionContext, CommandRunner, FileOps};
use crate::pipeline::events::{null_sink, ExecutionEvent, SharedSink, StepOutcome, Stream};
use crate::pipeline::selector::Selection;
use crate::pipeline::{Action, Pipeline, PipelineSet, Step, StepKind};

/// Pipeline execution options
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// Only report what would run
    pub dry_run: bool,
    /// Abort running parallel steps once a step failed
    pub fail_fast: bool,
    /// Run later pipelines even if one failed
    pub keep_going: bool,
}

/// Final state of a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StepStatus {
    Succeeded,
    Failed { error: String },
    /// Not started because an earlier step failed, or a dry run
    Skipped,
    /// Cancelled while running
    Aborted,
}

impl StepStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, StepStatus::Succeeded)
    }
}

/// Result of one step
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub name: String,
    pub kind: StepKind,
    #[serde(flatten)]
    pub status: StepStatus,
    pub duration: Duration,
}

impl StepReport {
    fn new(step: &Step, status: StepStatus, duration: Duration) -> Self {
        Self {
            name: step.name.clone(),
            kind: step.kind,
            status,
            duration,
        }
    }
}

/// Result of executing a pipeline
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub name: String,
    /// Reports of the selected steps, in declaration order
    pub steps: Vec<StepReport>,
    pub success: bool,
    pub duration: Duration,
}

impl PipelineReport {
    pub fn step(&self, name: &str) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.name == name)
    }
}

/// Result of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub pipelines: Vec<PipelineReport>,
    pub success: bool,
    pub duration: Duration,
}

impl RunReport {
    pub fn pipeline(&self, name: &str) -> Option<&PipelineReport> {
        self.pipelines.iter().find(|p| p.name == name)
    }

    /// Names of failed steps as `pipeline.step`
    pub fn failures(&self) -> Vec<String> {
        self.pipelines
            .iter()
            .flat_map(|p| {
                p.steps
                    .iter()
                    .filter(|s| matches!(s.status, StepStatus::Failed { .. }))
                    .map(move |s| format!("{}.{}", p.name, s.name))
            })
            .collect()
    }
}

/// Everything a step needs to run on its own task
struct StepJob {
    pipeline: String,
    step: Step,
    base_dir: PathBuf,
    env: BTreeMap<String, String>,
    runner: Arc<dyn CommandRunner>,
    sink: SharedSink,
}

/// Pipeline executor
pub struct PipelineExecutor {
    runner: Arc<dyn CommandRunner>,
    sink: SharedSink,
}

impl PipelineExecutor {
    /// Create a new pipeline executor
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            sink: null_sink(),
        }
    }

    /// Send execution events to `sink`
    pub fn with_sink(mut self, sink: SharedSink) -> Self {
        self.sink = sink;
        self
    }

    /// Execute the selected pipelines of a set
    pub async fn execute(
        &self,
        set: &PipelineSet,
        selections: &[Selection<'_>],
        options: &ExecutionOptions,
    ) -> PipeflowResult<RunReport> {
        let start = Instant::now();
        let base_dir = set.base_dir();
        let mut pipelines = Vec::new();
        let mut success = true;

        for (i, selection) in selections.iter().enumerate() {
            let report = self
                .execute_pipeline(set, selection, &base_dir, options)
                .await?;
            let failed = !report.success;
            pipelines.push(report);

            if failed {
                success = false;
                let remaining = selections.len() - i - 1;
                if !options.keep_going && remaining > 0 {
                    warn!(
                        pipeline = %selection.pipeline.name,
                        remaining,
                        "pipeline failed, not running the remaining pipelines"
                    );
                    break;
                }
            }
        }

        Ok(RunReport {
            pipelines,
            success,
            duration: start.elapsed(),
        })
    }

    async fn execute_pipeline(
        &self,
        set: &PipelineSet,
        selection: &Selection<'_>,
        base_dir: &Path,
        options: &ExecutionOptions,
    ) -> PipeflowResult<PipelineReport> {
        let start = Instant::now();
        let pipeline: &Pipeline = selection.pipeline;
        let selected: Vec<&Step> = pipeline
            .steps
            .iter()
            .filter(|s| selection.includes(&s.name))
            .collect();

        info!(pipeline = %pipeline.name, steps = selected.len(), "running pipeline");
        self.sink.emit(ExecutionEvent::PipelineStarted {
            pipeline: pipeline.name.clone(),
            steps: selected.len(),
        });

        // Parallel steps start as Aborted and are overwritten when they report
        let mut reports: Vec<Option<StepReport>> = vec![None; selected.len()];
        let mut running: JoinSet<(usize, StepReport)> = JoinSet::new();
        let mut tasks: HashMap<Id, usize> = HashMap::new();
        let mut failed = false;

        for (i, step) in selected.iter().enumerate() {
            if failed || options.dry_run {
                debug!(step = %step.name, "skipping step");
                reports[i] = Some(StepReport::new(step, StepStatus::Skipped, Duration::ZERO));
                continue;
            }

            let mut env = set.env.clone();
            env.extend(pipeline.env.clone());
            env.extend(step.env.clone());

            let job = StepJob {
                pipeline: pipeline.name.clone(),
                step: (*step).clone(),
                base_dir: base_dir.to_path_buf(),
                env,
                runner: self.runner.clone(),
                sink: self.sink.clone(),
            };

            match step.kind {
                StepKind::Sequential => {
                    let report = run_step(job).await;
                    failed = !report.status.is_success();
                    reports[i] = Some(report);
                }
                StepKind::Parallel => {
                    reports[i] = Some(StepReport::new(step, StepStatus::Aborted, Duration::ZERO));
                    let handle = running.spawn(async move { (i, run_step(job).await) });
                    tasks.insert(handle.id(), i);
                }
            }
        }

        if failed && options.fail_fast && !running.is_empty() {
            warn!(pipeline = %pipeline.name, "aborting running parallel steps");
            running.abort_all();
        }

        // Join barrier
        while let Some(joined) = running.join_next().await {
            match joined {
                Ok((i, report)) => {
                    failed |= !report.status.is_success();
                    reports[i] = Some(report);
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    failed = true;
                    warn!(pipeline = %pipeline.name, error = %e, "parallel step panicked");
                    let Some(report) = tasks.get(&e.id()).and_then(|&i| reports[i].as_mut())
                    else {
                        continue;
                    };
                    report.status = StepStatus::Failed {
                        error: e.to_string(),
                    };
                    self.sink.emit(ExecutionEvent::StepFinished {
                        pipeline: pipeline.name.clone(),
                        step: report.name.clone(),
                        status: StepOutcome::Failed(e.to_string()),
                        duration: report.duration,
                    });
                }
            }
        }

        let steps: Vec<StepReport> = reports.into_iter().flatten().collect();
        for report in steps.iter().filter(|r| r.status == StepStatus::Aborted) {
            self.sink.emit(ExecutionEvent::StepFinished {
                pipeline: pipeline.name.clone(),
                step: report.name.clone(),
                status: StepOutcome::Aborted,
                duration: report.duration,
            });
        }

        let success = !failed && steps.iter().all(|s| s.status != StepStatus::Aborted);
        let duration = start.elapsed();
        info!(
            pipeline = %pipeline.name,
            success,
            duration_ms = duration.as_millis() as u64,
            "pipeline finished"
        );
        self.sink.emit(ExecutionEvent::PipelineFinished {
            pipeline: pipeline.name.clone(),
            success,
            duration,
        });

        Ok(PipelineReport {
            name: pipeline.name.clone(),
            steps,
            success,
            duration,
        })
    }
}

async fn blocking<T, F>(f: F) -> PipeflowResult<T>
where
    F: FnOnce() -> PipeflowResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PipeflowError::ExecutionFailed {
            message: e.to_string(),
            help: None,
        })?
}

fn existing_dir(path: PathBuf) -> PipeflowResult<PathBuf> {
    if path.is_dir() {
        Ok(path)
    } else {
        Err(PipeflowError::WorkspaceNotFound { path })
    }
}

/// Run the actions of one step in order, stopping at the first failure
async fn run_step(job: StepJob) -> StepReport {
    let StepJob {
        pipeline,
        step,
        base_dir,
        env,
        runner,
        sink,
    } = job;

    debug!(pipeline = %pipeline, step = %step.name, kind = %step.kind, "starting step");
    sink.emit(ExecutionEvent::StepStarted {
        pipeline: pipeline.clone(),
        step: step.name.clone(),
        kind: step.kind,
    });

    let start = Instant::now();
    let result = async {
        let mut ctx = ActionContext {
            pipeline: pipeline.clone(),
            step: step.name.clone(),
            workspace: existing_dir(base_dir.join(&step.workspace))?,
            env,
            sink: sink.clone(),
        };

        for action in &step.actions {
            sink.emit(ExecutionEvent::ActionStarted {
                pipeline: pipeline.clone(),
                step: step.name.clone(),
                action: action.to_string(),
            });
            run_action(action, &mut ctx, &base_dir, runner.as_ref()).await?;
        }
        Ok::<_, PipeflowError>(())
    }
    .await;

    let duration = start.elapsed();
    let (status, outcome) = match result {
        Ok(()) => (StepStatus::Succeeded, StepOutcome::Succeeded),
        Err(e) => {
            warn!(pipeline = %pipeline, step = %step.name, error = %e, "step failed");
            (
                StepStatus::Failed {
                    error: e.to_string(),
                },
                StepOutcome::Failed(e.to_string()),
            )
        }
    };

    sink.emit(ExecutionEvent::StepFinished {
        pipeline,
        step: step.name.clone(),
        status: outcome,
        duration,
    });
    StepReport::new(&step, status, duration)
}

async fn run_action(
    action: &Action,
    ctx: &mut ActionContext,
    base_dir: &Path,
    runner: &dyn CommandRunner,
) -> PipeflowResult<()> {
    let workspace = ctx.workspace.clone();
    match action {
        Action::Cmd { command } => {
            let output = runner.run(command, ctx).await?;
            if !output.success {
                return Err(PipeflowError::CommandFailed {
                    command: command.clone(),
                    code: output.exit_code,
                });
            }
        }
        Action::Move { from, to } => {
            let (from, to) = (from.clone(), to.clone());
            blocking(move || FileOps::move_path(&workspace, &from, &to)).await?;
        }
        Action::Copy { from, to } => {
            let (from, to) = (from.clone(), to.clone());
            let copied = blocking(move || FileOps::copy(&workspace, &from, &to)).await?;
            debug!(step = %ctx.step, files = copied.len(), "copied");
        }
        Action::Replace {
            path,
            pattern,
            replacement,
        } => {
            let (path, pattern, replacement) = (path.clone(), pattern.clone(), replacement.clone());
            let count =
                blocking(move || FileOps::replace(&workspace, &path, &pattern, &replacement))
                    .await?;
            debug!(step = %ctx.step, count, "replaced");
        }
        Action::Echo { message } => {
            for line in message.split('\n') {
                ctx.line(Stream::Stdout, line);
            }
        }
        Action::Workspace { path } => {
            ctx.workspace = existing_dir(base_dir.join(path))?;
        }
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::executors::{CommandOutput, ShellExecutor};
    use crate::pipeline::{EventLog, Target};
    use tempfile::TempDir;

    struct Harness {
        dir: TempDir,
        log: Arc<EventLog>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                dir: TempDir::new().unwrap(),
                log: EventLog::new(),
            }
        }

        async fn run(&self, script: &str, target: &str, options: ExecutionOptions) -> RunReport {
            let set =
                PipelineSet::from_script(script, &self.dir.path().join("pipeline.kts")).unwrap();
            let target: Target = target.parse().unwrap();
            let selections = target.select(&set).unwrap();
            let sink: SharedSink = self.log.clone();
            PipelineExecutor::new(Arc::new(ShellExecutor::new().unwrap()))
                .with_sink(sink)
                .execute(&set, &selections, &options)
                .await
                .unwrap()
        }

        fn position(&self, line: &str) -> usize {
            self.log
                .events()
                .iter()
                .position(|e| matches!(e, ExecutionEvent::Output { line: l, .. } if l == line))
                .unwrap_or_else(|| panic!("no output line {line:?}"))
        }
    }

    #[tokio::test]
    async fn test_sequential_steps_run_in_order() {
        let h = Harness::new();
        let report = h
            .run(
                r#"pipeline("dev") {
                    step("one") { cmd("echo first") }
                    step("two") { cmd("echo second") }
                }"#,
                "all",
                ExecutionOptions::default(),
            )
            .await;

        assert!(report.success);
        assert!(h.position("first") < h.position("second"));
        assert_eq!(h.log.lines_of("two"), vec!["second"]);
    }

    #[tokio::test]
    async fn test_parallel_step_overlaps_and_joins() {
        let h = Harness::new();
        let report = h
            .run(
                r#"pipeline("dev") {
                    parallel("slow") { cmd("sleep 0.5; echo slow-done") }
                    step("fast") { cmd("echo fast-done") }
                }"#,
                "dev",
                ExecutionOptions::default(),
            )
            .await;

        assert!(report.success);
        assert!(h.position("fast-done") < h.position("slow-done"));

        let events = h.log.events();
        let slow_finished = events
            .iter()
            .position(|e| matches!(e, ExecutionEvent::StepFinished { step, .. } if step == "slow"))
            .unwrap();
        let pipeline_finished = events
            .iter()
            .position(|e| matches!(e, ExecutionEvent::PipelineFinished { .. }))
            .unwrap();
        assert!(slow_finished < pipeline_finished);
    }

    #[tokio::test]
    async fn test_failure_skips_rest() {
        let h = Harness::new();
        let report = h
            .run(
                r#"pipeline("dev") {
                    step("bad") {
                        cmd("exit 2")
                        cmd("echo never")
                    }
                    step("after") { cmd("echo also-never") }
                }"#,
                "all",
                ExecutionOptions::default(),
            )
            .await;

        assert!(!report.success);
        let dev = report.pipeline("dev").unwrap();
        assert!(matches!(
            &dev.step("bad").unwrap().status,
            StepStatus::Failed { error } if error.contains("code 2")
        ));
        assert_eq!(dev.step("after").unwrap().status, StepStatus::Skipped);
        assert!(h.log.lines_of("bad").is_empty());
        assert_eq!(report.failures(), vec!["dev.bad"]);
    }

    #[tokio::test]
    async fn test_failed_parallel_step_fails_pipeline_at_barrier() {
        let h = Harness::new();
        let report = h
            .run(
                r#"pipeline("dev") {
                    parallel("bad") { cmd("exit 1") }
                    step("ok") { cmd("sleep 0.2; echo ok") }
                }"#,
                "all",
                ExecutionOptions::default(),
            )
            .await;

        assert!(!report.success);
        let dev = report.pipeline("dev").unwrap();
        assert_eq!(dev.step("ok").unwrap().status, StepStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_fail_fast_aborts_parallel_steps() {
        let h = Harness::new();
        let started = Instant::now();
        let report = h
            .run(
                r#"pipeline("dev") {
                    parallel("long") { cmd("sleep 10") }
                    step("bad") { cmd("exit 1") }
                }"#,
                "all",
                ExecutionOptions {
                    fail_fast: true,
                    ..Default::default()
                },
            )
            .await;

        assert!(started.elapsed() < Duration::from_secs(5));
        let dev = report.pipeline("dev").unwrap();
        assert_eq!(dev.step("long").unwrap().status, StepStatus::Aborted);
        assert!(!dev.success);
    }

    #[tokio::test]
    async fn test_failed_pipeline_stops_later_ones_unless_keep_going() {
        let script = r#"
            pipeline("a") { step("s") { cmd("false") } }
            pipeline("b") { step("s") { cmd("true") } }
        "#;

        let h = Harness::new();
        let report = h.run(script, "all", ExecutionOptions::default()).await;
        assert_eq!(report.pipelines.len(), 1);

        let h = Harness::new();
        let report = h
            .run(
                script,
                "all",
                ExecutionOptions {
                    keep_going: true,
                    ..Default::default()
                },
            )
            .await;
        assert_eq!(report.pipelines.len(), 2);
        assert!(report.pipeline("b").unwrap().success);
        assert!(!report.success);
    }

    #[tokio::test]
    async fn test_selector_runs_single_step() {
        let h = Harness::new();
        let report = h
            .run(
                r#"pipeline("dev") {
                    step("go") { cmd("echo go") }
                    parallel("echo") { cmd("echo echo") }
                }
                pipeline("prod") { step("go") { cmd("echo prod") } }"#,
                "dev.go",
                ExecutionOptions::default(),
            )
            .await;

        assert_eq!(report.pipelines.len(), 1);
        assert_eq!(report.pipelines[0].steps.len(), 1);
        assert_eq!(h.log.lines_of("go"), vec!["go"]);
        assert!(h.log.lines_of("echo").is_empty());
    }

    #[tokio::test]
    async fn test_env_precedence() {
        let h = Harness::new();
        h.run(
            r#"
            env("A", "set")
            env("B", "set")
            env("C", "set")
            pipeline("p") {
                env("B", "pipeline")
                env("C", "pipeline")
                step("s") {
                    env("C", "step")
                    cmd("echo $A-$B-$C")
                }
            }"#,
            "all",
            ExecutionOptions::default(),
        )
        .await;
        assert_eq!(h.log.lines_of("s"), vec!["set-pipeline-step"]);
    }

    #[tokio::test]
    async fn test_workspaces_and_file_actions() {
        let h = Harness::new();
        std::fs::create_dir_all(h.dir.path().join("app/dist")).unwrap();
        std::fs::write(h.dir.path().join("app/index.html"), "v1").unwrap();
        std::fs::write(h.dir.path().join("app/dist/a.txt"), "a").unwrap();

        let report = h
            .run(
                r#"pipeline("p") {
                    step("files") {
                        workspace("app")
                        replace("index.html", "v[0-9]", "v2")
                        move("dist/a.txt", "moved/a.txt")
                        copy("moved", "copied")
                        workspace("app/copied")
                        cmd("ls")
                    }
                }"#,
                "all",
                ExecutionOptions::default(),
            )
            .await;

        assert!(report.success, "{:?}", report);
        let app = h.dir.path().join("app");
        assert_eq!(std::fs::read_to_string(app.join("index.html")).unwrap(), "v2");
        assert!(!app.join("dist/a.txt").exists());
        assert!(app.join("moved/a.txt").exists());
        assert_eq!(h.log.lines_of("files"), vec!["a.txt"]);
    }

    #[tokio::test]
    async fn test_missing_workspace_fails_step() {
        let h = Harness::new();
        let report = h
            .run(
                r#"pipeline("p") { step("s") { workspace("nope") cmd("true") } }"#,
                "all",
                ExecutionOptions::default(),
            )
            .await;
        assert!(matches!(
            &report.pipelines[0].steps[0].status,
            StepStatus::Failed { error } if error.contains("nope")
        ));
    }

    #[tokio::test]
    async fn test_echo_and_print_become_output() {
        let h = Harness::new();
        h.run(
            r#"pipeline("p") { step("s") { echo("hello ", 1) println("done") } }"#,
            "all",
            ExecutionOptions::default(),
        )
        .await;
        assert_eq!(h.log.lines_of("s"), vec!["hello 1", "done"]);
    }

    #[tokio::test]
    async fn test_dry_run_skips_everything() {
        let h = Harness::new();
        let report = h
            .run(
                r#"pipeline("p") { step("s") { cmd("touch created") } }"#,
                "all",
                ExecutionOptions {
                    dry_run: true,
                    ..Default::default()
                },
            )
            .await;
        assert!(report.success);
        assert_eq!(report.pipelines[0].steps[0].status, StepStatus::Skipped);
        assert!(!h.dir.path().join("created").exists());
    }

    struct PanickingRunner;

    #[async_trait::async_trait]
    impl CommandRunner for PanickingRunner {
        async fn run(&self, command: &str, _: &ActionContext) -> PipeflowResult<CommandOutput> {
            if command == "boom" {
                panic!("runner blew up");
            }
            Ok(CommandOutput {
                success: true,
                exit_code: 0,
                duration: Duration::ZERO,
            })
        }

        async fn check_available(&self) -> PipeflowResult<bool> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn test_panicking_parallel_step_is_reported_as_failed() {
        let h = Harness::new();
        let set = PipelineSet::from_script(
            r#"pipeline("dev") {
                parallel("bad") { cmd("boom") }
                step("ok") { cmd("fine") }
            }"#,
            &h.dir.path().join("pipeline.kts"),
        )
        .unwrap();
        let selections = Target::all().select(&set).unwrap();
        let sink: SharedSink = h.log.clone();

        let report = PipelineExecutor::new(Arc::new(PanickingRunner))
            .with_sink(sink)
            .execute(&set, &selections, &ExecutionOptions::default())
            .await
            .unwrap();

        assert!(!report.success);
        let dev = report.pipeline("dev").unwrap();
        assert_eq!(dev.step("ok").unwrap().status, StepStatus::Succeeded);
        assert!(matches!(
            &dev.step("bad").unwrap().status,
            StepStatus::Failed { error } if error.contains("runner blew up")
        ));
        assert!(h.log.events().iter().any(|e| matches!(
            e,
            ExecutionEvent::StepFinished { step, status: StepOutcome::Failed(_), .. } if step == "bad"
        )));
    }
}
