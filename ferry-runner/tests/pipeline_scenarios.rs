use async_trait::async_trait;
use ferry_core::definition::PipelineDefinition;
use ferry_core::domain::approval::ApprovalResolution;
use ferry_core::domain::run::{FailureKind, RunReport, RunState};
use ferry_core::domain::stage::{Stage, StageState};
use ferry_core::domain::task::{TaskResult, TaskSpec, TaskStatus};
use ferry_runner::execution::ExecutionEnv;
use ferry_core::domain::run::ReleaseRecord;
use ferry_runner::service::{
    ExecutionService, MANIFEST_FILE, PublishError, Release, ReleasePublisher, SecretStore,
};
use ferry_runner::{PipelineEngine, PipelineError, PipelineHandle, RunnerConfig};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Executor that fakes builds by program name
///
/// - `ok`: succeeds, writing the declared output into the workspace
/// - `fail`: exits with status 1
/// - `hang`: runs until cancelled
struct FakeExecutor;

#[async_trait]
impl ExecutionService for FakeExecutor {
    async fn run(&self, task: &TaskSpec, env: &ExecutionEnv, cancel: CancellationToken) -> TaskResult {
        let mut result = TaskResult::faulted(task, "");
        result.error_message = None;

        let status = tokio::select! {
            () = cancel.cancelled() => TaskStatus::Cancelled,
            status = simulate(task) => status,
        };

        if status == TaskStatus::Succeeded {
            if let Some(output) = &task.output {
                let path = env.workspace.join(output);
                std::fs::write(&path, format!("{} {}", task.name, env.version)).unwrap();
                result.outputs.push(path);
            }
            result.exit_code = Some(0);
        }
        if status == TaskStatus::Failed {
            result.exit_code = Some(1);
            result.error_message = Some("exited with status 1".to_string());
        }

        result.status = status;
        result
    }
}

async fn simulate(task: &TaskSpec) -> TaskStatus {
    match task.program.as_str() {
        "hang" => std::future::pending().await,
        "fail" => {
            tokio::time::sleep(Duration::from_millis(20)).await;
            TaskStatus::Failed
        }
        _ => {
            tokio::time::sleep(Duration::from_millis(20)).await;
            TaskStatus::Succeeded
        }
    }
}

struct Fixture {
    _dir: TempDir,
    engine: PipelineEngine,
    workspace: std::path::PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path().join("workspace");
        std::fs::create_dir_all(&workspace).unwrap();

        let config = RunnerConfig::new(dir.path().join("artifacts"));
        let engine = PipelineEngine::new(config, Arc::new(FakeExecutor), SecretStore::new());

        Self {
            _dir: dir,
            engine,
            workspace,
        }
    }

    fn definition(&self, stages: Vec<Stage>) -> PipelineDefinition {
        let mut definition = PipelineDefinition::new("release");
        definition.workspace = self.workspace.clone();
        definition.stages = stages;
        definition
    }
}

fn build(name: &str, program: &str) -> TaskSpec {
    TaskSpec::new(name, name, program).with_output(format!("{}.bin", name))
}

fn build_stage(linux: &str) -> Stage {
    Stage::new("build")
        .with_task(build("linux", linux))
        .with_task(build("windows", "ok"))
        .with_task(build("mac", "ok"))
}

fn deploy_stage() -> Stage {
    Stage::new("deploy")
        .depends_on("build")
        .with_approval("Ship {version}?")
        .with_task(TaskSpec::new("upload", "all", "ok"))
}

async fn wait_until<F>(handle: &PipelineHandle, predicate: F) -> RunReport
where
    F: Fn(&RunReport) -> bool,
{
    let mut rx = handle.subscribe();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            {
                let report = rx.borrow_and_update();
                if predicate(&*report) {
                    return report.clone();
                }
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("condition not reached in time")
}

fn stage_state(report: &RunReport, stage: &str) -> StageState {
    report.stage(stage).unwrap().state
}

#[tokio::test]
async fn test_approved_release_succeeds_with_all_artifacts() {
    let fixture = Fixture::new();
    let definition = fixture.definition(vec![build_stage("ok"), deploy_stage()]);
    let handle = fixture.engine.launch(definition, "v1.2.0").unwrap();

    let report = wait_until(&handle, |r| stage_state(r, "deploy") == StageState::AwaitingApproval).await;
    assert_eq!(stage_state(&report, "build"), StageState::Succeeded);
    assert_eq!(report.artifacts.len(), 3);
    let gates: Vec<_> = report.pending_gates().collect();
    assert_eq!(gates.len(), 1);
    assert_eq!(gates[0].message, "Ship v1.2.0?");

    handle.approve("deploy", "alice").await.unwrap();
    let report = handle.wait().await;

    assert_eq!(report.state, RunState::Succeeded);
    assert_eq!(stage_state(&report, "deploy"), StageState::Succeeded);

    let mut targets: Vec<_> = report.artifacts.iter().map(|a| a.target.as_str()).collect();
    targets.sort();
    assert_eq!(targets, vec!["linux", "mac", "windows"]);

    let release = report.release.expect("release record");
    assert_eq!(release.version, "v1.2.0");
    assert_eq!(release.artifact_count, 3);
    let manifest = fixture.engine.store().run_dir(handle.id()).join(MANIFEST_FILE);
    assert!(manifest.is_file());

    assert!(matches!(
        report.gates[0].resolution,
        Some(ApprovalResolution::Approved { ref by, .. }) if by == "alice"
    ));
}

#[tokio::test]
async fn test_one_failed_target_blocks_downstream() {
    let fixture = Fixture::new();
    let definition = fixture.definition(vec![build_stage("fail"), deploy_stage()]);
    let handle = fixture.engine.launch(definition, "v1.2.0").unwrap();

    let report = handle.wait().await;

    assert_eq!(report.state, RunState::Failed);
    let build = report.stage("build").unwrap();
    assert_eq!(build.state, StageState::Failed);
    assert_eq!(build.failure, Some(FailureKind::CommandFailure));
    assert_eq!(build.tasks.len(), 3);

    let deploy = report.stage("deploy").unwrap();
    assert_eq!(deploy.state, StageState::Blocked);
    assert_eq!(deploy.failure, Some(FailureKind::DependencyUnmet));
    assert!(deploy.started_at.is_none());

    // Successful siblings of a failed stage are not published
    assert!(report.artifacts.is_empty());
    assert!(report.release.is_none());
    assert!(report.gates.is_empty());
}

#[tokio::test]
async fn test_unresolved_gate_never_runs() {
    let fixture = Fixture::new();
    let definition = fixture.definition(vec![build_stage("ok"), deploy_stage()]);
    let handle = fixture.engine.launch(definition, "v2").unwrap();

    wait_until(&handle, |r| stage_state(r, "deploy") == StageState::AwaitingApproval).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let report = handle.snapshot();
    assert_eq!(stage_state(&report, "deploy"), StageState::AwaitingApproval);
    assert_eq!(report.state, RunState::Running);
    assert!(report.task_result("upload").is_none());
    assert!(!handle.is_finished());

    handle.abort().await.unwrap();
    let report = handle.wait().await;

    assert_eq!(report.state, RunState::Cancelled);
    let deploy = report.stage("deploy").unwrap();
    assert_eq!(deploy.state, StageState::Aborted);
    assert_eq!(deploy.failure, Some(FailureKind::Cancelled));
    assert!(matches!(
        report.gates[0].resolution,
        Some(ApprovalResolution::Rejected { ref by, .. }) if by == "ferry"
    ));
    // Artifacts of completed stages survive the abort
    assert_eq!(report.artifacts.len(), 3);
}

#[tokio::test]
async fn test_rejected_gate_fails_run() {
    let fixture = Fixture::new();
    let definition = fixture.definition(vec![build_stage("ok"), deploy_stage()]);
    let handle = fixture.engine.launch(definition, "v3").unwrap();

    wait_until(&handle, |r| stage_state(r, "deploy") == StageState::AwaitingApproval).await;
    handle
        .reject("deploy", "bob", Some("release freeze".to_string()))
        .await
        .unwrap();

    let report = handle.wait().await;
    assert_eq!(report.state, RunState::Failed);

    let deploy = report.stage("deploy").unwrap();
    assert_eq!(deploy.state, StageState::Aborted);
    assert_eq!(deploy.failure, Some(FailureKind::ApprovalAborted));
    assert_eq!(deploy.message.as_deref(), Some("rejected by bob: release freeze"));
    assert!(report.release.is_none());
}

#[tokio::test]
async fn test_abort_cancels_running_stage_and_keeps_artifacts() {
    let fixture = Fixture::new();
    let definition = fixture.definition(vec![
        Stage::new("build").with_task(build("linux", "ok")),
        Stage::new("package")
            .depends_on("build")
            .with_task(TaskSpec::new("sign", "linux-signed", "hang"))
            .with_task(TaskSpec::new("notarize", "mac", "hang")),
        Stage::new("deploy")
            .depends_on("package")
            .with_task(TaskSpec::new("upload", "all", "ok")),
    ]);
    let handle = fixture.engine.launch(definition, "v4").unwrap();

    wait_until(&handle, |r| stage_state(r, "package") == StageState::Running).await;
    handle.abort().await.unwrap();
    // Idempotent
    let _ = handle.abort().await;

    let report = handle.wait().await;
    assert_eq!(report.state, RunState::Cancelled);
    assert_eq!(stage_state(&report, "build"), StageState::Succeeded);

    let package = report.stage("package").unwrap();
    assert_eq!(package.state, StageState::Cancelled);
    assert!(package.tasks.iter().all(|t| t.status == TaskStatus::Cancelled));

    let deploy = report.stage("deploy").unwrap();
    assert_eq!(deploy.state, StageState::Blocked);
    assert_eq!(deploy.failure, Some(FailureKind::Cancelled));

    assert_eq!(report.artifacts.len(), 1);
    assert_eq!(report.artifacts[0].target, "linux");
    assert!(report.release.is_none());
}

#[tokio::test]
async fn test_commands_are_checked() {
    let fixture = Fixture::new();
    let definition = fixture.definition(vec![build_stage("ok"), deploy_stage()]);
    let handle = fixture.engine.launch(definition, "v5").unwrap();

    wait_until(&handle, |r| stage_state(r, "deploy") == StageState::AwaitingApproval).await;

    let err = handle.approve("build", "alice").await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::NotAwaitingApproval { state: StageState::Succeeded, .. }
    ));

    let err = handle.approve("publish", "alice").await.unwrap_err();
    assert!(matches!(err, PipelineError::UnknownStage(stage) if stage == "publish"));

    handle.approve("deploy", "alice").await.unwrap();
    handle.wait().await;

    let err = handle.approve("deploy", "alice").await.unwrap_err();
    assert!(matches!(err, PipelineError::RunFinished));
}

#[tokio::test]
async fn test_best_effort_failure_does_not_fail_run() {
    let fixture = Fixture::new();
    let mut notify = Stage::new("notify")
        .depends_on("build")
        .with_task(TaskSpec::new("chat", "chat", "fail"));
    notify.best_effort = true;

    let definition = fixture.definition(vec![
        Stage::new("build").with_task(build("linux", "ok")),
        notify,
        Stage::new("publish")
            .depends_on("notify")
            .with_task(TaskSpec::new("upload", "all", "ok")),
    ]);
    let handle = fixture.engine.launch(definition, "v6").unwrap();

    let report = handle.wait().await;
    assert_eq!(report.state, RunState::Succeeded);
    assert_eq!(stage_state(&report, "notify"), StageState::Failed);
    assert_eq!(stage_state(&report, "publish"), StageState::Succeeded);
    assert_eq!(report.failed_stages().count(), 1);
    assert!(report.release.is_some());
}

#[tokio::test]
async fn test_best_effort_stage_that_never_ran_blocks_dependents() {
    let fixture = Fixture::new();
    let mut notify = Stage::new("notify")
        .depends_on("build")
        .with_task(TaskSpec::new("chat", "chat", "ok"));
    notify.best_effort = true;

    let definition = fixture.definition(vec![
        Stage::new("build").with_task(build("linux", "fail")),
        notify,
        Stage::new("deploy")
            .depends_on("notify")
            .with_task(TaskSpec::new("upload", "all", "ok")),
    ]);
    let handle = fixture.engine.launch(definition, "v6.1").unwrap();

    let report = handle.wait().await;
    assert_eq!(report.state, RunState::Failed);
    assert_eq!(stage_state(&report, "build"), StageState::Failed);

    let notify = report.stage("notify").unwrap();
    assert_eq!(notify.state, StageState::Blocked);
    assert!(notify.tasks.is_empty());

    let deploy = report.stage("deploy").unwrap();
    assert_eq!(deploy.state, StageState::Blocked);
    assert_eq!(deploy.failure, Some(FailureKind::DependencyUnmet));
    assert!(report.task_result("upload").is_none());
}

fn target_stage(name: &str, program: &str) -> Stage {
    Stage::new(name).with_task(build(name, program))
}

fn gated_deploy_after(stages: &[&str]) -> Stage {
    let mut deploy = Stage::new("deploy")
        .with_approval("Ship {version}?")
        .with_task(TaskSpec::new("upload", "all", "ok"));
    for stage in stages {
        deploy = deploy.depends_on(*stage);
    }
    deploy
}

#[tokio::test]
async fn test_independent_target_stages_feed_gated_deploy() {
    let fixture = Fixture::new();
    let definition = fixture.definition(vec![
        target_stage("linux", "ok"),
        target_stage("windows", "ok"),
        target_stage("mac", "ok"),
        gated_deploy_after(&["linux", "windows", "mac"]),
    ]);
    let handle = fixture.engine.launch(definition, "v10").unwrap();

    let report = wait_until(&handle, |r| stage_state(r, "deploy") == StageState::AwaitingApproval).await;
    for stage in ["linux", "windows", "mac"] {
        assert_eq!(stage_state(&report, stage), StageState::Succeeded);
    }
    assert!(report.task_result("upload").is_none());

    handle.approve("deploy", "alice").await.unwrap();
    let report = handle.wait().await;

    assert_eq!(report.state, RunState::Succeeded);
    assert_eq!(stage_state(&report, "deploy"), StageState::Succeeded);
    assert_eq!(report.artifacts.len(), 3);
    assert_eq!(report.release.map(|r| r.artifact_count), Some(3));
}

#[tokio::test]
async fn test_failed_target_stage_lets_siblings_finish() {
    let fixture = Fixture::new();
    let definition = fixture.definition(vec![
        target_stage("linux", "fail"),
        target_stage("windows", "ok"),
        target_stage("mac", "ok"),
        gated_deploy_after(&["linux", "windows", "mac"]),
    ]);
    let handle = fixture.engine.launch(definition, "v11").unwrap();

    let report = handle.wait().await;
    assert_eq!(report.state, RunState::Failed);

    let linux = report.stage("linux").unwrap();
    assert_eq!(linux.state, StageState::Failed);
    assert_eq!(linux.failure, Some(FailureKind::CommandFailure));
    assert_eq!(stage_state(&report, "windows"), StageState::Succeeded);
    assert_eq!(stage_state(&report, "mac"), StageState::Succeeded);

    let deploy = report.stage("deploy").unwrap();
    assert_eq!(deploy.state, StageState::Blocked);
    assert_eq!(deploy.failure, Some(FailureKind::DependencyUnmet));
    assert!(report.gates.is_empty());

    let mut targets: Vec<_> = report.artifacts.iter().map(|a| a.target.as_str()).collect();
    targets.sort();
    assert_eq!(targets, vec!["mac", "windows"]);
    assert!(report.release.is_none());
}

struct RefusingPublisher;

#[async_trait]
impl ReleasePublisher for RefusingPublisher {
    async fn publish(&self, _release: &Release) -> Result<ReleaseRecord, PublishError> {
        Err(PublishError::Rejected("registry unavailable".to_string()))
    }
}

#[tokio::test]
async fn test_publication_failure_fails_run() {
    let dir = TempDir::new().unwrap();
    let workspace = dir.path().join("workspace");
    std::fs::create_dir_all(&workspace).unwrap();

    let config = RunnerConfig::new(dir.path().join("artifacts"));
    let engine = PipelineEngine::new(config, Arc::new(FakeExecutor), SecretStore::new())
        .with_publisher(Arc::new(RefusingPublisher));

    let mut definition = PipelineDefinition::new("release");
    definition.workspace = workspace;
    definition.stages = vec![Stage::new("build").with_task(build("linux", "ok"))];

    let report = engine.launch(definition, "v12").unwrap().wait().await;

    assert_eq!(report.state, RunState::Failed);
    assert_eq!(stage_state(&report, "build"), StageState::Succeeded);
    assert_eq!(report.artifacts.len(), 1);
    assert!(report.release.is_none());
    assert_eq!(report.release_error.as_deref(), Some("registry unavailable"));
}

#[tokio::test]
async fn test_target_claimed_twice_fails_stage() {
    let fixture = Fixture::new();
    let definition = fixture.definition(vec![
        Stage::new("build").with_task(build("linux", "ok")),
        Stage::new("rebuild")
            .depends_on("build")
            .with_task(TaskSpec::new("linux-again", "linux", "ok").with_output("again.bin")),
    ]);
    let handle = fixture.engine.launch(definition, "v7").unwrap();

    let report = handle.wait().await;
    assert_eq!(report.state, RunState::Failed);

    let rebuild = report.stage("rebuild").unwrap();
    assert_eq!(rebuild.state, StageState::Failed);
    assert_eq!(rebuild.failure, Some(FailureKind::DuplicateArtifact));
    assert_eq!(report.artifacts.len(), 1);
    assert_eq!(report.artifacts[0].task, "linux");
}

#[tokio::test]
async fn test_launch_rejects_bad_input() {
    let fixture = Fixture::new();

    let empty = fixture.definition(vec![]);
    assert!(matches!(
        fixture.engine.launch(empty, "v1"),
        Err(PipelineError::Definition(_))
    ));

    let definition = fixture.definition(vec![build_stage("ok")]);
    assert!(matches!(
        fixture.engine.launch(definition, "  "),
        Err(PipelineError::EmptyVersion)
    ));
}

#[tokio::test]
async fn test_dropping_every_handle_aborts_run() {
    let fixture = Fixture::new();
    let definition = fixture.definition(vec![build_stage("ok"), deploy_stage()]);
    let handle = fixture.engine.launch(definition, "v8").unwrap();

    let mut rx = handle.subscribe();
    drop(handle);

    let report = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if rx.borrow_and_update().state.is_finished() {
                return rx.borrow().clone();
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .unwrap();

    assert_eq!(report.state, RunState::Cancelled);
}

#[cfg(unix)]
#[tokio::test]
async fn test_real_processes_produce_artifacts() {
    let dir = TempDir::new().unwrap();
    let workspace = dir.path().join("workspace");
    std::fs::create_dir_all(&workspace).unwrap();

    let mut config = RunnerConfig::new(dir.path().join("artifacts"));
    config.inherit_env = vec!["PATH".to_string()];
    config.max_parallel_tasks = 2;
    let engine = PipelineEngine::with_process_executor(config, SecretStore::new());

    let task = |target: &str| {
        TaskSpec::new(format!("build-{}", target), target, "/bin/sh")
            .with_args(["-c", "echo building {target} {version} && echo {target} > {target}.tar"])
            .with_output("{target}.tar")
    };

    let mut definition = PipelineDefinition::new("sh-release");
    definition.workspace = workspace;
    definition.stages = vec![
        Stage::new("build")
            .with_task(task("linux"))
            .with_task(task("freebsd")),
    ];

    let handle = engine.launch(definition, "v9").unwrap();
    let report = handle.wait().await;

    assert_eq!(report.state, RunState::Succeeded, "{:?}", report.failed_stages().collect::<Vec<_>>());
    assert_eq!(report.artifacts.len(), 2);

    let logs = handle.logs("build-linux").unwrap();
    assert!(logs.iter().any(|e| e.message == "building linux v9"));

    let linux = report.artifacts.iter().find(|a| a.target == "linux").unwrap();
    assert_eq!(std::fs::read_to_string(&linux.binary).unwrap().trim(), "linux");
}
