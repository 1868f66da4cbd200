use ferry_core::definition::{PipelineDefinition, TemplateVars, render};
use ferry_core::domain::approval::{ApprovalGate, ApprovalResolution};
use ferry_core::domain::artifact::{Artifact, ArtifactSet};
use ferry_core::domain::run::{FailureKind, ReleaseRecord, RunReport, RunState, StageReport};
use ferry_core::domain::stage::StageState;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::PipelineError;
use super::engine::Services;
use crate::execution::ExecutionEnv;
use crate::scheduler::{FanOutError, FanOutReport};
use crate::service::{AggregateError, AggregateScope, InMemoryLogBuffer, Release};

/// Author recorded on gates closed by an abort
const SYSTEM_ACTOR: &str = "ferry";

type Reply = oneshot::Sender<Result<(), PipelineError>>;

pub(crate) enum Command {
    Approve {
        stage: String,
        by: String,
        reply: Reply,
    },
    Reject {
        stage: String,
        by: String,
        reason: Option<String>,
        reply: Reply,
    },
    Abort {
        reply: Reply,
    },
}

struct StageDone {
    index: usize,
    outcome: Result<FanOutReport, FanOutError>,
}

enum Dependencies {
    Satisfied,
    Waiting,
    Unmet(String),
}

pub(super) struct RunDriver {
    id: Uuid,
    definition: PipelineDefinition,
    version: String,
    services: Services,
    logs: Arc<InMemoryLogBuffer>,

    stages: Vec<StageReport>,
    gates: Vec<ApprovalGate>,
    artifacts: ArtifactSet,
    state: RunState,
    release: Option<ReleaseRecord>,
    release_error: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    completed_at: Option<chrono::DateTime<chrono::Utc>>,

    aborted: bool,
    cancel: CancellationToken,
    running: usize,
    commands: mpsc::Receiver<Command>,
    commands_open: bool,
    done_tx: mpsc::UnboundedSender<StageDone>,
    done_rx: mpsc::UnboundedReceiver<StageDone>,
    snapshot: watch::Sender<RunReport>,
}

impl RunDriver {
    pub(super) fn new(
        id: Uuid,
        definition: PipelineDefinition,
        version: String,
        services: Services,
        logs: Arc<InMemoryLogBuffer>,
        commands: mpsc::Receiver<Command>,
    ) -> Self {
        let stages = definition
            .stages
            .iter()
            .map(|stage| StageReport {
                name: stage.name.clone(),
                state: StageState::Pending,
                failure: None,
                message: None,
                best_effort: stage.best_effort,
                depends_on: stage.depends_on.clone(),
                tasks: Vec::new(),
                started_at: None,
                completed_at: None,
            })
            .collect::<Vec<_>>();

        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let created_at = chrono::Utc::now();
        let (snapshot, _) = watch::channel(RunReport {
            id,
            pipeline: definition.name.clone(),
            version: version.clone(),
            state: RunState::Running,
            stages: stages.clone(),
            artifacts: Vec::new(),
            gates: Vec::new(),
            release: None,
            release_error: None,
            created_at,
            completed_at: None,
        });

        Self {
            id,
            definition,
            version,
            services,
            logs,
            stages,
            gates: Vec::new(),
            artifacts: ArtifactSet::new(),
            state: RunState::Running,
            release: None,
            release_error: None,
            created_at,
            completed_at: None,
            aborted: false,
            cancel: CancellationToken::new(),
            running: 0,
            commands,
            commands_open: true,
            done_tx,
            done_rx,
            snapshot,
        }
    }

    pub(super) fn subscribe(&self) -> watch::Receiver<RunReport> {
        self.snapshot.subscribe()
    }

    pub(super) async fn run(mut self) {
        info!(run_id = %self.id, "Run started");

        self.advance();
        self.publish();

        while !self.all_terminal() {
            tokio::select! {
                command = self.commands.recv(), if self.commands_open => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        self.commands_open = false;
                        warn!(run_id = %self.id, "Every handle was dropped, aborting run");
                        self.abort();
                    }
                },
                Some(done) = self.done_rx.recv() => self.stage_finished(done).await,
            }

            self.advance();
            self.publish();
        }

        self.finish().await;
    }

    // ============================================================================
    // Stage progression
    // ============================================================================

    fn all_terminal(&self) -> bool {
        self.stages.iter().all(|s| s.state.is_terminal())
    }

    fn index_of(&self, stage: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.name == stage)
    }

    /// Moves every stage forward until nothing changes
    fn advance(&mut self) {
        loop {
            let mut changed = false;
            for index in 0..self.stages.len() {
                changed |= self.step(index);
            }
            if !changed {
                break;
            }
        }
    }

    fn step(&mut self, index: usize) -> bool {
        let state = self.stages[index].state;

        if self.aborted {
            return match state {
                StageState::Pending | StageState::Ready | StageState::Approved => self.fail(
                    index,
                    StageState::Blocked,
                    FailureKind::Cancelled,
                    "run aborted before the stage started".to_string(),
                ),
                StageState::AwaitingApproval => {
                    self.close_gate(index);
                    self.fail(
                        index,
                        StageState::Aborted,
                        FailureKind::Cancelled,
                        "run aborted while awaiting approval".to_string(),
                    )
                }
                _ => false,
            };
        }

        match state {
            StageState::Pending => match self.dependencies(index) {
                Dependencies::Satisfied => self.transition(index, StageState::Ready),
                Dependencies::Waiting => false,
                Dependencies::Unmet(dependency) => self.fail(
                    index,
                    StageState::Blocked,
                    FailureKind::DependencyUnmet,
                    format!("dependency '{}' did not succeed", dependency),
                ),
            },
            StageState::Ready if self.definition.stages[index].requires_approval() => {
                self.open_gate(index);
                self.transition(index, StageState::AwaitingApproval)
            }
            StageState::Ready | StageState::Approved => self.start(index),
            _ => false,
        }
    }

    fn dependencies(&self, index: usize) -> Dependencies {
        let mut waiting = false;
        for dependency in &self.stages[index].depends_on {
            let Some(dep) = self.index_of(dependency).map(|i| &self.stages[i]) else {
                return Dependencies::Unmet(dependency.clone());
            };

            match dep.state {
                StageState::Succeeded => continue,
                // a best-effort stage that ran and failed still releases its dependents
                StageState::Failed if dep.best_effort => continue,
                state if state.is_terminal() => return Dependencies::Unmet(dependency.clone()),
                _ => waiting = true,
            }
        }

        if waiting {
            Dependencies::Waiting
        } else {
            Dependencies::Satisfied
        }
    }

    /// Applies a transition if the state machine allows it
    fn transition(&mut self, index: usize, next: StageState) -> bool {
        let stage = &mut self.stages[index];
        if !stage.state.can_transition_to(next) {
            error!(
                run_id = %self.id,
                stage = %stage.name,
                from = %stage.state,
                to = %next,
                "Refusing illegal stage transition"
            );
            return false;
        }

        let now = chrono::Utc::now();
        if next == StageState::Running {
            stage.started_at = Some(now);
        }
        if next.is_terminal() {
            stage.completed_at = Some(now);
        }

        info!(run_id = %self.id, stage = %stage.name, from = %stage.state, to = %next, "Stage transition");
        stage.state = next;
        true
    }

    fn fail(&mut self, index: usize, next: StageState, kind: FailureKind, message: String) -> bool {
        if !self.transition(index, next) {
            return false;
        }
        let stage = &mut self.stages[index];
        warn!(run_id = %self.id, stage = %stage.name, kind = %kind, "{}", message);
        stage.failure = Some(kind);
        stage.message = Some(message);
        true
    }

    fn start(&mut self, index: usize) -> bool {
        if !self.transition(index, StageState::Running) {
            return false;
        }

        let stage = &self.definition.stages[index];
        let config = &self.services.config;
        let env = ExecutionEnv::new(
            self.id,
            self.version.clone(),
            stage.name.clone(),
            self.definition.workspace.clone(),
        )
        .inherit(&config.inherit_env)
        .with_secrets(self.services.secrets.scope(stage.environment.as_deref()))
        .with_timeout(config.task_timeout)
        .with_logs(self.logs.clone());

        let tasks = stage.tasks.clone();
        let coordinator = self.services.coordinator.clone();
        let cancel = self.cancel.clone();
        let done = self.done_tx.clone();

        debug!(run_id = %self.id, stage = %stage.name, tasks = tasks.len(), "Spawning stage");
        self.running += 1;

        tokio::spawn(async move {
            let outcome = coordinator.run_all(&tasks, Arc::new(env), &cancel).await;
            // The driver owns the receiver for the whole run
            let _ = done.send(StageDone { index, outcome });
        });

        true
    }

    async fn stage_finished(&mut self, done: StageDone) {
        self.running = self.running.saturating_sub(1);
        let index = done.index;

        let report = match done.outcome {
            Ok(report) => report,
            Err(e) => {
                self.fail(index, StageState::Failed, FailureKind::ExecutionFault, e.to_string());
                return;
            }
        };

        if !report.succeeded() {
            let summary = report.summary();
            let kind = report
                .failures()
                .first()
                .map(|(_, kind)| *kind)
                .unwrap_or(FailureKind::ExecutionFault);
            self.stages[index].tasks = report.into_results();

            if self.aborted {
                self.fail(index, StageState::Cancelled, FailureKind::Cancelled, summary);
            } else {
                self.fail(index, StageState::Failed, kind, summary);
            }
            return;
        }

        if self.definition.stages[index].collects_artifacts() {
            let (report, aggregated) = self.aggregate(index, report).await;
            self.stages[index].tasks = report.into_results();
            if let Err((kind, message)) = aggregated.and_then(|artifacts| self.register(artifacts)) {
                self.fail(index, StageState::Failed, kind, message);
                return;
            }
        } else {
            self.stages[index].tasks = report.into_results();
        }

        self.transition(index, StageState::Succeeded);
    }

    /// Runs the aggregator off the event loop; the report is handed back
    async fn aggregate(
        &self,
        index: usize,
        report: FanOutReport,
    ) -> (FanOutReport, Result<Vec<Artifact>, (FailureKind, String)>) {
        let aggregator = self.services.aggregator.clone();
        let existing = self.artifacts.clone();
        let run_id = self.id;
        let version = self.version.clone();
        let stage = self.stages[index].name.clone();
        let fallback = report.clone();

        let joined = tokio::task::spawn_blocking(move || {
            let scope = AggregateScope {
                run_id,
                version: &version,
                stage: &stage,
            };
            let result = aggregator.aggregate(scope, &report, &existing);
            (report, result)
        })
        .await;

        match joined {
            Ok((report, Ok(artifacts))) => (report, Ok(artifacts)),
            Ok((report, Err(e))) => (report, Err(aggregate_failure(&e))),
            Err(e) => (
                fallback,
                Err((
                    FailureKind::ExecutionFault,
                    format!("artifact aggregation crashed: {}", e),
                )),
            ),
        }
    }

    fn register(&mut self, artifacts: Vec<Artifact>) -> Result<(), (FailureKind, String)> {
        for artifact in artifacts {
            self.artifacts
                .insert(artifact)
                .map_err(|e| (FailureKind::DuplicateArtifact, e.to_string()))?;
        }
        Ok(())
    }

    // ============================================================================
    // Approval gates
    // ============================================================================

    fn open_gate(&mut self, index: usize) {
        let Some(approval) = &self.definition.stages[index].approval else {
            return;
        };
        let stage = &self.stages[index].name;
        let vars = TemplateVars {
            target: "",
            version: &self.version,
            task: "",
            stage,
        };
        let message = render(&approval.message, &vars).unwrap_or_else(|_| approval.message.clone());

        info!(run_id = %self.id, stage = %stage, "Awaiting approval: {}", message);
        self.gates.push(ApprovalGate::open(self.id, stage.clone(), message));
    }

    fn resolve_gate(&mut self, stage: &str, resolution: ApprovalResolution) -> Result<usize, PipelineError> {
        let index = self
            .index_of(stage)
            .ok_or_else(|| PipelineError::UnknownStage(stage.to_string()))?;

        let state = self.stages[index].state;
        let not_awaiting = || PipelineError::NotAwaitingApproval {
            stage: stage.to_string(),
            state,
        };
        if state != StageState::AwaitingApproval {
            return Err(not_awaiting());
        }

        let gate = self
            .gates
            .iter_mut()
            .find(|g| g.stage == stage && g.is_pending())
            .ok_or_else(not_awaiting)?;
        gate.resolve(resolution).map_err(|_| not_awaiting())?;
        Ok(index)
    }

    fn close_gate(&mut self, index: usize) {
        let stage = &self.stages[index].name;
        if let Some(gate) = self
            .gates
            .iter_mut()
            .find(|g| &g.stage == stage && g.is_pending())
        {
            // Pending was just checked
            let _ = gate.resolve(ApprovalResolution::Rejected {
                by: SYSTEM_ACTOR.to_string(),
                reason: Some("run aborted".to_string()),
                at: chrono::Utc::now(),
            });
        }
    }

    // ============================================================================
    // Commands
    // ============================================================================

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Approve { stage, by, reply } => {
                let resolution = ApprovalResolution::Approved {
                    by: by.clone(),
                    at: chrono::Utc::now(),
                };
                let result = self.resolve_gate(&stage, resolution).map(|index| {
                    info!(run_id = %self.id, stage = %stage, by = %by, "Stage approved");
                    self.transition(index, StageState::Approved);
                });
                let _ = reply.send(result);
            }
            Command::Reject {
                stage,
                by,
                reason,
                reply,
            } => {
                let resolution = ApprovalResolution::Rejected {
                    by: by.clone(),
                    reason: reason.clone(),
                    at: chrono::Utc::now(),
                };
                let result = self.resolve_gate(&stage, resolution).map(|index| {
                    let message = match &reason {
                        Some(reason) => format!("rejected by {}: {}", by, reason),
                        None => format!("rejected by {}", by),
                    };
                    self.fail(
                        index,
                        StageState::Aborted,
                        FailureKind::ApprovalAborted,
                        message,
                    );
                });
                let _ = reply.send(result);
            }
            Command::Abort { reply } => {
                self.abort();
                let _ = reply.send(Ok(()));
            }
        }
    }

    fn abort(&mut self) {
        if self.aborted {
            return;
        }
        info!(run_id = %self.id, running = self.running, "Aborting run");
        self.aborted = true;
        self.cancel.cancel();
    }

    // ============================================================================
    // Reporting
    // ============================================================================

    async fn finish(&mut self) {
        self.state = if self.aborted {
            RunState::Cancelled
        } else if self
            .stages
            .iter()
            .all(|s| s.state == StageState::Succeeded || s.best_effort)
        {
            RunState::Succeeded
        } else {
            RunState::Failed
        };

        if self.state == RunState::Succeeded {
            let release = Release {
                run_id: self.id,
                pipeline: self.definition.name.clone(),
                version: self.version.clone(),
                artifacts: self.artifacts.clone(),
            };
            match self.services.publisher.publish(&release).await {
                Ok(record) => self.release = Some(record),
                Err(e) => {
                    error!(run_id = %self.id, "Release publication failed: {}", e);
                    self.release_error = Some(e.to_string());
                    self.state = RunState::Failed;
                }
            }
        }

        self.completed_at = Some(chrono::Utc::now());
        info!(run_id = %self.id, state = %self.state, artifacts = self.artifacts.len(), "Run finished");
        self.publish();
    }

    fn report(&self) -> RunReport {
        RunReport {
            id: self.id,
            pipeline: self.definition.name.clone(),
            version: self.version.clone(),
            state: self.state,
            stages: self.stages.clone(),
            artifacts: self.artifacts.to_vec(),
            gates: self.gates.clone(),
            release: self.release.clone(),
            release_error: self.release_error.clone(),
            created_at: self.created_at,
            completed_at: self.completed_at,
        }
    }

    fn publish(&self) {
        self.snapshot.send_replace(self.report());
    }
}

fn aggregate_failure(error: &AggregateError) -> (FailureKind, String) {
    (error.kind(), error.to_string())
}
