//! Execution service
//!
//! Runs one task as a child process:
//! - Renders the command, environment and output templates
//! - Spawns the program with an explicit environment only
//! - Streams stdout/stderr into the task's log
//! - Enforces the timeout and reacts to cancellation
//!
//! Every outcome, including the ones where no process ever started, is
//! reported as a [`TaskResult`]. Nothing is retried.

use async_trait::async_trait;
use ferry_core::definition::render;
use ferry_core::domain::task::{TaskResult, TaskSpec, TaskStatus};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::TaskContext;
use crate::execution::ExecutionEnv;

/// Service trait for executing a single task
#[async_trait]
pub trait ExecutionService: Send + Sync {
    /// Runs the task to completion, timeout or cancellation
    async fn run(&self, task: &TaskSpec, env: &ExecutionEnv, cancel: CancellationToken)
    -> TaskResult;
}

/// Executes tasks as local child processes
pub struct ProcessExecutionService {
    kill_grace: Duration,
}

impl ProcessExecutionService {
    pub fn new(kill_grace: Duration) -> Self {
        Self { kill_grace }
    }
}

impl Default for ProcessExecutionService {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

/// A task with every template rendered
struct PreparedCommand {
    args: Vec<String>,
    workdir: PathBuf,
    env: BTreeMap<String, String>,
    output: Option<PathBuf>,
    companions: Vec<PathBuf>,
}

enum Waited {
    Exited(ExitStatus),
    WaitFailed(std::io::Error),
    TimedOut,
    Cancelled,
}

/// Collects what is needed to build a [`TaskResult`] at the end
struct Outcome {
    status: TaskStatus,
    exit_code: Option<i32>,
    error_message: Option<String>,
    outputs: Vec<PathBuf>,
    companions: Vec<PathBuf>,
}

impl Outcome {
    fn failed(status: TaskStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            exit_code: None,
            error_message: Some(message.into()),
            outputs: Vec::new(),
            companions: Vec::new(),
        }
    }
}

fn prepare(task: &TaskSpec, env: &ExecutionEnv) -> Result<PreparedCommand, String> {
    let vars = env.vars(&task.name, &task.target);
    let render_one = |template: &String| {
        render(template, &vars).map_err(|e| format!("invalid template '{}': {}", template, e))
    };

    let workdir = match &task.workdir {
        Some(dir) => env.workspace.join(dir),
        None => env.workspace.clone(),
    };
    if !workdir.is_dir() {
        return Err(format!(
            "working directory {} does not exist",
            workdir.display()
        ));
    }

    for name in &task.secrets {
        if env.secrets.get(name).is_none() {
            return Err(format!(
                "secret '{}' is not defined for stage '{}'",
                name, env.stage
            ));
        }
    }

    let args: Vec<String> = task.args.iter().map(render_one).collect::<Result<_, _>>()?;

    let mut task_env = BTreeMap::new();
    for (key, value) in &task.env {
        task_env.insert(key.clone(), render_one(value)?);
    }

    let output = task
        .output
        .as_ref()
        .map(render_one)
        .transpose()?
        .map(|path| workdir.join(path));

    let companions: Vec<PathBuf> = task
        .companions
        .iter()
        .map(|c| render_one(c).map(|path| workdir.join(path)))
        .collect::<Result<_, _>>()?;

    Ok(PreparedCommand {
        args,
        workdir,
        env: task_env,
        output,
        companions,
    })
}

fn spawn_reader<R>(stream: Option<R>, ctx: Arc<TaskContext>, stderr: bool) -> Option<JoinHandle<()>>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    stream.map(|stream| {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stream).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if stderr {
                    ctx.stderr_line(&line);
                } else {
                    ctx.stdout_line(&line);
                }
            }
        })
    })
}

#[cfg(unix)]
fn signal_of(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn signal_of(_status: &ExitStatus) -> Option<i32> {
    None
}

impl ProcessExecutionService {
    /// Waits for the output readers, detaching any still open after the grace period
    async fn drain_readers(&self, ctx: &TaskContext, readers: Vec<JoinHandle<()>>) {
        for mut reader in readers {
            if timeout(self.kill_grace, &mut reader).await.is_err() {
                reader.abort();
                ctx.log_warning("output stream still open after the process exited; detached");
            }
        }
    }

    fn exited(&self, ctx: &TaskContext, prepared: PreparedCommand, status: ExitStatus) -> Outcome {
        if status.success() {
            let outputs = match prepared.output {
                Some(path) if !path.is_file() => {
                    return Outcome::failed(
                        TaskStatus::Faulted,
                        format!("declared output {} was not produced", path.display()),
                    );
                }
                Some(path) => vec![path],
                None => Vec::new(),
            };

            let mut companions = Vec::new();
            for path in prepared.companions {
                if path.is_file() {
                    companions.push(path);
                } else {
                    ctx.log_warning(&format!("companion file {} not found", path.display()));
                }
            }

            return Outcome {
                status: TaskStatus::Succeeded,
                exit_code: Some(0),
                error_message: None,
                outputs,
                companions,
            };
        }

        match status.code() {
            Some(code) => Outcome {
                exit_code: Some(code),
                ..Outcome::failed(TaskStatus::Failed, format!("exited with status {}", code))
            },
            None => {
                let message = match signal_of(&status) {
                    Some(signal) => format!("terminated by signal {}", signal),
                    None => "terminated without an exit code".to_string(),
                };
                Outcome::failed(TaskStatus::Faulted, message)
            }
        }
    }

    async fn execute(
        &self,
        task: &TaskSpec,
        env: &ExecutionEnv,
        ctx: &Arc<TaskContext>,
        cancel: CancellationToken,
    ) -> Outcome {
        let prepared = match prepare(task, env) {
            Ok(prepared) => prepared,
            Err(message) => return Outcome::failed(TaskStatus::Faulted, message),
        };

        if cancel.is_cancelled() {
            return Outcome::failed(TaskStatus::Cancelled, "cancelled before start");
        }

        let secrets = task
            .secrets
            .iter()
            .filter_map(|name| env.secrets.get(name).map(|v| (name.as_str(), v.expose())));

        let mut command = Command::new(&task.program);
        command
            .args(&prepared.args)
            .current_dir(&prepared.workdir)
            .env_clear()
            .envs(&env.inherited)
            .envs(&prepared.env)
            .envs(secrets)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        ctx.log_info(&format!(
            "running {} {}",
            task.program,
            prepared.args.join(" ")
        ));

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Outcome::failed(
                    TaskStatus::Faulted,
                    format!("program '{}' not found", task.program),
                );
            }
            Err(e) => {
                return Outcome::failed(
                    TaskStatus::Faulted,
                    format!("failed to spawn '{}': {}", task.program, e),
                );
            }
        };

        debug!(task = %task.name, pid = ?child.id(), "process spawned");

        let readers: Vec<_> = [
            spawn_reader(child.stdout.take(), ctx.clone(), false),
            spawn_reader(child.stderr.take(), ctx.clone(), true),
        ]
        .into_iter()
        .flatten()
        .collect();

        let limit = task
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(env.default_timeout);

        let waited = tokio::select! {
            biased;

            () = cancel.cancelled() => Waited::Cancelled,
            result = timeout(limit, child.wait()) => match result {
                Ok(Ok(status)) => Waited::Exited(status),
                Ok(Err(e)) => Waited::WaitFailed(e),
                Err(_) => Waited::TimedOut,
            },
        };

        if matches!(waited, Waited::Cancelled | Waited::TimedOut) {
            if let Err(e) = child.kill().await {
                warn!(task = %task.name, "failed to kill process: {}", e);
            }
        }

        self.drain_readers(ctx, readers).await;

        match waited {
            Waited::Exited(status) => self.exited(ctx, prepared, status),
            Waited::WaitFailed(e) => {
                Outcome::failed(TaskStatus::Faulted, format!("failed to wait for process: {}", e))
            }
            Waited::TimedOut => Outcome::failed(
                TaskStatus::TimedOut,
                format!("timed out after {}s", limit.as_secs_f64()),
            ),
            Waited::Cancelled => Outcome::failed(TaskStatus::Cancelled, "cancelled"),
        }
    }
}

#[async_trait]
impl ExecutionService for ProcessExecutionService {
    async fn run(
        &self,
        task: &TaskSpec,
        env: &ExecutionEnv,
        cancel: CancellationToken,
    ) -> TaskResult {
        let started_at = chrono::Utc::now();
        let ctx = TaskContext::new(&task.name, env.secrets.clone(), env.logs.clone());

        info!(task = %task.name, target = %task.target, stage = %env.stage, "Starting task");

        let outcome = self.execute(task, env, &ctx, cancel).await;

        match (&outcome.status, &outcome.error_message) {
            (TaskStatus::Succeeded, _) => ctx.log_info("task succeeded"),
            (status, Some(message)) => ctx.log_error(&format!("{}: {}", status, message)),
            (status, None) => ctx.log_error(&status.to_string()),
        }

        info!(task = %task.name, status = %outcome.status, "Task finished");

        TaskResult {
            task: task.name.clone(),
            target: task.target.clone(),
            status: outcome.status,
            exit_code: outcome.exit_code,
            error_message: outcome.error_message,
            outputs: outcome.outputs,
            companions: outcome.companions,
            log: ctx.entries(),
            started_at,
            completed_at: chrono::Utc::now(),
        }
    }
}
