//! Terminal rendering shared by the command handlers

use colored::*;
use ferry_core::domain::approval::{ApprovalGate, ApprovalResolution};
use ferry_core::domain::artifact::Artifact;
use ferry_core::domain::log::{LogEntry, LogLevel, LogStream};
use ferry_core::domain::run::{RunReport, RunState, StageReport};
use ferry_core::domain::stage::StageState;
use ferry_core::domain::task::{TaskResult, TaskStatus};
use ferry_core::dto::run::RunSummary;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn run_state(state: RunState) -> ColoredString {
    let text = state.to_string();
    match state {
        RunState::Running => text.cyan(),
        RunState::Succeeded => text.green(),
        RunState::Failed => text.red(),
        RunState::Cancelled => text.dimmed(),
    }
}

fn stage_state(state: StageState) -> ColoredString {
    let text = state.to_string();
    match state {
        StageState::Pending | StageState::Ready => text.dimmed(),
        StageState::AwaitingApproval => text.yellow().bold(),
        StageState::Approved | StageState::Running => text.cyan(),
        StageState::Succeeded => text.green(),
        StageState::Failed | StageState::Aborted => text.red(),
        StageState::Cancelled | StageState::Blocked => text.yellow(),
    }
}

fn task_status(status: TaskStatus) -> ColoredString {
    let text = status.to_string();
    match status {
        TaskStatus::Succeeded => text.green(),
        TaskStatus::Cancelled => text.dimmed(),
        _ => text.red(),
    }
}

pub fn print_run_summary(run: &RunSummary) {
    println!("  {} Run {}", "▸".cyan(), run.id.to_string().dimmed());
    println!("    Pipeline: {} {}", run.pipeline.bold(), run.version);
    println!("    State:    {}", run_state(run.state));
    println!(
        "    Stages:   {}/{} succeeded, {} artifact(s)",
        run.stages_succeeded, run.stages_total, run.artifacts
    );
    if !run.awaiting_approval.is_empty() {
        println!(
            "    Awaiting: {}",
            run.awaiting_approval.join(", ").yellow()
        );
    }
    println!(
        "    Created:  {}",
        run.created_at.format(TIME_FORMAT).to_string().dimmed()
    );
    println!();
}

pub fn print_report(report: &RunReport) {
    println!("{}", "Run Details:".bold());
    println!("  ID:        {}", report.id.to_string().cyan());
    println!("  Pipeline:  {}", report.pipeline);
    println!("  Version:   {}", report.version.bold());
    println!("  State:     {}", run_state(report.state));
    println!("  Created:   {}", report.created_at.format(TIME_FORMAT));
    if let Some(completed) = report.completed_at {
        println!("  Completed: {}", completed.format(TIME_FORMAT));
        let seconds = completed.signed_duration_since(report.created_at).num_seconds();
        println!("  Duration:  {}s", seconds);
    }

    println!("\n{}", "Stages:".bold());
    for stage in &report.stages {
        print_stage(stage);
    }

    if !report.gates.is_empty() {
        println!("\n{}", "Approval gates:".bold());
        for gate in &report.gates {
            print_gate(gate);
        }
    }

    if !report.artifacts.is_empty() {
        println!("\n{}", "Artifacts:".bold());
        for artifact in &report.artifacts {
            print_artifact(artifact);
        }
    }

    if let Some(release) = &report.release {
        println!("\n{}", "Release:".bold());
        println!(
            "  {} {} published with {} artifact(s)",
            "✓".green(),
            release.version.bold(),
            release.artifact_count
        );
        println!("  Manifest: {}", release.manifest.display());
    }
    if let Some(error) = &report.release_error {
        println!("\n{}", "Release failed:".bold());
        println!("  {}", error.red());
    }
}

fn print_stage(stage: &StageReport) {
    let marker = if stage.best_effort { " (best effort)" } else { "" };
    println!(
        "  {} {}{} [{}]",
        "▸".cyan(),
        stage.name.bold(),
        marker.dimmed(),
        stage_state(stage.state)
    );

    if let Some(kind) = stage.failure {
        let message = stage.message.as_deref().unwrap_or_default();
        println!("    {} {}", kind.to_string().red(), message);
    }

    for task in &stage.tasks {
        print_task(task);
    }
}

fn print_task(task: &TaskResult) {
    let exit = task
        .exit_code
        .map(|c| format!(" exit {}", c))
        .unwrap_or_default();
    println!(
        "    - {} ({}) {}{} in {}s",
        task.task,
        task.target.dimmed(),
        task_status(task.status),
        exit.dimmed(),
        task.duration().num_seconds()
    );
    if let Some(error) = &task.error_message {
        println!("      {}", error.red());
    }
}

pub fn print_gate(gate: &ApprovalGate) {
    let status = match &gate.resolution {
        None => "awaiting approval".yellow().to_string(),
        Some(ApprovalResolution::Approved { by, at }) => {
            format!("{} by {} at {}", "approved".green(), by, at.format(TIME_FORMAT))
        }
        Some(ApprovalResolution::Rejected { by, reason, at }) => {
            let reason = reason.as_deref().map(|r| format!(": {}", r)).unwrap_or_default();
            format!("{} by {} at {}{}", "rejected".red(), by, at.format(TIME_FORMAT), reason)
        }
    };
    println!("  {} {} - {}", "▸".cyan(), gate.stage.bold(), gate.message);
    println!("    Run:       {}", gate.run_id.to_string().dimmed());
    println!("    Requested: {}", gate.requested_at.format(TIME_FORMAT));
    println!("    Status:    {}", status);
}

pub fn print_artifact(artifact: &Artifact) {
    println!(
        "  {} {} ({} from {}/{})",
        "▸".cyan(),
        artifact.target.bold(),
        artifact.version,
        artifact.stage,
        artifact.task
    );
    println!("    Binary:  {}", artifact.binary.display());
    println!("    SHA-256: {}", artifact.sha256.dimmed());
    for companion in &artifact.companions {
        println!("    + {}", companion.display().to_string().dimmed());
    }
}

pub fn print_log_entry(entry: &LogEntry) {
    let level = format!("{:?}", entry.level).to_uppercase();
    let level = match entry.level {
        LogLevel::Debug => level.dimmed(),
        LogLevel::Info => level.cyan(),
        LogLevel::Warning => level.yellow(),
        LogLevel::Error => level.red(),
    };
    let stream = match entry.stream {
        LogStream::Stdout => "out",
        LogStream::Stderr => "err",
        LogStream::System => "sys",
    };

    println!(
        "{} [{}] {} {}",
        entry.timestamp.format("%H:%M:%S").to_string().dimmed(),
        level,
        stream.dimmed(),
        entry.message
    );
}
