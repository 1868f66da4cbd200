//! Run command handlers
//!
//! Listing, inspecting and aborting runs, and reading task logs and
//! artifacts.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use ferry_client::OrchestratorClient;

use super::display;
use crate::config::Config;
use crate::id_resolver::resolve_run_id;

/// Run subcommands
#[derive(Subcommand)]
pub enum RunCommands {
    /// List all runs
    List,
    /// Get a run's full report
    Get {
        /// Run ID or unambiguous prefix
        id: String,
    },
    /// Show the captured log of a task
    Logs {
        /// Run ID or unambiguous prefix
        id: String,

        /// Task name
        task: String,
    },
    /// List the artifacts of a run
    Artifacts {
        /// Run ID or unambiguous prefix
        id: String,
    },
    /// Cancel a run
    Abort {
        /// Run ID or unambiguous prefix
        id: String,
    },
}

/// Handle run commands
pub async fn handle_run_command(command: RunCommands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        RunCommands::List => list_runs(&client).await,
        RunCommands::Get { id } => get_run(&client, &id).await,
        RunCommands::Logs { id, task } => get_logs(&client, &id, &task).await,
        RunCommands::Artifacts { id } => list_artifacts(&client, &id).await,
        RunCommands::Abort { id } => abort_run(&client, &id).await,
    }
}

async fn list_runs(client: &OrchestratorClient) -> Result<()> {
    let runs = client.list_runs().await?;

    if runs.is_empty() {
        println!("{}", "No runs found.".yellow());
    } else {
        println!("{}", format!("Found {} run(s):", runs.len()).bold());
        println!();
        for run in &runs {
            display::print_run_summary(run);
        }
    }

    Ok(())
}

async fn get_run(client: &OrchestratorClient, id: &str) -> Result<()> {
    let id = resolve_run_id(client, id).await?;
    let report = client.get_run(id).await?;

    display::print_report(&report);
    Ok(())
}

async fn get_logs(client: &OrchestratorClient, id: &str, task: &str) -> Result<()> {
    let id = resolve_run_id(client, id).await?;
    let logs = match client.get_task_logs(id, task).await {
        Ok(logs) => logs,
        Err(e) if e.is_not_found() => {
            println!("{} Run {} has no task named {}", "•".yellow(), id.to_string().cyan(), task.bold());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if logs.entries.is_empty() {
        println!("{}", "No log lines captured for this task.".yellow());
    } else {
        println!("{}", format!("Logs for task {} in run {}:", task, id).bold());
        println!("{}", "─".repeat(80).dimmed());
        for entry in &logs.entries {
            display::print_log_entry(entry);
        }
        println!("{}", "─".repeat(80).dimmed());
    }

    Ok(())
}

async fn list_artifacts(client: &OrchestratorClient, id: &str) -> Result<()> {
    let id = resolve_run_id(client, id).await?;
    let artifacts = client.get_artifacts(id).await?;

    if artifacts.is_empty() {
        println!("{}", "No artifacts registered for this run.".yellow());
    } else {
        println!("{}", format!("{} artifact(s):", artifacts.len()).bold());
        for artifact in &artifacts {
            display::print_artifact(artifact);
        }
    }

    Ok(())
}

async fn abort_run(client: &OrchestratorClient, id: &str) -> Result<()> {
    let id = resolve_run_id(client, id).await?;

    match client.abort_run(id).await {
        Ok(()) => println!("{} Abort requested for run {}", "✓".green(), id.to_string().cyan()),
        Err(e) if e.is_conflict() => {
            println!("{} Run {} has already finished", "•".yellow(), id.to_string().cyan())
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
