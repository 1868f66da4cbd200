//! Pipeline command handlers
//!
//! Planning definitions locally and launching runs on the orchestrator.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use ferry_core::definition::PipelineDefinition;
use ferry_core::dto::pipeline::PipelinePlan;
use ferry_core::dto::run::LaunchRun;
use std::time::Duration;

use super::display;
use crate::config::Config;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Pipeline subcommands
#[derive(Subcommand)]
pub enum PipelineCommands {
    /// Validate a definition and show its stage order and gates
    Plan {
        /// Path to the TOML definition
        file: String,

        /// Validate on the orchestrator instead of locally
        #[arg(long)]
        remote: bool,
    },
    /// Launch a run of a definition
    Launch {
        /// Path to the TOML definition
        file: String,

        /// Version tag to release
        #[arg(short, long)]
        version: String,

        /// Wait for the run to finish and print its report
        #[arg(short, long)]
        wait: bool,
    },
}

/// Handle pipeline commands
pub async fn handle_pipeline_command(command: PipelineCommands, config: &Config) -> Result<()> {
    match command {
        PipelineCommands::Plan { file, remote } => plan_pipeline(config, &file, remote).await,
        PipelineCommands::Launch {
            file,
            version,
            wait,
        } => launch_pipeline(config, &file, version, wait).await,
    }
}

fn read_definition(path: &str) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read definition file: {}", path))
}

async fn plan_pipeline(config: &Config, path: &str, remote: bool) -> Result<()> {
    let plan = if remote {
        let source = read_definition(path)?;
        config.client().validate_pipeline(source).await?
    } else {
        let definition = PipelineDefinition::from_file(path)
            .with_context(|| format!("Invalid pipeline definition: {}", path))?;
        let order = definition.plan()?;
        PipelinePlan::new(&definition, &order)
    };

    print_plan(&plan);
    Ok(())
}

fn print_plan(plan: &PipelinePlan) {
    println!("{}", "✓ Definition is valid".green().bold());
    println!("  Pipeline: {}", plan.pipeline.bold());
    println!();
    println!("{}", "Execution order:".bold());

    for (i, stage) in plan.stages.iter().enumerate() {
        println!("  {}. {}", i + 1, stage.name.bold());
        if !stage.depends_on.is_empty() {
            println!("     after:     {}", stage.depends_on.join(", ").dimmed());
        }
        println!("     tasks:     {}", stage.tasks.join(", "));
        if let Some(message) = &stage.approval {
            println!("     {}  {}", "approval:".yellow(), message);
        }
        if stage.best_effort {
            println!("     {}", "best effort".dimmed());
        }
        if stage.collects_artifacts {
            println!("     {}", "collects artifacts".dimmed());
        }
    }
}

async fn launch_pipeline(config: &Config, path: &str, version: String, wait: bool) -> Result<()> {
    let client = config.client();
    let definition = read_definition(path)?;

    let launched = client.launch_run(LaunchRun { definition, version }).await?;

    println!("{}", "✓ Run launched!".green().bold());
    println!("  ID:       {}", launched.id.to_string().cyan());
    println!("  Pipeline: {}", launched.pipeline.bold());
    println!("  Version:  {}", launched.version);

    if !wait {
        println!();
        println!(
            "Use {} to follow it",
            format!("ferry run get {}", launched.id).cyan()
        );
        return Ok(());
    }

    println!();
    let mut announced = Vec::new();
    let report = loop {
        let report = client.get_run(launched.id).await?;
        if report.state.is_finished() {
            break report;
        }

        for gate in report.pending_gates() {
            if !announced.contains(&gate.stage) {
                println!(
                    "{} stage {} awaits approval: {}",
                    "⏸".yellow(),
                    gate.stage.bold(),
                    gate.message
                );
                announced.push(gate.stage.clone());
            }
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    };

    display::print_report(&report);
    Ok(())
}
