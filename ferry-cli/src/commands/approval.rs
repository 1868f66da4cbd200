//! Approval command handlers

use anyhow::Result;
use clap::Subcommand;
use colored::*;

use super::display;
use crate::config::Config;
use crate::id_resolver::resolve_run_id;

/// Approval subcommands
#[derive(Subcommand)]
pub enum ApprovalCommands {
    /// List every gate awaiting a decision
    List,
    /// Approve a gated stage
    Approve {
        /// Run ID or unambiguous prefix
        run: String,

        /// Stage name
        stage: String,

        /// Name recorded as the approver
        #[arg(long, env = "FERRY_APPROVER", default_value = "cli")]
        by: String,
    },
    /// Reject a gated stage, failing the run
    Reject {
        /// Run ID or unambiguous prefix
        run: String,

        /// Stage name
        stage: String,

        /// Name recorded as the approver
        #[arg(long, env = "FERRY_APPROVER", default_value = "cli")]
        by: String,

        /// Why the stage was rejected
        #[arg(short, long)]
        reason: Option<String>,
    },
}

/// Handle approval commands
pub async fn handle_approval_command(command: ApprovalCommands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        ApprovalCommands::List => {
            let gates = client.list_approvals().await?;
            if gates.is_empty() {
                println!("{}", "No stages awaiting approval.".yellow());
            } else {
                println!("{}", format!("{} stage(s) awaiting approval:", gates.len()).bold());
                println!();
                for gate in &gates {
                    display::print_gate(gate);
                }
            }
        }
        ApprovalCommands::Approve { run, stage, by } => {
            let id = resolve_run_id(&client, &run).await?;
            client.approve_stage(id, &stage, &by).await?;
            println!(
                "{} Stage {} of run {} approved by {}",
                "✓".green(),
                stage.bold(),
                id.to_string().cyan(),
                by
            );
        }
        ApprovalCommands::Reject {
            run,
            stage,
            by,
            reason,
        } => {
            let id = resolve_run_id(&client, &run).await?;
            client.reject_stage(id, &stage, &by, reason).await?;
            println!(
                "{} Stage {} of run {} rejected by {}",
                "✗".red(),
                stage.bold(),
                id.to_string().cyan(),
                by
            );
        }
    }

    Ok(())
}
