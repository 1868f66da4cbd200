//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod approval;
mod display;
mod init;
mod pipeline;
mod run;

pub use approval::ApprovalCommands;
pub use pipeline::PipelineCommands;
pub use run::RunCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Pipeline definitions: plan and launch
    Pipeline {
        #[command(subcommand)]
        command: PipelineCommands,
    },
    /// Run inspection and control
    Run {
        #[command(subcommand)]
        command: RunCommands,
    },
    /// Approval gates
    Approval {
        #[command(subcommand)]
        command: ApprovalCommands,
    },
    /// Scaffold a sample ferry.toml
    Init {
        /// Directory to write into
        #[arg(short, long, default_value = ".")]
        output: String,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Pipeline { command } => pipeline::handle_pipeline_command(command, config).await,
        Commands::Run { command } => run::handle_run_command(command, config).await,
        Commands::Approval { command } => approval::handle_approval_command(command, config).await,
        Commands::Init { output, force } => init::handle_init_command(&output, force),
    }
}
