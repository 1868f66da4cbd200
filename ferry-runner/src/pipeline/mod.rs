//! Stage pipeline
//!
//! A run is driven by a single task per run (the driver) that owns every
//! piece of mutable run state: stage states, gates and the artifact set. It
//! reacts to three kinds of events:
//! - a stage's fan-out finished
//! - an operator command (approve, reject, abort) arrived through a handle
//! - the run's cancellation token fired
//!
//! After each event it advances every stage it can and publishes a fresh
//! [`RunReport`](ferry_core::domain::run::RunReport) snapshot on a watch
//! channel. Approval gates are plain state: a stage awaiting approval holds
//! no worker slot and no task.

mod driver;
mod engine;
mod handle;

pub use engine::PipelineEngine;
pub use handle::PipelineHandle;

use ferry_core::definition::DefinitionError;
use ferry_core::domain::stage::StageState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("version tag must not be empty")]
    EmptyVersion,

    #[error("unknown stage '{0}'")]
    UnknownStage(String),

    #[error("stage '{stage}' is not awaiting approval (state: {state})")]
    NotAwaitingApproval { stage: String, state: StageState },

    #[error("run has already finished")]
    RunFinished,
}
