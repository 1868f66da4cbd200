//! Ferry Runner
//!
//! The release engine: runs a pipeline definition for one version tag.
//!
//! Architecture:
//! - Configuration: engine settings from environment or defaults
//! - Execution: the environment a task sees and the context it logs through
//! - Services: process execution, log buffering, artifact storage and
//!   aggregation, release publication, secrets
//! - Scheduler: fan-out of a stage's tasks on a bounded worker pool
//! - Pipeline: the per-run stage state machine with approval gates
//!
//! A host (the orchestrator, or a test) builds a [`PipelineEngine`], launches
//! runs and controls them through their [`PipelineHandle`].

pub mod config;
pub mod context;
pub mod execution;
pub mod pipeline;
pub mod scheduler;
pub mod service;

pub use config::RunnerConfig;
pub use pipeline::{PipelineEngine, PipelineError, PipelineHandle};
