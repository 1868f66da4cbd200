//! Core domain types
//!
//! The entities shared between the engine (which produces them) and the
//! orchestrator, client and CLI (which report on them).

pub mod approval;
pub mod artifact;
pub mod log;
pub mod run;
pub mod secret;
pub mod stage;
pub mod task;
