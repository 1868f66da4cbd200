//! Repository Module
//!
//! Data access layer for the orchestrator.

pub mod run;

pub use run::{DEFAULT_RETENTION, RunRepository};
