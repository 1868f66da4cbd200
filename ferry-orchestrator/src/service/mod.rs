//! Service Module
//!
//! Business logic layer for the orchestrator.
//! Services sit between the HTTP handlers, the run repository and the engine.

pub mod approval;
pub mod pipeline;
pub mod run;

// Re-export for convenience
pub use approval as approval_service;
pub use pipeline as pipeline_service;
pub use run as run_service;
