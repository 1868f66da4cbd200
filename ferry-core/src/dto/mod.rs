//! Data Transfer Objects for the orchestrator API
//!
//! Request and response bodies exchanged between the orchestrator and its
//! clients. Reports and gates are sent as their domain types.

pub mod approval;
pub mod log;
pub mod pipeline;
pub mod run;
