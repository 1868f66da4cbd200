//! Ferry Core
//!
//! Core types for the Ferry release orchestrator.
//!
//! This crate contains:
//! - Domain types: tasks, stages, artifacts, approval gates, run reports
//! - Definitions: the TOML pipeline format and its validation
//! - DTOs: request/response bodies for the orchestrator API

pub mod definition;
pub mod domain;
pub mod dto;
