//! Orchestrator configuration
//!
//! Server settings plus the engine's [`RunnerConfig`], all read from the
//! environment.

use anyhow::Context;
use ferry_runner::RunnerConfig;
use ferry_runner::service::SecretStore;
use std::path::PathBuf;
use std::time::Duration;

use crate::repository::DEFAULT_RETENTION;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Address the HTTP API listens on
    pub bind_addr: String,

    /// TOML file with one table per secret scope
    pub secrets_file: Option<PathBuf>,

    /// How long finished runs stay queryable
    pub run_retention: Duration,

    pub runner: RunnerConfig,
}

impl OrchestratorConfig {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - ORCHESTRATOR_BIND_ADDR (optional, default: 0.0.0.0:8080)
    /// - FERRY_SECRETS_FILE (optional)
    /// - FERRY_RUN_RETENTION (optional, seconds, default: 86400)
    /// - every variable read by [`RunnerConfig::from_env`]
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr = std::env::var("ORCHESTRATOR_BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let secrets_file = std::env::var_os("FERRY_SECRETS_FILE").map(PathBuf::from);
        let run_retention = match std::env::var("FERRY_RUN_RETENTION") {
            Ok(value) => Duration::from_secs(
                value
                    .parse()
                    .context("FERRY_RUN_RETENTION must be a number of seconds")?,
            ),
            Err(_) => DEFAULT_RETENTION,
        };
        let runner = RunnerConfig::from_env().context("Invalid engine configuration")?;

        Ok(Self {
            bind_addr,
            secrets_file,
            run_retention,
            runner,
        })
    }

    /// Loads the secret store: the secrets file if configured, then
    /// `FERRY_SECRET__<SCOPE>__<NAME>` overrides
    pub fn load_secrets(&self) -> anyhow::Result<SecretStore> {
        let store = match &self.secrets_file {
            Some(path) => SecretStore::from_file(path)
                .with_context(|| format!("Failed to load secrets from {}", path.display()))?,
            None => SecretStore::new(),
        };
        Ok(store.with_env_overrides())
    }
}
