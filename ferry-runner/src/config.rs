//! Runner configuration
//!
//! Defines the engine's tunables: worker pool size, task timeout, artifact
//! location and which host variables a task may inherit.

use std::path::PathBuf;
use std::time::Duration;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Worker slots shared by every task the engine runs
    pub max_parallel_tasks: usize,

    /// Wall-clock limit for a task that does not set its own
    pub task_timeout: Duration,

    /// How long to wait for a killed task's output streams to close
    pub kill_grace: Duration,

    /// Root of the per-run artifact directories
    pub artifact_dir: PathBuf,

    /// Host environment variables passed through to tasks
    pub inherit_env: Vec<String>,

    /// Log lines kept per task; older lines are dropped first
    pub max_log_lines: usize,
}

impl RunnerConfig {
    /// Creates a new configuration with defaults
    pub fn new(artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            max_parallel_tasks: 4,
            task_timeout: Duration::from_secs(3600),
            kill_grace: Duration::from_secs(5),
            artifact_dir: artifact_dir.into(),
            inherit_env: vec!["PATH".to_string(), "HOME".to_string()],
            max_log_lines: 10_000,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - FERRY_MAX_PARALLEL_TASKS (optional, default: 4)
    /// - FERRY_TASK_TIMEOUT (optional, seconds, default: 3600)
    /// - FERRY_KILL_GRACE (optional, seconds, default: 5)
    /// - FERRY_ARTIFACT_DIR (optional, default: ./ferry-artifacts)
    /// - FERRY_INHERIT_ENV (optional, comma separated, default: PATH,HOME)
    /// - FERRY_MAX_LOG_LINES (optional, default: 10000)
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("FERRY_MAX_PARALLEL_TASKS") {
            config.max_parallel_tasks = value
                .parse()
                .map_err(|_| anyhow::anyhow!("FERRY_MAX_PARALLEL_TASKS must be a number"))?;
        }

        if let Ok(value) = std::env::var("FERRY_TASK_TIMEOUT") {
            let secs: u64 = value
                .parse()
                .map_err(|_| anyhow::anyhow!("FERRY_TASK_TIMEOUT must be a number of seconds"))?;
            config.task_timeout = Duration::from_secs(secs);
        }

        if let Ok(value) = std::env::var("FERRY_KILL_GRACE") {
            let secs: u64 = value
                .parse()
                .map_err(|_| anyhow::anyhow!("FERRY_KILL_GRACE must be a number of seconds"))?;
            config.kill_grace = Duration::from_secs(secs);
        }

        if let Ok(value) = std::env::var("FERRY_ARTIFACT_DIR") {
            config.artifact_dir = PathBuf::from(value);
        }

        if let Ok(value) = std::env::var("FERRY_INHERIT_ENV") {
            config.inherit_env = parse_var_list(&value);
        }

        if let Ok(value) = std::env::var("FERRY_MAX_LOG_LINES") {
            config.max_log_lines = value
                .parse()
                .map_err(|_| anyhow::anyhow!("FERRY_MAX_LOG_LINES must be a number"))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_parallel_tasks == 0 {
            anyhow::bail!("max_parallel_tasks must be greater than 0");
        }

        if self.task_timeout.is_zero() {
            anyhow::bail!("task_timeout must be greater than 0");
        }

        if self.max_log_lines == 0 {
            anyhow::bail!("max_log_lines must be greater than 0");
        }

        if self.artifact_dir.as_os_str().is_empty() {
            anyhow::bail!("artifact_dir cannot be empty");
        }

        if let Some(bad) = self.inherit_env.iter().find(|v| v.is_empty() || v.contains('=')) {
            anyhow::bail!("invalid inherited variable name '{}'", bad);
        }

        Ok(())
    }

    /// Worker pool size in semaphore permits
    pub fn pool_size(&self) -> u32 {
        u32::try_from(self.max_parallel_tasks).unwrap_or(u32::MAX)
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::new("./ferry-artifacts")
    }
}

fn parse_var_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RunnerConfig::default();
        assert_eq!(config.max_parallel_tasks, 4);
        assert_eq!(config.task_timeout, Duration::from_secs(3600));
        assert_eq!(config.kill_grace, Duration::from_secs(5));
        assert_eq!(config.inherit_env, vec!["PATH", "HOME"]);
        assert_eq!(config.max_log_lines, 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = RunnerConfig::default();
        assert!(config.validate().is_ok());

        config.max_parallel_tasks = 0;
        assert!(config.validate().is_err());
        config.max_parallel_tasks = 2;

        config.task_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
        config.task_timeout = Duration::from_secs(10);

        config.max_log_lines = 0;
        assert!(config.validate().is_err());
        config.max_log_lines = 100;

        config.inherit_env.push("BAD=NAME".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_var_list() {
        assert_eq!(
            parse_var_list(" PATH, HOME ,,CARGO_HOME"),
            vec!["PATH", "HOME", "CARGO_HOME"]
        );
        assert!(parse_var_list("").is_empty());
    }
}
