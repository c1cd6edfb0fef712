use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::Deserialize;
use anyhow::{Context, Result};
use shared::protocol::DEFAULT_POLL_INTERVAL_SECS;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Directory holding one `<service>.json` file per service
    pub directory: PathBuf,
    /// Environment every endpoint from this directory is published under
    pub environment: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_db_path() -> PathBuf {
    PathBuf::from("/var/lib/discod/registry.db")
}

fn default_listen() -> String {
    "[::]:8054".to_string()
}

impl SourceConfig {
    /// Poll interval, clamped to at least one second
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        anyhow::ensure!(
            !config.source.environment.is_empty(),
            "source.environment must not be empty"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let config = Config::parse(
            r#"
            [source]
            directory = "/tmp/services"
            environment = "staging"
            "#,
        )
        .unwrap();

        assert_eq!(config.source.directory, PathBuf::from("/tmp/services"));
        assert_eq!(config.source.environment, "staging");
        assert_eq!(config.source.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.registry.db_path, default_db_path());
        assert_eq!(config.api.listen, "[::]:8054");
    }

    #[test]
    fn test_zero_interval_clamped() {
        let config = Config::parse(
            r#"
            [source]
            directory = "/tmp/services"
            environment = "prod"
            poll_interval_secs = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.source.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_missing_source_rejected() {
        assert!(Config::parse("[api]\nlisten = \"127.0.0.1:1\"\n").is_err());
    }

    #[test]
    fn test_empty_environment_rejected() {
        let result = Config::parse(
            r#"
            [source]
            directory = "/tmp/services"
            environment = ""
            "#,
        );
        assert!(result.is_err());
    }
}
