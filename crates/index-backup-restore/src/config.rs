//! Configuration types for index-backup-restore.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Largest page the search service returns for a single query.
pub const MAX_BATCH_SIZE: usize = 1000;

/// Run configuration, loaded once and shared read-only by every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Index being backed up.
    pub source: ServiceConfig,
    /// Index being recreated and restored.
    pub target: ServiceConfig,
    /// Local staging area.
    pub staging: StagingConfig,
    /// Batching and verification options.
    #[serde(default)]
    pub options: RunOptions,
}

/// One side of the copy: a search service and an index on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Search service name (`<service>.search.windows.net`).
    pub service: String,
    /// Index name.
    pub index: String,
    /// Explicit base URL, overriding the one derived from `service`.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Admin API key.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Bearer token, used when no API key is set.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl ServiceConfig {
    /// Base URL of the service.
    #[must_use]
    pub fn base_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.search.windows.net", self.service),
        }
    }
}

/// Staging directory configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingConfig {
    /// Directory holding the schema file and batch files.
    pub directory: PathBuf,
}

/// Batching, concurrency and verification options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOptions {
    /// Documents per staging file.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Maximum concurrent batch exports.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// REST `api-version` parameter.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Post-restore verification.
    #[serde(default)]
    pub verify: VerifyOptions,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            parallelism: default_parallelism(),
            api_version: default_api_version(),
            verify: VerifyOptions::default(),
        }
    }
}

/// Verification timing.
///
/// The target service indexes uploaded documents asynchronously, so counts are
/// compared only after `settle_secs`. With `poll_timeout_secs > 0` the target
/// count is then polled until it matches the source or the timeout elapses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyOptions {
    /// Fixed wait before the first count.
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
    /// Polling budget after the fixed wait (0 disables polling).
    #[serde(default)]
    pub poll_timeout_secs: u64,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            settle_secs: default_settle_secs(),
            poll_timeout_secs: 0,
        }
    }
}

impl VerifyOptions {
    /// Fixed wait as a duration.
    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    /// Polling budget as a duration.
    #[must_use]
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}

fn default_batch_size() -> usize {
    500
}

fn default_parallelism() -> usize {
    5
}

fn default_api_version() -> String {
    "2023-11-01".to_string()
}

fn default_settle_secs() -> u64 {
    10
}

impl RunConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        for (side, svc) in [("source", &self.source), ("target", &self.target)] {
            if svc.service.is_empty() && svc.endpoint.is_none() {
                return Err(Error::Config(format!(
                    "{side} service name cannot be empty"
                )));
            }
            if svc.index.is_empty() {
                return Err(Error::Config(format!("{side} index name cannot be empty")));
            }
        }
        if self.staging.directory.as_os_str().is_empty() {
            return Err(Error::Config(
                "staging directory cannot be empty".to_string(),
            ));
        }
        if self.options.batch_size == 0 || self.options.batch_size > MAX_BATCH_SIZE {
            return Err(Error::Config(format!(
                "batch_size must be between 1 and {MAX_BATCH_SIZE}"
            )));
        }
        if self.options.parallelism == 0 {
            return Err(Error::Config(
                "parallelism must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> RunConfig {
        RunConfig {
            source: ServiceConfig {
                service: "src-svc".to_string(),
                index: "hotels".to_string(),
                endpoint: None,
                api_key: None,
                bearer_token: None,
            },
            target: ServiceConfig {
                service: "dst-svc".to_string(),
                index: "hotels-copy".to_string(),
                endpoint: None,
                api_key: None,
                bearer_token: None,
            },
            staging: StagingConfig {
                directory: PathBuf::from("./backup"),
            },
            options: RunOptions::default(),
        }
    }

    #[test]
    fn test_config_defaults() {
        let options = RunOptions::default();
        assert_eq!(options.batch_size, 500);
        assert_eq!(options.parallelism, 5);
        assert_eq!(options.verify.settle_secs, 10);
        assert_eq!(options.verify.poll_timeout_secs, 0);
    }

    #[test]
    fn test_config_validate_ok() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_config_validate_batch_size() {
        let mut config = test_config();
        config.options.batch_size = 0;
        assert!(config.validate().is_err());

        config.options.batch_size = MAX_BATCH_SIZE + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_parallelism() {
        let mut config = test_config();
        config.options.parallelism = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_config_validate_empty_index() {
        let mut config = test_config();
        config.target.index = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("target index"));
    }

    #[test]
    fn test_base_url() {
        let mut svc = test_config().source;
        assert_eq!(svc.base_url(), "https://src-svc.search.windows.net");

        svc.endpoint = Some("http://127.0.0.1:9000/".to_string());
        assert_eq!(svc.base_url(), "http://127.0.0.1:9000");
    }

    #[test]
    fn test_config_yaml_parse() {
        let yaml = r#"
source:
  service: src-svc
  index: hotels
target:
  service: dst-svc
  index: hotels-copy
  api_key: secret
staging:
  directory: ./backup
options:
  batch_size: 250
  verify:
    poll_timeout_secs: 60
"#;
        let config: RunConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.options.batch_size, 250);
        assert_eq!(config.options.parallelism, 5);
        assert_eq!(config.options.verify.settle_secs, 10);
        assert_eq!(config.options.verify.poll_timeout_secs, 60);
        assert_eq!(config.target.api_key.as_deref(), Some("secret"));
    }
}
