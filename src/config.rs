use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Location of the configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "../.config.yaml";

/// Consumer group used when the configuration does not name one.
pub const DEFAULT_CONSUMER_GROUP: &str = "$Default";

/// Process configuration, loaded once at startup and passed to whoever needs it.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ListenConfig {
    /// Connection string for the event hub, including its `EntityPath`.
    #[serde(rename = "connEventHub")]
    pub conn_event_hub: String,

    /// File that receives one offset record per partition on shutdown.
    #[serde(rename = "logPartition")]
    pub log_partition: PathBuf,

    #[serde(rename = "consumerGroup", default = "default_consumer_group")]
    pub consumer_group: String,
}

fn default_consumer_group() -> String {
    DEFAULT_CONSUMER_GROUP.to_string()
}

impl ListenConfig {
    /// Reads and parses the YAML configuration at `path`.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config = Self::from_yaml(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse YAML config")
    }
}
