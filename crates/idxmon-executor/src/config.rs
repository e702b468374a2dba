use crate::error::{ExecutorError, Result};
use crate::graphman::GraphmanExecutor;
use crate::mock::MockExecutor;
use crate::DeploymentExecutor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorMode {
    Graphman,
    Mock,
}

impl fmt::Display for ExecutorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorMode::Graphman => write!(f, "graphman"),
            ExecutorMode::Mock => write!(f, "mock"),
        }
    }
}

impl FromStr for ExecutorMode {
    type Err = ExecutorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "graphman" => Ok(ExecutorMode::Graphman),
            "mock" => Ok(ExecutorMode::Mock),
            _ => Err(ExecutorError::UnknownMode(s.to_string())),
        }
    }
}

/// `[executor]` section of the server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_mode")]
    pub mode: ExecutorMode,
    #[serde(default = "default_container")]
    pub container: String,
    #[serde(default = "default_docker_bin")]
    pub docker_bin: String,
    /// Path of graphman's config file inside the container.
    #[serde(default)]
    pub graphman_config: Option<String>,
    #[serde(default = "default_mock_delay_ms")]
    pub mock_delay_ms: u64,
}

fn default_mode() -> ExecutorMode {
    ExecutorMode::Mock
}

fn default_container() -> String {
    "graph-node".to_string()
}

fn default_docker_bin() -> String {
    "docker".to_string()
}

fn default_mock_delay_ms() -> u64 {
    1500
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            container: default_container(),
            docker_bin: default_docker_bin(),
            graphman_config: None,
            mock_delay_ms: default_mock_delay_ms(),
        }
    }
}

/// Builds the backend selected by `config.mode`.
pub fn build_executor(config: &ExecutorConfig) -> Result<Box<dyn DeploymentExecutor>> {
    match config.mode {
        ExecutorMode::Mock => Ok(Box::new(MockExecutor::with_delay(Duration::from_millis(
            config.mock_delay_ms,
        )))),
        ExecutorMode::Graphman => {
            if config.container.trim().is_empty() {
                return Err(ExecutorError::InvalidConfig(
                    "container must not be empty".to_string(),
                ));
            }
            if config.docker_bin.trim().is_empty() {
                return Err(ExecutorError::InvalidConfig(
                    "docker_bin must not be empty".to_string(),
                ));
            }
            let mut executor = GraphmanExecutor::new(config.container.as_str())
                .with_docker_bin(config.docker_bin.as_str());
            if let Some(path) = &config.graphman_config {
                executor = executor.with_graphman_config(path.as_str());
            }
            tracing::info!(container = %config.container, "Graphman executor configured");
            Ok(Box::new(executor))
        }
    }
}
