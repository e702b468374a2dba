use idxmon_executor::config::ExecutorConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
    #[serde(default)]
    pub channels: Vec<ChannelDefinition>,
    #[serde(default)]
    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Seconds between evaluation ticks
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// JSON file holding `{ "allocations": [...], "network": {...} }`
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
    #[serde(default = "default_network_cache_ttl_secs")]
    pub network_cache_ttl_secs: u64,
    /// Per-channel delivery limit; unset means no limit
    #[serde(default)]
    pub dispatch_timeout_secs: Option<u64>,
    /// Snowflake machine / node ids for notification ids
    #[serde(default = "default_id_part")]
    pub machine_id: i32,
    #[serde(default = "default_id_part")]
    pub node_id: i32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            snapshot_path: default_snapshot_path(),
            network_cache_ttl_secs: default_network_cache_ttl_secs(),
            dispatch_timeout_secs: None,
            machine_id: default_id_part(),
            node_id: default_id_part(),
        }
    }
}

/// One `[[rules]]` entry. `config` is specific to `rule_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub id: String,
    pub name: String,
    pub rule_type: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_severity")]
    pub severity: String,
    #[serde(default = "default_config")]
    pub config: serde_json::Value,
}

/// One `[[channels]]` entry. `config` is specific to `channel_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelDefinition {
    pub id: String,
    pub name: String,
    pub channel_type: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_severity")]
    pub min_severity: String,
    #[serde(default = "default_config")]
    pub config: serde_json::Value,
}

fn default_tick_secs() -> u64 {
    60
}

fn default_snapshot_path() -> String {
    "data/snapshot.json".to_string()
}

fn default_network_cache_ttl_secs() -> u64 {
    60
}

fn default_id_part() -> i32 {
    1
}

fn default_enabled() -> bool {
    true
}

fn default_severity() -> String {
    "info".to_string()
}

fn default_config() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path, e))?;
        Self::parse(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path, e))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        if config.monitor.tick_secs == 0 {
            anyhow::bail!("monitor.tick_secs must be greater than zero");
        }
        for (label, part) in [
            ("machine_id", config.monitor.machine_id),
            ("node_id", config.monitor.node_id),
        ] {
            if !(0..=31).contains(&part) {
                anyhow::bail!("monitor.{label} must be in 0..=31, got {part}");
            }
        }
        Ok(config)
    }
}
