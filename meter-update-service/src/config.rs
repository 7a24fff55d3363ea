use serde::Deserialize;
use std::fs;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub uri: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateConfig {
    /// Upper bound on concurrently in-flight meter fetches.
    #[serde(default = "default_fanout")]
    pub fanout: usize,
    /// Per-fetch timeout; a timed-out fetch counts as a plain fetch failure.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            fanout: default_fanout(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
        }
    }
}

fn default_fanout() -> usize {
    8
}

fn default_fetch_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub update: UpdateConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path =
            env::var("METER_UPDATE_CONFIG").unwrap_or_else(|_| "meter-update.toml".to_string());
        let contents = fs::read_to_string(&path)?;
        let cfg: AppConfig = toml::from_str(&contents)?;
        Ok(cfg)
    }
}
