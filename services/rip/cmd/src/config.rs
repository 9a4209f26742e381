//! Configuration handling for the RIP simulator.
//!
//! Settings come from an optional YAML file, then environment variables,
//! then command-line flags (applied by `main`).

use anyhow::Result;
use rip_routing::{LinkDownPolicy, MetricMode, TableConfig};
use rip_topology::network::DEFAULT_SETTLE_TIMEOUT;
use rip_topology::NetworkConfig;
use rip_wire::Cost;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Simulator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RipConfig {
    /// Routing table settings shared by every router
    pub table: TableConfig,
    /// How long to wait for the network to go quiet
    pub settle_timeout: Duration,
    /// Seed for the link bring-up order
    pub seed: Option<u64>,
}

impl Default for RipConfig {
    fn default() -> Self {
        Self {
            table: TableConfig::default(),
            settle_timeout: DEFAULT_SETTLE_TIMEOUT,
            seed: None,
        }
    }
}

/// Root configuration structure (matches the YAML structure)
#[derive(Debug, Deserialize)]
struct RootConfig {
    rip: Option<FileConfig>,
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    max_hop_count: Option<Cost>,
    link_cost: Option<Cost>,
    link_down_policy: Option<LinkDownPolicy>,
    metric: Option<MetricMode>,
    settle_timeout: Option<String>,
    seed: Option<u64>,
}

impl RipConfig {
    /// Load configuration from `config_path` (if any) and environment variables
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path {
            match std::fs::read_to_string(path) {
                Ok(content) => match serde_yaml::from_str::<RootConfig>(&content) {
                    Ok(root) => {
                        if let Some(file) = root.rip {
                            config.apply_file_config(file);
                        }
                        info!("Loaded configuration from {:?}", path);
                    }
                    Err(e) => warn!("Failed to parse config file {:?}, using defaults: {}", path, e),
                },
                Err(_) => warn!("Config file {:?} not found, using defaults", path),
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.table.validate()?;

        info!(
            "Final configuration: max_hop_count={}, link_cost={}, link_down_policy={}, metric={}, settle_timeout={:?}",
            config.table.max_hop_count,
            config.table.link_cost,
            config.table.link_down_policy,
            config.table.metric,
            config.settle_timeout
        );
        Ok(config)
    }

    fn apply_file_config(&mut self, file: FileConfig) {
        if let Some(max) = file.max_hop_count {
            self.table.max_hop_count = max;
        }
        if let Some(cost) = file.link_cost {
            self.table.link_cost = cost;
        }
        if let Some(policy) = file.link_down_policy {
            self.table.link_down_policy = policy;
        }
        if let Some(metric) = file.metric {
            self.table.metric = metric;
        }
        if let Some(timeout) = file.settle_timeout {
            match humantime::parse_duration(&timeout) {
                Ok(d) => self.settle_timeout = d,
                Err(e) => warn!("Ignoring settle_timeout '{}': {}", timeout, e),
            }
        }
        if file.seed.is_some() {
            self.seed = file.seed;
        }
    }

    /// Apply `RIP_*` overrides looked up through `lookup`
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("RIP_MAX_HOP_COUNT") {
            match value.parse::<Cost>() {
                Ok(max) => {
                    self.table.max_hop_count = max;
                    info!("Max hop count overridden by environment: {}", max);
                }
                Err(_) => warn!("Ignoring RIP_MAX_HOP_COUNT='{}'", value),
            }
        }

        if let Some(value) = lookup("RIP_LINK_COST") {
            match value.parse::<Cost>() {
                Ok(cost) => {
                    self.table.link_cost = cost;
                    info!("Link cost overridden by environment: {}", cost);
                }
                Err(_) => warn!("Ignoring RIP_LINK_COST='{}'", value),
            }
        }

        if let Some(value) = lookup("RIP_LINK_DOWN_POLICY") {
            match value.parse::<LinkDownPolicy>() {
                Ok(policy) => {
                    self.table.link_down_policy = policy;
                    info!("Link-down policy overridden by environment: {}", policy);
                }
                Err(e) => warn!("Ignoring RIP_LINK_DOWN_POLICY: {}", e),
            }
        }

        if let Some(value) = lookup("RIP_METRIC") {
            match value.parse::<MetricMode>() {
                Ok(metric) => {
                    self.table.metric = metric;
                    info!("Metric overridden by environment: {}", metric);
                }
                Err(e) => warn!("Ignoring RIP_METRIC: {}", e),
            }
        }

        if let Some(value) = lookup("RIP_SETTLE_TIMEOUT") {
            match humantime::parse_duration(&value) {
                Ok(timeout) => {
                    self.settle_timeout = timeout;
                    info!("Settle timeout overridden by environment: {:?}", timeout);
                }
                Err(e) => warn!("Ignoring RIP_SETTLE_TIMEOUT='{}': {}", value, e),
            }
        }
    }

    /// Settings for the simulated network
    pub fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            table: self.table.clone(),
            settle_timeout: self.settle_timeout,
            seed: self.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = RipConfig::default();
        assert_eq!(config.table.max_hop_count, 16);
        assert_eq!(config.table.link_cost, 1);
        assert_eq!(config.table.link_down_policy, LinkDownPolicy::Incremental);
        assert_eq!(config.table.metric, MetricMode::Weighted);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn test_load_from_file() {
        let yaml_content = r#"
rip:
  max_hop_count: 8
  link_down_policy: full_reset
  metric: hop_count
  settle_timeout: 250ms
  seed: 11
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        let mut config = RipConfig::default();
        let root: RootConfig = serde_yaml::from_str(yaml_content).unwrap();
        config.apply_file_config(root.rip.unwrap());

        assert_eq!(config.table.max_hop_count, 8);
        assert_eq!(config.table.link_cost, 1);
        assert_eq!(config.table.link_down_policy, LinkDownPolicy::FullReset);
        assert_eq!(config.table.metric, MetricMode::HopCount);
        assert_eq!(config.settle_timeout, Duration::from_millis(250));
        assert_eq!(config.seed, Some(11));

        // The full loader reads the same file
        let loaded = RipConfig::load(Some(temp_file.path())).unwrap();
        assert_eq!(loaded.table.max_hop_count, 8);
    }

    #[test]
    fn test_unparseable_file_falls_back_to_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"rip: [not, a, map").unwrap();

        let config = RipConfig::load(Some(temp_file.path())).unwrap();
        assert_eq!(config.table, RipConfig::default().table);
    }

    #[test]
    fn test_environment_overrides() {
        let env: HashMap<&str, &str> = [
            ("RIP_MAX_HOP_COUNT", "32"),
            ("RIP_LINK_COST", "two"),
            ("RIP_LINK_DOWN_POLICY", "full-reset"),
            ("RIP_SETTLE_TIMEOUT", "2s"),
        ]
        .into_iter()
        .collect();

        let mut config = RipConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.table.max_hop_count, 32);
        assert_eq!(config.table.link_cost, 1);
        assert_eq!(config.table.link_down_policy, LinkDownPolicy::FullReset);
        assert_eq!(config.table.metric, MetricMode::Weighted);
        assert_eq!(config.settle_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_network_config() {
        let config = RipConfig {
            seed: Some(3),
            ..RipConfig::default()
        };
        let network = config.network_config();
        assert_eq!(network.seed, Some(3));
        assert_eq!(network.table, config.table);
    }
}
