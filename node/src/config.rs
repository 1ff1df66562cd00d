//! Pool configuration with TOML file support.

use serde::{Deserialize, Serialize};
use sidepool_types::{Difficulty, NetworkId, SidechainParams};

use crate::NodeError;

/// Configuration for a pool node.
///
/// Can be loaded from a TOML file via [`PoolConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Consensus fields default to the
/// selected network's parameters; overriding any of them produces a
/// different consensus id, i.e. a private sidechain.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Which sidechain network to participate in.
    #[serde(default = "default_network")]
    pub network: NetworkId,

    /// Override the sidechain target block time in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_block_time: Option<u64>,

    /// Override the minimum difficulty (raw integer).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_difficulty: Option<u64>,

    /// Override the PPLNS window length in blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<u64>,

    /// Override the uncle penalty percentage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncle_penalty_percent: Option<u64>,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_network() -> NetworkId {
    NetworkId::Main
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            target_block_time: None,
            min_difficulty: None,
            window: None,
            uncle_penalty_percent: None,
            log_level: default_log_level(),
        }
    }
}

impl PoolConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        let config: Self = toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a pretty TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("PoolConfig is always serializable to TOML")
    }

    /// Reject configurations the consensus engine cannot run with.
    pub fn validate(&self) -> Result<(), NodeError> {
        if let Some(t) = self.target_block_time {
            if t == 0 {
                return Err(NodeError::Config("target_block_time must be > 0".into()));
            }
        }
        if let Some(w) = self.window {
            if w < 2 {
                return Err(NodeError::Config("window must be at least 2".into()));
            }
        }
        if let Some(p) = self.uncle_penalty_percent {
            if p > 100 {
                return Err(NodeError::Config(
                    "uncle_penalty_percent must be at most 100".into(),
                ));
            }
        }
        Ok(())
    }

    /// Resolve the effective consensus parameters.
    pub fn params(&self) -> SidechainParams {
        let base = match self.network {
            NetworkId::Main => SidechainParams::main_defaults(),
            NetworkId::Test => SidechainParams::test_defaults(),
            NetworkId::Dev => SidechainParams::dev_defaults(),
        };
        SidechainParams::new(
            base.network,
            self.target_block_time.unwrap_or(base.target_block_time),
            self.min_difficulty
                .map(Difficulty::from_u64)
                .unwrap_or(base.min_difficulty),
            self.window.unwrap_or(base.window),
            self.uncle_penalty_percent
                .unwrap_or(base.uncle_penalty_percent),
            base.share_version,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = PoolConfig::default();
        let text = config.to_toml_string();
        let parsed = PoolConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed.network, config.network);
        assert_eq!(parsed.log_level, config.log_level);
    }

    #[test]
    fn defaults_resolve_to_network_params() {
        let config = PoolConfig::default();
        let params = config.params();
        assert_eq!(
            params.consensus_id(),
            SidechainParams::main_defaults().consensus_id()
        );
    }

    #[test]
    fn overrides_change_the_consensus_id() {
        let config = PoolConfig {
            window: Some(100),
            ..Default::default()
        };
        assert_ne!(
            config.params().consensus_id(),
            SidechainParams::main_defaults().consensus_id()
        );
        assert_eq!(config.params().window, 100);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(PoolConfig::from_toml_str("window = 1").is_err());
        assert!(PoolConfig::from_toml_str("target_block_time = 0").is_err());
        assert!(PoolConfig::from_toml_str("uncle_penalty_percent = 101").is_err());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config = PoolConfig::from_toml_str("network = \"Dev\"\n").unwrap();
        assert_eq!(config.network, NetworkId::Dev);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "network = \"Test\"\nlog_level = \"debug\"").unwrap();

        let config = PoolConfig::from_toml_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.network, NetworkId::Test);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn missing_file_is_a_config_error() {
        assert!(PoolConfig::from_toml_file("/nonexistent/sidepool.toml").is_err());
    }
}
