use crate::core::CodecKind;
use crate::error::{BlockchainError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const DEFAULT_NODE_ADDR: &str = "127.0.0.1:2001";
pub const DEFAULT_BLOCK_TIME_MS: u64 = 5000;
pub const DEFAULT_SYNC_INTERVAL_MS: u64 = 3000;

const NODE_ADDRESS_KEY: &str = "NODE_ADDRESS";
const NODE_ID_KEY: &str = "NODE_ID";

/// Settings for one node. Every field has a default, so a config file
/// only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub id: String,
    pub listen_addr: String,
    pub seed_nodes: Vec<String>,
    pub block_time_ms: u64,
    pub sync_interval_ms: u64,
    pub pool_capacity: usize,
    pub max_peers: usize,
    pub validator: bool,
    pub key_file: Option<PathBuf>,
    pub codec: CodecKind,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            id: String::new(),
            listen_addr: String::from(DEFAULT_NODE_ADDR),
            seed_nodes: vec![],
            block_time_ms: DEFAULT_BLOCK_TIME_MS,
            sync_interval_ms: DEFAULT_SYNC_INTERVAL_MS,
            pool_capacity: crate::storage::DEFAULT_POOL_CAPACITY,
            max_peers: crate::network::DEFAULT_MAX_PEERS,
            validator: false,
            key_file: None,
            codec: CodecKind::default(),
        }
    }
}

impl NodeConfig {
    /// Defaults plus `NODE_ADDRESS` / `NODE_ID` from the environment
    pub fn from_env() -> NodeConfig {
        let mut config = NodeConfig::default();
        config.apply_env();
        config.ensure_id();
        config
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<NodeConfig> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            BlockchainError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        let mut config = Self::from_toml(&contents)?;
        config.apply_env();
        config.ensure_id();
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<NodeConfig> {
        Ok(toml::from_str(contents)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| BlockchainError::Config(format!("Failed to encode config: {e}")))
    }

    fn apply_env(&mut self) {
        if let Ok(addr) = env::var(NODE_ADDRESS_KEY) {
            self.listen_addr = addr;
        }
        if let Ok(node_id) = env::var(NODE_ID_KEY) {
            self.id = node_id;
        }
    }

    fn ensure_id(&mut self) {
        if self.id.is_empty() {
            self.id = Uuid::new_v4().to_string();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.trim().is_empty() {
            return Err(BlockchainError::Config(
                "listen_addr must not be empty".to_string(),
            ));
        }
        if self.block_time_ms == 0 {
            return Err(BlockchainError::Config(
                "block_time_ms must be greater than zero".to_string(),
            ));
        }
        if self.sync_interval_ms == 0 {
            return Err(BlockchainError::Config(
                "sync_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.pool_capacity == 0 {
            return Err(BlockchainError::Config(
                "pool_capacity must be greater than zero".to_string(),
            ));
        }
        if self.validator && self.key_file.is_none() {
            return Err(BlockchainError::Config(
                "validator nodes need a key_file".to_string(),
            ));
        }
        Ok(())
    }
}
