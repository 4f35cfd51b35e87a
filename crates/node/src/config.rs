//! Node configuration: TOML file plus key and genesis loading.

use nebulink_types::{Genesis, KeyPair};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Errors from configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid validator key: {0}")]
    Key(String),

    #[error("invalid genesis file: {0}")]
    Genesis(String),
}

/// Top-level node configuration.
///
/// ```toml
/// [node]
/// data_dir = "./data"
/// key_file = "./validator.key"
/// genesis_file = "./genesis.json"
///
/// [rpc]
/// listen_addr = "127.0.0.1:2500"
///
/// [log]
/// level = "info"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub node: NodeSection,
    #[serde(default)]
    pub rpc: RpcSection,
    #[serde(default)]
    pub log: LogSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeSection {
    /// RocksDB data directory.
    pub data_dir: PathBuf,
    /// File holding the validator's 32-byte hex seed.
    pub key_file: PathBuf,
    /// Application genesis JSON.
    pub genesis_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcSection {
    pub listen_addr: SocketAddr,
}

impl Default for RpcSection {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 2500)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSection {
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl NodeConfig {
    /// Load and parse the TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&raw)?)
    }

    /// Load the validator keypair from `node.key_file`.
    pub fn load_keypair(&self) -> Result<KeyPair, ConfigError> {
        let raw = std::fs::read_to_string(&self.node.key_file).map_err(|source| ConfigError::Io {
            path: self.node.key_file.clone(),
            source,
        })?;
        let trimmed = raw.trim();
        let bytes = hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))
            .map_err(|e| ConfigError::Key(e.to_string()))?;
        let seed: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| ConfigError::Key(format!("seed must be 32 bytes, got {}", bytes.len())))?;
        Ok(KeyPair::from_seed(seed))
    }

    /// Load the application genesis from `node.genesis_file`.
    pub fn load_genesis(&self) -> Result<Genesis, ConfigError> {
        let raw = std::fs::read(&self.node.genesis_file).map_err(|source| ConfigError::Io {
            path: self.node.genesis_file.clone(),
            source,
        })?;
        serde_json::from_slice(&raw).map_err(|e| ConfigError::Genesis(e.to_string()))
    }
}
