//! Protocol configuration
//!
//! This module provides the protocol parameters every participant must
//! agree on (network magic, fee constants, name limits) together with
//! local settings such as the log level.

use serde::{Serialize, Deserialize};

use crate::error::{CoreError, Result};
use crate::fees::FeePolicy;
use crate::names::NameRules;

/// Which deployment of the registry to follow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Production registry
    Mainnet,

    /// Test registry sharing the same chain under different magic bytes
    Testset,
}

impl Default for Network {
    fn default() -> Self {
        Network::Mainnet
    }
}

impl Network {
    /// Magic bytes prefixed to every operation payload
    pub const fn magic_bytes(&self) -> [u8; 2] {
        match self {
            Network::Mainnet => *b"id",
            Network::Testset => *b"eg",
        }
    }
}

/// Protocol configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Network whose magic bytes are accepted
    pub network: Network,

    /// Fee constants
    pub fees: FeePolicy,

    /// Name length limits
    pub names: NameRules,

    /// Default log filter, overridden by `RUST_LOG`
    pub log_level: String,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        ProtocolConfig {
            network: Network::default(),
            fees: FeePolicy::default(),
            names: NameRules::default(),
            log_level: "info".to_string(),
        }
    }
}

impl ProtocolConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: &str) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(CoreError::IoError)?;
        let config: ProtocolConfig = serde_json::from_reader(file).map_err(CoreError::JsonError)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn to_file(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path).map_err(CoreError::IoError)?;
        serde_json::to_writer_pretty(file, self).map_err(CoreError::JsonError)?;
        Ok(())
    }

    /// Reject parameter combinations that cannot describe a real registry
    pub fn validate(&self) -> Result<()> {
        if self.names.max_name_length == 0 || self.names.max_namespace_length == 0 {
            return Err(CoreError::ConfigError("name length limits must be positive".to_string()));
        }

        if self.names.max_namespace_length >= self.names.max_name_length {
            return Err(CoreError::ConfigError(format!(
                "namespace limit {} must be below name limit {}",
                self.names.max_namespace_length, self.names.max_name_length
            )));
        }

        Ok(())
    }

    /// Initialise logging at the configured level
    pub fn init_logging(&self) {
        crate::utils::init_logging(&self.log_level);
    }

    /// Magic bytes for the configured network
    pub fn magic_bytes(&self) -> [u8; 2] {
        self.network.magic_bytes()
    }

    /// Create a development configuration
    pub fn development() -> Self {
        let mut config = Self::default();
        config.network = Network::Testset;
        config.log_level = "debug".to_string();
        config
    }

    /// Create a production configuration
    pub fn production() -> Self {
        let mut config = Self::default();
        config.network = Network::Mainnet;
        config.log_level = "info".to_string();
        config
    }

    /// Create a testing configuration
    pub fn testing() -> Self {
        let mut config = Self::default();
        config.log_level = "debug".to_string();
        config
    }
}
