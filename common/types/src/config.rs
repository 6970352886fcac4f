use serde::{Deserialize, Serialize};

use crate::network::Network;
use crate::Address;

/// Ledger behaviour that is a node operator choice rather than a protocol rule.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Abort the process when a committed state root diverges from the verified one.
    pub exit_on_block_conflict: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EnvironmentConfig {
    pub network: Network,
    #[serde(default)]
    pub coinbase: Option<Address>,
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub genesis_file: Option<String>,
    #[serde(default)]
    pub blocks_file: Option<String>,
    #[serde(default)]
    pub exit_on_block_conflict: bool,
    #[serde(default)]
    pub log_level: Option<String>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            network: Network::Testnet,
            coinbase: None,
            data_dir: None,
            genesis_file: None,
            blocks_file: None,
            exit_on_block_conflict: false,
            log_level: None,
        }
    }
}

impl EnvironmentConfig {
    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            exit_on_block_conflict: self.exit_on_block_conflict,
        }
    }
}
