use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use primitive_types::{H256, U256};

use crate::block::{Block, BlockHeader};
use crate::masternode::{MasternodeInfo, MasternodeSets};
use crate::receipt::receipts_root;
use crate::tx::transactions_root;
use crate::Address;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct GenesisAccount {
    pub balance: u128,
    #[serde(default)]
    pub nonce: u64,
    #[serde(default)]
    pub mineral: u128,
    #[serde(default)]
    pub masternode: Option<MasternodeInfo>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Genesis {
    pub timestamp: u64,
    #[serde(default)]
    pub coinbase: Address,
    pub gas_limit: u64,
    #[serde(default)]
    pub extra_data: Vec<u8>,
    #[serde(default)]
    pub alloc: BTreeMap<Address, GenesisAccount>,
}

impl Genesis {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read(path)?;
        serde_json::from_slice(&raw).map_err(|e| e.into())
    }

    /// Genesis block committing to the state produced by the allocation.
    pub fn to_block(&self, state_root: H256) -> Block {
        let mut header = BlockHeader::default();
        header
            .set_coinbase(self.coinbase)
            .set_timestamp(self.timestamp)
            .set_gas_limit(self.gas_limit)
            .set_state_root(state_root)
            .set_tx_root(transactions_root(&[]))
            .set_receipts_root(receipts_root(&[]))
            .set_cumulative_reward_point(U256::zero())
            .set_extra_data(self.extra_data.clone());
        Block::new(header, vec![], MasternodeSets::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_from_json() {
        let raw = r#"{
            "timestamp": 1500000000,
            "gas_limit": 50000000,
            "alloc": {
                "0x1111111111111111111111111111111111111111": { "balance": 1000 },
                "0x2222222222222222222222222222222222222222": {
                    "balance": 50000,
                    "masternode": { "tier": "general", "class": "normal", "start_balance": 50000 }
                }
            }
        }"#;
        let genesis: Genesis = serde_json::from_str(raw).unwrap();
        assert_eq!(genesis.alloc.len(), 2);
        let block = genesis.to_block(H256::repeat_byte(3));
        assert!(block.is_genesis());
        assert_eq!(block.header().state_root(), H256::repeat_byte(3));
        assert_eq!(block.header().timestamp(), 1500000000);
    }
}
