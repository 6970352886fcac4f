use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use codec::impl_codec;
use primitive_types::H256;
use storage::{KVStore, Schema};

pub type ChainStateStorageKV = dyn KVStore<ChainStateStorage> + Send + Sync;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ChainStateValue {
    CurrentHead(H256),
}

impl_codec!(ChainStateValue);

/// Persisted pointer to the canonical head.
pub struct ChainStateStorage {
    kv: Arc<ChainStateStorageKV>,
}

impl Schema for ChainStateStorage {
    type Key = String;
    type Value = ChainStateValue;

    fn column() -> &'static str {
        "chain_state"
    }
}

const CURR_HEAD: &str = "ch";

impl ChainStateStorage {
    pub fn new(kv: Arc<ChainStateStorageKV>) -> Self {
        Self { kv }
    }

    pub fn set_current_head(&self, hash: H256) -> Result<()> {
        self.kv
            .put(CURR_HEAD.to_string(), ChainStateValue::CurrentHead(hash))
    }

    pub fn get_current_head(&self) -> Result<Option<H256>> {
        let value = self.kv.get(&CURR_HEAD.to_string())?;
        Ok(value.map(|value| match value {
            ChainStateValue::CurrentHead(hash) => hash,
        }))
    }
}
