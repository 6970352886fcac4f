use std::sync::Arc;

use anyhow::Result;

use primitive_types::H256;
use storage::{KVStore, Schema};
use types::receipt::TransactionInfo;

pub type TransactionStorageKV = dyn KVStore<TransactionStorage> + Send + Sync;

/// Transaction hash to every block that executed it, one entry per fork.
pub struct TransactionStorage {
    kv: Arc<TransactionStorageKV>,
}

impl Schema for TransactionStorage {
    type Key = H256;
    type Value = Vec<TransactionInfo>;

    fn column() -> &'static str {
        "tx_info"
    }
}

impl TransactionStorage {
    pub fn new(kv: Arc<TransactionStorageKV>) -> Self {
        Self { kv }
    }

    pub fn put(&self, info: TransactionInfo) -> Result<()> {
        let hash = info.receipt.tx_hash;
        let mut infos = self.kv.get(&hash)?.unwrap_or_default();
        match infos.iter_mut().find(|i| i.block_hash == info.block_hash) {
            Some(existing) => *existing = info,
            None => infos.push(info),
        }
        self.kv.put(hash, infos)
    }

    pub fn get(&self, hash: &H256) -> Result<Vec<TransactionInfo>> {
        Ok(self.kv.get(hash)?.unwrap_or_default())
    }
}
