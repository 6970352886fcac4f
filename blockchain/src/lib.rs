use rocksdb::ColumnFamilyDescriptor;

use storage::Schema;

use crate::block_storage::{BlockByHash, BlockInfoByNumber};
use crate::chain_state::ChainStateStorage;
use crate::tx_storage::TransactionStorage;

pub mod block_storage;
mod builder;
pub mod chain_state;
pub mod errors;
pub mod ledger;
pub mod tx_storage;

pub use crate::errors::{BlockChainError, InvalidKind};
pub use crate::ledger::{ImportResult, ImportStats, Ledger};

pub fn column_families() -> Vec<ColumnFamilyDescriptor> {
    vec![
        BlockInfoByNumber::descriptor(),
        BlockByHash::descriptor(),
        TransactionStorage::descriptor(),
        ChainStateStorage::descriptor(),
    ]
}

pub fn column_family_names() -> Vec<&'static str> {
    vec![
        BlockInfoByNumber::column(),
        BlockByHash::column(),
        TransactionStorage::column(),
        ChainStateStorage::column(),
    ]
}
