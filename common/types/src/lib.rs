use primitive_types::H160;

pub mod account;
pub mod block;
pub mod bloom;
pub mod config;
pub mod events;
pub mod genesis;
pub mod masternode;
pub mod network;
pub mod receipt;
pub mod tx;

pub use primitive_types::{H256, U256};

pub type Address = H160;
pub type BlockHash = H256;
pub type TxHash = H256;

/// Shortened hex form used in log lines.
pub fn short_hex(hash: &H256) -> String {
    hex::encode(&hash.as_bytes()[..4])
}
