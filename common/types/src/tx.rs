use serde::{Deserialize, Serialize};

use codec::impl_codec;
use crypto::SHA3;
use primitive_types::H256;

use crate::Address;

/// A value transfer as handed to the executor. Signature checks happen before a
/// transaction reaches the ledger, so only the recovered sender is carried.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct Transaction {
    pub nonce: u64,
    pub from: Address,
    pub to: Address,
    pub value: u128,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub data: Vec<u8>,
}

impl Transaction {
    pub fn new(
        nonce: u64,
        from: Address,
        to: Address,
        value: u128,
        gas_price: u128,
        gas_limit: u64,
        data: Vec<u8>,
    ) -> Self {
        Self {
            nonce,
            from,
            to,
            value,
            gas_price,
            gas_limit,
            data,
        }
    }

    pub fn hash(&self) -> H256 {
        SHA3::digest(self.hash_input())
    }

    pub fn hash_input(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(100 + self.data.len());
        buf.extend_from_slice(&self.nonce.to_be_bytes());
        buf.extend_from_slice(self.from.as_bytes());
        buf.extend_from_slice(self.to.as_bytes());
        buf.extend_from_slice(&self.value.to_be_bytes());
        buf.extend_from_slice(&self.gas_price.to_be_bytes());
        buf.extend_from_slice(&self.gas_limit.to_be_bytes());
        buf.extend_from_slice(&self.data);
        buf
    }

    pub fn max_fee(&self) -> u128 {
        self.gas_price.saturating_mul(self.gas_limit as u128)
    }
}

impl_codec!(Transaction);

/// Root over the ordered transaction list of a block.
pub fn transactions_root(txs: &[Transaction]) -> H256 {
    crypto::ordered_root(txs.iter().map(|tx| tx.hash_input()))
}
