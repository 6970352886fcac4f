use serde::{Deserialize, Serialize};

use codec::impl_codec;
use primitive_types::H256;

use crate::bloom::Bloom;
use crate::Address;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct LogInfo {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Vec<u8>,
}

impl LogInfo {
    pub fn bloom(&self) -> Bloom {
        let mut bloom = Bloom::from_item(self.address.as_bytes());
        for topic in &self.topics {
            bloom.accrue(&Bloom::from_item(topic.as_bytes()));
        }
        bloom
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct InternalTransaction {
    pub from: Address,
    pub to: Address,
    pub value: u128,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct TransactionReceipt {
    pub tx_hash: H256,
    pub post_state: H256,
    pub cumulative_gas: u64,
    pub cumulative_mineral: u128,
    pub bloom: Bloom,
    pub logs: Vec<LogInfo>,
    pub internal_transactions: Vec<InternalTransaction>,
    pub gas_used: u64,
    pub mineral_used: u128,
    pub execution_result: Vec<u8>,
    pub error: String,
}

impl TransactionReceipt {
    pub fn is_successful(&self) -> bool {
        self.error.is_empty()
    }

    /// Bytes committed to by the receipts root.
    pub fn root_input(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128);
        buf.extend_from_slice(self.tx_hash.as_bytes());
        buf.extend_from_slice(self.post_state.as_bytes());
        buf.extend_from_slice(&self.cumulative_gas.to_be_bytes());
        buf.extend_from_slice(&self.cumulative_mineral.to_be_bytes());
        buf.extend_from_slice(self.bloom.as_bytes());
        for log in &self.logs {
            buf.extend_from_slice(log.address.as_bytes());
            for topic in &log.topics {
                buf.extend_from_slice(topic.as_bytes());
            }
            buf.extend_from_slice(&log.data);
        }
        buf.extend_from_slice(&self.gas_used.to_be_bytes());
        buf.extend_from_slice(&self.mineral_used.to_be_bytes());
        buf.extend_from_slice(self.error.as_bytes());
        buf
    }
}

pub fn receipts_root(receipts: &[TransactionReceipt]) -> H256 {
    crypto::ordered_root(receipts.iter().map(|r| r.root_input()))
}

pub fn logs_bloom(receipts: &[TransactionReceipt]) -> Bloom {
    let mut bloom = Bloom::default();
    for receipt in receipts {
        bloom.accrue(&receipt.bloom);
    }
    bloom
}

/// Location of an executed transaction: the receipt plus the block that included it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TransactionInfo {
    pub receipt: TransactionReceipt,
    pub block_hash: H256,
    pub index: u32,
}

impl_codec!(TransactionReceipt);
impl_codec!(TransactionInfo);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_success_flag() {
        let mut receipt = TransactionReceipt::default();
        assert!(receipt.is_successful());
        receipt.error = "insufficient balance".to_string();
        assert!(!receipt.is_successful());
    }

    #[test]
    fn test_logs_bloom_covers_every_receipt() {
        let log = LogInfo {
            address: Address::repeat_byte(1),
            topics: vec![H256::repeat_byte(2)],
            data: vec![],
        };
        let receipt = TransactionReceipt {
            bloom: log.bloom(),
            logs: vec![log.clone()],
            ..Default::default()
        };
        let bloom = logs_bloom(&[TransactionReceipt::default(), receipt]);
        assert!(bloom.contains(&log.bloom()));
        assert_ne!(receipts_root(&[]), receipts_root(&[TransactionReceipt::default()]));
    }
}
