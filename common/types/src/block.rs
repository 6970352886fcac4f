use getset::{CopyGetters, Getters, MutGetters, Setters};
use serde::{Deserialize, Serialize};

use codec::impl_codec;
use crypto::SHA3;
use primitive_types::{H256, U256};

use crate::bloom::Bloom;
use crate::masternode::MasternodeSets;
use crate::tx::Transaction;
use crate::{short_hex, Address};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default, Getters, Setters, MutGetters, CopyGetters)]
pub struct BlockHeader {
    #[getset(get_copy = "pub", set = "pub")]
    parent_hash: H256,
    #[getset(get_copy = "pub", set = "pub")]
    coinbase: Address,
    #[getset(get_copy = "pub", set = "pub")]
    number: u64,
    /// Seconds since the unix epoch.
    #[getset(get_copy = "pub", set = "pub")]
    timestamp: u64,
    #[getset(get_copy = "pub", set = "pub")]
    gas_limit: u64,
    #[getset(get_copy = "pub", set = "pub")]
    gas_used: u64,
    #[getset(get_copy = "pub", set = "pub")]
    mineral_used: u128,
    #[getset(get_copy = "pub", set = "pub")]
    state_root: H256,
    #[getset(get_copy = "pub", set = "pub")]
    tx_root: H256,
    #[getset(get_copy = "pub", set = "pub")]
    receipts_root: H256,
    #[getset(get = "pub", set = "pub")]
    logs_bloom: Bloom,
    #[getset(get_copy = "pub", set = "pub")]
    reward_point: U256,
    #[getset(get_copy = "pub", set = "pub")]
    cumulative_reward_point: U256,
    /// Reward point seed.
    #[getset(get_copy = "pub", set = "pub")]
    mix_hash: H256,
    /// Coinbase balance the reward point was drawn from.
    #[getset(get_copy = "pub", set = "pub")]
    nonce: u128,
    #[getset(get_copy = "pub", set = "pub")]
    masternode_set_hash: H256,
    /// Basic reward unit paid to masternodes at reward heights.
    #[getset(get_copy = "pub", set = "pub")]
    masternode_reward: u128,
    #[getset(get = "pub", set = "pub", get_mut = "pub")]
    extra_data: Vec<u8>,
}

impl BlockHeader {
    pub fn hash(&self) -> H256 {
        SHA3::digest(self.hash_input())
    }

    fn hash_input(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(640 + self.extra_data.len());
        buf.extend_from_slice(self.parent_hash.as_bytes());
        buf.extend_from_slice(self.coinbase.as_bytes());
        buf.extend_from_slice(&self.number.to_be_bytes());
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf.extend_from_slice(&self.gas_limit.to_be_bytes());
        buf.extend_from_slice(&self.gas_used.to_be_bytes());
        buf.extend_from_slice(&self.mineral_used.to_be_bytes());
        buf.extend_from_slice(self.state_root.as_bytes());
        buf.extend_from_slice(self.tx_root.as_bytes());
        buf.extend_from_slice(self.receipts_root.as_bytes());
        buf.extend_from_slice(self.logs_bloom.as_bytes());
        let mut word = [0_u8; 32];
        self.reward_point.to_big_endian(&mut word);
        buf.extend_from_slice(&word);
        self.cumulative_reward_point.to_big_endian(&mut word);
        buf.extend_from_slice(&word);
        buf.extend_from_slice(self.mix_hash.as_bytes());
        buf.extend_from_slice(&self.nonce.to_be_bytes());
        buf.extend_from_slice(self.masternode_set_hash.as_bytes());
        buf.extend_from_slice(&self.masternode_reward.to_be_bytes());
        buf.extend_from_slice(&self.extra_data);
        buf
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct Block {
    header: BlockHeader,
    transactions: Vec<Transaction>,
    masternodes: MasternodeSets,
}

impl Block {
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>, masternodes: MasternodeSets) -> Self {
        Self {
            header,
            transactions,
            masternodes,
        }
    }

    pub fn hash(&self) -> H256 {
        self.header.hash()
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut BlockHeader {
        &mut self.header
    }

    pub fn transactions(&self) -> &Vec<Transaction> {
        &self.transactions
    }

    pub fn masternodes(&self) -> &MasternodeSets {
        &self.masternodes
    }

    pub fn number(&self) -> u64 {
        self.header.number
    }

    pub fn parent_hash(&self) -> H256 {
        self.header.parent_hash
    }

    pub fn coinbase(&self) -> Address {
        self.header.coinbase
    }

    pub fn is_genesis(&self) -> bool {
        self.header.number == 0
    }

    pub fn is_parent_of(&self, child: &Block) -> bool {
        child.parent_hash() == self.hash() && child.number() == self.number() + 1
    }

    pub fn short_descr(&self) -> String {
        format!(
            "#{} ({} <~ {}) txs: {}",
            self.number(),
            short_hex(&self.hash()),
            short_hex(&self.parent_hash()),
            self.transactions.len()
        )
    }
}

/// Chain index entry for one block at a height.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Getters, CopyGetters, Setters)]
pub struct BlockInfo {
    #[getset(get_copy = "pub")]
    hash: H256,
    #[getset(get_copy = "pub", set = "pub")]
    cumulative_reward_point: U256,
    #[getset(get_copy = "pub", set = "pub")]
    main_chain: bool,
}

impl BlockInfo {
    pub fn new(hash: H256, cumulative_reward_point: U256, main_chain: bool) -> Self {
        Self {
            hash,
            cumulative_reward_point,
            main_chain,
        }
    }
}

impl_codec!(Block);
impl_codec!(BlockHeader);
impl_codec!(BlockInfo);
