use serde::{Deserialize, Serialize};

use types::masternode::MasternodeTier;
use types::network::Network;
use types::Address;

pub const COIN: u128 = 1_000_000_000_000_000_000;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierWeights {
    pub general: u128,
    pub major: u128,
    pub private: u128,
}

impl TierWeights {
    pub fn weight(&self, tier: MasternodeTier) -> u128 {
        match tier {
            MasternodeTier::General => self.general,
            MasternodeTier::Major => self.major,
            MasternodeTier::Private => self.private,
        }
    }
}

impl Default for TierWeights {
    fn default() -> Self {
        Self {
            general: 100,
            major: 105,
            private: 120,
        }
    }
}

/// Protocol constants of one network.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChainParams {
    pub network: Network,
    /// Minimum spacing between a block and its parent, in seconds.
    pub block_time: u64,
    /// How far a block timestamp may run ahead of the local clock, in milliseconds.
    pub future_block_tolerance_ms: u64,
    /// Number of ancestors walked back from the parent to sample the coinbase balance.
    pub reward_point_balance_depth: u64,
    pub continuous_mining_limit: Option<u64>,
    /// The continuous mining rule applies to blocks above this height.
    pub continuous_mining_start: u64,
    pub masternode_reward_period: u64,
    pub initial_block_reward: u128,
    pub reward_halving_interval: u64,
    pub miner_reward_portion: u128,
    pub masternode_reward_portion: u128,
    pub reward_portion_denominator: u128,
    pub masternode_storage: Address,
    pub foundation_storage: Address,
    pub tier_weights: TierWeights,
    pub block_gas_limit: u64,
}

impl ChainParams {
    pub fn mainnet() -> Self {
        Self {
            network: Network::Mainnet,
            block_time: 8,
            future_block_tolerance_ms: 500,
            reward_point_balance_depth: 10,
            continuous_mining_limit: Some(3),
            continuous_mining_start: 33,
            masternode_reward_period: 10_800,
            initial_block_reward: 32 * COIN,
            reward_halving_interval: 15_768_000,
            miner_reward_portion: 45,
            masternode_reward_portion: 45,
            reward_portion_denominator: 100,
            masternode_storage: Address::from_low_u64_be(0x6d6e),
            foundation_storage: Address::from_low_u64_be(0x666f),
            tier_weights: TierWeights::default(),
            block_gas_limit: 50_000_000,
        }
    }

    pub fn testnet() -> Self {
        Self {
            network: Network::Testnet,
            continuous_mining_limit: None,
            masternode_reward_period: 180,
            ..Self::mainnet()
        }
    }

    /// Small periods so tests reach reward heights quickly.
    pub fn unitest() -> Self {
        Self {
            network: Network::Unitest,
            continuous_mining_limit: None,
            masternode_reward_period: 4,
            reward_halving_interval: 1_000,
            initial_block_reward: 10 * COIN,
            ..Self::mainnet()
        }
    }

    pub fn for_network(network: Network) -> Self {
        match network {
            Network::Mainnet => Self::mainnet(),
            Network::Testnet => Self::testnet(),
            Network::Unitest => Self::unitest(),
        }
    }

    pub fn block_reward(&self, number: u64) -> u128 {
        if number == 0 {
            return 0;
        }
        let halvings = (number - 1) / self.reward_halving_interval.max(1);
        if halvings >= 128 {
            return 0;
        }
        self.initial_block_reward >> halvings
    }

    pub fn is_masternode_reward_block(&self, number: u64) -> bool {
        self.masternode_reward_period > 0 && number > 0 && number % self.masternode_reward_period == 0
    }

    /// Number of preceding blocks the coinbase of block `number` must not have mined.
    pub fn continuous_mining_limit_at(&self, number: u64) -> Option<u64> {
        match self.continuous_mining_limit {
            Some(limit) if number > self.continuous_mining_start => Some(limit),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_reward_halving() {
        let params = ChainParams::unitest();
        assert_eq!(params.block_reward(0), 0);
        assert_eq!(params.block_reward(1), 10 * COIN);
        assert_eq!(params.block_reward(1_000), 10 * COIN);
        assert_eq!(params.block_reward(1_001), 5 * COIN);
    }

    #[test]
    fn test_continuous_mining_only_on_mainnet() {
        let mainnet = ChainParams::for_network(Network::Mainnet);
        assert_eq!(mainnet.continuous_mining_limit_at(33), None);
        assert_eq!(mainnet.continuous_mining_limit_at(34), Some(3));
        assert_eq!(ChainParams::testnet().continuous_mining_limit_at(34), None);
    }

    #[test]
    fn test_masternode_reward_heights() {
        let params = ChainParams::unitest();
        assert!(!params.is_masternode_reward_block(0));
        assert!(params.is_masternode_reward_block(4));
        assert!(!params.is_masternode_reward_block(5));
    }
}
