use crypto::SHA3;
use primitive_types::{H256, U256};
use types::Address;

/// Priority weight of a block, drawn from the coinbase balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardPoint {
    pub balance: u128,
    pub seed: H256,
    pub reward_point: U256,
}

impl RewardPoint {
    pub fn compute(coinbase: &Address, balance: u128, parent_hash: &H256) -> Self {
        let seed = calc_seed(coinbase, balance, parent_hash);
        Self {
            balance,
            seed,
            reward_point: calc_reward_point(&seed, balance),
        }
    }

    pub fn cumulative(&self, parent_cumulative: U256) -> U256 {
        parent_cumulative.saturating_add(self.reward_point)
    }
}

/// `keccak(coinbase ‖ balance as a 32 byte word ‖ parent hash)`
pub fn calc_seed(coinbase: &Address, balance: u128, parent_hash: &H256) -> H256 {
    let mut word = [0_u8; 32];
    U256::from(balance).to_big_endian(&mut word);
    let parts: [&[u8]; 3] = [coinbase.as_bytes(), &word, parent_hash.as_bytes()];
    SHA3::digest_all(parts)
}

/// Scales the balance by a ticket in `(0, 1]` drawn from the top 64 bits of the seed.
pub fn calc_reward_point(seed: &H256, balance: u128) -> U256 {
    if balance == 0 {
        return U256::zero();
    }
    let mut head = [0_u8; 8];
    head.copy_from_slice(&seed.as_bytes()[..8]);
    let ticket = U256::from(u64::from_be_bytes(head)) + U256::one();
    (U256::from(balance) * ticket) >> 64
}
