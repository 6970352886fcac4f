use std::collections::BTreeMap;

use tracing::trace;

use traits::Repository;
use types::block::BlockHeader;
use types::masternode::{MasternodeSets, MasternodeTier};
use types::Address;

use crate::error::Error;
use crate::params::ChainParams;

/// Share of the treasury handed to masternodes each round, in tenths.
const TREASURY_PAYOUT_TENTHS: u128 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockRewardSplit {
    pub total: u128,
    pub miner: u128,
    pub masternodes: u128,
    pub management: u128,
}

/// Splits block reward plus net fees. Management takes the rounding remainder.
pub fn split_block_reward(params: &ChainParams, number: u64, net_fees: u128) -> Result<BlockRewardSplit, Error> {
    let total = params
        .block_reward(number)
        .checked_add(net_fees)
        .ok_or(Error::RewardOverflow)?;
    let portion = |share: u128| {
        total
            .checked_mul(share)
            .map(|v| v / params.reward_portion_denominator.max(1))
            .ok_or(Error::RewardOverflow)
    };
    let miner = portion(params.miner_reward_portion)?;
    let masternodes = portion(params.masternode_reward_portion)?;
    let management = total - miner - masternodes;
    Ok(BlockRewardSplit {
        total,
        miner,
        masternodes,
        management,
    })
}

fn units(params: &ChainParams, tier: MasternodeTier, late: bool) -> u128 {
    let weight = params.tier_weights.weight(tier);
    if late {
        weight
    } else {
        weight * 2
    }
}

/// Reward unit for one round: nine tenths of the treasury over the weighted node count.
pub fn calc_basic_masternode_reward(params: &ChainParams, treasury: u128, sets: &MasternodeSets) -> u128 {
    let total_units: u128 = sets
        .lists()
        .iter()
        .map(|(tier, late, list)| units(params, *tier, *late) * list.len() as u128)
        .sum();
    if total_units == 0 {
        return 0;
    }
    treasury / 10 * TREASURY_PAYOUT_TENTHS / total_units
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MasternodeRewardData {
    /// Amount paid to each node of a list, in canonical list order.
    pub per_node: [u128; 6],
    pub nodes_total: u128,
    pub foundation: u128,
    pub total: u128,
}

pub fn calc_masternode_rewards(
    params: &ChainParams,
    basic: u128,
    sets: &MasternodeSets,
) -> Result<MasternodeRewardData, Error> {
    let mut data = MasternodeRewardData::default();
    for (i, (tier, late, list)) in sets.lists().iter().enumerate() {
        let per_node = basic
            .checked_mul(units(params, *tier, *late))
            .ok_or(Error::RewardOverflow)?;
        let list_total = per_node
            .checked_mul(list.len() as u128)
            .ok_or(Error::RewardOverflow)?;
        data.per_node[i] = per_node;
        data.nodes_total = data
            .nodes_total
            .checked_add(list_total)
            .ok_or(Error::RewardOverflow)?;
    }
    data.foundation = data.nodes_total / TREASURY_PAYOUT_TENTHS;
    data.total = data.nodes_total + data.foundation;
    Ok(data)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rewards {
    pub credits: BTreeMap<Address, u128>,
    pub split: BlockRewardSplit,
    pub masternode: Option<MasternodeRewardData>,
}

impl Rewards {
    fn credit(&mut self, address: Address, amount: u128) {
        let entry = self.credits.entry(address).or_default();
        *entry = entry.saturating_add(amount);
    }
}

pub struct RewardDistributor<'a> {
    params: &'a ChainParams,
}

impl<'a> RewardDistributor<'a> {
    pub fn new(params: &'a ChainParams) -> Self {
        Self { params }
    }

    /// Credits the consensus rewards of a block. At masternode reward heights the
    /// treasury round is paid out first, using the lists carried by the block.
    pub fn apply<R: Repository>(
        &self,
        repository: &mut R,
        header: &BlockHeader,
        masternodes: &MasternodeSets,
        net_fees: u128,
    ) -> Result<Rewards, Error> {
        let params = self.params;
        let mut rewards = Rewards::default();

        if params.is_masternode_reward_block(header.number()) && header.masternode_reward() > 0 {
            let treasury = repository.balance(&params.masternode_storage);
            let data = calc_masternode_rewards(params, header.masternode_reward(), masternodes)?;
            if treasury < data.total {
                return Err(Error::TreasuryInsufficient {
                    required: data.total,
                    available: treasury,
                });
            }
            self.pay_from_treasury(repository, &mut rewards, params.foundation_storage, data.foundation)?;
            // normal lists before late ones
            for late in [false, true] {
                for (i, (_, list_late, list)) in masternodes.lists().iter().enumerate() {
                    if *list_late != late {
                        continue;
                    }
                    for node in list.iter() {
                        let recipient = repository.mn_recipient(node).unwrap_or(*node);
                        self.pay_from_treasury(repository, &mut rewards, recipient, data.per_node[i])?;
                    }
                }
            }
            trace!(
                level = header.number(),
                nodes = masternodes.len(),
                total = data.total,
                "masternode round paid"
            );
            rewards.masternode = Some(data);
        }

        let split = split_block_reward(params, header.number(), net_fees)?;
        let coinbase = header.coinbase();
        repository.add_balance(&coinbase, split.miner)?;
        repository.add_balance(&params.masternode_storage, split.masternodes)?;
        repository.add_balance(&params.foundation_storage, split.management)?;
        repository.add_reward(&coinbase, split.miner)?;
        rewards.credit(coinbase, split.miner);
        rewards.credit(params.masternode_storage, split.masternodes);
        rewards.credit(params.foundation_storage, split.management);
        rewards.split = split;
        Ok(rewards)
    }

    fn pay_from_treasury<R: Repository>(
        &self,
        repository: &mut R,
        rewards: &mut Rewards,
        to: Address,
        amount: u128,
    ) -> Result<(), Error> {
        repository.transfer(&self.params.masternode_storage, &to, amount)?;
        repository.add_reward(&to, amount)?;
        rewards.credit(to, amount);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use state::State;
    use traits::StateStore;
    use types::masternode::{MasternodeInfo, RegistrationClass};

    use super::*;
    use crate::masternode::collect_masternode_sets;

    fn register(repo: &mut impl Repository, address: Address, tier: MasternodeTier, class: RegistrationClass) {
        repo.set_masternode(
            &address,
            Some(MasternodeInfo {
                tier,
                class,
                start_balance: 50_000,
                recipient: None,
                registered_at: 0,
            }),
        );
    }

    #[test]
    fn test_split_conserves_total() {
        let params = ChainParams::unitest();
        for fees in [0_u128, 1, 7, 99, 12_345_678_901] {
            let split = split_block_reward(&params, 3, fees).unwrap();
            assert_eq!(split.total, params.block_reward(3) + fees);
            assert_eq!(split.miner + split.masternodes + split.management, split.total);
            assert!(split.management >= split.total / 10);
        }
    }

    #[test]
    fn test_block_reward_credits() {
        let params = ChainParams::unitest();
        let state = State::in_memory();
        let mut repo = state.empty();
        let coinbase = Address::repeat_byte(1);
        let mut header = BlockHeader::default();
        header.set_number(1).set_coinbase(coinbase);

        let rewards = RewardDistributor::new(&params)
            .apply(&mut repo, &header, &MasternodeSets::default(), 100)
            .unwrap();
        let split = rewards.split;
        assert_eq!(repo.balance(&coinbase), split.miner);
        assert_eq!(repo.account_state(&coinbase).rewards, split.miner);
        assert_eq!(repo.balance(&params.masternode_storage), split.masternodes);
        assert_eq!(repo.balance(&params.foundation_storage), split.management);
        assert_eq!(rewards.credits.values().sum::<u128>(), split.total);
        assert!(rewards.masternode.is_none());
    }

    #[test]
    fn test_masternode_round_with_recipient_redirect() {
        let params = ChainParams::unitest();
        let state = State::in_memory();
        let mut repo = state.empty();
        let general = Address::repeat_byte(0x10);
        let major = Address::repeat_byte(0x20);
        let payout = Address::repeat_byte(0x21);
        register(&mut repo, general, MasternodeTier::General, RegistrationClass::Normal);
        register(&mut repo, major, MasternodeTier::Major, RegistrationClass::EarlyBird);
        let mut info = repo.masternode(&major).unwrap();
        info.recipient = Some(payout);
        repo.set_masternode(&major, Some(info));
        repo.add_balance(&params.masternode_storage, 1_000_000).unwrap();

        let sets = collect_masternode_sets(&repo, &params, 4);
        assert_eq!(sets.general_normal, vec![general]);
        assert_eq!(sets.major_normal, vec![major]);

        let basic = calc_basic_masternode_reward(&params, 1_000_000, &sets);
        assert_eq!(basic, 900_000 / (200 + 210));
        let mut header = BlockHeader::default();
        header
            .set_number(4)
            .set_coinbase(Address::repeat_byte(1))
            .set_masternode_reward(basic)
            .set_masternode_set_hash(sets.hash());

        let rewards = RewardDistributor::new(&params)
            .apply(&mut repo, &header, &sets, 0)
            .unwrap();
        let data = rewards.masternode.unwrap();
        assert_eq!(repo.balance(&general), basic * 200);
        assert_eq!(repo.balance(&payout), basic * 210);
        assert_eq!(repo.balance(&major), 0);
        assert_eq!(data.total, data.nodes_total + data.foundation);
        assert_eq!(
            repo.balance(&params.masternode_storage),
            1_000_000 - data.total + rewards.split.masternodes
        );
    }

    #[test]
    fn test_treasury_must_cover_round() {
        let params = ChainParams::unitest();
        let state = State::in_memory();
        let mut repo = state.empty();
        let node = Address::repeat_byte(0x10);
        register(&mut repo, node, MasternodeTier::General, RegistrationClass::Normal);
        repo.add_balance(&params.masternode_storage, 10).unwrap();
        let sets = collect_masternode_sets(&repo, &params, 4);
        let mut header = BlockHeader::default();
        header.set_number(4).set_masternode_reward(1_000);

        let err = RewardDistributor::new(&params)
            .apply(&mut repo, &header, &sets, 0)
            .unwrap_err();
        assert!(matches!(err, Error::TreasuryInsufficient { available: 10, .. }));
    }

    #[test]
    fn test_late_registrations_wait_a_full_period() {
        let params = ChainParams::unitest();
        let state = State::in_memory();
        let mut repo = state.empty();
        let early = Address::repeat_byte(1);
        let fresh = Address::repeat_byte(2);
        for (address, registered_at) in [(early, 1_u64), (fresh, 6)] {
            repo.set_masternode(
                &address,
                Some(MasternodeInfo {
                    tier: MasternodeTier::Private,
                    class: RegistrationClass::Late,
                    start_balance: 1,
                    recipient: None,
                    registered_at,
                }),
            );
        }
        let sets = collect_masternode_sets(&repo, &params, 8);
        assert_eq!(sets.private_late, vec![early]);
    }
}
