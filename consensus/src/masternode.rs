use traits::Repository;
use types::masternode::{MasternodeSets, MasternodeTier, RegistrationClass};

use crate::params::ChainParams;

/// Reward lists of a masternode reward block as seen by `repository`.
///
/// Early-bird registrations are paid with the normal ones. Late registrations only
/// enter the round once they have been registered for a full reward period.
pub fn collect_masternode_sets<R: Repository>(
    repository: &R,
    params: &ChainParams,
    number: u64,
) -> MasternodeSets {
    let late_cutoff = number.saturating_sub(params.masternode_reward_period);
    let mut sets = MasternodeSets::default();
    for tier in MasternodeTier::ALL {
        let normal = sets.list_mut(tier, false);
        normal.extend(repository.masternode_list(tier, RegistrationClass::EarlyBird, None));
        normal.extend(repository.masternode_list(tier, RegistrationClass::Normal, None));
        *sets.list_mut(tier, true) =
            repository.masternode_list(tier, RegistrationClass::Late, Some(late_cutoff));
    }
    sets
}
