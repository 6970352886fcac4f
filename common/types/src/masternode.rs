use serde::{Deserialize, Serialize};

use crypto::SHA3;
use primitive_types::H256;

use crate::Address;

#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MasternodeTier {
    General,
    Major,
    Private,
}

impl MasternodeTier {
    pub const ALL: [MasternodeTier; 3] = [
        MasternodeTier::General,
        MasternodeTier::Major,
        MasternodeTier::Private,
    ];
}

#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationClass {
    EarlyBird,
    Normal,
    Late,
}

/// Registry entry kept in the account state of a masternode.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MasternodeInfo {
    pub tier: MasternodeTier,
    pub class: RegistrationClass,
    pub start_balance: u128,
    #[serde(default)]
    pub recipient: Option<Address>,
    #[serde(default)]
    pub registered_at: u64,
}

/// The six reward lists carried by a masternode reward block.
/// Early-bird registrations are merged into the normal lists.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct MasternodeSets {
    pub general_normal: Vec<Address>,
    pub general_late: Vec<Address>,
    pub major_normal: Vec<Address>,
    pub major_late: Vec<Address>,
    pub private_normal: Vec<Address>,
    pub private_late: Vec<Address>,
}

impl MasternodeSets {
    pub fn list(&self, tier: MasternodeTier, late: bool) -> &Vec<Address> {
        match (tier, late) {
            (MasternodeTier::General, false) => &self.general_normal,
            (MasternodeTier::General, true) => &self.general_late,
            (MasternodeTier::Major, false) => &self.major_normal,
            (MasternodeTier::Major, true) => &self.major_late,
            (MasternodeTier::Private, false) => &self.private_normal,
            (MasternodeTier::Private, true) => &self.private_late,
        }
    }

    pub fn list_mut(&mut self, tier: MasternodeTier, late: bool) -> &mut Vec<Address> {
        match (tier, late) {
            (MasternodeTier::General, false) => &mut self.general_normal,
            (MasternodeTier::General, true) => &mut self.general_late,
            (MasternodeTier::Major, false) => &mut self.major_normal,
            (MasternodeTier::Major, true) => &mut self.major_late,
            (MasternodeTier::Private, false) => &mut self.private_normal,
            (MasternodeTier::Private, true) => &mut self.private_late,
        }
    }

    /// Lists in their canonical order: general, major, private; normal before late.
    pub fn lists(&self) -> [(MasternodeTier, bool, &Vec<Address>); 6] {
        [
            (MasternodeTier::General, false, &self.general_normal),
            (MasternodeTier::General, true, &self.general_late),
            (MasternodeTier::Major, false, &self.major_normal),
            (MasternodeTier::Major, true, &self.major_late),
            (MasternodeTier::Private, false, &self.private_normal),
            (MasternodeTier::Private, true, &self.private_late),
        ]
    }

    pub fn len(&self) -> usize {
        self.lists().iter().map(|(_, _, list)| list.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.lists().into_iter().flat_map(|(_, _, list)| list.iter())
    }

    pub fn hash(&self) -> H256 {
        if self.is_empty() {
            return H256::zero();
        }
        let mut buf = Vec::with_capacity(24 + self.len() * 20);
        for (_, _, list) in self.lists() {
            buf.extend_from_slice(&(list.len() as u32).to_be_bytes());
            for address in list {
                buf.extend_from_slice(address.as_bytes());
            }
        }
        SHA3::digest(buf)
    }
}
