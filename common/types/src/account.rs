use serde::{Deserialize, Serialize};

use codec::impl_codec;

use crate::masternode::MasternodeInfo;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct AccountState {
    pub balance: u128,
    pub nonce: u64,
    /// Gas credit spent before the coin balance.
    pub mineral: u128,
    /// Running total of every reward credited to the account.
    pub rewards: u128,
    pub masternode: Option<MasternodeInfo>,
}

impl AccountState {
    pub fn is_empty(&self) -> bool {
        self.balance == 0
            && self.nonce == 0
            && self.mineral == 0
            && self.rewards == 0
            && self.masternode.is_none()
    }

    pub fn root_input(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(96);
        buf.extend_from_slice(&self.balance.to_be_bytes());
        buf.extend_from_slice(&self.nonce.to_be_bytes());
        buf.extend_from_slice(&self.mineral.to_be_bytes());
        buf.extend_from_slice(&self.rewards.to_be_bytes());
        if let Some(mn) = &self.masternode {
            buf.push(mn.tier as u8);
            buf.push(mn.class as u8);
            buf.extend_from_slice(&mn.start_balance.to_be_bytes());
            if let Some(recipient) = &mn.recipient {
                buf.extend_from_slice(recipient.as_bytes());
            }
            buf.extend_from_slice(&mn.registered_at.to_be_bytes());
        }
        buf
    }
}

impl_codec!(AccountState);
