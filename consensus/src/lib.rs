pub use crate::error::Error;
pub use crate::params::{ChainParams, TierWeights};
pub use crate::reward_point::RewardPoint;
pub use crate::rewards::{BlockRewardSplit, MasternodeRewardData, RewardDistributor, Rewards};

pub mod error;
pub mod masternode;
pub mod params;
pub mod reward_point;
pub mod rewards;
