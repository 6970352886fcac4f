use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("masternode treasury holds {available}, reward round needs {required}")]
    TreasuryInsufficient { required: u128, available: u128 },
    #[error("reward arithmetic overflow")]
    RewardOverflow,
    #[error(transparent)]
    State(#[from] anyhow::Error),
}
