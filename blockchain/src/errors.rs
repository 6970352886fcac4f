use thiserror::Error;

use primitive_types::{H256, U256};
use types::Address;

/// Coarse class of a rejection, used to pick the rollback and logging policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidKind {
    Structural,
    Consensus,
    Temporal,
    /// State divergence, handled by the block conflict policy.
    Fatal,
    /// Not a property of the block. Surfaced to the caller as an error.
    Internal,
}

#[derive(Error, Debug)]
pub enum BlockChainError {
    #[error("block number {number} does not follow parent {parent}")]
    InvalidNumber { number: u64, parent: u64 },
    #[error("gas used {used} exceeds gas limit {limit}")]
    GasUsedExceedsLimit { used: u64, limit: u64 },
    #[error("gas used mismatch: block {claimed} computed {computed}")]
    GasUsedMismatch { claimed: u64, computed: u64 },
    #[error("mineral used mismatch: block {claimed} computed {computed}")]
    MineralUsedMismatch { claimed: u128, computed: u128 },
    #[error("transaction root mismatch: block {claimed:?} computed {computed:?}")]
    TxRootMismatch { claimed: H256, computed: H256 },
    #[error("receipts root mismatch: block {claimed:?} computed {computed:?}")]
    ReceiptsRootMismatch { claimed: H256, computed: H256 },
    #[error("logs bloom mismatch")]
    LogsBloomMismatch,
    #[error("nonce of {address:?} out of sequence: expected {expected} found {found}")]
    InvalidNonceSequence {
        address: Address,
        expected: u64,
        found: u64,
    },
    #[error("transaction {index} rejected: {reason}")]
    TransactionRejected { index: usize, reason: String },
    #[error("masternode fields set outside a masternode reward block")]
    UnexpectedMasternodeFields,

    #[error("balance nonce mismatch: block {claimed} computed {computed}")]
    BalanceNonceMismatch { claimed: u128, computed: u128 },
    #[error("reward point seed mismatch: block {claimed:?} computed {computed:?}")]
    SeedMismatch { claimed: H256, computed: H256 },
    #[error("reward point mismatch: block {claimed} computed {computed}")]
    RewardPointMismatch { claimed: U256, computed: U256 },
    #[error("cumulative reward point mismatch: block {claimed} computed {computed}")]
    CumulativeRewardPointMismatch { claimed: U256, computed: U256 },
    #[error("masternode {0:?} can not mine a block")]
    MasternodeCannotMine(Address),
    #[error("coinbase {coinbase:?} also mined ancestor #{ancestor}")]
    ContinuousMining { coinbase: Address, ancestor: u64 },
    #[error("masternode set mismatch: block {claimed:?} computed {computed:?}")]
    MasternodeSetMismatch { claimed: H256, computed: H256 },
    #[error("masternode reward mismatch: block {claimed} computed {computed}")]
    MasternodeRewardMismatch { claimed: u128, computed: u128 },
    #[error("masternode {0:?} listed in the block is not registered")]
    UnregisteredMasternode(Address),
    #[error("reward distribution failed: {0}")]
    Reward(#[from] consensus::Error),

    #[error("block created too fast: {timestamp} < {min}")]
    TooFast { timestamp: u64, min: u64 },
    #[error("block created in the future: {timestamp_ms} > {now_ms}")]
    FutureBlock { timestamp_ms: u64, now_ms: u64 },

    #[error("state root mismatch: block {claimed:?} computed {computed:?}")]
    StateRootMismatch { claimed: H256, computed: H256 },
    #[error("committed state root {committed:?} differs from verified {verified:?}")]
    CommitDivergence { verified: H256, committed: H256 },

    #[error("block {0:?} not found")]
    BlockNotFound(H256),
    #[error("RWPoison")]
    RWPoison,
    #[error("`{0}`")]
    GenericError(#[from] anyhow::Error),
}

impl BlockChainError {
    pub fn kind(&self) -> InvalidKind {
        use BlockChainError::*;
        match self {
            GasUsedExceedsLimit { .. }
            | GasUsedMismatch { .. }
            | MineralUsedMismatch { .. }
            | TxRootMismatch { .. }
            | ReceiptsRootMismatch { .. }
            | LogsBloomMismatch
            | InvalidNonceSequence { .. }
            | TransactionRejected { .. }
            | UnexpectedMasternodeFields => InvalidKind::Structural,
            BalanceNonceMismatch { .. }
            | SeedMismatch { .. }
            | RewardPointMismatch { .. }
            | CumulativeRewardPointMismatch { .. }
            | MasternodeCannotMine(_)
            | ContinuousMining { .. }
            | MasternodeSetMismatch { .. }
            | MasternodeRewardMismatch { .. }
            | UnregisteredMasternode(_)
            | Reward(_)
            | InvalidNumber { .. } => InvalidKind::Consensus,
            TooFast { .. } | FutureBlock { .. } => InvalidKind::Temporal,
            StateRootMismatch { .. } | CommitDivergence { .. } => InvalidKind::Fatal,
            BlockNotFound(_) | RWPoison | GenericError(_) => InvalidKind::Internal,
        }
    }
}
