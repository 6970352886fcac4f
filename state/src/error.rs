use thiserror::Error;

use primitive_types::H256;
use types::Address;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("insufficient funds on {address:?}: balance {balance}, required {required}")]
    InsufficientFunds {
        address: Address,
        balance: u128,
        required: u128,
    },
    #[error("insufficient mineral on {0:?}")]
    InsufficientMineral(Address),
    #[error("balance overflow on {0:?}")]
    BalanceOverflow(Address),
    #[error("no snapshot committed under root {0:?}")]
    UnknownRoot(H256),
    #[error("snapshot cache lock poisoned")]
    RWPoison,
}
