use std::collections::BTreeMap;
use std::sync::Arc;

use primitive_types::H256;

use crate::block::Block;
use crate::receipt::TransactionReceipt;
use crate::Address;

#[derive(Clone, Debug)]
pub enum LocalEventMessage {
    /// Sent once per accepted block, after the chain index is updated.
    BlockImported {
        block: Arc<Block>,
        rewards: BTreeMap<Address, u128>,
        receipts: Vec<TransactionReceipt>,
        best: bool,
    },
    ChainReorganized {
        old_head: H256,
        new_head: H256,
    },
}
