use anyhow::Result;
use tracing::debug;

use consensus::masternode::collect_masternode_sets;
use consensus::rewards::calc_basic_masternode_reward;
use consensus::RewardDistributor;
use traits::{Repository, StateStore, TransactionExecutor};
use types::block::{Block, BlockHeader};
use types::masternode::MasternodeSets;
use types::receipt::{logs_bloom, receipts_root};
use types::tx::{transactions_root, Transaction};
use types::Address;

use crate::errors::BlockChainError;
use crate::ledger::Ledger;

impl<S, E> Ledger<S, E>
where
    S: StateStore,
    E: TransactionExecutor<S::Repository>,
{
    /// Assembles a block on top of `parent` that passes validation on this node.
    ///
    /// Transactions that can not be included are dropped. The resulting state is
    /// discarded; the block still has to go through [`Ledger::try_to_connect`].
    pub fn create_new_block(
        &self,
        parent: &Block,
        txs: Vec<Transaction>,
        timestamp: u64,
        coinbase: Address,
    ) -> Result<Block> {
        let number = parent.number() + 1;
        let rp = self.reward_point_for(&coinbase, parent)?;

        let mut header = BlockHeader::default();
        header
            .set_parent_hash(parent.hash())
            .set_coinbase(coinbase)
            .set_number(number)
            .set_timestamp(timestamp)
            .set_gas_limit(self.params.block_gas_limit)
            .set_nonce(rp.balance)
            .set_mix_hash(rp.seed)
            .set_reward_point(rp.reward_point)
            .set_cumulative_reward_point(rp.cumulative(parent.header().cumulative_reward_point()));

        let mut repository = self.state.snapshot_at(&parent.header().state_root())?;

        let mut masternodes = MasternodeSets::default();
        if self.params.is_masternode_reward_block(number) {
            let sets = collect_masternode_sets(&repository, &self.params, number);
            if !sets.is_empty() {
                let treasury = repository.balance(&self.params.masternode_storage);
                header
                    .set_masternode_reward(calc_basic_masternode_reward(&self.params, treasury, &sets))
                    .set_masternode_set_hash(sets.hash());
                masternodes = sets;
            }
        }

        let executed = self.execute_transactions(&mut repository, &header, &txs, false)?;
        header.set_tx_root(transactions_root(&executed.included));

        RewardDistributor::new(&self.params)
            .apply(&mut repository, &header, &masternodes, executed.net_fees)
            .map_err(BlockChainError::from)?;

        header
            .set_gas_used(executed.gas_used)
            .set_mineral_used(executed.mineral_used)
            .set_receipts_root(receipts_root(&executed.receipts))
            .set_logs_bloom(logs_bloom(&executed.receipts))
            .set_state_root(repository.root());

        debug!(
            level = number,
            coinbase = ?coinbase,
            tx_count = executed.included.len(),
            dropped = txs.len() - executed.included.len(),
            masternodes = masternodes.len(),
            "new block assembled"
        );
        Ok(Block::new(header, executed.included, masternodes))
    }

    /// Earliest timestamp a child of `parent` may carry, or `now` once the node has
    /// fallen more than one block interval behind it.
    pub fn next_timestamp(&self, parent: &Block, now: u64) -> u64 {
        let min = parent.header().timestamp() + self.params.block_time;
        if now <= min + self.params.block_time {
            min
        } else {
            now
        }
    }
}
