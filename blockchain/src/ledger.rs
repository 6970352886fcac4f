use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use anyhow::{bail, Result};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, trace, warn};

use consensus::masternode::collect_masternode_sets;
use consensus::rewards::calc_basic_masternode_reward;
use consensus::{ChainParams, RewardDistributor, RewardPoint, Rewards};
use primitive_types::U256;
use storage::PersistentStorage;
use traits::{BlockSource, ExecutionContext, Repository, StateStore, TransactionExecutor};
use types::account::AccountState;
use types::block::{Block, BlockHeader};
use types::config::LedgerConfig;
use types::events::LocalEventMessage;
use types::genesis::Genesis;
use types::receipt::{logs_bloom, receipts_root, TransactionInfo, TransactionReceipt};
use types::tx::{transactions_root, Transaction};
use types::{Address, H256};

use crate::block_storage::BlockStorage;
use crate::chain_state::ChainStateStorage;
use crate::errors::{BlockChainError, InvalidKind};
use crate::tx_storage::TransactionStorage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportResult {
    Exist,
    NoParent,
    InvalidBlock,
    ImportedBest,
    ImportedNotBest,
}

impl ImportResult {
    pub fn is_successful(&self) -> bool {
        matches!(self, ImportResult::ImportedBest | ImportResult::ImportedNotBest)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub exist: usize,
    pub no_parent: usize,
    pub invalid: usize,
    pub imported_best: usize,
    pub imported_not_best: usize,
}

impl ImportStats {
    fn record(&mut self, result: ImportResult) {
        match result {
            ImportResult::Exist => self.exist += 1,
            ImportResult::NoParent => self.no_parent += 1,
            ImportResult::InvalidBlock => self.invalid += 1,
            ImportResult::ImportedBest => self.imported_best += 1,
            ImportResult::ImportedNotBest => self.imported_not_best += 1,
        }
    }
}

#[derive(Debug, Clone)]
struct ChainHead {
    block: Arc<Block>,
    total_reward_point: U256,
}

#[derive(Debug, Default)]
pub(crate) struct ExecutedTransactions {
    pub included: Vec<Transaction>,
    pub receipts: Vec<TransactionReceipt>,
    pub gas_used: u64,
    pub mineral_used: u128,
    /// Fees paid in coin, mineral excluded.
    pub net_fees: u128,
}

struct AppliedBlock<R> {
    repository: R,
    receipts: Vec<TransactionReceipt>,
    rewards: Rewards,
}

/// Block import engine.
///
/// Imports are serialized by `import_lock`; the head and the chain index are never
/// observed half way through an import. State is read through root addressed snapshots,
/// so evaluating a fork never touches the canonical state.
pub struct Ledger<S, E>
where
    S: StateStore,
    E: TransactionExecutor<S::Repository>,
{
    import_lock: Mutex<()>,
    head: RwLock<ChainHead>,
    pub(crate) params: ChainParams,
    config: LedgerConfig,
    pub(crate) state: Arc<S>,
    executor: Arc<E>,
    block_storage: Arc<BlockStorage>,
    tx_storage: Arc<TransactionStorage>,
    chain_state: Arc<ChainStateStorage>,
    sender: Option<UnboundedSender<LocalEventMessage>>,
}

impl<S, E> Ledger<S, E>
where
    S: StateStore,
    E: TransactionExecutor<S::Repository>,
{
    pub fn new(
        params: ChainParams,
        config: LedgerConfig,
        state: Arc<S>,
        executor: Arc<E>,
        storage: &PersistentStorage,
        genesis: &Genesis,
        sender: Option<UnboundedSender<LocalEventMessage>>,
    ) -> Result<Self> {
        let block_storage = Arc::new(BlockStorage::new(storage)?);
        let tx_storage = Arc::new(TransactionStorage::new(storage.kv::<TransactionStorage>()));
        let chain_state = Arc::new(ChainStateStorage::new(storage.kv::<ChainStateStorage>()));

        let head = match chain_state.get_current_head()? {
            Some(hash) => {
                let block = block_storage
                    .get_block_by_hash(&hash)?
                    .ok_or(BlockChainError::BlockNotFound(hash))?;
                if !state.contains_root(&block.header().state_root()) {
                    bail!(
                        "state root {:?} of head #{} is missing",
                        block.header().state_root(),
                        block.number()
                    );
                }
                let total_reward_point = block_storage.get_total_reward_point_for_hash(&hash)?;
                info!(blockhash = ?hash, level = block.number(), "restore from blockchain state");
                ChainHead {
                    block: Arc::new(block),
                    total_reward_point,
                }
            }
            None => {
                let block = install_genesis(state.as_ref(), &block_storage, genesis)?;
                chain_state.set_current_head(block.hash())?;
                info!(blockhash = ?block.hash(), level = block.number(), "blockchain state started from genesis");
                ChainHead {
                    total_reward_point: block.header().cumulative_reward_point(),
                    block: Arc::new(block),
                }
            }
        };

        Ok(Self {
            import_lock: Mutex::new(()),
            head: RwLock::new(head),
            params,
            config,
            state,
            executor,
            block_storage,
            tx_storage,
            chain_state,
            sender,
        })
    }

    /// Validates `block`, applies it and updates the canonical chain.
    ///
    /// Rejections are reported as [`ImportResult::InvalidBlock`]; `Err` is reserved for
    /// failures of the node itself, such as storage errors.
    pub fn try_to_connect(&self, block: &Block) -> Result<ImportResult> {
        let _guard = self.import_lock.lock().map_err(|_| BlockChainError::RWPoison)?;
        let hash = block.hash();

        if self.block_storage.get_max_number()? >= Some(block.number())
            && self.block_storage.is_block_exist(&hash)?
        {
            debug!(header = ?hash, level = block.number(), "block already exists");
            return Ok(ImportResult::Exist);
        }

        let head = self.current_head()?;
        if block.parent_hash() == head.block.hash() {
            self.connect_to_best(block, &head)
        } else if self.block_storage.is_block_exist(&block.parent_hash())? {
            self.connect_and_fork(block, &head)
        } else {
            debug!(header = ?hash, level = block.number(), parent_hash = ?block.parent_hash(), "block parent unknown");
            Ok(ImportResult::NoParent)
        }
    }

    pub fn import_from<B: BlockSource>(&self, source: &mut B) -> Result<ImportStats> {
        let mut stats = ImportStats::default();
        while let Some(block) = source.next_block()? {
            stats.record(self.try_to_connect(&block)?);
        }
        Ok(stats)
    }

    fn connect_to_best(&self, block: &Block, head: &ChainHead) -> Result<ImportResult> {
        let parent = head.block.as_ref();
        let repository = self.state.snapshot_at(&parent.header().state_root())?;
        let applied = match self.apply_block(repository, block, parent) {
            Ok(applied) => applied,
            Err(e) => return self.reject(block, e),
        };
        let AppliedBlock {
            repository,
            receipts,
            rewards,
        } = applied;
        if let Err(e) = self.commit_state(block, repository) {
            return self.reject(block, e);
        }

        self.store_block(block, &receipts, true)?;
        self.set_head(block, block.header().cumulative_reward_point())?;
        info!(
            header = ?block.hash(),
            level = block.number(),
            parent_hash = ?block.parent_hash(),
            tx_count = block.transactions().len(),
            reward_point = %block.header().reward_point(),
            "Applied new block"
        );
        self.notify(block, rewards, receipts, true);
        Ok(ImportResult::ImportedBest)
    }

    fn connect_and_fork(&self, block: &Block, head: &ChainHead) -> Result<ImportResult> {
        let parent = self
            .block_storage
            .get_block_by_hash(&block.parent_hash())?
            .ok_or(BlockChainError::BlockNotFound(block.parent_hash()))?;
        let repository = self.state.snapshot_at(&parent.header().state_root())?;
        let applied = match self.apply_block(repository, block, &parent) {
            Ok(applied) => applied,
            Err(e) => return self.reject(block, e),
        };
        let AppliedBlock {
            repository,
            receipts,
            rewards,
        } = applied;
        if let Err(e) = self.commit_state(block, repository) {
            return self.reject(block, e);
        }

        self.store_block(block, &receipts, false)?;
        let total = block.header().cumulative_reward_point();
        if total > head.total_reward_point {
            self.block_storage.re_branch(block)?;
            self.set_head(block, total)?;
            info!(
                old_head = ?head.block.hash(),
                new_head = ?block.hash(),
                level = block.number(),
                total_reward_point = %total,
                "Chain changed, network fork"
            );
            self.send(LocalEventMessage::ChainReorganized {
                old_head: head.block.hash(),
                new_head: block.hash(),
            });
            self.notify(block, rewards, receipts, true);
            Ok(ImportResult::ImportedBest)
        } else {
            info!(
                header = ?block.hash(),
                level = block.number(),
                total_reward_point = %total,
                best_reward_point = %head.total_reward_point,
                "Accepted block on a side branch"
            );
            self.notify(block, rewards, receipts, false);
            Ok(ImportResult::ImportedNotBest)
        }
    }

    fn reject(&self, block: &Block, e: BlockChainError) -> Result<ImportResult> {
        match e.kind() {
            InvalidKind::Internal => Err(e.into()),
            InvalidKind::Fatal => {
                error!(header = ?block.hash(), level = block.number(), error = %e, "BLOCK: state conflict or received invalid block");
                if self.config.exit_on_block_conflict {
                    error!(level = block.number(), "Inconsistent behavior, exiting");
                    std::process::exit(1);
                }
                Ok(ImportResult::InvalidBlock)
            }
            kind => {
                warn!(header = ?block.hash(), level = block.number(), kind = ?kind, error = %e, "Invalid block");
                Ok(ImportResult::InvalidBlock)
            }
        }
    }

    /// Runs every consensus check and the block's transactions on `repository`, which
    /// must be a view of the parent state. Nothing is committed.
    fn apply_block(
        &self,
        mut repository: S::Repository,
        block: &Block,
        parent: &Block,
    ) -> Result<AppliedBlock<S::Repository>, BlockChainError> {
        let header = block.header();
        let number = header.number();
        let coinbase = header.coinbase();

        if number != parent.number() + 1 {
            return Err(BlockChainError::InvalidNumber {
                number,
                parent: parent.number(),
            });
        }
        if header.gas_used() > header.gas_limit() {
            return Err(BlockChainError::GasUsedExceedsLimit {
                used: header.gas_used(),
                limit: header.gas_limit(),
            });
        }

        let tx_root = transactions_root(block.transactions());
        if tx_root != header.tx_root() {
            return Err(BlockChainError::TxRootMismatch {
                claimed: header.tx_root(),
                computed: tx_root,
            });
        }

        if self.params.is_masternode_reward_block(number) {
            self.verify_masternodes(&repository, block)?;
        } else if !block.masternodes().is_empty()
            || !header.masternode_set_hash().is_zero()
            || header.masternode_reward() != 0
        {
            return Err(BlockChainError::UnexpectedMasternodeFields);
        }

        let executed = self.execute_transactions(&mut repository, header, block.transactions(), true)?;
        if executed.gas_used != header.gas_used() {
            return Err(BlockChainError::GasUsedMismatch {
                claimed: header.gas_used(),
                computed: executed.gas_used,
            });
        }
        if executed.mineral_used != header.mineral_used() {
            return Err(BlockChainError::MineralUsedMismatch {
                claimed: header.mineral_used(),
                computed: executed.mineral_used,
            });
        }

        let rewards = RewardDistributor::new(&self.params).apply(
            &mut repository,
            header,
            block.masternodes(),
            executed.net_fees,
        )?;

        let receipts_root = receipts_root(&executed.receipts);
        if receipts_root != header.receipts_root() {
            return Err(BlockChainError::ReceiptsRootMismatch {
                claimed: header.receipts_root(),
                computed: receipts_root,
            });
        }
        if logs_bloom(&executed.receipts) != *header.logs_bloom() {
            return Err(BlockChainError::LogsBloomMismatch);
        }

        let rp = self.reward_point_for(&coinbase, parent)?;
        if header.nonce() != rp.balance {
            return Err(BlockChainError::BalanceNonceMismatch {
                claimed: header.nonce(),
                computed: rp.balance,
            });
        }
        if header.mix_hash() != rp.seed {
            return Err(BlockChainError::SeedMismatch {
                claimed: header.mix_hash(),
                computed: rp.seed,
            });
        }
        if header.reward_point() != rp.reward_point {
            return Err(BlockChainError::RewardPointMismatch {
                claimed: header.reward_point(),
                computed: rp.reward_point,
            });
        }
        let cumulative = rp.cumulative(parent.header().cumulative_reward_point());
        if header.cumulative_reward_point() != cumulative {
            return Err(BlockChainError::CumulativeRewardPointMismatch {
                claimed: header.cumulative_reward_point(),
                computed: cumulative,
            });
        }

        if repository.is_included_in_masternodes(&coinbase) {
            return Err(BlockChainError::MasternodeCannotMine(coinbase));
        }

        let min_timestamp = parent.header().timestamp() + self.params.block_time;
        if header.timestamp() < min_timestamp {
            return Err(BlockChainError::TooFast {
                timestamp: header.timestamp(),
                min: min_timestamp,
            });
        }
        let now_ms = chrono::Utc::now().timestamp_millis().max(0) as u64
            + self.params.future_block_tolerance_ms;
        let timestamp_ms = header.timestamp().saturating_mul(1_000);
        if timestamp_ms > now_ms {
            return Err(BlockChainError::FutureBlock { timestamp_ms, now_ms });
        }

        if let Some(limit) = self.params.continuous_mining_limit_at(number) {
            self.verify_continuous_mining(&coinbase, parent, limit)?;
        }

        let state_root = repository.root();
        if state_root != header.state_root() {
            return Err(BlockChainError::StateRootMismatch {
                claimed: header.state_root(),
                computed: state_root,
            });
        }

        trace!(header = ?block.hash(), level = number, receipts = executed.receipts.len(), "block verified");
        Ok(AppliedBlock {
            repository,
            receipts: executed.receipts,
            rewards,
        })
    }

    /// Executes `txs` in order. Each transaction runs on its own tracked view which is
    /// folded back whether or not the transaction succeeded. With `strict` the first
    /// bad transaction fails the whole batch, otherwise it is left out.
    pub(crate) fn execute_transactions(
        &self,
        repository: &mut S::Repository,
        header: &BlockHeader,
        txs: &[Transaction],
        strict: bool,
    ) -> Result<ExecutedTransactions, BlockChainError> {
        let mut out = ExecutedTransactions::default();
        let mut nonces: BTreeMap<Address, u64> = BTreeMap::new();

        for (index, tx) in txs.iter().enumerate() {
            let expected = *nonces
                .entry(tx.from)
                .or_insert_with(|| repository.nonce(&tx.from));
            if tx.nonce != expected {
                if strict {
                    return Err(BlockChainError::InvalidNonceSequence {
                        address: tx.from,
                        expected,
                        found: tx.nonce,
                    });
                }
                debug!(tx = ?tx.hash(), expected, found = tx.nonce, "skipping transaction out of nonce order");
                continue;
            }

            let mut track = repository.start_tracking();
            let ctx = ExecutionContext {
                tx,
                coinbase: header.coinbase(),
                chain: self.block_storage.as_ref(),
                block: header,
                cumulative_gas_used: out.gas_used,
                cumulative_mineral_used: out.mineral_used,
            };
            let outcome = match self.executor.execute(ctx, &mut track) {
                Ok(outcome) => outcome,
                Err(e) if strict => {
                    return Err(BlockChainError::TransactionRejected {
                        index,
                        reason: e.to_string(),
                    })
                }
                Err(e) => {
                    debug!(tx = ?tx.hash(), error = %e, "skipping transaction");
                    continue;
                }
            };
            if track.check_masternode_collateral(&tx.from) {
                debug!(masternode = ?tx.from, level = header.number(), "masternode collateral spent, registration dropped");
            }
            repository.commit_child(track);
            nonces.insert(tx.from, expected + 1);

            let mut receipt = outcome.receipt;
            receipt.post_state = repository.root();
            out.gas_used += outcome.gas_used;
            out.mineral_used += outcome.mineral_used;
            out.net_fees = out
                .net_fees
                .saturating_add(outcome.fee.saturating_sub(outcome.mineral_used));
            out.receipts.push(receipt);
            out.included.push(tx.clone());
        }
        Ok(out)
    }

    fn verify_masternodes(&self, repository: &S::Repository, block: &Block) -> Result<(), BlockChainError> {
        let header = block.header();
        for address in block.masternodes().addresses() {
            if repository.mn_start_balance(address) == 0 {
                return Err(BlockChainError::UnregisteredMasternode(*address));
            }
        }
        let computed = collect_masternode_sets(repository, &self.params, header.number());
        let computed_hash = computed.hash();
        let carried_hash = block.masternodes().hash();
        if carried_hash != computed_hash || header.masternode_set_hash() != computed_hash {
            return Err(BlockChainError::MasternodeSetMismatch {
                claimed: header.masternode_set_hash(),
                computed: computed_hash,
            });
        }
        let treasury = repository.balance(&self.params.masternode_storage);
        let basic = calc_basic_masternode_reward(&self.params, treasury, &computed);
        if header.masternode_reward() != basic {
            return Err(BlockChainError::MasternodeRewardMismatch {
                claimed: header.masternode_reward(),
                computed: basic,
            });
        }
        Ok(())
    }

    fn verify_continuous_mining(&self, coinbase: &Address, parent: &Block, limit: u64) -> Result<(), BlockChainError> {
        let mut ancestor = Some(parent.clone());
        for _ in 0..limit {
            let block = match ancestor {
                Some(block) => block,
                None => break,
            };
            if block.coinbase() == *coinbase {
                return Err(BlockChainError::ContinuousMining {
                    coinbase: *coinbase,
                    ancestor: block.number(),
                });
            }
            ancestor = if block.is_genesis() {
                None
            } else {
                self.block_storage.get_block_by_hash(&block.parent_hash())?
            };
        }
        Ok(())
    }

    /// Reward point of `coinbase` on top of `parent`, drawn from its balance a fixed
    /// number of ancestors back (or at genesis on a short chain).
    pub(crate) fn reward_point_for(&self, coinbase: &Address, parent: &Block) -> Result<RewardPoint, BlockChainError> {
        let mut sample = parent.clone();
        for _ in 0..self.params.reward_point_balance_depth {
            if sample.is_genesis() {
                break;
            }
            sample = self
                .block_storage
                .get_block_by_hash(&sample.parent_hash())?
                .ok_or(BlockChainError::BlockNotFound(sample.parent_hash()))?;
        }
        let balance = self
            .state
            .snapshot_at(&sample.header().state_root())?
            .balance(coinbase);
        Ok(RewardPoint::compute(coinbase, balance, &parent.hash()))
    }

    fn commit_state(&self, block: &Block, repository: S::Repository) -> Result<(), BlockChainError> {
        let verified = block.header().state_root();
        let committed = self.state.commit(repository)?;
        if committed != verified {
            return Err(BlockChainError::CommitDivergence { verified, committed });
        }
        Ok(())
    }

    fn store_block(&self, block: &Block, receipts: &[TransactionReceipt], main_chain: bool) -> Result<()> {
        let hash = block.hash();
        self.block_storage
            .save_block(block, block.header().cumulative_reward_point(), main_chain)?;
        for (index, receipt) in receipts.iter().enumerate() {
            self.tx_storage.put(TransactionInfo {
                receipt: receipt.clone(),
                block_hash: hash,
                index: index as u32,
            })?;
        }
        debug!(level = block.number(), header = ?hash, reward_point = %block.header().cumulative_reward_point(), "Block saved");
        if block.number() % 100 == 0 {
            info!(level = block.number(), "*** Last block added");
        }
        Ok(())
    }

    fn set_head(&self, block: &Block, total_reward_point: U256) -> Result<()> {
        self.chain_state.set_current_head(block.hash())?;
        let mut head = self.head.write().map_err(|_| BlockChainError::RWPoison)?;
        *head = ChainHead {
            block: Arc::new(block.clone()),
            total_reward_point,
        };
        Ok(())
    }

    fn current_head(&self) -> Result<ChainHead> {
        let head = self.head.read().map_err(|_| BlockChainError::RWPoison)?;
        Ok(head.clone())
    }

    fn notify(&self, block: &Block, rewards: Rewards, receipts: Vec<TransactionReceipt>, best: bool) {
        self.send(LocalEventMessage::BlockImported {
            block: Arc::new(block.clone()),
            rewards: rewards.credits,
            receipts,
            best,
        });
    }

    fn send(&self, message: LocalEventMessage) {
        if let Some(sender) = &self.sender {
            if let Err(e) = sender.send(message) {
                warn!(error = %e, "event listener dropped");
            }
        }
    }

    /// Recomputes stored cumulative reward points from `start_from` up to the highest
    /// indexed height. Takes the import lock one height at a time.
    pub fn update_block_total_reward_points(&self, start_from: u64) -> Result<usize> {
        let max = match self.block_storage.get_max_number()? {
            Some(max) => max,
            None => return Ok(0),
        };
        let mut changed = 0;
        for number in start_from..=max {
            let _guard = self.import_lock.lock().map_err(|_| BlockChainError::RWPoison)?;
            changed += self.block_storage.update_total_reward_points(number)?;
            if number % 1_000 == 0 {
                debug!(level = number, changed, "total reward point maintenance");
            }
        }

        let _guard = self.import_lock.lock().map_err(|_| BlockChainError::RWPoison)?;
        let mut head = self.head.write().map_err(|_| BlockChainError::RWPoison)?;
        head.total_reward_point = self
            .block_storage
            .get_total_reward_point_for_hash(&head.block.hash())?;
        info!(from = start_from, to = max, changed, "total reward points updated");
        Ok(changed)
    }

    pub fn best_block(&self) -> Result<Arc<Block>> {
        Ok(self.current_head()?.block)
    }

    pub fn total_reward_point(&self) -> Result<U256> {
        Ok(self.current_head()?.total_reward_point)
    }

    /// Repository over the state of the current head.
    pub fn best_repository(&self) -> Result<S::Repository> {
        let head = self.current_head()?;
        self.state.snapshot_at(&head.block.header().state_root())
    }

    pub fn get_block_by_hash(&self, hash: &H256) -> Result<Option<Block>> {
        self.block_storage.get_block_by_hash(hash)
    }

    pub fn get_block_by_number(&self, number: u64) -> Result<Option<Block>> {
        self.block_storage.get_chain_block_by_number(number)
    }

    pub fn get_blocks_by_number(&self, number: u64) -> Result<Vec<Block>> {
        self.block_storage.get_blocks_by_number(number)
    }

    pub fn get_list_hashes_end_with(&self, hash: &H256, qty: usize) -> Result<Vec<H256>> {
        self.block_storage.get_list_hashes_end_with(hash, qty)
    }

    pub fn get_list_of_hashes_start_from_block(&self, number: u64, qty: usize) -> Result<Vec<H256>> {
        self.block_storage.get_list_of_hashes_start_from_block(number, qty)
    }

    /// Receipt and location of a transaction, preferring the copy on the main chain
    /// when the transaction was executed on several branches.
    pub fn get_transaction_info(&self, hash: &H256) -> Result<Option<TransactionInfo>> {
        let mut infos = self.tx_storage.get(hash)?;
        if infos.len() <= 1 {
            return Ok(infos.pop());
        }
        for info in &infos {
            let block = match self.block_storage.get_block_by_hash(&info.block_hash)? {
                Some(block) => block,
                None => continue,
            };
            let main = self.block_storage.get_chain_block_by_number(block.number())?;
            if main.map(|main| main.hash()) == Some(info.block_hash) {
                return Ok(Some(info.clone()));
            }
        }
        Ok(infos.into_iter().next())
    }

    pub fn block_storage(&self) -> Arc<BlockStorage> {
        self.block_storage.clone()
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }
}

/// Applies the premine and stores the genesis block as the first main chain entry.
/// Genesis fields are taken as given.
fn install_genesis<S: StateStore>(state: &S, block_storage: &BlockStorage, genesis: &Genesis) -> Result<Block> {
    let mut repository = state.empty();
    for (address, account) in &genesis.alloc {
        repository.put_account_state(
            *address,
            AccountState {
                balance: account.balance,
                nonce: account.nonce,
                mineral: account.mineral,
                rewards: 0,
                masternode: account.masternode.clone(),
            },
        );
    }
    let root = state.commit(repository)?;
    let block = genesis.to_block(root);
    block_storage.save_block(&block, block.header().cumulative_reward_point(), true)?;
    Ok(block)
}
