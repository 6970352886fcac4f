use anyhow::Result;

use primitive_types::H256;
use types::account::AccountState;
use types::block::{Block, BlockHeader};
use types::masternode::{MasternodeInfo, MasternodeTier, RegistrationClass};
use types::receipt::TransactionReceipt;
use types::tx::Transaction;
use types::Address;

/// Mutable view of world state layered over an immutable snapshot.
///
/// A repository never writes through to the snapshot it was opened on; changes only
/// become durable once handed back to [`StateStore::commit`].
pub trait Repository: Send + Sized {
    /// Root of the state as currently seen through this view.
    fn root(&self) -> H256;

    /// Nested view whose writes reach `self` only through [`Repository::commit_child`].
    fn start_tracking(&self) -> Self;

    fn commit_child(&mut self, child: Self);

    /// Drops every write made through this view.
    fn rollback(&mut self);

    fn account_state(&self, address: &Address) -> AccountState;

    fn put_account_state(&mut self, address: Address, state: AccountState);

    fn balance(&self, address: &Address) -> u128 {
        self.account_state(address).balance
    }

    fn nonce(&self, address: &Address) -> u64 {
        self.account_state(address).nonce
    }

    fn mineral(&self, address: &Address) -> u128 {
        self.account_state(address).mineral
    }

    fn add_balance(&mut self, address: &Address, amount: u128) -> Result<u128>;

    fn sub_balance(&mut self, address: &Address, amount: u128) -> Result<u128>;

    fn sub_mineral(&mut self, address: &Address, amount: u128) -> Result<u128>;

    fn increment_nonce(&mut self, address: &Address) -> u64;

    fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> Result<()> {
        self.sub_balance(from, amount)?;
        self.add_balance(to, amount)?;
        Ok(())
    }

    /// Bumps the cumulative reward counter of an account. Balance is untouched.
    fn add_reward(&mut self, address: &Address, amount: u128) -> Result<u128>;

    fn set_masternode(&mut self, address: &Address, info: Option<MasternodeInfo>);

    fn masternode(&self, address: &Address) -> Option<MasternodeInfo> {
        self.account_state(address).masternode
    }

    /// Registered masternodes of a tier and class in address order. With `at_height`
    /// only registrations made at or before that height are returned.
    fn masternode_list(
        &self,
        tier: MasternodeTier,
        class: RegistrationClass,
        at_height: Option<u64>,
    ) -> Vec<Address>;

    fn mn_start_balance(&self, address: &Address) -> u128 {
        self.masternode(address)
            .map(|info| info.start_balance)
            .unwrap_or_default()
    }

    fn mn_recipient(&self, address: &Address) -> Option<Address> {
        self.masternode(address).and_then(|info| info.recipient)
    }

    fn is_included_in_masternodes(&self, address: &Address) -> bool {
        self.masternode(address).is_some()
    }

    /// Drops the registration of `address` once its balance is below the collateral it
    /// registered with. Returns true when a registration was dropped.
    fn check_masternode_collateral(&mut self, address: &Address) -> bool {
        match self.masternode(address) {
            Some(info) if self.balance(address) < info.start_balance => {
                self.set_masternode(address, None);
                true
            }
            _ => false,
        }
    }
}

/// Root addressed, copy-on-write world state.
pub trait StateStore: Send + Sync {
    type Repository: Repository;

    fn empty(&self) -> Self::Repository;

    /// View over the snapshot committed under `root`.
    fn snapshot_at(&self, root: &H256) -> Result<Self::Repository>;

    fn contains_root(&self, root: &H256) -> bool;

    /// Freezes the repository into a new snapshot and returns its root.
    fn commit(&self, repository: Self::Repository) -> Result<H256>;
}

pub trait ChainHeadReader: Send + Sync {
    fn get_block_by_hash(&self, hash: &H256) -> Result<Option<Block>>;
    fn get_chain_block_by_number(&self, number: u64) -> Result<Option<Block>>;
}

pub struct ExecutionContext<'a> {
    pub tx: &'a Transaction,
    pub coinbase: Address,
    pub chain: &'a dyn ChainHeadReader,
    pub block: &'a BlockHeader,
    pub cumulative_gas_used: u64,
    pub cumulative_mineral_used: u128,
}

#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub receipt: TransactionReceipt,
    pub gas_used: u64,
    pub mineral_used: u128,
    /// Gas fee charged to the sender, including the part paid with mineral.
    pub fee: u128,
}

pub trait TransactionExecutor<R: Repository>: Send + Sync {
    /// Runs one transaction against `repository`. An error means the transaction can not
    /// be included at all; a failed but includable transaction returns a receipt with
    /// its error set.
    fn execute(&self, ctx: ExecutionContext, repository: &mut R) -> Result<ExecutionOutcome>;
}

pub trait BlockSource {
    fn next_block(&mut self) -> Result<Option<Block>>;
}
