use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tracing::trace;

use codec::impl_codec;
use primitive_types::H256;
use storage::{KVStore, PersistentStorage, Schema};
use traits::{Repository, StateStore};
use types::account::AccountState;
use types::masternode::{MasternodeInfo, MasternodeTier, RegistrationClass};
use types::Address;

use crate::error::StateError;

pub mod error;

pub type StateSnapshotKV = dyn KVStore<StateSnapshots> + Send + Sync;

pub struct StateSnapshots;

impl Schema for StateSnapshots {
    type Key = H256;
    type Value = WorldState;

    fn column() -> &'static str {
        "state_snapshot"
    }
}

/// Full account set at one root. Never mutated once committed.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct WorldState {
    accounts: BTreeMap<Address, AccountState>,
}

impl_codec!(WorldState);

impl WorldState {
    pub fn root(&self) -> H256 {
        account_root(self.accounts.iter())
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

fn account_root<'a, I>(accounts: I) -> H256
where
    I: Iterator<Item = (&'a Address, &'a AccountState)>,
{
    crypto::ordered_root(
        accounts
            .filter(|(_, account)| !account.is_empty())
            .map(|(address, account)| {
                let mut leaf = address.as_bytes().to_vec();
                leaf.extend(account.root_input());
                leaf
            }),
    )
}

/// Snapshots kept decoded in memory. Older ones are read back from the column.
const SNAPSHOT_CACHE_SIZE: usize = 64;

/// Root addressed snapshot store. Snapshots are shared through `Arc` and a repository
/// only ever layers its own changes on top of one.
pub struct State {
    cache: Mutex<LruCache<H256, Arc<WorldState>>>,
    kv: Arc<StateSnapshotKV>,
}

impl State {
    pub fn in_memory() -> Self {
        let storage = PersistentStorage::in_memory(vec![StateSnapshots::column()]);
        Self::new(storage.kv::<StateSnapshots>())
    }

    pub fn new(kv: Arc<StateSnapshotKV>) -> Self {
        Self::with_capacity(kv, SNAPSHOT_CACHE_SIZE)
    }

    pub fn with_capacity(kv: Arc<StateSnapshotKV>, capacity: usize) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(capacity.max(1))),
            kv,
        }
    }

    fn load(&self, root: &H256) -> Result<Option<Arc<WorldState>>> {
        let empty = WorldState::default();
        if *root == empty.root() {
            return Ok(Some(Arc::new(empty)));
        }
        let mut cache = self.cache.lock().map_err(|_| StateError::RWPoison)?;
        if let Some(world) = cache.get(root) {
            return Ok(Some(world.clone()));
        }
        match self.kv.get(root)? {
            None => Ok(None),
            Some(world) => {
                let world = Arc::new(world);
                cache.put(*root, world.clone());
                Ok(Some(world))
            }
        }
    }
}

impl StateStore for State {
    type Repository = StateRepository;

    fn empty(&self) -> StateRepository {
        StateRepository::new(Arc::new(WorldState::default()))
    }

    fn snapshot_at(&self, root: &H256) -> Result<StateRepository> {
        match self.load(root)? {
            None => Err(StateError::UnknownRoot(*root).into()),
            Some(world) => Ok(StateRepository::new(world)),
        }
    }

    fn contains_root(&self, root: &H256) -> bool {
        matches!(self.load(root), Ok(Some(_)))
    }

    fn commit(&self, repository: StateRepository) -> Result<H256> {
        let world = repository.into_world_state();
        let root = world.root();
        if !self.kv.contains(&root)? {
            self.kv.put(root, world.clone())?;
            trace!(root = ?root, accounts = world.len(), "state snapshot committed");
        }
        self.cache
            .lock()
            .map_err(|_| StateError::RWPoison)?
            .put(root, Arc::new(world));
        Ok(root)
    }
}

pub struct StateRepository {
    base: Arc<WorldState>,
    changes: BTreeMap<Address, AccountState>,
}

impl StateRepository {
    fn new(base: Arc<WorldState>) -> Self {
        Self {
            base,
            changes: Default::default(),
        }
    }

    fn into_world_state(self) -> WorldState {
        if self.changes.is_empty() {
            return self.base.as_ref().clone();
        }
        let mut accounts = self.base.accounts.clone();
        accounts.extend(self.changes);
        WorldState { accounts }
    }

    /// Base accounts overlaid with local changes, in address order.
    fn accounts(&self) -> impl Iterator<Item = (&Address, &AccountState)> + '_ {
        let mut base = self.base.accounts.iter().peekable();
        let mut changes = self.changes.iter().peekable();
        std::iter::from_fn(move || {
            let order = match (base.peek(), changes.peek()) {
                (Some((b, _)), Some((c, _))) => b.cmp(c),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => return None,
            };
            match order {
                Ordering::Less => base.next(),
                Ordering::Equal => {
                    base.next();
                    changes.next()
                }
                Ordering::Greater => changes.next(),
            }
        })
    }

    fn update<F, T>(&mut self, address: &Address, f: F) -> Result<T>
    where
        F: FnOnce(&mut AccountState) -> Result<T>,
    {
        let mut account = self.account_state(address);
        let out = f(&mut account)?;
        self.changes.insert(*address, account);
        Ok(out)
    }
}

impl Repository for StateRepository {
    fn root(&self) -> H256 {
        if self.changes.is_empty() {
            return self.base.root();
        }
        account_root(self.accounts())
    }

    fn start_tracking(&self) -> Self {
        Self {
            base: self.base.clone(),
            changes: self.changes.clone(),
        }
    }

    fn commit_child(&mut self, child: Self) {
        self.changes = child.changes;
    }

    fn rollback(&mut self) {
        self.changes.clear();
    }

    fn account_state(&self, address: &Address) -> AccountState {
        self.changes
            .get(address)
            .or_else(|| self.base.accounts.get(address))
            .cloned()
            .unwrap_or_default()
    }

    fn put_account_state(&mut self, address: Address, state: AccountState) {
        self.changes.insert(address, state);
    }

    fn add_balance(&mut self, address: &Address, amount: u128) -> Result<u128> {
        let address = *address;
        self.update(&address, |account| {
            account.balance = account
                .balance
                .checked_add(amount)
                .ok_or(StateError::BalanceOverflow(address))?;
            Ok(account.balance)
        })
    }

    fn sub_balance(&mut self, address: &Address, amount: u128) -> Result<u128> {
        let address = *address;
        self.update(&address, |account| {
            if account.balance < amount {
                return Err(StateError::InsufficientFunds {
                    address,
                    balance: account.balance,
                    required: amount,
                }
                .into());
            }
            account.balance -= amount;
            Ok(account.balance)
        })
    }

    fn sub_mineral(&mut self, address: &Address, amount: u128) -> Result<u128> {
        let address = *address;
        self.update(&address, |account| {
            account.mineral = account
                .mineral
                .checked_sub(amount)
                .ok_or(StateError::InsufficientMineral(address))?;
            Ok(account.mineral)
        })
    }

    fn increment_nonce(&mut self, address: &Address) -> u64 {
        let mut account = self.account_state(address);
        account.nonce += 1;
        let nonce = account.nonce;
        self.changes.insert(*address, account);
        nonce
    }

    fn add_reward(&mut self, address: &Address, amount: u128) -> Result<u128> {
        self.update(address, |account| {
            account.rewards = account.rewards.saturating_add(amount);
            Ok(account.rewards)
        })
    }

    fn set_masternode(&mut self, address: &Address, info: Option<MasternodeInfo>) {
        let mut account = self.account_state(address);
        account.masternode = info;
        self.changes.insert(*address, account);
    }

    fn masternode_list(
        &self,
        tier: MasternodeTier,
        class: RegistrationClass,
        at_height: Option<u64>,
    ) -> Vec<Address> {
        let matches = |account: &AccountState| match &account.masternode {
            Some(info) => {
                info.tier == tier
                    && info.class == class
                    && at_height.map_or(true, |h| info.registered_at <= h)
            }
            None => false,
        };
        self.accounts()
            .filter(|(_, account)| matches(account))
            .map(|(address, _)| *address)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rand::seq::SliceRandom;
    use tempdir::TempDir;

    use super::*;

    fn address(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    #[test]
    fn test_snapshots_are_immutable() {
        let state = State::in_memory();
        let mut repo = state.empty();
        repo.add_balance(&address(1), 100).unwrap();
        let root_a = state.commit(repo).unwrap();

        let mut repo = state.snapshot_at(&root_a).unwrap();
        repo.transfer(&address(1), &address(2), 40).unwrap();
        let root_b = state.commit(repo).unwrap();
        assert_ne!(root_a, root_b);

        let old = state.snapshot_at(&root_a).unwrap();
        assert_eq!(old.balance(&address(1)), 100);
        assert_eq!(old.balance(&address(2)), 0);
        let new = state.snapshot_at(&root_b).unwrap();
        assert_eq!(new.balance(&address(1)), 60);
        assert_eq!(new.root(), root_b);
    }

    #[test]
    fn test_root_ignores_write_order() {
        let mut accounts: Vec<(Address, u128)> = (1..=32).map(|i| (address(i), i as u128 * 10)).collect();
        let state = State::in_memory();
        let mut roots = vec![];
        for _ in 0..4 {
            accounts.shuffle(&mut rand::thread_rng());
            let mut repo = state.empty();
            for (account, balance) in &accounts {
                repo.add_balance(account, *balance).unwrap();
            }
            roots.push(repo.root());
        }
        roots.dedup();
        assert_eq!(roots.len(), 1);
    }

    #[test]
    fn test_tracking_commit_and_drop() {
        let state = State::in_memory();
        let mut repo = state.empty();
        repo.add_balance(&address(1), 10).unwrap();

        let mut child = repo.start_tracking();
        child.increment_nonce(&address(1));
        child.sub_balance(&address(1), 3).unwrap();
        assert_eq!(repo.balance(&address(1)), 10);
        repo.commit_child(child);
        assert_eq!(repo.balance(&address(1)), 7);
        assert_eq!(repo.nonce(&address(1)), 1);

        let mut dropped = repo.start_tracking();
        dropped.add_balance(&address(9), 1).unwrap();
        drop(dropped);
        assert_eq!(repo.balance(&address(9)), 0);

        repo.rollback();
        assert_eq!(repo.root(), state.empty().root());
    }

    #[test]
    fn test_evicted_snapshots_reload_from_column() {
        let storage = PersistentStorage::in_memory(vec![StateSnapshots::column()]);
        let state = State::with_capacity(storage.kv::<StateSnapshots>(), 2);
        let mut roots = vec![];
        let mut repo = state.empty();
        for i in 1..=6u8 {
            repo.add_balance(&address(i), i as u128).unwrap();
            let root = state.commit(repo).unwrap();
            roots.push(root);
            repo = state.snapshot_at(&root).unwrap();
        }
        let first = state.snapshot_at(&roots[0]).unwrap();
        assert_eq!(first.balance(&address(1)), 1);
        assert_eq!(first.balance(&address(2)), 0);
        assert_eq!(first.root(), roots[0]);
        assert!(state.contains_root(&roots[3]));
    }

    #[test]
    fn test_overlay_root_matches_committed_root() {
        let state = State::in_memory();
        let mut repo = state.empty();
        for i in (2..=20u8).step_by(2) {
            repo.add_balance(&address(i), 100).unwrap();
        }
        let base = state.commit(repo).unwrap();

        let mut repo = state.snapshot_at(&base).unwrap();
        repo.transfer(&address(2), &address(3), 40).unwrap();
        repo.sub_balance(&address(20), 100).unwrap();
        repo.add_balance(&address(1), 5).unwrap();
        repo.add_balance(&address(21), 5).unwrap();
        let overlay = repo.root();
        assert_eq!(state.commit(repo).unwrap(), overlay);
    }

    #[test]
    fn test_rewards_accumulate_apart_from_balance() {
        let state = State::in_memory();
        let mut repo = state.empty();
        repo.add_balance(&address(4), 50).unwrap();
        assert_eq!(repo.add_reward(&address(4), 30).unwrap(), 30);
        assert_eq!(repo.add_reward(&address(4), 12).unwrap(), 42);

        let account = repo.account_state(&address(4));
        assert_eq!(account.rewards, 42);
        assert_eq!(account.balance, 50);
        assert!(!account.is_empty());

        let root = state.commit(repo).unwrap();
        let restored = state.snapshot_at(&root).unwrap();
        assert_eq!(restored.account_state(&address(4)).rewards, 42);
    }

    #[test]
    fn test_insufficient_funds() {
        let state = State::in_memory();
        let mut repo = state.empty();
        assert!(repo.sub_balance(&address(1), 1).is_err());
        assert!(repo.sub_mineral(&address(1), 1).is_err());
        assert!(repo.transfer(&address(1), &address(2), 1).is_err());
    }

    #[test]
    fn test_unknown_root() {
        let state = State::in_memory();
        assert!(state.snapshot_at(&H256::repeat_byte(1)).is_err());
        assert!(state.contains_root(&state.empty().root()));
    }

    #[test]
    fn test_masternode_registry() {
        let state = State::in_memory();
        let mut repo = state.empty();
        for (byte, class, at) in [
            (3, RegistrationClass::Normal, 0),
            (1, RegistrationClass::Normal, 5),
            (2, RegistrationClass::Late, 9),
        ] {
            repo.set_masternode(
                &address(byte),
                Some(MasternodeInfo {
                    tier: MasternodeTier::General,
                    class,
                    start_balance: 10,
                    recipient: Some(address(byte + 100)),
                    registered_at: at,
                }),
            );
        }
        let root = state.commit(repo).unwrap();
        let repo = state.snapshot_at(&root).unwrap();
        assert_eq!(
            repo.masternode_list(MasternodeTier::General, RegistrationClass::Normal, None),
            vec![address(1), address(3)]
        );
        assert_eq!(
            repo.masternode_list(MasternodeTier::General, RegistrationClass::Normal, Some(4)),
            vec![address(3)]
        );
        assert!(repo
            .masternode_list(MasternodeTier::Major, RegistrationClass::Normal, None)
            .is_empty());
        assert!(repo.is_included_in_masternodes(&address(2)));
        assert_eq!(repo.mn_recipient(&address(2)), Some(address(102)));
        assert_eq!(repo.mn_start_balance(&address(4)), 0);
    }

    #[test]
    fn test_persisted_snapshots_survive_restart() {
        let dir = TempDir::new("state").unwrap();
        let root = {
            let storage =
                PersistentStorage::open_rocksdb(dir.path(), vec![StateSnapshots::descriptor()])
                    .unwrap();
            let state = State::new(storage.kv::<StateSnapshots>());
            let mut repo = state.empty();
            repo.add_balance(&address(7), 77).unwrap();
            state.commit(repo).unwrap()
        };
        let storage =
            PersistentStorage::open_rocksdb(dir.path(), vec![StateSnapshots::descriptor()])
                .unwrap();
        let state = State::new(storage.kv::<StateSnapshots>());
        assert_eq!(state.snapshot_at(&root).unwrap().balance(&address(7)), 77);
    }
}
