use std::sync::{Arc, RwLock};

use anyhow::Result;
use tracing::{debug, info, trace};

use primitive_types::{H256, U256};
use storage::{KVStore, PersistentStorage, Schema};
use traits::ChainHeadReader;
use types::block::{Block, BlockInfo};

use crate::errors::BlockChainError;

pub type BlockInfoKV = dyn KVStore<BlockInfoByNumber> + Send + Sync;
pub type BlockByHashKV = dyn KVStore<BlockByHash> + Send + Sync;

pub struct BlockInfoByNumber;

impl Schema for BlockInfoByNumber {
    type Key = u64;
    type Value = Vec<BlockInfo>;

    fn column() -> &'static str {
        "block_info"
    }
}

pub struct BlockByHash;

impl Schema for BlockByHash {
    type Key = H256;
    type Value = Block;

    fn column() -> &'static str {
        "block_by_hash"
    }
}

#[derive(Debug, Default)]
struct IndexMeta {
    max_number: Option<u64>,
}

/// Height index of every validated block, competing forks included.
///
/// At most one entry per height carries the main chain flag. Writers are serialized
/// by the index lock; readers only exclude writers.
pub struct BlockStorage {
    lock: RwLock<IndexMeta>,
    index: Arc<BlockInfoKV>,
    blocks: Arc<BlockByHashKV>,
}

impl BlockStorage {
    pub fn new(storage: &PersistentStorage) -> Result<Self> {
        let index = storage.kv::<BlockInfoByNumber>();
        let mut max_number = None;
        for (number, _) in index.iter()? {
            let number = number?;
            max_number = max_number.max(Some(number));
        }
        Ok(Self {
            lock: RwLock::new(IndexMeta { max_number }),
            index,
            blocks: storage.kv::<BlockByHash>(),
        })
    }

    pub fn save_block(&self, block: &Block, cumulative_reward_point: U256, main_chain: bool) -> Result<()> {
        let mut meta = self.lock.write().map_err(|_| BlockChainError::RWPoison)?;
        let hash = block.hash();
        let number = block.number();
        self.blocks.put(hash, block.clone())?;

        let mut infos = self.block_infos(number)?;
        if main_chain {
            for info in infos.iter_mut() {
                info.set_main_chain(false);
            }
        }
        let info = BlockInfo::new(hash, cumulative_reward_point, main_chain);
        match infos.iter_mut().find(|i| i.hash() == hash) {
            Some(existing) => *existing = info,
            None => infos.push(info),
        }
        self.index.put(number, infos)?;
        meta.max_number = meta.max_number.max(Some(number));
        trace!(header = ?hash, level = number, main_chain, "block saved");
        Ok(())
    }

    pub fn get_max_number(&self) -> Result<Option<u64>> {
        let meta = self.lock.read().map_err(|_| BlockChainError::RWPoison)?;
        Ok(meta.max_number)
    }

    pub fn is_block_exist(&self, hash: &H256) -> Result<bool> {
        self.blocks.contains(hash)
    }

    pub fn get_block_by_hash(&self, hash: &H256) -> Result<Option<Block>> {
        self.blocks.get(hash)
    }

    pub fn get_block_infos(&self, number: u64) -> Result<Vec<BlockInfo>> {
        let _meta = self.lock.read().map_err(|_| BlockChainError::RWPoison)?;
        self.block_infos(number)
    }

    /// Main chain block at `number`. When the height has no entries at all the scan
    /// continues downward to the closest indexed height.
    pub fn get_chain_block_by_number(&self, number: u64) -> Result<Option<Block>> {
        let meta = self.lock.read().map_err(|_| BlockChainError::RWPoison)?;
        match meta.max_number {
            Some(max) if number <= max => {}
            _ => return Ok(None),
        }
        let mut level = number;
        loop {
            let infos = self.block_infos(level)?;
            if !infos.is_empty() {
                return self.main_block_of(&infos);
            }
            if level == 0 {
                return Ok(None);
            }
            level -= 1;
        }
    }

    pub fn get_blocks_by_number(&self, number: u64) -> Result<Vec<Block>> {
        let _meta = self.lock.read().map_err(|_| BlockChainError::RWPoison)?;
        let mut blocks = Vec::new();
        for info in self.block_infos(number)? {
            if let Some(block) = self.blocks.get(&info.hash())? {
                blocks.push(block);
            }
        }
        Ok(blocks)
    }

    pub fn get_total_reward_point_for_hash(&self, hash: &H256) -> Result<U256> {
        let _meta = self.lock.read().map_err(|_| BlockChainError::RWPoison)?;
        self.total_reward_point_for_hash(hash)
    }

    /// Highest main chain block, scanning down when the top height holds only forks.
    pub fn get_best_block(&self) -> Result<Option<Block>> {
        let meta = self.lock.read().map_err(|_| BlockChainError::RWPoison)?;
        self.best_block_below(meta.max_number)
    }

    /// Hashes from `hash` back towards genesis, newest first.
    pub fn get_list_hashes_end_with(&self, hash: &H256, qty: usize) -> Result<Vec<H256>> {
        let mut hashes = Vec::with_capacity(qty);
        let mut cursor = self.blocks.get(hash)?;
        while let Some(block) = cursor {
            if hashes.len() >= qty {
                break;
            }
            hashes.push(block.hash());
            if block.is_genesis() {
                break;
            }
            cursor = self.blocks.get(&block.parent_hash())?;
        }
        Ok(hashes)
    }

    /// Main chain hashes from `number` upward, oldest first.
    pub fn get_list_of_hashes_start_from_block(&self, number: u64, qty: usize) -> Result<Vec<H256>> {
        let meta = self.lock.read().map_err(|_| BlockChainError::RWPoison)?;
        let max = match meta.max_number {
            Some(max) => max,
            None => return Ok(vec![]),
        };
        let mut hashes = Vec::with_capacity(qty);
        let mut level = number;
        while level <= max && hashes.len() < qty {
            if let Some(info) = self.block_infos(level)?.into_iter().find(|i| i.main_chain()) {
                hashes.push(info.hash());
            }
            level += 1;
        }
        Ok(hashes)
    }

    /// Moves the main chain flag onto the branch ending at `fork_tip`.
    ///
    /// Both tips first walk down to a common height, then step down together until
    /// they meet; every entry on the abandoned branch loses the flag and every entry on
    /// the adopted branch gains it.
    pub fn re_branch(&self, fork_tip: &Block) -> Result<()> {
        let meta = self.lock.write().map_err(|_| BlockChainError::RWPoison)?;
        let best = self.best_block_below(meta.max_number)?;
        let mut best_line = match best {
            Some(best) => best,
            None => {
                self.set_main_chain(fork_tip.number(), &fork_tip.hash(), true)?;
                return Ok(());
            }
        };
        let mut fork_line = fork_tip.clone();
        info!(
            old_head = ?best_line.hash(),
            old_level = best_line.number(),
            new_head = ?fork_line.hash(),
            new_level = fork_line.number(),
            "rebranching"
        );

        while fork_line.number() > best_line.number() {
            self.set_main_chain(fork_line.number(), &fork_line.hash(), true)?;
            fork_line = self.parent_of(&fork_line)?;
        }
        while best_line.number() > fork_line.number() {
            self.set_main_chain(best_line.number(), &best_line.hash(), false)?;
            best_line = self.parent_of(&best_line)?;
        }
        while best_line.hash() != fork_line.hash() {
            self.set_main_chain(best_line.number(), &best_line.hash(), false)?;
            self.set_main_chain(fork_line.number(), &fork_line.hash(), true)?;
            if best_line.is_genesis() || fork_line.is_genesis() {
                break;
            }
            best_line = self.parent_of(&best_line)?;
            fork_line = self.parent_of(&fork_line)?;
        }
        debug!(common = ?fork_line.hash(), level = fork_line.number(), "rebranch reached common ancestor");
        Ok(())
    }

    /// Recomputes the cumulative reward point of every entry at `number` from its
    /// parent entry. Returns how many entries changed.
    pub fn update_total_reward_points(&self, number: u64) -> Result<usize> {
        let _meta = self.lock.write().map_err(|_| BlockChainError::RWPoison)?;
        let mut infos = self.block_infos(number)?;
        let mut changed = 0;
        for info in infos.iter_mut() {
            let block = self
                .blocks
                .get(&info.hash())?
                .ok_or(BlockChainError::BlockNotFound(info.hash()))?;
            let total = if block.is_genesis() {
                block.header().cumulative_reward_point()
            } else {
                self.total_reward_point_for_hash(&block.parent_hash())?
                    .saturating_add(block.header().reward_point())
            };
            if info.cumulative_reward_point() != total {
                info.set_cumulative_reward_point(total);
                changed += 1;
            }
        }
        if changed > 0 {
            self.index.put(number, infos)?;
        }
        Ok(changed)
    }

    fn block_infos(&self, number: u64) -> Result<Vec<BlockInfo>> {
        Ok(self.index.get(&number)?.unwrap_or_default())
    }

    fn main_block_of(&self, infos: &[BlockInfo]) -> Result<Option<Block>> {
        match infos.iter().find(|info| info.main_chain()) {
            None => Ok(None),
            Some(info) => self.blocks.get(&info.hash()),
        }
    }

    fn total_reward_point_for_hash(&self, hash: &H256) -> Result<U256> {
        let block = match self.blocks.get(hash)? {
            None => return Ok(U256::zero()),
            Some(block) => block,
        };
        Ok(self
            .block_infos(block.number())?
            .into_iter()
            .find(|info| info.hash() == *hash)
            .map(|info| info.cumulative_reward_point())
            .unwrap_or_default())
    }

    fn best_block_below(&self, max_number: Option<u64>) -> Result<Option<Block>> {
        let mut level = match max_number {
            None => return Ok(None),
            Some(max) => max,
        };
        loop {
            if let Some(block) = self.main_block_of(&self.block_infos(level)?)? {
                return Ok(Some(block));
            }
            if level == 0 {
                return Ok(None);
            }
            level -= 1;
        }
    }

    fn parent_of(&self, block: &Block) -> Result<Block> {
        let parent = self
            .blocks
            .get(&block.parent_hash())?
            .ok_or(BlockChainError::BlockNotFound(block.parent_hash()))?;
        Ok(parent)
    }

    fn set_main_chain(&self, number: u64, hash: &H256, main_chain: bool) -> Result<()> {
        let mut infos = self.block_infos(number)?;
        let mut touched = false;
        for info in infos.iter_mut() {
            if info.hash() == *hash {
                info.set_main_chain(main_chain);
                touched = true;
            } else if main_chain && info.main_chain() {
                info.set_main_chain(false);
                touched = true;
            }
        }
        if touched {
            self.index.put(number, infos)?;
        }
        Ok(())
    }
}

impl ChainHeadReader for BlockStorage {
    fn get_block_by_hash(&self, hash: &H256) -> Result<Option<Block>> {
        BlockStorage::get_block_by_hash(self, hash)
    }

    fn get_chain_block_by_number(&self, number: u64) -> Result<Option<Block>> {
        BlockStorage::get_chain_block_by_number(self, number)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use types::block::BlockHeader;
    use types::masternode::MasternodeSets;

    use super::*;
    use crate::column_family_names;

    fn storage() -> BlockStorage {
        BlockStorage::new(&PersistentStorage::in_memory(column_family_names())).unwrap()
    }

    fn child(parent: &Block, rp: u64, salt: u8) -> Block {
        let mut header = BlockHeader::default();
        header
            .set_number(parent.number() + 1)
            .set_parent_hash(parent.hash())
            .set_reward_point(U256::from(rp))
            .set_cumulative_reward_point(parent.header().cumulative_reward_point() + U256::from(rp))
            .set_extra_data(vec![salt]);
        Block::new(header, vec![], MasternodeSets::default())
    }

    fn save(store: &BlockStorage, block: &Block, main: bool) {
        store
            .save_block(block, block.header().cumulative_reward_point(), main)
            .unwrap();
    }

    fn main_hashes(store: &BlockStorage, from: u64, to: u64) -> Vec<H256> {
        (from..=to)
            .map(|n| store.get_chain_block_by_number(n).unwrap().unwrap().hash())
            .collect()
    }

    #[test]
    fn test_save_and_lookup() {
        let store = storage();
        let genesis = Block::default();
        save(&store, &genesis, true);
        let a1 = child(&genesis, 5, 0);
        save(&store, &a1, true);
        assert_eq!(store.get_max_number().unwrap(), Some(1));
        assert_eq!(store.get_chain_block_by_number(1).unwrap(), Some(a1.clone()));
        assert_eq!(store.get_chain_block_by_number(2).unwrap(), None);
        assert_eq!(store.get_total_reward_point_for_hash(&a1.hash()).unwrap(), U256::from(5));
        assert_eq!(store.get_total_reward_point_for_hash(&H256::zero()).unwrap(), U256::zero());
        assert_eq!(store.get_best_block().unwrap(), Some(a1));
    }

    #[test]
    fn test_re_branch_longer_fork() {
        let store = storage();
        let genesis = Block::default();
        save(&store, &genesis, true);
        let a1 = child(&genesis, 10, 1);
        let a2 = child(&a1, 10, 1);
        save(&store, &a1, true);
        save(&store, &a2, true);

        let b1 = child(&genesis, 9, 2);
        let b2 = child(&b1, 9, 2);
        let b3 = child(&b2, 9, 2);
        for b in [&b1, &b2, &b3] {
            save(&store, b, false);
        }
        assert_eq!(main_hashes(&store, 1, 2), vec![a1.hash(), a2.hash()]);
        assert_eq!(store.get_best_block().unwrap(), Some(a2.clone()));

        store.re_branch(&b3).unwrap();
        assert_eq!(main_hashes(&store, 0, 3), vec![genesis.hash(), b1.hash(), b2.hash(), b3.hash()]);
        for n in 1..=3 {
            let flagged = store
                .get_block_infos(n)
                .unwrap()
                .iter()
                .filter(|i| i.main_chain())
                .count();
            assert_eq!(flagged, 1);
        }

        // and back onto the shorter branch
        store.re_branch(&a2).unwrap();
        assert_eq!(main_hashes(&store, 1, 2), vec![a1.hash(), a2.hash()]);
        assert!(store.get_block_infos(3).unwrap().iter().all(|i| !i.main_chain()));
        assert_eq!(store.get_best_block().unwrap(), Some(a2));
        assert_eq!(store.get_blocks_by_number(3).unwrap(), vec![b3]);
    }

    #[test]
    fn test_hash_lists() {
        let store = storage();
        let genesis = Block::default();
        save(&store, &genesis, true);
        let mut chain = vec![genesis];
        for i in 0..5 {
            let next = child(chain.last().unwrap(), 1, i);
            save(&store, &next, true);
            chain.push(next);
        }
        let ascending = store.get_list_of_hashes_start_from_block(2, 3).unwrap();
        assert_eq!(ascending, chain[2..5].iter().map(|b| b.hash()).collect::<Vec<_>>());
        let descending = store.get_list_hashes_end_with(&chain[5].hash(), 10).unwrap();
        assert_eq!(descending.len(), 6);
        assert_eq!(descending[0], chain[5].hash());
        assert_eq!(descending[5], chain[0].hash());
    }

    #[test]
    fn test_update_total_reward_points() {
        let store = storage();
        let genesis = Block::default();
        save(&store, &genesis, true);
        let a1 = child(&genesis, 4, 0);
        let a2 = child(&a1, 6, 0);
        store.save_block(&a1, U256::zero(), true).unwrap();
        store.save_block(&a2, U256::zero(), true).unwrap();

        assert_eq!(store.update_total_reward_points(0).unwrap(), 0);
        assert_eq!(store.update_total_reward_points(1).unwrap(), 1);
        assert_eq!(store.update_total_reward_points(2).unwrap(), 1);
        assert_eq!(store.get_total_reward_point_for_hash(&a2.hash()).unwrap(), U256::from(10));
        assert_eq!(store.update_total_reward_points(2).unwrap(), 0);
    }

    #[test]
    fn test_reopen_restores_max_number() {
        let dir = tempdir::TempDir::new("blocks").unwrap();
        let genesis = Block::default();
        {
            let storage =
                PersistentStorage::open_rocksdb(dir.path(), crate::column_families()).unwrap();
            let store = BlockStorage::new(&storage).unwrap();
            save(&store, &genesis, true);
            save(&store, &child(&genesis, 1, 0), true);
        }
        let storage = PersistentStorage::open_rocksdb(dir.path(), crate::column_families()).unwrap();
        let store = BlockStorage::new(&storage).unwrap();
        assert_eq!(store.get_max_number().unwrap(), Some(1));
        assert_eq!(store.get_chain_block_by_number(0).unwrap(), Some(genesis));
    }
}
