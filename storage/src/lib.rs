use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use rocksdb::{ColumnFamilyDescriptor, Options};

use codec::Codec;

use crate::memstore::MemStore;

pub mod error;
pub mod memstore;
pub mod rocks;

pub trait Schema {
    type Key: Codec + Clone;
    type Value: Codec;

    fn column() -> &'static str;

    fn descriptor() -> ColumnFamilyDescriptor {
        ColumnFamilyDescriptor::new(Self::column(), Options::default())
    }
}

pub trait KVStore<S>
where
    S: Schema,
{
    fn get(&self, key: &S::Key) -> Result<Option<S::Value>>;
    fn put(&self, key: S::Key, value: S::Value) -> Result<()>;
    fn delete(&self, key: &S::Key) -> Result<()>;
    fn contains(&self, key: &S::Key) -> Result<bool>;
    fn iter(&self) -> Result<StorageIterator<S>>;
}

pub type StorageIterator<'a, S> = Box<
    dyn 'a + Iterator<Item = (Result<<S as Schema>::Key>, Result<<S as Schema>::Value>)>,
>;

/// Backend shared by every column of a node.
pub enum PersistentStorage {
    InMemory(Arc<MemStore>),
    RocksDB(Arc<rocksdb::DB>),
}

impl PersistentStorage {
    pub fn in_memory(columns: Vec<&'static str>) -> Self {
        PersistentStorage::InMemory(Arc::new(MemStore::new(columns)))
    }

    pub fn open_rocksdb<P: AsRef<Path>>(
        path: P,
        columns: Vec<ColumnFamilyDescriptor>,
    ) -> Result<Self> {
        let db = rocksdb::DB::open_cf_descriptors(&rocks::default_db_opts(), path, columns)?;
        Ok(PersistentStorage::RocksDB(Arc::new(db)))
    }

    pub fn kv<S>(&self) -> Arc<dyn KVStore<S> + Send + Sync>
    where
        S: Schema,
    {
        match self {
            PersistentStorage::InMemory(store) => store.clone(),
            PersistentStorage::RocksDB(db) => db.clone(),
        }
    }
}
