use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::RwLock;

use anyhow::Result;

use codec::{Decoder, Encoder};

use crate::error::StorageError;
use crate::{KVStore, Schema, StorageIterator};

type Column = BTreeMap<Arc<Vec<u8>>, Arc<Vec<u8>>>;

#[derive(Debug, Default)]
pub struct ColumnMemStore {
    inner: Arc<RwLock<Column>>,
}

#[derive(Debug)]
pub struct MemStore {
    inner: Arc<BTreeMap<&'static str, Arc<ColumnMemStore>>>,
}

pub struct MemStoreIterator {
    cursor: usize,
    inner: Vec<(Arc<Vec<u8>>, Arc<Vec<u8>>)>,
}

impl MemStoreIterator {
    fn new(store: &RwLock<Column>) -> Result<Self> {
        let store = store.read().map_err(|_| StorageError::RWPoison)?;
        Ok(Self {
            cursor: 0,
            inner: store.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        })
    }
}

impl Iterator for MemStoreIterator {
    type Item = (Arc<Vec<u8>>, Arc<Vec<u8>>);

    fn next(&mut self) -> Option<Self::Item> {
        let res = self
            .inner
            .get(self.cursor)
            .map(|(k, v)| (k.clone(), v.clone()));
        self.cursor += 1;
        res
    }
}

impl MemStore {
    pub fn new(columns: Vec<&'static str>) -> Self {
        let columns: BTreeMap<_, _> = columns
            .iter()
            .map(|name| (*name, Arc::new(ColumnMemStore::default())))
            .collect();
        Self {
            inner: Arc::new(columns),
        }
    }

    fn column(&self, name: &'static str) -> Result<Arc<ColumnMemStore>> {
        match self.inner.get(name) {
            None => Err(StorageError::ColumnNotRegistered(name).into()),
            Some(col) => Ok(col.clone()),
        }
    }
}

impl<S: Schema> KVStore<S> for MemStore {
    fn get(&self, key: &S::Key) -> Result<Option<S::Value>> {
        let key = key.encode()?;
        match self.column(S::column())?.get(key)? {
            None => Ok(None),
            Some(value) => Ok(Some(S::Value::decode(&value)?)),
        }
    }

    fn put(&self, key: S::Key, value: S::Value) -> Result<()> {
        let key = key.encode()?;
        let value = value.encode()?;
        self.column(S::column())?.put(key, value)
    }

    fn delete(&self, key: &S::Key) -> Result<()> {
        let key = key.encode()?;
        self.column(S::column())?.delete(key)
    }

    fn contains(&self, key: &S::Key) -> Result<bool> {
        let key = key.encode()?;
        self.column(S::column())?.contains(key)
    }

    fn iter(&self) -> Result<StorageIterator<S>> {
        Ok(Box::new(
            self.column(S::column())?
                .iter()?
                .map(|(k, v)| (S::Key::decode(&k), S::Value::decode(&v))),
        ))
    }
}

impl ColumnMemStore {
    fn get(&self, key: Vec<u8>) -> Result<Option<Vec<u8>>> {
        let store = self.inner.read().map_err(|_| StorageError::RWPoison)?;
        Ok(store.get(&key).map(|value| value.as_ref().clone()))
    }

    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        let mut store = self.inner.write().map_err(|_| StorageError::RWPoison)?;
        store.insert(Arc::new(key), Arc::new(value));
        Ok(())
    }

    fn delete(&self, key: Vec<u8>) -> Result<()> {
        let mut store = self.inner.write().map_err(|_| StorageError::RWPoison)?;
        store.remove(&key);
        Ok(())
    }

    fn contains(&self, key: Vec<u8>) -> Result<bool> {
        let store = self.inner.read().map_err(|_| StorageError::RWPoison)?;
        Ok(store.contains_key(&key))
    }

    fn iter(&self) -> Result<MemStoreIterator> {
        MemStoreIterator::new(&self.inner)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use codec::impl_codec;

    use super::*;

    #[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
    struct Entry {
        name: String,
    }

    impl_codec!(Entry);

    struct Entries;

    impl Schema for Entries {
        type Key = u64;
        type Value = Entry;

        fn column() -> &'static str {
            "entries"
        }
    }

    struct Unregistered;

    impl Schema for Unregistered {
        type Key = u64;
        type Value = u64;

        fn column() -> &'static str {
            "unregistered"
        }
    }

    #[test]
    fn test_put_get_delete() {
        let store = MemStore::new(vec![Entries::column()]);
        let kv: &dyn KVStore<Entries> = &store;
        kv.put(7, Entry { name: "seven".into() }).unwrap();
        assert!(kv.contains(&7).unwrap());
        assert_eq!(kv.get(&7).unwrap().unwrap().name, "seven");
        kv.delete(&7).unwrap();
        assert!(kv.get(&7).unwrap().is_none());
    }

    #[test]
    fn test_iter_is_ordered_by_key() {
        let store = MemStore::new(vec![Entries::column()]);
        let kv: &dyn KVStore<Entries> = &store;
        for key in [300_u64, 2, 45] {
            kv.put(key, Entry { name: key.to_string() }).unwrap();
        }
        let keys: Vec<u64> = kv.iter().unwrap().map(|(k, _)| k.unwrap()).collect();
        assert_eq!(keys, vec![2, 45, 300]);
    }

    #[test]
    fn test_unregistered_column() {
        let store = MemStore::new(vec![Entries::column()]);
        let kv: &dyn KVStore<Unregistered> = &store;
        assert!(kv.put(1, 1).is_err());
    }
}
