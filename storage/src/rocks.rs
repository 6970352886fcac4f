use anyhow::anyhow;

use codec::{Decoder, Encoder};

use crate::error::StorageError;
use crate::{KVStore, Schema, StorageIterator};

pub fn default_db_opts() -> rocksdb::Options {
    let mut opts = rocksdb::Options::default();
    opts.create_if_missing(true);
    opts.create_missing_column_families(true);
    opts.set_atomic_flush(true);
    opts.set_max_log_file_size(1_000_000);
    opts.set_recycle_log_file_num(5);
    opts.set_keep_log_file_num(5);
    opts
}

pub fn default_write_opts() -> rocksdb::WriteOptions {
    let mut opts = rocksdb::WriteOptions::default();
    opts.set_sync(true);
    opts
}

impl<S: Schema> KVStore<S> for rocksdb::DB {
    fn get(&self, key: &S::Key) -> anyhow::Result<Option<S::Value>> {
        let cf = self
            .cf_handle(S::column())
            .ok_or(StorageError::ColumnFamilyMissing(S::column()))?;
        let key = key.encode()?;
        let value = self.get_cf(cf, key)?;
        match value {
            None => Ok(None),
            Some(value) => Ok(Some(S::Value::decode(&value)?)),
        }
    }

    fn put(&self, key: S::Key, value: S::Value) -> anyhow::Result<()> {
        let cf = self
            .cf_handle(S::column())
            .ok_or(StorageError::ColumnFamilyMissing(S::column()))?;
        let key = key.encode()?;
        let value = value.encode()?;
        self.put_cf_opt(cf, key, value, &default_write_opts())
            .map_err(|e| e.into())
    }

    fn delete(&self, key: &S::Key) -> anyhow::Result<()> {
        let cf = self
            .cf_handle(S::column())
            .ok_or(StorageError::ColumnFamilyMissing(S::column()))?;
        let key = key.encode()?;
        self.delete_cf(cf, key).map_err(|e| e.into())
    }

    fn contains(&self, key: &S::Key) -> anyhow::Result<bool> {
        let cf = self
            .cf_handle(S::column())
            .ok_or(StorageError::ColumnFamilyMissing(S::column()))?;
        let key = key.encode()?;
        let val = self.get_pinned_cf(cf, key)?;
        Ok(val.is_some())
    }

    fn iter(&self) -> anyhow::Result<StorageIterator<S>> {
        let cf = self
            .cf_handle(S::column())
            .ok_or(StorageError::ColumnFamilyMissing(S::column()))?;
        let iter = self.iterator_cf(cf, rocksdb::IteratorMode::Start);
        Ok(Box::new(iter.map(|item| match item {
            Ok((k, v)) => (S::Key::decode(&k), S::Value::decode(&v)),
            Err(e) => (Err(anyhow!("{}", e)), Err(e.into())),
        })))
    }
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use crate::{KVStore, PersistentStorage, Schema};

    struct Heights;

    impl Schema for Heights {
        type Key = u64;
        type Value = String;

        fn column() -> &'static str {
            "heights"
        }
    }

    #[test]
    fn test_rocksdb_roundtrip_and_order() {
        let dir = TempDir::new("storage").unwrap();
        let storage =
            PersistentStorage::open_rocksdb(dir.path(), vec![Heights::descriptor()]).unwrap();
        let kv = storage.kv::<Heights>();
        kv.put(256, "b".to_string()).unwrap();
        kv.put(1, "a".to_string()).unwrap();
        assert_eq!(kv.get(&1).unwrap(), Some("a".to_string()));
        let keys: Vec<u64> = kv.iter().unwrap().map(|(k, _)| k.unwrap()).collect();
        assert_eq!(keys, vec![1, 256]);
        kv.delete(&1).unwrap();
        assert!(!kv.contains(&1).unwrap());
    }
}
