use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("RWPoison")]
    RWPoison,
    #[error("column family missing `{0}`")]
    ColumnFamilyMissing(&'static str),
    #[error("column not registered `{0}`")]
    ColumnNotRegistered(&'static str),
}
