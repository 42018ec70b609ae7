//! Error type for index engine operations

use crate::key::Key;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("failed to open store at {}: {source}", path.display())]
    StorageOpen {
        path: PathBuf,
        #[source]
        source: redb::DatabaseError,
    },
    #[error("failed to prepare store directory {}: {source}", path.display())]
    StorageDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("store is already open")]
    AlreadyOpen,
    #[error("store is not open")]
    NotOpen,
    #[error("invalid key {key}: {reason}")]
    InvalidKey { key: Key, reason: &'static str },
    #[error("write attempted on a read-only transaction")]
    ReadOnlyTransaction,
    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("redb transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("bincode error for {key}: {source}")]
    Bincode {
        key: Key,
        #[source]
        source: bincode::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<redb::TransactionError> for IndexError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Transaction(Box::new(e))
    }
}

impl IndexError {
    pub(crate) const fn invalid_key(key: Key, reason: &'static str) -> Self {
        Self::InvalidKey { key, reason }
    }

    /// Errors that indicate a bug in the caller rather than the environment
    #[must_use]
    pub const fn is_programming_error(&self) -> bool {
        matches!(
            self,
            Self::AlreadyOpen | Self::NotOpen | Self::InvalidKey { .. } | Self::ReadOnlyTransaction
        )
    }
}

pub type IndexResult<T> = Result<T, IndexError>;
