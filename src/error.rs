//! Error types reported by the table.

use crate::entry::Entry;

/// Failure conditions of table operations.
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum TableError {
    #[error("table has not been initialized")]
    Uninitialized,

    #[error("table is already initialized")]
    AlreadyInitialized,

    #[error("out of memory")]
    OutOfMemory,

    #[error("key not found")]
    NotFound,
}

impl TableError {
    /// Whether the same call may succeed later without the caller first
    /// changing the table's lifecycle.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::OutOfMemory)
    }
}

/// A rejected insert. The entry that was offered is handed back untouched,
/// since ownership only moves into the table on success.
#[derive(Debug, thiserror::Error)]
#[error("insert rejected: {error}")]
pub struct InsertError {
    pub error: TableError,
    pub entry: Entry,
}

impl InsertError {
    pub(crate) fn new(error: TableError, entry: Entry) -> Self {
        Self { error, entry }
    }

    pub fn into_entry(self) -> Entry {
        self.entry
    }
}
