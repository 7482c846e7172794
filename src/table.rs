//! Table: the synchronized, lifecycle-aware handle over a `ChainTable`.
//!
//! Every operation goes through one `RwLock`. Lookups and dumps share the
//! read side; insert, remove, init and teardown take the write side. Entry
//! references are mapped read guards, so no reference can outlive the lock
//! that protects it.
//!
//! Read guards are taken recursively: a thread may hold several entry
//! references or dumps at once even while a writer is queued. The writer
//! waits until every outstanding guard is dropped.

use crate::chain_table::ChainTable;
use crate::config::TableConfig;
use crate::entry::Entry;
use crate::error::{InsertError, TableError};
use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

/// Borrowed view of a stored entry. Holds the table's read lock until dropped.
pub type EntryRef<'a> = MappedRwLockReadGuard<'a, Entry>;

#[derive(Debug)]
enum State {
    Uninit,
    Ready(ChainTable),
    Retired,
}

#[derive(Debug)]
pub struct Table {
    state: RwLock<State>,
}

static GLOBAL: Table = Table::new();

impl Table {
    /// An uninitialized table. Every operation except `init` fails with
    /// `Uninitialized` until `init` succeeds.
    pub const fn new() -> Self {
        Self {
            state: parking_lot::const_rwlock(State::Uninit),
        }
    }

    /// The process-wide table.
    pub fn global() -> &'static Table {
        &GLOBAL
    }

    pub fn init(&self) -> Result<(), TableError> {
        self.init_with(TableConfig::default())
    }

    /// Allocate the buckets. Succeeds once per table; later calls fail with
    /// `AlreadyInitialized` and leave the table as it was. A failed
    /// allocation leaves the table uninitialized.
    pub fn init_with(&self, config: TableConfig) -> Result<(), TableError> {
        let mut state = self.state.write();
        match *state {
            State::Uninit => {
                *state = State::Ready(ChainTable::try_new(config)?);
                Ok(())
            }
            State::Ready(_) | State::Retired => Err(TableError::AlreadyInitialized),
        }
    }

    pub fn is_initialized(&self) -> bool {
        matches!(*self.state.read_recursive(), State::Ready(_))
    }

    fn ready(&self) -> Result<MappedRwLockReadGuard<'_, ChainTable>, TableError> {
        RwLockReadGuard::try_map(self.state.read_recursive(), |s| match s {
            State::Ready(t) => Some(t),
            State::Uninit | State::Retired => None,
        })
        .map_err(|_| TableError::Uninitialized)
    }

    fn ready_mut(&self) -> Result<MappedRwLockWriteGuard<'_, ChainTable>, TableError> {
        RwLockWriteGuard::try_map(self.state.write(), |s| match s {
            State::Ready(t) => Some(t),
            State::Uninit | State::Retired => None,
        })
        .map_err(|_| TableError::Uninitialized)
    }

    /// Store `entry`, or replace the value stored under an equal key.
    ///
    /// Returns the superseded value on replacement. On error the entry is
    /// returned inside [`InsertError`] and the table is unchanged.
    pub fn insert(&self, entry: Entry) -> Result<Option<Vec<u8>>, InsertError> {
        let mut table = match self.ready_mut() {
            Ok(t) => t,
            Err(error) => return Err(InsertError::new(error, entry)),
        };
        table.insert(entry)
    }

    pub fn lookup(&self, key: &[u8]) -> Result<EntryRef<'_>, TableError> {
        MappedRwLockReadGuard::try_map(self.ready()?, |t| t.get(key))
            .map_err(|_| TableError::NotFound)
    }

    pub fn contains_key(&self, key: &[u8]) -> Result<bool, TableError> {
        Ok(self.ready()?.contains_key(key))
    }

    /// Detach the entry stored under `key`; the caller owns it from here on.
    pub fn remove(&self, key: &[u8]) -> Result<Entry, TableError> {
        self.ready_mut()?.remove(key).ok_or(TableError::NotFound)
    }

    /// The entry at the head of the lowest-numbered occupied bucket.
    pub fn first(&self) -> Result<EntryRef<'_>, TableError> {
        MappedRwLockReadGuard::try_map(self.ready()?, |t| t.first())
            .map_err(|_| TableError::NotFound)
    }

    /// Read-locked view for enumerating every entry.
    pub fn dump(&self) -> Result<Dump<'_>, TableError> {
        Ok(Dump {
            table: self.ready()?,
        })
    }

    pub fn len(&self) -> Result<usize, TableError> {
        Ok(self.ready()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, TableError> {
        Ok(self.ready()?.is_empty())
    }

    /// Release every entry and retire the table. Returns how many entries
    /// were released. A retired table cannot be initialized again.
    pub fn teardown(&self) -> Result<usize, TableError> {
        let mut state = self.state.write();
        match core::mem::replace(&mut *state, State::Retired) {
            State::Ready(mut t) => Ok(t.clear()),
            prev @ (State::Uninit | State::Retired) => {
                *state = prev;
                Err(TableError::Uninitialized)
            }
        }
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

/// A consistent view of the whole table, held under the read lock.
///
/// Entries come out in ascending bucket order, then chain order. `iter` may
/// be called any number of times; each pass sees the same entries.
pub struct Dump<'a> {
    table: MappedRwLockReadGuard<'a, ChainTable>,
}

impl<'a> Dump<'a> {
    pub fn iter(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.table.iter().map(|(_, e)| e)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn first(&self) -> Option<&Entry> {
        self.table.first()
    }
}
