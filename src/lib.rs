//! chain-kv: a fixed-size associative store mapping opaque byte-string keys
//! to opaque byte-blob values, shared by concurrent callers through a
//! guarded handle.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: the table engine of a control-device key-value store (hashing,
//!   bucket chaining, insert/update, lookup, removal, enumeration) with
//!   ownership transfer that the type system checks.
//! - Layers:
//!   - `hash`: the 8-bit shift-add bucket hash; the digest is the bucket
//!     index, so there are exactly 256 buckets and no modulo step.
//!   - `ChainTable`: structural layer. 256 chain heads over a generational
//!     node arena; singly linked chains, new keys appended at the tail,
//!     duplicate keys updated in place. Not synchronized.
//!   - `Table`: public layer. Lifecycle (uninitialized, ready, retired) and
//!     one `RwLock` around the `ChainTable`; entry references are lock
//!     guards.
//!   - `control`: request front end. ioctl command codes, buffer size
//!     checks, errno mapping, and the only place that logs.
//!
//! Constraints
//! - Fixed bucket count; no resizing or rehashing.
//! - At most one entry per key. An entry lives only in bucket `hash(key)`.
//! - Failed inserts leave the table unchanged and hand the entry back.
//! - A replaced value is returned to the caller, never leaked.
//! - `remove` moves the whole `Entry` out; nothing the table still links
//!   to is ever handed out by value.
//!
//! Key equality
//! - `KeyMatch::NulTerminated` (default): keys compare as C strings, so
//!   bytes after the first NUL are ignored and `b"k\0x"` equals `b"k"`.
//! - `KeyMatch::Exact`: whole-buffer comparison.
//! - The hash always stops at the first NUL, which keeps equal keys in the
//!   same bucket under either policy.
//!
//! Enumeration
//! - `Table::first` returns the head of the lowest occupied bucket.
//! - `Table::dump` returns a read-locked view whose `iter` walks every
//!   entry in bucket order, then chain order, and can be restarted.
//!
//! Notes and non-goals
//! - No persistence, transactions, or per-chain length limits.
//! - A single coarse lock: every operation is a short pointer walk, so
//!   per-bucket locks would buy little.
//! - The library installs no logger; callers pick a `log` backend.

pub mod chain_table;
mod chain_table_proptest;
pub mod config;
pub mod control;
mod entry;
mod error;
pub mod hash;
mod table;

// Public surface
pub use chain_table::{ChainTable, Handle};
pub use config::{KeyMatch, TableConfig};
pub use entry::Entry;
pub use error::{InsertError, TableError};
pub use hash::{bucket_hash, NUM_BUCKETS};
pub use table::{Dump, EntryRef, Table};
