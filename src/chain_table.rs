//! ChainTable: structural layer. A fixed array of bucket chains whose nodes
//! live in a generational arena; no locking.

use crate::config::{KeyMatch, TableConfig};
use crate::entry::Entry;
use crate::error::{InsertError, TableError};
use crate::hash::{bucket_hash, NUM_BUCKETS};
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    struct NodeKey;
}

/// Stable reference to a live node. Resolves to `None` once the node has
/// been removed, even if its arena slot is reused.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle(NodeKey);

impl Handle {
    pub fn entry<'a>(&self, table: &'a ChainTable) -> Option<&'a Entry> {
        table.handle_entry(*self)
    }
}

#[derive(Debug)]
struct Node {
    entry: Entry,
    next: Option<NodeKey>,
}

#[derive(Debug)]
pub struct ChainTable {
    heads: Box<[Option<NodeKey>]>, // NUM_BUCKETS chain heads
    nodes: SlotMap<NodeKey, Node>,
    key_match: KeyMatch,
    max_entries: Option<usize>,
}

impl ChainTable {
    /// Allocate the bucket array with every chain empty.
    pub fn try_new(config: TableConfig) -> Result<Self, TableError> {
        let mut heads = Vec::new();
        heads
            .try_reserve_exact(NUM_BUCKETS)
            .map_err(|_| TableError::OutOfMemory)?;
        heads.resize(NUM_BUCKETS, None);
        Ok(Self {
            heads: heads.into_boxed_slice(),
            nodes: SlotMap::with_key(),
            key_match: config.key_match,
            max_entries: config.max_entries,
        })
    }

    pub fn key_match(&self) -> KeyMatch {
        self.key_match
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    fn head(&self, key: &[u8]) -> (usize, Option<NodeKey>) {
        let bucket = usize::from(bucket_hash(key));
        (bucket, self.heads[bucket])
    }

    pub fn find(&self, key: &[u8]) -> Option<Handle> {
        let (_, mut cur) = self.head(key);
        while let Some(k) = cur {
            let node = self.nodes.get(k)?;
            if self.key_match.matches(&node.entry.key, key) {
                return Some(Handle(k));
            }
            cur = node.next;
        }
        None
    }

    pub fn get(&self, key: &[u8]) -> Option<&Entry> {
        self.find(key).and_then(|h| self.handle_entry(h))
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.find(key).is_some()
    }

    /// Insert `entry`, or replace the value of the entry already stored under
    /// an equal key.
    ///
    /// A replacement keeps the stored key and its declared size, takes the new
    /// value and value size, and returns the superseded value. A new key is
    /// appended at the tail of its chain and yields `Ok(None)`.
    pub fn insert(&mut self, entry: Entry) -> Result<Option<Vec<u8>>, InsertError> {
        let key_match = self.key_match;
        let (bucket, mut cur) = self.head(&entry.key);
        let mut tail = None;
        while let Some(k) = cur {
            let Some(node) = self.nodes.get_mut(k) else {
                break;
            };
            if key_match.matches(&node.entry.key, &entry.key) {
                node.entry.value_size = entry.value_size;
                return Ok(Some(core::mem::replace(&mut node.entry.value, entry.value)));
            }
            tail = Some(k);
            cur = node.next;
        }

        if let Some(limit) = self.max_entries {
            if self.nodes.len() >= limit {
                return Err(InsertError::new(TableError::OutOfMemory, entry));
            }
        }

        let k = self.nodes.insert(Node { entry, next: None });
        match tail.and_then(|t| self.nodes.get_mut(t)) {
            Some(last) => last.next = Some(k),
            None => self.heads[bucket] = Some(k),
        }
        Ok(None)
    }

    /// Unlink the entry stored under `key` and hand it to the caller.
    pub fn remove(&mut self, key: &[u8]) -> Option<Entry> {
        let (bucket, mut cur) = self.head(key);
        let mut prev: Option<NodeKey> = None;
        while let Some(k) = cur {
            let node = self.nodes.get(k)?;
            if self.key_match.matches(&node.entry.key, key) {
                break;
            }
            prev = Some(k);
            cur = node.next;
        }

        let node = self.nodes.remove(cur?)?;
        match prev.and_then(|p| self.nodes.get_mut(p)) {
            Some(before) => before.next = node.next,
            None => self.heads[bucket] = node.next,
        }
        Some(node.entry)
    }

    /// Remove the entry a handle refers to.
    pub fn remove_handle(&mut self, handle: Handle) -> Option<Entry> {
        let key = self.nodes.get(handle.0)?.entry.key.clone();
        self.remove(&key)
    }

    /// The entry at the head of the lowest-numbered non-empty bucket.
    pub fn first(&self) -> Option<&Entry> {
        self.heads
            .iter()
            .flatten()
            .next()
            .and_then(|&k| self.nodes.get(k))
            .map(|n| &n.entry)
    }

    /// Number of entries chained in `bucket`.
    pub fn chain_len(&self, bucket: u8) -> usize {
        let mut n = 0;
        let mut cur = self.heads[usize::from(bucket)];
        while let Some(node) = cur.and_then(|k| self.nodes.get(k)) {
            n += 1;
            cur = node.next;
        }
        n
    }

    /// Drop every entry, leaving all chains empty. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let n = self.nodes.len();
        self.nodes.clear();
        self.heads.iter_mut().for_each(|h| *h = None);
        n
    }

    pub(crate) fn handle_entry(&self, h: Handle) -> Option<&Entry> {
        self.nodes.get(h.0).map(|n| &n.entry)
    }

    /// Entries in ascending bucket order, then chain order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            table: self,
            bucket: 0,
            cur: None,
        }
    }
}

/// Iterator over entries in bucket-then-chain order.
pub struct Iter<'a> {
    table: &'a ChainTable,
    bucket: usize,
    cur: Option<NodeKey>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (Handle, &'a Entry);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(k) = self.cur {
                let node = self.table.nodes.get(k)?;
                self.cur = node.next;
                return Some((Handle(k), &node.entry));
            }
            if self.bucket >= self.table.heads.len() {
                return None;
            }
            self.cur = self.table.heads[self.bucket];
            self.bucket += 1;
        }
    }
}

impl<'a> IntoIterator for &'a ChainTable {
    type Item = (Handle, &'a Entry);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn table() -> ChainTable {
        ChainTable::try_new(TableConfig::default()).unwrap()
    }

    // "ab", "zab" and "qqab" share their last two bytes and so their bucket.
    const COLLIDING: [&str; 3] = ["ab", "zab", "qqab"];

    /// Invariant: a fresh table is empty and every lookup misses.
    #[test]
    fn fresh_table_is_empty() {
        let t = table();
        assert!(t.is_empty());
        assert!(t.get(b"anything").is_none());
        assert!(t.first().is_none());
        assert_eq!(t.iter().count(), 0);
    }

    /// Invariant: duplicate insert replaces the value in place, hands back the
    /// old value and keeps exactly one entry.
    #[test]
    fn duplicate_insert_replaces_and_returns_old_value() {
        let mut t = table();
        assert_eq!(t.insert(Entry::new("dup", "v1")).unwrap(), None);
        let old = t.insert(Entry::new("dup", "second")).unwrap();
        assert_eq!(old.as_deref(), Some(&b"v1"[..]));
        assert_eq!(t.len(), 1);

        let e = t.get(b"dup").unwrap();
        assert_eq!(e.value(), b"second");
        assert_eq!(e.value_size, 6);
    }

    /// Invariant: a replacement keeps the originally stored key bytes and size.
    #[test]
    fn replacement_keeps_stored_key() {
        let mut t = table();
        t.insert(Entry::new("k\0first", "1")).unwrap();
        t.insert(Entry::new("k\0second", "2")).unwrap();
        let e = t.get(b"k").unwrap();
        assert_eq!(e.key(), b"k\0first");
        assert_eq!(e.key_size, 7);
        assert_eq!(e.value(), b"2");
    }

    /// Invariant: colliding keys share one chain, in insertion order, and each
    /// resolves to its own entry.
    #[test]
    fn collisions_chain_in_insertion_order() {
        let mut t = table();
        for (i, k) in COLLIDING.iter().enumerate() {
            t.insert(Entry::new(*k, vec![i as u8])).unwrap();
        }
        let bucket = bucket_hash(b"ab");
        assert_eq!(t.chain_len(bucket), 3);

        let order: Vec<&[u8]> = t.iter().map(|(_, e)| e.key()).collect();
        assert_eq!(order, vec![&b"ab"[..], &b"zab"[..], &b"qqab"[..]]);

        for (i, k) in COLLIDING.iter().enumerate() {
            assert_eq!(t.get(k.as_bytes()).unwrap().value(), &[i as u8]);
        }
    }

    /// Invariant: removing the head of a chain promotes its successor.
    #[test]
    fn remove_chain_head() {
        let mut t = table();
        for k in COLLIDING {
            t.insert(Entry::new(k, k)).unwrap();
        }
        let e = t.remove(b"ab").unwrap();
        assert_eq!(e.value(), b"ab");
        assert_eq!(t.chain_len(bucket_hash(b"ab")), 2);
        assert!(t.get(b"ab").is_none());
        assert!(t.get(b"zab").is_some());
        assert!(t.get(b"qqab").is_some());
    }

    /// Invariant: removing a middle or tail node relinks its predecessor.
    #[test]
    fn remove_middle_and_tail() {
        let mut t = table();
        for k in COLLIDING {
            t.insert(Entry::new(k, k)).unwrap();
        }
        assert_eq!(t.remove(b"zab").unwrap().key(), b"zab");
        let order: Vec<&[u8]> = t.iter().map(|(_, e)| e.key()).collect();
        assert_eq!(order, vec![&b"ab"[..], &b"qqab"[..]]);

        assert_eq!(t.remove(b"qqab").unwrap().key(), b"qqab");
        assert_eq!(t.chain_len(bucket_hash(b"ab")), 1);
        assert_eq!(t.get(b"ab").unwrap().value(), b"ab");

        // New tail after removals still links correctly.
        t.insert(Entry::new("zzab", "new")).unwrap();
        let order: Vec<&[u8]> = t.iter().map(|(_, e)| e.key()).collect();
        assert_eq!(order, vec![&b"ab"[..], &b"zzab"[..]]);
    }

    /// Invariant: removing an absent key, including one whose bucket is
    /// occupied, changes nothing.
    #[test]
    fn remove_absent_is_noop() {
        let mut t = table();
        t.insert(Entry::new("ab", "1")).unwrap();
        assert!(t.remove(b"zab").is_none());
        assert!(t.remove(b"nothing").is_none());
        assert_eq!(t.len(), 1);
        assert_eq!(t.get(b"ab").unwrap().value(), b"1");
    }

    /// Invariant: NUL-terminated matching treats keys equal up to the first NUL.
    #[test]
    fn nul_terminated_keys_alias() {
        let mut t = table();
        t.insert(Entry::with_sizes(b"key\0\0\0\0".to_vec(), 8, b"v".to_vec(), 1))
            .unwrap();
        assert!(t.contains_key(b"key"));
        assert!(t.contains_key(b"key\0junk"));
        let removed = t.remove(b"key").unwrap();
        assert_eq!(removed.key_size, 8);
        assert!(t.is_empty());
    }

    /// Invariant: exact matching keeps keys differing after a NUL apart.
    #[test]
    fn exact_keys_do_not_alias() {
        let config = TableConfig::new().with_key_match(KeyMatch::Exact);
        let mut t = ChainTable::try_new(config).unwrap();
        t.insert(Entry::new("key\0a", "a")).unwrap();
        t.insert(Entry::new("key\0b", "b")).unwrap();
        assert_eq!(t.len(), 2);
        assert!(!t.contains_key(b"key"));
        assert_eq!(t.get(b"key\0b").unwrap().value(), b"b");
    }

    /// Invariant: an exhausted entry budget rejects new keys, returns the
    /// entry, and leaves the table unchanged; replacements still succeed.
    #[test]
    fn entry_budget_reports_out_of_memory() {
        let mut t = ChainTable::try_new(TableConfig::new().with_max_entries(1)).unwrap();
        t.insert(Entry::new("a", "1")).unwrap();
        let err = t.insert(Entry::new("b", "2")).unwrap_err();
        assert_eq!(err.error, TableError::OutOfMemory);
        assert_eq!(err.into_entry(), Entry::new("b", "2"));
        assert_eq!(t.len(), 1);
        assert!(!t.contains_key(b"b"));

        assert!(t.insert(Entry::new("a", "3")).unwrap().is_some());
        assert_eq!(t.get(b"a").unwrap().value(), b"3");
    }

    /// Invariant: `first` returns the head of the lowest occupied bucket.
    #[test]
    fn first_is_lowest_bucket_head() {
        let mut t = table();
        // "b" hashes to 98, "a" to 97.
        t.insert(Entry::new("b", "2")).unwrap();
        t.insert(Entry::new("a", "1")).unwrap();
        assert_eq!(t.first().unwrap().key(), b"a");
        t.remove(b"a").unwrap();
        assert_eq!(t.first().unwrap().key(), b"b");
    }

    /// Invariant: iteration visits every entry once, in ascending bucket order.
    #[test]
    fn iteration_is_bucket_ordered_and_complete() {
        let mut t = table();
        let keys: Vec<String> = (0..600).map(|i| format!("key-{i}")).collect();
        for k in &keys {
            t.insert(Entry::new(k.as_str(), k.as_str())).unwrap();
        }
        let buckets: Vec<u8> = t.iter().map(|(_, e)| bucket_hash(e.key())).collect();
        assert!(buckets.windows(2).all(|w| w[0] <= w[1]));

        let seen: BTreeSet<Vec<u8>> = t.iter().map(|(_, e)| e.key.clone()).collect();
        let expected: BTreeSet<Vec<u8>> = keys.iter().map(|k| k.clone().into_bytes()).collect();
        assert_eq!(seen, expected);
        assert_eq!((&t).into_iter().count(), t.len());
    }

    /// Invariant: a handle stops resolving once its entry is removed, and does
    /// not alias an entry inserted afterwards.
    #[test]
    fn stale_handle_does_not_alias_new_entry() {
        let mut t = table();
        t.insert(Entry::new("old", "1")).unwrap();
        let h1 = t.find(b"old").unwrap();
        assert_eq!(h1.entry(&t).unwrap().value(), b"1");

        let removed = t.remove_handle(h1).unwrap();
        assert_eq!(removed.key(), b"old");
        assert!(h1.entry(&t).is_none());
        assert!(t.remove_handle(h1).is_none());

        t.insert(Entry::new("new", "2")).unwrap();
        let h2 = t.find(b"new").unwrap();
        assert_ne!(h1, h2);
        assert!(h1.entry(&t).is_none());
    }

    /// Invariant: `clear` empties every chain.
    #[test]
    fn clear_empties_all_chains() {
        let mut t = table();
        for k in COLLIDING {
            t.insert(Entry::new(k, k)).unwrap();
        }
        assert_eq!(t.clear(), 3);
        assert!(t.is_empty());
        assert_eq!(t.chain_len(bucket_hash(b"ab")), 0);
        assert!(t.first().is_none());
        t.insert(Entry::new("ab", "again")).unwrap();
        assert_eq!(t.get(b"ab").unwrap().value(), b"again");
    }
}
