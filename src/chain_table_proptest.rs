#![cfg(test)]

// Property tests for ChainTable kept inside the crate next to the structure
// they exercise.

use crate::chain_table::{ChainTable, Handle};
use crate::config::{KeyMatch, TableConfig};
use crate::entry::Entry;
use crate::hash::{bucket_hash, until_nul};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};

// Pool-indexed operations so shrinking moves toward earlier keys and shorter
// op lists.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, Vec<u8>),
    Remove(usize),
    Find(usize),
    Contains(Vec<u8>),
    First,
    Iterate,
}

// Keys may carry a NUL and trailing garbage, so NUL-terminated aliasing is
// exercised alongside plain keys.
fn arb_key(suffix: &'static str) -> impl Strategy<Value = Vec<u8>> {
    ("[a-c]{0,3}", proptest::option::of("[x-z]{0,2}")).prop_map(move |(stem, tail)| {
        let mut k = stem.into_bytes();
        k.extend_from_slice(suffix.as_bytes());
        if let Some(tail) = tail {
            k.push(0);
            k.extend_from_slice(tail.as_bytes());
        }
        k
    })
}

fn arb_scenario(suffix: &'static str) -> impl Strategy<Value = (Vec<Vec<u8>>, Vec<OpI>)> {
    proptest::collection::vec(arb_key(suffix), 1..=8).prop_flat_map(move |pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            (idx.clone(), proptest::collection::vec(any::<u8>(), 0..8))
                .prop_map(|(i, v)| OpI::Insert(i, v)),
            idx.clone().prop_map(OpI::Remove),
            idx.clone().prop_map(OpI::Find),
            prop_oneof![contains_pool, arb_key(suffix)].prop_map(OpI::Contains),
            Just(OpI::First),
            Just(OpI::Iterate),
        ];
        proptest::collection::vec(op, 1..60).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Model entry: the key bytes as first stored plus the current value.
type Model = HashMap<Vec<u8>, (Vec<u8>, Vec<u8>)>;

fn model_key(key_match: KeyMatch, key: &[u8]) -> Vec<u8> {
    match key_match {
        KeyMatch::NulTerminated => until_nul(key).to_vec(),
        KeyMatch::Exact => key.to_vec(),
    }
}

fn run_state_machine(
    key_match: KeyMatch,
    pool: Vec<Vec<u8>>,
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut sut = ChainTable::try_new(TableConfig::new().with_key_match(key_match)).unwrap();
    let mut model: Model = HashMap::new();
    let mut live: HashMap<Vec<u8>, Handle> = HashMap::new();
    let mut stale: Vec<Handle> = Vec::new();

    for op in ops {
        match op {
            OpI::Insert(i, v) => {
                let k = pool[i].clone();
                let mk = model_key(key_match, &k);
                let prev = sut.insert(Entry::new(k.clone(), v.clone())).unwrap();
                match model.get_mut(&mk) {
                    Some((_, mv)) => {
                        // Superseded value comes back to the caller.
                        prop_assert_eq!(prev, Some(core::mem::replace(mv, v)));
                    }
                    None => {
                        prop_assert_eq!(prev, None);
                        model.insert(mk.clone(), (k.clone(), v));
                        let h = sut.find(&k).expect("inserted key resolves");
                        live.insert(mk, h);
                    }
                }
            }
            OpI::Remove(i) => {
                let k = &pool[i];
                let mk = model_key(key_match, k);
                match (sut.remove(k), model.remove(&mk)) {
                    (Some(e), Some((mk_stored, mv))) => {
                        prop_assert_eq!(e.key, mk_stored);
                        prop_assert_eq!(e.value, mv);
                        stale.push(live.remove(&mk).expect("tracked live handle"));
                    }
                    (None, None) => {}
                    (s, m) => prop_assert!(false, "remove mismatch: {:?} vs {:?}", s, m),
                }
                prop_assert!(sut.find(k).is_none());
            }
            OpI::Find(i) => {
                let k = &pool[i];
                let mk = model_key(key_match, k);
                let s = sut.find(k);
                prop_assert_eq!(s.is_some(), model.contains_key(&mk));
                if let Some(h) = s {
                    // Handles stay stable across unrelated inserts and removals.
                    prop_assert_eq!(Some(&h), live.get(&mk));
                    let (_, mv) = &model[&mk];
                    prop_assert_eq!(&h.entry(&sut).unwrap().value, mv);
                }
            }
            OpI::Contains(k) => {
                let mk = model_key(key_match, &k);
                prop_assert_eq!(sut.contains_key(&k), model.contains_key(&mk));
            }
            OpI::First => {
                let first = sut.first();
                prop_assert_eq!(first.is_none(), model.is_empty());
                if let Some(e) = first {
                    let lowest = model.keys().map(|k| bucket_hash(k)).min();
                    prop_assert_eq!(Some(bucket_hash(&e.key)), lowest);
                    prop_assert_eq!(Some(e), sut.iter().next().map(|(_, e)| e));
                }
            }
            OpI::Iterate => {
                let buckets: Vec<u8> = sut.iter().map(|(_, e)| bucket_hash(&e.key)).collect();
                prop_assert!(buckets.windows(2).all(|w| w[0] <= w[1]));
                let s_keys: BTreeSet<_> =
                    sut.iter().map(|(_, e)| model_key(key_match, &e.key)).collect();
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(s_keys, m_keys);
            }
        }

        for &h in &stale {
            prop_assert!(h.entry(&sut).is_none());
        }
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
    }
    Ok(())
}

// Property: state-machine equivalence against a HashMap model keyed by the
// NUL-terminated prefix. Exercised:
// - Duplicate inserts replace in place and return the superseded value.
// - `remove` returns the owned entry as first stored and invalidates its handle.
// - `find`/`contains_key` parity with the model; handle stability.
// - `first` picks the lowest occupied bucket; `iter` is bucket-ordered and complete.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario("")) {
        run_state_machine(KeyMatch::NulTerminated, pool, ops)?;
    }

    #[test]
    fn prop_state_machine_exact_keys((pool, ops) in arb_scenario("")) {
        run_state_machine(KeyMatch::Exact, pool, ops)?;
    }
}

// Collision variant: every key ends in "ab" before any NUL, so all entries
// share bucket 130 and every operation walks one long chain.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario("ab")) {
        run_state_machine(KeyMatch::NulTerminated, pool, ops)?;
    }
}
