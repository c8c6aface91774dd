#![cfg(test)]

// Property tests for IncrementalHashMap kept inside the crate so they can
// inspect the table's migration state after every operation.

use crate::config::MapConfig;
use crate::error::KeyNotFound;
use crate::incremental_hash_map::IncrementalHashMap;
use core::hash::BuildHasher;
use proptest::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hasher;

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations so shrinking converges on few keys and short
// op lists.
#[derive(Clone, Debug)]
enum OpI {
    Set(usize, i32),
    Remove(usize),
    Get(usize),
    GetMut(usize, i32),
    Contains(usize),
}

fn arb_config() -> impl Strategy<Value = MapConfig> {
    (1usize..=12, prop_oneof![Just(0.75), Just(1.0), Just(0.5), 0.05f64..=1.0])
        .prop_map(|(cap, lf)| MapConfig::new(cap, lf))
}

fn arb_scenario() -> impl Strategy<Value = (MapConfig, Vec<String>, Vec<OpI>)> {
    (
        arb_config(),
        proptest::collection::vec("[a-z]{0,4}", 1..=40),
    )
        .prop_flat_map(|(config, pool)| {
            let idx = 0..pool.len();
            let op = prop_oneof![
                4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Set(i, v)),
                2 => idx.clone().prop_map(OpI::Remove),
                2 => idx.clone().prop_map(OpI::Get),
                1 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::GetMut(i, d)),
                1 => idx.clone().prop_map(OpI::Contains),
            ];
            proptest::collection::vec(op, 1..200)
                .prop_map(move |ops| (config, pool.clone(), ops))
        })
}

fn run<S: BuildHasher>(
    mut sut: IncrementalHashMap<Key, i32, S>,
    pool: &[String],
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<Key, i32> = HashMap::new();
    let mut last_cursor: Option<(u64, usize)> = None;

    for op in ops {
        match op {
            OpI::Set(i, v) => {
                let k = Key(pool[i].clone());
                let before_len = sut.len();
                let prev = sut.set(k.clone(), v);
                let mprev = model.insert(k, v);
                prop_assert_eq!(prev, mprev);
                if mprev.is_some() {
                    prop_assert_eq!(sut.len(), before_len, "update must not change len");
                }
            }
            OpI::Remove(i) => {
                let k = pool[i].as_str();
                let got = sut.remove(k);
                match model.remove(k) {
                    Some(v) => prop_assert_eq!(got, Ok(v)),
                    None => prop_assert_eq!(got, Err(KeyNotFound)),
                }
            }
            OpI::Get(i) => {
                let k = pool[i].as_str();
                let got = sut.get(k).copied();
                prop_assert_eq!(got, model.get(k).copied().ok_or(KeyNotFound));
            }
            OpI::GetMut(i, d) => {
                let k = pool[i].as_str();
                match (sut.get_mut(k), model.get_mut(k)) {
                    (Ok(v), Some(mv)) => {
                        *v = v.wrapping_add(d);
                        *mv = mv.wrapping_add(d);
                    }
                    (Err(KeyNotFound), None) => {}
                    (l, r) => prop_assert!(false, "get_mut mismatch: {:?} vs {:?}", l, r),
                }
            }
            OpI::Contains(i) => {
                let k = pool[i].as_str();
                let before = sut.migration_progress();
                prop_assert_eq!(sut.contains_key(k), model.contains_key(k));
                prop_assert_eq!(sut.migration_progress(), before, "contains_key stepped");
            }
        }

        // Post-conditions after each op
        // 1) Physical layout: every key in exactly one routable bucket.
        if let Err(e) = sut.table().check_invariants() {
            prop_assert!(false, "invariant violated: {}", e);
        }
        // 2) Size parity
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        // 3) Cursor only moves forward within one episode.
        let now = sut
            .migration_progress()
            .map(|(c, _)| (sut.table().episodes(), c));
        if let (Some((e0, c0)), Some((e1, c1))) = (last_cursor, now) {
            if e0 == e1 {
                prop_assert!(c1 >= c0, "cursor moved backwards: {} -> {}", c0, c1);
            } else {
                prop_assert!(e1 > e0);
            }
        }
        last_cursor = now;
    }

    // Final sweep over every key in the pool.
    for s in pool {
        let k = s.as_str();
        prop_assert_eq!(sut.contains_key(k), model.contains_key(k));
        prop_assert_eq!(sut.get(k).copied(), model.get(k).copied().ok_or(KeyNotFound));
    }

    // Enough stepping operations always drain the old array.
    let mut guard = 0;
    while sut.is_migrating() {
        let _ = sut.get("");
        guard += 1;
        prop_assert!(guard <= 10_000, "migration never finished");
    }
    if let Err(e) = sut.table().check_invariants() {
        prop_assert!(false, "invariant violated after drain: {}", e);
    }
    for (k, v) in &model {
        prop_assert_eq!(sut.get(k.0.as_str()), Ok(v));
    }
    Ok(())
}

// Property: state-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences and configs:
// - `set` returns the replaced value and never changes `len` on update.
// - `get`/`get_mut`/`remove` agree with the model, `KeyNotFound` when absent.
// - `contains_key` agrees with the model and never moves migration.
// - Every key sits in exactly one bucket routable by the cursor.
// - The cursor is monotonic and migration always terminates.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((config, pool, ops) in arb_scenario()) {
        let sut: IncrementalHashMap<Key, i32> =
            IncrementalHashMap::with_config(config).expect("generated config is valid");
        run(sut, &pool, ops)?;
    }
}

// Collision variant using a constant hasher to stress equality resolution.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// Low-entropy hasher: only the first byte of the key matters, so chains
// are long but spread over a handful of buckets.
#[derive(Clone, Default)]
struct FirstByteBuildHasher;
#[derive(Default)]
struct FirstByteHasher(Option<u8>);
impl BuildHasher for FirstByteBuildHasher {
    type Hasher = FirstByteHasher;
    fn build_hasher(&self) -> Self::Hasher {
        FirstByteHasher::default()
    }
}
impl Hasher for FirstByteHasher {
    fn write(&mut self, bytes: &[u8]) {
        if self.0.is_none() {
            self.0 = bytes.first().copied();
        }
    }
    fn finish(&self) -> u64 {
        self.0.map(u64::from).unwrap_or(0)
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((config, pool, ops) in arb_scenario()) {
        let sut = IncrementalHashMap::with_config_and_hasher(config, ConstBuildHasher)
            .expect("generated config is valid");
        run(sut, &pool, ops)?;
    }

    #[test]
    fn prop_state_machine_low_entropy((config, pool, ops) in arb_scenario()) {
        let sut = IncrementalHashMap::with_config_and_hasher(config, FirstByteBuildHasher)
            .expect("generated config is valid");
        run(sut, &pool, ops)?;
    }
}

// Property: every stepping call makes migration progress, and a `set`
// that lands mid-migration only starts a new episode after the running one
// has finished.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_steps_always_progress(cap in 1usize..=16, keys in proptest::collection::hash_set(any::<u32>(), 1..200)) {
        let mut sut: IncrementalHashMap<u32, u32> = IncrementalHashMap::with_capacity(cap);
        for &k in &keys {
            let episode_before = sut.table().episodes();
            let cap_before = sut.capacity();
            sut.set(k, k);
            let episode = sut.table().episodes();
            prop_assert!(episode <= episode_before + 1, "at most one start per call");
            if episode > episode_before {
                // Any running episode finished in this call's step before
                // the insert started the next one from the previous current array.
                let (c, l) = sut.migration_progress().expect("just started");
                prop_assert_eq!(l, cap_before);
                prop_assert_eq!(c, 0);
                prop_assert_eq!(sut.capacity(), sut.len() * 2);
            }
            if let Err(e) = sut.table().check_invariants() {
                prop_assert!(false, "invariant violated: {}", e);
            }
        }
        while let Some((cursor, old_len)) = sut.migration_progress() {
            let _ = sut.get(&u32::MAX);
            if let Some((c, l)) = sut.migration_progress() {
                prop_assert_eq!(l, old_len);
                prop_assert!(c > cursor, "step did not advance: {} -> {}", cursor, c);
            }
        }
        for &k in &keys {
            prop_assert_eq!(sut.get(&k), Ok(&k));
        }
    }
}
