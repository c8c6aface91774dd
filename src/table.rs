//! Table: the hasher-agnostic core of `IncrementalHashMap`.
//!
//! Owns the entry arena, the `current` and `old` slot arrays and the
//! migration cursor. Every method takes a precomputed hash; the owning map
//! computes hashes and holds the reentrancy guard.
//!
//! Routing: while migrating, a hash whose `old` index is at or past the
//! cursor lives in `old`; everything else lives in `current`. All lookups,
//! inserts and removals go through `locate`, so they always agree on where
//! a key is.

use crate::slot_array::SlotArray;
use core::borrow::Borrow;
use slotmap::{DefaultKey, SlotMap};
use tracing::{debug, trace};

#[derive(Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
    hash: u64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Side {
    Current,
    Old,
}

/// Work done by a single migration step.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct StepReport {
    /// Empty old buckets passed over before reaching work (or the end).
    pub skipped: usize,
    /// Entries relocated from one old bucket into `current`.
    pub moved: usize,
    /// The step completed the migration.
    pub finished: bool,
}

pub(crate) struct Table<K, V> {
    entries: SlotMap<DefaultKey, Entry<K, V>>,
    current: SlotArray,
    old: SlotArray,
    cursor: usize,
    migrating: bool,
    load_factor: f64,
    // Number of migrations started so far.
    episodes: u64,
}

impl<K, V> Table<K, V> {
    pub(crate) fn new(capacity: usize, load_factor: f64) -> Self {
        Self {
            entries: SlotMap::with_key(),
            current: SlotArray::with_len(capacity),
            old: SlotArray::unallocated(),
            cursor: 0,
            migrating: false,
            load_factor,
            episodes: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.current.len()
    }

    pub(crate) fn load_factor(&self) -> f64 {
        self.load_factor
    }

    pub(crate) fn is_migrating(&self) -> bool {
        self.migrating
    }

    #[cfg(test)]
    pub(crate) fn episodes(&self) -> u64 {
        self.episodes
    }

    pub(crate) fn migration_progress(&self) -> Option<(usize, usize)> {
        self.migrating.then(|| (self.cursor, self.old.len()))
    }

    pub(crate) fn locate(&self, hash: u64) -> Side {
        if self.migrating && self.old.index_of(hash) >= self.cursor {
            Side::Old
        } else {
            Side::Current
        }
    }

    fn array(&self, side: Side) -> &SlotArray {
        match side {
            Side::Current => &self.current,
            Side::Old => &self.old,
        }
    }

    fn find<Q>(&self, hash: u64, q: &Q) -> Option<DefaultKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let entries = &self.entries;
        self.array(self.locate(hash)).find(hash, |k| {
            entries
                .get(k)
                .map(|e| e.hash == hash && e.key.borrow() == q)
                .unwrap_or(false)
        })
    }

    pub(crate) fn contains<Q>(&self, hash: u64, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        self.find(hash, q).is_some()
    }

    pub(crate) fn get<Q>(&self, hash: u64, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let k = self.find(hash, q)?;
        self.entries.get(k).map(|e| &e.value)
    }

    pub(crate) fn get_mut<Q>(&mut self, hash: u64, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let k = self.find(hash, q)?;
        self.entries.get_mut(k).map(|e| &mut e.value)
    }

    /// Insert or update. Returns the replaced value when `key` was present.
    /// A fresh insert may start a migration if none is running.
    pub(crate) fn insert(&mut self, hash: u64, key: K, value: V) -> Option<V>
    where
        K: Eq,
    {
        let side = self.locate(hash);
        let entries = &mut self.entries;
        let array = match side {
            Side::Current => &mut self.current,
            Side::Old => &mut self.old,
        };

        let existing = array.find(hash, |k| {
            entries
                .get(k)
                .map(|e| e.hash == hash && e.key == key)
                .unwrap_or(false)
        });
        if let Some(k) = existing {
            let e = entries
                .get_mut(k)
                .expect("bucket handles always refer to live entries");
            return Some(core::mem::replace(&mut e.value, value));
        }

        let k = entries.insert(Entry { key, value, hash });
        array.push(hash, k);

        if !self.migrating && self.over_threshold() {
            self.start_migration();
        }
        None
    }

    pub(crate) fn remove<Q>(&mut self, hash: u64, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let side = self.locate(hash);
        let entries = &self.entries;
        let array = match side {
            Side::Current => &mut self.current,
            Side::Old => &mut self.old,
        };
        let k = array.remove(hash, |k| {
            entries
                .get(k)
                .map(|e| e.hash == hash && e.key.borrow() == q)
                .unwrap_or(false)
        })?;
        // Unlinked from its bucket first; the arena removal below can drop user data.
        self.entries.remove(k).map(|e| e.value)
    }

    fn over_threshold(&self) -> bool {
        self.entries.len() as f64 >= self.current.len() as f64 * self.load_factor
    }

    fn start_migration(&mut self) {
        let new_len = self.entries.len().saturating_mul(2).max(1);
        self.old = core::mem::replace(&mut self.current, SlotArray::with_len(new_len));
        self.cursor = 0;
        self.migrating = true;
        self.episodes += 1;
        debug!(
            episode = self.episodes,
            old_len = self.old.len(),
            new_len,
            count = self.entries.len(),
            "incremental migration started"
        );
    }

    fn finish_migration(&mut self) {
        debug!(
            episode = self.episodes,
            old_len = self.old.len(),
            new_len = self.current.len(),
            count = self.entries.len(),
            "incremental migration finished"
        );
        self.old = SlotArray::unallocated();
        self.cursor = 0;
        self.migrating = false;
    }

    pub(crate) fn step_if_migrating(&mut self) -> Option<StepReport> {
        self.migrating.then(|| self.migration_step())
    }

    /// Skip empty old buckets, relocate the next non-empty one into
    /// `current`, and finish once the cursor reaches the end of `old`.
    ///
    /// The skip is not bounded by anything smaller than `old.len()`.
    fn migration_step(&mut self) -> StepReport {
        debug_assert!(self.migrating);
        let mut report = StepReport::default();
        let old_len = self.old.len();

        while self.cursor < old_len && self.old.bucket(self.cursor).is_empty() {
            self.cursor += 1;
            report.skipped += 1;
        }

        if self.cursor < old_len {
            // Relocation reuses the cached hash and bypasses the
            // load-factor check, so no nested migration can start here.
            for k in self.old.take_bucket(self.cursor) {
                let hash = self
                    .entries
                    .get(k)
                    .map(|e| e.hash)
                    .expect("bucket handles always refer to live entries");
                self.current.push(hash, k);
                report.moved += 1;
            }
            self.cursor += 1;
        }

        if self.cursor >= old_len {
            self.finish_migration();
            report.finished = true;
        }

        trace!(
            cursor = self.cursor,
            old_len,
            skipped = report.skipped,
            moved = report.moved,
            finished = report.finished,
            "migration step"
        );
        report
    }

    /// Structural invariants, checked by tests after every operation.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) -> Result<(), String> {
        use std::collections::HashSet;

        if self.current.len() == 0 {
            return Err("current array has zero length".into());
        }
        if !self.migrating {
            if self.old.len() != 0 || self.cursor != 0 {
                return Err(format!(
                    "stable table with old_len={} cursor={}",
                    self.old.len(),
                    self.cursor
                ));
            }
        } else if self.cursor >= self.old.len() {
            return Err(format!(
                "migrating with cursor {} past old_len {}",
                self.cursor,
                self.old.len()
            ));
        }

        let mut seen = HashSet::new();
        for idx in 0..self.current.len() {
            for &k in self.current.bucket(idx) {
                let e = self.entries.get(k).ok_or("dangling handle in current")?;
                if self.current.index_of(e.hash) != idx {
                    return Err(format!("entry in wrong current bucket {idx}"));
                }
                if self.locate(e.hash) != Side::Current {
                    return Err(format!("current entry at {idx} routes to old"));
                }
                if !seen.insert(k) {
                    return Err("handle present twice".into());
                }
            }
        }
        for idx in 0..self.old.len() {
            let bucket = self.old.bucket(idx);
            if idx < self.cursor && !bucket.is_empty() {
                return Err(format!("drained old bucket {idx} is not empty"));
            }
            for &k in bucket {
                let e = self.entries.get(k).ok_or("dangling handle in old")?;
                if self.old.index_of(e.hash) != idx {
                    return Err(format!("entry in wrong old bucket {idx}"));
                }
                if !seen.insert(k) {
                    return Err("handle present twice".into());
                }
            }
        }
        if seen.len() != self.entries.len() {
            return Err(format!(
                "{} entries but {} bucket handles",
                self.entries.len(),
                seen.len()
            ));
        }
        debug_assert_eq!(
            self.current.handle_count() + self.old.handle_count(),
            seen.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Identity hashes make bucket placement predictable.
    fn table(capacity: usize, load_factor: f64) -> Table<u64, u64> {
        Table::new(capacity, load_factor)
    }

    fn insert(t: &mut Table<u64, u64>, k: u64, v: u64) -> Option<u64> {
        t.insert(k, k, v)
    }

    #[test]
    fn insert_update_remove_without_migration() {
        let mut t = table(8, 1.0);
        assert_eq!(insert(&mut t, 3, 30), None);
        assert_eq!(insert(&mut t, 11, 110), None); // same bucket as 3
        assert_eq!(insert(&mut t, 3, 31), Some(30));
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(3, &3), Some(&31));
        assert_eq!(t.get(11, &11), Some(&110));
        assert_eq!(t.remove(3, &3), Some(31));
        assert_eq!(t.remove(3, &3), None);
        assert!(!t.contains(3, &3));
        assert!(t.contains(11, &11));
        t.check_invariants().unwrap();
    }

    /// Threshold is `count >= capacity * load_factor`, checked after the
    /// fresh insert; the new array holds `count * 2` buckets.
    #[test]
    fn migration_starts_at_threshold_with_doubled_count() {
        let mut t = table(4, 0.75);
        for k in 0..2 {
            insert(&mut t, k, k);
            assert!(!t.is_migrating());
        }
        insert(&mut t, 2, 2); // 3 >= 4 * 0.75
        assert!(t.is_migrating());
        assert_eq!(t.capacity(), 6);
        assert_eq!(t.migration_progress(), Some((0, 4)));
        t.check_invariants().unwrap();
    }

    #[test]
    fn updates_never_start_migration() {
        let mut t = table(4, 0.75);
        insert(&mut t, 0, 0);
        insert(&mut t, 1, 1);
        for v in 0..10 {
            insert(&mut t, 1, v);
        }
        assert!(!t.is_migrating());
        assert_eq!(t.len(), 2);
    }

    /// Old layout [0]=0, [1]=empty, [2]=2, [3]=3,7 (len 4). Each step
    /// drains one non-empty bucket after skipping empties.
    #[test]
    fn step_skips_empties_and_moves_one_bucket() {
        let mut t = table(4, 1.0);
        for k in [0, 2, 3, 7] {
            insert(&mut t, k, k * 10);
        }
        assert_eq!(t.migration_progress(), Some((0, 4)));
        assert_eq!(t.capacity(), 8);

        let r = t.step_if_migrating().unwrap();
        assert_eq!((r.skipped, r.moved, r.finished), (0, 1, false));
        assert_eq!(t.migration_progress(), Some((1, 4)));
        t.check_invariants().unwrap();

        let r = t.step_if_migrating().unwrap();
        assert_eq!((r.skipped, r.moved, r.finished), (1, 1, false));
        assert_eq!(t.migration_progress(), Some((3, 4)));
        t.check_invariants().unwrap();

        let r = t.step_if_migrating().unwrap();
        assert_eq!((r.skipped, r.moved, r.finished), (0, 2, true));
        assert!(!t.is_migrating());
        assert_eq!(t.migration_progress(), None);
        assert_eq!(t.step_if_migrating(), None);
        t.check_invariants().unwrap();

        for k in [0, 2, 3, 7] {
            assert_eq!(t.get(k, &k), Some(&(k * 10)));
        }
    }

    /// Keys routed to `old` during migration are inserted there and picked
    /// up when the cursor passes their bucket.
    #[test]
    fn insert_during_migration_follows_cursor() {
        let mut t = table(4, 0.5);
        insert(&mut t, 0, 0);
        insert(&mut t, 1, 1); // starts migration, old len 4, current len 4
        assert!(t.is_migrating());
        t.step_if_migrating(); // drains bucket 0
        assert_eq!(t.migration_progress(), Some((1, 4)));

        assert_eq!(t.locate(4), Side::Current); // old idx 0 < cursor
        assert_eq!(t.locate(6), Side::Old); // old idx 2 >= cursor
        insert(&mut t, 4, 40);
        insert(&mut t, 6, 60);
        t.check_invariants().unwrap();

        while t.step_if_migrating().is_some() {
            t.check_invariants().unwrap();
        }
        assert_eq!(t.get(6, &6), Some(&60));
        assert_eq!(t.get(4, &4), Some(&40));
        assert_eq!(t.len(), 4);
    }

    /// Worst case for the skip loop: one live bucket at the far end of a
    /// large, otherwise empty old array.
    #[test]
    fn sparse_old_array_skips_in_a_single_step() {
        let mut t = table(64, 0.75);
        for k in 0..48 {
            insert(&mut t, k, k);
        }
        assert!(t.is_migrating());
        while t.step_if_migrating().is_some() {}
        let cap = t.capacity() as u64;
        for k in 0..47 {
            assert_eq!(t.remove(k, &k), Some(k));
        }
        // Grow again with only keys that land in the last bucket.
        let mut k = 47;
        while !t.is_migrating() {
            k += cap;
            insert(&mut t, k, k);
        }
        let old_len = t.migration_progress().unwrap().1;
        let mut worst = 0;
        let mut total = 0;
        let mut steps = 0;
        while let Some(r) = t.step_if_migrating() {
            worst = worst.max(r.skipped);
            total += r.skipped;
            steps += 1;
            t.check_invariants().unwrap();
        }
        // One step drains the live bucket, one scans the trailing empties.
        assert_eq!(steps, 2);
        assert_eq!(total, old_len - 1);
        assert!(worst >= old_len / 2, "expected a long scan, got {worst}");
    }
}
