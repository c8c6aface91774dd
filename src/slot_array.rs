//! SlotArray: fixed-length bucket array holding entry handles.
//!
//! Buckets store arena handles (`DefaultKey`) rather than entries, so
//! relocating an entry between arrays only moves its handle. Matching is
//! delegated to the caller, which owns the arena.

use slotmap::DefaultKey;

#[derive(Debug)]
pub(crate) struct SlotArray {
    buckets: Box<[Vec<DefaultKey>]>,
}

impl SlotArray {
    /// Allocate `len` empty buckets. Callers never ask for zero.
    pub(crate) fn with_len(len: usize) -> Self {
        debug_assert!(len > 0, "slot array length must be non-zero");
        Self {
            buckets: std::iter::repeat_with(Vec::new).take(len).collect(),
        }
    }

    /// Zero-length placeholder for the old array while no migration runs.
    pub(crate) fn unallocated() -> Self {
        Self {
            buckets: Box::default(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub(crate) fn index_of(&self, hash: u64) -> usize {
        (hash % self.buckets.len() as u64) as usize
    }

    pub(crate) fn bucket(&self, idx: usize) -> &[DefaultKey] {
        &self.buckets[idx]
    }

    pub(crate) fn push(&mut self, hash: u64, k: DefaultKey) {
        let idx = self.index_of(hash);
        self.buckets[idx].push(k);
    }

    pub(crate) fn find<F>(&self, hash: u64, mut is_match: F) -> Option<DefaultKey>
    where
        F: FnMut(DefaultKey) -> bool,
    {
        let idx = self.index_of(hash);
        self.buckets[idx].iter().copied().find(|&k| is_match(k))
    }

    /// Unlink the first matching handle from its bucket. Order within a
    /// bucket is not preserved.
    pub(crate) fn remove<F>(&mut self, hash: u64, mut is_match: F) -> Option<DefaultKey>
    where
        F: FnMut(DefaultKey) -> bool,
    {
        let idx = self.index_of(hash);
        let bucket = &mut self.buckets[idx];
        let pos = bucket.iter().position(|&k| is_match(k))?;
        Some(bucket.swap_remove(pos))
    }

    /// Empty the bucket at `idx`, releasing its storage.
    pub(crate) fn take_bucket(&mut self, idx: usize) -> Vec<DefaultKey> {
        std::mem::take(&mut self.buckets[idx])
    }

    #[cfg(test)]
    pub(crate) fn handle_count(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }
}
