//! IncrementalHashMap: public API over `Table` with a pluggable hasher and
//! a debug reentrancy guard.

use crate::config::{MapConfig, DEFAULT_LOAD_FACTOR};
use crate::error::{ConfigError, KeyNotFound};
use crate::reentrancy::DebugReentrancy;
use crate::table::Table;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use hashbrown::hash_map::DefaultHashBuilder;

/// A hash map that grows by rehashing one bucket per operation.
///
/// When the number of keys reaches `capacity * load_factor`, the bucket
/// array is set aside as the *old* array and a new one of `len * 2`
/// buckets takes its place. Each later call to [`get`](Self::get),
/// [`get_mut`](Self::get_mut), [`set`](Self::set) or
/// [`remove`](Self::remove) moves at most one non-empty old bucket into
/// the new array. [`contains_key`](Self::contains_key) takes `&self` and
/// never advances migration.
///
/// ```
/// use incremental_hashmap::IncrementalHashMap;
///
/// let mut m = IncrementalHashMap::with_capacity(10);
/// for i in 0..10 {
///     m.set(i.to_string(), i);
/// }
/// assert_eq!(m.len(), 10);
/// assert_eq!(m.get("7"), Ok(&7));
/// assert_eq!(m.remove("7"), Ok(7));
/// assert!(m.get("7").is_err());
/// ```
pub struct IncrementalHashMap<K, V, S = DefaultHashBuilder> {
    hasher: S,
    table: Table<K, V>,
    reentrancy: DebugReentrancy,
}

impl<K, V> IncrementalHashMap<K, V>
where
    K: Eq + Hash,
{
    /// Default configuration: 16 buckets, load factor 0.75.
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }

    /// `initial_capacity` buckets with the default load factor. Zero is
    /// rounded up to one bucket.
    pub fn with_capacity(initial_capacity: usize) -> Self {
        let config = MapConfig::new(initial_capacity.max(1), DEFAULT_LOAD_FACTOR);
        Self::from_valid_config(config, Default::default())
    }

    pub fn with_config(config: MapConfig) -> Result<Self, ConfigError> {
        Self::with_config_and_hasher(config, Default::default())
    }
}

impl<K, V> Default for IncrementalHashMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> IncrementalHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::from_valid_config(MapConfig::default(), hasher)
    }

    pub fn with_config_and_hasher(config: MapConfig, hasher: S) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_valid_config(config, hasher))
    }

    fn from_valid_config(config: MapConfig, hasher: S) -> Self {
        Self {
            hasher,
            table: Table::new(config.initial_capacity, config.load_factor),
            reentrancy: DebugReentrancy::new(),
        }
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    /// Number of distinct keys, across both arrays while migrating.
    pub fn len(&self) -> usize {
        self.table.len()
    }
    pub fn is_empty(&self) -> bool {
        self.table.len() == 0
    }

    /// Bucket count of the current array.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    pub fn load_factor(&self) -> f64 {
        self.table.load_factor()
    }

    pub fn is_migrating(&self) -> bool {
        self.table.is_migrating()
    }

    /// `(cursor, old_len)` while migrating. Buckets of the old array below
    /// `cursor` have already been moved.
    pub fn migration_progress(&self) -> Option<(usize, usize)> {
        self.table.migration_progress()
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Membership test. Pure read: does not advance migration.
    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        let hash = self.make_hash(q);
        self.table.contains(hash, q)
    }

    /// Advance migration by one step, then look up `q`.
    pub fn get<Q>(&mut self, q: &Q) -> Result<&V, KeyNotFound>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        let hash = self.make_hash(q);
        self.table.step_if_migrating();
        self.table.get(hash, q).ok_or(KeyNotFound)
    }

    /// Like [`get`](Self::get), returning a mutable borrow of the value.
    pub fn get_mut<Q>(&mut self, q: &Q) -> Result<&mut V, KeyNotFound>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        let hash = self.make_hash(q);
        self.table.step_if_migrating();
        self.table.get_mut(hash, q).ok_or(KeyNotFound)
    }

    /// Insert or update. An existing key keeps its stored key and has its
    /// value replaced; the old value is returned.
    pub fn set(&mut self, key: K, value: V) -> Option<V> {
        let _g = self.reentrancy.enter();
        let hash = self.make_hash(&key);
        self.table.step_if_migrating();
        self.table.insert(hash, key, value)
    }

    pub fn remove<Q>(&mut self, q: &Q) -> Result<V, KeyNotFound>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        let hash = self.make_hash(q);
        self.table.step_if_migrating();
        self.table.remove(hash, q).ok_or(KeyNotFound)
    }

    #[cfg(test)]
    pub(crate) fn table(&self) -> &Table<K, V> {
        &self.table
    }
}

impl<K, V, S> fmt::Debug for IncrementalHashMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncrementalHashMap")
            .field("len", &self.table.len())
            .field("capacity", &self.table.capacity())
            .field("load_factor", &self.table.load_factor())
            .field("migration", &self.table.migration_progress())
            .finish()
    }
}
