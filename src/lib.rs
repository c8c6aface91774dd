//! incremental-hashmap: a single-threaded hash map that spreads the cost
//! of growing across later operations instead of rehashing everything in
//! one pause.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: bound the latency of any single call while the table grows, the
//!   way in-memory key-value stores rehash progressively.
//! - Layers:
//!   - SlotArray: fixed-length array of buckets; each bucket is a short
//!     chain of entry handles. Never resized in place.
//!   - Table<K, V>: entry arena plus two SlotArrays (`current`, `old`)
//!     and a migration cursor. Routes a precomputed hash to the array that
//!     owns it and runs the start/step/finish migration state machine.
//!   - IncrementalHashMap<K, V, S>: public API. Hashes keys with the
//!     supplied `BuildHasher`, steps migration, maps absence to
//!     `KeyNotFound`, and guards against reentrancy in debug builds.
//!
//! Migration
//! - Starts after a fresh insert when `len >= capacity * load_factor` and
//!   no migration is running: the current array becomes `old` and a new
//!   array of `len * 2` buckets becomes `current`.
//! - `get`, `get_mut`, `set` and `remove` each run one step first: skip
//!   empty old buckets, move the next non-empty one into `current`, and
//!   advance the cursor past it. The step that reaches the end of `old`
//!   releases it.
//! - `contains_key` takes `&self` and never steps.
//! - Routing: while migrating, a key whose `old` index is at or past the
//!   cursor lives in `old`; otherwise it lives in `current`. Every key is
//!   in exactly one bucket at all times.
//!
//! Constraints
//! - Single-threaded: `Send` when `K`, `V` and `S` are, never `Sync`.
//! - Entries live in a `slotmap` arena; buckets hold handles. Migration
//!   moves handles, so entries are never copied and `len` never drifts.
//! - Each entry caches its `u64` hash. `K: Hash` is called once per key at
//!   insertion and never during migration.
//! - Reentrancy from `K: Eq`/`K: Hash`/`S` into the same map panics in
//!   debug builds (see `reentrancy`).
//!
//! Latency
//! - One step moves at most one old bucket, but the empty-bucket skip
//!   that precedes it can cover up to `old.len()` buckets when the old
//!   array is sparse. This is measured by the tests and benches rather
//!   than capped.
//!
//! Notes and non-goals
//! - No iteration, ordering, serialization or shrinking.
//! - No hashing algorithm of its own; the default `S` is hashbrown's
//!   `DefaultHashBuilder`.

mod config;
mod error;
mod incremental_hash_map;
mod incremental_hash_map_proptest;
mod reentrancy;
mod slot_array;
mod table;

// Public surface
pub use config::{MapConfig, DEFAULT_CAPACITY, DEFAULT_LOAD_FACTOR};
pub use error::{ConfigError, KeyNotFound};
pub use incremental_hash_map::IncrementalHashMap;
