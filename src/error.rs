//! Error types returned by the map and its configuration.

use thiserror::Error;

/// Returned by `get`, `get_mut` and `remove` when the key has no entry.
///
/// Always recoverable: the map is unchanged apart from any migration step
/// the call performed before searching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no entry for key")]
pub struct KeyNotFound;

/// Rejected construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ConfigError {
    #[error("initial capacity must be at least one bucket")]
    ZeroCapacity,
    #[error("load factor must be finite and in (0, 1], got {0}")]
    InvalidLoadFactor(f64),
}
