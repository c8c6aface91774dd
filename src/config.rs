//! Construction parameters for `IncrementalHashMap`.

use crate::error::ConfigError;

pub const DEFAULT_CAPACITY: usize = 16;
pub const DEFAULT_LOAD_FACTOR: f64 = 0.75;

/// Initial bucket count and growth threshold.
///
/// A migration starts once the number of stored keys reaches
/// `capacity * load_factor` of the current bucket array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapConfig {
    pub initial_capacity: usize,
    pub load_factor: f64,
}

impl MapConfig {
    pub fn new(initial_capacity: usize, load_factor: f64) -> Self {
        Self {
            initial_capacity,
            load_factor,
        }
    }

    pub fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    pub fn with_load_factor(mut self, load_factor: f64) -> Self {
        self.load_factor = load_factor;
        self
    }

    /// Capacity must be non-zero; load factor must be finite and in `(0, 1]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        let lf = self.load_factor;
        if !lf.is_finite() || lf <= 0.0 || lf > 1.0 {
            return Err(ConfigError::InvalidLoadFactor(lf));
        }
        Ok(())
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_LOAD_FACTOR)
    }
}
