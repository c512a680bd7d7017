//! Seeded random source for parameter initialization.
//!
//! The generator is an explicit object owned by the caller. It is seeded once
//! and passed by reference into every initialization call, so two runs with the
//! same seed build identical networks.

use crate::error::ConfigError;

/// Xorshift PRNG for reproducible initialization (not cryptographic).
#[derive(Debug, Clone)]
pub struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    /// Create a new RNG with explicit seed (if zero, use a fixed value).
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 0x9e3779b97f4a7c15 } else { seed };
        Self { state }
    }

    /// Basic xorshift to generate u32.
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        (x >> 32) as u32
    }

    /// Convert to [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        self.next_u32() as f64 / (u32::MAX as f64 + 1.0)
    }

    /// Uniform sample in [low, high).
    pub fn gen_range_f64(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.next_f64()
    }

    /// Integer sample in [0, upper).
    pub fn gen_usize(&mut self, upper: usize) -> usize {
        if upper == 0 {
            0
        } else {
            (self.next_u32() as usize) % upper
        }
    }
}

/// Range that freshly initialized weights and biases are drawn from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitRange {
    pub low: f64,
    pub high: f64,
}

impl InitRange {
    pub fn new(low: f64, high: f64) -> Result<Self, ConfigError> {
        if !(low < high) {
            return Err(ConfigError::invalid(format!(
                "init range [{}, {}) must satisfy low < high",
                low, high
            )));
        }
        Ok(Self { low, high })
    }
}

impl Default for InitRange {
    fn default() -> Self {
        Self {
            low: -1.0,
            high: 1.0,
        }
    }
}
