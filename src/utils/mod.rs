//! Shared utilities for the network evaluator
//!
//! This module provides the seeded random source used for initialization and
//! the scalar activation functions used by the activation layers.

pub mod activations;
pub mod rng;

pub use rng::{InitRange, SimpleRng};
