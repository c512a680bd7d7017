//! Layer abstractions for the network
//!
//! This module provides the Layer trait and the five layer kinds a network
//! stacks: convolution, max pooling, activation, flatten and dense.

mod r#trait;
pub mod activation;
pub mod conv;
pub mod dense;
pub mod flatten;
pub mod pooling;

// Re-export the Layer trait for convenience
pub use activation::Activation;
pub use conv::ConvolutionLayer;
pub use dense::DenseLayer;
pub use flatten::FlattenLayer;
pub use pooling::MaxPoolLayer;
pub use r#trait::{Layer, LayerBackward};
