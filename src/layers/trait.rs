//! Layer trait definition for network layers
//!
//! This module defines the capability set every layer implements: a forward
//! operator, a backward operator, and optional ownership of parameters.

use crate::error::Result;
use crate::tensor::Tensor;
use std::fmt;

/// Result of pushing a gradient back through one layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerBackward {
    /// Gradient of the loss with respect to this layer's input.
    pub grad_input: Tensor,
    /// Gradient for each tensor returned by `Layer::parameters`, in the same
    /// order. Empty for layers without parameters.
    pub param_grads: Vec<Tensor>,
}

impl LayerBackward {
    pub fn passthrough(grad_input: Tensor) -> Self {
        Self {
            grad_input,
            param_grads: Vec::new(),
        }
    }
}

/// Core trait for network layers.
///
/// Layers are immutable during evaluation: `forward` and `backward` take
/// `&self`, and anything backward needs comes from the cached `input` the
/// network hands back to it. This keeps one layer stack shareable across
/// threads while each `Network` owns its own activation cache.
///
/// # Example
///
/// ```
/// use rust_convnet::layers::{Activation, Layer};
/// use rust_convnet::tensor::Tensor;
///
/// let z = Tensor::from_channels(vec![vec![vec![1.0, -2.0]]]).unwrap();
/// let a = Activation::Relu.forward(&z).unwrap();
/// assert_eq!(a.as_slice(), &[1.0, 0.0]);
///
/// let step = Activation::Relu.backward(&z, &a).unwrap();
/// assert_eq!(step.grad_input.as_slice(), &[1.0, 0.0]);
/// assert!(step.param_grads.is_empty());
/// ```
pub trait Layer: fmt::Debug + Send + Sync {
    /// Short human-readable layer kind, used in logs and gradient records.
    fn name(&self) -> &'static str;

    /// Forward propagation through the layer.
    ///
    /// # Errors
    ///
    /// Returns `NetworkError::ShapeMismatch` if `input` violates the layer's
    /// shape contract. Layers never pad or truncate.
    fn forward(&self, input: &Tensor) -> Result<Tensor>;

    /// Backward propagation through the layer.
    ///
    /// # Arguments
    ///
    /// * `input` - The input this layer saw during the matching forward pass
    /// * `grad_output` - Gradient of the loss with respect to this layer's output
    fn backward(&self, input: &Tensor, grad_output: &Tensor) -> Result<LayerBackward>;

    /// Get the number of trainable parameters in the layer.
    fn parameter_count(&self) -> usize {
        self.parameters().iter().map(|p| p.len()).sum()
    }

    fn has_parameters(&self) -> bool {
        !self.parameters().is_empty()
    }

    /// Parameter tensors, biases last.
    fn parameters(&self) -> Vec<&Tensor> {
        Vec::new()
    }

    /// Mutable views of the parameter values, in `parameters` order.
    ///
    /// Slices rather than tensors, so callers can change values but never
    /// shapes.
    fn parameters_mut(&mut self) -> Vec<&mut [f64]> {
        Vec::new()
    }
}
