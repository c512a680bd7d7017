//! Elementwise activation layers

use crate::error::Result;
use crate::layers::{Layer, LayerBackward};
use crate::tensor::Tensor;
use crate::utils::activations::{relu, relu_derivative, sigmoid, sigmoid_derivative};

/// Parameter-free activation applied to every element of its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Sigmoid,
    Relu,
}

impl Activation {
    /// f(z)
    pub fn apply(self, z: f64) -> f64 {
        match self {
            Activation::Sigmoid => sigmoid(z),
            Activation::Relu => relu(z),
        }
    }

    /// da/dz at the pre-activation `z`.
    pub fn derivative(self, z: f64) -> f64 {
        match self {
            Activation::Sigmoid => sigmoid_derivative(z),
            Activation::Relu => relu_derivative(z),
        }
    }

    /// da/dz for every element of a cached pre-activation tensor.
    pub fn derivative_tensor(self, z: &Tensor) -> Tensor {
        z.map(|v| self.derivative(v))
    }
}

impl Layer for Activation {
    fn name(&self) -> &'static str {
        match self {
            Activation::Sigmoid => "sigmoid",
            Activation::Relu => "relu",
        }
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        Ok(input.map(|z| self.apply(z)))
    }

    fn backward(&self, input: &Tensor, grad_output: &Tensor) -> Result<LayerBackward> {
        let local = self.derivative_tensor(input);
        Ok(LayerBackward::passthrough(grad_output.mul_elementwise(&local)?))
    }
}
