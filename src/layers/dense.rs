//! Dense (fully connected) layer implementation
//!
//! This module provides a DenseLayer that performs the affine transformation
//! z_i = b_i + sum_j W[i][j] * a_j over a flattened column.

use crate::error::{NetworkError, Result};
use crate::layers::{Layer, LayerBackward};
use crate::tensor::Tensor;
use crate::utils::rng::{InitRange, SimpleRng};

/// Dense (fully connected) layer with weights and biases.
///
/// # Fields
///
/// * `num_in` - Number of input features
/// * `num_out` - Number of output features
/// * `weights` - Weight matrix (num_out × num_in); row i holds output i's weights
/// * `biases` - Bias vector (num_out)
///
/// Input must be a flattened column: shape `(num_in, 1, 1)` or a vector of
/// length `num_in`. Output is always shaped `(num_out, 1, 1)`.
///
/// # Example
///
/// ```
/// use rust_convnet::layers::{DenseLayer, Layer};
/// use rust_convnet::tensor::Tensor;
///
/// let weights = Tensor::from_rows(vec![vec![1.0, 0.0], vec![0.0, 2.0]]).unwrap();
/// let layer = DenseLayer::from_parts(weights, Tensor::vector(vec![0.5, 0.0])).unwrap();
/// let out = layer.forward(&Tensor::vector(vec![3.0, 4.0])).unwrap();
/// assert_eq!(out.as_slice(), &[3.5, 8.0]);
/// ```
#[derive(Debug, Clone)]
pub struct DenseLayer {
    num_in: usize,
    num_out: usize,
    weights: Tensor,
    biases: Tensor,
}

impl DenseLayer {
    /// Create a new DenseLayer with weights and biases drawn uniformly from `range`.
    pub fn new(num_in: usize, num_out: usize, rng: &mut SimpleRng, range: InitRange) -> Self {
        let mut weights = Tensor::zeros(&[num_out, num_in]);
        let mut biases = Tensor::zeros(&[num_out]);
        weights.rand_init(rng, range);
        biases.rand_init(rng, range);

        Self {
            num_in,
            num_out,
            weights,
            biases,
        }
    }

    /// Build a layer from explicit parameters.
    ///
    /// `weights` must be a (num_out × num_in) matrix and `biases` a vector of
    /// length num_out.
    pub fn from_parts(weights: Tensor, biases: Tensor) -> Result<Self> {
        if weights.rank() != 2 {
            return Err(NetworkError::expected(
                "DenseLayer::from_parts",
                "rank-2 weights",
                weights.shape(),
            ));
        }
        let (num_out, num_in) = (weights.shape()[0], weights.shape()[1]);
        if biases.shape() != [num_out] {
            return Err(NetworkError::shape(
                "DenseLayer::from_parts",
                [num_out],
                biases.shape(),
            ));
        }
        Ok(Self {
            num_in,
            num_out,
            weights,
            biases,
        })
    }

    pub fn input_size(&self) -> usize {
        self.num_in
    }

    pub fn output_size(&self) -> usize {
        self.num_out
    }

    pub fn weights(&self) -> &Tensor {
        &self.weights
    }

    pub fn biases(&self) -> &Tensor {
        &self.biases
    }

    fn check_column(&self, op: &'static str, column: &Tensor, len: usize) -> Result<()> {
        if column.dims3() != (len, 1, 1) {
            return Err(NetworkError::shape(op, [len, 1, 1], column.shape()));
        }
        Ok(())
    }
}

impl Layer for DenseLayer {
    fn name(&self) -> &'static str {
        "dense"
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        self.check_column("DenseLayer::forward", input, self.num_in)?;
        let a = input.as_slice();
        let w = self.weights.as_slice();

        let mut z = self.biases.as_slice().to_vec();
        for (i, out) in z.iter_mut().enumerate() {
            let row = &w[i * self.num_in..(i + 1) * self.num_in];
            *out += row.iter().zip(a).map(|(wij, aj)| wij * aj).sum::<f64>();
        }
        Tensor::new(vec![self.num_out, 1, 1], z)
    }

    /// Given dL/dz for each output, produces dL/dW[i][j] = dL/dz_i * a_j,
    /// dL/db_i = dL/dz_i and dL/da_j = sum_i dL/dz_i * W[i][j].
    fn backward(&self, input: &Tensor, grad_output: &Tensor) -> Result<LayerBackward> {
        self.check_column("DenseLayer::backward", input, self.num_in)?;
        self.check_column("DenseLayer::backward", grad_output, self.num_out)?;
        let a = input.as_slice();
        let dz = grad_output.as_slice();
        let w = self.weights.as_slice();

        let mut grad_w = Tensor::zeros(&[self.num_out, self.num_in]);
        let mut grad_a = vec![0.0; self.num_in];
        {
            let gw = grad_w.as_mut_slice();
            for (i, &dz_i) in dz.iter().enumerate() {
                let base = i * self.num_in;
                for j in 0..self.num_in {
                    gw[base + j] = dz_i * a[j];
                    grad_a[j] += dz_i * w[base + j];
                }
            }
        }

        Ok(LayerBackward {
            grad_input: Tensor::new(input.shape().to_vec(), grad_a)?,
            param_grads: vec![grad_w, Tensor::vector(dz.to_vec())],
        })
    }

    fn parameters(&self) -> Vec<&Tensor> {
        vec![&self.weights, &self.biases]
    }

    fn parameters_mut(&mut self) -> Vec<&mut [f64]> {
        vec![self.weights.as_mut_slice(), self.biases.as_mut_slice()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_layer_creation() {
        let mut rng = SimpleRng::new(42);
        let layer = DenseLayer::new(10, 5, &mut rng, InitRange::default());

        assert_eq!(layer.input_size(), 10);
        assert_eq!(layer.output_size(), 5);
        assert_eq!(layer.weights.shape(), &[5, 10]);
        assert_eq!(layer.biases.len(), 5);
        assert_eq!(layer.parameter_count(), 55);
        assert!(layer.has_parameters());
    }

    #[test]
    fn test_initialization_within_range() {
        let mut rng = SimpleRng::new(42);
        let layer = DenseLayer::new(100, 50, &mut rng, InitRange::default());

        for &w in layer.weights.as_slice().iter().chain(layer.biases.as_slice()) {
            assert!((-1.0..1.0).contains(&w), "parameter {} outside [-1, 1)", w);
        }
    }

    #[test]
    fn test_deterministic_initialization() {
        let mut rng1 = SimpleRng::new(42);
        let layer1 = DenseLayer::new(10, 5, &mut rng1, InitRange::default());

        let mut rng2 = SimpleRng::new(42);
        let layer2 = DenseLayer::new(10, 5, &mut rng2, InitRange::default());

        assert_eq!(layer1.weights, layer2.weights);
        assert_eq!(layer1.biases, layer2.biases);
    }

    #[test]
    fn test_from_parts_rejects_bias_length() {
        let weights = Tensor::zeros(&[3, 2]);
        assert!(DenseLayer::from_parts(weights, Tensor::vector(vec![0.0; 2])).is_err());
    }

    #[test]
    fn test_forward_rejects_wrong_length() {
        let mut rng = SimpleRng::new(1);
        let layer = DenseLayer::new(3, 2, &mut rng, InitRange::default());
        let err = layer.forward(&Tensor::vector(vec![1.0, 2.0])).unwrap_err();
        assert!(matches!(err, NetworkError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_forward_rejects_unflattened_input() {
        let mut rng = SimpleRng::new(1);
        let layer = DenseLayer::new(4, 2, &mut rng, InitRange::default());
        assert!(layer.forward(&Tensor::zeros(&[1, 2, 2])).is_err());
    }

    #[test]
    fn test_parameters_mut_edits_values_not_shapes() {
        let mut layer = DenseLayer::from_parts(Tensor::zeros(&[2, 3]), Tensor::zeros(&[2])).unwrap();
        {
            let mut params = layer.parameters_mut();
            assert_eq!(params.len(), 2);
            assert_eq!(params[0].len(), 6);
            params[0][5] = 2.0;
            params[1][0] = -1.0;
        }
        assert_eq!(layer.weights.shape(), &[2, 3]);
        assert_eq!(layer.biases.shape(), &[2]);

        let out = layer.forward(&Tensor::vector(vec![0.0, 0.0, 1.5])).unwrap();
        assert_eq!(out.as_slice(), &[-1.0, 3.0]);
    }
}
