//! Flatten layer: (channel, row, column) volume to a column of 1×1 maps

use crate::error::{NetworkError, Result};
use crate::layers::{Layer, LayerBackward};
use crate::tensor::Tensor;

/// Reshapes a volume into a column of scalars, each held as a 1×1 map.
///
/// Traversal order is channel, then row, then column. Dense layers index the
/// flattened column positionally, so this order must never change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlattenLayer;

impl FlattenLayer {
    pub fn new() -> Self {
        Self
    }

    /// Inverse reshape: restore a flattened column to `shape`.
    pub fn unflatten(column: &Tensor, shape: &[usize]) -> Result<Tensor> {
        let numel: usize = shape.iter().product();
        if column.dims3() != (numel, 1, 1) {
            return Err(NetworkError::shape(
                "FlattenLayer::unflatten",
                [numel, 1, 1],
                column.shape(),
            ));
        }
        column.reshape(shape)
    }
}

impl Layer for FlattenLayer {
    fn name(&self) -> &'static str {
        "flatten"
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        input.reshape(&[input.len(), 1, 1])
    }

    fn backward(&self, input: &Tensor, grad_output: &Tensor) -> Result<LayerBackward> {
        Ok(LayerBackward::passthrough(Self::unflatten(
            grad_output,
            input.shape(),
        )?))
    }
}
