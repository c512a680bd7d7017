//! Max pooling layer implementation
//!
//! Reduces every channel independently with a sliding max window. Window
//! height, width and stride are independent, so overlapping and non-square
//! windows are both supported.

use crate::error::{NetworkError, Result};
use crate::layers::{Layer, LayerBackward};
use crate::tensor::{window_output_dim, Tensor};

/// Max pooling layer. Owns no parameters.
///
/// # Example
///
/// ```
/// use rust_convnet::layers::{Layer, MaxPoolLayer};
/// use rust_convnet::tensor::Tensor;
///
/// let input = Tensor::from_channels(vec![vec![
///     vec![0.0, 1.0, 2.0, 3.0],
///     vec![4.0, 5.0, 6.0, 7.0],
///     vec![1.0, 1.0, 1.0, 1.0],
///     vec![9.0, 0.0, 6.0, 3.0],
/// ]])
/// .unwrap();
/// let pooled = MaxPoolLayer::square(2).forward(&input).unwrap();
/// assert_eq!(pooled.to_rows(), vec![vec![5.0, 7.0], vec![9.0, 6.0]]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxPoolLayer {
    height: usize,
    width: usize,
    stride: usize,
}

impl MaxPoolLayer {
    pub fn new(height: usize, width: usize, stride: usize) -> Self {
        Self {
            height,
            width,
            stride,
        }
    }

    /// Square, non-overlapping window: height = width = stride = `size`.
    pub fn square(size: usize) -> Self {
        Self::new(size, size, size)
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Output (rows, cols) for an input of `rows` × `cols`.
    pub fn output_dims(&self, rows: usize, cols: usize) -> Result<(usize, usize)> {
        Ok((
            window_output_dim("MaxPoolLayer", rows, self.height, self.stride)?,
            window_output_dim("MaxPoolLayer", cols, self.width, self.stride)?,
        ))
    }

    /// Position of the first maximum in the window anchored at (top, left),
    /// scanning row-major and replacing only on a strictly greater value.
    fn window_argmax(&self, input: &Tensor, channel: usize, top: usize, left: usize) -> (usize, usize) {
        let mut best = (top, left);
        let mut max_value = input.at3(channel, top, left);
        for y in top..top + self.height {
            for x in left..left + self.width {
                let value = input.at3(channel, y, x);
                if value > max_value {
                    max_value = value;
                    best = (y, x);
                }
            }
        }
        best
    }
}

impl Layer for MaxPoolLayer {
    fn name(&self) -> &'static str {
        "maxpool"
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let (channels, rows, cols) = input.dims3();
        let (out_h, out_w) = self.output_dims(rows, cols)?;

        let mut output = Tensor::zeros(&[channels, out_h, out_w]);
        for c in 0..channels {
            for oy in 0..out_h {
                for ox in 0..out_w {
                    let (y, x) = self.window_argmax(input, c, oy * self.stride, ox * self.stride);
                    output.set3(c, oy, ox, input.at3(c, y, x));
                }
            }
        }
        Ok(output)
    }

    /// Routes each output gradient entirely to the cell its window selected.
    fn backward(&self, input: &Tensor, grad_output: &Tensor) -> Result<LayerBackward> {
        let (channels, rows, cols) = input.dims3();
        let (out_h, out_w) = self.output_dims(rows, cols)?;
        if grad_output.dims3() != (channels, out_h, out_w) {
            return Err(NetworkError::shape(
                "MaxPoolLayer::backward",
                [channels, out_h, out_w],
                grad_output.shape(),
            ));
        }

        let mut grad_input = Tensor::zeros(input.shape());
        for c in 0..channels {
            for oy in 0..out_h {
                for ox in 0..out_w {
                    let (y, x) = self.window_argmax(input, c, oy * self.stride, ox * self.stride);
                    grad_input.add_at3(c, y, x, grad_output.at3(c, oy, ox));
                }
            }
        }
        Ok(LayerBackward::passthrough(grad_input))
    }
}

/// Max-pool a single 2-D map.
pub fn max_pool2d(map: &Tensor, height: usize, width: usize, stride: usize) -> Result<Tensor> {
    let (rows, cols) = (map.rows(), map.cols());
    let pooled = MaxPoolLayer::new(height, width, stride).forward(&map.reshape(&[1, rows, cols])?)?;
    pooled.channel(0)
}
