//! Convolution layer implementation
//!
//! This module provides a ConvolutionLayer that computes one feature map per
//! filter by valid (unpadded) cross-correlation, summed across input channels.
//! Filters are not flipped.
//!
//! Each filter carries its own square size and stride. Every filter must still
//! produce the same output extent, since the layer output is a single
//! (filter, row, column) volume.

use crate::error::{NetworkError, Result};
use crate::layers::{Layer, LayerBackward};
use crate::tensor::{window_output_dim, Tensor};
use crate::utils::rng::{InitRange, SimpleRng};
use rayon::prelude::*;

/// Convolution layer with learnable square filters and one bias per filter.
///
/// # Fields
///
/// * `num_input_channels` - Number of channels every input must carry
/// * `filters` - One (F_i × F_i) weight matrix per filter
/// * `strides` - One stride per filter
/// * `biases` - Bias added to every cell of filter i's feature map (num_filters)
///
/// # Example
///
/// ```
/// use rust_convnet::layers::{ConvolutionLayer, Layer};
/// use rust_convnet::tensor::Tensor;
///
/// let filter = Tensor::from_rows(vec![vec![1.0]]).unwrap();
/// let layer = ConvolutionLayer::from_filters(1, vec![filter], vec![2]).unwrap();
/// let input = Tensor::from_channels(vec![vec![
///     vec![9.0, 1.0, 9.0],
///     vec![0.0, 1.0, 9.0],
///     vec![9.0, 0.0, 9.0],
/// ]])
/// .unwrap();
/// let out = layer.forward(&input).unwrap();
/// assert_eq!(out.shape(), &[1, 2, 2]);
/// assert_eq!(out.as_slice(), &[9.0, 9.0, 9.0, 9.0]);
/// ```
#[derive(Debug, Clone)]
pub struct ConvolutionLayer {
    num_input_channels: usize,
    filters: Vec<Tensor>,
    strides: Vec<usize>,
    biases: Tensor,
}

impl ConvolutionLayer {
    /// Create a layer whose filters are drawn uniformly from `range`.
    ///
    /// Biases start at zero.
    ///
    /// # Arguments
    ///
    /// * `num_input_channels` - Number of input channels
    /// * `sizes` - Side length of each square filter
    /// * `strides` - Stride of each filter; must be as long as `sizes`
    /// * `rng` - Caller-owned random source
    /// * `range` - Sampling range for filter weights
    pub fn new(
        num_input_channels: usize,
        sizes: &[usize],
        strides: &[usize],
        rng: &mut SimpleRng,
        range: InitRange,
    ) -> Result<Self> {
        let filters = sizes
            .iter()
            .map(|&size| {
                let mut filter = Tensor::zeros(&[size, size]);
                filter.rand_init(rng, range);
                filter
            })
            .collect();
        Self::from_filters(num_input_channels, filters, strides.to_vec())
    }

    /// Build a layer from explicit square filters. Biases start at zero.
    pub fn from_filters(
        num_input_channels: usize,
        filters: Vec<Tensor>,
        strides: Vec<usize>,
    ) -> Result<Self> {
        if filters.len() != strides.len() {
            return Err(NetworkError::expected(
                "ConvolutionLayer::from_filters",
                format!("{} strides", filters.len()),
                strides.len(),
            ));
        }
        for filter in &filters {
            let shape = filter.shape();
            if shape.len() != 2 || shape[0] != shape[1] || shape[0] == 0 {
                return Err(NetworkError::expected(
                    "ConvolutionLayer::from_filters",
                    "non-empty square filter",
                    shape,
                ));
            }
        }
        if let Some(&stride) = strides.iter().find(|&&s| s == 0) {
            return Err(NetworkError::expected(
                "ConvolutionLayer::from_filters",
                "stride > 0",
                stride,
            ));
        }

        let biases = Tensor::zeros(&[filters.len()]);
        Ok(Self {
            num_input_channels,
            filters,
            strides,
            biases,
        })
    }

    /// Replace the per-filter biases.
    pub fn with_biases(mut self, biases: Tensor) -> Result<Self> {
        if biases.shape() != [self.filters.len()] {
            return Err(NetworkError::shape(
                "ConvolutionLayer::with_biases",
                [self.filters.len()],
                biases.shape(),
            ));
        }
        self.biases = biases;
        Ok(self)
    }

    pub fn num_input_channels(&self) -> usize {
        self.num_input_channels
    }

    pub fn num_filters(&self) -> usize {
        self.filters.len()
    }

    pub fn filter_sizes(&self) -> Vec<usize> {
        self.filters.iter().map(Tensor::rows).collect()
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn filters(&self) -> &[Tensor] {
        &self.filters
    }

    pub fn biases(&self) -> &Tensor {
        &self.biases
    }

    /// Output (rows, cols) shared by every feature map.
    ///
    /// Calculated per filter as floor((extent - F_i) / S_i) + 1; fails if any
    /// filter is larger than the input or the filters disagree.
    pub fn output_dims(&self, rows: usize, cols: usize) -> Result<(usize, usize)> {
        let mut dims = None;
        for (filter, &stride) in self.filters.iter().zip(&self.strides) {
            let size = filter.rows();
            let filter_dims = (
                window_output_dim("ConvolutionLayer", rows, size, stride)?,
                window_output_dim("ConvolutionLayer", cols, size, stride)?,
            );
            match dims {
                Some(expected) if expected != filter_dims => {
                    return Err(NetworkError::shape(
                        "ConvolutionLayer::output_dims",
                        expected,
                        filter_dims,
                    ));
                }
                _ => dims = Some(filter_dims),
            }
        }
        dims.ok_or_else(|| NetworkError::expected("ConvolutionLayer", "at least one filter", 0))
    }

    fn check_input(&self, input: &Tensor) -> Result<(usize, usize)> {
        let (channels, rows, cols) = input.dims3();
        if channels != self.num_input_channels {
            return Err(NetworkError::expected(
                "ConvolutionLayer",
                format!("{} input channels", self.num_input_channels),
                channels,
            ));
        }
        self.output_dims(rows, cols)
    }
}

impl Layer for ConvolutionLayer {
    fn name(&self) -> &'static str {
        "conv"
    }

    /// One feature map per filter, stacked in filter order, each map offset
    /// by its filter's bias.
    ///
    /// # Errors
    ///
    /// `NetworkError::ShapeMismatch` if the channel count is wrong, if a
    /// filter is larger than the input, or if two filters produce maps of
    /// different extent for this input (for example a 3x3 filter at stride 1
    /// and a 5x5 filter at stride 2 on a 28x28 input give 26x26 and 12x12).
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        self.check_input(input)?;

        // Each filter writes only its own map.
        let maps = self
            .filters
            .par_iter()
            .zip(self.strides.par_iter())
            .zip(self.biases.as_slice().par_iter())
            .map(|((filter, &stride), &bias)| {
                correlate_channels(input, filter, stride).map(|map| map.map(|v| v + bias))
            })
            .collect::<Result<Vec<Tensor>>>()?;

        Tensor::stack_channels(&maps)
    }

    /// Per filter i with gradient map g_i:
    /// dW_i[p][q] = sum_c sum_(y,x) g_i[y][x] * in[c][y*S+p][x*S+q],
    /// db_i = sum g_i, and every input channel receives the full correlation
    /// of g_i with W_i, summed over filters.
    fn backward(&self, input: &Tensor, grad_output: &Tensor) -> Result<LayerBackward> {
        let (out_h, out_w) = self.check_input(input)?;
        if grad_output.dims3() != (self.filters.len(), out_h, out_w) {
            return Err(NetworkError::shape(
                "ConvolutionLayer::backward",
                [self.filters.len(), out_h, out_w],
                grad_output.shape(),
            ));
        }
        let (channels, rows, cols) = input.dims3();

        let per_filter: Vec<(Tensor, f64, Tensor)> = self
            .filters
            .par_iter()
            .zip(self.strides.par_iter())
            .enumerate()
            .map(|(i, (filter, &stride))| {
                let size = filter.rows();
                let mut grad_filter = Tensor::zeros(&[size, size]);
                let mut grad_in = Tensor::zeros(&[channels, rows, cols]);
                let mut grad_bias = 0.0;

                for oy in 0..out_h {
                    for ox in 0..out_w {
                        let g = grad_output.at3(i, oy, ox);
                        grad_bias += g;
                        let (top, left) = (oy * stride, ox * stride);
                        for p in 0..size {
                            for q in 0..size {
                                let w = filter.at2(p, q);
                                let mut acc = 0.0;
                                for c in 0..channels {
                                    acc += input.at3(c, top + p, left + q);
                                    grad_in.add_at3(c, top + p, left + q, g * w);
                                }
                                grad_filter.add_at3(0, p, q, g * acc);
                            }
                        }
                    }
                }
                (grad_filter, grad_bias, grad_in)
            })
            .collect();

        let mut grad_input = Tensor::zeros(input.shape());
        let mut param_grads = Vec::with_capacity(self.filters.len() + 1);
        let mut grad_biases = Vec::with_capacity(self.filters.len());
        for (grad_filter, grad_bias, grad_in) in per_filter {
            grad_input = grad_input.add_elementwise(&grad_in.reshape(input.shape())?)?;
            param_grads.push(grad_filter);
            grad_biases.push(grad_bias);
        }
        param_grads.push(Tensor::vector(grad_biases));

        Ok(LayerBackward {
            grad_input,
            param_grads,
        })
    }

    fn parameters(&self) -> Vec<&Tensor> {
        self.filters.iter().chain(std::iter::once(&self.biases)).collect()
    }

    fn parameters_mut(&mut self) -> Vec<&mut [f64]> {
        self.filters
            .iter_mut()
            .chain(std::iter::once(&mut self.biases))
            .map(Tensor::as_mut_slice)
            .collect()
    }
}

/// Cross-correlate one channel of `input` with `filter`, accumulating into
/// `output` (out_h × out_w).
fn correlate_channel_into(
    input: &Tensor,
    channel: usize,
    filter: &Tensor,
    stride: usize,
    output: &mut Tensor,
) {
    let size = filter.rows();
    let (_, out_h, out_w) = output.dims3();
    for oy in 0..out_h {
        for ox in 0..out_w {
            let (top, left) = (oy * stride, ox * stride);
            let mut acc = 0.0;
            for p in 0..size {
                for q in 0..size {
                    acc += input.at3(channel, top + p, left + q) * filter.at2(p, q);
                }
            }
            output.add_at3(0, oy, ox, acc);
        }
    }
}

/// Valid cross-correlation of a single 2-D map with a square filter.
pub fn correlate2d(map: &Tensor, filter: &Tensor, stride: usize) -> Result<Tensor> {
    if map.channels() != 1 {
        return Err(NetworkError::expected("correlate2d", "single channel", map.shape()));
    }
    correlate_channels(map, filter, stride)
}

/// Cross-correlate every channel of `volume` with the same filter and sum the
/// per-channel maps into one feature map.
pub fn correlate_channels(volume: &Tensor, filter: &Tensor, stride: usize) -> Result<Tensor> {
    let (channels, rows, cols) = volume.dims3();
    let (f_rows, f_cols) = (filter.rows(), filter.cols());
    let out_h = window_output_dim("correlate", rows, f_rows, stride)?;
    let out_w = window_output_dim("correlate", cols, f_cols, stride)?;

    let mut output = Tensor::zeros(&[out_h, out_w]);
    for c in 0..channels {
        correlate_channel_into(volume, c, filter, stride, &mut output);
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conv_initialization() {
        let mut rng = SimpleRng::new(42);
        let layer =
            ConvolutionLayer::new(1, &[3, 3], &[1, 1], &mut rng, InitRange::default()).unwrap();

        assert_eq!(layer.num_input_channels(), 1);
        assert_eq!(layer.num_filters(), 2);
        assert_eq!(layer.filter_sizes(), vec![3, 3]);
        assert_eq!(layer.strides(), &[1, 1]);
        // 2 * 3 * 3 weights + 2 biases
        assert_eq!(layer.parameter_count(), 20);
    }

    #[test]
    fn test_conv_initialization_bounds() {
        let mut rng = SimpleRng::new(42);
        let layer =
            ConvolutionLayer::new(3, &[5; 4], &[2; 4], &mut rng, InitRange::default()).unwrap();
        for filter in layer.filters() {
            for &w in filter.as_slice() {
                assert!((-1.0..1.0).contains(&w));
            }
        }
        assert!(layer.biases().as_slice().iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_mismatched_strides_rejected() {
        let filters = vec![Tensor::zeros(&[2, 2])];
        assert!(ConvolutionLayer::from_filters(1, filters.clone(), vec![]).is_err());
        assert!(ConvolutionLayer::from_filters(1, filters, vec![0]).is_err());
        assert!(ConvolutionLayer::from_filters(1, vec![Tensor::zeros(&[2, 3])], vec![1]).is_err());
    }

    #[test]
    fn test_filters_must_agree_on_output_extent() {
        let mut rng = SimpleRng::new(3);
        let layer =
            ConvolutionLayer::new(1, &[3, 5], &[1, 2], &mut rng, InitRange::default()).unwrap();
        // 28x28: 3/1 -> 26, 5/2 -> 12
        assert!(layer.output_dims(28, 28).is_err());

        let layer =
            ConvolutionLayer::new(1, &[3, 5], &[1, 1], &mut rng, InitRange::default()).unwrap();
        let err = layer.output_dims(5, 5).unwrap_err();
        assert!(matches!(err, NetworkError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_wrong_channel_count_rejected() {
        let layer =
            ConvolutionLayer::from_filters(2, vec![Tensor::zeros(&[1, 1])], vec![1]).unwrap();
        assert!(layer.forward(&Tensor::zeros(&[3, 4, 4])).is_err());
    }

    #[test]
    fn test_bias_added_to_every_cell() {
        let filter = Tensor::from_rows(vec![vec![1.0]]).unwrap();
        let layer = ConvolutionLayer::from_filters(1, vec![filter], vec![1])
            .unwrap()
            .with_biases(Tensor::vector(vec![0.5]))
            .unwrap();
        let out = layer.forward(&Tensor::zeros(&[1, 2, 2])).unwrap();
        assert_eq!(out.as_slice(), &[0.5; 4]);
    }

    #[test]
    fn test_parameters_mut_order_matches_parameters() {
        let filters = vec![Tensor::zeros(&[2, 2]), Tensor::zeros(&[1, 1])];
        let mut layer = ConvolutionLayer::from_filters(1, filters, vec![1, 1]).unwrap();
        {
            let mut params = layer.parameters_mut();
            let lens: Vec<usize> = params.iter().map(|p| p.len()).collect();
            assert_eq!(lens, vec![4, 1, 2]);
            params[2][1] = 0.25;
        }
        let params = layer.parameters();
        let shapes: Vec<&[usize]> = params.iter().map(|p| p.shape()).collect();
        assert_eq!(shapes, vec![&[2, 2][..], &[1, 1][..], &[2][..]]);
        assert_eq!(layer.biases.as_slice(), &[0.0, 0.25]);
    }
}
