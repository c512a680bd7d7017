//! Dense row-major tensors of rank 1 to 3
//!
//! Bias vectors are rank 1, matrices and filters rank 2, and feature map
//! stacks rank 3 ordered as (channel, row, column). Layers always exchange
//! rank-3 tensors; `dims3` gives any tensor a (channels, rows, cols) view so a
//! rank-1 vector reads as a column of 1×1 maps.

use crate::error::{NetworkError, Result};
use crate::utils::rng::{InitRange, SimpleRng};

#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl Tensor {
    /// Wrap `data` with the given shape.
    ///
    /// Fails when the rank is not 1, 2 or 3, or when the shape does not cover
    /// exactly `data.len()` elements.
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<Self> {
        if shape.is_empty() || shape.len() > 3 {
            return Err(NetworkError::expected("Tensor::new", "rank 1..=3", shape));
        }
        let numel: usize = shape.iter().product();
        if numel != data.len() {
            return Err(NetworkError::shape("Tensor::new", numel, data.len()));
        }
        Ok(Self { shape, data })
    }

    /// A zero-filled tensor.
    ///
    /// # Panics
    ///
    /// Panics if `shape` has no dimensions or more than three. Use
    /// [`Tensor::new`] for shapes that are not known to be valid.
    pub fn zeros(shape: &[usize]) -> Self {
        assert!(
            !shape.is_empty() && shape.len() <= 3,
            "Tensor::zeros: rank must be 1 to 3, got shape {:?}",
            shape
        );
        Self {
            shape: shape.to_vec(),
            data: vec![0.0; shape.iter().product()],
        }
    }

    /// A rank-1 tensor.
    pub fn vector(data: Vec<f64>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    /// Build a matrix from nested rows. Ragged rows are rejected.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(height * width);
        for row in rows {
            if row.len() != width {
                return Err(NetworkError::shape("Tensor::from_rows", width, row.len()));
            }
            data.extend(row);
        }
        Self::new(vec![height, width], data)
    }

    /// Build a (channel, row, column) tensor; every channel must share one extent.
    pub fn from_channels(channels: Vec<Vec<Vec<f64>>>) -> Result<Self> {
        let depth = channels.len();
        let mut extent = None;
        let mut data = Vec::new();
        for channel in channels {
            let map = Self::from_rows(channel)?;
            let dims = (map.shape[0], map.shape[1]);
            match extent {
                None => extent = Some(dims),
                Some(expected) if expected != dims => {
                    return Err(NetworkError::shape(
                        "Tensor::from_channels",
                        expected,
                        dims,
                    ));
                }
                Some(_) => {}
            }
            data.extend(map.data);
        }
        let (height, width) = extent.unwrap_or((0, 0));
        Self::new(vec![depth, height, width], data)
    }

    /// Stack equally sized 2-D maps into a rank-3 tensor.
    pub fn stack_channels(maps: &[Tensor]) -> Result<Self> {
        let first = match maps.first() {
            Some(map) => map,
            None => return Ok(Self::zeros(&[0, 0, 0])),
        };
        let (_, height, width) = first.dims3();
        let mut data = Vec::with_capacity(maps.len() * height * width);
        for map in maps {
            let (depth, h, w) = map.dims3();
            if depth != 1 || (h, w) != (height, width) {
                return Err(NetworkError::shape(
                    "Tensor::stack_channels",
                    (1, height, width),
                    (depth, h, w),
                ));
            }
            data.extend_from_slice(&map.data);
        }
        Self::new(vec![maps.len(), height, width], data)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    /// (channels, rows, cols) view of this tensor.
    ///
    /// A matrix is one channel; a vector of length n is n channels of 1×1.
    pub fn dims3(&self) -> (usize, usize, usize) {
        match self.shape.as_slice() {
            [n] => (*n, 1, 1),
            [h, w] => (1, *h, *w),
            [c, h, w] => (*c, *h, *w),
            _ => (0, 0, 0),
        }
    }

    pub fn channels(&self) -> usize {
        self.dims3().0
    }

    pub fn rows(&self) -> usize {
        self.dims3().1
    }

    pub fn cols(&self) -> usize {
        self.dims3().2
    }

    #[inline]
    fn offset3(&self, channel: usize, row: usize, col: usize) -> usize {
        let (_, height, width) = self.dims3();
        (channel * height + row) * width + col
    }

    /// Element at (row, col) of a 2-D view (channel 0).
    #[inline]
    pub fn at2(&self, row: usize, col: usize) -> f64 {
        self.data[self.offset3(0, row, col)]
    }

    #[inline]
    pub fn at3(&self, channel: usize, row: usize, col: usize) -> f64 {
        self.data[self.offset3(channel, row, col)]
    }

    #[inline]
    pub fn set3(&mut self, channel: usize, row: usize, col: usize, value: f64) {
        let idx = self.offset3(channel, row, col);
        self.data[idx] = value;
    }

    #[inline]
    pub fn add_at3(&mut self, channel: usize, row: usize, col: usize, value: f64) {
        let idx = self.offset3(channel, row, col);
        self.data[idx] += value;
    }

    /// Copy out one channel as a matrix.
    pub fn channel(&self, channel: usize) -> Result<Tensor> {
        let (depth, height, width) = self.dims3();
        if channel >= depth {
            return Err(NetworkError::shape("Tensor::channel", depth, channel));
        }
        let start = channel * height * width;
        Self::new(
            vec![height, width],
            self.data[start..start + height * width].to_vec(),
        )
    }

    /// Elementwise sum; both operands must have identical shapes.
    pub fn add_elementwise(&self, other: &Tensor) -> Result<Tensor> {
        self.zip_with("add_elementwise", other, |a, b| a + b)
    }

    pub fn sub_elementwise(&self, other: &Tensor) -> Result<Tensor> {
        self.zip_with("sub_elementwise", other, |a, b| a - b)
    }

    pub fn mul_elementwise(&self, other: &Tensor) -> Result<Tensor> {
        self.zip_with("mul_elementwise", other, |a, b| a * b)
    }

    fn zip_with<F>(&self, op: &'static str, other: &Tensor, f: F) -> Result<Tensor>
    where
        F: Fn(f64, f64) -> f64,
    {
        if self.shape != other.shape {
            return Err(NetworkError::shape(op, &self.shape, &other.shape));
        }
        Ok(Self {
            shape: self.shape.clone(),
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        })
    }

    pub fn map<F>(&self, f: F) -> Tensor
    where
        F: Fn(f64) -> f64,
    {
        Self {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    pub fn scale(&self, factor: f64) -> Tensor {
        self.map(|v| v * factor)
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Same elements, new shape. Element counts must agree.
    pub fn reshape(&self, shape: &[usize]) -> Result<Tensor> {
        Self::new(shape.to_vec(), self.data.clone())
    }

    /// Index of the largest element; the first one wins on ties.
    pub fn argmax(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, &v) in self.data.iter().enumerate() {
            if best.map_or(true, |(_, max)| v > max) {
                best = Some((i, v));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Overwrite every element with a uniform sample from `range`.
    ///
    /// The caller owns and seeds `rng`; this never reseeds it.
    pub fn rand_init(&mut self, rng: &mut SimpleRng, range: InitRange) {
        for value in &mut self.data {
            *value = rng.gen_range_f64(range.low, range.high);
        }
    }

    /// Rows of the 2-D view; for a stack, the rows of each channel in order.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        let width = self.cols();
        if width == 0 {
            return Vec::new();
        }
        self.data.chunks(width).map(<[f64]>::to_vec).collect()
    }
}

/// Output extent of a sliding window: floor((extent - window) / stride) + 1.
///
/// Fails when the window is larger than the extent or when window or stride
/// is zero.
pub fn window_output_dim(
    op: &'static str,
    extent: usize,
    window: usize,
    stride: usize,
) -> Result<usize> {
    if window == 0 || stride == 0 {
        return Err(NetworkError::expected(op, "window > 0 and stride > 0", (window, stride)));
    }
    if window > extent {
        return Err(NetworkError::expected(
            op,
            format!("window <= {}", extent),
            window,
        ));
    }
    Ok((extent - window) / stride + 1)
}
