//! Architecture configuration structures
//!
//! This module provides configuration structures for defining a layer stack
//! via JSON, validating how shapes flow through it, and building a `Network`
//! from it.

use crate::error::ConfigError;
use crate::layers::{
    Activation, ConvolutionLayer, DenseLayer, FlattenLayer, Layer, MaxPoolLayer,
};
use crate::network::Network;
use crate::tensor::window_output_dim;
use crate::utils::rng::{InitRange, SimpleRng};
use serde::Deserialize;
use std::fs;

/// Configuration for a single layer.
///
/// Different layer types require different fields:
///
/// - **conv**: `in_channels`, `filter_sizes`, `strides` (one stride per filter)
/// - **maxpool**: either `pool_size` (height = width = stride) or
///   `pool_height`, `pool_width` and `pool_stride`
/// - **sigmoid**, **relu**, **flatten**: no fields
/// - **dense**: `input_size`, `output_size`
///
/// # Examples
///
/// ```json
/// {
///   "layer_type": "conv",
///   "in_channels": 1,
///   "filter_sizes": [3, 3],
///   "strides": [1, 1]
/// }
/// ```
///
/// ```json
/// {
///   "layer_type": "dense",
///   "input_size": 18,
///   "output_size": 3
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayerConfig {
    /// Type of layer: "conv", "maxpool", "sigmoid", "relu", "flatten" or "dense"
    pub layer_type: String,

    // Convolution parameters
    /// Number of input channels for a conv layer
    pub in_channels: Option<usize>,
    /// Side length of each square filter
    pub filter_sizes: Option<Vec<usize>>,
    /// Stride of each filter
    pub strides: Option<Vec<usize>>,

    // Pooling parameters
    /// Square window with stride equal to its size
    pub pool_size: Option<usize>,
    /// Window height
    pub pool_height: Option<usize>,
    /// Window width
    pub pool_width: Option<usize>,
    /// Window stride
    pub pool_stride: Option<usize>,

    // Dense parameters
    /// Input size for a dense layer
    pub input_size: Option<usize>,
    /// Output size for a dense layer
    pub output_size: Option<usize>,
}

/// Configuration for the whole network.
///
/// # Example
///
/// ```json
/// {
///   "input_shape": [1, 8, 8],
///   "num_classes": 3,
///   "layers": [
///     { "layer_type": "conv", "in_channels": 1, "filter_sizes": [3, 3], "strides": [1, 1] },
///     { "layer_type": "relu" },
///     { "layer_type": "maxpool", "pool_size": 2 },
///     { "layer_type": "flatten" },
///     { "layer_type": "dense", "input_size": 18, "output_size": 3 },
///     { "layer_type": "sigmoid" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ArchitectureConfig {
    /// Input volume as (channels, height, width)
    pub input_shape: [usize; 3],
    /// Length of the final class-score vector
    pub num_classes: usize,
    /// Layers in evaluation order
    pub layers: Vec<LayerConfig>,
}

/// Loads an architecture configuration from a JSON file and validates it.
///
/// # Examples
///
/// ```no_run
/// use rust_convnet::architecture::load_architecture;
///
/// let arch = load_architecture("config/architectures/conv_relu_pool.json").unwrap();
/// assert!(!arch.layers.is_empty());
/// ```
pub fn load_architecture(path: &str) -> Result<ArchitectureConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: ArchitectureConfig = serde_json::from_str(&contents)?;
    validate_architecture(&config)?;
    Ok(config)
}

type Shape3 = (usize, usize, usize);

fn required<T: Clone>(value: &Option<T>, index: usize, kind: &str, field: &str) -> Result<T, ConfigError> {
    value.clone().ok_or_else(|| {
        ConfigError::invalid(format!("Layer {}: {} layer requires '{}'", index, kind, field))
    })
}

/// Window (height, width, stride) of a maxpool layer config.
fn pool_window(layer: &LayerConfig, index: usize) -> Result<(usize, usize, usize), ConfigError> {
    match layer.pool_size {
        Some(size) => Ok((size, size, size)),
        None => Ok((
            required(&layer.pool_height, index, "MaxPool", "pool_height")?,
            required(&layer.pool_width, index, "MaxPool", "pool_width")?,
            required(&layer.pool_stride, index, "MaxPool", "pool_stride")?,
        )),
    }
}

/// Shape a layer produces from `input`, checking the layer's own fields and
/// its fit with the incoming shape.
fn layer_output_shape(layer: &LayerConfig, index: usize, input: Shape3) -> Result<Shape3, ConfigError> {
    let (channels, height, width) = input;
    let window = |extent: usize, size: usize, stride: usize| {
        window_output_dim("architecture", extent, size, stride)
            .map_err(|e| ConfigError::invalid(format!("Layer {}: {}", index, e)))
    };

    match layer.layer_type.to_lowercase().as_str() {
        "conv" => {
            let in_channels = required(&layer.in_channels, index, "Conv", "in_channels")?;
            let sizes = required(&layer.filter_sizes, index, "Conv", "filter_sizes")?;
            let strides = required(&layer.strides, index, "Conv", "strides")?;
            if in_channels != channels {
                return Err(ConfigError::invalid(format!(
                    "Layer {}: in_channels ({}) does not match incoming channels ({})",
                    index, in_channels, channels
                )));
            }
            if sizes.is_empty() {
                return Err(ConfigError::invalid(format!(
                    "Layer {}: Conv layer needs at least one filter",
                    index
                )));
            }
            if sizes.len() != strides.len() {
                return Err(ConfigError::invalid(format!(
                    "Layer {}: {} filter_sizes but {} strides",
                    index,
                    sizes.len(),
                    strides.len()
                )));
            }

            let mut dims = None;
            for (&size, &stride) in sizes.iter().zip(&strides) {
                let filter_dims = (window(height, size, stride)?, window(width, size, stride)?);
                if dims.map_or(false, |d| d != filter_dims) {
                    return Err(ConfigError::invalid(format!(
                        "Layer {}: filters produce feature maps of different sizes",
                        index
                    )));
                }
                dims = Some(filter_dims);
            }
            let (out_h, out_w) = dims.unwrap_or((0, 0));
            Ok((sizes.len(), out_h, out_w))
        }
        "maxpool" => {
            let (pool_h, pool_w, stride) = pool_window(layer, index)?;
            Ok((channels, window(height, pool_h, stride)?, window(width, pool_w, stride)?))
        }
        "sigmoid" | "relu" => Ok(input),
        "flatten" => Ok((channels * height * width, 1, 1)),
        "dense" => {
            let input_size = required(&layer.input_size, index, "Dense", "input_size")?;
            let output_size = required(&layer.output_size, index, "Dense", "output_size")?;
            if output_size == 0 {
                return Err(ConfigError::invalid(format!(
                    "Layer {}: output_size must be greater than 0",
                    index
                )));
            }
            if (height, width) != (1, 1) || channels != input_size {
                return Err(ConfigError::invalid(format!(
                    "Layer connection mismatch: Layer {} expects a flattened column of {} but receives {:?}",
                    index, input_size, input
                )));
            }
            Ok((output_size, 1, 1))
        }
        _ => Err(ConfigError::invalid(format!(
            "Layer {}: Invalid layer type '{}'. Must be one of: conv, maxpool, sigmoid, relu, flatten, dense",
            index, layer.layer_type
        ))),
    }
}

/// Validates an architecture configuration.
///
/// Checks that:
/// - Architecture has at least one layer and a positive class count
/// - Each layer has the required fields for its type
/// - Shapes flow from `input_shape` through every layer
/// - The final output holds exactly `num_classes` scores
pub fn validate_architecture(config: &ArchitectureConfig) -> Result<(), ConfigError> {
    if config.layers.is_empty() {
        return Err(ConfigError::invalid("Architecture must have at least one layer"));
    }
    if config.num_classes == 0 {
        return Err(ConfigError::invalid("num_classes must be greater than 0"));
    }
    let [c, h, w] = config.input_shape;
    if c == 0 || h == 0 || w == 0 {
        return Err(ConfigError::invalid("input_shape dimensions must be greater than 0"));
    }

    let mut shape = (c, h, w);
    for (i, layer) in config.layers.iter().enumerate() {
        shape = layer_output_shape(layer, i, shape)?;
    }

    let (oc, oh, ow) = shape;
    if oc * oh * ow != config.num_classes {
        return Err(ConfigError::invalid(format!(
            "Final output {:?} does not hold {} class scores",
            shape, config.num_classes
        )));
    }
    Ok(())
}

/// Builds a network from a validated architecture.
///
/// Parameterized layers draw their initial values from `rng` over `range`, in
/// layer order, so a fixed seed yields identical networks.
///
/// # Examples
///
/// ```no_run
/// use rust_convnet::architecture::{build_network, load_architecture};
/// use rust_convnet::utils::{InitRange, SimpleRng};
///
/// let config = load_architecture("config/architectures/conv_relu_pool.json").unwrap();
/// let mut rng = SimpleRng::new(42);
/// let network = build_network(&config, &mut rng, InitRange::default()).unwrap();
/// assert_eq!(network.layers().len(), config.layers.len());
/// ```
pub fn build_network(
    config: &ArchitectureConfig,
    rng: &mut SimpleRng,
    range: InitRange,
) -> Result<Network, ConfigError> {
    validate_architecture(config)?;

    let mut layers: Vec<Box<dyn Layer>> = Vec::with_capacity(config.layers.len());
    for (i, layer_config) in config.layers.iter().enumerate() {
        let layer: Box<dyn Layer> = match layer_config.layer_type.to_lowercase().as_str() {
            "conv" => {
                let in_channels = required(&layer_config.in_channels, i, "Conv", "in_channels")?;
                let sizes = required(&layer_config.filter_sizes, i, "Conv", "filter_sizes")?;
                let strides = required(&layer_config.strides, i, "Conv", "strides")?;
                Box::new(ConvolutionLayer::new(in_channels, &sizes, &strides, rng, range)?)
            }
            "maxpool" => {
                let (height, width, stride) = pool_window(layer_config, i)?;
                Box::new(MaxPoolLayer::new(height, width, stride))
            }
            "sigmoid" => Box::new(Activation::Sigmoid),
            "relu" => Box::new(Activation::Relu),
            "flatten" => Box::new(FlattenLayer::new()),
            "dense" => {
                let input_size = required(&layer_config.input_size, i, "Dense", "input_size")?;
                let output_size = required(&layer_config.output_size, i, "Dense", "output_size")?;
                Box::new(DenseLayer::new(input_size, output_size, rng, range))
            }
            _ => {
                return Err(ConfigError::invalid(format!(
                    "Layer {}: Invalid layer type '{}'",
                    i, layer_config.layer_type
                )));
            }
        };
        layers.push(layer);
    }

    Ok(Network::new(layers, config.num_classes)?)
}
