//! Rust ConvNet Evaluator
//!
//! A minimal feed-forward/convolutional network evaluator: an ordered stack of
//! layers runs a forward pass to a class-score vector and a scalar loss, then a
//! backward pass computes every parameter gradient by explicit chain-rule
//! differentiation. Analytic gradients can be validated against central
//! differences.
//!
//! # Modules
//!
//! - `tensor`: rank 1-3 tensors with shape-checked operations
//! - `layers`: Layer trait and implementations (Convolution, MaxPool, Activation, Flatten, Dense)
//! - `network`: forward/loss/predict/backward orchestration and the activation cache
//! - `gradient_check`: finite-difference gradient validation
//! - `utils`: seeded RNG and scalar activation functions
//! - `config`: run configuration
//! - `architecture`: JSON layer-stack configuration and network building
//! - `error`: error kinds
//!
//! # Example
//!
//! ```
//! use rust_convnet::layers::{Activation, DenseLayer, FlattenLayer, Layer};
//! use rust_convnet::network::Network;
//! use rust_convnet::tensor::Tensor;
//! use rust_convnet::utils::{InitRange, SimpleRng};
//!
//! let mut rng = SimpleRng::new(42);
//! let layers: Vec<Box<dyn Layer>> = vec![
//!     Box::new(FlattenLayer::new()),
//!     Box::new(DenseLayer::new(4, 3, &mut rng, InitRange::default())),
//!     Box::new(Activation::Sigmoid),
//! ];
//! let mut network = Network::new(layers, 3).unwrap();
//!
//! let image = Tensor::from_channels(vec![vec![vec![0.1, 0.2], vec![0.3, 0.4]]]).unwrap();
//! let class = network.predict(&image).unwrap();
//! assert!(class < 3);
//!
//! let loss = network.loss(&image, 1).unwrap();
//! assert!(loss >= 0.0);
//! let grads = network.backward(1).unwrap();
//! assert_eq!(grads.len(), 1);
//! assert_eq!(grads[0].weights()[0].shape(), &[3, 4]);
//! ```

pub mod architecture;
pub mod config;
pub mod error;
pub mod gradient_check;
pub mod layers;
pub mod network;
pub mod tensor;
pub mod utils;

pub use error::{ConfigError, GradientCheckError, NetworkError};
pub use network::{Network, ParamGradients, Phase};
pub use tensor::Tensor;
