//! Error types for the network evaluator
//!
//! Production failures (`NetworkError`, `ConfigError`) are kept apart from the
//! test-only `GradientCheckError` so callers can tell a broken input from a
//! broken derivative.

use thiserror::Error;

/// Failures raised by tensor operators, layers and the network.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetworkError {
    #[error("shape mismatch in {op}: expected {expected}, got {actual}")]
    ShapeMismatch {
        op: &'static str,
        expected: String,
        actual: String,
    },

    #[error("label {label} is outside the valid class range [0, {num_classes})")]
    InvalidLabel { label: usize, num_classes: usize },

    #[error("backward requires a preceding forward pass")]
    MissingForwardPass,

    #[error("network has no layers")]
    EmptyNetwork,
}

impl NetworkError {
    pub fn shape(
        op: &'static str,
        expected: impl std::fmt::Debug,
        actual: impl std::fmt::Debug,
    ) -> Self {
        NetworkError::ShapeMismatch {
            op,
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        }
    }

    /// Like `shape`, but `expected` is a plain-text description such as
    /// "stride > 0" and is shown without quotes.
    pub fn expected(
        op: &'static str,
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Debug,
    ) -> Self {
        NetworkError::ShapeMismatch {
            op,
            expected: expected.to_string(),
            actual: format!("{:?}", actual),
        }
    }
}

/// Failures while loading or validating JSON configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error(transparent)]
    Network(#[from] NetworkError),
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ConfigError::Invalid(message.into())
    }
}

/// Raised by the numerical gradient checker.
#[derive(Error, Debug)]
pub enum GradientCheckError {
    #[error(
        "gradient mismatch at layer {layer_index} parameter {parameter} entry {index}: \
         analytic {analytic:.6}, numerical {numerical:.6}"
    )]
    Mismatch {
        layer_index: usize,
        parameter: usize,
        index: usize,
        analytic: f64,
        numerical: f64,
    },

    #[error(transparent)]
    Network(#[from] NetworkError),
}

pub type Result<T, E = NetworkError> = std::result::Result<T, E>;
