//! Scalar activation functions and their derivatives
//!
//! Derivatives take the pre-activation input `z`, not the activated output,
//! because the network caches `z` for the backward pass.

/// Sigmoid activation: 1 / (1 + exp(-z))
pub fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Sigmoid derivative evaluated at the pre-activation `z`.
///
/// Returns f(z) * (1 - f(z)).
pub fn sigmoid_derivative(z: f64) -> f64 {
    let s = sigmoid(z);
    s * (1.0 - s)
}

/// ReLU activation: max(0, z)
pub fn relu(z: f64) -> f64 {
    if z > 0.0 {
        z
    } else {
        0.0
    }
}

/// ReLU derivative; defined as 0 at z = 0.
pub fn relu_derivative(z: f64) -> f64 {
    if z > 0.0 {
        1.0
    } else {
        0.0
    }
}
