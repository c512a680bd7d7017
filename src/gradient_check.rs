//! Numerical gradient checking using central differences.
//!
//! Each parameter entry is nudged by ±ε and the slope
//! (loss(θ+ε) − loss(θ−ε)) / 2ε is compared with the analytic gradient from
//! `Network::backward`. Parameters are restored after every nudge.

use crate::error::{GradientCheckError, NetworkError};
use crate::network::Network;
use crate::tensor::Tensor;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientCheckConfig {
    /// Perturbation applied on each side of the parameter.
    pub epsilon: f64,
    /// Largest accepted absolute difference between analytic and numerical.
    pub tolerance: f64,
}

impl Default for GradientCheckConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-3,
            tolerance: 1e-2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradientCheckReport {
    /// Number of parameter entries compared.
    pub checked: usize,
    pub max_abs_error: f64,
}

/// Central-difference estimate of dL/dθ for one parameter entry.
///
/// `parameter` indexes `Layer::parameters` of layer `layer_index` and `index`
/// the element inside that tensor.
pub fn numerical_gradient(
    network: &mut Network,
    input: &Tensor,
    label: usize,
    layer_index: usize,
    parameter: usize,
    index: usize,
    epsilon: f64,
) -> Result<f64, NetworkError> {
    nudge(network, layer_index, parameter, index, epsilon)?;
    let loss_plus = network.loss(input, label);
    nudge(network, layer_index, parameter, index, -2.0 * epsilon)?;
    let loss_minus = network.loss(input, label);
    nudge(network, layer_index, parameter, index, epsilon)?;

    Ok((loss_plus? - loss_minus?) / (2.0 * epsilon))
}

fn nudge(
    network: &mut Network,
    layer_index: usize,
    parameter: usize,
    index: usize,
    delta: f64,
) -> Result<(), NetworkError> {
    let layer = network
        .layers_mut()
        .get_mut(layer_index)
        .ok_or_else(|| NetworkError::expected("gradient check", "layer index", layer_index))?;
    let mut params = layer.parameters_mut();
    let value = params
        .get_mut(parameter)
        .and_then(|values| values.get_mut(index))
        .ok_or_else(|| NetworkError::expected("gradient check", "parameter entry", (parameter, index)))?;
    *value += delta;
    Ok(())
}

/// Compare every analytic parameter gradient against its central-difference
/// estimate.
///
/// # Errors
///
/// `GradientCheckError::Mismatch` on the first entry whose absolute error
/// exceeds `config.tolerance`; `GradientCheckError::Network` if evaluation
/// itself fails.
pub fn check_gradients(
    network: &mut Network,
    input: &Tensor,
    label: usize,
    config: &GradientCheckConfig,
) -> Result<GradientCheckReport, GradientCheckError> {
    network.forward(input)?;
    let analytic = network.backward(label)?;

    let mut report = GradientCheckReport {
        checked: 0,
        max_abs_error: 0.0,
    };
    for record in &analytic {
        let parameter_count = record.weights().len() + 1;
        for parameter in 0..parameter_count {
            let grads = record
                .parameter(parameter)
                .ok_or_else(|| NetworkError::shape("gradient check", parameter_count, parameter))?;
            for (index, &analytic_value) in grads.as_slice().iter().enumerate() {
                let numerical = numerical_gradient(
                    network,
                    input,
                    label,
                    record.layer_index,
                    parameter,
                    index,
                    config.epsilon,
                )?;
                let error = (analytic_value - numerical).abs();
                if error > config.tolerance {
                    return Err(GradientCheckError::Mismatch {
                        layer_index: record.layer_index,
                        parameter,
                        index,
                        analytic: analytic_value,
                        numerical,
                    });
                }
                report.checked += 1;
                report.max_abs_error = report.max_abs_error.max(error);
            }
        }
        debug!(layer = record.layer_index, kind = record.layer_name, "gradients agree");
    }

    info!(checked = report.checked, max_abs_error = report.max_abs_error, "gradient check passed");
    Ok(report)
}
