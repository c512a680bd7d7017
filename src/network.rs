//! Network orchestration: forward evaluation, loss, prediction and
//! reverse-mode gradient computation over an ordered layer stack.
//!
//! A `Network` moves through four phases:
//!
//! ```text
//! Constructed -> ForwardComplete -> LossEvaluated (optional) -> BackwardComplete
//! ```
//!
//! `forward` (and therefore `predict` and `loss`) clears the previous
//! activation cache and fills a new one. `backward` consumes that cache, so
//! every backward call must be paired with its own preceding forward call.
//! All mutating entry points take `&mut self`; sharing one network between
//! threads requires external synchronization.

use crate::error::{NetworkError, Result};
use crate::layers::Layer;
use crate::tensor::Tensor;
use tracing::{debug, instrument};

/// Where the network is in its forward/backward cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Constructed,
    ForwardComplete,
    LossEvaluated,
    BackwardComplete,
}

/// Per-forward-pass record of the network input and every layer's output.
#[derive(Debug, Clone, Default)]
struct ActivationCache {
    input: Option<Tensor>,
    outputs: Vec<Tensor>,
}

/// Parameter gradients of one parameterized layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamGradients {
    /// Position of the layer in the network.
    pub layer_index: usize,
    pub layer_name: &'static str,
    weights: Vec<Tensor>,
    biases: Tensor,
}

impl ParamGradients {
    /// Weight gradients: one matrix for a dense layer, one per filter for a
    /// convolution layer.
    pub fn weights(&self) -> &[Tensor] {
        &self.weights
    }

    pub fn biases(&self) -> &Tensor {
        &self.biases
    }

    /// Gradient of the layer's `index`-th parameter tensor, matching the
    /// order of `Layer::parameters`.
    pub fn parameter(&self, index: usize) -> Option<&Tensor> {
        match index.cmp(&self.weights.len()) {
            std::cmp::Ordering::Less => Some(&self.weights[index]),
            std::cmp::Ordering::Equal => Some(&self.biases),
            std::cmp::Ordering::Greater => None,
        }
    }
}

/// Ordered layer stack plus the activation cache of its latest forward pass.
#[derive(Debug)]
pub struct Network {
    layers: Vec<Box<dyn Layer>>,
    num_classes: usize,
    cache: ActivationCache,
    phase: Phase,
}

impl Network {
    /// # Errors
    ///
    /// `EmptyNetwork` if `layers` is empty; `ShapeMismatch` if `num_classes`
    /// is zero.
    pub fn new(layers: Vec<Box<dyn Layer>>, num_classes: usize) -> Result<Self> {
        if layers.is_empty() {
            return Err(NetworkError::EmptyNetwork);
        }
        if num_classes == 0 {
            return Err(NetworkError::expected("Network::new", "num_classes > 0", 0));
        }
        Ok(Self {
            layers,
            num_classes,
            cache: ActivationCache::default(),
            phase: Phase::Constructed,
        })
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn layers(&self) -> &[Box<dyn Layer>] {
        &self.layers
    }

    /// Mutable access to the layers, e.g. for an external optimizer or a
    /// gradient checker. Invalidates the activation cache.
    pub fn layers_mut(&mut self) -> &mut [Box<dyn Layer>] {
        self.clear_cache();
        &mut self.layers
    }

    /// Layer outputs recorded by the most recent forward pass, one per layer.
    pub fn cached_activations(&self) -> &[Tensor] {
        &self.cache.outputs
    }

    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(|l| l.parameter_count()).sum()
    }

    fn clear_cache(&mut self) {
        self.cache = ActivationCache::default();
        self.phase = Phase::Constructed;
    }

    /// Run every layer in order, caching each output.
    #[instrument(level = "trace", skip_all, fields(layers = self.layers.len()))]
    pub fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        self.clear_cache();

        let mut outputs = Vec::with_capacity(self.layers.len());
        let mut current = input.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            let output = layer.forward(&current)?;
            debug!(layer = i, kind = layer.name(), shape = ?output.shape(), "forward");
            outputs.push(output.clone());
            current = output;
        }

        self.cache = ActivationCache {
            input: Some(input.clone()),
            outputs,
        };
        self.phase = Phase::ForwardComplete;
        Ok(current)
    }

    /// Class index with the largest score; the lowest index wins ties.
    pub fn predict(&mut self, input: &Tensor) -> Result<usize> {
        let output = self.forward(input)?;
        self.check_output(&output)?;
        output
            .argmax()
            .ok_or_else(|| NetworkError::shape("Network::predict", self.num_classes, 0))
    }

    /// Half sum-of-squared-error between the output and the one-hot `label`.
    pub fn loss(&mut self, input: &Tensor, label: usize) -> Result<f64> {
        let target = one_hot(label, self.num_classes)?;
        let output = self.forward(input)?;
        self.check_output(&output)?;

        let loss = 0.5
            * output
                .as_slice()
                .iter()
                .zip(target.as_slice())
                .map(|(o, t)| (o - t) * (o - t))
                .sum::<f64>();
        debug!(label, loss, "loss");
        self.phase = Phase::LossEvaluated;
        Ok(loss)
    }

    /// Reverse-mode walk over the cached activations.
    ///
    /// Starts from dL/da = output - one_hot(label) and hands each layer the
    /// gradient of its output together with its cached input. Returns one
    /// record per parameterized layer, in network order.
    ///
    /// # Errors
    ///
    /// `InvalidLabel` for an out-of-range label, `MissingForwardPass` if no
    /// forward pass precedes this call, and `ShapeMismatch` if the output or
    /// a layer gradient has the wrong shape. On any error the cache and phase
    /// are left as they were; they are only consumed on success.
    #[instrument(level = "trace", skip(self))]
    pub fn backward(&mut self, label: usize) -> Result<Vec<ParamGradients>> {
        let target = one_hot(label, self.num_classes)?;
        if !matches!(self.phase, Phase::ForwardComplete | Phase::LossEvaluated) {
            return Err(NetworkError::MissingForwardPass);
        }
        let cache = &self.cache;
        let input = cache.input.as_ref().ok_or(NetworkError::MissingForwardPass)?;
        let output = cache.outputs.last().ok_or(NetworkError::MissingForwardPass)?;
        self.check_output(output)?;

        let mut grad = output.sub_elementwise(&target.reshape(output.shape())?)?;
        let mut records = Vec::new();
        for (i, layer) in self.layers.iter().enumerate().rev() {
            let layer_input = if i == 0 { input } else { &cache.outputs[i - 1] };
            let step = layer.backward(layer_input, &grad)?;
            debug!(layer = i, kind = layer.name(), params = step.param_grads.len(), "backward");

            let mut grads = step.param_grads;
            if let Some(biases) = grads.pop() {
                records.push(ParamGradients {
                    layer_index: i,
                    layer_name: layer.name(),
                    weights: grads,
                    biases,
                });
            }
            grad = step.grad_input;
        }
        records.reverse();

        self.cache = ActivationCache::default();
        self.phase = Phase::BackwardComplete;
        Ok(records)
    }

    fn check_output(&self, output: &Tensor) -> Result<()> {
        if output.len() != self.num_classes {
            return Err(NetworkError::expected(
                "Network output",
                format!("{} class scores", self.num_classes),
                output.shape(),
            ));
        }
        Ok(())
    }
}

/// One-hot target vector of length `num_classes`.
pub fn one_hot(label: usize, num_classes: usize) -> Result<Tensor> {
    if label >= num_classes {
        return Err(NetworkError::InvalidLabel { label, num_classes });
    }
    let mut target = vec![0.0; num_classes];
    target[label] = 1.0;
    Ok(Tensor::vector(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{Activation, DenseLayer, FlattenLayer};

    fn tiny_network() -> Network {
        let weights = Tensor::from_rows(vec![vec![1.0, -1.0], vec![0.5, 0.5]]).unwrap();
        let dense = DenseLayer::from_parts(weights, Tensor::vector(vec![0.0, 0.1])).unwrap();
        Network::new(
            vec![
                Box::new(FlattenLayer),
                Box::new(dense),
                Box::new(Activation::Sigmoid),
            ],
            2,
        )
        .unwrap()
    }

    #[test]
    fn test_empty_network_rejected() {
        assert_eq!(Network::new(vec![], 3).unwrap_err(), NetworkError::EmptyNetwork);
    }

    #[test]
    fn test_phase_transitions() {
        let mut net = tiny_network();
        let x = Tensor::from_channels(vec![vec![vec![1.0, 2.0]]]).unwrap();
        assert_eq!(net.phase(), Phase::Constructed);
        net.forward(&x).unwrap();
        assert_eq!(net.phase(), Phase::ForwardComplete);
        assert_eq!(net.cached_activations().len(), 3);
        net.loss(&x, 1).unwrap();
        assert_eq!(net.phase(), Phase::LossEvaluated);
        net.backward(1).unwrap();
        assert_eq!(net.phase(), Phase::BackwardComplete);
        assert!(net.cached_activations().is_empty());
    }

    #[test]
    fn test_backward_consumes_cache() {
        let mut net = tiny_network();
        let x = Tensor::from_channels(vec![vec![vec![1.0, 2.0]]]).unwrap();
        assert_eq!(net.backward(0).unwrap_err(), NetworkError::MissingForwardPass);
        net.forward(&x).unwrap();
        net.backward(0).unwrap();
        assert_eq!(net.backward(0).unwrap_err(), NetworkError::MissingForwardPass);
    }

    #[test]
    fn test_invalid_label_keeps_cache() {
        let mut net = tiny_network();
        let x = Tensor::from_channels(vec![vec![vec![1.0, 2.0]]]).unwrap();
        net.forward(&x).unwrap();
        assert!(matches!(
            net.backward(2),
            Err(NetworkError::InvalidLabel { label: 2, num_classes: 2 })
        ));
        assert!(net.backward(1).is_ok());
    }

    #[test]
    fn test_one_hot() {
        assert_eq!(one_hot(1, 3).unwrap().as_slice(), &[0.0, 1.0, 0.0]);
        assert!(one_hot(3, 3).is_err());
    }
}
