// Gradient checking tests: analytic parameter gradients from Network::backward
// against central differences, across dense, convolutional and pooling stacks.

use rust_convnet::gradient_check::{check_gradients, numerical_gradient, GradientCheckConfig};
use rust_convnet::layers::{
    Activation, ConvolutionLayer, DenseLayer, FlattenLayer, Layer, LayerBackward, MaxPoolLayer,
};
use rust_convnet::network::Network;
use rust_convnet::tensor::Tensor;
use rust_convnet::utils::{InitRange, SimpleRng};
use rust_convnet::{GradientCheckError, NetworkError};

fn random_input(shape: &[usize], rng: &mut SimpleRng) -> Tensor {
    let mut input = Tensor::zeros(shape);
    input.rand_init(rng, InitRange::new(0.0, 1.0).unwrap());
    input
}

// ============================================================================
// Dense stacks
// ============================================================================

mod dense_tests {
    use super::*;

    #[test]
    fn test_flatten_dense_sigmoid_many_seeds() {
        for seed in 1..=8u64 {
            let mut rng = SimpleRng::new(seed);
            let num_in = 2 + rng.gen_usize(6);
            let num_out = 2 + rng.gen_usize(4);
            let layers: Vec<Box<dyn Layer>> = vec![
                Box::new(FlattenLayer::new()),
                Box::new(DenseLayer::new(num_in, num_out, &mut rng, InitRange::default())),
                Box::new(Activation::Sigmoid),
            ];
            let mut network = Network::new(layers, num_out).unwrap();
            let input = random_input(&[1, 1, num_in], &mut rng);
            let label = rng.gen_usize(num_out);

            let report = check_gradients(&mut network, &input, label, &GradientCheckConfig::default())
                .unwrap_or_else(|e| panic!("seed {}: {}", seed, e));
            assert_eq!(report.checked, num_in * num_out + num_out);
        }
    }

    #[test]
    fn test_two_hidden_layers() {
        let mut rng = SimpleRng::new(21);
        let range = InitRange::default();
        let layers: Vec<Box<dyn Layer>> = vec![
            Box::new(FlattenLayer::new()),
            Box::new(DenseLayer::new(9, 6, &mut rng, range)),
            Box::new(Activation::Sigmoid),
            Box::new(DenseLayer::new(6, 5, &mut rng, range)),
            Box::new(Activation::Sigmoid),
            Box::new(DenseLayer::new(5, 4, &mut rng, range)),
            Box::new(Activation::Sigmoid),
        ];
        let mut network = Network::new(layers, 4).unwrap();
        let input = random_input(&[1, 3, 3], &mut rng);

        let report = check_gradients(&mut network, &input, 3, &GradientCheckConfig::default()).unwrap();
        assert_eq!(report.checked, network.parameter_count());
        assert!(report.max_abs_error < 1e-4);
    }

    #[test]
    fn test_numerical_gradient_restores_parameters() {
        let mut rng = SimpleRng::new(4);
        let layers: Vec<Box<dyn Layer>> = vec![
            Box::new(FlattenLayer::new()),
            Box::new(DenseLayer::new(3, 2, &mut rng, InitRange::default())),
            Box::new(Activation::Sigmoid),
        ];
        let mut network = Network::new(layers, 2).unwrap();
        let input = random_input(&[1, 1, 3], &mut rng);
        let before: Vec<Tensor> = network.layers()[1].parameters().into_iter().cloned().collect();

        numerical_gradient(&mut network, &input, 0, 1, 0, 4, 1e-3).unwrap();

        let after: Vec<Tensor> = network.layers()[1].parameters().into_iter().cloned().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_numerical_gradient_bad_index() {
        let mut rng = SimpleRng::new(4);
        let layers: Vec<Box<dyn Layer>> = vec![
            Box::new(FlattenLayer::new()),
            Box::new(DenseLayer::new(3, 2, &mut rng, InitRange::default())),
        ];
        let mut network = Network::new(layers, 2).unwrap();
        let input = random_input(&[1, 1, 3], &mut rng);

        assert!(numerical_gradient(&mut network, &input, 0, 0, 0, 0, 1e-3).is_err());
        assert!(numerical_gradient(&mut network, &input, 0, 1, 2, 0, 1e-3).is_err());
        assert!(numerical_gradient(&mut network, &input, 0, 1, 0, 6, 1e-3).is_err());
    }
}

// ============================================================================
// Convolutional stacks
// ============================================================================

mod conv_tests {
    use super::*;

    #[test]
    fn test_conv_sigmoid_dense() {
        let mut rng = SimpleRng::new(8);
        let range = InitRange::default();
        let layers: Vec<Box<dyn Layer>> = vec![
            Box::new(ConvolutionLayer::new(2, &[3, 1], &[1, 2], &mut rng, range).unwrap()),
            Box::new(Activation::Sigmoid),
            Box::new(FlattenLayer::new()),
            Box::new(DenseLayer::new(18, 3, &mut rng, range)),
            Box::new(Activation::Sigmoid),
        ];
        let mut network = Network::new(layers, 3).unwrap();
        // 5x5: 3x3 at stride 1 and 1x1 at stride 2 both give 3x3.
        let input = random_input(&[2, 5, 5], &mut rng);

        let report = check_gradients(&mut network, &input, 1, &GradientCheckConfig::default()).unwrap();
        assert_eq!(report.checked, network.parameter_count());
    }

    #[test]
    fn test_stacked_convolutions() {
        // The first convolution's gradients depend on the second one's input gradient.
        let mut rng = SimpleRng::new(13);
        let range = InitRange::new(-0.5, 0.5).unwrap();
        let layers: Vec<Box<dyn Layer>> = vec![
            Box::new(ConvolutionLayer::new(2, &[3, 3], &[1, 1], &mut rng, range).unwrap()),
            Box::new(Activation::Sigmoid),
            Box::new(ConvolutionLayer::new(2, &[3, 1, 3], &[1, 2, 1], &mut rng, range).unwrap()),
            Box::new(Activation::Sigmoid),
            Box::new(FlattenLayer::new()),
            Box::new(DenseLayer::new(27, 4, &mut rng, range)),
            Box::new(Activation::Sigmoid),
        ];
        let mut network = Network::new(layers, 4).unwrap();
        let input = random_input(&[2, 7, 7], &mut rng);

        let report = check_gradients(&mut network, &input, 2, &GradientCheckConfig::default()).unwrap();
        assert_eq!(report.checked, network.parameter_count());
    }

    #[test]
    fn test_conv_relu_pool_dense() {
        // Ramp input and positive filters keep every pooling window's maximum
        // well separated and every ReLU input away from zero.
        let input = Tensor::new(
            vec![1, 5, 5],
            (0..25)
                .map(|i| 0.1 + 0.3 * f64::from(i / 5) + 0.1 * f64::from(i % 5))
                .collect(),
        )
        .unwrap();
        let rows = |data: [[f64; 2]; 2]| {
            Tensor::from_rows(data.iter().map(|r| r.to_vec()).collect()).unwrap()
        };
        let conv = ConvolutionLayer::from_filters(
            1,
            vec![rows([[0.2, 0.3], [0.4, 0.5]]), rows([[-0.3, -0.2], [-0.5, -0.4]])],
            vec![1, 1],
        )
        .unwrap();

        let mut rng = SimpleRng::new(99);
        let layers: Vec<Box<dyn Layer>> = vec![
            Box::new(conv),
            Box::new(Activation::Relu),
            Box::new(MaxPoolLayer::square(2)),
            Box::new(FlattenLayer::new()),
            Box::new(DenseLayer::new(8, 3, &mut rng, InitRange::default())),
            Box::new(Activation::Sigmoid),
        ];
        let mut network = Network::new(layers, 3).unwrap();

        for label in 0..3 {
            let report =
                check_gradients(&mut network, &input, label, &GradientCheckConfig::default()).unwrap();
            assert_eq!(report.checked, network.parameter_count());
        }
    }

    #[test]
    fn test_overlapping_pool_windows() {
        let mut rng = SimpleRng::new(31);
        let range = InitRange::default();
        let layers: Vec<Box<dyn Layer>> = vec![
            Box::new(ConvolutionLayer::new(1, &[2], &[1], &mut rng, range).unwrap()),
            Box::new(Activation::Sigmoid),
            Box::new(MaxPoolLayer::new(2, 2, 1)),
            Box::new(FlattenLayer::new()),
            Box::new(DenseLayer::new(4, 2, &mut rng, range)),
            Box::new(Activation::Sigmoid),
        ];
        let mut network = Network::new(layers, 2).unwrap();
        // Strictly increasing ramp: the window maximum is always its bottom-right cell.
        let input = Tensor::new(vec![1, 4, 4], (0..16).map(|i| f64::from(i) * 0.25).collect()).unwrap();
        network.layers_mut()[0].parameters_mut()[0].copy_from_slice(&[0.1, 0.2, 0.3, 0.4]);

        let report = check_gradients(&mut network, &input, 0, &GradientCheckConfig::default()).unwrap();
        assert_eq!(report.checked, network.parameter_count());
    }
}

// ============================================================================
// Failure detection
// ============================================================================

mod mismatch_tests {
    use super::*;

    /// Dense layer whose reported weight gradient is twice the true one.
    #[derive(Debug)]
    struct DoubledWeightGradient(DenseLayer);

    impl Layer for DoubledWeightGradient {
        fn name(&self) -> &'static str {
            "doubled"
        }

        fn forward(&self, input: &Tensor) -> Result<Tensor, NetworkError> {
            self.0.forward(input)
        }

        fn backward(&self, input: &Tensor, grad_output: &Tensor) -> Result<LayerBackward, NetworkError> {
            let mut step = self.0.backward(input, grad_output)?;
            step.param_grads[0] = step.param_grads[0].scale(2.0);
            Ok(step)
        }

        fn parameters(&self) -> Vec<&Tensor> {
            self.0.parameters()
        }

        fn parameters_mut(&mut self) -> Vec<&mut [f64]> {
            self.0.parameters_mut()
        }
    }

    #[test]
    fn test_wrong_gradient_detected() {
        let dense = DenseLayer::from_parts(Tensor::zeros(&[2, 2]), Tensor::zeros(&[2])).unwrap();
        let layers: Vec<Box<dyn Layer>> = vec![
            Box::new(FlattenLayer::new()),
            Box::new(DoubledWeightGradient(dense)),
            Box::new(Activation::Sigmoid),
        ];
        let mut network = Network::new(layers, 2).unwrap();
        let input = Tensor::new(vec![1, 1, 2], vec![1.0, 2.0]).unwrap();

        match check_gradients(&mut network, &input, 0, &GradientCheckConfig::default()) {
            Err(GradientCheckError::Mismatch {
                layer_index,
                parameter,
                index,
                analytic,
                numerical,
            }) => {
                assert_eq!((layer_index, parameter, index), (1, 0, 0));
                // sigmoid(0) = 0.5, so dL/dz0 = (0.5 - 1) * 0.25 and dW00 = -0.125.
                assert!((analytic + 0.25).abs() < 1e-9);
                assert!((numerical + 0.125).abs() < 1e-4);
            }
            other => panic!("expected mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_label_is_network_error() {
        let mut rng = SimpleRng::new(2);
        let layers: Vec<Box<dyn Layer>> = vec![
            Box::new(FlattenLayer::new()),
            Box::new(DenseLayer::new(2, 2, &mut rng, InitRange::default())),
        ];
        let mut network = Network::new(layers, 2).unwrap();
        let input = Tensor::new(vec![1, 1, 2], vec![0.5, 0.5]).unwrap();

        let err = check_gradients(&mut network, &input, 5, &GradientCheckConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            GradientCheckError::Network(NetworkError::InvalidLabel { label: 5, num_classes: 2 })
        ));
    }
}
