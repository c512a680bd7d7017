// convnet_eval.rs
// Builds a small convolutional network, runs predict/loss/backward on one
// seeded synthetic example, and validates every parameter gradient against
// central differences.
//
// Usage:
//   convnet_eval [run_config.json] [architecture.json]
//
// Without arguments the built-in 1x8x8 conv -> relu -> maxpool -> flatten ->
// dense -> sigmoid stack and default run settings are used. Set RUST_LOG=debug
// to trace every layer.
//
// Exit status is 0 on success and 1 on any error, including a failed
// gradient check.

use rust_convnet::architecture::{build_network, load_architecture, ArchitectureConfig, LayerConfig};
use rust_convnet::config::{load_config, RunConfig};
use rust_convnet::gradient_check::check_gradients;
use rust_convnet::tensor::Tensor;
use rust_convnet::utils::SimpleRng;
use std::env;
use std::error::Error;
use std::process;
use tracing_subscriber::EnvFilter;

// Built-in topology: 1x8x8 -> conv(2 x 3x3) -> ReLU -> 2x2 maxpool -> FC(3).
const IMG_C: usize = 1;
const IMG_H: usize = 8;
const IMG_W: usize = 8;
const NUM_CLASSES: usize = 3;
const FILTERS: usize = 2;
const KERNEL: usize = 3;
const POOL: usize = 2;
const FC_IN: usize = FILTERS * ((IMG_H - KERNEL + 1) / POOL) * ((IMG_W - KERNEL + 1) / POOL); // 18

fn default_architecture() -> ArchitectureConfig {
    let layer = |layer_type: &str| LayerConfig {
        layer_type: layer_type.to_string(),
        ..LayerConfig::default()
    };
    ArchitectureConfig {
        input_shape: [IMG_C, IMG_H, IMG_W],
        num_classes: NUM_CLASSES,
        layers: vec![
            LayerConfig {
                in_channels: Some(IMG_C),
                filter_sizes: Some(vec![KERNEL; FILTERS]),
                strides: Some(vec![1; FILTERS]),
                ..layer("conv")
            },
            layer("relu"),
            LayerConfig {
                pool_size: Some(POOL),
                ..layer("maxpool")
            },
            layer("flatten"),
            LayerConfig {
                input_size: Some(FC_IN),
                output_size: Some(NUM_CLASSES),
                ..layer("dense")
            },
            layer("sigmoid"),
        ],
    }
}

// Synthetic input in [0, input_scale) and a random label, both from the run RNG.
fn synthetic_example(
    arch: &ArchitectureConfig,
    config: &RunConfig,
    rng: &mut SimpleRng,
) -> Result<(Tensor, usize), Box<dyn Error>> {
    let [c, h, w] = arch.input_shape;
    let data = (0..c * h * w)
        .map(|_| rng.gen_range_f64(0.0, config.input_scale))
        .collect();
    let input = Tensor::new(vec![c, h, w], data)?;
    let label = rng.gen_usize(arch.num_classes);
    Ok((input, label))
}

fn run(args: &[String]) -> Result<(), Box<dyn Error>> {
    let config = match args.get(1) {
        Some(path) => load_config(path)?,
        None => RunConfig::default(),
    };
    let arch = match args.get(2) {
        Some(path) => load_architecture(path)?,
        None => default_architecture(),
    };

    // Seeded once; every initialization and sample draws from this stream.
    let mut rng = SimpleRng::new(config.seed);
    let mut network = build_network(&arch, &mut rng, config.init_range()?)?;
    let (input, label) = synthetic_example(&arch, &config, &mut rng)?;

    println!(
        "Network: {} layers, {} parameters, {} classes",
        network.layers().len(),
        network.parameter_count(),
        network.num_classes()
    );

    let prediction = network.predict(&input)?;
    let loss = network.loss(&input, label)?;
    println!("Label: {}, Predicted: {}, Loss: {:.6}", label, prediction, loss);

    let gradients = network.backward(label)?;
    for record in &gradients {
        let weight_norm: f64 = record
            .weights()
            .iter()
            .flat_map(|t| t.as_slice())
            .map(|g| g * g)
            .sum::<f64>()
            .sqrt();
        let bias_norm = record.biases().as_slice().iter().map(|g| g * g).sum::<f64>().sqrt();
        println!(
            "Layer {} ({}): |dW| = {:.6}, |dB| = {:.6}",
            record.layer_index, record.layer_name, weight_norm, bias_norm
        );
    }

    let report = check_gradients(&mut network, &input, label, &config.gradient_check())?;
    println!(
        "Gradient check passed: {} entries, max abs error {:.3e}",
        report.checked, report.max_abs_error
    );
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    if let Err(err) = run(&args) {
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_convnet::architecture::validate_architecture;

    #[test]
    fn test_default_architecture_is_valid() {
        assert_eq!(FC_IN, 18);
        assert!(validate_architecture(&default_architecture()).is_ok());
    }

    #[test]
    fn test_synthetic_example_shape_and_range() {
        let arch = default_architecture();
        let config = RunConfig {
            input_scale: 255.0,
            ..RunConfig::default()
        };
        let mut rng = SimpleRng::new(1);
        let (input, label) = synthetic_example(&arch, &config, &mut rng).unwrap();

        assert_eq!(input.shape(), &[IMG_C, IMG_H, IMG_W]);
        assert!(input.as_slice().iter().all(|&v| (0.0..255.0).contains(&v)));
        assert!(label < NUM_CLASSES);
    }

    #[test]
    fn test_missing_config_file_fails() {
        let args = vec![
            "convnet_eval".to_string(),
            "does/not/exist.json".to_string(),
        ];
        assert!(run(&args).is_err());
    }
}
