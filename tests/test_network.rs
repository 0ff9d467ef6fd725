//! Tests for the network pipeline
//!
//! This file covers:
//! - A hand-computed single SGD step through a two-layer network
//! - Repeated single-example training for dense and conv pipelines
//! - Every optimizer reducing the loss on a fixed example
//! - Forward/backward ordering errors
//! - Configuration contracts checked at construction

use approx::assert_relative_eq;
use ndnet::architecture::{ConvConfig, DenseConfig, NetworkConfig};
use ndnet::layers::Layer;
use ndnet::loss::LossKind;
use ndnet::optimizers::OptimizerConfig;
use ndnet::tensor::Tensor;
use ndnet::utils::Activation;
use ndnet::{Error, Network};

fn dense(units: usize, activation: Activation) -> DenseConfig {
    DenseConfig { units, activation }
}

fn mlp(input: usize, layers: Vec<DenseConfig>, seed: u64) -> NetworkConfig {
    NetworkConfig {
        input_shape: vec![input, 1],
        conv_layers: vec![],
        dense_layers: layers,
        loss: LossKind::CrossEntropy,
        seed,
    }
}

fn sample_input() -> Tensor {
    Tensor::column(&[0.5, -0.2, 0.8, 0.1, 0.3, -0.6, 0.9, 0.0])
}

fn sample_target() -> Tensor {
    Tensor::column(&[0.0, 0.0, 1.0, 0.0])
}

fn small_mlp(seed: u64) -> NetworkConfig {
    mlp(
        8,
        vec![dense(16, Activation::Relu), dense(4, Activation::Softmax)],
        seed,
    )
}

// ============================================================================
// Golden Step Tests
// ============================================================================

mod golden_step_tests {
    use super::*;

    fn matrix(rows: usize, cols: usize, data: &[f32]) -> Tensor {
        Tensor::from_vec(&[rows, cols], data.to_vec()).unwrap()
    }

    #[test]
    fn test_single_sgd_step_matches_hand_computation() {
        let config = mlp(
            2,
            vec![dense(2, Activation::Relu), dense(2, Activation::Softmax)],
            1,
        );
        let mut network = Network::new(config, 0.1).unwrap();
        network.layers_mut()[0]
            .set_parameters(&matrix(2, 2, &[0.5, -0.5, 0.3, 0.8]), &Tensor::column(&[0.1, -0.1]))
            .unwrap();
        network.layers_mut()[1]
            .set_parameters(&matrix(2, 2, &[0.2, -0.1, 0.4, 0.3]), &Tensor::column(&[0.0, 0.0]))
            .unwrap();

        // hidden = relu([-0.4, 1.8]) = [0, 1.8]; logits = [-0.18, 0.54]
        let loss = network
            .train_step(&Tensor::column(&[1.0, 2.0]), &Tensor::column(&[1.0, 0.0]))
            .unwrap();
        assert_relative_eq!(loss, 0.558_297, epsilon = 1e-5);
        assert_relative_eq!(network.output().data()[0], 0.327_393, epsilon = 1e-5);

        let out = network.layers()[1].parameters().unwrap();
        let expected_w2 = [0.2, 0.021_069_27, 0.4, 0.178_930_75];
        for (got, want) in out.weights.data().iter().zip(expected_w2) {
            assert_relative_eq!(*got, want, epsilon = 1e-5);
        }
        assert_relative_eq!(out.bias.data()[0], 0.067_260_7, epsilon = 1e-5);
        assert_relative_eq!(out.bias.data()[1], -0.067_260_7, epsilon = 1e-5);

        let hidden = network.layers()[0].parameters().unwrap();
        // The dead first unit receives no gradient.
        let expected_w1 = [0.5, -0.5, 0.273_095_72, 0.746_191_44];
        for (got, want) in hidden.weights.data().iter().zip(expected_w1) {
            assert_relative_eq!(*got, want, epsilon = 1e-5);
        }
        assert_relative_eq!(hidden.bias.data()[0], 0.1, epsilon = 1e-6);
        assert_relative_eq!(hidden.bias.data()[1], -0.126_904_28, epsilon = 1e-5);
    }
}

// ============================================================================
// Convergence Tests
// ============================================================================

mod convergence_tests {
    use super::*;

    #[test]
    fn test_dense_network_fits_one_example() {
        let mut network = Network::new(small_mlp(42), 0.5).unwrap();
        let (input, target) = (sample_input(), sample_target());

        let mut reached = None;
        for step in 0..500 {
            let loss = network.train_step(&input, &target).unwrap();
            if loss < 1e-3 {
                reached = Some(step);
                break;
            }
        }
        assert!(reached.is_some(), "loss never dropped below 1e-3");
        assert_eq!(network.predict(&input).unwrap(), 2);
    }

    #[test]
    fn test_conv_network_fits_one_example() {
        let config = NetworkConfig {
            input_shape: vec![1, 6, 6],
            conv_layers: vec![ConvConfig {
                filters: 2,
                kernel_size: 3,
                activation: Activation::Relu,
            }],
            dense_layers: vec![dense(3, Activation::Softmax)],
            loss: LossKind::CrossEntropy,
            seed: 7,
        };
        let mut network = Network::new(config, 0.1).unwrap();
        let pixels: Vec<f32> = (0..36).map(|i| ((i * 7) % 11) as f32 / 10.0 - 0.5).collect();
        let input = Tensor::from_vec(&[1, 6, 6], pixels).unwrap();
        let target = Tensor::column(&[0.0, 1.0, 0.0]);

        let first = network.train_step(&input, &target).unwrap();
        let mut last = first;
        for _ in 1..500 {
            last = network.train_step(&input, &target).unwrap();
            if last < 1e-3 {
                break;
            }
        }
        assert!(last < 1e-3, "loss {} after 500 steps (start {})", last, first);
        assert_eq!(network.parameter_count(), 2 * 9 + 2 * 16 + 3 * 32 + 3);
    }

    #[test]
    fn test_every_optimizer_reduces_loss() {
        let kinds = [
            OptimizerConfig::Sgd,
            OptimizerConfig::Momentum { momentum: 0.9 },
            OptimizerConfig::RmsProp {
                rho: 0.9,
                epsilon: 1e-8,
            },
            OptimizerConfig::Adam {
                beta1: 0.9,
                beta2: 0.999,
                epsilon: 1e-8,
            },
        ];
        for kind in kinds {
            let mut network = Network::with_optimizer(small_mlp(42), kind.build(0.01)).unwrap();
            let (input, target) = (sample_input(), sample_target());
            let first = network.train_step(&input, &target).unwrap();
            let mut last = first;
            for _ in 1..300 {
                last = network.train_step(&input, &target).unwrap();
            }
            assert!(last < first / 3.0, "{:?}: {} -> {}", kind, first, last);
        }
    }

    #[test]
    fn test_mean_squared_regression() {
        let config = NetworkConfig {
            loss: LossKind::MeanSquared,
            ..mlp(
                3,
                vec![dense(4, Activation::None), dense(2, Activation::None)],
                5,
            )
        };
        let mut network = Network::new(config, 0.05).unwrap();
        let input = Tensor::column(&[1.0, -1.0, 0.5]);
        let target = Tensor::column(&[0.3, -0.7]);
        let first = network.train_step(&input, &target).unwrap();
        let mut last = first;
        for _ in 0..200 {
            last = network.train_step(&input, &target).unwrap();
        }
        assert!(last < first * 0.01, "{} -> {}", first, last);
    }
}

// ============================================================================
// Protocol Tests
// ============================================================================

mod protocol_tests {
    use super::*;

    #[test]
    fn test_backward_consumes_the_forward_pass() {
        let mut network = Network::new(small_mlp(3), 0.1).unwrap();
        let mut out = Tensor::zeros(&[4, 1]);
        network.forward(&sample_input(), &mut out).unwrap();
        network.backward(&sample_target()).unwrap();
        assert!(matches!(
            network.backward(&sample_target()),
            Err(Error::StaleForwardToken)
        ));
    }

    #[test]
    fn test_forward_copies_final_activation() {
        let mut network = Network::new(small_mlp(3), 0.1).unwrap();
        let mut out = Tensor::zeros(&[4, 1]);
        network.forward(&sample_input(), &mut out).unwrap();
        assert_eq!(&out, network.output());
        assert_relative_eq!(out.data().iter().sum::<f32>(), 1.0, epsilon = 1e-5);
        assert!(network.forward(&sample_input(), &mut Tensor::zeros(&[3, 1])).is_err());
    }

    #[test]
    fn test_target_shape_is_checked() {
        let mut network = Network::new(small_mlp(3), 0.1).unwrap();
        let err = network
            .train_step(&sample_input(), &Tensor::column(&[1.0, 0.0]))
            .unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_copy_parameters_is_deep() {
        let mut network = Network::new(small_mlp(3), 0.1).unwrap();
        network.train_step(&sample_input(), &sample_target()).unwrap();

        let mut snapshot = Network::new(small_mlp(99), 0.1).unwrap();
        snapshot.copy_parameters_from(&network).unwrap();
        let before = snapshot.layers()[0].parameters().unwrap().weights.clone();

        network.train_step(&sample_input(), &sample_target()).unwrap();
        assert_eq!(snapshot.layers()[0].parameters().unwrap().weights, before);
        assert_ne!(network.layers()[0].parameters().unwrap().weights, before);

        let mut other = Network::new(
            mlp(8, vec![dense(4, Activation::Softmax)], 1),
            0.1,
        )
        .unwrap();
        assert!(other.copy_parameters_from(&network).is_err());
    }
}

// ============================================================================
// Configuration Contract Tests
// ============================================================================

mod contract_tests {
    use super::*;

    #[test]
    fn test_cross_entropy_requires_softmax_output() {
        let config = mlp(4, vec![dense(3, Activation::Relu)], 1);
        assert!(matches!(Network::new(config, 0.1), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_softmax_only_at_the_end() {
        let config = mlp(
            4,
            vec![dense(3, Activation::Softmax), dense(2, Activation::Softmax)],
            1,
        );
        assert!(Network::new(config, 0.1).is_err());
    }

    #[test]
    fn test_softmax_with_mse_is_rejected() {
        let config = NetworkConfig {
            loss: LossKind::MeanSquared,
            ..mlp(4, vec![dense(3, Activation::Softmax)], 1)
        };
        assert!(Network::new(config, 0.1).is_err());
    }

    #[test]
    fn test_presets_build() {
        let cnn = Network::new(NetworkConfig::digits_cnn(), 0.003).unwrap();
        let names: Vec<_> = cnn.layers().iter().map(|l| l.name()).collect();
        assert_eq!(
            names,
            vec!["convolution", "convolution", "flatten", "dense", "dense"]
        );
        assert_eq!(cnn.input_shape(), &[1, 20, 20]);
        let mlp = Network::new(NetworkConfig::digits_mlp(), 0.003).unwrap();
        assert_eq!(mlp.layers().len(), 3);
    }
}
