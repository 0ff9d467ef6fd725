//! Network container: a fixed pipeline of layers trained one sample at a time.
//!
//! The pipeline is `convolution* → flatten → dense+` (the flatten only when
//! convolutions are present), built once from a [`NetworkConfig`]. The
//! network owns one activation and one gradient tensor per layer boundary,
//! sized at construction, plus a copy of the latest input; nothing is
//! allocated per sample apart from convolution scratch.
//!
//! # Example
//!
//! ```
//! use ndnet::architecture::{DenseConfig, NetworkConfig};
//! use ndnet::loss::LossKind;
//! use ndnet::network::Network;
//! use ndnet::tensor::Tensor;
//! use ndnet::utils::Activation;
//!
//! let config = NetworkConfig {
//!     input_shape: vec![3, 1],
//!     conv_layers: vec![],
//!     dense_layers: vec![
//!         DenseConfig { units: 4, activation: Activation::Relu },
//!         DenseConfig { units: 2, activation: Activation::Softmax },
//!     ],
//!     loss: LossKind::CrossEntropy,
//!     seed: 3,
//! };
//! let mut network = Network::new(config, 0.1).unwrap();
//! let loss = network
//!     .train_step(&Tensor::column(&[1.0, 0.0, -1.0]), &Tensor::column(&[1.0, 0.0]))
//!     .unwrap();
//! assert!(loss > 0.0);
//! ```

use crate::architecture::NetworkConfig;
use crate::error::{Error, Result};
use crate::layers::{Conv2DLayer, DenseLayer, FlattenLayer, ForwardToken, Layer, NetworkLayer};
use crate::loss::LossKind;
use crate::optimizers::{Optimizer, Sgd};
use crate::tensor::{self, Tensor};
use crate::utils::SimpleRng;
use log::debug;

/// Feed-forward network over single samples.
#[derive(Debug)]
pub struct Network {
    config: NetworkConfig,
    layers: Vec<NetworkLayer>,
    input: Tensor,
    /// `activations[i]` is the output of layer `i`.
    activations: Vec<Tensor>,
    /// `gradients[i]` is the loss gradient with respect to `activations[i]`.
    gradients: Vec<Tensor>,
    tokens: Vec<Option<ForwardToken>>,
    loss: f32,
    optimizer: Box<dyn Optimizer>,
}

fn child_seed(rng: &mut SimpleRng) -> u64 {
    (u64::from(rng.next_u32()) << 32) | u64::from(rng.next_u32())
}

impl Network {
    /// Build the pipeline described by `config`, trained with plain SGD.
    pub fn new(config: NetworkConfig, learning_rate: f32) -> Result<Self> {
        Self::with_optimizer(config, Box::new(Sgd::new(learning_rate)))
    }

    /// Build the pipeline described by `config` with an explicit optimizer.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] when the configuration fails validation,
    /// including the softmax / cross-entropy pairing.
    pub fn with_optimizer(config: NetworkConfig, optimizer: Box<dyn Optimizer>) -> Result<Self> {
        config.validate()?;
        let mut rng = SimpleRng::new(config.seed);

        let mut layers: Vec<NetworkLayer> = Vec::new();
        for conv in &config.conv_layers {
            let rng = SimpleRng::new(child_seed(&mut rng));
            layers.push(Conv2DLayer::new(conv.filters, conv.kernel_size, conv.activation, rng).into());
        }
        if !config.conv_layers.is_empty() {
            layers.push(FlattenLayer::new().into());
        }
        for dense in &config.dense_layers {
            let rng = SimpleRng::new(child_seed(&mut rng));
            layers.push(DenseLayer::new(dense.units, dense.activation, rng).into());
        }

        let mut shape = config.input_shape.clone();
        let mut activations = Vec::with_capacity(layers.len());
        for layer in &layers {
            shape = layer.output_shape(&shape)?;
            activations.push(Tensor::zeros(&shape));
        }
        let gradients = activations.clone();
        debug!(
            "network: {} layers, boundary shapes {:?}",
            layers.len(),
            activations.iter().map(|a| a.shape().to_vec()).collect::<Vec<_>>()
        );

        Ok(Self {
            input: Tensor::zeros(&config.input_shape),
            tokens: layers.iter().map(|_| None).collect(),
            config,
            layers,
            activations,
            gradients,
            loss: 0.0,
            optimizer,
        })
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn loss_kind(&self) -> LossKind {
        self.config.loss
    }

    pub fn input_shape(&self) -> &[usize] {
        &self.config.input_shape
    }

    pub fn layers(&self) -> &[NetworkLayer] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [NetworkLayer] {
        &mut self.layers
    }

    /// Loss computed by the last backward pass.
    pub fn loss(&self) -> f32 {
        self.loss
    }

    /// Final activation of the last forward pass.
    pub fn output(&self) -> &Tensor {
        &self.activations[self.activations.len() - 1]
    }

    pub fn learning_rate(&self) -> f32 {
        self.optimizer.learning_rate()
    }

    pub fn set_learning_rate(&mut self, lr: f32) {
        self.optimizer.set_learning_rate(lr);
    }

    pub fn optimizer_mut(&mut self) -> &mut dyn Optimizer {
        self.optimizer.as_mut()
    }

    /// Trainable values across all initialized layers.
    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(Layer::parameter_count).sum()
    }

    fn run_forward(&mut self, input: &Tensor) -> Result<()> {
        self.tokens.iter_mut().for_each(|t| *t = None);
        self.input.copy_from(input)?;
        for i in 0..self.layers.len() {
            let (done, rest) = self.activations.split_at_mut(i);
            let layer_input = if i == 0 { &self.input } else { &done[i - 1] };
            let token = self.layers[i].forward(layer_input, &mut rest[0])?;
            self.tokens[i] = Some(token);
        }
        Ok(())
    }

    /// Run every layer on `input` and copy the final activation into `output`.
    pub fn forward(&mut self, input: &Tensor, output: &mut Tensor) -> Result<()> {
        self.run_forward(input)?;
        output.copy_from(self.output())
    }

    /// Backpropagate the loss of the last forward pass against `target`.
    ///
    /// Returns the loss. Every layer's parameter gradients are overwritten;
    /// the first layer is not asked for an input gradient.
    ///
    /// # Errors
    ///
    /// [`Error::StaleForwardToken`] when no forward pass precedes this call
    /// (or its tokens were already consumed by an earlier backward).
    pub fn backward(&mut self, target: &Tensor) -> Result<f32> {
        if self.tokens.iter().any(Option::is_none) {
            return Err(Error::StaleForwardToken);
        }
        let last = self.layers.len() - 1;
        let loss = self.config.loss.value(&self.activations[last], target)?;
        self.config
            .loss
            .gradient(&self.activations[last], target, &mut self.gradients[last])?;

        for i in (0..self.layers.len()).rev() {
            let token = self.tokens[i].take().ok_or(Error::StaleForwardToken)?;
            let (before, after) = self.gradients.split_at_mut(i);
            self.layers[i].backward(token, &after[0], before.last_mut())?;
        }

        self.loss = loss;
        Ok(loss)
    }

    /// Apply the optimizer to every `(weights, weights_grad)` and `(bias, bias_grad)` pair.
    pub fn update(&mut self) -> Result<()> {
        for (i, layer) in self.layers.iter_mut().enumerate() {
            if !layer.is_initialized() {
                return Err(Error::uninitialized(format!("{} ({})", i, layer.name())));
            }
            if let Some(params) = layer.parameters_mut() {
                for (j, (values, grads)) in params.pairs_mut().into_iter().enumerate() {
                    self.optimizer.update(2 * i + j, values.data_mut(), grads.data())?;
                }
            }
        }
        Ok(())
    }

    /// Forward, backward and update on one sample; returns the loss.
    pub fn train_step(&mut self, input: &Tensor, target: &Tensor) -> Result<f32> {
        self.run_forward(input)?;
        let loss = self.backward(target)?;
        self.update()?;
        Ok(loss)
    }

    /// Index of the largest output for `input`.
    pub fn predict(&mut self, input: &Tensor) -> Result<usize> {
        self.run_forward(input)?;
        Ok(tensor::argmax(self.output()))
    }

    /// Deep-copy every parameter tensor of `other` into this network.
    ///
    /// Both networks must share the same layer structure. Layers of `other`
    /// that are not initialized yet are skipped.
    pub fn copy_parameters_from(&mut self, other: &Network) -> Result<()> {
        if self.layers.len() != other.layers.len() {
            return Err(Error::config(format!(
                "cannot copy parameters between networks of {} and {} layers",
                other.layers.len(),
                self.layers.len()
            )));
        }
        for (mine, theirs) in self.layers.iter_mut().zip(&other.layers) {
            if mine.name() != theirs.name() {
                return Err(Error::config(format!(
                    "layer kind mismatch: {} vs {}",
                    theirs.name(),
                    mine.name()
                )));
            }
            if let Some(params) = theirs.parameters() {
                mine.set_parameters(&params.weights, &params.bias)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::architecture::{ConvConfig, DenseConfig};
    use crate::utils::Activation;

    fn tiny_cnn() -> NetworkConfig {
        NetworkConfig {
            input_shape: vec![1, 5, 5],
            conv_layers: vec![ConvConfig {
                filters: 2,
                kernel_size: 3,
                activation: Activation::Relu,
            }],
            dense_layers: vec![DenseConfig {
                units: 3,
                activation: Activation::Softmax,
            }],
            loss: LossKind::CrossEntropy,
            seed: 11,
        }
    }

    #[test]
    fn test_pipeline_layout() {
        let network = Network::new(tiny_cnn(), 0.01).unwrap();
        let names: Vec<_> = network.layers().iter().map(|l| l.name()).collect();
        assert_eq!(names, vec!["convolution", "flatten", "dense"]);
        assert_eq!(network.activations[0].shape(), &[2, 3, 3]);
        assert_eq!(network.activations[1].shape(), &[18, 1]);
        assert_eq!(network.output().shape(), &[3, 1]);
        assert_eq!(network.parameter_count(), 0);
    }

    #[test]
    fn test_backward_without_forward() {
        let mut network = Network::new(tiny_cnn(), 0.01).unwrap();
        let target = Tensor::column(&[1.0, 0.0, 0.0]);
        assert!(matches!(network.backward(&target), Err(Error::StaleForwardToken)));
    }

    #[test]
    fn test_update_before_initialization() {
        let mut network = Network::new(tiny_cnn(), 0.01).unwrap();
        assert!(matches!(
            network.update(),
            Err(Error::Uninitialized { ref layer }) if layer == "0 (convolution)"
        ));
    }

    #[test]
    fn test_forward_rejects_wrong_input_shape() {
        let mut network = Network::new(tiny_cnn(), 0.01).unwrap();
        let mut out = Tensor::zeros(&[3, 1]);
        assert!(network.forward(&Tensor::zeros(&[1, 4, 4]), &mut out).is_err());
    }

    #[test]
    fn test_learning_rate_lives_in_optimizer() {
        let mut network = Network::new(tiny_cnn(), 0.01).unwrap();
        network.set_learning_rate(0.5);
        assert_eq!(network.learning_rate(), 0.5);
        assert_eq!(network.optimizer_mut().learning_rate(), 0.5);
    }
}
