//! Architecture configuration structures
//!
//! This module describes a network's fixed pipeline in a form that can be
//! read from JSON: optional convolution layers, an implicit flatten when
//! convolutions are present, then dense layers. This enables architecture
//! experimentation without code changes.

use crate::error::{Error, Result};
use crate::loss::LossKind;
use crate::utils::Activation;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One convolution stage.
///
/// ```json
/// { "filters": 32, "kernel_size": 3, "activation": "relu" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvConfig {
    /// Number of filters (output channels)
    pub filters: usize,
    /// Side of the square kernel
    pub kernel_size: usize,
    #[serde(default)]
    pub activation: Activation,
}

/// One dense stage.
///
/// ```json
/// { "units": 128, "activation": "relu" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseConfig {
    /// Number of output features
    pub units: usize,
    #[serde(default)]
    pub activation: Activation,
}

fn default_seed() -> u64 {
    1
}

/// Configuration for the entire neural network architecture.
///
/// `input_shape` is `[features, 1]` for a dense-only network and
/// `[channels, height, width]` when `conv_layers` is not empty.
///
/// # Example
///
/// ```json
/// {
///   "input_shape": [1, 20, 20],
///   "conv_layers": [
///     { "filters": 32, "kernel_size": 3, "activation": "relu" }
///   ],
///   "dense_layers": [
///     { "units": 128, "activation": "relu" },
///     { "units": 10, "activation": "softmax" }
///   ],
///   "loss": "cross_entropy",
///   "seed": 7
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub input_shape: Vec<usize>,
    #[serde(default)]
    pub conv_layers: Vec<ConvConfig>,
    pub dense_layers: Vec<DenseConfig>,
    #[serde(default)]
    pub loss: LossKind,
    /// Seed of the generator used for lazy parameter initialization
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl NetworkConfig {
    /// 400 → 256 relu → 128 relu → 10 softmax, for 20×20 digit images.
    pub fn digits_mlp() -> Self {
        Self {
            input_shape: vec![400, 1],
            conv_layers: Vec::new(),
            dense_layers: vec![
                DenseConfig {
                    units: 256,
                    activation: Activation::Relu,
                },
                DenseConfig {
                    units: 128,
                    activation: Activation::Relu,
                },
                DenseConfig {
                    units: 10,
                    activation: Activation::Softmax,
                },
            ],
            loss: LossKind::CrossEntropy,
            seed: default_seed(),
        }
    }

    /// 1×20×20 → conv 32@3×3 relu → conv 64@3×3 relu → flatten → 128 relu → 10 softmax.
    pub fn digits_cnn() -> Self {
        Self {
            input_shape: vec![1, 20, 20],
            conv_layers: vec![
                ConvConfig {
                    filters: 32,
                    kernel_size: 3,
                    activation: Activation::Relu,
                },
                ConvConfig {
                    filters: 64,
                    kernel_size: 3,
                    activation: Activation::Relu,
                },
            ],
            dense_layers: vec![
                DenseConfig {
                    units: 128,
                    activation: Activation::Relu,
                },
                DenseConfig {
                    units: 10,
                    activation: Activation::Softmax,
                },
            ],
            loss: LossKind::CrossEntropy,
            seed: default_seed(),
        }
    }

    /// Number of values the final layer produces.
    pub fn output_size(&self) -> usize {
        self.dense_layers.last().map_or(0, |d| d.units)
    }

    /// Checks that:
    /// - There is at least one dense layer and every size is positive
    /// - `input_shape` has the rank the pipeline expects
    /// - Every kernel fits the feature map it slides over
    /// - Softmax appears only as the final activation, and exactly when the loss is cross-entropy
    pub fn validate(&self) -> Result<()> {
        if self.dense_layers.is_empty() {
            return Err(Error::config("architecture must have at least one dense layer"));
        }
        if self.input_shape.contains(&0) {
            return Err(Error::config(format!(
                "input_shape {:?} has a zero dimension",
                self.input_shape
            )));
        }

        if self.conv_layers.is_empty() {
            if self.input_shape.len() != 2 || self.input_shape[1] != 1 {
                return Err(Error::config(format!(
                    "dense-only networks take a column input [features, 1], got {:?}",
                    self.input_shape
                )));
            }
        } else {
            let [_, mut height, mut width] = self.input_shape[..] else {
                return Err(Error::config(format!(
                    "convolutional networks take [channels, height, width], got {:?}",
                    self.input_shape
                )));
            };
            for (i, conv) in self.conv_layers.iter().enumerate() {
                if conv.filters == 0 || conv.kernel_size == 0 {
                    return Err(Error::config(format!(
                        "conv layer {}: filters and kernel_size must be positive",
                        i
                    )));
                }
                if conv.kernel_size > height || conv.kernel_size > width {
                    return Err(Error::config(format!(
                        "conv layer {}: kernel {} does not fit a {}x{} feature map",
                        i, conv.kernel_size, height, width
                    )));
                }
                height -= conv.kernel_size - 1;
                width -= conv.kernel_size - 1;
            }
        }

        if let Some(i) = self.dense_layers.iter().position(|d| d.units == 0) {
            return Err(Error::config(format!("dense layer {}: units must be positive", i)));
        }

        self.validate_softmax_contract()
    }

    fn validate_softmax_contract(&self) -> Result<()> {
        let last = self.dense_layers.len() - 1;
        if self.conv_layers.iter().any(|c| c.activation == Activation::Softmax)
            || self.dense_layers[..last]
                .iter()
                .any(|d| d.activation == Activation::Softmax)
        {
            return Err(Error::config("softmax is only supported as the final activation"));
        }
        let terminal_softmax = self.dense_layers[last].activation == Activation::Softmax;
        match (self.loss, terminal_softmax) {
            (LossKind::CrossEntropy, false) => Err(Error::config(
                "cross_entropy loss requires a softmax final activation",
            )),
            (LossKind::MeanSquared, true) => Err(Error::config(
                "a softmax final activation must be trained with cross_entropy loss",
            )),
            _ => Ok(()),
        }
    }
}

/// Loads an architecture configuration from a JSON file.
///
/// Reads the file at `path`, deserializes it into a `NetworkConfig` and
/// validates it.
///
/// # Examples
///
/// ```no_run
/// use ndnet::architecture::load_architecture;
///
/// let arch = load_architecture("config/digits_cnn.json").unwrap();
/// assert!(!arch.dense_layers.is_empty());
/// ```
pub fn load_architecture(path: impl AsRef<Path>) -> Result<NetworkConfig> {
    let contents = fs::read_to_string(path)?;
    let config: NetworkConfig = serde_json::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}
