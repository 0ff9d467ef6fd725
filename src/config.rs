//! Configuration structures for training
//!
//! This module provides the training configuration read by the trainer and
//! the `train_digits` binary: epoch count, learning rate schedule, shuffling
//! and optimizer choice.

use crate::error::{Error, Result};
use crate::optimizers::OptimizerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

fn default_epochs() -> usize {
    100
}

fn default_learning_rate() -> f32 {
    0.003
}

fn default_lr_decay() -> f32 {
    0.99
}

fn default_min_learning_rate() -> f32 {
    0.0003
}

fn default_decay_after_accuracy() -> f32 {
    0.2
}

fn default_shuffle() -> bool {
    true
}

/// Configuration for training.
///
/// Every field is optional in the JSON file; missing fields take the
/// defaults below.
///
/// - **epochs**: 100
/// - **learning_rate**: 0.003
/// - **lr_decay**: 0.99, multiplied in after every epoch that qualifies
/// - **min_learning_rate**: 0.0003, floor of the decayed rate
/// - **decay_after_accuracy**: 0.2, decay only starts once training accuracy exceeds it
/// - **shuffle**: true, reshuffle the training set every epoch
/// - **seed**: none, seed the shuffling from the clock
/// - **optimizer**: plain SGD
///
/// # Example
///
/// ```json
/// {
///   "epochs": 20,
///   "learning_rate": 0.003,
///   "lr_decay": 0.99,
///   "min_learning_rate": 0.0003,
///   "decay_after_accuracy": 0.2,
///   "shuffle": true,
///   "seed": 42,
///   "optimizer": { "kind": "momentum", "momentum": 0.9 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    #[serde(default = "default_epochs")]
    pub epochs: usize,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,

    /// Multiplicative decay applied per qualifying epoch
    #[serde(default = "default_lr_decay")]
    pub lr_decay: f32,

    #[serde(default = "default_min_learning_rate")]
    pub min_learning_rate: f32,

    /// Training accuracy (fraction) above which the learning rate starts decaying
    #[serde(default = "default_decay_after_accuracy")]
    pub decay_after_accuracy: f32,

    #[serde(default = "default_shuffle")]
    pub shuffle: bool,

    /// Shuffle seed; `None` seeds from the clock
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default)]
    pub optimizer: OptimizerConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: default_epochs(),
            learning_rate: default_learning_rate(),
            lr_decay: default_lr_decay(),
            min_learning_rate: default_min_learning_rate(),
            decay_after_accuracy: default_decay_after_accuracy(),
            shuffle: default_shuffle(),
            seed: None,
            optimizer: OptimizerConfig::default(),
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(Error::config("epochs must be positive"));
        }
        if !(self.learning_rate > 0.0) {
            return Err(Error::config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.lr_decay > 0.0 && self.lr_decay <= 1.0) {
            return Err(Error::config(format!(
                "lr_decay must be in (0, 1], got {}",
                self.lr_decay
            )));
        }
        if self.min_learning_rate < 0.0 {
            return Err(Error::config("min_learning_rate must be non-negative"));
        }
        if self.min_learning_rate > self.learning_rate {
            return Err(Error::config(format!(
                "min_learning_rate {} exceeds learning_rate {}",
                self.min_learning_rate, self.learning_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.decay_after_accuracy) {
            return Err(Error::config("decay_after_accuracy must be in [0, 1]"));
        }
        self.optimizer.validate()
    }
}

/// Loads a training configuration from a JSON file.
///
/// Reads the file at `path` and deserializes its JSON contents into a `TrainingConfig`.
///
/// # Returns
///
/// `Ok(TrainingConfig)` on success, or an error if the file cannot be read,
/// the JSON is invalid or a value is out of range.
///
/// # Examples
///
/// ```no_run
/// use ndnet::config::load_config;
///
/// let cfg = load_config("config/train_digits.json").unwrap();
/// assert!(cfg.epochs > 0);
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<TrainingConfig> {
    let contents = fs::read_to_string(path)?;
    let config: TrainingConfig = serde_json::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let cfg: TrainingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, TrainingConfig::default());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_rejects_nan_learning_rate() {
        let cfg = TrainingConfig {
            learning_rate: f32::NAN,
            ..TrainingConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_floor_above_rate() {
        let cfg = TrainingConfig {
            learning_rate: 0.001,
            min_learning_rate: 0.01,
            ..TrainingConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));
    }
}
