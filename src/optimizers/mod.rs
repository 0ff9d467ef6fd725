//! Optimizer abstractions for neural network parameter updates
//!
//! This module provides the Optimizer trait and implementations for different
//! optimization algorithms used to update neural network parameters during training.
//!
//! # Overview
//!
//! Optimizers define how to use gradients to update model parameters. The basic
//! gradient descent update is `weight = weight - learning_rate * gradient`;
//! momentum, RMSProp and Adam keep accumulators per parameter tensor. Each
//! parameter tensor is identified by a *slot* (the network uses `2 * layer`
//! for weights and `2 * layer + 1` for the bias), so one optimizer instance
//! serves a whole network without mixing state between tensors.
//!
//! # Available Optimizers
//!
//! - SGD: Vanilla stochastic gradient descent
//! - Momentum: SGD with a velocity term
//! - RMSProp: Gradient scaled by a running mean of squared gradients
//! - Adam: Adaptive moment estimation with bias correction
//!
//! # Example
//!
//! ```
//! use ndnet::optimizers::{Optimizer, OptimizerConfig};
//!
//! let mut optimizer = OptimizerConfig::Sgd.build(0.5);
//! let mut weights = vec![1.0, 2.0];
//! optimizer.update(0, &mut weights, &[1.0, -1.0]).unwrap();
//! assert_eq!(weights, vec![0.5, 2.5]);
//! ```

pub mod adam;
pub mod momentum;
pub mod rmsprop;
pub mod sgd;

pub use adam::Adam;
pub use momentum::Momentum;
pub use rmsprop::RmsProp;
pub use sgd::{sgd, Sgd};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Core trait for neural network optimizers.
///
/// # State Management
///
/// Stateful optimizers allocate their accumulators lazily, the first time a
/// slot is updated, sized to that slot's parameter count. `reset` drops all
/// of them.
pub trait Optimizer: Debug {
    /// Update parameters using gradients.
    ///
    /// # Arguments
    ///
    /// * `slot` - Identifies the parameter tensor across calls
    /// * `parameters` - Mutable slice of parameters to update (weights or biases)
    /// * `gradients` - Gradient of loss with respect to each parameter
    ///
    /// # Errors
    ///
    /// [`Error::ElementCount`] if `parameters` and `gradients` have different lengths.
    fn update(&mut self, slot: usize, parameters: &mut [f32], gradients: &[f32]) -> Result<()>;

    /// Reset optimizer state.
    ///
    /// Clears any accumulated momentum or adaptive statistics. For stateless
    /// optimizers like vanilla SGD, this is a no-op.
    fn reset(&mut self);

    /// Get the learning rate for this optimizer.
    fn learning_rate(&self) -> f32;

    /// Set the learning rate for this optimizer.
    ///
    /// Useful for implementing learning rate schedules or decay strategies.
    fn set_learning_rate(&mut self, lr: f32);
}

pub(crate) fn check_lengths(parameters: &[f32], gradients: &[f32]) -> Result<()> {
    if parameters.len() != gradients.len() {
        return Err(Error::ElementCount {
            shape: vec![parameters.len()],
            expected: parameters.len(),
            got: gradients.len(),
        });
    }
    Ok(())
}

/// Per-slot optimizer state, allocated on first use.
#[derive(Debug, Clone)]
pub(crate) struct SlotBuffers<S> {
    slots: Vec<Option<S>>,
}

impl<S> Default for SlotBuffers<S> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<S> SlotBuffers<S> {
    /// State of `slot`, created with `init` when missing or when `fits` rejects it.
    pub(crate) fn get(&mut self, slot: usize, fits: impl Fn(&S) -> bool, init: impl FnOnce() -> S) -> &mut S {
        if self.slots.len() <= slot {
            self.slots.resize_with(slot + 1, || None);
        }
        let entry = &mut self.slots[slot];
        if entry.as_ref().is_some_and(|state| !fits(state)) {
            *entry = None;
        }
        entry.get_or_insert_with(init)
    }

    pub(crate) fn peek(&self, slot: usize) -> Option<&S> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Number of slots holding state.
    #[cfg(test)]
    pub(crate) fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
    }
}

fn default_momentum() -> f32 {
    0.9
}

fn default_rho() -> f32 {
    0.9
}

fn default_beta1() -> f32 {
    0.9
}

fn default_beta2() -> f32 {
    0.999
}

fn default_epsilon() -> f32 {
    1e-8
}

/// Optimizer selection as it appears in a training configuration file.
///
/// ```json
/// { "kind": "adam", "beta1": 0.9, "beta2": 0.999, "epsilon": 1e-8 }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptimizerConfig {
    #[default]
    Sgd,
    Momentum {
        #[serde(default = "default_momentum")]
        momentum: f32,
    },
    #[serde(rename = "rmsprop")]
    RmsProp {
        #[serde(default = "default_rho")]
        rho: f32,
        #[serde(default = "default_epsilon")]
        epsilon: f32,
    },
    Adam {
        #[serde(default = "default_beta1")]
        beta1: f32,
        #[serde(default = "default_beta2")]
        beta2: f32,
        #[serde(default = "default_epsilon")]
        epsilon: f32,
    },
}

impl OptimizerConfig {
    /// Instantiate the configured optimizer.
    pub fn build(&self, learning_rate: f32) -> Box<dyn Optimizer> {
        match *self {
            OptimizerConfig::Sgd => Box::new(Sgd::new(learning_rate)),
            OptimizerConfig::Momentum { momentum } => Box::new(Momentum::new(learning_rate, momentum)),
            OptimizerConfig::RmsProp { rho, epsilon } => Box::new(RmsProp::new(learning_rate, rho, epsilon)),
            OptimizerConfig::Adam { beta1, beta2, epsilon } => {
                Box::new(Adam::new(learning_rate, beta1, beta2, epsilon))
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let unit = |name: &str, v: f32| {
            if (0.0..1.0).contains(&v) {
                Ok(())
            } else {
                Err(Error::config(format!("{} must be in [0, 1), got {}", name, v)))
            }
        };
        let positive = |name: &str, v: f32| {
            if v > 0.0 {
                Ok(())
            } else {
                Err(Error::config(format!("{} must be positive, got {}", name, v)))
            }
        };
        match *self {
            OptimizerConfig::Sgd => Ok(()),
            OptimizerConfig::Momentum { momentum } => unit("momentum", momentum),
            OptimizerConfig::RmsProp { rho, epsilon } => {
                unit("rho", rho)?;
                positive("epsilon", epsilon)
            }
            OptimizerConfig::Adam { beta1, beta2, epsilon } => {
                unit("beta1", beta1)?;
                unit("beta2", beta2)?;
                positive("epsilon", epsilon)
            }
        }
    }
}
