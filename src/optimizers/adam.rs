//! Adam (Adaptive Moment Estimation) optimizer implementation
//!
//! This module provides the Adam optimizer, which combines momentum and
//! adaptive learning rates with bias correction for improved convergence.

use crate::error::Result;
use crate::optimizers::{check_lengths, Optimizer, SlotBuffers};

/// Moment estimates and step counter of one parameter tensor.
#[derive(Debug, Clone)]
struct Moments {
    m: Vec<f32>,
    v: Vec<f32>,
    t: i32,
}

impl Moments {
    fn zeros(n: usize) -> Self {
        Self {
            m: vec![0.0; n],
            v: vec![0.0; n],
            t: 0,
        }
    }
}

/// Adam (Adaptive Moment Estimation) optimizer.
///
/// Adam keeps two moving averages for each parameter:
///
/// 1. First moment (mean) of gradients (momentum)
/// 2. Second moment (uncentered variance) of gradients (adaptive learning rate)
///
/// The update rule is:
///
/// ```text
/// m_t = β1 * m_{t-1} + (1 - β1) * gradient
/// v_t = β2 * v_{t-1} + (1 - β2) * gradient²
/// m_hat = m_t / (1 - β1^t)
/// v_hat = v_t / (1 - β2^t)
/// parameter = parameter - α * m_hat / (√v_hat + ε)
/// ```
///
/// The time step `t` is counted per slot, so the weights and the bias of a
/// layer are bias-corrected independently of each other and of other layers.
///
/// # Example
///
/// ```
/// use ndnet::optimizers::{Adam, Optimizer};
///
/// let mut optimizer = Adam::new(0.001, 0.9, 0.999, 1e-8);
/// let mut weights = vec![1.0, 2.0, 3.0];
/// optimizer.update(0, &mut weights, &[0.1, 0.2, 0.3]).unwrap();
/// // The first bias-corrected step moves every weight by about α.
/// assert!((weights[0] - 0.999).abs() < 1e-5);
/// ```
///
/// # Reference
///
/// Kingma, D. P., & Ba, J. (2014). Adam: A method for stochastic optimization.
/// arXiv preprint arXiv:1412.6980.
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    moments: SlotBuffers<Moments>,
}

impl Adam {
    /// Ranges are checked by `OptimizerConfig::validate`, not here.
    pub fn new(learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            moments: SlotBuffers::default(),
        }
    }

    /// Steps taken so far on `slot`.
    pub fn steps(&self, slot: usize) -> usize {
        self.moments.peek(slot).map_or(0, |s| s.t as usize)
    }
}

impl Optimizer for Adam {
    fn update(&mut self, slot: usize, parameters: &mut [f32], gradients: &[f32]) -> Result<()> {
        check_lengths(parameters, gradients)?;
        let n = parameters.len();
        let state = self.moments.get(slot, |s| s.m.len() == n, || Moments::zeros(n));

        state.t += 1;
        let bias_correction1 = 1.0 - self.beta1.powi(state.t);
        let bias_correction2 = 1.0 - self.beta2.powi(state.t);

        for i in 0..n {
            let g = gradients[i];
            state.m[i] = self.beta1 * state.m[i] + (1.0 - self.beta1) * g;
            state.v[i] = self.beta2 * state.v[i] + (1.0 - self.beta2) * g * g;
            let m_hat = state.m[i] / bias_correction1;
            let v_hat = state.v[i] / bias_correction2;
            parameters[i] -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
        }
        Ok(())
    }

    /// Clears all moment estimates and step counters.
    fn reset(&mut self) {
        self.moments.clear();
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f32) {
        self.learning_rate = lr;
    }
}
