//! RMSProp optimizer implementation

use crate::error::Result;
use crate::optimizers::{check_lengths, Optimizer, SlotBuffers};

/// Gradient scaled by a running root mean square of past gradients.
///
/// ```text
/// s = ρ * s + (1 - ρ) * gradient²
/// parameter = parameter - lr * gradient / (√s + ε)
/// ```
#[derive(Debug, Clone)]
pub struct RmsProp {
    learning_rate: f32,
    rho: f32,
    epsilon: f32,
    mean_square: SlotBuffers<Vec<f32>>,
}

impl RmsProp {
    /// # Arguments
    ///
    /// * `learning_rate` - Step size
    /// * `rho` - Decay of the squared-gradient average (typically 0.9)
    /// * `epsilon` - Added to the root to avoid division by zero
    pub fn new(learning_rate: f32, rho: f32, epsilon: f32) -> Self {
        Self {
            learning_rate,
            rho,
            epsilon,
            mean_square: SlotBuffers::default(),
        }
    }
}

impl Optimizer for RmsProp {
    fn update(&mut self, slot: usize, parameters: &mut [f32], gradients: &[f32]) -> Result<()> {
        check_lengths(parameters, gradients)?;
        let n = parameters.len();
        let s = self.mean_square.get(slot, |s| s.len() == n, || vec![0.0; n]);
        for ((p, s), &g) in parameters.iter_mut().zip(s.iter_mut()).zip(gradients) {
            *s = self.rho * *s + (1.0 - self.rho) * g * g;
            *p -= self.learning_rate * g / (s.sqrt() + self.epsilon);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.mean_square.clear();
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f32) {
        self.learning_rate = lr;
    }
}
