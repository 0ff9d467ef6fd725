//! SGD with momentum.

use crate::error::Result;
use crate::optimizers::{check_lengths, Optimizer, SlotBuffers};

/// Gradient descent with a velocity term.
///
/// ```text
/// v = μ * v - lr * gradient
/// parameter = parameter + v
/// ```
///
/// One velocity buffer is kept per slot.
#[derive(Debug, Clone)]
pub struct Momentum {
    learning_rate: f32,
    momentum: f32,
    velocity: SlotBuffers<Vec<f32>>,
}

impl Momentum {
    /// # Arguments
    ///
    /// * `learning_rate` - Step size
    /// * `momentum` - Velocity decay μ (typically 0.9)
    pub fn new(learning_rate: f32, momentum: f32) -> Self {
        Self {
            learning_rate,
            momentum,
            velocity: SlotBuffers::default(),
        }
    }

    pub fn momentum(&self) -> f32 {
        self.momentum
    }
}

impl Optimizer for Momentum {
    fn update(&mut self, slot: usize, parameters: &mut [f32], gradients: &[f32]) -> Result<()> {
        check_lengths(parameters, gradients)?;
        let n = parameters.len();
        let velocity = self.velocity.get(slot, |v| v.len() == n, || vec![0.0; n]);
        for ((p, v), &g) in parameters.iter_mut().zip(velocity.iter_mut()).zip(gradients) {
            *v = self.momentum * *v - self.learning_rate * g;
            *p += *v;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.velocity.clear();
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f32) {
        self.learning_rate = lr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_momentum_accumulates_velocity() {
        let mut opt = Momentum::new(0.1, 0.9);
        let mut p = vec![0.0];
        opt.update(0, &mut p, &[1.0]).unwrap();
        assert!((p[0] + 0.1).abs() < 1e-6);
        // v = 0.9 * -0.1 - 0.1 = -0.19
        opt.update(0, &mut p, &[1.0]).unwrap();
        assert!((p[0] + 0.29).abs() < 1e-6);
    }

    #[test]
    fn test_momentum_slots_are_independent() {
        let mut opt = Momentum::new(0.1, 0.9);
        let mut a = vec![0.0];
        let mut b = vec![0.0];
        opt.update(0, &mut a, &[1.0]).unwrap();
        opt.update(1, &mut b, &[1.0]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_momentum_reset() {
        let mut opt = Momentum::new(0.1, 0.9);
        let mut p = vec![0.0];
        opt.update(0, &mut p, &[1.0]).unwrap();
        opt.reset();
        let mut q = vec![0.0];
        opt.update(0, &mut q, &[1.0]).unwrap();
        assert!((q[0] + 0.1).abs() < 1e-6);
    }
}
