//! Stochastic Gradient Descent (SGD) optimizer implementation
//!
//! This module provides the vanilla update rule, both as a stateless
//! [`Optimizer`] and as the tensor-level [`sgd`] step.

use crate::error::Result;
use crate::optimizers::{check_lengths, Optimizer};
use crate::tensor::Tensor;

/// `weights -= learning_rate * grad`, elementwise over tensors of equal shape.
///
/// # Example
///
/// ```
/// use ndnet::optimizers::sgd;
/// use ndnet::tensor::Tensor;
///
/// let mut w = Tensor::column(&[1.0, 2.0]);
/// sgd(&mut w, &Tensor::column(&[0.5, -0.5]), 0.1).unwrap();
/// assert_eq!(w.data(), &[0.95, 2.05]);
/// ```
pub fn sgd(weights: &mut Tensor, grad: &Tensor, learning_rate: f32) -> Result<()> {
    grad.expect_same_shape("sgd", weights)?;
    if weights.strides() == grad.strides() {
        for (w, &g) in weights.data_mut().iter_mut().zip(grad.data()) {
            *w -= learning_rate * g;
        }
    } else {
        let targets: Vec<usize> = weights.offsets().collect();
        for (dst, src) in targets.into_iter().zip(grad.offsets()) {
            weights.data_mut()[dst] -= learning_rate * grad.data()[src];
        }
    }
    Ok(())
}

/// Stochastic Gradient Descent optimizer.
///
/// Implements the basic gradient descent update rule without momentum or
/// adaptive learning rates:
///
/// `w = w - η * ∇L/∂w`
///
/// where w is the parameter, η (eta) is the learning rate, and ∇L/∂w is the gradient.
///
/// # Limitations
///
/// Vanilla SGD can be slow to converge and may oscillate around minima.
#[derive(Debug, Clone)]
pub struct Sgd {
    learning_rate: f32,
}

impl Sgd {
    /// Creates a new SGD optimizer with the specified learning rate.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndnet::optimizers::{Optimizer, Sgd};
    ///
    /// let optimizer = Sgd::new(0.01);
    /// assert_eq!(optimizer.learning_rate(), 0.01);
    /// ```
    pub fn new(learning_rate: f32) -> Self {
        Self { learning_rate }
    }
}

impl Optimizer for Sgd {
    fn update(&mut self, _slot: usize, parameters: &mut [f32], gradients: &[f32]) -> Result<()> {
        check_lengths(parameters, gradients)?;
        for (p, &g) in parameters.iter_mut().zip(gradients) {
            *p -= self.learning_rate * g;
        }
        Ok(())
    }

    /// SGD has no state to reset.
    fn reset(&mut self) {}

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f32) {
        self.learning_rate = lr;
    }
}
