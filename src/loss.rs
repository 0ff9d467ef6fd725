//! Loss functions and their gradients with respect to the prediction.

use crate::error::Result;
use crate::tensor::{self, Tensor};
use serde::{Deserialize, Serialize};

/// Predictions are clamped into `[EPS, 1 - EPS]` before the logarithm.
const CROSS_ENTROPY_EPSILON: f32 = 1e-8;

/// Loss driving the backward pass of a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossKind {
    #[default]
    CrossEntropy,
    #[serde(alias = "mse")]
    MeanSquared,
}

impl LossKind {
    pub fn value(self, prediction: &Tensor, target: &Tensor) -> Result<f32> {
        match self {
            LossKind::CrossEntropy => cross_entropy(prediction, target),
            LossKind::MeanSquared => mse(prediction, target),
        }
    }

    /// Gradient of the loss with respect to `prediction`, written into `out`.
    pub fn gradient(self, prediction: &Tensor, target: &Tensor, out: &mut Tensor) -> Result<()> {
        match self {
            LossKind::CrossEntropy => cross_entropy_prime(prediction, target, out),
            LossKind::MeanSquared => mse_prime(prediction, target, out),
        }
    }
}

/// `-Σ target · ln(clamp(prediction)) / n`, where `n` is the element count.
pub fn cross_entropy(prediction: &Tensor, target: &Tensor) -> Result<f32> {
    prediction.expect_same_shape("cross_entropy", target)?;
    let mut total = 0.0f32;
    for (p, t) in prediction.offsets().zip(target.offsets()) {
        let clamped = prediction.data()[p].clamp(CROSS_ENTROPY_EPSILON, 1.0 - CROSS_ENTROPY_EPSILON);
        total -= target.data()[t] * clamped.ln();
    }
    Ok(total / prediction.size().max(1) as f32)
}

/// `prediction - target`: the gradient of cross-entropy through a softmax output.
pub fn cross_entropy_prime(prediction: &Tensor, target: &Tensor, out: &mut Tensor) -> Result<()> {
    tensor::sub(prediction, target, out)
}

/// `Σ (prediction - target)² / n`
pub fn mse(prediction: &Tensor, target: &Tensor) -> Result<f32> {
    prediction.expect_same_shape("mse", target)?;
    let total: f32 = prediction
        .offsets()
        .zip(target.offsets())
        .map(|(p, t)| {
            let d = prediction.data()[p] - target.data()[t];
            d * d
        })
        .sum();
    Ok(total / prediction.size().max(1) as f32)
}

/// `2 (prediction - target)`
pub fn mse_prime(prediction: &Tensor, target: &Tensor, out: &mut Tensor) -> Result<()> {
    tensor::sub(prediction, target, out)?;
    tensor::scale(out, 2.0);
    Ok(())
}
