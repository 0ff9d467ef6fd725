//! Activation functions and their derivatives over tensors.
//!
//! The set is closed: [`Activation`] is matched exhaustively wherever it is
//! applied. Softmax's "derivative" is the identity derivative on purpose:
//! softmax is only ever the terminal activation paired with cross-entropy,
//! whose gradient `prediction - target` already includes the softmax
//! Jacobian. [`crate::network::Network`] refuses any other pairing.

use crate::error::{Error, Result};
use crate::tensor::{self, map_with, Tensor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Activation applied to a layer's linear output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    #[serde(alias = "identity")]
    None,
    Relu,
    Softmax,
}

impl Activation {
    /// `out = f(input)`
    pub fn apply(self, input: &Tensor, out: &mut Tensor) -> Result<()> {
        match self {
            Activation::None => identity(input, out),
            Activation::Relu => relu(input, out),
            Activation::Softmax => softmax(input, out),
        }
    }

    /// Overwrite `values` with `f'(values)`.
    pub fn derivative_inplace(self, values: &mut Tensor) {
        match self {
            Activation::None | Activation::Softmax => values.fill(1.0),
            Activation::Relu => values
                .data_mut()
                .iter_mut()
                .for_each(|v| *v = if *v > 0.0 { 1.0 } else { 0.0 }),
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Activation::None => "none",
            Activation::Relu => "relu",
            Activation::Softmax => "softmax",
        };
        f.write_str(name)
    }
}

pub fn identity(input: &Tensor, out: &mut Tensor) -> Result<()> {
    out.copy_from(input)
}

pub fn relu(input: &Tensor, out: &mut Tensor) -> Result<()> {
    map_with("relu", input, out, |x| if x > 0.0 { x } else { 0.0 })
}

/// Max-shifted exponentials normalized to a distribution.
pub fn softmax(input: &Tensor, out: &mut Tensor) -> Result<()> {
    let shift = tensor::max(input);
    map_with("softmax", input, out, |x| (x - shift).exp())?;
    if let Some(i) = out.data().iter().position(|v| v.is_nan()) {
        return Err(Error::NumericalInvalid {
            op: "softmax",
            detail: format!("NaN exponent at index {} (max = {})", i, shift),
        });
    }
    tensor::normalize_inplace(out)
}

/// Constant one.
pub fn identity_prime(input: &Tensor, out: &mut Tensor) -> Result<()> {
    map_with("identity_prime", input, out, |_| 1.0)
}

pub fn relu_prime(input: &Tensor, out: &mut Tensor) -> Result<()> {
    map_with("relu_prime", input, out, |x| if x > 0.0 { 1.0 } else { 0.0 })
}
