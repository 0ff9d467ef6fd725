//! Error type shared by every module of the crate.
//!
//! Every invariant the engine checks (shape agreement, rank requirements,
//! finite distributions, the forward/backward protocol) surfaces as one of
//! these variants. Nothing is clamped or skipped silently: the caller decides
//! whether to abort the run or drop the sample.

use std::path::PathBuf;

/// All failures the engine, the layers and the I/O helpers can report.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Two operands (or an operand and its output) disagree on shape.
    #[error("shape mismatch in {op}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        op: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    /// The operation needs a tensor of a specific rank.
    #[error("rank mismatch in {op}: expected rank {expected}, got {got}")]
    RankMismatch {
        op: &'static str,
        expected: usize,
        got: usize,
    },

    /// Buffer length does not match the product of the shape.
    #[error("element count mismatch: shape {shape:?} needs {expected} elements, got {got}")]
    ElementCount {
        shape: Vec<usize>,
        expected: usize,
        got: usize,
    },

    /// A NaN showed up where a valid number is required.
    #[error("numerically invalid result in {op}: {detail}")]
    NumericalInvalid { op: &'static str, detail: String },

    /// A layer was asked for parameters before they were initialized.
    #[error("layer {layer} has no parameters yet (run a forward pass or load a model first)")]
    Uninitialized { layer: String },

    /// Backward was called with a token that does not belong to the latest forward.
    #[error("backward called without a matching forward pass")]
    StaleForwardToken,

    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A model file does not match the network it is loaded into.
    #[error("malformed model file: {0}")]
    ModelFormat(String),

    /// A dataset index or image file could not be interpreted.
    #[error("dataset error in {}: {reason}", .path.display())]
    Dataset { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn shape(op: &'static str, expected: &[usize], got: &[usize]) -> Self {
        Error::ShapeMismatch {
            op,
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    pub(crate) fn uninitialized(layer: impl std::fmt::Display) -> Self {
        Error::Uninitialized {
            layer: layer.to_string(),
        }
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::InvalidConfig(msg.into())
    }
}
