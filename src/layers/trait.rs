//! Layer trait definition for neural network layers
//!
//! This module defines the core Layer trait that all layer types implement,
//! the parameter bundle shared by the trainable layers and the forward token
//! that ties every backward call to the forward pass it differentiates.

use crate::error::{Error, Result};
use crate::tensor::Tensor;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_LAYER_ID: AtomicU64 = AtomicU64::new(1);

/// Proof that a layer ran a forward pass whose cached state is still current.
///
/// Returned by [`Layer::forward`] and consumed by [`Layer::backward`]. The
/// token is neither `Clone` nor `Copy`, so it can be redeemed at most once,
/// and a later forward on the same layer invalidates it. Everything backward
/// differentiates against (the input, the linear output) is cached by the
/// layer itself, so a redeemed token always pairs with the data it was
/// issued for.
#[derive(Debug)]
#[must_use = "backward needs the token of the matching forward pass"]
pub struct ForwardToken {
    layer: u64,
    pass: u64,
}

/// Per-layer bookkeeping behind [`ForwardToken`].
#[derive(Debug)]
pub(crate) struct PassGuard {
    id: u64,
    passes: u64,
    armed: Option<u64>,
}

impl PassGuard {
    pub(crate) fn new() -> Self {
        Self {
            id: NEXT_LAYER_ID.fetch_add(1, Ordering::Relaxed),
            passes: 0,
            armed: None,
        }
    }

    /// Forget any outstanding token, e.g. when a forward pass fails halfway.
    pub(crate) fn disarm(&mut self) {
        self.armed = None;
    }

    /// Start a new pass and hand out its token.
    pub(crate) fn arm(&mut self) -> ForwardToken {
        self.passes += 1;
        self.armed = Some(self.passes);
        ForwardToken {
            layer: self.id,
            pass: self.passes,
        }
    }

    /// Accept `token` only if it is the token of this layer's latest forward.
    pub(crate) fn redeem(&mut self, token: ForwardToken) -> Result<()> {
        if token.layer != self.id || self.armed != Some(token.pass) {
            return Err(Error::StaleForwardToken);
        }
        self.armed = None;
        Ok(())
    }
}

impl Clone for PassGuard {
    /// A copied layer is a different layer: it gets its own id and no pass.
    fn clone(&self) -> Self {
        Self::new()
    }
}

/// Weights, bias and the gradients computed for them by the last backward.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    pub weights: Tensor,
    pub bias: Tensor,
    pub weights_grad: Tensor,
    pub bias_grad: Tensor,
}

impl Parameters {
    /// Wrap initial values; gradients start at zero with matching shapes.
    pub fn new(weights: Tensor, bias: Tensor) -> Self {
        let weights_grad = Tensor::zeros(weights.shape());
        let bias_grad = Tensor::zeros(bias.shape());
        Self {
            weights,
            bias,
            weights_grad,
            bias_grad,
        }
    }

    /// Number of trainable values.
    pub fn count(&self) -> usize {
        self.weights.size() + self.bias.size()
    }

    /// `(parameter, gradient)` pairs in update order: weights, then bias.
    pub fn pairs_mut(&mut self) -> [(&mut Tensor, &Tensor); 2] {
        [
            (&mut self.weights, &self.weights_grad),
            (&mut self.bias, &self.bias_grad),
        ]
    }

    /// Overwrite the values (not the gradients) from another bundle of the same shapes.
    pub fn assign(&mut self, weights: &Tensor, bias: &Tensor) -> Result<()> {
        self.weights.copy_from(weights)?;
        self.bias.copy_from(bias)
    }
}

/// Keep a copy of the forward input for the matching backward pass.
pub(crate) fn remember_input(cache: &mut Tensor, input: &Tensor) -> Result<()> {
    if cache.shape() == input.shape() {
        cache.copy_from(input)
    } else {
        *cache = input.to_contiguous();
        Ok(())
    }
}

/// Check a caller-supplied gradient buffer against the shape backward expects.
pub(crate) fn expect_grad_shape(op: &'static str, expected: &[usize], grad: &Tensor) -> Result<()> {
    if grad.shape() != expected {
        return Err(Error::shape(op, expected, grad.shape()));
    }
    Ok(())
}

/// Reject a layer output that contains NaN.
pub(crate) fn check_output(op: &'static str, output: &Tensor) -> Result<()> {
    match output.data().iter().position(|v| v.is_nan()) {
        Some(i) => Err(Error::NumericalInvalid {
            op,
            detail: format!("NaN in layer output at index {}", i),
        }),
        None => Ok(()),
    }
}

/// Core trait for neural network layers.
///
/// All layer types (Dense, Convolution, Flatten) implement this trait to
/// provide a uniform interface for forward and backward propagation over
/// single samples.
///
/// # Protocol
///
/// `backward` consumes the [`ForwardToken`] returned by the most recent
/// `forward`. Layers cache their input and pre-activation output in
/// between, and backward reuses the latter as scratch, so the pairing is
/// strict.
///
/// # Example
///
/// ```
/// use ndnet::layers::{DenseLayer, Layer};
/// use ndnet::tensor::Tensor;
/// use ndnet::utils::{Activation, SimpleRng};
///
/// let mut layer = DenseLayer::new(2, Activation::Relu, SimpleRng::new(1));
/// let input = Tensor::column(&[0.5, -0.25, 1.0]);
/// let mut output = Tensor::zeros(&[2, 1]);
/// let token = layer.forward(&input, &mut output).unwrap();
///
/// let grad_output = Tensor::column(&[1.0, 1.0]);
/// let mut grad_input = Tensor::zeros(&[3, 1]);
/// layer.backward(token, &grad_output, Some(&mut grad_input)).unwrap();
/// assert_eq!(layer.parameter_count(), 2 * 3 + 2);
/// ```
pub trait Layer {
    /// Short lowercase name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Shape of the output produced for an input of `input_shape`.
    ///
    /// # Errors
    ///
    /// Fails when the layer cannot accept inputs of this shape (wrong rank,
    /// spatial extent smaller than the kernel, disagreement with parameters
    /// that are already initialized).
    fn output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>>;

    /// Forward propagation through the layer.
    ///
    /// Initializes the parameters on first use from the observed input
    /// shape, writes the activated output into `output` and caches what the
    /// backward pass needs.
    ///
    /// # Arguments
    ///
    /// * `input` - Input sample
    /// * `output` - Preallocated buffer of shape `output_shape(input.shape())`
    fn forward(&mut self, input: &Tensor, output: &mut Tensor) -> Result<ForwardToken>;

    /// Backward propagation through the layer.
    ///
    /// Computes the parameter gradients from `grad_output` (gradient of the
    /// loss with respect to this layer's output) and, when `grad_input` is
    /// given, the gradient with respect to the input.
    ///
    /// # Arguments
    ///
    /// * `token` - Token returned by the matching forward pass
    /// * `grad_output` - Gradient with the shape of the layer output
    /// * `grad_input` - Optional buffer with the shape of the forward input
    ///
    /// # Errors
    ///
    /// [`Error::StaleForwardToken`] when the token does not belong to this
    /// layer's latest forward pass, [`Error::ShapeMismatch`] when a gradient
    /// buffer does not match the shapes of that pass. Shapes are checked
    /// before any gradient is written.
    fn backward(
        &mut self,
        token: ForwardToken,
        grad_output: &Tensor,
        grad_input: Option<&mut Tensor>,
    ) -> Result<()>;

    /// Trainable parameters, if the layer has any and they are initialized.
    fn parameters(&self) -> Option<&Parameters>;

    fn parameters_mut(&mut self) -> Option<&mut Parameters>;

    /// Install explicit parameter values, initializing the layer if needed.
    fn set_parameters(&mut self, weights: &Tensor, bias: &Tensor) -> Result<()>;

    /// True once the layer can run backward or be saved.
    fn is_initialized(&self) -> bool {
        self.parameters().is_some()
    }

    /// Get the number of trainable parameters in the layer.
    ///
    /// Zero for parameterless layers and for layers not yet initialized.
    fn parameter_count(&self) -> usize {
        self.parameters().map_or(0, Parameters::count)
    }
}
