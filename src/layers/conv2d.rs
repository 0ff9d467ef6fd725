//! 2D Convolutional layer implementation
//!
//! This module provides a Conv2DLayer: a bank of square filters correlated
//! with a `(channels, height, width)` input, no padding, stride one.

use crate::error::{Error, Result};
use crate::layers::r#trait::{
    check_output, expect_grad_shape, remember_input, ForwardToken, Layer, Parameters, PassGuard,
};
use crate::tensor::{self, correlate, full_correlate_accumulate, Tensor};
use crate::utils::{Activation, SimpleRng};
use log::debug;

/// Initial value of every bias entry.
const INITIAL_BIAS: f32 = 0.01;

/// 2D Convolutional layer with learnable filters.
///
/// Weights are `(kernel_count, channels, kernel_size, kernel_size)`; the bias
/// has one entry per output position, `(kernel_count, out_h, out_w)`, like
/// the linear output it is added to. Channels and spatial extent come from
/// the first input the layer sees.
///
/// # Fields
///
/// * `kernel_count` - Number of filters, i.e. output channels
/// * `kernel_size` - Side of the square kernel
/// * `activation` - Activation applied to the linear output
/// * `params` - Weights and bias, absent until initialized
/// * `input` - Copy of the last forward input, differentiated against by backward
/// * `linear` - Cached pre-activation output, reused as scratch by backward
///
/// # Example
///
/// ```
/// use ndnet::layers::{Conv2DLayer, Layer};
/// use ndnet::utils::{Activation, SimpleRng};
///
/// let layer = Conv2DLayer::new(8, 3, Activation::Relu, SimpleRng::new(42));
/// assert_eq!(layer.output_shape(&[1, 28, 28]).unwrap(), vec![8, 26, 26]);
/// ```
#[derive(Debug, Clone)]
pub struct Conv2DLayer {
    kernel_count: usize,
    kernel_size: usize,
    activation: Activation,
    params: Option<Parameters>,
    input: Tensor,
    linear: Tensor,
    rng: SimpleRng,
    guard: PassGuard,
}

impl Conv2DLayer {
    /// Create an uninitialized Conv2DLayer.
    ///
    /// # Arguments
    ///
    /// * `kernel_count` - Number of filters
    /// * `kernel_size` - Side of the square kernel (e.g., 3 for 3×3)
    /// * `activation` - Activation applied after the correlation
    /// * `rng` - Generator used for the lazy He initialization
    pub fn new(kernel_count: usize, kernel_size: usize, activation: Activation, rng: SimpleRng) -> Self {
        Self {
            kernel_count,
            kernel_size,
            activation,
            params: None,
            input: Tensor::zeros(&[0]),
            linear: Tensor::zeros(&[0]),
            rng,
            guard: PassGuard::new(),
        }
    }

    pub fn kernel_count(&self) -> usize {
        self.kernel_count
    }

    pub fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// Input channels, known once the parameters exist.
    pub fn channels(&self) -> Option<usize> {
        self.params.as_ref().map(|p| p.weights.shape()[1])
    }

    fn initial_parameters(&mut self, channels: usize, out_shape: &[usize]) -> Result<Parameters> {
        let k = self.kernel_size;
        let mut weights = Tensor::zeros(&[self.kernel_count, channels, k, k]);
        weights.he_initialize(&mut self.rng)?;
        let bias = Tensor::filled(out_shape, INITIAL_BIAS);
        debug!(
            "conv: initialized kernels {:?}, output {:?}",
            weights.shape(),
            out_shape
        );
        Ok(Parameters::new(weights, bias))
    }
}

impl Layer for Conv2DLayer {
    fn name(&self) -> &'static str {
        "convolution"
    }

    fn output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        let [channels, height, width] = *input_shape else {
            return Err(Error::RankMismatch {
                op: "convolution",
                expected: 3,
                got: input_shape.len(),
            });
        };
        let k = self.kernel_size;
        if k == 0 || height < k || width < k {
            return Err(Error::shape("convolution", &[channels, k, k], input_shape));
        }
        if let Some(expected) = self.channels() {
            if expected != channels {
                return Err(Error::shape("convolution", &[expected], &[channels]));
            }
        }
        let out = vec![self.kernel_count, height - k + 1, width - k + 1];
        if let Some(params) = &self.params {
            if params.bias.shape() != out.as_slice() {
                return Err(Error::shape("convolution", params.bias.shape(), &out));
            }
        }
        Ok(out)
    }

    fn forward(&mut self, input: &Tensor, output: &mut Tensor) -> Result<ForwardToken> {
        self.guard.disarm();
        let out_shape = self.output_shape(input.shape())?;
        let params = match self.params {
            Some(ref params) => params,
            None => {
                let params = self.initial_parameters(input.shape()[0], &out_shape)?;
                self.linear = Tensor::zeros(&out_shape);
                &*self.params.insert(params)
            }
        };
        remember_input(&mut self.input, input)?;
        tensor::conv3d(input, &params.weights, &mut self.linear)?;
        tensor::add_assign(&mut self.linear, &params.bias)?;
        self.activation.apply(&self.linear, output)?;
        check_output("convolution forward", output)?;
        Ok(self.guard.arm())
    }

    fn backward(
        &mut self,
        token: ForwardToken,
        grad_output: &Tensor,
        mut grad_input: Option<&mut Tensor>,
    ) -> Result<()> {
        self.guard.redeem(token)?;
        let Some(params) = self.params.as_mut() else {
            return Err(Error::uninitialized("convolution"));
        };
        expect_grad_shape("convolution backward", self.linear.shape(), grad_output)?;
        if let Some(grad_input) = grad_input.as_deref() {
            expect_grad_shape("convolution backward", self.input.shape(), grad_input)?;
        }
        let channels = params.weights.shape()[1];
        let k = self.kernel_size;

        self.activation.derivative_inplace(&mut self.linear);
        tensor::mul(grad_output, &self.linear, &mut params.bias_grad)?;

        for n in 0..self.kernel_count {
            let delta = params.bias_grad.plane(&[n])?;
            for c in 0..channels {
                let slot = params.weights_grad.plane_mut(&[n, c])?;
                correlate(self.input.plane(&[c])?, delta, slot, false)?;
            }
        }

        if let Some(grad_input) = grad_input.as_deref_mut() {
            grad_input.fill(0.0);
            let [_, oh, ow] = *params.bias_grad.shape() else {
                return Err(Error::RankMismatch {
                    op: "convolution backward",
                    expected: 3,
                    got: params.bias_grad.rank(),
                });
            };
            let mut padded = Tensor::zeros(&[oh + 2 * (k - 1), ow + 2 * (k - 1)]);
            let mut flipped = Tensor::zeros(&[k, k]);
            for n in 0..self.kernel_count {
                tensor::pad_view(params.bias_grad.plane(&[n])?, k - 1, &mut padded)?;
                for c in 0..channels {
                    full_correlate_accumulate(
                        padded.matrix()?,
                        params.weights.plane(&[n, c])?,
                        &mut flipped,
                        grad_input.plane_mut(&[c])?,
                    )?;
                }
            }
        }
        Ok(())
    }

    fn parameters(&self) -> Option<&Parameters> {
        self.params.as_ref()
    }

    fn parameters_mut(&mut self) -> Option<&mut Parameters> {
        self.params.as_mut()
    }

    fn set_parameters(&mut self, weights: &Tensor, bias: &Tensor) -> Result<()> {
        weights.expect_rank("convolution parameters", 4)?;
        bias.expect_rank("convolution parameters", 3)?;
        let k = self.kernel_size;
        let w = weights.shape();
        if w[0] != self.kernel_count || w[2] != k || w[3] != k {
            return Err(Error::shape("convolution parameters", &[self.kernel_count, w[1], k, k], w));
        }
        if bias.shape()[0] != self.kernel_count {
            return Err(Error::shape("convolution parameters", &[self.kernel_count], &bias.shape()[..1]));
        }
        match self.params.as_mut() {
            Some(params) => params.assign(weights, bias)?,
            None => {
                self.params = Some(Parameters::new(weights.to_contiguous(), bias.to_contiguous()));
                self.linear = Tensor::zeros(bias.shape());
            }
        }
        Ok(())
    }
}
