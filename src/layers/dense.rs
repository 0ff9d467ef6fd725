//! Dense (fully connected) layer implementation
//!
//! This module provides a DenseLayer that performs the transformation
//! `linear = W · x + b`, `output = activation(linear)` on a column vector.

use crate::error::{Error, Result};
use crate::layers::r#trait::{
    check_output, expect_grad_shape, remember_input, ForwardToken, Layer, Parameters, PassGuard,
};
use crate::tensor::{self, Tensor};
use crate::utils::{Activation, SimpleRng};
use log::debug;

/// He-scaled weights are divided by this factor at initialization.
const WEIGHT_SHRINK: f32 = 100.0;
/// Initial value of every bias entry.
const INITIAL_BIAS: f32 = 0.1 / WEIGHT_SHRINK;

/// Dense (fully connected) layer with weights and biases.
///
/// Input and output are column vectors: `input` is `(input_size, 1)`, the
/// output is `(units, 1)`. The input size is not configured; it is taken from
/// the first input the layer sees.
///
/// # Fields
///
/// * `units` - Number of output features
/// * `activation` - Activation applied to the linear output
/// * `params` - Weights `(units, input_size)` and bias `(units, 1)`, absent until initialized
/// * `input` - Copy of the last forward input, differentiated against by backward
/// * `linear` - Cached pre-activation output, reused as scratch by backward
#[derive(Debug, Clone)]
pub struct DenseLayer {
    units: usize,
    activation: Activation,
    params: Option<Parameters>,
    input: Tensor,
    linear: Tensor,
    rng: SimpleRng,
    guard: PassGuard,
}

impl DenseLayer {
    /// Create an uninitialized DenseLayer.
    ///
    /// # Arguments
    ///
    /// * `units` - Number of output features
    /// * `activation` - Activation applied after the affine transform
    /// * `rng` - Generator used for the lazy He initialization
    pub fn new(units: usize, activation: Activation, rng: SimpleRng) -> Self {
        Self {
            units,
            activation,
            params: None,
            input: Tensor::zeros(&[0, 1]),
            linear: Tensor::zeros(&[units, 1]),
            rng,
            guard: PassGuard::new(),
        }
    }

    pub fn units(&self) -> usize {
        self.units
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// Input size, known once the parameters exist.
    pub fn input_size(&self) -> Option<usize> {
        self.params.as_ref().map(|p| p.weights.shape()[1])
    }

    /// Pre-activation output of the last forward pass.
    pub fn linear(&self) -> &Tensor {
        &self.linear
    }

    fn initial_parameters(&mut self, input_size: usize) -> Result<Parameters> {
        let mut weights = Tensor::zeros(&[self.units, input_size]);
        weights.he_initialize(&mut self.rng)?;
        tensor::scale(&mut weights, 1.0 / WEIGHT_SHRINK);
        let bias = Tensor::filled(&[self.units, 1], INITIAL_BIAS);
        debug!("dense: initialized weights {:?}", weights.shape());
        Ok(Parameters::new(weights, bias))
    }

    fn input_size_of(input_shape: &[usize]) -> Result<usize> {
        match input_shape {
            [n, 1] => Ok(*n),
            [n, _] => Err(Error::shape("dense", &[*n, 1], input_shape)),
            _ => Err(Error::RankMismatch {
                op: "dense",
                expected: 2,
                got: input_shape.len(),
            }),
        }
    }
}

impl Layer for DenseLayer {
    fn name(&self) -> &'static str {
        "dense"
    }

    fn output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        let n = Self::input_size_of(input_shape)?;
        if let Some(expected) = self.input_size() {
            if expected != n {
                return Err(Error::shape("dense", &[expected, 1], input_shape));
            }
        }
        Ok(vec![self.units, 1])
    }

    fn forward(&mut self, input: &Tensor, output: &mut Tensor) -> Result<ForwardToken> {
        self.guard.disarm();
        self.output_shape(input.shape())?;
        let params = match self.params {
            Some(ref params) => params,
            None => {
                let params = self.initial_parameters(input.shape()[0])?;
                &*self.params.insert(params)
            }
        };
        remember_input(&mut self.input, input)?;
        tensor::dot(&params.weights, input, &mut self.linear)?;
        tensor::add_assign(&mut self.linear, &params.bias)?;
        self.activation.apply(&self.linear, output)?;
        check_output("dense forward", output)?;
        Ok(self.guard.arm())
    }

    fn backward(
        &mut self,
        token: ForwardToken,
        grad_output: &Tensor,
        grad_input: Option<&mut Tensor>,
    ) -> Result<()> {
        self.guard.redeem(token)?;
        let Some(params) = self.params.as_mut() else {
            return Err(Error::uninitialized("dense"));
        };
        expect_grad_shape("dense backward", self.linear.shape(), grad_output)?;
        if let Some(grad_input) = grad_input.as_deref() {
            expect_grad_shape("dense backward", self.input.shape(), grad_input)?;
        }

        self.activation.derivative_inplace(&mut self.linear);
        tensor::mul(grad_output, &self.linear, &mut params.bias_grad)?;
        tensor::dot_views(params.bias_grad.matrix()?, self.input.t()?, &mut params.weights_grad)?;

        if let Some(grad_input) = grad_input {
            tensor::dot_views(params.weights.t()?, params.bias_grad.matrix()?, grad_input)?;
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
        weights.expect_rank("dense parameters", 2)?;
        if weights.shape()[0] != self.units {
            return Err(Error::shape("dense parameters", &[self.units], &weights.shape()[..1]));
        }
        if bias.shape() != [self.units, 1] {
            return Err(Error::shape("dense parameters", &[self.units, 1], bias.shape()));
        }
        match self.params.as_mut() {
            Some(params) => params.assign(weights, bias)?,
            None => self.params = Some(Parameters::new(weights.to_contiguous(), bias.to_contiguous())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forward_once(layer: &mut DenseLayer, input: &Tensor) -> (Tensor, ForwardToken) {
        let mut out = Tensor::zeros(&[layer.units(), 1]);
        let token = layer.forward(input, &mut out).unwrap();
        (out, token)
    }

    #[test]
    fn test_lazy_initialization() {
        let mut layer = DenseLayer::new(5, Activation::None, SimpleRng::new(42));
        assert!(!layer.is_initialized());
        assert_eq!(layer.parameter_count(), 0);

        let (_, _token) = forward_once(&mut layer, &Tensor::column(&[0.1; 10]));

        assert!(layer.is_initialized());
        assert_eq!(layer.input_size(), Some(10));
        assert_eq!(layer.parameter_count(), 10 * 5 + 5);
        let params = layer.parameters().unwrap();
        assert!(params.bias.data().iter().all(|&b| (b - 0.001).abs() < 1e-9));
        // He scale sqrt(2/10) shrunk by 100 keeps every weight tiny.
        assert!(params.weights.data().iter().all(|w| w.abs() < 0.05));
    }

    #[test]
    fn test_deterministic_initialization() {
        let input = Tensor::column(&[1.0, 2.0, 3.0]);
        let mut a = DenseLayer::new(4, Activation::Relu, SimpleRng::new(9));
        let mut b = DenseLayer::new(4, Activation::Relu, SimpleRng::new(9));
        let _ta = forward_once(&mut a, &input);
        let _tb = forward_once(&mut b, &input);
        assert_eq!(a.parameters(), b.parameters());
    }

    #[test]
    fn test_forward_affine() {
        let mut layer = DenseLayer::new(2, Activation::None, SimpleRng::new(1));
        let w = Tensor::from_vec(&[2, 3], vec![1.0, 0.0, -1.0, 0.5, 0.5, 0.5]).unwrap();
        let b = Tensor::column(&[0.25, -1.0]);
        layer.set_parameters(&w, &b).unwrap();

        let (out, _token) = forward_once(&mut layer, &Tensor::column(&[1.0, 2.0, 3.0]));
        assert_eq!(out.data(), &[-1.75, 2.0]);
    }

    #[test]
    fn test_backward_gradients() {
        let mut layer = DenseLayer::new(2, Activation::Relu, SimpleRng::new(1));
        let w = Tensor::from_vec(&[2, 2], vec![1.0, 1.0, -1.0, -1.0]).unwrap();
        layer.set_parameters(&w, &Tensor::column(&[0.0, 0.0])).unwrap();

        let input = Tensor::column(&[1.0, 2.0]);
        let (_, token) = forward_once(&mut layer, &input);
        let mut grad_input = Tensor::zeros(&[2, 1]);
        layer
            .backward(token, &Tensor::column(&[1.0, 1.0]), Some(&mut grad_input))
            .unwrap();

        let params = layer.parameters().unwrap();
        // Second unit is inactive under relu.
        assert_eq!(params.bias_grad.data(), &[1.0, 0.0]);
        assert_eq!(params.weights_grad.data(), &[1.0, 2.0, 0.0, 0.0]);
        assert_eq!(grad_input.data(), &[1.0, 1.0]);
    }

    #[test]
    fn test_backward_uses_input_of_its_forward() {
        let mut layer = DenseLayer::new(2, Activation::None, SimpleRng::new(1));
        let w = Tensor::from_vec(&[2, 2], vec![1.0, 0.0, 0.0, 1.0]).unwrap();
        layer.set_parameters(&w, &Tensor::column(&[0.0, 0.0])).unwrap();

        let mut input = Tensor::column(&[1.0, 2.0]);
        let (_, token) = forward_once(&mut layer, &input);
        // Changing the caller's tensor afterwards does not affect the gradients.
        input.data_mut().copy_from_slice(&[100.0, -50.0]);
        layer.backward(token, &Tensor::column(&[1.0, 1.0]), None).unwrap();
        assert_eq!(layer.parameters().unwrap().weights_grad.data(), &[1.0, 2.0, 1.0, 2.0]);
    }

    #[test]
    fn test_backward_rejects_wrong_gradient_shapes() {
        let mut layer = DenseLayer::new(2, Activation::Relu, SimpleRng::new(1));
        let input = Tensor::column(&[1.0, 2.0, 3.0]);

        let (_, token) = forward_once(&mut layer, &input);
        assert!(matches!(
            layer.backward(token, &Tensor::column(&[1.0, 1.0, 1.0]), None),
            Err(Error::ShapeMismatch { .. })
        ));

        let (_, token) = forward_once(&mut layer, &input);
        let mut grad_input = Tensor::zeros(&[4, 1]);
        assert!(matches!(
            layer.backward(token, &Tensor::column(&[1.0, 1.0]), Some(&mut grad_input)),
            Err(Error::ShapeMismatch { .. })
        ));
        assert!(layer.parameters().unwrap().weights_grad.data().iter().all(|&g| g == 0.0));
    }

    #[test]
    fn test_rejects_row_vector_input() {
        let mut layer = DenseLayer::new(2, Activation::None, SimpleRng::new(1));
        let input = Tensor::zeros(&[1, 3]);
        let mut out = Tensor::zeros(&[2, 1]);
        assert!(matches!(layer.forward(&input, &mut out), Err(Error::ShapeMismatch { .. })));
        assert!(!layer.is_initialized());
    }

    #[test]
    fn test_input_size_fixed_after_init() {
        let mut layer = DenseLayer::new(2, Activation::None, SimpleRng::new(1));
        let _t = forward_once(&mut layer, &Tensor::column(&[1.0, 2.0, 3.0]));
        let mut out = Tensor::zeros(&[2, 1]);
        assert!(layer.forward(&Tensor::column(&[1.0, 2.0]), &mut out).is_err());
    }
}
