//! Layer abstractions for neural networks
//!
//! This module provides the Layer trait, the three layer kinds a network is
//! built from and [`NetworkLayer`], the closed set the network stores.

mod r#trait;
pub mod conv2d;
pub mod dense;
pub mod flatten;

// Re-export the Layer trait for convenience
pub use conv2d::Conv2DLayer;
pub use dense::DenseLayer;
pub use flatten::FlattenLayer;
pub use r#trait::{ForwardToken, Layer, Parameters};

use crate::error::Result;
use crate::tensor::Tensor;

/// One stage of a network's fixed pipeline.
#[derive(Debug, Clone)]
pub enum NetworkLayer {
    Dense(DenseLayer),
    Convolution(Conv2DLayer),
    Flatten(FlattenLayer),
}

impl NetworkLayer {
    fn inner(&self) -> &dyn Layer {
        match self {
            NetworkLayer::Dense(layer) => layer,
            NetworkLayer::Convolution(layer) => layer,
            NetworkLayer::Flatten(layer) => layer,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Layer {
        match self {
            NetworkLayer::Dense(layer) => layer,
            NetworkLayer::Convolution(layer) => layer,
            NetworkLayer::Flatten(layer) => layer,
        }
    }
}

impl From<DenseLayer> for NetworkLayer {
    fn from(layer: DenseLayer) -> Self {
        NetworkLayer::Dense(layer)
    }
}

impl From<Conv2DLayer> for NetworkLayer {
    fn from(layer: Conv2DLayer) -> Self {
        NetworkLayer::Convolution(layer)
    }
}

impl From<FlattenLayer> for NetworkLayer {
    fn from(layer: FlattenLayer) -> Self {
        NetworkLayer::Flatten(layer)
    }
}

impl Layer for NetworkLayer {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        self.inner().output_shape(input_shape)
    }

    fn forward(&mut self, input: &Tensor, output: &mut Tensor) -> Result<ForwardToken> {
        self.inner_mut().forward(input, output)
    }

    fn backward(
        &mut self,
        token: ForwardToken,
        grad_output: &Tensor,
        grad_input: Option<&mut Tensor>,
    ) -> Result<()> {
        self.inner_mut().backward(token, grad_output, grad_input)
    }

    fn parameters(&self) -> Option<&Parameters> {
        self.inner().parameters()
    }

    fn parameters_mut(&mut self) -> Option<&mut Parameters> {
        self.inner_mut().parameters_mut()
    }

    fn set_parameters(&mut self, weights: &Tensor, bias: &Tensor) -> Result<()> {
        self.inner_mut().set_parameters(weights, bias)
    }

    fn is_initialized(&self) -> bool {
        self.inner().is_initialized()
    }

    fn parameter_count(&self) -> usize {
        self.inner().parameter_count()
    }
}
