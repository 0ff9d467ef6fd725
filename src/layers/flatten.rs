//! Flatten layer: reinterprets a feature map as a column vector.

use crate::error::{Error, Result};
use crate::layers::r#trait::{expect_grad_shape, ForwardToken, Layer, Parameters, PassGuard};
use crate::tensor::Tensor;

/// Parameterless bridge between convolution and dense layers.
///
/// Forward copies the input buffer verbatim into an `(size, 1)` output;
/// backward copies the upstream gradient verbatim back into the input shape.
#[derive(Debug, Clone)]
pub struct FlattenLayer {
    /// Shape of the last forward input, restored by backward
    input_shape: Vec<usize>,
    guard: PassGuard,
}

impl FlattenLayer {
    pub fn new() -> Self {
        Self {
            input_shape: Vec::new(),
            guard: PassGuard::new(),
        }
    }
}

impl Default for FlattenLayer {
    fn default() -> Self {
        Self::new()
    }
}

fn copy_verbatim(src: &Tensor, dst: &mut Tensor) -> Result<()> {
    if src.size() != dst.size() {
        return Err(Error::ElementCount {
            shape: dst.shape().to_vec(),
            expected: src.size(),
            got: dst.size(),
        });
    }
    dst.data_mut().copy_from_slice(src.data());
    Ok(())
}

impl Layer for FlattenLayer {
    fn name(&self) -> &'static str {
        "flatten"
    }

    fn output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        Ok(vec![input_shape.iter().product(), 1])
    }

    fn forward(&mut self, input: &Tensor, output: &mut Tensor) -> Result<ForwardToken> {
        self.guard.disarm();
        copy_verbatim(input, output)?;
        self.input_shape.clear();
        self.input_shape.extend_from_slice(input.shape());
        Ok(self.guard.arm())
    }

    fn backward(
        &mut self,
        token: ForwardToken,
        grad_output: &Tensor,
        grad_input: Option<&mut Tensor>,
    ) -> Result<()> {
        self.guard.redeem(token)?;
        let size = self.input_shape.iter().product::<usize>();
        expect_grad_shape("flatten backward", &[size, 1], grad_output)?;
        match grad_input {
            Some(grad_input) => {
                expect_grad_shape("flatten backward", &self.input_shape, grad_input)?;
                copy_verbatim(grad_output, grad_input)
            }
            None => Ok(()),
        }
    }

    fn parameters(&self) -> Option<&Parameters> {
        None
    }

    fn parameters_mut(&mut self) -> Option<&mut Parameters> {
        None
    }

    fn set_parameters(&mut self, _weights: &Tensor, _bias: &Tensor) -> Result<()> {
        Err(Error::config("flatten layer has no parameters"))
    }

    fn is_initialized(&self) -> bool {
        true
    }
}
