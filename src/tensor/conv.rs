//! Valid cross-correlation in two and three dimensions.
//!
//! "Convolution" here follows the deep-learning convention: the kernel is not
//! flipped, there is no padding and the stride is one, so the output shrinks
//! by `kernel - 1` along each spatial axis. The full convolution needed for
//! gradients is built from [`pad`](super::pad) plus [`flip`](super::flip).

use super::{flip, MatrixView, Tensor};
use crate::error::{Error, Result};

fn valid_extent(op: &'static str, input: [usize; 2], kernel: [usize; 2]) -> Result<[usize; 2]> {
    match (input[0].checked_sub(kernel[0]), input[1].checked_sub(kernel[1])) {
        (Some(h), Some(w)) => Ok([h + 1, w + 1]),
        _ => Err(Error::shape(op, &input, &kernel)),
    }
}

/// Correlate `input` with `kernel` into the contiguous `out` plane.
///
/// With `accumulate` the result is added to what `out` already holds.
/// `out` must hold exactly `(rows - kh + 1) * (cols - kw + 1)` values.
pub(crate) fn correlate(
    input: MatrixView<'_>,
    kernel: MatrixView<'_>,
    out: &mut [f32],
    accumulate: bool,
) -> Result<()> {
    let [out_h, out_w] = valid_extent("correlate", input.shape(), kernel.shape())?;
    if out.len() != out_h * out_w {
        return Err(Error::shape("correlate", &[out_h, out_w], &[out.len()]));
    }
    for i in 0..out_h {
        for j in 0..out_w {
            let mut acc = 0.0f32;
            for k in 0..kernel.rows() {
                for l in 0..kernel.cols() {
                    acc += input.at(i + k, j + l) * kernel.at(k, l);
                }
            }
            let slot = &mut out[i * out_w + j];
            if accumulate {
                *slot += acc;
            } else {
                *slot = acc;
            }
        }
    }
    Ok(())
}

/// Add the full convolution of a padded gradient plane with `kernel` into `out`.
///
/// `padded_grad` is the gradient already padded by `kernel - 1` on every side;
/// `flipped` is a scratch tensor shaped like the kernel that receives its 180°
/// rotation.
pub(crate) fn full_correlate_accumulate(
    padded_grad: MatrixView<'_>,
    kernel: MatrixView<'_>,
    flipped: &mut Tensor,
    out: &mut [f32],
) -> Result<()> {
    if flipped.shape() != kernel.shape() {
        return Err(Error::shape("full_correlate", &kernel.shape(), flipped.shape()));
    }
    let cols = kernel.cols();
    for r in 0..kernel.rows() {
        for c in 0..cols {
            flipped.data[r * cols + c] = kernel.at(r, c);
        }
    }
    flip(flipped)?;
    correlate(padded_grad, flipped.matrix()?, out, true)
}

/// Valid 2D cross-correlation: `out.shape = input.shape - kernel.shape + 1`.
pub fn conv2d(input: &Tensor, kernel: &Tensor, out: &mut Tensor) -> Result<()> {
    input.expect_rank("conv2d", 2)?;
    kernel.expect_rank("conv2d", 2)?;
    out.expect_rank("conv2d", 2)?;
    let a = input.matrix()?;
    let k = kernel.matrix()?;
    let expected = valid_extent("conv2d", a.shape(), k.shape())?;
    if out.shape() != expected {
        return Err(Error::shape("conv2d", &expected, out.shape()));
    }
    if out.is_contiguous() {
        correlate(a, k, &mut out.data, false)?;
    } else {
        let mut plane = vec![0.0f32; out.size()];
        correlate(a, k, &mut plane, false)?;
        let targets: Vec<usize> = out.offsets().collect();
        for (dst, v) in targets.into_iter().zip(plane) {
            out.data[dst] = v;
        }
    }
    Ok(())
}

/// Multi-filter, channel-summed correlation.
///
/// `input` is `(C, H, W)`, `kernel` is `(F, C, kh, kw)` and `out` is
/// `(F, H - kh + 1, W - kw + 1)`. Filter `f` of the output is the sum over
/// channels `c` of `conv2d(input[c], kernel[f, c])`.
pub fn conv3d(input: &Tensor, kernel: &Tensor, out: &mut Tensor) -> Result<()> {
    input.expect_rank("conv3d", 3)?;
    kernel.expect_rank("conv3d", 4)?;
    out.expect_rank("conv3d", 3)?;
    let (channels, filters) = (input.shape()[0], kernel.shape()[0]);
    if kernel.shape()[1] != channels {
        return Err(Error::shape("conv3d", &[channels], &kernel.shape()[1..2]));
    }
    let spatial = valid_extent(
        "conv3d",
        [input.shape()[1], input.shape()[2]],
        [kernel.shape()[2], kernel.shape()[3]],
    )?;
    let expected = [filters, spatial[0], spatial[1]];
    if out.shape() != expected {
        return Err(Error::shape("conv3d", &expected, out.shape()));
    }
    for f in 0..filters {
        let plane = out.plane_mut(&[f])?;
        plane.fill(0.0);
        for c in 0..channels {
            correlate(input.plane(&[c])?, kernel.plane(&[f, c])?, plane, true)?;
        }
    }
    Ok(())
}
