//! Elementwise arithmetic, reductions and matrix operations.
//!
//! Every binary operation requires identical shapes (no broadcasting) and
//! writes into a caller-supplied output of the same shape.

use super::{MatrixView, Tensor};
use crate::error::{Error, Result};

/// Stabilizer added to the sum before normalizing.
const NORMALIZE_EPSILON: f32 = 1e-7;

fn zip_with(
    op: &'static str,
    a: &Tensor,
    b: &Tensor,
    out: &mut Tensor,
    f: impl Fn(f32, f32) -> f32,
) -> Result<()> {
    a.expect_same_shape(op, b)?;
    a.expect_same_shape(op, out)?;
    if a.strides == b.strides && a.strides == out.strides {
        for ((o, &x), &y) in out.data.iter_mut().zip(&a.data).zip(&b.data) {
            *o = f(x, y);
        }
    } else {
        let targets: Vec<usize> = out.offsets().collect();
        for ((dst, ia), ib) in targets.into_iter().zip(a.offsets()).zip(b.offsets()) {
            out.data[dst] = f(a.data[ia], b.data[ib]);
        }
    }
    Ok(())
}

pub(crate) fn map_with(op: &'static str, a: &Tensor, out: &mut Tensor, f: impl Fn(f32) -> f32) -> Result<()> {
    a.expect_same_shape(op, out)?;
    if a.strides == out.strides {
        for (o, &x) in out.data.iter_mut().zip(&a.data) {
            *o = f(x);
        }
    } else {
        let targets: Vec<usize> = out.offsets().collect();
        for (dst, ia) in targets.into_iter().zip(a.offsets()) {
            out.data[dst] = f(a.data[ia]);
        }
    }
    Ok(())
}

/// `out = a + b`
pub fn add(a: &Tensor, b: &Tensor, out: &mut Tensor) -> Result<()> {
    zip_with("add", a, b, out, |x, y| x + y)
}

/// `out = a - b`
pub fn sub(a: &Tensor, b: &Tensor, out: &mut Tensor) -> Result<()> {
    zip_with("sub", a, b, out, |x, y| x - y)
}

/// `out = a * b` (elementwise)
pub fn mul(a: &Tensor, b: &Tensor, out: &mut Tensor) -> Result<()> {
    zip_with("mul", a, b, out, |x, y| x * y)
}

/// `out = a / b` (elementwise)
pub fn div(a: &Tensor, b: &Tensor, out: &mut Tensor) -> Result<()> {
    zip_with("div", a, b, out, |x, y| x / y)
}

pub fn add_scalar(a: &Tensor, b: f32, out: &mut Tensor) -> Result<()> {
    map_with("add_scalar", a, out, |x| x + b)
}

pub fn sub_scalar(a: &Tensor, b: f32, out: &mut Tensor) -> Result<()> {
    map_with("sub_scalar", a, out, |x| x - b)
}

pub fn mul_scalar(a: &Tensor, b: f32, out: &mut Tensor) -> Result<()> {
    map_with("mul_scalar", a, out, |x| x * b)
}

pub fn div_scalar(a: &Tensor, b: f32, out: &mut Tensor) -> Result<()> {
    map_with("div_scalar", a, out, |x| x / b)
}

/// `acc += b`, the accumulating form of [`add`].
pub fn add_assign(acc: &mut Tensor, b: &Tensor) -> Result<()> {
    b.expect_same_shape("add_assign", acc)?;
    if acc.strides == b.strides {
        for (x, &y) in acc.data.iter_mut().zip(&b.data) {
            *x += y;
        }
    } else {
        let targets: Vec<usize> = acc.offsets().collect();
        for (dst, ib) in targets.into_iter().zip(b.offsets()) {
            acc.data[dst] += b.data[ib];
        }
    }
    Ok(())
}

/// Multiply every element by `factor` in place.
pub fn scale(a: &mut Tensor, factor: f32) {
    a.data.iter_mut().for_each(|v| *v *= factor);
}

/// Sum of all elements in buffer order.
pub fn sum(a: &Tensor) -> f32 {
    a.data.iter().sum()
}

/// Largest element; `-inf` for an empty tensor.
pub fn max(a: &Tensor) -> f32 {
    a.data.iter().copied().fold(f32::NEG_INFINITY, |m, v| if v > m { v } else { m })
}

/// Buffer index of the first element attaining the maximum.
pub fn argmax(a: &Tensor) -> usize {
    let mut best = 0;
    for (i, &v) in a.data.iter().enumerate().skip(1) {
        if v > a.data[best] {
            best = i;
        }
    }
    best
}

/// `out = a / (sum(a) + 1e-7)`.
///
/// A NaN anywhere in the result means the distribution was invalid upstream
/// (for instance an overflowed exponent) and is reported instead of masked.
pub fn normalize(a: &Tensor, out: &mut Tensor) -> Result<()> {
    out.copy_from(a)?;
    normalize_inplace(out)
}

/// In-place form of [`normalize`].
pub fn normalize_inplace(a: &mut Tensor) -> Result<()> {
    let total = sum(a) + NORMALIZE_EPSILON;
    if total == 0.0 {
        return Err(Error::NumericalInvalid {
            op: "normalize",
            detail: "sum of elements is zero".to_string(),
        });
    }
    for (i, v) in a.data.iter_mut().enumerate() {
        *v /= total;
        if v.is_nan() {
            return Err(Error::NumericalInvalid {
                op: "normalize",
                detail: format!("NaN at index {} (sum = {})", i, total),
            });
        }
    }
    Ok(())
}

/// Matrix multiply of two rank-2 tensors: `out = a · b`.
pub fn dot(a: &Tensor, b: &Tensor, out: &mut Tensor) -> Result<()> {
    dot_views(a.matrix()?, b.matrix()?, out)
}

/// Matrix multiply on views, so transposed operands need no copy.
///
/// `out` must have shape `(a.rows, b.cols)`; it is written through its own
/// strides and may itself be transposed in place.
pub fn dot_views(a: MatrixView<'_>, b: MatrixView<'_>, out: &mut Tensor) -> Result<()> {
    out.expect_rank("dot", 2)?;
    if a.cols() != b.rows() {
        return Err(Error::shape("dot", &[a.cols()], &[b.rows()]));
    }
    let expected = [a.rows(), b.cols()];
    if out.shape[..] != expected[..] {
        return Err(Error::shape("dot", &expected, &out.shape));
    }
    let (rs, cs) = (out.strides[0], out.strides[1]);
    for i in 0..a.rows() {
        for j in 0..b.cols() {
            let mut acc = 0.0f32;
            for k in 0..a.cols() {
                acc += a.at(i, k) * b.at(k, j);
            }
            out.data[i * rs + j * cs] = acc;
        }
    }
    Ok(())
}

/// Rotate a rank-2 tensor by 180 degrees in place.
///
/// Reversing the whole buffer reverses both axes whatever the stride order,
/// so this is correct for transposed tensors too.
pub fn flip(a: &mut Tensor) -> Result<()> {
    a.expect_rank("flip", 2)?;
    a.data.reverse();
    Ok(())
}

/// Copy `a` into the interior of `out`, leaving a `pad`-wide border.
///
/// The border is not written: pass a freshly zeroed destination.
pub fn pad(a: &Tensor, pad: usize, out: &mut Tensor) -> Result<()> {
    pad_view(a.matrix()?, pad, out)
}

/// [`pad`] for a borrowed source view.
pub fn pad_view(a: MatrixView<'_>, pad: usize, out: &mut Tensor) -> Result<()> {
    out.expect_rank("pad", 2)?;
    let expected = [a.rows() + 2 * pad, a.cols() + 2 * pad];
    if out.shape[..] != expected[..] {
        return Err(Error::shape("pad", &expected, &out.shape));
    }
    let (rs, cs) = (out.strides[0], out.strides[1]);
    for r in 0..a.rows() {
        for c in 0..a.cols() {
            out.data[(r + pad) * rs + (c + pad) * cs] = a.at(r, c);
        }
    }
    Ok(())
}
