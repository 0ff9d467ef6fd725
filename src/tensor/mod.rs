//! N-dimensional strided tensor.
//!
//! A [`Tensor`] owns a flat `f32` buffer together with its shape and
//! row-major strides. The strides are derived from the shape at creation;
//! [`Tensor::transpose`] swaps them in place without touching the buffer, and
//! every elementwise operation walks the tensor in *logical* order through the
//! strides, so a transposed tensor still behaves as its logical shape.
//!
//! Borrowed, zero-copy rank-2 access goes through [`MatrixView`], which is what
//! the matrix multiply and the convolution kernels consume. A view cannot
//! outlive the tensor it was taken from.
//!
//! # Example
//!
//! ```
//! use ndnet::tensor::{self, Tensor};
//!
//! let a = Tensor::from_vec(&[2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
//! let mut gram = Tensor::zeros(&[2, 2]);
//! tensor::dot_views(a.matrix().unwrap(), a.t().unwrap(), &mut gram).unwrap();
//! assert_eq!(gram.data(), &[14.0, 32.0, 32.0, 77.0]);
//! ```

mod conv;
mod ops;
mod view;

pub use conv::{conv2d, conv3d};
pub(crate) use conv::{correlate, full_correlate_accumulate};
pub(crate) use ops::map_with;
pub use ops::{
    add, add_assign, add_scalar, argmax, div, div_scalar, dot, dot_views, flip, max, mul,
    mul_scalar, normalize, normalize_inplace, pad, pad_view, scale, sub, sub_scalar, sum,
};
pub use view::MatrixView;

use crate::error::{Error, Result};
use crate::utils::rng::SimpleRng;
use std::fmt;

/// Dense, strided array of `f32` values.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    strides: Vec<usize>,
    data: Vec<f32>,
}

/// Row-major (C order) strides for `shape`.
pub(crate) fn row_major_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1usize; shape.len()];
    for i in (1..shape.len()).rev() {
        strides[i - 1] = strides[i] * shape[i];
    }
    strides
}

impl Tensor {
    /// Allocate a zero-filled tensor of the given shape.
    pub fn zeros(shape: &[usize]) -> Self {
        Self::filled(shape, 0.0)
    }

    /// Allocate a tensor with every element set to `value`.
    pub fn filled(shape: &[usize], value: f32) -> Self {
        let size = shape.iter().product();
        Self {
            shape: shape.to_vec(),
            strides: row_major_strides(shape),
            data: vec![value; size],
        }
    }

    /// Wrap an existing buffer; its length must equal the product of `shape`.
    pub fn from_vec(shape: &[usize], data: Vec<f32>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(Error::ElementCount {
                shape: shape.to_vec(),
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            shape: shape.to_vec(),
            strides: row_major_strides(shape),
            data,
        })
    }

    /// Column vector of shape `(values.len(), 1)`, the layout dense layers expect.
    pub fn column(values: &[f32]) -> Self {
        Self {
            shape: vec![values.len(), 1],
            strides: vec![1, 1],
            data: values.to_vec(),
        }
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Number of elements (product of the shape).
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Raw buffer in storage order.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Mutable raw buffer in storage order.
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// True when the strides are the row-major strides of the shape.
    pub fn is_contiguous(&self) -> bool {
        self.strides == row_major_strides(&self.shape)
    }

    /// True when any element is NaN.
    pub fn has_nan(&self) -> bool {
        self.data.iter().any(|v| v.is_nan())
    }

    pub(crate) fn expect_same_shape(&self, op: &'static str, other: &Tensor) -> Result<()> {
        if self.shape != other.shape {
            if self.rank() != other.rank() {
                return Err(Error::RankMismatch {
                    op,
                    expected: self.rank(),
                    got: other.rank(),
                });
            }
            return Err(Error::shape(op, &self.shape, &other.shape));
        }
        Ok(())
    }

    pub(crate) fn expect_rank(&self, op: &'static str, rank: usize) -> Result<()> {
        if self.rank() != rank {
            return Err(Error::RankMismatch {
                op,
                expected: rank,
                got: self.rank(),
            });
        }
        Ok(())
    }

    /// Buffer offset of a multi-dimensional index.
    pub fn offset_of(&self, index: &[usize]) -> Result<usize> {
        if index.len() != self.rank() {
            return Err(Error::RankMismatch {
                op: "index",
                expected: self.rank(),
                got: index.len(),
            });
        }
        let mut offset = 0;
        for ((&i, &extent), &stride) in index.iter().zip(&self.shape).zip(&self.strides) {
            if i >= extent {
                return Err(Error::shape("index", &self.shape, index));
            }
            offset += i * stride;
        }
        Ok(offset)
    }

    /// Element at a logical index.
    pub fn get(&self, index: &[usize]) -> Result<f32> {
        Ok(self.data[self.offset_of(index)?])
    }

    /// Overwrite the element at a logical index.
    pub fn set(&mut self, index: &[usize], value: f32) -> Result<()> {
        let offset = self.offset_of(index)?;
        self.data[offset] = value;
        Ok(())
    }

    pub fn fill(&mut self, value: f32) {
        self.data.iter_mut().for_each(|v| *v = value);
    }

    /// Fill with uniform samples in `[0, 1)`.
    pub fn randomize(&mut self, rng: &mut SimpleRng) {
        for value in &mut self.data {
            *value = rng.next_f32();
        }
    }

    /// He initialization: Gaussian samples scaled by `sqrt(2 / fan_in)`.
    ///
    /// Rank-2 tensors are dense weights `(outputs, inputs)` with
    /// `fan_in = inputs`; rank-4 tensors are convolution kernels
    /// `(filters, channels, kh, kw)` with `fan_in = channels * kh * kw`.
    pub fn he_initialize(&mut self, rng: &mut SimpleRng) -> Result<()> {
        let fan_in = match self.rank() {
            2 => self.shape[1],
            4 => self.shape[1] * self.shape[2] * self.shape[3],
            got => {
                return Err(Error::RankMismatch {
                    op: "he_initialize",
                    expected: 2,
                    got,
                })
            }
        };
        let scale = (2.0 / fan_in.max(1) as f32).sqrt();
        for value in &mut self.data {
            *value = scale * rng.next_gaussian();
        }
        Ok(())
    }

    /// Reinterpret the buffer with a new shape holding the same element count.
    ///
    /// Only contiguous tensors can be reshaped; a transposed tensor would need
    /// its elements moved first.
    pub fn reshape(&mut self, shape: &[usize]) -> Result<()> {
        let size: usize = shape.iter().product();
        if size != self.size() {
            return Err(Error::ElementCount {
                shape: shape.to_vec(),
                expected: size,
                got: self.size(),
            });
        }
        if !self.is_contiguous() {
            return Err(Error::shape("reshape", &row_major_strides(&self.shape), &self.strides));
        }
        self.shape = shape.to_vec();
        self.strides = row_major_strides(shape);
        Ok(())
    }

    /// Copy the logical contents of `src` (same shape) into `self`.
    pub fn copy_from(&mut self, src: &Tensor) -> Result<()> {
        src.expect_same_shape("copy", self)?;
        if self.strides == src.strides {
            self.data.copy_from_slice(&src.data);
        } else {
            let targets: Vec<usize> = self.offsets().collect();
            for (dst, from) in targets.into_iter().zip(src.offsets()) {
                self.data[dst] = src.data[from];
            }
        }
        Ok(())
    }

    /// Copy of the logical contents with fresh row-major strides.
    pub fn to_contiguous(&self) -> Tensor {
        let data = self.offsets().map(|o| self.data[o]).collect();
        Tensor {
            shape: self.shape.clone(),
            strides: row_major_strides(&self.shape),
            data,
        }
    }

    /// Transpose a rank-2 tensor in place by swapping shape and strides. O(1).
    pub fn transpose(&mut self) -> Result<()> {
        self.expect_rank("transpose", 2)?;
        self.shape.swap(0, 1);
        self.strides.swap(0, 1);
        Ok(())
    }

    /// Borrow a rank-2 tensor as a matrix view.
    pub fn matrix(&self) -> Result<MatrixView<'_>> {
        self.expect_rank("matrix", 2)?;
        Ok(MatrixView::new(
            &self.data,
            0,
            [self.shape[0], self.shape[1]],
            [self.strides[0], self.strides[1]],
        ))
    }

    /// Transposed view of a rank-2 tensor; the tensor itself is untouched.
    pub fn t(&self) -> Result<MatrixView<'_>> {
        Ok(self.matrix()?.t())
    }

    /// View of the trailing two dimensions at `outer` (one index per leading dimension).
    ///
    /// For a `(C, H, W)` tensor `plane(&[c])` is channel `c`; for a
    /// `(F, C, kh, kw)` kernel `plane(&[f, c])` is the `(f, c)` slice.
    pub fn plane(&self, outer: &[usize]) -> Result<MatrixView<'_>> {
        let offset = self.plane_offset(outer)?;
        let r = self.rank();
        Ok(MatrixView::new(
            &self.data,
            offset,
            [self.shape[r - 2], self.shape[r - 1]],
            [self.strides[r - 2], self.strides[r - 1]],
        ))
    }

    /// Mutable contiguous slice of the trailing two dimensions at `outer`.
    pub(crate) fn plane_mut(&mut self, outer: &[usize]) -> Result<&mut [f32]> {
        if !self.is_contiguous() {
            return Err(Error::shape("plane_mut", &row_major_strides(&self.shape), &self.strides));
        }
        let offset = self.plane_offset(outer)?;
        let r = self.rank();
        let len = self.shape[r - 2] * self.shape[r - 1];
        Ok(&mut self.data[offset..offset + len])
    }

    fn plane_offset(&self, outer: &[usize]) -> Result<usize> {
        if self.rank() < 2 || outer.len() != self.rank() - 2 {
            return Err(Error::RankMismatch {
                op: "plane",
                expected: outer.len() + 2,
                got: self.rank(),
            });
        }
        let mut offset = 0;
        for (axis, &i) in outer.iter().enumerate() {
            if i >= self.shape[axis] {
                return Err(Error::shape("plane", &self.shape[..outer.len()], outer));
            }
            offset += i * self.strides[axis];
        }
        Ok(offset)
    }

    /// Concatenate equally shaped tensors, in order, into `out`'s buffer.
    ///
    /// `out` must hold exactly `parts.len()` times the elements of one part.
    pub fn stack(parts: &[&Tensor], out: &mut Tensor) -> Result<()> {
        let Some(first) = parts.first() else {
            return Ok(());
        };
        for part in &parts[1..] {
            first.expect_same_shape("stack", part)?;
        }
        let expected = first.size() * parts.len();
        if out.size() != expected {
            return Err(Error::ElementCount {
                shape: out.shape.clone(),
                expected,
                got: out.size(),
            });
        }
        for (chunk, part) in out.data.chunks_exact_mut(first.size()).zip(parts) {
            for (dst, src) in chunk.iter_mut().zip(part.offsets()) {
                *dst = part.data[src];
            }
        }
        Ok(())
    }

    /// Buffer offsets of every element in logical row-major order.
    pub(crate) fn offsets(&self) -> Offsets<'_> {
        Offsets {
            shape: &self.shape,
            strides: &self.strides,
            index: vec![0; self.shape.len()],
            offset: 0,
            remaining: self.data.len(),
        }
    }
}

/// Iterator over buffer offsets in logical order, honouring the strides.
pub(crate) struct Offsets<'a> {
    shape: &'a [usize],
    strides: &'a [usize],
    index: Vec<usize>,
    offset: usize,
    remaining: usize,
}

impl Iterator for Offsets<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.offset;
        self.remaining -= 1;
        for axis in (0..self.shape.len()).rev() {
            self.index[axis] += 1;
            self.offset += self.strides[axis];
            if self.index[axis] < self.shape[axis] {
                break;
            }
            self.offset -= self.strides[axis] * self.shape[axis];
            self.index[axis] = 0;
        }
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl fmt::Display for Tensor {
    /// Shape and strides header, followed by the rows when the tensor is a matrix.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "tensor rank: {}, size: {}, shape: {:?}, strides: {:?}",
            self.rank(),
            self.size(),
            self.shape,
            self.strides
        )?;
        if let Ok(m) = self.matrix() {
            for r in 0..m.rows() {
                let row: Vec<String> = (0..m.cols()).map(|c| format!("{:.6}", m.at(r, c))).collect();
                writeln!(f, "{}", row.join(" "))?;
            }
        }
        Ok(())
    }
}
