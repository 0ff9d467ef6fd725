//! Borrowed rank-2 views with explicit strides.

use super::Tensor;

/// Zero-copy matrix view into a tensor's buffer.
///
/// Taking the transpose of a view only swaps its strides, so a layer can hand
/// `Wᵀ` or `xᵀ` straight to [`dot_views`](super::dot_views) without moving data
/// and without mutating the tensor it borrows from.
#[derive(Debug, Clone, Copy)]
pub struct MatrixView<'a> {
    data: &'a [f32],
    offset: usize,
    shape: [usize; 2],
    strides: [usize; 2],
}

impl<'a> MatrixView<'a> {
    pub(crate) fn new(data: &'a [f32], offset: usize, shape: [usize; 2], strides: [usize; 2]) -> Self {
        Self {
            data,
            offset,
            shape,
            strides,
        }
    }

    pub fn rows(&self) -> usize {
        self.shape[0]
    }

    pub fn cols(&self) -> usize {
        self.shape[1]
    }

    pub fn shape(&self) -> [usize; 2] {
        self.shape
    }

    /// Transposed view over the same buffer.
    pub fn t(self) -> Self {
        Self {
            data: self.data,
            offset: self.offset,
            shape: [self.shape[1], self.shape[0]],
            strides: [self.strides[1], self.strides[0]],
        }
    }

    #[inline]
    pub fn at(&self, row: usize, col: usize) -> f32 {
        self.data[self.offset + row * self.strides[0] + col * self.strides[1]]
    }

    /// Owned, contiguous copy of the viewed elements.
    pub fn to_tensor(&self) -> Tensor {
        let mut data = Vec::with_capacity(self.rows() * self.cols());
        for r in 0..self.rows() {
            for c in 0..self.cols() {
                data.push(self.at(r, c));
            }
        }
        Tensor {
            shape: vec![self.rows(), self.cols()],
            strides: vec![self.cols(), 1],
            data,
        }
    }
}
