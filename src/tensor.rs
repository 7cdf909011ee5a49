//! Dense Matrices for Embedding Tables
//!
//! word2vec only ever needs two kinds of tensors: `[vocab, dim]` embedding
//! tables and `[dim]` vectors. This module keeps a flat row-major `Vec<f32>`
//! with a shape, plus the handful of row operations the model and optimizer use.
//!
//! ## Memory Layout
//!
//! For shape `[3, 2]`, data is stored row after row:
//!
//! ```text
//! [r0c0, r0c1, r1c0, r1c1, r2c0, r2c1]
//!  └─ row 0 ─┘ └─ row 1 ─┘ └─ row 2 ─┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use skipgram::Tensor;
//!
//! let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![3, 2]);
//! assert_eq!(t.row(1), &[3.0, 4.0]);
//! assert_eq!(skipgram::tensor::dot(t.row(0), t.row(2)), 17.0);
//! ```

use rand::Rng;

/// A row-major array of `f32`
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    /// Flat storage of all elements
    pub data: Vec<f32>,
    /// Dimensions, outermost first
    pub shape: Vec<usize>,
}

impl Tensor {
    /// Create a tensor from data and shape
    ///
    /// # Panics
    ///
    /// Panics if the product of the shape doesn't equal the data length
    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Self {
        let expected_size: usize = shape.iter().product();
        assert_eq!(
            data.len(),
            expected_size,
            "Data length ({}) doesn't match shape {:?} (expected {})",
            data.len(),
            shape,
            expected_size
        );
        Self { data, shape }
    }

    /// Create a tensor filled with zeros
    pub fn zeros(shape: Vec<usize>) -> Self {
        let size: usize = shape.iter().product();
        Self::new(vec![0.0; size], shape)
    }

    /// Create a tensor with entries drawn uniformly from `[-scale, scale]`
    ///
    /// # Panics
    ///
    /// Panics if `scale` is negative or not finite
    pub fn uniform<R: Rng + ?Sized>(shape: Vec<usize>, scale: f32, rng: &mut R) -> Self {
        let size: usize = shape.iter().product();
        let data = (0..size).map(|_| rng.random_range(-scale..=scale)).collect();
        Self::new(data, shape)
    }

    /// Number of rows (first dimension)
    pub fn rows(&self) -> usize {
        self.shape[0]
    }

    /// Length of one row (product of the remaining dimensions)
    pub fn cols(&self) -> usize {
        self.shape[1..].iter().product()
    }

    pub fn row(&self, i: usize) -> &[f32] {
        let cols = self.cols();
        &self.data[i * cols..(i + 1) * cols]
    }

    pub fn row_mut(&mut self, i: usize) -> &mut [f32] {
        let cols = self.cols();
        &mut self.data[i * cols..(i + 1) * cols]
    }

    /// Add `alpha * x` to row `i`
    pub fn add_to_row(&mut self, i: usize, alpha: f32, x: &[f32]) {
        axpy(alpha, x, self.row_mut(i));
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Sum of squares of all elements
    pub fn sum_sq(&self) -> f32 {
        self.data.iter().map(|&v| v * v).sum()
    }
}

/// Inner product of two equally sized slices
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// `y += alpha * x`
pub fn axpy(alpha: f32, x: &[f32], y: &mut [f32]) {
    debug_assert_eq!(x.len(), y.len());
    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi += alpha * xi;
    }
}

/// Euclidean norm
pub fn norm(a: &[f32]) -> f32 {
    dot(a, a).sqrt()
}
