//! Core tensor data structures.
//!
//! # Tensor Storage
//!
//! A [`Tensor`] is a shape plus a flat row-major buffer. The buffer lives behind an
//! [`Arc`], so cloning a tensor is free and several tensors may alias the same
//! memory. Writes go through [`Tensor::data_mut`], which detaches the buffer first
//! when it is shared (copy-on-write).
//!
//! This is what keeps autograd snapshots stable: a forward pass saves a clone of
//! its input without copying, and a later in-place edit of that input copies the
//! buffer instead of rewriting the snapshot.
//!
//! ## Example
//!
//! ```rust
//! use sphere_pad::tensors::Tensor;
//! let t = Tensor::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
//! assert_eq!(t.shape(), &[2, 3]);
//! ```

use std::sync::Arc;

use briny::prelude::*;

use crate::error::KernelError;

/// Represents an N-dimensional tensor with a shape and flat row-major data.
///
/// - `shape` defines the structure, e.g., `[2, 3]` for a 2×3 matrix.
/// - `data` holds the flattened content in row-major order, shared copy-on-write.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    shape: Vec<usize>,
    data: Arc<Vec<T>>,
}

/// The tensor type every kernel in this crate operates on.
pub type Ten64 = Tensor<f64>;

/// Unchecked shape/buffer pair, validated before it becomes a [`Tensor`].
struct PackedTensor<T> {
    shape: Vec<usize>,
    data: Vec<T>,
}

impl<T> Validate for PackedTensor<T> {
    fn validate(&self) -> Result<(), ValidationError> {
        let expected = self
            .shape
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
            .ok_or(ValidationError)?;
        if self.data.len() != expected {
            return Err(ValidationError);
        }
        Ok(())
    }
}

impl<T> Tensor<T> {
    /// Creates a new tensor with the given shape and flat data.
    ///
    /// # Panics
    /// Panics if the number of elements in `data` does not match the shape product.
    pub fn new(shape: impl Into<Vec<usize>>, data: Vec<T>) -> Self {
        let shape = shape.into();
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "shape {:?} is incompatible with {} data elements",
            shape,
            data.len()
        );
        Self {
            shape,
            data: Arc::new(data),
        }
    }

    /// Creates a new tensor, rejecting a buffer that does not fit the shape.
    ///
    /// # Errors
    /// Returns [`KernelError::Validation`] if the element count is wrong or the
    /// shape product overflows.
    pub fn try_new(shape: impl Into<Vec<usize>>, data: Vec<T>) -> Result<Self, KernelError> {
        let packed = TrustedData::new(PackedTensor {
            shape: shape.into(),
            data,
        })?
        .into_inner();
        Ok(Self {
            shape: packed.shape,
            data: Arc::new(packed.data),
        })
    }

    /// The dimensions of this tensor.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Flat, row-major view of the elements.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Whether both tensors currently point at the same buffer.
    pub fn shares_buffer_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Checks the buffer length against the shape.
    ///
    /// # Errors
    /// Returns [`KernelError::Validation`] when they disagree.
    pub fn check(&self) -> Result<(), KernelError> {
        let expected = self.shape.iter().product::<usize>();
        if expected == self.data.len() {
            Ok(())
        } else {
            Err(KernelError::Validation(ValidationError))
        }
    }
}

impl<T: Clone> Tensor<T> {
    /// Mutable access to the elements. Detaches the buffer if it is shared.
    pub fn data_mut(&mut self) -> &mut [T] {
        Arc::<Vec<T>>::make_mut(&mut self.data)
    }

    /// A tensor of the given shape filled with `value`.
    pub fn full(shape: impl Into<Vec<usize>>, value: T) -> Self {
        let shape = shape.into();
        let len = shape.iter().product::<usize>();
        Self {
            shape,
            data: Arc::new(vec![value; len]),
        }
    }
}

impl<T: Clone + Default> Tensor<T> {
    /// A tensor of the given shape filled with `T::default()`.
    pub fn zeros(shape: impl Into<Vec<usize>>) -> Self {
        Self::full(shape, T::default())
    }
}

impl Ten64 {
    /// Element-wise sum of two tensors of the same shape.
    ///
    /// # Errors
    /// Returns [`KernelError::ShapeMismatch`] if the shapes differ.
    pub fn add(&self, other: &Self) -> Result<Self, KernelError> {
        if self.shape != other.shape {
            return Err(KernelError::ShapeMismatch {
                expected: self.shape.clone(),
                actual: other.shape.clone(),
            });
        }
        let data = self.data.iter().zip(other.data.iter()).map(|(a, b)| a + b).collect();
        Ok(Self::new(self.shape.clone(), data))
    }

    /// Sum of the element-wise product, `<self, other>`.
    ///
    /// # Errors
    /// Returns [`KernelError::ShapeMismatch`] if the shapes differ.
    pub fn dot(&self, other: &Self) -> Result<f64, KernelError> {
        if self.shape != other.shape {
            return Err(KernelError::ShapeMismatch {
                expected: self.shape.clone(),
                actual: other.shape.clone(),
            });
        }
        Ok(self.data.iter().zip(other.data.iter()).map(|(a, b)| a * b).sum())
    }
}

/// Defines a tensor from nested literal arrays.
///
/// Supports arbitrary dimensionality as long as sublists are uniform in shape.
///
/// # Example
/// ```
/// use sphere_pad::tensor;
/// let t = tensor!([[1.0, 2.0], [3.0, 4.0]]);
/// assert_eq!(t.shape(), &[2, 2]);
/// ```
#[macro_export]
macro_rules! tensor {
    ($lit:literal) => {
        $crate::tensors::Tensor::new(Vec::<usize>::new(), vec![$lit])
    };

    ([ $( $x:literal ),+ $(,)? ]) => {{
        let children = vec![ $( $crate::tensor!($x) ),+ ];
        let first_shape = children[0].shape().to_vec();
        let mut shape = vec![children.len()];
        shape.extend_from_slice(&first_shape);
        let mut data = Vec::with_capacity(children.len() * children[0].numel());
        for c in &children { data.extend_from_slice(c.data()); }
        $crate::tensors::Tensor::new(shape, data)
    }};

    ([ $( $inner:tt ),+ $(,)? ]) => {{
        let children = vec![ $( $crate::tensor!($inner) ),+ ];
        let first_shape = children[0].shape().to_vec();
        assert!(children.iter().all(|c| c.shape() == first_shape.as_slice()),
            "ragged tensor literal (rows have mismatched shapes)");
        let mut shape = vec![children.len()];
        shape.extend_from_slice(&first_shape);
        let mut data = Vec::with_capacity(children.len() * children[0].numel());
        for c in &children { data.extend_from_slice(c.data()); }
        $crate::tensors::Tensor::new(shape, data)
    }};
}
