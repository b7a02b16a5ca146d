//! Core tensor data structures.
//!
//! Defines the dense N-dimensional array used throughout the crate and the
//! named-tensor mapping that feeds operators and the gradient verifier.
//!
//! It supports:
//! - Construction of N-dimensional tensors with shape and row-major data layout
//! - Zero-filled construction matching an existing shape
//! - Leading-axis subtensor reads and writes (used by the recurrent construct
//!   to thread per-step slices)
//! - Compile-time tensor macros
//!
//! ## Design Highlights
//! - Tensors are strongly typed: `Tensor<T>` for any element type; the crate's
//!   working alias is [`Ten32`] (`f32` elements)
//! - Shape is stored as a `Vec<usize>` and enforced at runtime
//! - The named mapping is a `BTreeMap`, so iteration order (and therefore any
//!   gradient report) is deterministic
//!
//! ## Limitations
//! - Row-major only
//! - No broadcasting or shape inference
//!
//! ## Example
//!
//! ```rust
//! use numgrad::tensors::Tensor;
//! let t = Tensor::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
//! assert_eq!(t.shape, vec![2, 3]);
//! ```

use std::collections::BTreeMap;

/// Represents an N-dimensional tensor with a shape and flat row-major data.
///
/// - All elements must be the same type (`T`).
/// - `shape` defines the structure, e.g., `[2, 3]` for a 2×3 matrix.
/// - `data` holds the flattened content in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    pub shape: Vec<usize>,
    pub data: Vec<T>,
}

/// The crate's working tensor type: 32-bit float elements.
pub type Ten32 = Tensor<f32>;

/// Mapping from input name to tensor value.
///
/// Used both as "inputs to perturb" during numeric gradient estimation and as
/// the container for per-input gradient results. `BTreeMap` keeps iteration
/// order stable across runs.
pub type TensorMap = BTreeMap<String, Ten32>;

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
        Self { shape, data }
    }

    /// Total number of scalar elements.
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }
}

impl Tensor<f32> {
    /// Creates a zero-filled tensor of the given shape.
    pub fn zeros(shape: impl Into<Vec<usize>>) -> Self {
        let shape = shape.into();
        let len = shape.iter().product();
        Self { shape, data: vec![0.0; len] }
    }

    /// Creates a zero-filled tensor with this tensor's shape.
    pub fn zeros_like(&self) -> Self {
        Self::zeros(self.shape.clone())
    }

    /// Returns the subtensor at index `i` along the leading axis.
    ///
    /// For a `[s, b, d]` tensor this yields the `[b, d]` slice at step `i`.
    ///
    /// # Panics
    /// Panics on a rank-0 tensor or if `i` is out of range.
    pub fn subtensor(&self, i: usize) -> Self {
        assert!(!self.shape.is_empty(), "subtensor on rank-0 tensor");
        let outer = self.shape[0];
        assert!(i < outer, "index {i} out of range for leading axis {outer}");
        let inner: usize = self.shape[1..].iter().product();
        Self {
            shape: self.shape[1..].to_vec(),
            data: self.data[i * inner..(i + 1) * inner].to_vec(),
        }
    }

    /// Overwrites the subtensor at index `i` along the leading axis.
    ///
    /// # Panics
    /// Panics if `value`'s shape does not match the trailing dimensions.
    pub fn set_subtensor(&mut self, i: usize, value: &Self) {
        assert_eq!(
            value.shape,
            &self.shape[1..],
            "subtensor shape mismatch at leading index {i}"
        );
        let inner = value.data.len();
        self.data[i * inner..(i + 1) * inner].copy_from_slice(&value.data);
    }
}

/// Accumulates `src` into the map entry for `name`, element-wise.
///
/// Inserts a clone of `src` when the entry is absent; otherwise shapes must
/// match.
///
/// # Panics
/// Panics if an existing entry's shape differs from `src`.
pub fn accumulate(map: &mut TensorMap, name: &str, src: &Ten32) {
    match map.get_mut(name) {
        Some(dst) => {
            assert_eq!(dst.shape, src.shape, "gradient shape mismatch for '{name}'");
            for (d, s) in dst.data.iter_mut().zip(&src.data) {
                *d += *s;
            }
        }
        None => {
            map.insert(name.to_string(), src.clone());
        }
    }
}

/// Defines a tensor from nested literal arrays.
///
/// Supports arbitrary dimensionality as long as sublists are uniform in shape.
///
/// # Example
/// ```
/// use numgrad::tensor;
/// let t = tensor!([[1.0, 2.0], [3.0, 4.0]]);
/// assert_eq!(t.shape, vec![2, 2]);
/// ```
#[macro_export]
macro_rules! tensor {
    ($lit:literal) => {
        $crate::tensors::Tensor::new(Vec::<usize>::new(), vec![$lit])
    };

    (- $lit:literal) => {
        $crate::tensors::Tensor::new(Vec::<usize>::new(), vec![- $lit])
    };

    ([ $( $elems:tt )+ ]) => {{
        let children = $crate::tensor_elems!([] $( $elems )+);
        let first_shape = &children[0].shape;
        assert!(children.iter().all(|c| c.shape == *first_shape),
            "ragged tensor literal (rows have mismatched shapes)");
        let mut shape = vec![children.len()];
        shape.extend_from_slice(first_shape);
        let mut data = Vec::with_capacity(children.len() * children[0].data.len());
        for c in children { data.extend(c.data); }
        $crate::tensors::Tensor::new(shape, data)
    }};
}

/// Internal helper for [`tensor!`]: splits a bracketed element list into
/// per-element `tensor!` calls, handling negative literals (`-` and the
/// number are separate token trees, so a plain comma-separated `tt`
/// repetition cannot capture them).
#[doc(hidden)]
#[macro_export]
macro_rules! tensor_elems {
    ([ $( $acc:expr ),* ]) => {
        vec![ $( $acc ),* ]
    };
    ([ $( $acc:expr ),* ] , $( $rest:tt )*) => {
        $crate::tensor_elems!([ $( $acc ),* ] $( $rest )*)
    };
    ([ $( $acc:expr ),* ] - $lit:literal $( $rest:tt )*) => {
        $crate::tensor_elems!([ $( $acc, )* $crate::tensor!(- $lit) ] $( $rest )*)
    };
    ([ $( $acc:expr ),* ] $lit:literal $( $rest:tt )*) => {
        $crate::tensor_elems!([ $( $acc, )* $crate::tensor!($lit) ] $( $rest )*)
    };
    ([ $( $acc:expr ),* ] [ $( $inner:tt )* ] $( $rest:tt )*) => {
        $crate::tensor_elems!([ $( $acc, )* $crate::tensor!([ $( $inner )* ]) ] $( $rest )*)
    };
}
