//! Shape-insertion reshape operator and its inverse.
//!
//! `unsqueeze` inserts size-1 dimensions into a tensor's shape at the
//! requested axes; `squeeze` removes the dimensions the same axis list would
//! have inserted. Both are pure reshapes: the flat row-major data is carried
//! over unchanged, only the shape metadata differs.
//!
//! ## Axis semantics
//!
//! Axes are applied *sequentially*. Each axis may be negative, in which case
//! it is normalized against the rank of the partially-built output plus one
//! (`axis + rank + 1`), then a size-1 dimension is inserted at that position
//! and the rank grows by one. This makes duplicated and out-of-order axes
//! well-defined:
//!
//! - `(3, 5)` with axes `(1, 2)` → `(3, 1, 1, 5)`
//! - `(3, 5)` with axes `(-1,)` → `(3, 5, 1)`
//! - `(3, 2, 5)` with axes `(0, 3, 3)` → `(1, 3, 2, 1, 1, 5)`
//! - `(3, 2, 5)` with axes `(3, 1, 1)` → `(3, 1, 1, 2, 5, 1)`

use crate::tensors::{Ten32, Tensor};

/// Resolves the final positions of the inserted size-1 dimensions.
///
/// Applies the axes one at a time against a rank-`in_rank` shape, shifting
/// previously inserted positions right whenever a later insertion lands at or
/// before them. The returned positions index into the final output shape and
/// are always distinct.
///
/// # Panics
/// Panics if any axis, after normalization, falls outside the current rank.
fn insertion_positions(in_rank: usize, axes: &[isize]) -> Vec<usize> {
    let mut positions: Vec<usize> = Vec::with_capacity(axes.len());
    let mut rank = in_rank;
    for &axis in axes {
        let cur = if axis < 0 { axis + rank as isize + 1 } else { axis };
        assert!(
            (0..=rank as isize).contains(&cur),
            "unsqueeze axis {axis} out of range for rank {rank}"
        );
        let cur = cur as usize;
        for p in positions.iter_mut() {
            if *p >= cur {
                *p += 1;
            }
        }
        positions.push(cur);
        rank += 1;
    }
    positions
}

/// Computes the output shape of `unsqueeze` without touching any data.
pub fn unsqueeze_shape(shape: &[usize], axes: &[isize]) -> Vec<usize> {
    let positions = insertion_positions(shape.len(), axes);
    let out_rank = shape.len() + axes.len();
    let mut out = vec![0usize; out_rank];
    for &p in &positions {
        out[p] = 1;
    }
    let mut dims = shape.iter();
    for slot in out.iter_mut() {
        if *slot == 0 {
            *slot = *dims.next().unwrap();
        }
    }
    out
}

/// Inserts size-1 dimensions at the given axes.
///
/// A pure reshape: element values are unchanged and keep their flattened
/// order. The backward closure reshapes the upstream gradient back to the
/// input shape.
///
/// # Panics
/// Panics if any axis is out of range, or (in the backward closure) if the
/// upstream gradient's shape differs from the output shape.
pub fn unsqueeze(x: &Ten32, axes: &[isize]) -> (Ten32, impl Fn(&Ten32) -> Ten32) {
    let out_shape = unsqueeze_shape(&x.shape, axes);
    let out = Tensor::new(out_shape.clone(), x.data.clone());

    let in_shape = x.shape.clone();
    let back = move |grad_output: &Ten32| {
        assert_eq!(grad_output.shape, out_shape, "unsqueeze grad shape mismatch");
        Tensor::new(in_shape.clone(), grad_output.data.clone())
    };

    (out, back)
}

/// Removes the size-1 dimensions that `unsqueeze` with the same axes inserted.
///
/// `squeeze(unsqueeze(x, axes).0, axes)` recovers `x`'s shape and values.
///
/// # Panics
/// Panics if the tensor's rank is smaller than the axis count, if any axis is
/// out of range, or if any targeted dimension is not 1.
pub fn squeeze(x: &Ten32, axes: &[isize]) -> (Ten32, impl Fn(&Ten32) -> Ten32) {
    assert!(
        x.shape.len() >= axes.len(),
        "squeeze axis count {} exceeds tensor rank {}",
        axes.len(),
        x.shape.len()
    );
    let positions = insertion_positions(x.shape.len() - axes.len(), axes);
    for &p in &positions {
        assert_eq!(x.shape[p], 1, "squeeze target axis {p} has size {}", x.shape[p]);
    }

    let out_shape: Vec<usize> = x
        .shape
        .iter()
        .enumerate()
        .filter(|(i, _)| !positions.contains(i))
        .map(|(_, &d)| d)
        .collect();
    let out = Tensor::new(out_shape.clone(), x.data.clone());

    let in_shape = x.shape.clone();
    let back = move |grad_output: &Ten32| {
        assert_eq!(grad_output.shape, out_shape, "squeeze grad shape mismatch");
        Tensor::new(in_shape.clone(), grad_output.data.clone())
    };

    (out, back)
}
