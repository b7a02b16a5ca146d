//! Differentiable operator kernels.
//!
//! CPU implementations of the operators used to assemble test networks. Each
//! operation follows a uniform autograd pattern:
//!
//! 1. **Inputs** are tensor references.
//! 2. **Forward pass** computes an output tensor (or scalar, for reductions).
//! 3. **Backward pass** returns a closure capturing minimal cloned data which
//!    maps `dL/d(out)` to gradients for each input.
//!
//! ## Implemented Ops
//!
//! - `add`: Elementwise addition
//! - `scale`: Multiplication by a fixed scalar
//! - `sigmoid`: Elementwise logistic activation
//! - `fully_connected`: `m×k · k×n` matrix product without bias
//! - `mean`: Scalar mean reduction
//!
//! ## Usage Guidelines
//!
//! - Operations **panic** on shape mismatches; ensure consistent dimensions.
//! - The backward closures implement `Fn`, allowing multiple invocations.
//! - `fully_connected` parallelizes over output rows with `rayon`; the
//!   elementwise kernels run serially (they are memory-bound at these sizes).

use rayon::prelude::*;

use crate::tensors::{Ten32, Tensor};

/// Adds two tensors element-wise, returning result and backprop function.
///
/// # Panics
/// Panics if shapes do not match.
///
/// # Returns
/// - Output tensor
/// - Closure that computes gradients for both inputs given `dL/dout`
pub fn add(a: &Ten32, b: &Ten32) -> (Ten32, impl Fn(&Ten32) -> (Ten32, Ten32) + use<>) {
    assert_eq!(a.shape, b.shape, "add shape mismatch");

    let out = Tensor::new(
        a.shape.clone(),
        a.data.iter().zip(&b.data).map(|(x, y)| x + y).collect(),
    );

    let a_shape = a.shape.clone();
    let b_shape = b.shape.clone();

    let back = move |grad_output: &Ten32| {
        (
            Tensor::new(a_shape.clone(), grad_output.data.clone()),
            Tensor::new(b_shape.clone(), grad_output.data.clone()),
        )
    };

    (out, back)
}

/// Multiplies a tensor by a fixed scalar `k`, with backward pass.
///
/// The scalar is an attribute, not a differentiable input: the backward
/// closure only produces `dL/dx = k · dL/dout`.
pub fn scale(x: &Ten32, k: f32) -> (Ten32, impl Fn(&Ten32) -> Ten32 + use<>) {
    let out = Tensor::new(x.shape.clone(), x.data.iter().map(|v| v * k).collect());

    let shape = x.shape.clone();
    let back = move |grad_output: &Ten32| {
        Tensor::new(shape.clone(), grad_output.data.iter().map(|g| g * k).collect())
    };

    (out, back)
}

/// Applies the logistic sigmoid `1 / (1 + e^(-x))` element-wise.
///
/// # Returns
/// - Output tensor of same shape
/// - Closure propagating upstream gradients through `y · (1 − y)`
pub fn sigmoid(x: &Ten32) -> (Ten32, impl Fn(&Ten32) -> Ten32 + use<>) {
    let out = Tensor::new(
        x.shape.clone(),
        x.data.iter().map(|&v| 1.0 / (1.0 + (-v).exp())).collect(),
    );

    let shape = x.shape.clone();
    let y = out.data.clone();

    let back = move |grad_output: &Ten32| {
        let grad: Vec<f32> = y
            .iter()
            .zip(&grad_output.data)
            .map(|(&y_i, &g)| g * y_i * (1.0 - y_i))
            .collect();
        Tensor::new(shape.clone(), grad)
    };

    (out, back)
}

/// Performs a fully-connected projection `out = x · w` on 2D tensors
/// (`x: m×k`, `w: k×n`), returning the result and a backprop closure.
///
/// No bias term; `w` is the only parameter.
///
/// # Returns
/// - Output tensor of shape `[m, n]`
/// - Closure that given `dL/d(out)` returns `(dL/dx, dL/dw)`
///
/// # Panics
/// Panics if either input is not 2D or the inner dimensions do not match.
///
/// # Performance
/// Forward pass parallelizes over output rows with `rayon`.
pub fn fully_connected(x: &Ten32, w: &Ten32) -> (Ten32, impl Fn(&Ten32) -> (Ten32, Ten32) + use<>) {
    assert_eq!(x.shape.len(), 2, "fully_connected input must be 2D");
    assert_eq!(w.shape.len(), 2, "fully_connected weight must be 2D");
    let m = x.shape[0];
    let k = x.shape[1];
    let n = w.shape[1];
    assert_eq!(k, w.shape[0], "fully_connected shape mismatch");

    let x_data = &x.data;
    let w_data = &w.data;

    let mut out_data = vec![0.0f32; m * n];
    out_data.par_chunks_mut(n).enumerate().for_each(|(i, row)| {
        for (j, slot) in row.iter_mut().enumerate() {
            let mut sum = 0.0;
            for l in 0..k {
                sum += x_data[i * k + l] * w_data[l * n + j];
            }
            *slot = sum;
        }
    });

    let out = Tensor::new(vec![m, n], out_data);

    let x_val = x.clone();
    let w_val = w.clone();

    let back = move |grad: &Ten32| {
        assert_eq!(grad.shape, vec![m, n], "fully_connected grad shape mismatch");

        // dx = grad · wᵀ  (m×n · n×k)
        let mut dx = vec![0.0f32; m * k];
        for i in 0..m {
            for l in 0..k {
                let mut sum = 0.0;
                for j in 0..n {
                    sum += grad.data[i * n + j] * w_val.data[l * n + j];
                }
                dx[i * k + l] = sum;
            }
        }

        // dw = xᵀ · grad  (k×m · m×n)
        let mut dw = vec![0.0f32; k * n];
        for l in 0..k {
            for j in 0..n {
                let mut sum = 0.0;
                for i in 0..m {
                    sum += x_val.data[i * k + l] * grad.data[i * n + j];
                }
                dw[l * n + j] = sum;
            }
        }

        (Tensor::new(vec![m, k], dx), Tensor::new(vec![k, n], dw))
    };

    (out, back)
}

/// Computes the mean of all elements, returning the scalar and a gradient
/// function.
///
/// # Returns
/// - Scalar mean `f32`
/// - Closure mapping upstream scalar gradient `dL` to a tensor of `x`'s shape
///   where every element is `dL / n`
///
/// # Panics
/// Panics on an empty tensor.
pub fn mean(x: &Ten32) -> (f32, impl Fn(f32) -> Ten32 + use<>) {
    let n = x.numel();
    assert!(n > 0, "mean of empty tensor");

    // serial sum: the reduction order must not vary between evaluations, or
    // finite-difference probes of unrelated inputs pick up association noise
    let sum: f32 = x.data.iter().sum();
    let value = sum / n as f32;

    let shape = x.shape.clone();
    let back = move |grad_output: f32| {
        Tensor::new(shape.clone(), vec![grad_output / n as f32; n])
    };

    (value, back)
}
