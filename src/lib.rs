//! numgrad: tensor operators with closure-based backprop and numeric gradient checking.
//!
//! Provides a small CPU tensor engine where every differentiable operator
//! returns its output together with a backward closure, plus a
//! finite-difference gradient verifier for validating those closures.
//!
//! # Features
//!
//! - Multi-dimensional `f32` tensors with shape-checked construction.
//! - Differentiable kernels (add, scale, sigmoid, fully-connected, mean)
//!   following a uniform `(output, back)` pattern.
//! - An unsqueeze/squeeze reshape operator with sequential axis insertion,
//!   including negative, duplicated, and out-of-order axes.
//! - A static recurrent construct threading named memory state across a
//!   fixed-length sequence dimension, with backprop through time.
//! - A symmetric finite-difference gradient estimator and a relative-tolerance
//!   comparison against analytic gradients.
//!
//! # Modules
//!
//! - [`tensors`] — Core tensor data structure and the named-tensor mapping.
//! - [`ops`] — Differentiable operator kernels with backward closures.
//! - [`unsqueeze`] — Shape-insertion reshape operator and its inverse.
//! - [`rnn`] — Static recurrent construct with explicit memory threading.
//! - [`gradcheck`] — Numeric gradient estimation and comparison policy.
//!
//! # Example
//!
//! ```rust
//! use numgrad::tensors::Tensor;
//! use numgrad::unsqueeze::unsqueeze;
//!
//! let x = Tensor::new(vec![3, 5], vec![1.0; 15]);
//! let (y, _back) = unsqueeze(&x, &[1, 2]);
//! assert_eq!(y.shape, vec![3, 1, 1, 5]);
//! ```

pub mod tensors;
pub mod ops;
pub mod unsqueeze;
pub mod rnn;
pub mod gradcheck;
