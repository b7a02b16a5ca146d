//! Numeric gradient estimation and comparison policy.
//!
//! Validates analytic (backward-closure) gradients against symmetric
//! finite-difference estimates:
//!
//! ```text
//! grad[i] = (f(x with x_i + δ) − f(x with x_i − δ)) / (2δ)
//! ```
//!
//! Every element of every requested input is perturbed independently, with the
//! original value restored after each probe, so a single mutable input mapping
//! is reused for the whole sweep. This costs two forward evaluations per
//! scalar element — intentionally slow, for correctness checking only.
//!
//! Comparison accepts two gradients when every element satisfies
//! `|numeric − analytic| ≤ rtol · max(|numeric|, |analytic|)`. The default
//! `rtol` is deliberately loose; finite differences are noisy in `f32`.
//! Shape mismatch is always a hard failure.

use crate::tensors::{Ten32, TensorMap, Tensor};

/// Default relative tolerance for gradient comparison.
pub const DEFAULT_RTOL: f32 = 0.1;

/// Default perturbation step for finite differences.
pub const DEFAULT_DELTA: f32 = 5e-3;

fn poke(inputs: &mut TensorMap, name: &str, i: usize, v: f32) {
    match inputs.get_mut(name) {
        Some(t) => t.data[i] = v,
        None => panic!("no input named '{name}'"),
    }
}

/// Estimates the gradient of a scalar-valued function via central differences.
///
/// For each name in `names`, produces a tensor of the same shape as
/// `inputs[name]` holding `∂f/∂element`. Inputs are perturbed in place and
/// restored after every probe, so `inputs` is unchanged on return.
///
/// # Panics
/// Panics if `delta` is not positive or a requested name is absent from
/// `inputs`.
pub fn numeric_gradient<F>(
    forward: &mut F,
    inputs: &mut TensorMap,
    names: &[&str],
    delta: f32,
) -> TensorMap
where
    F: FnMut(&TensorMap) -> f32,
{
    assert!(delta > 0.0, "perturbation delta must be positive, got {delta}");

    let mut grads = TensorMap::new();
    for &name in names {
        let shape = match inputs.get(name) {
            Some(t) => t.shape.clone(),
            None => panic!("no input named '{name}'"),
        };
        let numel: usize = shape.iter().product();

        let mut grad = vec![0.0f32; numel];
        for (i, slot) in grad.iter_mut().enumerate() {
            let original = inputs[name].data[i];

            poke(inputs, name, i, original + delta);
            let pos = forward(inputs);

            poke(inputs, name, i, original - delta);
            let neg = forward(inputs);

            poke(inputs, name, i, original);
            *slot = (pos - neg) / (2.0 * delta);
        }
        grads.insert(name.to_string(), Tensor::new(shape, grad));
    }
    grads
}

/// Whether a single gradient element pair is within relative tolerance.
fn element_close(numeric: f32, analytic: f32, rtol: f32) -> bool {
    (numeric - analytic).abs() <= rtol * numeric.abs().max(analytic.abs())
}

/// Element-wise relative comparison of two gradient tensors.
///
/// Returns `true` iff every element pair satisfies
/// `|n − a| ≤ rtol · max(|n|, |a|)`.
///
/// # Panics
/// Panics if the shapes differ; that is never a tolerable disagreement.
pub fn gradients_close(numeric: &Ten32, analytic: &Ten32, rtol: f32) -> bool {
    assert_eq!(
        numeric.shape, analytic.shape,
        "numeric and analytic gradient shapes differ"
    );
    numeric
        .data
        .iter()
        .zip(&analytic.data)
        .all(|(&n, &a)| element_close(n, a, rtol))
}

/// Asserts that a numeric and an analytic gradient agree.
///
/// On failure the panic message lists the offending elements with their
/// numeric value, analytic value, and the `numeric / analytic` diagnostic
/// ratio. The ratio may be infinite or NaN when the analytic value is near
/// zero; it is informational only and never part of the pass/fail decision.
///
/// # Panics
/// Panics on shape mismatch or any element outside tolerance.
pub fn assert_gradients_close(name: &str, numeric: &Ten32, analytic: &Ten32, rtol: f32) {
    assert_eq!(
        numeric.shape, analytic.shape,
        "gradient shape mismatch for '{name}'"
    );

    let mut report = String::new();
    let mut failures = 0usize;
    for (i, (&n, &a)) in numeric.data.iter().zip(&analytic.data).enumerate() {
        if !element_close(n, a, rtol) {
            failures += 1;
            // cap the report; large tensors would otherwise flood the output
            if failures <= 8 {
                report.push_str(&format!(
                    "\n  [{i}] numeric = {n:e}, analytic = {a:e}, ratio = {:.4}",
                    n / a
                ));
            }
        }
    }

    assert!(
        failures == 0,
        "gradient check failed for '{name}': {failures} of {} elements \
         outside rtol {rtol}{report}",
        numeric.data.len()
    );
}
