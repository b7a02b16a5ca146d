//! Static recurrent construct with explicit memory threading.
//!
//! Runs a step cell across the leading (sequence) axis of an input tensor,
//! carrying a set of *named* memory tensors from one step to the next. The
//! forward pass records one backward closure per step; the backward pass walks
//! them in reverse, which is backprop through time for a fixed-length
//! sequence.
//!
//! ## Cell contract
//!
//! A cell is a closure `(x_t, mems, params) -> (y_t, new_mems, back)`:
//!
//! - `x_t` is the input slice at the current step.
//! - `mems` holds the named memory state coming in (the boot state at step 0).
//! - `params` holds named parameters shared across steps (may be empty).
//! - `y_t` is the step output; outputs are stacked along the sequence axis.
//! - `new_mems` is the updated memory state threaded into the next step.
//! - `back(dy_t, dmems_in)` receives the upstream gradient for `y_t` together
//!   with the gradient flowing back into each updated memory, and returns
//!   [`StepGrads`]. An entry absent from `dmems_in` (always the case at the
//!   final step) means a zero gradient. When the step output *is* the memory
//!   (the common case), the cell must sum the two contributions itself.
//!
//! Memory gradients remaining after the first step are the gradients of the
//! boot state.

use crate::tensors::{accumulate, Ten32, TensorMap, Tensor};

/// Shared shape configuration for a recurrent test network.
///
/// Passed by reference to cell constructors instead of threading loose
/// keyword-style arguments through every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RnnConfig {
    pub seq_len: usize,
    pub batch_size: usize,
    pub input_dim: usize,
}

impl RnnConfig {
    /// Shape of the full sequence input: `[seq_len, batch_size, input_dim]`.
    pub fn input_shape(&self) -> Vec<usize> {
        vec![self.seq_len, self.batch_size, self.input_dim]
    }

    /// Shape of a single memory state: `[batch_size, input_dim]`.
    pub fn state_shape(&self) -> Vec<usize> {
        vec![self.batch_size, self.input_dim]
    }
}

/// Gradients produced by one step's backward closure.
pub struct StepGrads {
    /// Gradient for the step's input slice.
    pub dx: Ten32,
    /// Gradient flowing into each incoming memory, keyed by memory name.
    pub dmems: TensorMap,
    /// Gradient contribution for each named parameter touched this step.
    pub dparams: TensorMap,
}

/// Per-step backward closure recorded during the forward pass.
pub type StepBack = Box<dyn Fn(&Ten32, &TensorMap) -> StepGrads>;

/// Gradients for every named input of a recurrent run.
pub struct RecurrentGrads {
    /// Gradient for the full sequence input, same shape as `x`.
    pub dx: Ten32,
    /// Gradient for each boot memory, keyed by memory name.
    pub dboot: TensorMap,
    /// Accumulated gradient for each named parameter.
    pub dparams: TensorMap,
}

/// A fixed-length recurrent loop over a step cell.
pub struct StaticRecurrent<C> {
    cell: C,
}

impl<C> StaticRecurrent<C>
where
    C: Fn(&Ten32, &TensorMap, &TensorMap) -> (Ten32, TensorMap, StepBack),
{
    pub fn new(cell: C) -> Self {
        Self { cell }
    }

    /// Runs the cell over every step of `x`'s leading axis.
    ///
    /// # Panics
    /// Panics if `x` has no sequence axis or the sequence is empty, or if the
    /// cell produces outputs of inconsistent shape across steps.
    pub fn forward(&self, x: &Ten32, boot_mems: &TensorMap, params: &TensorMap) -> RecurrentTrace {
        assert!(!x.shape.is_empty(), "recurrent input must have a sequence axis");
        let seq_len = x.shape[0];
        assert!(seq_len > 0, "recurrent input has empty sequence axis");

        let mut mems = boot_mems.clone();
        let mut backs = Vec::with_capacity(seq_len);
        let mut steps = Vec::with_capacity(seq_len);

        for t in 0..seq_len {
            let x_t = x.subtensor(t);
            let (y_t, new_mems, back) = (self.cell)(&x_t, &mems, params);
            mems = new_mems;
            backs.push(back);
            steps.push(y_t);
        }

        let mut out_shape = vec![seq_len];
        out_shape.extend_from_slice(&steps[0].shape);
        let mut outputs = Tensor::zeros(out_shape);
        for (t, y_t) in steps.iter().enumerate() {
            outputs.set_subtensor(t, y_t);
        }

        RecurrentTrace {
            outputs,
            backs,
            x_shape: x.shape.clone(),
            mem_names: boot_mems.keys().cloned().collect(),
        }
    }
}

/// Forward record of a recurrent run: stacked outputs plus the per-step
/// backward closures needed to run backprop through time.
pub struct RecurrentTrace {
    /// Step outputs stacked along the sequence axis.
    pub outputs: Ten32,
    backs: Vec<StepBack>,
    x_shape: Vec<usize>,
    mem_names: Vec<String>,
}

impl RecurrentTrace {
    /// Backprop through time.
    ///
    /// Walks the recorded steps in reverse. At each step the upstream slice of
    /// `grad_outputs` and the memory gradient flowing back from the following
    /// step are handed to the step's backward closure; parameter gradients are
    /// accumulated across steps.
    ///
    /// # Panics
    /// Panics if `grad_outputs`' shape differs from [`outputs`](Self::outputs),
    /// or if a step produces gradients whose shapes disagree with earlier
    /// steps.
    pub fn backward(&self, grad_outputs: &Ten32) -> RecurrentGrads {
        assert_eq!(
            grad_outputs.shape, self.outputs.shape,
            "recurrent output grad shape mismatch"
        );

        let mut dx = Tensor::zeros(self.x_shape.clone());
        let mut dmems = TensorMap::new();
        let mut dparams = TensorMap::new();

        for (t, back) in self.backs.iter().enumerate().rev() {
            let dy_t = grad_outputs.subtensor(t);
            let g = back(&dy_t, &dmems);
            dx.set_subtensor(t, &g.dx);
            dmems = g.dmems;
            for (name, grad) in &g.dparams {
                accumulate(&mut dparams, name, grad);
            }
        }

        for name in &self.mem_names {
            assert!(
                dmems.contains_key(name),
                "recurrent cell produced no gradient for memory '{name}'"
            );
        }

        RecurrentGrads { dx, dboot: dmems, dparams }
    }
}
