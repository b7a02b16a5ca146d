//! Recurrent configurations checked against plain reference loops and against
//! finite-difference gradients.

use numgrad::gradcheck::{assert_gradients_close, numeric_gradient, DEFAULT_DELTA, DEFAULT_RTOL};
use numgrad::ops::{add, fully_connected, mean, scale, sigmoid};
use numgrad::rnn::{RecurrentGrads, RnnConfig, StaticRecurrent, StepBack, StepGrads};
use numgrad::tensors::{Ten32, Tensor, TensorMap};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

fn ones(shape: Vec<usize>) -> Ten32 {
    let n: usize = shape.iter().product();
    Tensor::new(shape, vec![1.0; n])
}

fn normal(rng: &mut StdRng, shape: Vec<usize>) -> Ten32 {
    let n: usize = shape.iter().product();
    Tensor::new(shape, (0..n).map(|_| rng.sample(StandardNormal)).collect())
}

fn add_in_place(dst: &mut Ten32, src: &Ten32) {
    for (d, s) in dst.data.iter_mut().zip(&src.data) {
        *d += *s;
    }
}

fn assert_scalar_close(framework: f32, reference: f32) {
    assert!(
        (framework - reference).abs()
            <= DEFAULT_RTOL * framework.abs().max(reference.abs()) + 1e-6,
        "forward mismatch: framework {framework}, reference {reference}"
    );
}

/// Plain-loop matrix product for the reference implementations.
fn matmul_ref(a: &Ten32, b: &Ten32) -> Ten32 {
    let (m, k, n) = (a.shape[0], a.shape[1], b.shape[1]);
    let mut out = vec![0.0f32; m * n];
    for i in 0..m {
        for j in 0..n {
            let mut sum = 0.0;
            for l in 0..k {
                sum += a.data[i * k + l] * b.data[l * n + j];
            }
            out[i * n + j] = sum;
        }
    }
    Tensor::new(vec![m, n], out)
}

// --- configuration 1: h_t = (x_t + h_{t-1}) · k ------------------------------

fn average_cell(k: f32) -> impl Fn(&Ten32, &TensorMap, &TensorMap) -> (Ten32, TensorMap, StepBack) {
    move |x_t, mems, _params| {
        let (sum, add_back) = add(&mems["h"], x_t);
        let (h, scale_back) = scale(&sum, k);

        let mut new_mems = TensorMap::new();
        new_mems.insert("h".to_string(), h.clone());

        let back: StepBack = Box::new(move |dy, dmems_in| {
            // the output is the memory: sum both incoming gradients
            let mut dh = dy.clone();
            if let Some(dm) = dmems_in.get("h") {
                add_in_place(&mut dh, dm);
            }
            let dsum = scale_back(&dh);
            let (dh_pre, dx) = add_back(&dsum);

            let mut dmems = TensorMap::new();
            dmems.insert("h".to_string(), dh_pre);
            StepGrads { dx, dmems, dparams: TensorMap::new() }
        });

        (h, new_mems, back)
    }
}

fn average_net(inputs: &TensorMap) -> (f32, RecurrentGrads) {
    let rnn = StaticRecurrent::new(average_cell(0.5));
    let mut boot = TensorMap::new();
    boot.insert("h".to_string(), inputs["h_boot"].clone());

    let trace = rnn.forward(&inputs["x"], &boot, &TensorMap::new());
    let (loss, mean_back) = mean(&trace.outputs);
    let grads = trace.backward(&mean_back(1.0));
    (loss, grads)
}

fn average_fixture(cfg: &RnnConfig) -> TensorMap {
    let mut rng = StdRng::seed_from_u64(1);
    let mut inputs = TensorMap::new();
    inputs.insert("x".to_string(), ones(cfg.input_shape()));
    inputs.insert("h_boot".to_string(), normal(&mut rng, cfg.state_shape()));
    inputs
}

fn reference_average(x: &Ten32, h_boot: &Ten32, k: f32) -> Ten32 {
    let mut y = x.zeros_like();
    let mut h = h_boot.clone();
    for t in 0..x.shape[0] {
        let x_t = x.subtensor(t);
        for (h_i, x_i) in h.data.iter_mut().zip(&x_t.data) {
            *h_i = (*h_i + x_i) * k;
        }
        y.set_subtensor(t, &h);
    }
    y
}

#[test]
fn test_average_rnn_forward() {
    let cfg = RnnConfig { seq_len: 2, batch_size: 10, input_dim: 2 };
    let inputs = average_fixture(&cfg);

    let (loss, _) = average_net(&inputs);
    let y_ref = reference_average(&inputs["x"], &inputs["h_boot"], 0.5);
    let (ref_loss, _) = mean(&y_ref);

    assert_scalar_close(loss, ref_loss);
}

#[test]
fn test_average_rnn_gradients() {
    let cfg = RnnConfig { seq_len: 2, batch_size: 10, input_dim: 2 };
    let mut inputs = average_fixture(&cfg);

    let (_, analytic) = average_net(&inputs);

    let mut forward = |m: &TensorMap| average_net(m).0;
    let numeric = numeric_gradient(&mut forward, &mut inputs, &["x", "h_boot"], DEFAULT_DELTA);

    assert_gradients_close("x", &numeric["x"], &analytic.dx, DEFAULT_RTOL);
    assert_gradients_close("h_boot", &numeric["h_boot"], &analytic.dboot["h"], DEFAULT_RTOL);
}

// --- configuration 2: h_t = σ(x_t·W + h_{t-1}·U) -----------------------------

fn sigmoid_cell() -> impl Fn(&Ten32, &TensorMap, &TensorMap) -> (Ten32, TensorMap, StepBack) {
    |x_t, mems, params| {
        let (xw, fc_x_back) = fully_connected(x_t, &params["W"]);
        let (hu, fc_h_back) = fully_connected(&mems["h"], &params["U"]);
        let (pre, add_back) = add(&xw, &hu);
        let (h, sig_back) = sigmoid(&pre);

        let mut new_mems = TensorMap::new();
        new_mems.insert("h".to_string(), h.clone());

        let back: StepBack = Box::new(move |dy, dmems_in| {
            let mut dh = dy.clone();
            if let Some(dm) = dmems_in.get("h") {
                add_in_place(&mut dh, dm);
            }
            let dpre = sig_back(&dh);
            let (dxw, dhu) = add_back(&dpre);
            let (dx, dw) = fc_x_back(&dxw);
            let (dh_pre, du) = fc_h_back(&dhu);

            let mut dmems = TensorMap::new();
            dmems.insert("h".to_string(), dh_pre);
            let mut dparams = TensorMap::new();
            dparams.insert("W".to_string(), dw);
            dparams.insert("U".to_string(), du);
            StepGrads { dx, dmems, dparams }
        });

        (h, new_mems, back)
    }
}

fn sigmoid_net(inputs: &TensorMap) -> (f32, RecurrentGrads) {
    let rnn = StaticRecurrent::new(sigmoid_cell());
    let mut boot = TensorMap::new();
    boot.insert("h".to_string(), inputs["h_boot"].clone());
    let mut params = TensorMap::new();
    params.insert("W".to_string(), inputs["W"].clone());
    params.insert("U".to_string(), inputs["U"].clone());

    let trace = rnn.forward(&inputs["x"], &boot, &params);
    let (loss, mean_back) = mean(&trace.outputs);
    let grads = trace.backward(&mean_back(1.0));
    (loss, grads)
}

fn sigmoid_fixture(cfg: &RnnConfig) -> TensorMap {
    let mut rng = StdRng::seed_from_u64(2);
    let d = cfg.input_dim;
    let mut inputs = TensorMap::new();
    inputs.insert("x".to_string(), ones(cfg.input_shape()));
    inputs.insert("h_boot".to_string(), ones(cfg.state_shape()));
    inputs.insert("W".to_string(), normal(&mut rng, vec![d, d]));
    inputs.insert("U".to_string(), normal(&mut rng, vec![d, d]));
    inputs
}

fn reference_sigmoid(x: &Ten32, h_boot: &Ten32, w: &Ten32, u: &Ten32) -> Ten32 {
    let mut y = x.zeros_like();
    let mut h = h_boot.clone();
    for t in 0..x.shape[0] {
        let xw = matmul_ref(&x.subtensor(t), w);
        let hu = matmul_ref(&h, u);
        for ((h_i, a), b) in h.data.iter_mut().zip(&xw.data).zip(&hu.data) {
            *h_i = 1.0 / (1.0 + (-(a + b)).exp());
        }
        y.set_subtensor(t, &h);
    }
    y
}

#[test]
fn test_sigmoid_rnn_forward() {
    let cfg = RnnConfig { seq_len: 2, batch_size: 10, input_dim: 2 };
    let inputs = sigmoid_fixture(&cfg);

    let (loss, _) = sigmoid_net(&inputs);
    let y_ref = reference_sigmoid(&inputs["x"], &inputs["h_boot"], &inputs["W"], &inputs["U"]);
    let (ref_loss, _) = mean(&y_ref);

    assert_scalar_close(loss, ref_loss);
}

#[test]
fn test_sigmoid_rnn_gradients() {
    let cfg = RnnConfig { seq_len: 2, batch_size: 10, input_dim: 2 };
    let mut inputs = sigmoid_fixture(&cfg);

    let (_, analytic) = sigmoid_net(&inputs);

    let mut forward = |m: &TensorMap| sigmoid_net(m).0;
    let numeric =
        numeric_gradient(&mut forward, &mut inputs, &["x", "h_boot", "W", "U"], DEFAULT_DELTA);

    assert_gradients_close("x", &numeric["x"], &analytic.dx, DEFAULT_RTOL);
    assert_gradients_close("h_boot", &numeric["h_boot"], &analytic.dboot["h"], DEFAULT_RTOL);
    assert_gradients_close("W", &numeric["W"], &analytic.dparams["W"], DEFAULT_RTOL);
    assert_gradients_close("U", &numeric["U"], &analytic.dparams["U"], DEFAULT_RTOL);
}

// --- configuration 3: two carried memories, y_t = h1 + h2 --------------------

fn twin_memory_cell() -> impl Fn(&Ten32, &TensorMap, &TensorMap) -> (Ten32, TensorMap, StepBack) {
    |x_t, mems, _params| {
        let (m1, s1_back) = scale(&mems["h1"], 1.0);
        let (m2, s2_back) = scale(&mems["h2"], 1.0);
        let (out, add_back) = add(&m1, &m2);

        let mut new_mems = TensorMap::new();
        new_mems.insert("h1".to_string(), m1);
        new_mems.insert("h2".to_string(), m2);

        let x_shape = x_t.shape.clone();
        let back: StepBack = Box::new(move |dy, dmems_in| {
            let (mut dm1, mut dm2) = add_back(dy);
            if let Some(dm) = dmems_in.get("h1") {
                add_in_place(&mut dm1, dm);
            }
            if let Some(dm) = dmems_in.get("h2") {
                add_in_place(&mut dm2, dm);
            }

            let mut dmems = TensorMap::new();
            dmems.insert("h1".to_string(), s1_back(&dm1));
            dmems.insert("h2".to_string(), s2_back(&dm2));
            StepGrads {
                // the input never enters the computation
                dx: Tensor::zeros(x_shape.clone()),
                dmems,
                dparams: TensorMap::new(),
            }
        });

        (out, new_mems, back)
    }
}

fn twin_memory_net(inputs: &TensorMap) -> (f32, RecurrentGrads) {
    let rnn = StaticRecurrent::new(twin_memory_cell());
    let mut boot = TensorMap::new();
    boot.insert("h1".to_string(), inputs["h_boot1"].clone());
    boot.insert("h2".to_string(), inputs["h_boot2"].clone());

    let trace = rnn.forward(&inputs["x"], &boot, &TensorMap::new());
    let (loss, mean_back) = mean(&trace.outputs);
    let grads = trace.backward(&mean_back(1.0));
    (loss, grads)
}

fn twin_memory_fixture(cfg: &RnnConfig) -> TensorMap {
    let mut rng = StdRng::seed_from_u64(3);
    let mut inputs = TensorMap::new();
    inputs.insert("x".to_string(), ones(cfg.input_shape()));
    inputs.insert("h_boot1".to_string(), normal(&mut rng, cfg.state_shape()));
    inputs.insert("h_boot2".to_string(), normal(&mut rng, cfg.state_shape()));
    inputs
}

#[test]
fn test_twin_memory_rnn_forward() {
    let cfg = RnnConfig { seq_len: 2, batch_size: 1, input_dim: 1 };
    let inputs = twin_memory_fixture(&cfg);

    let (loss, _) = twin_memory_net(&inputs);

    // both memories are carried unchanged, so every step emits h1 + h2
    let ref_step = inputs["h_boot1"].data[0] + inputs["h_boot2"].data[0];
    assert_scalar_close(loss, ref_step);
}

#[test]
fn test_twin_memory_rnn_gradients() {
    let cfg = RnnConfig { seq_len: 2, batch_size: 1, input_dim: 1 };
    let mut inputs = twin_memory_fixture(&cfg);

    let (_, analytic) = twin_memory_net(&inputs);

    let mut forward = |m: &TensorMap| twin_memory_net(m).0;
    let numeric =
        numeric_gradient(&mut forward, &mut inputs, &["x", "h_boot1", "h_boot2"], DEFAULT_DELTA);

    // x has no influence: both estimates must be exactly zero, and still agree
    assert!(numeric["x"].data.iter().all(|&g| g == 0.0));
    assert_gradients_close("x", &numeric["x"], &analytic.dx, DEFAULT_RTOL);
    assert_gradients_close("h_boot1", &numeric["h_boot1"], &analytic.dboot["h1"], DEFAULT_RTOL);
    assert_gradients_close("h_boot2", &numeric["h_boot2"], &analytic.dboot["h2"], DEFAULT_RTOL);
}
