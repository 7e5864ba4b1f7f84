//! # Forward Pass Benchmarks
//!
//! Full inference and one training step across consequent strategies and
//! rule counts.
//!
//! Run: `cargo bench --bench forward_bench`

use anfis::prelude::*;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

fn batch(n: usize, vars: usize) -> Tensor {
    let data = (0..n * vars).map(|i| (i as f64 * 0.37).sin()).collect();
    Tensor::new(data, vec![n, vars]).unwrap()
}

fn model(sets: &[usize], consequent: ConsequentConfig) -> Anfis {
    let variables = sets
        .iter()
        .map(|&n| VariableConfig::new(n, -1.0, 1.0, MfKind::Gaussian))
        .collect();
    Anfis::from_config(&AnfisConfig::new(variables, consequent).with_seed(1)).unwrap()
}

/// Benchmark inference per consequent strategy
fn bench_consequents(c: &mut Criterion) {
    let mut group = c.benchmark_group("predict_consequent");
    let x = batch(256, 3);
    let learned = ConsequentConfig::Learned {
        n_classes: 4,
        n_layers: 2,
        hidden_features: Some(32),
        activation: Activation::Relu,
    };

    for (name, consequent) in [
        ("regression", ConsequentConfig::Regression),
        ("classification", ConsequentConfig::Classification { n_classes: 4 }),
        ("learned", learned),
    ] {
        let m = model(&[3, 3, 3], consequent);
        group.bench_function(name, |b| b.iter(|| black_box(m.predict(black_box(&x)).unwrap())));
    }

    group.finish();
}

/// Benchmark growth with rule count
fn bench_rule_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("predict_rules");
    let x = batch(128, 4);

    for sets in [2usize, 3, 4, 5] {
        let m = model(&[sets; 4], ConsequentConfig::Regression);
        group.bench_with_input(BenchmarkId::from_parameter(m.n_rules()), &m, |b, m| {
            b.iter(|| black_box(m.predict(black_box(&x)).unwrap()))
        });
    }

    group.finish();
}

/// Benchmark forward + backward + Adam update
fn bench_train_step(c: &mut Criterion) {
    let x = batch(128, 3);
    let y = Tensor::vector((0..128).map(|i| (i as f64 * 0.11).cos()).collect());
    let mut m = model(&[3, 3, 3], ConsequentConfig::Regression);
    let mut opt = Adam::new(0.01);

    c.bench_function("train_step_27_rules", |b| {
        b.iter(|| {
            let tape = Tape::new();
            let out = m.forward(&tape, tape.constant(x.clone())).unwrap().output;
            let loss = mse(out, tape.constant(y.clone())).unwrap();
            let grads = tape.backward(loss).unwrap();
            black_box(opt.step(m.parameters_mut(), &grads).unwrap())
        })
    });
}

criterion_group!(benches, bench_consequents, bench_rule_scaling, bench_train_step);
criterion_main!(benches);
