//! # Membership Function Benchmarks
//!
//! Fuzzification cost per strategy, forward only and with gradients.
//!
//! Run: `cargo bench --bench membership_bench`

use anfis::prelude::*;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

const KINDS: [MfKind; 4] = [MfKind::Gaussian, MfKind::Triangular, MfKind::Bell, MfKind::Sigmoid];

fn inputs(n: usize) -> Tensor {
    Tensor::linspace(-2.0, 2.0, n)
}

/// Benchmark forward fuzzification
fn bench_forward(c: &mut Criterion) {
    let mut group = c.benchmark_group("mf_forward");
    let x = inputs(1024);

    for kind in KINDS {
        let mf = MembershipFn::new(kind, 7, Universe::new(-1.0, 1.0).unwrap()).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(kind), &mf, |b, mf| {
            b.iter(|| {
                let tape = Tape::new();
                black_box(mf.forward(&tape, tape.constant(x.clone())).unwrap().to_tensor())
            })
        });
    }

    group.finish();
}

/// Benchmark forward + backward through one variable
fn bench_backward(c: &mut Criterion) {
    let mut group = c.benchmark_group("mf_backward");
    let x = inputs(1024);

    for kind in KINDS {
        let mf = MembershipFn::new(kind, 7, Universe::new(-1.0, 1.0).unwrap()).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(kind), &mf, |b, mf| {
            b.iter(|| {
                let tape = Tape::new();
                let loss = mf.forward(&tape, tape.constant(x.clone())).unwrap().sum();
                black_box(tape.backward(loss).unwrap())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_forward, bench_backward);
criterion_main!(benches);
