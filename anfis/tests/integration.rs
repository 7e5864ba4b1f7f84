//! End-to-end behaviour of the fuzzy inference pipeline.

use anfis::prelude::*;

const KINDS: [MfKind; 4] = [MfKind::Gaussian, MfKind::Triangular, MfKind::Bell, MfKind::Sigmoid];

fn wave(shape: &[usize], phase: f64) -> Tensor {
    let n: usize = shape.iter().product();
    let data = (0..n).map(|i| ((i as f64) * 0.61 + phase).sin() * 1.5).collect();
    Tensor::new(data, shape.to_vec()).unwrap()
}

fn two_vars(kind: MfKind, consequent: ConsequentConfig) -> AnfisConfig {
    AnfisConfig::new(
        vec![
            VariableConfig::new(2, -1.0, 1.0, kind).named("a"),
            VariableConfig::new(3, -2.0, 2.0, kind).named("b"),
        ],
        consequent,
    )
    .with_seed(11)
}

// ============================================================================
// Membership functions
// ============================================================================

#[test]
fn test_degrees_bounded_far_outside_universe() {
    let xs = Tensor::vector(vec![-1e9, -1e3, -10.0, -1.0, 0.0, 0.5, 1.0, 10.0, 1e3, 1e9]);
    for kind in KINDS {
        for (n_sets, low, high) in [(2, -1.0, 1.0), (5, 0.0, 100.0), (3, -0.01, 0.01)] {
            let mf = MembershipFn::new(kind, n_sets, Universe::new(low, high).unwrap()).unwrap();
            let tape = Tape::new();
            let out = mf.forward(&tape, tape.constant(xs.clone())).unwrap().to_tensor();
            assert_eq!(out.shape(), &[xs.len(), n_sets]);
            assert!(out.data().iter().all(|d| (0.0..=1.0).contains(d)), "{} out of range", kind);
        }
    }
}

#[test]
fn test_triangular_zero_outside_local_support() {
    let mf = MembershipFn::new(MfKind::Triangular, 5, Universe::new(0.0, 4.0).unwrap()).unwrap();
    let tape = Tape::new();
    let x = tape.constant(Tensor::vector(vec![0.0, 2.0, 4.0]));
    let out = mf.forward(&tape, x).unwrap().to_tensor();
    // set k peaks at x = k with half-width 1
    for (row, x) in [0.0, 2.0, 4.0].iter().enumerate() {
        for k in 0..5 {
            if (k as f64 - x).abs() > 1.01 {
                assert_eq!(out.get(&[row, k]).unwrap(), 0.0);
            }
        }
    }
}

#[test]
fn test_gaussian_center_sets_win_at_zero() {
    let mf = MembershipFn::new(MfKind::Gaussian, 4, Universe::new(-1.0, 1.0).unwrap()).unwrap();
    let tape = Tape::new();
    let out = mf.forward(&tape, tape.constant(Tensor::vector(vec![0.0]))).unwrap().to_tensor();
    let row = out.row(0).unwrap();
    for inner in [1, 2] {
        for outer in [0, 3] {
            assert!(row[inner] > row[outer]);
        }
    }
}

#[test]
fn test_centers_pushed_outside_are_clamped() {
    let uod = Universe::new(-1.0, 1.0).unwrap();
    for kind in [MfKind::Gaussian, MfKind::Bell, MfKind::Sigmoid] {
        let mut mf = MembershipFn::new(kind, 2, uod).unwrap();
        let mut at_bounds = mf.clone();
        mf.parameters_mut()[0].set_value(Tensor::vector(vec![-50.0, 50.0])).unwrap();
        at_bounds.parameters_mut()[0].set_value(Tensor::vector(vec![-1.0, 1.0])).unwrap();

        let xs = Tensor::vector(vec![-1.0, -0.2, 0.3, 1.0]);
        let tape = Tape::new();
        let pushed = mf.forward(&tape, tape.constant(xs.clone())).unwrap().to_tensor();
        let clamped = at_bounds.forward(&tape, tape.constant(xs)).unwrap().to_tensor();
        assert_eq!(pushed, clamped, "{}", kind);

        // raw value untouched and still writable
        assert_eq!(mf.parameters()[0].value().data(), &[-50.0, 50.0]);
        mf.parameters_mut()[0].values_mut()[0] += 1.0;
        assert_eq!(mf.parameters()[0].value().data()[0], -49.0);
    }
}

#[test]
fn test_clamped_centers_stay_put_under_sgd() {
    let uod = Universe::new(-1.0, 1.0).unwrap();
    for kind in [MfKind::Gaussian, MfKind::Bell] {
        let mut mf = MembershipFn::new(kind, 2, uod).unwrap();
        mf.parameters_mut()[0].set_value(Tensor::vector(vec![-50.0, 50.0])).unwrap();
        let spread_before = mf.parameters()[1].value().clone();

        let tape = Tape::new();
        let x = tape.constant(Tensor::vector(vec![-0.6, -0.2, 0.3, 0.8]));
        let loss = mf.forward(&tape, x).unwrap().sum();
        let grads = tape.backward(loss).unwrap();
        assert!(grads.wrt(mf.parameters()[0]).unwrap().data().iter().all(|g| *g == 0.0));

        Sgd::new(0.1).step(mf.parameters_mut(), &grads).unwrap();
        assert_eq!(mf.parameters()[0].value().data(), &[-50.0, 50.0], "{}", kind);
        assert_ne!(mf.parameters()[1].value(), &spread_before, "{}", kind);
    }
}

// ============================================================================
// Rules and consequents
// ============================================================================

#[test]
fn test_rule_count_matches_product() {
    for counts in [vec![2, 3], vec![2, 2, 2], vec![4], vec![3, 5, 2]] {
        let config = AnfisConfig::new(
            counts.iter().map(|&n| VariableConfig::new(n, 0.0, 1.0, MfKind::Bell)).collect(),
            ConsequentConfig::Regression,
        );
        let model = Anfis::from_config(&config).unwrap();
        assert_eq!(model.n_rules(), counts.iter().product::<usize>());
        assert_eq!(model.rule_labels().len(), model.n_rules());
    }
}

#[test]
fn test_consequent_shapes() {
    let tape = Tape::new();
    let x = tape.constant(wave(&[11, 2], 0.0));

    let reg = LinearRegression::new(&[2, 3]).unwrap();
    assert_eq!(reg.forward(&tape, x).unwrap().shape(), vec![11, 6]);

    let cls = LinearClassification::new(&[2, 3], 5).unwrap();
    assert_eq!(cls.forward(&tape, x).unwrap().shape(), vec![6, 11, 5]);

    let seq = tape.constant(wave(&[11, 7, 2], 0.0));
    for n_layers in [1, 2] {
        let nn = LearnedConsequent::new(2, 6, 5, n_layers).unwrap();
        assert_eq!(nn.forward(&tape, x).unwrap().shape(), vec![11, 30]);
        assert_eq!(nn.forward(&tape, seq).unwrap().shape(), vec![11, 7, 30]);

        let nn_reg = LearnedConsequent::new(2, 6, 1, n_layers).unwrap();
        assert_eq!(nn_reg.forward(&tape, x).unwrap().shape(), vec![11, 6]);
        assert_eq!(nn_reg.forward(&tape, seq).unwrap().shape(), vec![11, 7, 6]);
    }
}

#[test]
fn test_normalized_rows_sum_to_one() {
    for kind in KINDS {
        let model = Anfis::from_config(&two_vars(kind, ConsequentConfig::Regression)).unwrap();
        let tape = Tape::new();
        let out = model.forward(&tape, tape.constant(wave(&[25, 2], 0.3))).unwrap();
        let raw = out.firing.raw.to_tensor();
        let norm = out.firing.normalized.to_tensor();
        for r in 0..25 {
            let raw_sum: f64 = raw.row(r).unwrap().iter().sum();
            let sum: f64 = norm.row(r).unwrap().iter().sum();
            if raw_sum > 1e-2 {
                assert!((sum - 1.0).abs() < 1e-6, "{}: row {} sums to {}", kind, r, sum);
            } else {
                assert!(sum <= 1.0 + 1e-6);
            }
        }
    }
}

#[test]
fn test_degenerate_rows_are_finite() {
    let model = Anfis::from_config(&two_vars(MfKind::Triangular, ConsequentConfig::Regression)).unwrap();
    let tape = Tape::new();
    // far outside every triangle
    let x = tape.constant(Tensor::from_rows(&[vec![40.0, -40.0], vec![0.0, 0.0]]).unwrap());
    let out = model.forward(&tape, x).unwrap();
    let norm = out.firing.normalized.to_tensor();
    assert!(norm.all_finite());
    assert!(norm.row(0).unwrap().iter().sum::<f64>() <= 1e-4);
    assert!((norm.row(1).unwrap().iter().sum::<f64>() - 1.0).abs() < 1e-6);
    assert!(out.output.to_tensor().all_finite());
}

// ============================================================================
// Model
// ============================================================================

#[test]
fn test_forward_is_idempotent() {
    let learned = ConsequentConfig::Learned {
        n_classes: 3,
        n_layers: 2,
        hidden_features: None,
        activation: Activation::Tanh,
    };
    for consequent in [ConsequentConfig::Regression, ConsequentConfig::Classification { n_classes: 4 }, learned] {
        let model = Anfis::from_config(&two_vars(MfKind::Bell, consequent)).unwrap();
        let x = wave(&[9, 2], 1.0);
        let first = model.predict(&x).unwrap();
        let second = model.predict(&x).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn test_same_seed_same_model() {
    let config = two_vars(MfKind::Gaussian, ConsequentConfig::Classification { n_classes: 2 });
    let a = Anfis::from_config(&config).unwrap();
    let b = Anfis::from_config(&config).unwrap();
    assert_eq!(a.snapshot(), b.snapshot());
}

#[test]
fn test_sequential_learned_model() {
    let config = two_vars(
        MfKind::Sigmoid,
        ConsequentConfig::Learned {
            n_classes: 5,
            n_layers: 1,
            hidden_features: Some(16),
            activation: Activation::Relu,
        },
    );
    let model = Anfis::from_config(&config).unwrap();
    let seq = wave(&[11, 7, 2], 0.0);
    let out = model.predict(&seq).unwrap();
    assert_eq!(out.shape(), &[11, 7, 5]);

    // each step equals the flat model applied to that step alone
    let step: Vec<Vec<f64>> = (0..11)
        .map(|n| {
            let base = (n * 7 + 4) * 2;
            seq.data()[base..base + 2].to_vec()
        })
        .collect();
    let flat = model.predict(&Tensor::from_rows(&step).unwrap()).unwrap();
    for n in 0..11 {
        for c in 0..5 {
            let a = out.get(&[n, 4, c]).unwrap();
            let b = flat.get(&[n, c]).unwrap();
            assert!((a - b).abs() < 1e-12);
        }
    }
}

#[test]
fn test_gradient_steps_reduce_regression_loss() {
    let mut model = Anfis::from_config(&two_vars(MfKind::Gaussian, ConsequentConfig::Regression)).unwrap();
    let x = wave(&[40, 2], 0.2);
    let y = Tensor::vector((0..40).map(|i| x.get(&[i, 0]).unwrap() * 0.5 - x.get(&[i, 1]).unwrap()).collect());

    let loss_of = |model: &Anfis| {
        let tape = Tape::new();
        let pred = model.forward(&tape, tape.constant(x.clone())).unwrap().output;
        mse(pred, tape.constant(y.clone())).unwrap().value().item().unwrap()
    };

    let initial = loss_of(&model);
    let mut opt = Adam::new(0.05);
    for _ in 0..150 {
        let tape = Tape::new();
        let pred = model.forward(&tape, tape.constant(x.clone())).unwrap().output;
        let loss = mse(pred, tape.constant(y.clone())).unwrap();
        let grads = tape.backward(loss).unwrap();
        opt.step(model.parameters_mut(), &grads).unwrap();
    }
    let trained = loss_of(&model);
    assert!(trained < initial * 0.5, "loss {} -> {}", initial, trained);
}

#[test]
fn test_classification_gradients_reach_every_parameter() {
    let model = Anfis::from_config(&two_vars(MfKind::Bell, ConsequentConfig::Classification { n_classes: 3 })).unwrap();
    let tape = Tape::new();
    let logits = model.forward(&tape, tape.constant(wave(&[8, 2], 0.4))).unwrap().output;
    let loss = cross_entropy(logits, &[0, 1, 2, 0, 1, 2, 0, 1]).unwrap();
    let grads = tape.backward(loss).unwrap();
    for (name, p) in model.named_parameters() {
        let g = grads.wrt(p).unwrap_or_else(|| panic!("no gradient for {}", name));
        assert!(g.all_finite(), "{}", name);
    }
}

#[test]
fn test_snapshot_round_trip() {
    let config = two_vars(MfKind::Triangular, ConsequentConfig::Classification { n_classes: 2 });
    let source = Anfis::from_config(&config).unwrap();
    let mut target = Anfis::from_config(&config.clone().with_seed(99)).unwrap();
    let x = wave(&[6, 2], 0.0);
    assert_ne!(source.predict(&x).unwrap(), target.predict(&x).unwrap());

    let json = source.snapshot().to_json().unwrap();
    target.restore(&ParameterSnapshot::from_json(&json).unwrap()).unwrap();
    let (a, b) = (source.predict(&x).unwrap(), target.predict(&x).unwrap());
    assert!(a.data().iter().zip(b.data()).all(|(p, q)| (p - q).abs() < 1e-9));
}

#[test]
fn test_shape_errors_at_call_time() {
    let model = Anfis::from_config(&two_vars(MfKind::Gaussian, ConsequentConfig::Regression)).unwrap();
    for bad in [Tensor::zeros(&[4, 3]), Tensor::zeros(&[4]), Tensor::zeros(&[2, 2, 2])] {
        assert!(matches!(model.predict(&bad), Err(AnfisError::ShapeMismatch { .. })));
    }
}

#[test]
fn test_config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let config = two_vars(
        MfKind::Bell,
        ConsequentConfig::Learned {
            n_classes: 2,
            n_layers: 2,
            hidden_features: Some(12),
            activation: Activation::Sigmoid,
        },
    );
    for file in ["model.toml", "model.json"] {
        let path = dir.path().join(file);
        config.save(&path).unwrap();
        let loaded = AnfisConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        let a = Anfis::from_config(&config).unwrap();
        let b = Anfis::from_config(&loaded).unwrap();
        assert_eq!(a.snapshot(), b.snapshot());
    }
}
