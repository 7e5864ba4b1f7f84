//! Learned consequent: a feed-forward network emitting every rule's
//! consequent (per class) at once.
//!
//! ```text
//!   x [.., F] ─▶ Linear ─▶ act ─▶ … (n_layers) ─▶ Linear ─▶ [.., R·C]
//! ```
//!
//! Sequential input `(N × T × F)` is flattened to `(N·T × F)`, so each
//! (sample, step) row goes through the network on its own and nothing is
//! carried between steps.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

use crate::config::default_seed;
use crate::core::{Activation, Parameter, Tape, Var};
use crate::error::{AnfisError, Result};
use crate::layers::Linear;

/// Width and nonlinearity of the hidden stages
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LearnedOptions {
    /// Defaults to `max(in_features, n_rules · n_classes)`
    pub hidden_features: Option<usize>,
    pub activation: Activation,
}

#[derive(Debug, Clone)]
pub struct LearnedConsequent {
    in_features: usize,
    n_rules: usize,
    n_classes: usize,
    activation: Activation,
    hidden: Vec<Linear>,
    output: Linear,
}

impl LearnedConsequent {
    pub fn new(in_features: usize, n_rules: usize, n_classes: usize, n_layers: usize) -> Result<Self> {
        Self::with_options(
            in_features,
            n_rules,
            n_classes,
            n_layers,
            LearnedOptions::default(),
            &mut StdRng::seed_from_u64(default_seed()),
        )
    }

    pub fn with_options(
        in_features: usize,
        n_rules: usize,
        n_classes: usize,
        n_layers: usize,
        options: LearnedOptions,
        rng: &mut impl Rng,
    ) -> Result<Self> {
        for (what, value) in [
            ("in_features", in_features),
            ("n_rules", n_rules),
            ("n_classes", n_classes),
            ("n_layers", n_layers),
        ] {
            if value == 0 {
                return Err(AnfisError::InvalidConfig(format!("{} must be at least 1", what)));
            }
        }
        let out_features = n_rules
            .checked_mul(n_classes)
            .ok_or_else(|| AnfisError::InvalidConfig("n_rules · n_classes overflows".into()))?;
        let width = options.hidden_features.unwrap_or(in_features.max(out_features));

        let mut hidden = Vec::with_capacity(n_layers);
        let mut fan_in = in_features;
        for _ in 0..n_layers {
            hidden.push(Linear::new(fan_in, width, rng)?);
            fan_in = width;
        }
        let output = Linear::new(fan_in, out_features, rng)?;

        debug!(
            in_features,
            n_rules,
            n_classes,
            n_layers,
            width,
            activation = %options.activation,
            "learned consequent"
        );
        Ok(Self {
            in_features,
            n_rules,
            n_classes,
            activation: options.activation,
            hidden,
            output,
        })
    }

    pub fn in_features(&self) -> usize {
        self.in_features
    }

    pub fn n_rules(&self) -> usize {
        self.n_rules
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_layers(&self) -> usize {
        self.hidden.len()
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// `(N × F) -> (N × R·C)` or `(N × T × F) -> (N × T × R·C)`
    pub fn forward<'t>(&self, tape: &'t Tape, x: Var<'t>) -> Result<Var<'t>> {
        let shape = x.shape();
        let out_features = self.n_rules * self.n_classes;
        match shape.as_slice() {
            [_, f] if *f == self.in_features => self.run(tape, x),
            [n, t, f] if *f == self.in_features => {
                let flat = x.reshape(&[n * t, *f])?;
                self.run(tape, flat)?.reshape(&[*n, *t, out_features])
            }
            _ => Err(AnfisError::shape(
                format!("[N, {f}] or [N, T, {f}]", f = self.in_features),
                format!("{:?}", shape),
            )),
        }
    }

    fn run<'t>(&self, tape: &'t Tape, x: Var<'t>) -> Result<Var<'t>> {
        let mut h = x;
        for layer in &self.hidden {
            h = self.activation.apply(layer.forward(tape, h)?);
        }
        self.output.forward(tape, h)
    }

    pub fn named_parameters(&self) -> Vec<(String, &Parameter)> {
        let mut named = Vec::new();
        for (k, layer) in self.hidden.iter().enumerate() {
            for p in layer.parameters() {
                named.push((format!("hidden.{}.{}", k, p.name()), p));
            }
        }
        for p in self.output.parameters() {
            named.push((format!("output.{}", p.name()), p));
        }
        named
    }

    pub fn named_parameters_mut(&mut self) -> Vec<(String, &mut Parameter)> {
        let mut named = Vec::new();
        for (k, layer) in self.hidden.iter_mut().enumerate() {
            for p in layer.parameters_mut() {
                named.push((format!("hidden.{}.{}", k, p.name()), p));
            }
        }
        for p in self.output.parameters_mut() {
            named.push((format!("output.{}", p.name()), p));
        }
        named
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Tensor;

    fn sample(shape: &[usize]) -> Tensor {
        let n: usize = shape.iter().product();
        Tensor::new((0..n).map(|i| (i as f64 * 0.37).sin()).collect(), shape.to_vec()).unwrap()
    }

    #[test]
    fn test_flat_and_sequential_shapes() {
        for n_layers in [1, 2] {
            for n_classes in [1, 5] {
                let cons = LearnedConsequent::new(2, 6, n_classes, n_layers).unwrap();
                let tape = Tape::new();
                let flat = cons.forward(&tape, tape.constant(sample(&[11, 2]))).unwrap();
                assert_eq!(flat.shape(), vec![11, 6 * n_classes]);
                let seq = cons.forward(&tape, tape.constant(sample(&[11, 7, 2]))).unwrap();
                assert_eq!(seq.shape(), vec![11, 7, 6 * n_classes]);
            }
        }
    }

    #[test]
    fn test_steps_processed_independently() {
        let cons = LearnedConsequent::new(2, 3, 2, 2).unwrap();
        let seq = sample(&[4, 5, 2]);
        let tape = Tape::new();
        let out = cons.forward(&tape, tape.constant(seq.clone())).unwrap().to_tensor();

        // step 3 of sample 2, run alone
        let row = seq.data()[(2 * 5 + 3) * 2..(2 * 5 + 3) * 2 + 2].to_vec();
        let alone = cons
            .forward(&tape, tape.constant(Tensor::new(row, vec![1, 2]).unwrap()))
            .unwrap()
            .to_tensor();
        for j in 0..6 {
            assert_eq!(out.get(&[2, 3, j]).unwrap(), alone.get(&[0, j]).unwrap());
        }
    }

    #[test]
    fn test_parameter_names() {
        let cons = LearnedConsequent::new(2, 6, 1, 2).unwrap();
        let names: Vec<String> = cons.named_parameters().into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec!["hidden.0.weight", "hidden.0.bias", "hidden.1.weight", "hidden.1.bias", "output.weight", "output.bias"]
        );
    }

    #[test]
    fn test_invalid_construction() {
        assert!(LearnedConsequent::new(0, 6, 1, 1).is_err());
        assert!(LearnedConsequent::new(2, 6, 0, 1).is_err());
        assert!(LearnedConsequent::new(2, 6, 1, 0).is_err());
        let cons = LearnedConsequent::new(2, 6, 1, 1).unwrap();
        let tape = Tape::new();
        assert!(cons.forward(&tape, tape.constant(Tensor::zeros(&[3, 3]))).is_err());
        assert!(cons.forward(&tape, tape.constant(Tensor::zeros(&[6]))).is_err());
    }
}
