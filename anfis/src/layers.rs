//! Dense layer used by the consequent networks.

use rand::Rng;

use crate::core::{Parameter, Tape, Tensor, Var};
use crate::error::{AnfisError, Result};

/// Uniform `±1/sqrt(fan_in)` initialisation.
pub(crate) fn uniform_init(shape: &[usize], fan_in: usize, rng: &mut impl Rng) -> Tensor {
    let bound = 1.0 / (fan_in.max(1) as f64).sqrt();
    let n: usize = shape.iter().product();
    let data = (0..n).map(|_| rng.gen_range(-bound..=bound)).collect();
    Tensor::from_parts(data, shape.to_vec())
}

/// Fully connected layer: y = x·Wᵀ + b
#[derive(Debug, Clone)]
pub struct Linear {
    in_features: usize,
    out_features: usize,
    weight: Parameter,
    bias: Parameter,
}

impl Linear {
    pub fn new(in_features: usize, out_features: usize, rng: &mut impl Rng) -> Result<Self> {
        if in_features == 0 || out_features == 0 {
            return Err(AnfisError::InvalidConfig(format!(
                "linear layer needs non-zero sizes, got {} -> {}",
                in_features, out_features
            )));
        }
        Ok(Self {
            in_features,
            out_features,
            weight: Parameter::new("weight", uniform_init(&[out_features, in_features], in_features, rng)),
            bias: Parameter::new("bias", uniform_init(&[out_features], in_features, rng)),
        })
    }

    pub fn in_features(&self) -> usize {
        self.in_features
    }

    pub fn out_features(&self) -> usize {
        self.out_features
    }

    pub fn weight(&self) -> &Parameter {
        &self.weight
    }

    pub fn bias(&self) -> &Parameter {
        &self.bias
    }

    /// `(N × in) -> (N × out)`
    pub fn forward<'t>(&self, tape: &'t Tape, x: Var<'t>) -> Result<Var<'t>> {
        let shape = x.shape();
        if !matches!(shape.as_slice(), [_, f] if *f == self.in_features) {
            return Err(AnfisError::shape(format!("[N, {}]", self.in_features), format!("{:?}", shape)));
        }
        let w = tape.param(&self.weight).transpose()?;
        x.matmul(w)?.add(tape.param(&self.bias))
    }

    pub fn parameters(&self) -> Vec<&Parameter> {
        vec![&self.weight, &self.bias]
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        vec![&mut self.weight, &mut self.bias]
    }
}
