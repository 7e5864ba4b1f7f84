//! First-order Takagi–Sugeno consequent: one affine map per rule.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

use super::check_features;
use crate::config::default_seed;
use crate::core::{Parameter, Tape, Var};
use crate::error::Result;
use crate::layers::uniform_init;

#[derive(Debug, Clone)]
pub struct LinearRegression {
    n_rules: usize,
    n_vars: usize,
    /// `(n_rules × n_vars)`
    weight: Parameter,
    /// `(n_rules)`
    bias: Parameter,
}

impl LinearRegression {
    pub fn new(set_counts: &[usize]) -> Result<Self> {
        Self::with_rng(set_counts, &mut StdRng::seed_from_u64(default_seed()))
    }

    pub fn with_rng(set_counts: &[usize], rng: &mut impl Rng) -> Result<Self> {
        let n_rules = super::rules_for(set_counts)?;
        let n_vars = set_counts.len();
        debug!(n_rules, n_vars, "regression consequent");
        Ok(Self {
            n_rules,
            n_vars,
            weight: Parameter::new("weight", uniform_init(&[n_rules, n_vars], n_vars, rng)),
            bias: Parameter::new("bias", uniform_init(&[n_rules], n_vars, rng)),
        })
    }

    pub fn n_rules(&self) -> usize {
        self.n_rules
    }

    pub fn n_vars(&self) -> usize {
        self.n_vars
    }

    pub fn weight(&self) -> &Parameter {
        &self.weight
    }

    pub fn bias(&self) -> &Parameter {
        &self.bias
    }

    /// `(N × n_vars) -> (N × n_rules)`
    pub fn forward<'t>(&self, tape: &'t Tape, x: Var<'t>) -> Result<Var<'t>> {
        check_features(&x, self.n_vars)?;
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
