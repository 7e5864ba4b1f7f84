//! Linear classification consequent: one affine map per (rule, class).
//!
//! Output is rule-major `(n_rules × N × n_classes)` so aggregation can
//! reduce over the leading axis.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

use super::check_features;
use crate::config::default_seed;
use crate::core::{Parameter, Tape, Var};
use crate::error::{AnfisError, Result};
use crate::layers::uniform_init;

#[derive(Debug, Clone)]
pub struct LinearClassification {
    n_rules: usize,
    n_vars: usize,
    n_classes: usize,
    /// `(n_rules × n_classes × n_vars)`
    weight: Parameter,
    /// `(n_rules × n_classes)`
    bias: Parameter,
}

impl LinearClassification {
    pub fn new(set_counts: &[usize], n_classes: usize) -> Result<Self> {
        Self::with_rng(set_counts, n_classes, &mut StdRng::seed_from_u64(default_seed()))
    }

    pub fn with_rng(set_counts: &[usize], n_classes: usize, rng: &mut impl Rng) -> Result<Self> {
        if n_classes == 0 {
            return Err(AnfisError::InvalidConfig("n_classes must be at least 1".into()));
        }
        let n_rules = super::rules_for(set_counts)?;
        let n_vars = set_counts.len();
        debug!(n_rules, n_vars, n_classes, "classification consequent");
        Ok(Self {
            n_rules,
            n_vars,
            n_classes,
            weight: Parameter::new("weight", uniform_init(&[n_rules, n_classes, n_vars], n_vars, rng)),
            bias: Parameter::new("bias", uniform_init(&[n_rules, n_classes], n_vars, rng)),
        })
    }

    pub fn n_rules(&self) -> usize {
        self.n_rules
    }

    pub fn n_vars(&self) -> usize {
        self.n_vars
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn weight(&self) -> &Parameter {
        &self.weight
    }

    pub fn bias(&self) -> &Parameter {
        &self.bias
    }

    /// `(N × n_vars) -> (n_rules × N × n_classes)`
    pub fn forward<'t>(&self, tape: &'t Tape, x: Var<'t>) -> Result<Var<'t>> {
        let n = check_features(&x, self.n_vars)?;
        let (r, c) = (self.n_rules, self.n_classes);

        let w = tape.param(&self.weight).reshape(&[r * c, self.n_vars])?.transpose()?;
        let b = tape.param(&self.bias).reshape(&[r * c])?;
        x.matmul(w)?.add(b)?.reshape(&[n, r, c])?.permute(&[1, 0, 2])
    }

    pub fn parameters(&self) -> Vec<&Parameter> {
        vec![&self.weight, &self.bias]
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        vec![&mut self.weight, &mut self.bias]
    }
}
