//! # Consequent Layers
//!
//! Per-rule outputs computed from the raw inputs, independent of the
//! firing strengths.
//!
//! | Strategy                   | Input            | Output                   |
//! |----------------------------|------------------|--------------------------|
//! | [`LinearRegression`]       | `[N, V]`         | `[N, R]`                 |
//! | [`LinearClassification`]   | `[N, V]`         | `[R, N, C]` (rule-major) |
//! | [`LearnedConsequent`]      | `[N, F]`         | `[N, R·C]`               |
//! |                            | `[N, T, F]`      | `[N, T, R·C]`            |

pub mod classification;
pub mod learned;
pub mod regression;

pub use classification::LinearClassification;
pub use learned::{LearnedConsequent, LearnedOptions};
pub use regression::LinearRegression;

use crate::core::{Parameter, Tape, Var};
use crate::error::{AnfisError, Result};
use crate::rules::{RuleBase, rule_count};

/// Validates the set list and returns Π n_sets.
pub(crate) fn rules_for(set_counts: &[usize]) -> Result<usize> {
    RuleBase::new(set_counts)?;
    rule_count(set_counts)
}

/// Checks `[N, features]` and returns `N`.
pub(crate) fn check_features(x: &Var<'_>, features: usize) -> Result<usize> {
    let shape = x.shape();
    match shape.as_slice() {
        [n, f] if *f == features => Ok(*n),
        _ => Err(AnfisError::shape(format!("[N, {}]", features), format!("{:?}", shape))),
    }
}

/// One of the three consequent strategies
#[derive(Debug, Clone)]
pub enum Consequent {
    Regression(LinearRegression),
    Classification(LinearClassification),
    Learned(LearnedConsequent),
}

impl Consequent {
    pub fn name(&self) -> &'static str {
        match self {
            Consequent::Regression(_) => "regression",
            Consequent::Classification(_) => "classification",
            Consequent::Learned(_) => "learned",
        }
    }

    pub fn n_rules(&self) -> usize {
        match self {
            Consequent::Regression(c) => c.n_rules(),
            Consequent::Classification(c) => c.n_rules(),
            Consequent::Learned(c) => c.n_rules(),
        }
    }

    pub fn n_classes(&self) -> usize {
        match self {
            Consequent::Regression(_) => 1,
            Consequent::Classification(c) => c.n_classes(),
            Consequent::Learned(c) => c.n_classes(),
        }
    }

    /// Width of the raw input rows the consequent reads.
    pub fn in_features(&self) -> usize {
        match self {
            Consequent::Regression(c) => c.n_vars(),
            Consequent::Classification(c) => c.n_vars(),
            Consequent::Learned(c) => c.in_features(),
        }
    }

    /// Only the learned consequent accepts `[N, T, F]` input.
    pub fn accepts_sequences(&self) -> bool {
        matches!(self, Consequent::Learned(_))
    }

    pub fn forward<'t>(&self, tape: &'t Tape, x: Var<'t>) -> Result<Var<'t>> {
        match self {
            Consequent::Regression(c) => c.forward(tape, x),
            Consequent::Classification(c) => c.forward(tape, x),
            Consequent::Learned(c) => c.forward(tape, x),
        }
    }

    /// Parameters with names local to the consequent.
    pub fn named_parameters(&self) -> Vec<(String, &Parameter)> {
        match self {
            Consequent::Regression(c) => c.parameters().into_iter().map(|p| (p.name().to_string(), p)).collect(),
            Consequent::Classification(c) => {
                c.parameters().into_iter().map(|p| (p.name().to_string(), p)).collect()
            }
            Consequent::Learned(c) => c.named_parameters(),
        }
    }

    pub fn named_parameters_mut(&mut self) -> Vec<(String, &mut Parameter)> {
        match self {
            Consequent::Regression(c) => {
                c.parameters_mut().into_iter().map(|p| (p.name().to_string(), p)).collect()
            }
            Consequent::Classification(c) => {
                c.parameters_mut().into_iter().map(|p| (p.name().to_string(), p)).collect()
            }
            Consequent::Learned(c) => c.named_parameters_mut(),
        }
    }
}

impl From<LinearRegression> for Consequent {
    fn from(c: LinearRegression) -> Self {
        Consequent::Regression(c)
    }
}

impl From<LinearClassification> for Consequent {
    fn from(c: LinearClassification) -> Self {
        Consequent::Classification(c)
    }
}

impl From<LearnedConsequent> for Consequent {
    fn from(c: LearnedConsequent) -> Self {
        Consequent::Learned(c)
    }
}
