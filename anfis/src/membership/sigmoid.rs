//! Sigmoidal sets: `σ(a · (x - c))`
//!
//! The slope `a` is signed and left unrectified; a negative slope turns a
//! set into a "low" shoulder.

use super::{as_column, check_set_count, Universe};
use crate::core::{Parameter, Tape, Tensor, Var};
use crate::error::Result;

/// Fraction of the universe kept clear at each end when placing centers.
const INSET: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct SigmoidMf {
    n_sets: usize,
    universe: Universe,
    center: Parameter,
    slope: Parameter,
}

impl SigmoidMf {
    pub fn new(n_sets: usize, universe: Universe) -> Result<Self> {
        check_set_count(n_sets)?;
        let margin = INSET * universe.width();
        let centers = Tensor::linspace(universe.low() + margin, universe.high() - margin, n_sets);
        let step = universe.step(n_sets);
        Ok(Self {
            n_sets,
            universe,
            center: Parameter::new("c", centers),
            slope: Parameter::new("a", Tensor::full(&[n_sets], 2.0 * step)),
        })
    }

    pub fn n_sets(&self) -> usize {
        self.n_sets
    }

    pub fn universe(&self) -> Universe {
        self.universe
    }

    pub fn center(&self) -> &Parameter {
        &self.center
    }

    pub fn slope(&self) -> &Parameter {
        &self.slope
    }

    pub fn forward<'t>(&self, tape: &'t Tape, x: Var<'t>) -> Result<Var<'t>> {
        let x = as_column(x)?;
        let c = self.universe.clamp_var(tape.param(&self.center));
        let a = tape.param(&self.slope);
        Ok(x.sub(c)?.mul(a)?.sigmoid())
    }

    pub fn parameters(&self) -> Vec<&Parameter> {
        vec![&self.center, &self.slope]
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        vec![&mut self.center, &mut self.slope]
    }
}
