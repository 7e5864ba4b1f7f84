//! Generalized bell sets: `1 / (1 + |(x - c) / a|^(2b))`

use super::{as_column, check_set_count, positive, Universe};
use crate::core::{Parameter, Tape, Tensor, Var};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct BellMf {
    n_sets: usize,
    universe: Universe,
    center: Parameter,
    width: Parameter,
    slope: Parameter,
}

impl BellMf {
    pub fn new(n_sets: usize, universe: Universe) -> Result<Self> {
        check_set_count(n_sets)?;
        let step = universe.step(n_sets);
        Ok(Self {
            n_sets,
            universe,
            center: Parameter::new("c", universe.linspace(n_sets)),
            width: Parameter::new("a", Tensor::full(&[n_sets], step / 2.0)),
            slope: Parameter::new("b", Tensor::full(&[n_sets], step)),
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

    pub fn width(&self) -> &Parameter {
        &self.width
    }

    pub fn slope(&self) -> &Parameter {
        &self.slope
    }

    pub fn forward<'t>(&self, tape: &'t Tape, x: Var<'t>) -> Result<Var<'t>> {
        let x = as_column(x)?;
        let c = self.universe.clamp_var(tape.param(&self.center));
        let a = positive(tape.param(&self.width));
        let exponent = positive(tape.param(&self.slope)).mul_scalar(2.0);

        let ratio = x.sub(c)?.div(a)?.abs();
        Ok(ratio.powf(exponent)?.add_scalar(1.0).recip())
    }

    pub fn parameters(&self) -> Vec<&Parameter> {
        vec![&self.center, &self.width, &self.slope]
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        vec![&mut self.center, &mut self.width, &mut self.slope]
    }
}
