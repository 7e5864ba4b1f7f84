//! Gaussian fuzzy sets: `exp(-(x - μ)² / (2σ²))`

use super::{as_column, check_set_count, positive, Universe};
use crate::core::{Parameter, Tape, Tensor, Var};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct GaussianMf {
    n_sets: usize,
    universe: Universe,
    mu: Parameter,
    sigma: Parameter,
}

impl GaussianMf {
    /// Centers evenly spaced over the universe, σ at half the spacing.
    pub fn new(n_sets: usize, universe: Universe) -> Result<Self> {
        check_set_count(n_sets)?;
        let step = universe.step(n_sets);
        Ok(Self {
            n_sets,
            universe,
            mu: Parameter::new("mu", universe.linspace(n_sets)),
            sigma: Parameter::new("sigma", Tensor::full(&[n_sets], step / 2.0)),
        })
    }

    pub fn n_sets(&self) -> usize {
        self.n_sets
    }

    pub fn universe(&self) -> Universe {
        self.universe
    }

    pub fn mu(&self) -> &Parameter {
        &self.mu
    }

    pub fn sigma(&self) -> &Parameter {
        &self.sigma
    }

    pub fn forward<'t>(&self, tape: &'t Tape, x: Var<'t>) -> Result<Var<'t>> {
        let x = as_column(x)?;
        let mu = self.universe.clamp_var(tape.param(&self.mu));
        let sigma = positive(tape.param(&self.sigma));
        let spread = sigma.square().mul_scalar(2.0);
        Ok(x.sub(mu)?.square().div(spread)?.neg().exp())
    }

    pub fn parameters(&self) -> Vec<&Parameter> {
        vec![&self.mu, &self.sigma]
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        vec![&mut self.mu, &mut self.sigma]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(mf: &GaussianMf, xs: Vec<f64>) -> Tensor {
        let tape = Tape::new();
        let x = tape.constant(Tensor::vector(xs));
        mf.forward(&tape, x).unwrap().to_tensor()
    }

    #[test]
    fn test_initial_layout() {
        let mf = GaussianMf::new(3, Universe::new(-1.0, 1.0).unwrap()).unwrap();
        assert_eq!(mf.mu().value().data(), &[-1.0, 0.0, 1.0]);
        assert_eq!(mf.sigma().value().data(), &[0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_peak_at_center() {
        let mf = GaussianMf::new(3, Universe::new(-1.0, 1.0).unwrap()).unwrap();
        let out = eval(&mf, vec![0.0]);
        let row = out.row(0).unwrap();
        assert!((row[1] - 1.0).abs() < 1e-9);
        assert!(row[0] < row[1] && row[2] < row[1]);
        assert!((row[0] - row[2]).abs() < 1e-12);
    }

    #[test]
    fn test_center_clamped_into_universe() {
        let mut mf = GaussianMf::new(2, Universe::new(0.0, 1.0).unwrap()).unwrap();
        mf.parameters_mut()[0].set_value(Tensor::vector(vec![-5.0, 9.0])).unwrap();
        // centers act as 0 and 1
        let out = eval(&mf, vec![0.0, 1.0]);
        assert!((out.get(&[0, 0]).unwrap() - 1.0).abs() < 1e-12);
        assert!((out.get(&[1, 1]).unwrap() - 1.0).abs() < 1e-12);
        // raw value kept
        assert_eq!(mf.mu().value().data(), &[-5.0, 9.0]);
    }

    #[test]
    fn test_negative_sigma_stays_finite() {
        let mut mf = GaussianMf::new(2, Universe::new(0.0, 1.0).unwrap()).unwrap();
        mf.parameters_mut()[1].set_value(Tensor::vector(vec![-3.0, 0.0])).unwrap();
        let out = eval(&mf, vec![0.0, 0.5]);
        assert!(out.all_finite());
        assert!((out.get(&[0, 0]).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_gradients_reach_both_parameters() {
        let mf = GaussianMf::new(3, Universe::new(-1.0, 1.0).unwrap()).unwrap();
        let tape = Tape::new();
        let x = tape.constant(Tensor::vector(vec![-0.3, 0.2, 0.7]));
        let loss = mf.forward(&tape, x).unwrap().sum();
        let grads = tape.backward(loss).unwrap();
        assert!(grads.wrt(mf.mu()).unwrap().max_abs() > 0.0);
        assert!(grads.wrt(mf.sigma()).unwrap().max_abs() > 0.0);
    }
}
