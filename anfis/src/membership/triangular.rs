//! Triangular fuzzy sets with independent left and right half-widths.
//!
//! ```text
//!            1 ┤      /\
//!              │     /  \
//!            0 ┼────/────\─────
//!                b-δl  b  b+δr
//! ```

use super::{as_column, check_set_count, positive, Universe};
use crate::core::{Parameter, Tape, Tensor, Var};
use crate::error::Result;

/// Added to each half-width in the slope denominators.
pub const TRI_EPS: f64 = 1e-7;

#[derive(Debug, Clone)]
pub struct TriangularMf {
    n_sets: usize,
    universe: Universe,
    center: Parameter,
    delta_l: Parameter,
    delta_r: Parameter,
}

impl TriangularMf {
    /// Peaks evenly spaced, each half-width equal to the spacing so
    /// neighbouring triangles cross at 0.5.
    pub fn new(n_sets: usize, universe: Universe) -> Result<Self> {
        check_set_count(n_sets)?;
        let step = universe.step(n_sets);
        Ok(Self {
            n_sets,
            universe,
            center: Parameter::new("b", universe.linspace(n_sets)),
            delta_l: Parameter::new("delta_l", Tensor::full(&[n_sets], step)),
            delta_r: Parameter::new("delta_r", Tensor::full(&[n_sets], step)),
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

    pub fn delta_l(&self) -> &Parameter {
        &self.delta_l
    }

    pub fn delta_r(&self) -> &Parameter {
        &self.delta_r
    }

    pub fn forward<'t>(&self, tape: &'t Tape, x: Var<'t>) -> Result<Var<'t>> {
        let x = as_column(x)?;
        let b = self.universe.clamp_var(tape.param(&self.center));
        let dl = positive(tape.param(&self.delta_l));
        let dr = positive(tape.param(&self.delta_r));

        let rising = x.sub(b)?.add(dl)?.div(dl.add_scalar(TRI_EPS))?;
        let falling = b.add(dr)?.sub(x)?.div(dr.add_scalar(TRI_EPS))?;
        Ok(rising.minimum(falling)?.relu())
    }

    pub fn parameters(&self) -> Vec<&Parameter> {
        vec![&self.center, &self.delta_l, &self.delta_r]
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        vec![&mut self.center, &mut self.delta_l, &mut self.delta_r]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(mf: &TriangularMf, xs: Vec<f64>) -> Tensor {
        let tape = Tape::new();
        let x = tape.constant(Tensor::vector(xs));
        mf.forward(&tape, x).unwrap().to_tensor()
    }

    #[test]
    fn test_zero_outside_support() {
        let mf = TriangularMf::new(3, Universe::new(0.0, 2.0).unwrap()).unwrap();
        // middle set spans (0, 2)
        let out = eval(&mf, vec![-0.5, 2.5, 10.0]);
        for r in 0..3 {
            assert_eq!(out.get(&[r, 1]).unwrap(), 0.0);
        }
    }

    #[test]
    fn test_peak_and_crossover() {
        let mf = TriangularMf::new(3, Universe::new(0.0, 2.0).unwrap()).unwrap();
        let out = eval(&mf, vec![1.0, 0.5]);
        assert!((out.get(&[0, 1]).unwrap() - 1.0).abs() < 1e-5);
        assert!(out.get(&[0, 1]).unwrap() <= 1.0);
        assert!((out.get(&[1, 0]).unwrap() - 0.5).abs() < 1e-5);
        assert!((out.get(&[1, 1]).unwrap() - 0.5).abs() < 1e-5);
        assert_eq!(out.get(&[1, 2]).unwrap(), 0.0);
    }

    #[test]
    fn test_degenerate_widths_stay_finite() {
        let mut mf = TriangularMf::new(2, Universe::new(0.0, 1.0).unwrap()).unwrap();
        mf.parameters_mut()[1].set_value(Tensor::vector(vec![-1.0, -1.0])).unwrap();
        mf.parameters_mut()[2].set_value(Tensor::vector(vec![0.0, 0.0])).unwrap();
        let out = eval(&mf, vec![0.0, 0.3, 1.0]);
        assert!(out.all_finite());
        assert!(out.data().iter().all(|d| (0.0..=1.0).contains(d)));
    }
}
