//! # Membership Functions
//!
//! Fuzzification of one input variable. Each strategy maps a 1-D input of
//! length `N` to a dense `(N × n_sets)` matrix of membership degrees.
//!
//! ```text
//!   x: [N]  ──reshape──▶ [N, 1]
//!                           │ broadcast against per-set parameters [n_sets]
//!                           ▼
//!                     degrees [N, n_sets]
//! ```
//!
//! Learnable parameters are kept raw. At forward time centers are clamped
//! into the universe of discourse and spreads go through
//! `relu(p) + SPREAD_FLOOR`, both on the tape copy, so the optimizer keeps
//! seeing the raw value and gradients still reach it.
//!
//! | Strategy                | Parameters              | Range   |
//! |-------------------------|-------------------------|---------|
//! | [`GaussianMf`]          | `mu`, `sigma`           | (0, 1]  |
//! | [`TriangularMf`]        | `b`, `delta_l`, `delta_r` | [0, 1] |
//! | [`BellMf`]              | `c`, `a`, `b`           | (0, 1]  |
//! | [`SigmoidMf`]           | `c`, `a`                | (0, 1)  |

pub mod bell;
pub mod gaussian;
pub mod sigmoid;
pub mod triangular;

pub use bell::BellMf;
pub use gaussian::GaussianMf;
pub use sigmoid::SigmoidMf;
pub use triangular::TriangularMf;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::{Parameter, Tape, Tensor, Var};
use crate::error::{AnfisError, Result};

/// Floor added after the rectifier on spread/width parameters.
pub const SPREAD_FLOOR: f64 = 1e-6;

/// Closed interval a variable's fuzzy sets live on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Universe {
    low: f64,
    high: f64,
}

impl Universe {
    pub fn new(low: f64, high: f64) -> Result<Self> {
        if !(low.is_finite() && high.is_finite() && low < high) {
            return Err(AnfisError::InvalidUniverse { low, high });
        }
        Ok(Self { low, high })
    }

    #[inline]
    pub fn low(&self) -> f64 {
        self.low
    }

    #[inline]
    pub fn high(&self) -> f64 {
        self.high
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.high - self.low
    }

    /// Spacing between `n_sets` evenly placed centers.
    #[inline]
    pub fn step(&self, n_sets: usize) -> f64 {
        self.width() / (n_sets.max(2) - 1) as f64
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.low && x <= self.high
    }

    pub fn clamp(&self, x: f64) -> f64 {
        x.max(self.low).min(self.high)
    }

    pub(crate) fn linspace(&self, n: usize) -> Tensor {
        Tensor::linspace(self.low, self.high, n)
    }

    /// Forward-time copy of a center parameter, clamped into the universe.
    pub(crate) fn clamp_var<'t>(&self, v: Var<'t>) -> Var<'t> {
        v.clamp(self.low, self.high)
    }
}

impl TryFrom<[f64; 2]> for Universe {
    type Error = AnfisError;

    fn try_from([low, high]: [f64; 2]) -> Result<Self> {
        Universe::new(low, high)
    }
}

impl fmt::Display for Universe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.low, self.high)
    }
}

pub(crate) fn check_set_count(n_sets: usize) -> Result<()> {
    if n_sets < 2 {
        return Err(AnfisError::InvalidSetCount(n_sets));
    }
    Ok(())
}

/// relu(p) + floor: strictly positive, still differentiable above zero.
pub(crate) fn positive(v: Var<'_>) -> Var<'_> {
    v.relu().add_scalar(SPREAD_FLOOR)
}

/// `[N] -> [N, 1]`, ready to broadcast against `[n_sets]`.
pub(crate) fn as_column(x: Var<'_>) -> Result<Var<'_>> {
    let shape = x.shape();
    match shape.as_slice() {
        [n] => x.reshape(&[*n, 1]),
        _ => Err(AnfisError::shape("1-D input [N]", format!("{:?}", shape))),
    }
}

/// Membership function shape
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MfKind {
    #[default]
    Gaussian,
    Triangular,
    Bell,
    Sigmoid,
}

impl MfKind {
    pub const ALL: [MfKind; 4] = [MfKind::Gaussian, MfKind::Triangular, MfKind::Bell, MfKind::Sigmoid];

    pub fn name(self) -> &'static str {
        match self {
            MfKind::Gaussian => "gaussian",
            MfKind::Triangular => "triangular",
            MfKind::Bell => "bell",
            MfKind::Sigmoid => "sigmoid",
        }
    }
}

impl fmt::Display for MfKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MfKind {
    type Err = AnfisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gaussian" | "gauss" => Ok(MfKind::Gaussian),
            "triangular" | "tri" => Ok(MfKind::Triangular),
            "bell" | "gbell" => Ok(MfKind::Bell),
            "sigmoid" => Ok(MfKind::Sigmoid),
            other => Err(AnfisError::InvalidConfig(format!("unknown membership function '{}'", other))),
        }
    }
}

/// One variable's fuzzifier, picked at construction
#[derive(Debug, Clone)]
pub enum MembershipFn {
    Gaussian(GaussianMf),
    Triangular(TriangularMf),
    Bell(BellMf),
    Sigmoid(SigmoidMf),
}

impl MembershipFn {
    pub fn new(kind: MfKind, n_sets: usize, universe: Universe) -> Result<Self> {
        Ok(match kind {
            MfKind::Gaussian => MembershipFn::Gaussian(GaussianMf::new(n_sets, universe)?),
            MfKind::Triangular => MembershipFn::Triangular(TriangularMf::new(n_sets, universe)?),
            MfKind::Bell => MembershipFn::Bell(BellMf::new(n_sets, universe)?),
            MfKind::Sigmoid => MembershipFn::Sigmoid(SigmoidMf::new(n_sets, universe)?),
        })
    }

    pub fn kind(&self) -> MfKind {
        match self {
            MembershipFn::Gaussian(_) => MfKind::Gaussian,
            MembershipFn::Triangular(_) => MfKind::Triangular,
            MembershipFn::Bell(_) => MfKind::Bell,
            MembershipFn::Sigmoid(_) => MfKind::Sigmoid,
        }
    }

    pub fn n_sets(&self) -> usize {
        match self {
            MembershipFn::Gaussian(mf) => mf.n_sets(),
            MembershipFn::Triangular(mf) => mf.n_sets(),
            MembershipFn::Bell(mf) => mf.n_sets(),
            MembershipFn::Sigmoid(mf) => mf.n_sets(),
        }
    }

    pub fn universe(&self) -> Universe {
        match self {
            MembershipFn::Gaussian(mf) => mf.universe(),
            MembershipFn::Triangular(mf) => mf.universe(),
            MembershipFn::Bell(mf) => mf.universe(),
            MembershipFn::Sigmoid(mf) => mf.universe(),
        }
    }

    /// `[N] -> [N, n_sets]` membership degrees.
    pub fn forward<'t>(&self, tape: &'t Tape, x: Var<'t>) -> Result<Var<'t>> {
        match self {
            MembershipFn::Gaussian(mf) => mf.forward(tape, x),
            MembershipFn::Triangular(mf) => mf.forward(tape, x),
            MembershipFn::Bell(mf) => mf.forward(tape, x),
            MembershipFn::Sigmoid(mf) => mf.forward(tape, x),
        }
    }

    pub fn parameters(&self) -> Vec<&Parameter> {
        match self {
            MembershipFn::Gaussian(mf) => mf.parameters(),
            MembershipFn::Triangular(mf) => mf.parameters(),
            MembershipFn::Bell(mf) => mf.parameters(),
            MembershipFn::Sigmoid(mf) => mf.parameters(),
        }
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        match self {
            MembershipFn::Gaussian(mf) => mf.parameters_mut(),
            MembershipFn::Triangular(mf) => mf.parameters_mut(),
            MembershipFn::Bell(mf) => mf.parameters_mut(),
            MembershipFn::Sigmoid(mf) => mf.parameters_mut(),
        }
    }

    /// Evaluates on `points` evenly spaced inputs across the universe.
    ///
    /// Returns `(grid [points], degrees [points, n_sets])`.
    pub fn sample_grid(&self, points: usize) -> Result<(Tensor, Tensor)> {
        if points < 2 {
            return Err(AnfisError::InvalidConfig(format!("grid needs at least 2 points, got {}", points)));
        }
        let grid = self.universe().linspace(points);
        let tape = Tape::new();
        let x = tape.constant(grid.clone());
        let degrees = self.forward(&tape, x)?.to_tensor();
        Ok((grid, degrees))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_universe_validation() {
        assert!(Universe::new(-1.0, 1.0).is_ok());
        assert!(matches!(Universe::new(1.0, 1.0), Err(AnfisError::InvalidUniverse { .. })));
        assert!(Universe::new(2.0, -2.0).is_err());
        assert!(Universe::new(f64::NAN, 1.0).is_err());
        assert!(Universe::try_from([0.0, f64::INFINITY]).is_err());
    }

    #[test]
    fn test_every_kind_rejects_single_set() {
        let uod = Universe::new(-1.0, 1.0).unwrap();
        for kind in MfKind::ALL {
            assert!(matches!(MembershipFn::new(kind, 1, uod), Err(AnfisError::InvalidSetCount(1))));
        }
    }

    #[test]
    fn test_every_kind_bounded_on_whole_line() {
        let uod = Universe::new(-1.0, 1.0).unwrap();
        let xs = vec![-1e6, -50.0, -3.0, -1.0, -0.4, 0.0, 0.25, 1.0, 7.5, 1e6];
        for kind in MfKind::ALL {
            for n_sets in [2, 3, 4, 7] {
                let mf = MembershipFn::new(kind, n_sets, uod).unwrap();
                let tape = Tape::new();
                let x = tape.constant(Tensor::vector(xs.clone()));
                let out = mf.forward(&tape, x).unwrap().to_tensor();
                assert_eq!(out.shape(), &[xs.len(), n_sets]);
                for &d in out.data() {
                    assert!((0.0..=1.0).contains(&d), "{} produced {}", kind, d);
                }
            }
        }
    }

    #[test]
    fn test_rejects_matrix_input() {
        let uod = Universe::new(0.0, 1.0).unwrap();
        let mf = MembershipFn::new(MfKind::Bell, 3, uod).unwrap();
        let tape = Tape::new();
        let x = tape.constant(Tensor::zeros(&[4, 2]));
        assert!(matches!(mf.forward(&tape, x), Err(AnfisError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_sample_grid() {
        let uod = Universe::new(0.0, 10.0).unwrap();
        let mf = MembershipFn::new(MfKind::Triangular, 3, uod).unwrap();
        let (grid, degrees) = mf.sample_grid(101).unwrap();
        assert_eq!(grid.shape(), &[101]);
        assert_eq!(degrees.shape(), &[101, 3]);
        assert_eq!(grid.data()[0], 0.0);
        assert_eq!(grid.data()[100], 10.0);
        assert!(mf.sample_grid(1).is_err());
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("Gaussian".parse::<MfKind>().unwrap(), MfKind::Gaussian);
        assert_eq!("gbell".parse::<MfKind>().unwrap(), MfKind::Bell);
        assert!("trapezoid".parse::<MfKind>().is_err());
    }
}
