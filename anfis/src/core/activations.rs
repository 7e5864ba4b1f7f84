//! # Activation Functions
//!
//! Scalar kernels used by the tape plus the [`Activation`] selector for the
//! hidden stages of the learned consequent.
//!
//! | Function  | Description                  |
//! |-----------|------------------------------|
//! | `relu`    | Rectified Linear Unit        |
//! | `sigmoid` | Logistic sigmoid (stable)    |
//! | `tanh`    | Hyperbolic tangent           |
//! | identity  | Pass-through                 |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::autograd::Var;
use crate::error::AnfisError;

/// ReLU activation: max(0, x)
#[inline]
pub fn relu(x: f64) -> f64 {
    if x > 0.0 { x } else { 0.0 }
}

/// Sigmoid activation: 1 / (1 + e^(-x))
///
/// Branches on the sign so neither side evaluates `exp` of a large positive
/// number.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Hyperbolic tangent
#[inline]
pub fn tanh(x: f64) -> f64 {
    x.tanh()
}

/// Hidden-stage activation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Relu,
    Tanh,
    Sigmoid,
    Identity,
}

impl Activation {
    pub fn apply<'t>(self, x: Var<'t>) -> Var<'t> {
        match self {
            Activation::Relu => x.relu(),
            Activation::Tanh => x.tanh(),
            Activation::Sigmoid => x.sigmoid(),
            Activation::Identity => x,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Activation::Relu => "relu",
            Activation::Tanh => "tanh",
            Activation::Sigmoid => "sigmoid",
            Activation::Identity => "identity",
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Activation {
    type Err = AnfisError;

    /// Supported: "relu", "tanh", "sigmoid", "identity" (alias "linear", "none")
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "relu" => Ok(Activation::Relu),
            "tanh" => Ok(Activation::Tanh),
            "sigmoid" => Ok(Activation::Sigmoid),
            "identity" | "linear" | "none" => Ok(Activation::Identity),
            other => Err(AnfisError::InvalidConfig(format!("unknown activation '{}'", other))),
        }
    }
}
