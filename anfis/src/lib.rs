//! # anfis - Adaptive Neuro-Fuzzy Inference System
//!
//! Differentiable fuzzy rule bases on a reverse-mode autodiff tape.
//!
//! ## Modules
//!
//! - **core**: tensors, autodiff tape, parameters, activations, losses, optimizers
//! - **membership**: Gaussian, triangular, generalized bell and sigmoid fuzzy sets
//! - **rules**: Cartesian-product rule base and firing strengths
//! - **consequent**: linear regression, linear classification and learned consequents
//! - **aggregate**: firing-strength-weighted reduction over rules
//! - **model**: the assembled [`Anfis`] pipeline
//! - **config**: JSON/TOML model descriptions
//!
//! ## Example
//!
//! ```no_run
//! use anfis::prelude::*;
//!
//! let config = AnfisConfig::new(
//!     vec![
//!         VariableConfig::new(2, -1.0, 1.0, MfKind::Gaussian),
//!         VariableConfig::new(3, 0.0, 2.0, MfKind::Bell),
//!     ],
//!     ConsequentConfig::Regression,
//! );
//! let model = Anfis::from_config(&config)?;
//! let y = model.predict(&Tensor::from_rows(&[vec![0.1, 1.2], vec![-0.5, 0.3]])?)?;
//! assert_eq!(y.shape(), &[2]);
//! # Ok::<(), anfis::AnfisError>(())
//! ```

pub mod error;
pub use error::{AnfisError, Result};

pub mod core;
pub use crate::core::prelude::*;

pub mod membership;
pub use membership::{MembershipFn, MfKind, Universe};

pub mod rules;
pub use rules::{FiringStrengths, RuleBase};

pub mod layers;
pub use layers::Linear;

pub mod consequent;
pub use consequent::Consequent;

pub mod aggregate;

pub mod model;
pub use model::{Anfis, AnfisOutput, Variable};

pub mod config;
pub use config::{AnfisConfig, ConsequentConfig, VariableConfig};

/// Prelude module with common re-exports
pub mod prelude {
    pub use crate::config::{AnfisConfig, ConsequentConfig, VariableConfig};
    pub use crate::consequent::{
        Consequent, LearnedConsequent, LearnedOptions, LinearClassification, LinearRegression,
    };
    pub use crate::core::prelude::*;
    pub use crate::error::{AnfisError, Result};
    pub use crate::membership::{BellMf, GaussianMf, MembershipFn, MfKind, SigmoidMf, TriangularMf, Universe};
    pub use crate::model::{Anfis, AnfisOutput, Variable};
    pub use crate::rules::{FiringStrengths, RuleBase};
}
