//! # Core Primitives
//!
//! Fundamental operations the fuzzy layers are built on:
//! - Tensor storage and kernels
//! - Reverse-mode autodiff tape
//! - Learnable parameters and snapshots
//! - Activation functions
//! - Loss functions
//! - Optimization

pub mod tensor;
pub mod autograd;
pub mod param;
pub mod activations;
pub mod loss;
pub mod optim;

pub use tensor::Tensor;
pub use autograd::{Gradients, Tape, Var};
pub use param::{ParamId, Parameter, ParameterSnapshot, SnapshotEntry};
pub use activations::Activation;
pub use loss::{cross_entropy, log_softmax, mse};
pub use optim::{lr_cosine_annealing, lr_step_decay, Adam, Optimizer, Sgd};

/// Prelude module for core exports
pub mod prelude {
    pub use crate::core::activations::Activation;
    pub use crate::core::autograd::{Gradients, Tape, Var};
    pub use crate::core::loss::{cross_entropy, mse};
    pub use crate::core::optim::{Adam, Optimizer, Sgd, lr_cosine_annealing, lr_step_decay};
    pub use crate::core::param::{ParamId, Parameter, ParameterSnapshot};
    pub use crate::core::tensor::Tensor;
}
