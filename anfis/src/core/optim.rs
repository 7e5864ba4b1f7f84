//! # Optimization
//!
//! SGD, Adam and learning rate schedules. Optimizers read a [`Gradients`]
//! set produced by `Tape::backward` and update the parameters in place
//! between forward passes; parameters absent from the gradient set are left
//! untouched.

use std::collections::HashMap;

use tracing::debug;

use super::autograd::Gradients;
use super::param::{ParamId, Parameter};
use super::tensor::Tensor;
use crate::error::{AnfisError, Result};

/// Applies one update from a gradient set
pub trait Optimizer {
    /// Returns the number of parameters updated.
    fn step<'a>(&mut self, params: impl IntoIterator<Item = &'a mut Parameter>, grads: &Gradients) -> Result<usize>;

    fn learning_rate(&self) -> f64;

    fn set_learning_rate(&mut self, lr: f64);
}

fn check_grad_shape(param: &Parameter, grad: &Tensor) -> Result<()> {
    if grad.shape() != param.value().shape() {
        return Err(AnfisError::shape(
            format!("gradient {:?} for {}", param.value().shape(), param.name()),
            format!("{:?}", grad.shape()),
        ));
    }
    Ok(())
}

/// SGD with optional momentum: v = μv - lr·∇θ, θ = θ + v
#[derive(Debug, Clone)]
pub struct Sgd {
    pub learning_rate: f64,
    pub momentum: f64,
    velocity: HashMap<ParamId, Vec<f64>>,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Self {
        Self::with_momentum(learning_rate, 0.0)
    }

    pub fn with_momentum(learning_rate: f64, momentum: f64) -> Self {
        Self {
            learning_rate,
            momentum,
            velocity: HashMap::new(),
        }
    }
}

impl Optimizer for Sgd {
    fn step<'a>(&mut self, params: impl IntoIterator<Item = &'a mut Parameter>, grads: &Gradients) -> Result<usize> {
        let mut updated = 0;
        for param in params {
            let Some(grad) = grads.get(param.id()) else { continue };
            check_grad_shape(param, grad)?;
            let v = self
                .velocity
                .entry(param.id())
                .or_insert_with(|| vec![0.0; grad.len()]);
            for ((p, vi), g) in param.values_mut().iter_mut().zip(v.iter_mut()).zip(grad.data()) {
                *vi = self.momentum * *vi - self.learning_rate * g;
                *p += *vi;
            }
            updated += 1;
        }
        debug!(updated, lr = self.learning_rate, "sgd step");
        Ok(updated)
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.learning_rate = lr;
    }
}

/// Adam optimizer
#[derive(Debug, Clone)]
pub struct Adam {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
    t: i32,
    m: HashMap<ParamId, Vec<f64>>,
    v: HashMap<ParamId, Vec<f64>>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            t: 0,
            m: HashMap::new(),
            v: HashMap::new(),
        }
    }

    /// Steps taken so far.
    pub fn steps(&self) -> i32 {
        self.t
    }
}

impl Optimizer for Adam {
    fn step<'a>(&mut self, params: impl IntoIterator<Item = &'a mut Parameter>, grads: &Gradients) -> Result<usize> {
        self.t += 1;
        let bias1 = 1.0 - self.beta1.powi(self.t);
        let bias2 = 1.0 - self.beta2.powi(self.t);

        let mut updated = 0;
        for param in params {
            let Some(grad) = grads.get(param.id()) else { continue };
            check_grad_shape(param, grad)?;
            let m = self.m.entry(param.id()).or_insert_with(|| vec![0.0; grad.len()]);
            let v = self.v.entry(param.id()).or_insert_with(|| vec![0.0; grad.len()]);

            for (i, (p, g)) in param.values_mut().iter_mut().zip(grad.data()).enumerate() {
                m[i] = self.beta1 * m[i] + (1.0 - self.beta1) * g;
                v[i] = self.beta2 * v[i] + (1.0 - self.beta2) * g * g;
                let m_hat = m[i] / bias1;
                let v_hat = v[i] / bias2;
                *p -= self.learning_rate * m_hat / (v_hat.sqrt() + self.eps);
            }
            updated += 1;
        }
        debug!(updated, step = self.t, lr = self.learning_rate, "adam step");
        Ok(updated)
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.learning_rate = lr;
    }
}

/// Step decay learning rate
pub fn lr_step_decay(initial_lr: f64, epoch: usize, decay_epochs: usize, decay_rate: f64) -> f64 {
    let num_decays = epoch / decay_epochs.max(1);
    initial_lr * decay_rate.powi(num_decays as i32)
}

/// Cosine annealing learning rate
pub fn lr_cosine_annealing(initial_lr: f64, current_step: usize, total_steps: usize, min_lr: f64) -> f64 {
    let progress = (current_step as f64 / total_steps.max(1) as f64).min(1.0);
    let cos_val = (std::f64::consts::PI * progress).cos();
    min_lr + 0.5 * (initial_lr - min_lr) * (1.0 + cos_val)
}
