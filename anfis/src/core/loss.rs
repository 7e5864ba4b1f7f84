//! # Loss Functions
//!
//! Losses recorded on the tape, so `Tape::backward` can start from them.
//!
//! | Function        | Description                                  |
//! |-----------------|----------------------------------------------|
//! | `mse`           | Mean Squared Error                           |
//! | `log_softmax`   | Log-softmax over the last axis               |
//! | `cross_entropy` | Mean negative log-likelihood of class labels |

use super::autograd::Var;
use super::tensor::Tensor;
use crate::error::{AnfisError, Result};

/// Mean Squared Error: (1/n) Σ (y - ŷ)²
pub fn mse<'t>(pred: Var<'t>, target: Var<'t>) -> Result<Var<'t>> {
    let (ps, ts) = (pred.shape(), target.shape());
    if ps != ts {
        return Err(AnfisError::shape(format!("target of shape {:?}", ps), format!("{:?}", ts)));
    }
    Ok(pred.sub(target)?.square().mean())
}

/// log(softmax(x)) over the last axis.
///
/// The row maximum is subtracted as a constant first; it cancels in the
/// result and keeps `exp` from overflowing.
pub fn log_softmax<'t>(logits: Var<'t>) -> Result<Var<'t>> {
    let value = logits.value();
    let shape = value.shape().to_vec();
    let Some(&cols) = shape.last() else {
        return Err(AnfisError::shape("tensor of rank >= 1", "scalar"));
    };
    if cols == 0 {
        return Err(AnfisError::shape("at least one class", "0 classes"));
    }
    let maxes: Vec<f64> = value
        .data()
        .chunks(cols)
        .map(|row| row.iter().copied().fold(f64::NEG_INFINITY, f64::max))
        .collect();
    let mut kept = shape.clone();
    let last = shape.len() - 1;
    kept[last] = 1;
    let max = logits.tape().constant(Tensor::new(maxes, kept)?);

    let shifted = logits.sub(max)?;
    let lse = shifted.exp().sum_axis(last, true)?.ln();
    shifted.sub(lse)
}

/// Cross-entropy of `(N × C)` logits against integer labels.
pub fn cross_entropy<'t>(logits: Var<'t>, labels: &[usize]) -> Result<Var<'t>> {
    let shape = logits.shape();
    let (n, c) = match shape.as_slice() {
        [n, c] => (*n, *c),
        _ => return Err(AnfisError::shape("logits of shape [N, C]", format!("{:?}", shape))),
    };
    if labels.len() != n {
        return Err(AnfisError::shape(format!("{} labels", n), format!("{} labels", labels.len())));
    }
    let mut one_hot = Tensor::zeros(&[n, c]);
    for (i, &label) in labels.iter().enumerate() {
        if label >= c {
            return Err(AnfisError::InvalidInput(format!("label {} out of range for {} classes", label, c)));
        }
        one_hot.data_mut()[i * c + label] = 1.0;
    }
    let one_hot = logits.tape().constant(one_hot);
    let picked = log_softmax(logits)?.mul(one_hot)?.sum();
    Ok(picked.mul_scalar(-1.0 / n.max(1) as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::autograd::Tape;

    #[test]
    fn test_mse() {
        let tape = Tape::new();
        let p = tape.constant(Tensor::vector(vec![1.0, 2.0, 3.0]));
        let t = tape.constant(Tensor::vector(vec![1.0, 0.0, 6.0]));
        let loss = mse(p, t).unwrap();
        assert!((loss.value().item().unwrap() - 13.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_mse_shape_mismatch() {
        let tape = Tape::new();
        let p = tape.constant(Tensor::zeros(&[3]));
        let t = tape.constant(Tensor::zeros(&[3, 1]));
        assert!(mse(p, t).is_err());
    }

    #[test]
    fn test_log_softmax_rows_normalize() {
        let tape = Tape::new();
        let logits = tape.constant(Tensor::from_rows(&[vec![1000.0, 1001.0], vec![-3.0, 2.0]]).unwrap());
        let lp = log_softmax(logits).unwrap().to_tensor();
        for r in 0..2 {
            let total: f64 = lp.row(r).unwrap().iter().map(|v| v.exp()).sum();
            assert!((total - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_cross_entropy_uniform_logits() {
        let tape = Tape::new();
        let logits = tape.constant(Tensor::zeros(&[4, 5]));
        let loss = cross_entropy(logits, &[0, 1, 2, 4]).unwrap();
        assert!((loss.value().item().unwrap() - 5f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_cross_entropy_rejects_bad_label() {
        let tape = Tape::new();
        let logits = tape.constant(Tensor::zeros(&[2, 3]));
        assert!(cross_entropy(logits, &[0, 3]).is_err());
    }
}
