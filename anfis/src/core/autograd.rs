//! # Reverse-mode Automatic Differentiation
//!
//! A [`Tape`] is an append-only arena of nodes. Every operation on a [`Var`]
//! computes its value eagerly and records the op with the ids of its inputs.
//! [`Tape::backward`] walks the arena once in reverse and hands back the
//! gradient of every [`Parameter`](super::param::Parameter) that was put on
//! the tape.
//!
//! A tape lives for one forward/backward pass. Parameter values are copied
//! onto it, so the model stays immutable while a pass is in flight.
//!
//! ## Conventions at non-differentiable points
//!
//! | Op          | Gradient used                                   |
//! |-------------|-------------------------------------------------|
//! | `relu`      | 0 at x = 0                                      |
//! | `abs`       | 0 at x = 0                                      |
//! | `powf`      | 0 for both operands where the base is 0         |
//! | `powf`      | 0 where the power overflows or upstream is 0    |
//! | `clamp`     | passes where low ≤ x ≤ high, 0 outside          |
//! | `max`/`min` | split evenly on ties                            |

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::activations;
use super::param::{ParamId, Parameter};
use super::tensor::{self, Tensor};
use crate::error::{AnfisError, Result};

type NodeId = usize;

#[derive(Debug, Clone)]
enum Op {
    Leaf,
    Param(ParamId),
    Add(NodeId, NodeId),
    Sub(NodeId, NodeId),
    Mul(NodeId, NodeId),
    Div(NodeId, NodeId),
    Maximum(NodeId, NodeId),
    Minimum(NodeId, NodeId),
    Pow(NodeId, NodeId),
    AddScalar(NodeId),
    MulScalar(NodeId, f64),
    Square(NodeId),
    Recip(NodeId),
    Exp(NodeId),
    Ln(NodeId),
    Abs(NodeId),
    Relu(NodeId),
    Sigmoid(NodeId),
    Tanh(NodeId),
    Clamp { input: NodeId, low: f64, high: f64 },
    MatMul(NodeId, NodeId),
    Permute { input: NodeId, axes: Vec<usize> },
    Reshape(NodeId),
    SumAxis { input: NodeId, axis: usize },
    Sum(NodeId),
    IndexSelect { input: NodeId, axis: usize, indices: Vec<usize> },
}

struct Node {
    value: Rc<Tensor>,
    op: Op,
}

/// Arena recording one computation
#[derive(Default)]
pub struct Tape {
    nodes: RefCell<Vec<Node>>,
}

impl fmt::Debug for Tape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tape").field("nodes", &self.len()).finish()
    }
}

impl Tape {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded nodes.
    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Leaf that receives no gradient (inputs, targets, masks).
    pub fn constant(&self, value: Tensor) -> Var<'_> {
        self.push(value, Op::Leaf)
    }

    /// Leaf whose gradient is reported under the parameter's id.
    pub fn param(&self, param: &Parameter) -> Var<'_> {
        self.push(param.value().clone(), Op::Param(param.id()))
    }

    fn push(&self, value: Tensor, op: Op) -> Var<'_> {
        let mut nodes = self.nodes.borrow_mut();
        nodes.push(Node {
            value: Rc::new(value),
            op,
        });
        Var {
            tape: self,
            id: nodes.len() - 1,
        }
    }

    fn value_of(&self, id: NodeId) -> Rc<Tensor> {
        Rc::clone(&self.nodes.borrow()[id].value)
    }

    /// Back-propagates from a single-element `root`.
    pub fn backward(&self, root: Var<'_>) -> Result<Gradients> {
        if !std::ptr::eq(root.tape, self) {
            return Err(AnfisError::InvalidInput("backward root belongs to another tape".into()));
        }
        let nodes = self.nodes.borrow();
        let root_value = &nodes[root.id].value;
        if root_value.len() != 1 {
            return Err(AnfisError::shape("single-element loss", format!("{:?}", root_value.shape())));
        }

        let mut grads: Vec<Option<Tensor>> = vec![None; root.id + 1];
        grads[root.id] = Some(Tensor::full(root_value.shape(), 1.0));
        let mut out = Gradients::default();

        for id in (0..=root.id).rev() {
            let Some(g) = grads[id].take() else { continue };
            let node = &nodes[id];
            let x = |i: NodeId| &nodes[i].value;

            match &node.op {
                Op::Leaf => {}
                Op::Param(pid) => out.accumulate(*pid, g)?,
                Op::Add(a, b) => {
                    accumulate(&mut grads[*a], tensor::sum_to_shape(&g, x(*a).shape()))?;
                    accumulate(&mut grads[*b], tensor::sum_to_shape(&g, x(*b).shape()))?;
                }
                Op::Sub(a, b) => {
                    accumulate(&mut grads[*a], tensor::sum_to_shape(&g, x(*a).shape()))?;
                    let neg = g.map(|v| -v);
                    accumulate(&mut grads[*b], tensor::sum_to_shape(&neg, x(*b).shape()))?;
                }
                Op::Mul(a, b) => {
                    let ga = tensor::zip_with(&g, x(*b), |g, b| g * b)?;
                    let gb = tensor::zip_with(&g, x(*a), |g, a| g * a)?;
                    accumulate(&mut grads[*a], tensor::sum_to_shape(&ga, x(*a).shape()))?;
                    accumulate(&mut grads[*b], tensor::sum_to_shape(&gb, x(*b).shape()))?;
                }
                Op::Div(a, b) => {
                    let ga = tensor::zip_with(&g, x(*b), |g, b| g / b)?;
                    let ga_num = tensor::zip_with(&g, x(*a), |g, a| g * a)?;
                    let gb = tensor::zip_with(&ga_num, x(*b), |ga, b| -ga / (b * b))?;
                    accumulate(&mut grads[*a], tensor::sum_to_shape(&ga, x(*a).shape()))?;
                    accumulate(&mut grads[*b], tensor::sum_to_shape(&gb, x(*b).shape()))?;
                }
                Op::Maximum(a, b) | Op::Minimum(a, b) => {
                    let pick_max = matches!(node.op, Op::Maximum(..));
                    let w = tensor::zip_with(x(*a), x(*b), |av, bv| {
                        if av == bv {
                            0.5
                        } else if (av > bv) == pick_max {
                            1.0
                        } else {
                            0.0
                        }
                    })?;
                    let ga = tensor::zip_with(&g, &w, |g, w| g * w)?;
                    let gb = tensor::zip_with(&g, &w, |g, w| g * (1.0 - w))?;
                    accumulate(&mut grads[*a], tensor::sum_to_shape(&ga, x(*a).shape()))?;
                    accumulate(&mut grads[*b], tensor::sum_to_shape(&gb, x(*b).shape()))?;
                }
                Op::Pow(a, b) => {
                    let da = tensor::zip_with(x(*a), x(*b), |base, p| {
                        if base == 0.0 { 0.0 } else { p * base.powf(p - 1.0) }
                    })?;
                    let db = tensor::zip_with(x(*a), x(*b), |base, p| {
                        if base <= 0.0 { 0.0 } else { base.powf(p) * base.ln() }
                    })?;
                    let ga = tensor::zip_with(&g, &da, saturated_product)?;
                    let gb = tensor::zip_with(&g, &db, saturated_product)?;
                    accumulate(&mut grads[*a], tensor::sum_to_shape(&ga, x(*a).shape()))?;
                    accumulate(&mut grads[*b], tensor::sum_to_shape(&gb, x(*b).shape()))?;
                }
                Op::AddScalar(a) => accumulate(&mut grads[*a], g)?,
                Op::MulScalar(a, c) => {
                    let c = *c;
                    accumulate(&mut grads[*a], g.map(|v| v * c))?;
                }
                Op::Square(a) => {
                    let ga = tensor::zip_with(&g, x(*a), |g, v| 2.0 * g * v)?;
                    accumulate(&mut grads[*a], ga)?;
                }
                Op::Recip(a) => {
                    let ga = tensor::zip_with(&g, &node.value, |g, y| -g * y * y)?;
                    accumulate(&mut grads[*a], ga)?;
                }
                Op::Exp(a) => {
                    let ga = tensor::zip_with(&g, &node.value, |g, y| g * y)?;
                    accumulate(&mut grads[*a], ga)?;
                }
                Op::Ln(a) => {
                    let ga = tensor::zip_with(&g, x(*a), |g, v| g / v)?;
                    accumulate(&mut grads[*a], ga)?;
                }
                Op::Abs(a) => {
                    let ga = tensor::zip_with(&g, x(*a), |g, v| {
                        if v > 0.0 {
                            g
                        } else if v < 0.0 {
                            -g
                        } else {
                            0.0
                        }
                    })?;
                    accumulate(&mut grads[*a], ga)?;
                }
                Op::Relu(a) => {
                    let ga = tensor::zip_with(&g, x(*a), |g, v| if v > 0.0 { g } else { 0.0 })?;
                    accumulate(&mut grads[*a], ga)?;
                }
                Op::Sigmoid(a) => {
                    let ga = tensor::zip_with(&g, &node.value, |g, s| g * s * (1.0 - s))?;
                    accumulate(&mut grads[*a], ga)?;
                }
                Op::Tanh(a) => {
                    let ga = tensor::zip_with(&g, &node.value, |g, t| g * (1.0 - t * t))?;
                    accumulate(&mut grads[*a], ga)?;
                }
                Op::Clamp { input, low, high } => {
                    let (low, high) = (*low, *high);
                    let ga = tensor::zip_with(&g, x(*input), |g, v| {
                        if v >= low && v <= high { g } else { 0.0 }
                    })?;
                    accumulate(&mut grads[*input], ga)?;
                }
                Op::MatMul(a, b) => {
                    let bt = tensor::permute(x(*b), &[1, 0])?;
                    let at = tensor::permute(x(*a), &[1, 0])?;
                    accumulate(&mut grads[*a], tensor::matmul(&g, &bt)?)?;
                    accumulate(&mut grads[*b], tensor::matmul(&at, &g)?)?;
                }
                Op::Permute { input, axes } => {
                    let ga = tensor::permute(&g, &tensor::invert_axes(axes))?;
                    accumulate(&mut grads[*input], ga)?;
                }
                Op::Reshape(a) => {
                    accumulate(&mut grads[*a], g.reshape(x(*a).shape())?)?;
                }
                Op::SumAxis { input, axis } => {
                    let shape = x(*input).shape();
                    let mut kept = shape.to_vec();
                    kept[*axis] = 1;
                    let ga = tensor::broadcast_to(&g.reshape(&kept)?, shape)?;
                    accumulate(&mut grads[*input], ga)?;
                }
                Op::Sum(a) => {
                    let v = g.item().unwrap_or(0.0);
                    accumulate(&mut grads[*a], Tensor::full(x(*a).shape(), v))?;
                }
                Op::IndexSelect { input, axis, indices } => {
                    let ga = tensor::index_scatter_add(&g, x(*input).shape(), *axis, indices);
                    accumulate(&mut grads[*input], ga)?;
                }
            }
        }

        Ok(out)
    }
}

/// `g * d` for a power term that may have overflowed: zero where either
/// the upstream gradient is zero or the local derivative is not finite.
fn saturated_product(g: f64, d: f64) -> f64 {
    if g == 0.0 || !d.is_finite() { 0.0 } else { g * d }
}

fn accumulate(slot: &mut Option<Tensor>, g: Tensor) -> Result<()> {
    *slot = Some(match slot.take() {
        Some(prev) => tensor::zip_with(&prev, &g, |a, b| a + b)?,
        None => g,
    });
    Ok(())
}

/// Parameter gradients from one backward pass
#[derive(Debug, Clone, Default)]
pub struct Gradients {
    grads: HashMap<ParamId, Tensor>,
}

impl Gradients {
    pub fn get(&self, id: ParamId) -> Option<&Tensor> {
        self.grads.get(&id)
    }

    /// Gradient of `param`, `None` if it did not take part in the pass.
    pub fn wrt(&self, param: &Parameter) -> Option<&Tensor> {
        self.get(param.id())
    }

    pub fn len(&self) -> usize {
        self.grads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grads.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ParamId, &Tensor)> {
        self.grads.iter()
    }

    /// Global L2 norm over every gradient.
    pub fn norm(&self) -> f64 {
        self.grads
            .values()
            .flat_map(|t| t.data().iter())
            .map(|v| v * v)
            .sum::<f64>()
            .sqrt()
    }

    /// Rescales every gradient so the global norm is at most `max_norm`.
    pub fn clip_norm(&mut self, max_norm: f64) {
        let norm = self.norm();
        if norm > max_norm && norm > 0.0 {
            let scale = max_norm / norm;
            for g in self.grads.values_mut() {
                g.data_mut().iter_mut().for_each(|v| *v *= scale);
            }
        }
    }

    fn accumulate(&mut self, id: ParamId, g: Tensor) -> Result<()> {
        let slot = self.grads.remove(&id);
        let merged = match slot {
            Some(prev) => tensor::zip_with(&prev, &g, |a, b| a + b)?,
            None => g,
        };
        self.grads.insert(id, merged);
        Ok(())
    }
}

/// Handle to a node on a [`Tape`]
#[derive(Clone, Copy)]
pub struct Var<'t> {
    tape: &'t Tape,
    id: NodeId,
}

impl fmt::Debug for Var<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Var")
            .field("id", &self.id)
            .field("shape", &self.shape())
            .finish()
    }
}

impl<'t> Var<'t> {
    #[inline]
    pub fn tape(&self) -> &'t Tape {
        self.tape
    }

    /// Shared handle to the computed value.
    pub fn value(&self) -> Rc<Tensor> {
        self.tape.value_of(self.id)
    }

    pub fn to_tensor(&self) -> Tensor {
        self.value().as_ref().clone()
    }

    pub fn shape(&self) -> Vec<usize> {
        self.value().shape().to_vec()
    }

    fn same_tape(&self, other: &Var<'t>) -> Result<()> {
        if std::ptr::eq(self.tape, other.tape) {
            Ok(())
        } else {
            Err(AnfisError::InvalidInput("operands belong to different tapes".into()))
        }
    }

    fn binary(self, other: Var<'t>, f: impl Fn(f64, f64) -> f64, op: fn(NodeId, NodeId) -> Op) -> Result<Var<'t>> {
        self.same_tape(&other)?;
        let out = tensor::zip_with(&self.value(), &other.value(), f)?;
        Ok(self.tape.push(out, op(self.id, other.id)))
    }

    fn unary(self, f: impl Fn(f64) -> f64, op: Op) -> Var<'t> {
        let out = self.value().map(f);
        self.tape.push(out, op)
    }

    // --- Broadcasting binary ops ---

    pub fn add(self, other: Var<'t>) -> Result<Var<'t>> {
        self.binary(other, |a, b| a + b, Op::Add)
    }

    pub fn sub(self, other: Var<'t>) -> Result<Var<'t>> {
        self.binary(other, |a, b| a - b, Op::Sub)
    }

    pub fn mul(self, other: Var<'t>) -> Result<Var<'t>> {
        self.binary(other, |a, b| a * b, Op::Mul)
    }

    pub fn div(self, other: Var<'t>) -> Result<Var<'t>> {
        self.binary(other, |a, b| a / b, Op::Div)
    }

    pub fn maximum(self, other: Var<'t>) -> Result<Var<'t>> {
        self.binary(other, f64::max, Op::Maximum)
    }

    pub fn minimum(self, other: Var<'t>) -> Result<Var<'t>> {
        self.binary(other, f64::min, Op::Minimum)
    }

    /// `self ^ exponent`, elementwise with broadcasting.
    pub fn powf(self, exponent: Var<'t>) -> Result<Var<'t>> {
        self.binary(exponent, f64::powf, Op::Pow)
    }

    // --- Elementwise unary ops ---

    pub fn add_scalar(self, c: f64) -> Var<'t> {
        self.unary(|v| v + c, Op::AddScalar(self.id))
    }

    pub fn mul_scalar(self, c: f64) -> Var<'t> {
        self.unary(|v| v * c, Op::MulScalar(self.id, c))
    }

    pub fn neg(self) -> Var<'t> {
        self.mul_scalar(-1.0)
    }

    pub fn square(self) -> Var<'t> {
        self.unary(|v| v * v, Op::Square(self.id))
    }

    pub fn recip(self) -> Var<'t> {
        self.unary(|v| 1.0 / v, Op::Recip(self.id))
    }

    pub fn exp(self) -> Var<'t> {
        self.unary(f64::exp, Op::Exp(self.id))
    }

    pub fn ln(self) -> Var<'t> {
        self.unary(f64::ln, Op::Ln(self.id))
    }

    pub fn abs(self) -> Var<'t> {
        self.unary(f64::abs, Op::Abs(self.id))
    }

    pub fn relu(self) -> Var<'t> {
        self.unary(activations::relu, Op::Relu(self.id))
    }

    pub fn sigmoid(self) -> Var<'t> {
        self.unary(activations::sigmoid, Op::Sigmoid(self.id))
    }

    pub fn tanh(self) -> Var<'t> {
        self.unary(activations::tanh, Op::Tanh(self.id))
    }

    /// Elementwise clamp into `[low, high]`.
    pub fn clamp(self, low: f64, high: f64) -> Var<'t> {
        self.unary(|v| v.max(low).min(high), Op::Clamp { input: self.id, low, high })
    }

    // --- Structural ops ---

    /// `[n, k] x [k, m] -> [n, m]`
    pub fn matmul(self, other: Var<'t>) -> Result<Var<'t>> {
        self.same_tape(&other)?;
        let out = tensor::matmul(&self.value(), &other.value())?;
        Ok(self.tape.push(out, Op::MatMul(self.id, other.id)))
    }

    pub fn permute(self, axes: &[usize]) -> Result<Var<'t>> {
        let out = tensor::permute(&self.value(), axes)?;
        Ok(self.tape.push(out, Op::Permute { input: self.id, axes: axes.to_vec() }))
    }

    /// Matrix transpose.
    pub fn transpose(self) -> Result<Var<'t>> {
        let rank = self.value().rank();
        if rank != 2 {
            return Err(AnfisError::shape("rank-2 tensor", format!("rank {}", rank)));
        }
        self.permute(&[1, 0])
    }

    pub fn reshape(self, shape: &[usize]) -> Result<Var<'t>> {
        let out = self.value().reshape(shape)?;
        Ok(self.tape.push(out, Op::Reshape(self.id)))
    }

    pub fn sum_axis(self, axis: usize, keepdim: bool) -> Result<Var<'t>> {
        let out = tensor::sum_axis(&self.value(), axis, keepdim)?;
        Ok(self.tape.push(out, Op::SumAxis { input: self.id, axis }))
    }

    /// Sum of every element, as a scalar.
    pub fn sum(self) -> Var<'t> {
        let total = self.value().sum();
        self.tape.push(Tensor::scalar(total), Op::Sum(self.id))
    }

    pub fn mean(self) -> Var<'t> {
        let n = self.value().len().max(1);
        self.sum().mul_scalar(1.0 / n as f64)
    }

    /// Gathers `indices` along `axis`; indices may repeat.
    pub fn index_select(self, axis: usize, indices: &[usize]) -> Result<Var<'t>> {
        let out = tensor::index_select(&self.value(), axis, indices)?;
        Ok(self.tape.push(
            out,
            Op::IndexSelect {
                input: self.id,
                axis,
                indices: indices.to_vec(),
            },
        ))
    }
}
