//! # Tensor
//!
//! Dense row-major `f64` storage used as the value type of every tape node,
//! every learnable parameter and every model input/output.
//!
//! Shapes follow the usual convention: `[]` is a scalar, `[n]` a vector,
//! `[rows, cols]` a matrix. Binary kernels broadcast NumPy-style (trailing
//! axes aligned, size-1 axes stretched).

use serde::{Deserialize, Serialize};

use crate::error::{AnfisError, Result};

/// Dense row-major tensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTensor")]
pub struct Tensor {
    data: Vec<f64>,
    shape: Vec<usize>,
}

/// Unchecked wire form; every decoded tensor goes through [`Tensor::new`].
#[derive(Deserialize)]
struct RawTensor {
    data: Vec<f64>,
    shape: Vec<usize>,
}

impl TryFrom<RawTensor> for Tensor {
    type Error = AnfisError;

    fn try_from(raw: RawTensor) -> Result<Self> {
        Tensor::new(raw.data, raw.shape)
    }
}

impl Tensor {
    /// Build a tensor, checking that `data` fills `shape` exactly.
    pub fn new(data: Vec<f64>, shape: Vec<usize>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(AnfisError::shape(
                format!("{} elements for shape {:?}", expected, shape),
                format!("{} elements", data.len()),
            ));
        }
        Ok(Self { data, shape })
    }

    /// Internal constructor for kernels that already know the sizes agree.
    pub(crate) fn from_parts(data: Vec<f64>, shape: Vec<usize>) -> Self {
        debug_assert_eq!(data.len(), shape.iter().product::<usize>());
        Self { data, shape }
    }

    pub fn zeros(shape: &[usize]) -> Self {
        Self::full(shape, 0.0)
    }

    pub fn full(shape: &[usize], value: f64) -> Self {
        let n = shape.iter().product();
        Self::from_parts(vec![value; n], shape.to_vec())
    }

    pub fn scalar(value: f64) -> Self {
        Self::from_parts(vec![value], Vec::new())
    }

    pub fn vector(data: Vec<f64>) -> Self {
        let n = data.len();
        Self::from_parts(data, vec![n])
    }

    /// Matrix from equally sized rows.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(AnfisError::shape(
                    format!("row {} with {} columns", i, cols),
                    format!("{} columns", row.len()),
                ));
            }
            data.extend_from_slice(row);
        }
        Ok(Self::from_parts(data, vec![rows.len(), cols]))
    }

    /// `n` evenly spaced points from `start` to `end`, both included.
    pub fn linspace(start: f64, end: f64, n: usize) -> Self {
        let data = match n {
            0 => Vec::new(),
            1 => vec![start],
            _ => {
                let step = (end - start) / (n - 1) as f64;
                (0..n)
                    .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
                    .collect()
            }
        };
        Self::vector(data)
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    /// Value of a single-element tensor.
    pub fn item(&self) -> Option<f64> {
        match self.data.as_slice() {
            [v] => Some(*v),
            _ => None,
        }
    }

    /// Element at a multi-index, `None` when out of range.
    pub fn get(&self, index: &[usize]) -> Option<f64> {
        if index.len() != self.shape.len() {
            return None;
        }
        let mut offset = 0;
        for (&i, (&dim, stride)) in index.iter().zip(self.shape.iter().zip(strides(&self.shape))) {
            if i >= dim {
                return None;
            }
            offset += i * stride;
        }
        self.data.get(offset).copied()
    }

    /// Row `i` of a matrix.
    pub fn row(&self, i: usize) -> Option<&[f64]> {
        match self.shape.as_slice() {
            [rows, cols] if i < *rows => Some(&self.data[i * cols..(i + 1) * cols]),
            _ => None,
        }
    }

    pub fn reshape(&self, shape: &[usize]) -> Result<Self> {
        Self::new(self.data.clone(), shape.to_vec())
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self::from_parts(self.data.iter().map(|&v| f(v)).collect(), self.shape.clone())
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0, |acc, v| acc.max(v.abs()))
    }

    pub fn all_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }
}

// ============================================================================
// Kernels shared by the tape
// ============================================================================

/// Row-major strides of `shape`.
pub(crate) fn strides(shape: &[usize]) -> Vec<usize> {
    let mut out = vec![1; shape.len()];
    for d in (0..shape.len().saturating_sub(1)).rev() {
        out[d] = out[d + 1] * shape[d + 1];
    }
    out
}

/// NumPy broadcast of two shapes.
pub(crate) fn broadcast_shape(a: &[usize], b: &[usize]) -> Option<Vec<usize>> {
    let rank = a.len().max(b.len());
    let mut out = vec![0; rank];
    for i in 0..rank {
        let da = if i + a.len() >= rank { a[i + a.len() - rank] } else { 1 };
        let db = if i + b.len() >= rank { b[i + b.len() - rank] } else { 1 };
        out[i] = match (da, db) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            _ => return None,
        };
    }
    Some(out)
}

/// Strides that read `shape` as if it were stretched to `out_shape`.
fn broadcast_strides(shape: &[usize], out_shape: &[usize]) -> Vec<usize> {
    let offset = out_shape.len() - shape.len();
    let own = strides(shape);
    (0..out_shape.len())
        .map(|i| {
            if i < offset || shape[i - offset] == 1 {
                0
            } else {
                own[i - offset]
            }
        })
        .collect()
}

/// Walks every multi-index of `shape`, tracking one flat offset per stride set.
fn walk<const K: usize>(shape: &[usize], strides: [&[usize]; K], mut visit: impl FnMut([usize; K])) {
    let n: usize = shape.iter().product();
    let mut index = vec![0usize; shape.len()];
    let mut offsets = [0usize; K];
    for _ in 0..n {
        visit(offsets);
        for d in (0..shape.len()).rev() {
            index[d] += 1;
            for k in 0..K {
                offsets[k] += strides[k][d];
            }
            if index[d] < shape[d] {
                break;
            }
            for k in 0..K {
                offsets[k] -= strides[k][d] * shape[d];
            }
            index[d] = 0;
        }
    }
}

/// Elementwise `f(a, b)` with broadcasting.
pub(crate) fn zip_with(a: &Tensor, b: &Tensor, f: impl Fn(f64, f64) -> f64) -> Result<Tensor> {
    let out_shape = broadcast_shape(&a.shape, &b.shape)
        .ok_or_else(|| AnfisError::shape(format!("shape broadcastable with {:?}", a.shape), format!("{:?}", b.shape)))?;
    let sa = broadcast_strides(&a.shape, &out_shape);
    let sb = broadcast_strides(&b.shape, &out_shape);
    let mut data = Vec::with_capacity(out_shape.iter().product());
    walk(&out_shape, [sa.as_slice(), sb.as_slice()], |[oa, ob]| data.push(f(a.data[oa], b.data[ob])));
    Ok(Tensor::from_parts(data, out_shape))
}

/// Sums a broadcast gradient back down to `shape`.
pub(crate) fn sum_to_shape(grad: &Tensor, shape: &[usize]) -> Tensor {
    if grad.shape == shape {
        return grad.clone();
    }
    let mut out = Tensor::zeros(shape);
    let target = broadcast_strides(shape, &grad.shape);
    let own = strides(&grad.shape);
    walk(&grad.shape, [own.as_slice(), target.as_slice()], |[og, ot]| out.data[ot] += grad.data[og]);
    out
}

/// Stretches `t` to `shape`.
pub(crate) fn broadcast_to(t: &Tensor, shape: &[usize]) -> Result<Tensor> {
    zip_with(&Tensor::zeros(shape), t, |_, v| v)
}

/// `[n, k] x [k, m] -> [n, m]`
pub(crate) fn matmul(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    let (n, k, m) = match (a.shape.as_slice(), b.shape.as_slice()) {
        ([n, k], [k2, m]) if k == k2 => (*n, *k, *m),
        _ => {
            return Err(AnfisError::shape(
                format!("[n, k] x [k, m] operands, lhs {:?}", a.shape),
                format!("rhs {:?}", b.shape),
            ));
        }
    };
    let mut out = vec![0.0; n * m];
    for i in 0..n {
        for p in 0..k {
            let av = a.data[i * k + p];
            if av == 0.0 {
                continue;
            }
            let row = &b.data[p * m..(p + 1) * m];
            for (o, &bv) in out[i * m..(i + 1) * m].iter_mut().zip(row) {
                *o += av * bv;
            }
        }
    }
    Ok(Tensor::from_parts(out, vec![n, m]))
}

/// Reorders axes: output axis `i` is input axis `axes[i]`.
pub(crate) fn permute(t: &Tensor, axes: &[usize]) -> Result<Tensor> {
    let rank = t.rank();
    let mut seen = vec![false; rank];
    if axes.len() != rank || axes.iter().any(|&a| a >= rank || std::mem::replace(&mut seen[a], true)) {
        return Err(AnfisError::shape(format!("a permutation of {} axes", rank), format!("{:?}", axes)));
    }
    let own = strides(&t.shape);
    let out_shape: Vec<usize> = axes.iter().map(|&a| t.shape[a]).collect();
    let read: Vec<usize> = axes.iter().map(|&a| own[a]).collect();
    let mut data = Vec::with_capacity(t.len());
    walk(&out_shape, [read.as_slice()], |[o]| data.push(t.data[o]));
    Ok(Tensor::from_parts(data, out_shape))
}

/// Inverse of a permutation.
pub(crate) fn invert_axes(axes: &[usize]) -> Vec<usize> {
    let mut inv = vec![0; axes.len()];
    for (i, &a) in axes.iter().enumerate() {
        inv[a] = i;
    }
    inv
}

/// `(outer, dim, inner)` split of `shape` around `axis`.
fn split_at_axis(shape: &[usize], axis: usize) -> (usize, usize, usize) {
    let outer = shape[..axis].iter().product();
    let inner = shape[axis + 1..].iter().product();
    (outer, shape[axis], inner)
}

fn check_axis(shape: &[usize], axis: usize) -> Result<()> {
    if axis >= shape.len() {
        return Err(AnfisError::shape(format!("axis < {}", shape.len()), format!("axis {}", axis)));
    }
    Ok(())
}

/// Sum over `axis`, keeping it as a size-1 axis when `keepdim`.
pub(crate) fn sum_axis(t: &Tensor, axis: usize, keepdim: bool) -> Result<Tensor> {
    check_axis(&t.shape, axis)?;
    let (outer, dim, inner) = split_at_axis(&t.shape, axis);
    let mut data = vec![0.0; outer * inner];
    for o in 0..outer {
        for d in 0..dim {
            let base = (o * dim + d) * inner;
            for i in 0..inner {
                data[o * inner + i] += t.data[base + i];
            }
        }
    }
    let mut shape = t.shape.clone();
    if keepdim {
        shape[axis] = 1;
    } else {
        shape.remove(axis);
    }
    Ok(Tensor::from_parts(data, shape))
}

/// Gathers `indices` along `axis` (indices may repeat).
pub(crate) fn index_select(t: &Tensor, axis: usize, indices: &[usize]) -> Result<Tensor> {
    check_axis(&t.shape, axis)?;
    let (outer, dim, inner) = split_at_axis(&t.shape, axis);
    if let Some(&bad) = indices.iter().find(|&&i| i >= dim) {
        return Err(AnfisError::shape(format!("index < {} on axis {}", dim, axis), format!("index {}", bad)));
    }
    let mut data = Vec::with_capacity(outer * indices.len() * inner);
    for o in 0..outer {
        for &j in indices {
            let base = (o * dim + j) * inner;
            data.extend_from_slice(&t.data[base..base + inner]);
        }
    }
    let mut shape = t.shape.clone();
    shape[axis] = indices.len();
    Ok(Tensor::from_parts(data, shape))
}

/// Adjoint of [`index_select`]: scatter-adds `grad` into a zero tensor of `shape`.
pub(crate) fn index_scatter_add(grad: &Tensor, shape: &[usize], axis: usize, indices: &[usize]) -> Tensor {
    let (outer, dim, inner) = split_at_axis(shape, axis);
    let mut out = Tensor::zeros(shape);
    for o in 0..outer {
        for (k, &j) in indices.iter().enumerate() {
            let src = (o * indices.len() + k) * inner;
            let dst = (o * dim + j) * inner;
            for i in 0..inner {
                out.data[dst + i] += grad.data[src + i];
            }
        }
    }
    out
}
