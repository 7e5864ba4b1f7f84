//! # Learnable Parameters
//!
//! A [`Parameter`] is a named tensor with a process-unique [`ParamId`]. The
//! tape records parameters as leaves keyed by that id, so gradients from a
//! backward pass can be routed back to the owning module after the pass.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::tensor::Tensor;
use crate::error::{AnfisError, Result};

static NEXT_PARAM_ID: AtomicU64 = AtomicU64::new(0);

/// Identity of a parameter on the tape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId(u64);

impl ParamId {
    fn fresh() -> Self {
        ParamId(NEXT_PARAM_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Named learnable tensor
///
/// A clone is a new parameter: it copies name and value but gets its own
/// [`ParamId`], so gradients and optimizer state never cross between a
/// model and its copy.
#[derive(Debug)]
pub struct Parameter {
    id: ParamId,
    name: String,
    value: Tensor,
}

impl Clone for Parameter {
    fn clone(&self) -> Self {
        Self::new(self.name.clone(), self.value.clone())
    }
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: Tensor) -> Self {
        Self {
            id: ParamId::fresh(),
            name: name.into(),
            value,
        }
    }

    #[inline]
    pub fn id(&self) -> ParamId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn value(&self) -> &Tensor {
        &self.value
    }

    /// Raw mutable access; shape is fixed, values are free.
    #[inline]
    pub fn values_mut(&mut self) -> &mut [f64] {
        self.value.data_mut()
    }

    /// Replace the value, keeping the shape.
    pub fn set_value(&mut self, value: Tensor) -> Result<()> {
        if value.shape() != self.value.shape() {
            return Err(AnfisError::shape(
                format!("{:?} for parameter {}", self.value.shape(), self.name),
                format!("{:?}", value.shape()),
            ));
        }
        self.value = value;
        Ok(())
    }

    pub fn numel(&self) -> usize {
        self.value.len()
    }
}

/// One saved parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub name: String,
    pub shape: Vec<usize>,
    pub values: Vec<f64>,
}

/// Parameter values by name, in model order. Nothing else is captured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSnapshot {
    pub entries: Vec<SnapshotEntry>,
}

impl ParameterSnapshot {
    pub fn from_named<'a>(named: impl IntoIterator<Item = (String, &'a Parameter)>) -> Self {
        let entries = named
            .into_iter()
            .map(|(name, p)| SnapshotEntry {
                name,
                shape: p.value().shape().to_vec(),
                values: p.value().data().to_vec(),
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&SnapshotEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
