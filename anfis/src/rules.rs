//! # Rule Base
//!
//! Rules are the full Cartesian product of every variable's fuzzy sets,
//! enumerated once at construction into a flat `n_rules × n_vars` index
//! table (row-major multi-index unravel, last variable fastest):
//!
//! ```text
//!   n_sets = [2, 3]
//!
//!   rule │ x0  x1
//!   ─────┼────────
//!     0  │  0   0
//!     1  │  0   1
//!     2  │  0   2
//!     3  │  1   0
//!     4  │  1   1
//!     5  │  1   2
//! ```
//!
//! Firing strength is the product t-norm over the selected memberships,
//! normalized per sample by `row / (Σ row + FIRING_EPSILON)`.

use tracing::trace;

use crate::core::{Tensor, Var};
use crate::error::{AnfisError, Result};
use crate::membership::check_set_count;

/// Added to each row sum before normalizing.
pub const FIRING_EPSILON: f64 = 1e-8;

/// Precomputed rule index table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleBase {
    set_counts: Vec<usize>,
    n_rules: usize,
    table: Vec<usize>,
    /// `columns[v][r]` = set of variable `v` selected by rule `r`
    columns: Vec<Vec<usize>>,
}

/// Raw and normalized firing strengths, both `(N × n_rules)`
#[derive(Debug, Clone, Copy)]
pub struct FiringStrengths<'t> {
    pub raw: Var<'t>,
    pub normalized: Var<'t>,
}

/// Π n_sets, or a config error on overflow.
pub fn rule_count(set_counts: &[usize]) -> Result<usize> {
    set_counts.iter().try_fold(1usize, |acc, &n| {
        acc.checked_mul(n)
            .ok_or_else(|| AnfisError::InvalidConfig(format!("rule count overflows for sets {:?}", set_counts)))
    })
}

impl RuleBase {
    pub fn new(set_counts: &[usize]) -> Result<Self> {
        if set_counts.is_empty() {
            return Err(AnfisError::InvalidConfig("at least one input variable is required".into()));
        }
        for &n in set_counts {
            check_set_count(n)?;
        }
        let n_rules = rule_count(set_counts)?;
        let n_vars = set_counts.len();

        let mut table = vec![0; n_rules * n_vars];
        for rule in 0..n_rules {
            let mut rest = rule;
            for v in (0..n_vars).rev() {
                table[rule * n_vars + v] = rest % set_counts[v];
                rest /= set_counts[v];
            }
        }
        let columns = (0..n_vars)
            .map(|v| (0..n_rules).map(|r| table[r * n_vars + v]).collect())
            .collect();

        Ok(Self {
            set_counts: set_counts.to_vec(),
            n_rules,
            table,
            columns,
        })
    }

    pub fn n_rules(&self) -> usize {
        self.n_rules
    }

    pub fn n_vars(&self) -> usize {
        self.set_counts.len()
    }

    pub fn set_counts(&self) -> &[usize] {
        &self.set_counts
    }

    /// Set index chosen for each variable by `rule`.
    pub fn antecedent(&self, rule: usize) -> Option<&[usize]> {
        if rule >= self.n_rules {
            return None;
        }
        let n_vars = self.n_vars();
        Some(&self.table[rule * n_vars..(rule + 1) * n_vars])
    }

    /// Inverse of [`antecedent`](Self::antecedent).
    pub fn rule_index(&self, sets: &[usize]) -> Option<usize> {
        if sets.len() != self.n_vars() {
            return None;
        }
        let mut index = 0;
        for (&s, &n) in sets.iter().zip(&self.set_counts) {
            if s >= n {
                return None;
            }
            index = index * n + s;
        }
        Some(index)
    }

    /// Combines per-variable memberships `(N × n_sets_v)` into firing
    /// strengths.
    pub fn forward<'t>(&self, memberships: &[Var<'t>]) -> Result<FiringStrengths<'t>> {
        if memberships.len() != self.n_vars() {
            return Err(AnfisError::shape(
                format!("{} membership matrices", self.n_vars()),
                memberships.len(),
            ));
        }

        let mut rows = None;
        let mut raw: Option<Var<'t>> = None;
        for ((m, &n_sets), column) in memberships.iter().zip(&self.set_counts).zip(&self.columns) {
            let shape = m.shape();
            let n = match shape.as_slice() {
                [n, s] if *s == n_sets => *n,
                _ => return Err(AnfisError::shape(format!("[N, {}]", n_sets), format!("{:?}", shape))),
            };
            if *rows.get_or_insert(n) != n {
                return Err(AnfisError::shape(format!("{} rows", rows.unwrap_or(n)), format!("{} rows", n)));
            }
            let gathered = m.index_select(1, column)?;
            raw = Some(match raw {
                Some(acc) => acc.mul(gathered)?,
                None => gathered,
            });
        }
        let raw = raw.ok_or_else(|| AnfisError::InvalidConfig("empty rule base".into()))?;

        let total = raw.sum_axis(1, true)?.add_scalar(FIRING_EPSILON);
        let normalized = raw.div(total)?;

        trace!(
            rows = rows.unwrap_or(0),
            rules = self.n_rules,
            degenerate = degenerate_rows(&raw.value()),
            "firing strengths"
        );
        Ok(FiringStrengths { raw, normalized })
    }
}

/// Rows whose raw firing strengths sum below the normalization epsilon.
pub fn degenerate_rows(raw: &Tensor) -> usize {
    let Some(&cols) = raw.shape().last() else { return 0 };
    if cols == 0 {
        return 0;
    }
    raw.data()
        .chunks(cols)
        .filter(|row| row.iter().sum::<f64>() < FIRING_EPSILON)
        .count()
}
