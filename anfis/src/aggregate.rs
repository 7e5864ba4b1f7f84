//! # Aggregation
//!
//! Weighted sum of per-rule consequents by normalized firing strength,
//! reducing over the rule axis.

use crate::core::Var;
use crate::error::{AnfisError, Result};

/// `norm [N, R] · cons [N, R]` summed over rules -> `[N]`
pub fn regression<'t>(normalized: Var<'t>, consequents: Var<'t>) -> Result<Var<'t>> {
    let (ns, cs) = (normalized.shape(), consequents.shape());
    if ns.len() != 2 || ns != cs {
        return Err(AnfisError::shape(format!("consequents {:?}", ns), format!("{:?}", cs)));
    }
    normalized.mul(consequents)?.sum_axis(1, false)
}

/// `norm [N, R]` against rule-major `cons [R, N, C]` -> `[N, C]`
pub fn classification<'t>(normalized: Var<'t>, consequents: Var<'t>) -> Result<Var<'t>> {
    let (ns, cs) = (normalized.shape(), consequents.shape());
    let (n, r) = match (ns.as_slice(), cs.as_slice()) {
        ([n, r], [cr, cn, _]) if cr == r && cn == n => (*n, *r),
        _ => {
            return Err(AnfisError::shape(
                format!("consequents [{}, {}, C]", ns.get(1).copied().unwrap_or(0), ns.first().copied().unwrap_or(0)),
                format!("{:?}", cs),
            ));
        }
    };
    let weights = normalized.transpose()?.reshape(&[r, n, 1])?;
    weights.mul(consequents)?.sum_axis(0, false)
}

/// `norm [.., R]` against `cons [.., R·C]` -> `[.., C]`, or `[..]` when
/// `n_classes == 1`.
pub fn learned<'t>(normalized: Var<'t>, consequents: Var<'t>, n_classes: usize) -> Result<Var<'t>> {
    let (ns, cs) = (normalized.shape(), consequents.shape());
    let Some((&r, lead)) = ns.split_last() else {
        return Err(AnfisError::shape("firing strengths of rank >= 1", "scalar"));
    };
    if n_classes == 0 || cs.len() != ns.len() || cs[..lead.len()] != *lead || cs[lead.len()] != r * n_classes {
        return Err(AnfisError::shape(format!("consequents {:?}·{}", ns, n_classes), format!("{:?}", cs)));
    }

    let mut grouped = lead.to_vec();
    grouped.extend([r, n_classes]);
    let mut weight_shape = lead.to_vec();
    weight_shape.extend([r, 1]);

    let weighted = normalized
        .reshape(&weight_shape)?
        .mul(consequents.reshape(&grouped)?)?
        .sum_axis(lead.len(), false)?;
    if n_classes == 1 { weighted.reshape(lead) } else { Ok(weighted) }
}
