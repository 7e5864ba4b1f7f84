//! Plain numeric CSV reading for `eval` and `train`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};

/// Numeric rows of a comma separated file.
///
/// Blank lines and `#` comments are skipped. A first line that does not
/// parse as numbers is taken as a header.
pub fn read_rows(path: &Path) -> Result<Vec<Vec<f64>>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_rows(&text).with_context(|| format!("parsing {}", path.display()))
}

pub fn parse_rows(text: &str) -> Result<Vec<Vec<f64>>> {
    let mut rows: Vec<Vec<f64>> = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let parsed: std::result::Result<Vec<f64>, _> = line.split(',').map(|f| f.trim().parse::<f64>()).collect();
        match parsed {
            Ok(row) => {
                if let Some(first) = rows.first() {
                    if first.len() != row.len() {
                        bail!("line {}: expected {} columns, found {}", lineno + 1, first.len(), row.len());
                    }
                }
                rows.push(row);
            }
            Err(_) if rows.is_empty() && lineno == first_content_line(text) => continue,
            Err(e) => bail!("line {}: {}", lineno + 1, e),
        }
    }
    if rows.is_empty() {
        bail!("no data rows");
    }
    Ok(rows)
}

fn first_content_line(text: &str) -> usize {
    text.lines()
        .position(|l| {
            let l = l.trim();
            !l.is_empty() && !l.starts_with('#')
        })
        .unwrap_or(0)
}

/// Splits each row into features and the last column.
pub fn split_target(rows: &[Vec<f64>]) -> Result<(Vec<Vec<f64>>, Vec<f64>)> {
    let mut features = Vec::with_capacity(rows.len());
    let mut targets = Vec::with_capacity(rows.len());
    for row in rows {
        let Some((&target, xs)) = row.split_last() else {
            bail!("empty row");
        };
        if xs.is_empty() {
            bail!("rows need at least one feature column before the target");
        }
        features.push(xs.to_vec());
        targets.push(target);
    }
    Ok((features, targets))
}

/// Class labels from a float target column.
pub fn labels(targets: &[f64], n_classes: usize) -> Result<Vec<usize>> {
    targets
        .iter()
        .map(|&t| {
            if t < 0.0 || t.fract() != 0.0 || t as usize >= n_classes {
                bail!("label {} is not a class index below {}", t, n_classes);
            }
            Ok(t as usize)
        })
        .collect()
}
