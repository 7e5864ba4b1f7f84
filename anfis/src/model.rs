//! # ANFIS Model
//!
//! Full inference pipeline:
//!
//! ```text
//!   x [N, V] ──┬─▶ mf_v(x[:, v])  ──▶ RuleBase ──▶ normalized [N, R] ──┐
//!              │                                                       ├─▶ aggregate ─▶ output
//!              └─▶ consequent(x) ─────────────────────────────────────┘
//! ```
//!
//! Sequential input `[N, T, V]` is accepted with the learned consequent
//! only; every `(n, t)` row is fuzzified on its own and the firing
//! strengths come back as `[N, T, R]`.

use std::collections::{HashMap, HashSet};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, trace};

use crate::aggregate;
use crate::config::{AnfisConfig, ConsequentConfig};
use crate::consequent::{Consequent, LearnedConsequent, LearnedOptions, LinearClassification, LinearRegression};
use crate::core::{Gradients, Parameter, ParameterSnapshot, Tape, Tensor, Var};
use crate::error::{AnfisError, Result};
use crate::membership::MembershipFn;
use crate::rules::{FiringStrengths, RuleBase, degenerate_rows};

/// One named input variable and its fuzzifier
#[derive(Debug, Clone)]
pub struct Variable {
    name: String,
    mf: MembershipFn,
}

impl Variable {
    pub fn new(name: impl Into<String>, mf: MembershipFn) -> Self {
        Self { name: name.into(), mf }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mf(&self) -> &MembershipFn {
        &self.mf
    }

    pub fn mf_mut(&mut self) -> &mut MembershipFn {
        &mut self.mf
    }
}

/// Result of one forward pass
#[derive(Debug, Clone, Copy)]
pub struct AnfisOutput<'t> {
    /// `[N]` / `[N, C]`, with a `T` axis after `N` for sequences
    pub output: Var<'t>,
    pub firing: FiringStrengths<'t>,
}

/// Adaptive neuro-fuzzy inference system
#[derive(Debug, Clone)]
pub struct Anfis {
    variables: Vec<Variable>,
    rules: RuleBase,
    consequent: Consequent,
}

impl Anfis {
    pub fn new(variables: Vec<Variable>, consequent: Consequent) -> Result<Self> {
        let set_counts: Vec<usize> = variables.iter().map(|v| v.mf.n_sets()).collect();
        let rules = RuleBase::new(&set_counts)?;
        if consequent.n_rules() != rules.n_rules() {
            return Err(AnfisError::RuleCountMismatch {
                declared: consequent.n_rules(),
                product: rules.n_rules(),
            });
        }
        if consequent.in_features() != variables.len() {
            return Err(AnfisError::InvalidConfig(format!(
                "consequent reads {} features but the model has {} variables",
                consequent.in_features(),
                variables.len()
            )));
        }

        let model = Self {
            variables,
            rules,
            consequent,
        };
        debug!(
            n_vars = model.n_vars(),
            n_rules = model.n_rules(),
            consequent = model.consequent.name(),
            parameters = model.parameter_count(),
            "anfis model"
        );
        Ok(model)
    }

    pub fn from_config(config: &AnfisConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.seed());

        let mut variables = Vec::with_capacity(config.variables.len());
        for (i, var) in config.variables.iter().enumerate() {
            let mf = MembershipFn::new(var.mf, var.n_sets, var.universe()?)?;
            let name = var.name.clone().unwrap_or_else(|| format!("x{}", i));
            variables.push(Variable::new(name, mf));
        }

        let set_counts = config.set_counts();
        let consequent: Consequent = match &config.consequent {
            ConsequentConfig::Regression => LinearRegression::with_rng(&set_counts, &mut rng)?.into(),
            ConsequentConfig::Classification { n_classes } => {
                LinearClassification::with_rng(&set_counts, *n_classes, &mut rng)?.into()
            }
            ConsequentConfig::Learned {
                n_classes,
                n_layers,
                hidden_features,
                activation,
            } => {
                let options = LearnedOptions {
                    hidden_features: *hidden_features,
                    activation: *activation,
                };
                let n_rules = crate::rules::rule_count(&set_counts)?;
                LearnedConsequent::with_options(set_counts.len(), n_rules, *n_classes, *n_layers, options, &mut rng)?
                    .into()
            }
        };
        Self::new(variables, consequent)
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut [Variable] {
        &mut self.variables
    }

    pub fn rules(&self) -> &RuleBase {
        &self.rules
    }

    pub fn consequent(&self) -> &Consequent {
        &self.consequent
    }

    pub fn n_vars(&self) -> usize {
        self.variables.len()
    }

    pub fn n_rules(&self) -> usize {
        self.rules.n_rules()
    }

    pub fn n_classes(&self) -> usize {
        self.consequent.n_classes()
    }

    /// Total learnable scalars.
    pub fn parameter_count(&self) -> usize {
        self.named_parameters().iter().map(|(_, p)| p.numel()).sum()
    }

    pub fn forward<'t>(&self, tape: &'t Tape, x: Var<'t>) -> Result<AnfisOutput<'t>> {
        let shape = x.shape();
        let v = self.n_vars();
        let (lead, flat) = match shape.as_slice() {
            [n, f] if *f == v => (vec![*n], x),
            [n, t, f] if *f == v => {
                if !self.consequent.accepts_sequences() {
                    return Err(AnfisError::shape(
                        format!("[N, {}] for the {} consequent", v, self.consequent.name()),
                        format!("{:?}", shape),
                    ));
                }
                (vec![*n, *t], x.reshape(&[n * t, v])?)
            }
            _ => return Err(AnfisError::shape(format!("[N, {v}] or [N, T, {v}]"), format!("{:?}", shape))),
        };
        let rows: usize = lead.iter().product();

        let mut memberships = Vec::with_capacity(v);
        for (i, var) in self.variables.iter().enumerate() {
            let column = flat.index_select(1, &[i])?.reshape(&[rows])?;
            memberships.push(var.mf.forward(tape, column)?);
        }
        let firing = self.rules.forward(&memberships)?;
        let firing = if lead.len() > 1 {
            let mut firing_shape = lead.clone();
            firing_shape.push(self.n_rules());
            FiringStrengths {
                raw: firing.raw.reshape(&firing_shape)?,
                normalized: firing.normalized.reshape(&firing_shape)?,
            }
        } else {
            firing
        };

        let consequents = self.consequent.forward(tape, x)?;
        let output = match &self.consequent {
            Consequent::Regression(_) => aggregate::regression(firing.normalized, consequents)?,
            Consequent::Classification(_) => aggregate::classification(firing.normalized, consequents)?,
            Consequent::Learned(c) => aggregate::learned(firing.normalized, consequents, c.n_classes())?,
        };

        trace!(
            input = ?shape,
            output = ?output.shape(),
            degenerate = degenerate_rows(&firing.raw.value()),
            "anfis forward"
        );
        Ok(AnfisOutput { output, firing })
    }

    /// Forward pass on a throw-away tape.
    pub fn predict(&self, x: &Tensor) -> Result<Tensor> {
        let tape = Tape::new();
        let input = tape.constant(x.clone());
        Ok(self.forward(&tape, input)?.output.to_tensor())
    }

    /// Every parameter under a stable dotted name, in model order:
    /// `mf.{i}.{local}` then `consequent.{local}`.
    pub fn named_parameters(&self) -> Vec<(String, &Parameter)> {
        let mut named = Vec::new();
        for (i, var) in self.variables.iter().enumerate() {
            for p in var.mf.parameters() {
                named.push((format!("mf.{}.{}", i, p.name()), p));
            }
        }
        for (local, p) in self.consequent.named_parameters() {
            named.push((format!("consequent.{}", local), p));
        }
        named
    }

    pub fn named_parameters_mut(&mut self) -> Vec<(String, &mut Parameter)> {
        let mut named = Vec::new();
        for (i, var) in self.variables.iter_mut().enumerate() {
            for p in var.mf.parameters_mut() {
                named.push((format!("mf.{}.{}", i, p.name()), p));
            }
        }
        for (local, p) in self.consequent.named_parameters_mut() {
            named.push((format!("consequent.{}", local), p));
        }
        named
    }

    pub fn parameters(&self) -> Vec<&Parameter> {
        self.named_parameters().into_iter().map(|(_, p)| p).collect()
    }

    /// For [`Optimizer::step`](crate::core::Optimizer::step).
    pub fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        self.named_parameters_mut().into_iter().map(|(_, p)| p).collect()
    }

    /// Hands each parameter with a gradient to `update`; returns how many
    /// were visited.
    pub fn apply_gradients(
        &mut self,
        grads: &Gradients,
        mut update: impl FnMut(&mut Parameter, &Tensor) -> Result<()>,
    ) -> Result<usize> {
        let mut visited = 0;
        for p in self.parameters_mut() {
            if let Some(g) = grads.get(p.id()) {
                update(p, g)?;
                visited += 1;
            }
        }
        Ok(visited)
    }

    pub fn snapshot(&self) -> ParameterSnapshot {
        ParameterSnapshot::from_named(self.named_parameters())
    }

    /// Restores parameter values by name. Either every parameter is
    /// restored or none is.
    pub fn restore(&mut self, snapshot: &ParameterSnapshot) -> Result<()> {
        let mut by_name = HashMap::new();
        for entry in &snapshot.entries {
            by_name.insert(entry.name.as_str(), entry);
        }

        let mut named = self.named_parameters_mut();
        let known: HashSet<&str> = named.iter().map(|(n, _)| n.as_str()).collect();
        if let Some(entry) = snapshot.entries.iter().find(|e| !known.contains(e.name.as_str())) {
            return Err(AnfisError::UnknownParameter(entry.name.clone()));
        }

        let mut staged = Vec::with_capacity(named.len());
        for (name, p) in &named {
            let entry = by_name
                .get(name.as_str())
                .ok_or_else(|| AnfisError::MissingParameter(name.clone()))?;
            if entry.shape != p.value().shape() {
                return Err(AnfisError::shape(
                    format!("{} with shape {:?}", name, p.value().shape()),
                    format!("{:?}", entry.shape),
                ));
            }
            staged.push(Tensor::new(entry.values.clone(), entry.shape.clone())?);
        }

        for ((_, p), value) in named.iter_mut().zip(staged) {
            p.set_value(value)?;
        }
        debug!(parameters = snapshot.len(), "restored snapshot");
        Ok(())
    }

    /// Antecedent of every rule, e.g. `x0 is S1 AND x1 is S0`.
    pub fn rule_labels(&self) -> Vec<String> {
        (0..self.n_rules())
            .filter_map(|r| self.rules.antecedent(r))
            .map(|sets| {
                sets.iter()
                    .zip(&self.variables)
                    .map(|(s, var)| format!("{} is S{}", var.name, s))
                    .collect::<Vec<_>>()
                    .join(" AND ")
            })
            .collect()
    }
}
