//! Model configuration
//!
//! Declarative description of an [`Anfis`](crate::Anfis) model, loadable
//! from JSON or TOML. Environment defaults come from `.env` or the process
//! environment.
//!
//! ```toml
//! seed = 7
//!
//! [[variables]]
//! name = "temperature"
//! n_sets = 3
//! universe = [0.0, 40.0]
//! mf = "gaussian"
//!
//! [consequent]
//! kind = "classification"
//! n_classes = 4
//! ```

use std::env;
use std::path::Path;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::Activation;
use crate::error::{AnfisError, Result};
use crate::membership::{MfKind, Universe, check_set_count};
use crate::rules::rule_count;

static DOTENV_INIT: Lazy<()> = Lazy::new(|| {
    let _ = dotenv::dotenv();
});

#[inline]
fn ensure_loaded() {
    let _ = &*DOTENV_INIT;
}

/// Seed for weight initialisation when a config does not pin one.
/// Default: 42
pub fn default_seed() -> u64 {
    ensure_loaded();
    env::var("ANFIS_SEED")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(42)
}

/// One input variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Number of fuzzy sets (≥ 2)
    pub n_sets: usize,

    /// Universe of discourse `[low, high]`
    pub universe: [f64; 2],

    #[serde(default)]
    pub mf: MfKind,
}

impl VariableConfig {
    pub fn new(n_sets: usize, low: f64, high: f64, mf: MfKind) -> Self {
        Self {
            name: None,
            n_sets,
            universe: [low, high],
            mf,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn universe(&self) -> Result<Universe> {
        Universe::try_from(self.universe)
    }
}

/// Consequent strategy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ConsequentConfig {
    /// First-order Takagi–Sugeno, one affine map per rule
    #[default]
    Regression,

    /// One affine map per (rule, class)
    Classification { n_classes: usize },

    /// Feed-forward network producing every rule's consequent at once
    Learned {
        #[serde(default = "one")]
        n_classes: usize,
        #[serde(default = "one")]
        n_layers: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hidden_features: Option<usize>,
        #[serde(default)]
        activation: Activation,
    },
}

fn one() -> usize {
    1
}

impl ConsequentConfig {
    pub fn n_classes(&self) -> usize {
        match self {
            ConsequentConfig::Regression => 1,
            ConsequentConfig::Classification { n_classes } | ConsequentConfig::Learned { n_classes, .. } => *n_classes,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConsequentConfig::Regression => "regression",
            ConsequentConfig::Classification { .. } => "classification",
            ConsequentConfig::Learned { .. } => "learned",
        }
    }
}

/// Full model description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnfisConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    pub variables: Vec<VariableConfig>,

    #[serde(default)]
    pub consequent: ConsequentConfig,
}

impl AnfisConfig {
    pub fn new(variables: Vec<VariableConfig>, consequent: ConsequentConfig) -> Self {
        Self {
            seed: None,
            variables,
            consequent,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Pinned seed, or the environment default.
    pub fn seed(&self) -> u64 {
        self.seed.unwrap_or_else(default_seed)
    }

    pub fn set_counts(&self) -> Vec<usize> {
        self.variables.iter().map(|v| v.n_sets).collect()
    }

    /// Checks everything construction would reject, without allocating
    /// parameters.
    pub fn validate(&self) -> Result<()> {
        if self.variables.is_empty() {
            return Err(AnfisError::InvalidConfig("at least one input variable is required".into()));
        }
        for var in &self.variables {
            check_set_count(var.n_sets)?;
            var.universe()?;
        }
        rule_count(&self.set_counts())?;
        match &self.consequent {
            ConsequentConfig::Regression => {}
            ConsequentConfig::Classification { n_classes } => check_positive("n_classes", *n_classes)?,
            ConsequentConfig::Learned {
                n_classes,
                n_layers,
                hidden_features,
                ..
            } => {
                check_positive("n_classes", *n_classes)?;
                check_positive("n_layers", *n_layers)?;
                if let Some(h) = hidden_features {
                    check_positive("hidden_features", *h)?;
                }
            }
        }
        Ok(())
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    /// Loads `.json` or `.toml` by extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = match Format::of(path)? {
            Format::Json => Self::from_json_str(&text)?,
            Format::Toml => Self::from_toml_str(&text)?,
        };
        debug!(path = %path.display(), variables = config.variables.len(), "loaded config");
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = match Format::of(path)? {
            Format::Json => self.to_json()?,
            Format::Toml => self.to_toml()?,
        };
        std::fs::write(path, text)?;
        Ok(())
    }
}

fn check_positive(what: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(AnfisError::InvalidConfig(format!("{} must be at least 1", what)));
    }
    Ok(())
}

enum Format {
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()).map(str::to_lowercase).as_deref() {
            Some("json") => Ok(Format::Json),
            Some("toml") => Ok(Format::Toml),
            _ => Err(AnfisError::InvalidConfig(format!(
                "unsupported config format: {} (expected .json or .toml)",
                path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML: &str = r#"
seed = 7

[[variables]]
name = "temperature"
n_sets = 3
universe = [0.0, 40.0]

[[variables]]
n_sets = 2
universe = [-1.0, 1.0]
mf = "bell"

[consequent]
kind = "learned"
n_classes = 4
n_layers = 2
activation = "tanh"
"#;

    #[test]
    fn test_parse_toml() {
        let config = AnfisConfig::from_toml_str(TOML).unwrap();
        assert_eq!(config.seed(), 7);
        assert_eq!(config.set_counts(), vec![3, 2]);
        assert_eq!(config.variables[0].mf, MfKind::Gaussian);
        assert_eq!(config.variables[1].mf, MfKind::Bell);
        assert_eq!(
            config.consequent,
            ConsequentConfig::Learned {
                n_classes: 4,
                n_layers: 2,
                hidden_features: None,
                activation: Activation::Tanh,
            }
        );
    }

    #[test]
    fn test_consequent_defaults_to_regression() {
        let config =
            AnfisConfig::from_json_str(r#"{"variables": [{"n_sets": 2, "universe": [0.0, 1.0]}]}"#).unwrap();
        assert_eq!(config.consequent, ConsequentConfig::Regression);
        assert_eq!(config.consequent.n_classes(), 1);
    }

    #[test]
    fn test_validation_errors() {
        let bad_sets = r#"{"variables": [{"n_sets": 1, "universe": [0.0, 1.0]}]}"#;
        assert!(matches!(AnfisConfig::from_json_str(bad_sets), Err(AnfisError::InvalidSetCount(1))));

        let bad_uod = r#"{"variables": [{"n_sets": 2, "universe": [1.0, 0.0]}]}"#;
        assert!(matches!(AnfisConfig::from_json_str(bad_uod), Err(AnfisError::InvalidUniverse { .. })));

        let no_vars = r#"{"variables": []}"#;
        assert!(AnfisConfig::from_json_str(no_vars).is_err());

        let zero_classes = r#"{"variables": [{"n_sets": 2, "universe": [0.0, 1.0]}],
                              "consequent": {"kind": "classification", "n_classes": 0}}"#;
        assert!(matches!(AnfisConfig::from_json_str(zero_classes), Err(AnfisError::InvalidConfig(_))));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = AnfisConfig::from_toml_str(TOML).unwrap();
        let again = AnfisConfig::from_toml_str(&config.to_toml().unwrap()).unwrap();
        assert_eq!(config, again);
    }

    #[test]
    fn test_unknown_extension() {
        let config = AnfisConfig::new(vec![VariableConfig::new(2, 0.0, 1.0, MfKind::Sigmoid)], Default::default());
        assert!(config.save("model.yaml").is_err());
    }
}
