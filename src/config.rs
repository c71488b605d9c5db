//! Engine configuration
//!
//! Budget policy and noise seeding are chosen here rather than by picking an
//! agent type in code.
//!
//! ```json
//! { "budget": { "policy": "fixed_cap", "ceiling": 1.0 }, "noise": { "seed": null } }
//! ```
//!
//! Environment overrides (invalid values are ignored with a warning):
//! - `TRUENO_DP_POLICY` = `unlimited` | `fixed_cap` | `shared_pool`
//! - `TRUENO_DP_MAX_EPSILON` = ceiling
//! - `TRUENO_DP_SEED` = fixed noise seed (tests only)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable selecting the budget policy
pub const ENV_POLICY: &str = "TRUENO_DP_POLICY";
/// Environment variable setting the budget ceiling
pub const ENV_MAX_EPSILON: &str = "TRUENO_DP_MAX_EPSILON";
/// Environment variable fixing the noise seed
pub const ENV_SEED: &str = "TRUENO_DP_SEED";

/// Which denial policy agents get.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPolicyKind {
    /// Accounting only
    #[default]
    Unlimited,
    /// Each agent capped independently
    FixedCap,
    /// All agents of one engine share a single ceiling
    SharedPool,
}

impl std::str::FromStr for BudgetPolicyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unlimited" => Ok(Self::Unlimited),
            "fixed_cap" => Ok(Self::FixedCap),
            "shared_pool" => Ok(Self::SharedPool),
            other => Err(Error::InvalidConfig(format!("unknown budget policy: {other}"))),
        }
    }
}

/// Budget section.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Denial policy
    pub policy: BudgetPolicyKind,
    /// Ceiling for `fixed_cap` and `shared_pool`
    pub ceiling: Option<f64>,
}

/// Noise section.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Fixed seed; `None` seeds from OS entropy
    pub seed: Option<u64>,
}

/// Full engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacyConfig {
    /// Budget policy and ceiling
    pub budget: BudgetConfig,
    /// Noise seeding
    pub noise: NoiseConfig,
}

impl PrivacyConfig {
    /// Unlimited budget, entropy-seeded noise.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Per-agent ceiling.
    #[must_use]
    pub fn fixed_cap(ceiling: f64) -> Self {
        Self {
            budget: BudgetConfig {
                policy: BudgetPolicyKind::FixedCap,
                ceiling: Some(ceiling),
            },
            ..Self::default()
        }
    }

    /// One ceiling shared by every agent.
    #[must_use]
    pub fn shared_pool(ceiling: f64) -> Self {
        Self {
            budget: BudgetConfig {
                policy: BudgetPolicyKind::SharedPool,
                ceiling: Some(ceiling),
            },
            ..Self::default()
        }
    }

    /// Fix the noise seed (reproducible output; tests only).
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.noise.seed = Some(seed);
        self
    }

    /// Parse from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] for malformed JSON or [`Error::InvalidConfig`]
    /// if the result fails [`Self::validate`].
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, otherwise as
    /// [`Self::from_json_str`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Apply `TRUENO_DP_*` environment overrides (best-effort).
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_POLICY) {
            match v.parse::<BudgetPolicyKind>() {
                Ok(policy) => self.budget.policy = policy,
                Err(e) => tracing::warn!(%e, "ignoring {ENV_POLICY}"),
            }
        }

        if let Some(v) = lookup(ENV_MAX_EPSILON) {
            match v.trim().parse::<f64>() {
                Ok(x) if x.is_finite() && x >= 0.0 => self.budget.ceiling = Some(x),
                _ => tracing::warn!(value = %v, "ignoring {ENV_MAX_EPSILON}"),
            }
        }

        if let Some(v) = lookup(ENV_SEED) {
            match v.trim().parse::<u64>() {
                Ok(seed) => self.noise.seed = Some(seed),
                Err(_) => tracing::warn!(value = %v, "ignoring {ENV_SEED}"),
            }
        }

        self
    }

    /// Check the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a capped policy has no ceiling or
    /// the ceiling is negative or not finite.
    pub fn validate(&self) -> Result<()> {
        match (self.budget.policy, self.budget.ceiling) {
            (BudgetPolicyKind::Unlimited, _) => Ok(()),
            (_, None) => Err(Error::InvalidConfig(format!(
                "{:?} policy requires a ceiling",
                self.budget.policy
            ))),
            (_, Some(c)) if !c.is_finite() || c < 0.0 => Err(Error::InvalidConfig(format!(
                "budget ceiling must be finite and >= 0, got {c}"
            ))),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_is_unlimited() {
        let config = PrivacyConfig::default();
        assert_eq!(config.budget.policy, BudgetPolicyKind::Unlimited);
        assert_eq!(config.noise.seed, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_apply() {
        let config = PrivacyConfig::default().with_overrides(env(&[
            (ENV_POLICY, "fixed_cap"),
            (ENV_MAX_EPSILON, "2.5"),
            (ENV_SEED, "7"),
        ]));

        assert_eq!(config.budget.policy, BudgetPolicyKind::FixedCap);
        assert_eq!(config.budget.ceiling, Some(2.5));
        assert_eq!(config.noise.seed, Some(7));
    }

    #[test]
    fn test_invalid_overrides_ignored() {
        let config = PrivacyConfig::fixed_cap(1.0).with_overrides(env(&[
            (ENV_POLICY, "infinite"),
            (ENV_MAX_EPSILON, "-3"),
            (ENV_SEED, "abc"),
        ]));

        assert_eq!(config, PrivacyConfig::fixed_cap(1.0));
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("Shared_Pool".parse::<BudgetPolicyKind>().unwrap(), BudgetPolicyKind::SharedPool);
        assert!("gaussian".parse::<BudgetPolicyKind>().is_err());
    }
}
