//! # Trueno-Privacy: Differentially Private Query Engine
//!
//! **Version**: 0.1.0
//!
//! Trueno-Privacy runs aggregate statistics over sensitive rows and releases
//! only Laplace-noised results, charging every release against an explicit,
//! accountable privacy budget.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Muda elimination**: Lazy row pipelines, no intermediate collections
//! - **Poka-Yoke safety**: Budget decisions are atomic; rows are only reachable
//!   through charged aggregations
//! - **Genchi Genbutsu**: Sensitivity is stated per operator and enforced by clamping
//! - **Jidoka**: A denied charge stops the release; nothing partial escapes
//!
//! ## Example Usage
//!
//! ```rust
//! use trueno_privacy::config::PrivacyConfig;
//! use trueno_privacy::PrivacyEngine;
//!
//! # fn main() -> trueno_privacy::Result<()> {
//! let engine = PrivacyEngine::builder()
//!     .config(PrivacyConfig::fixed_cap(1.0))
//!     .build()?;
//!
//! let visits = engine.open_rows("visits.csv", vec![0.2_f64, 0.9, 0.4, 1.0]);
//! let long_visits = visits.filter(|v| *v > 0.5).noisy_count(0.5)?;
//! println!("~{long_visits:.1} long visits");
//!
//! assert_eq!(engine.total_spent(), 0.5);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod aggregate;
pub mod agent;
pub mod config;
pub mod error;
pub mod noise;
pub mod sequence;

pub use error::{Error, Result};

use agent::{Agent, BudgetObserver, BudgetPolicy, BudgetPool, PrivacyAgent, TracingObserver};
use config::{BudgetPolicyKind, PrivacyConfig};
use dashmap::DashMap;
use noise::{LaplaceNoise, NoiseSource};
use sequence::{PrivateSequence, RowSet, RowSource};
use std::sync::Arc;

/// Engine instance: one agent per data source label, one budget policy.
pub struct PrivacyEngine {
    config: PrivacyConfig,
    policy: BudgetPolicy,
    agents: DashMap<String, Arc<Agent>>,
    observer: Arc<dyn BudgetObserver>,
    noise: Arc<dyn NoiseSource>,
}

impl PrivacyEngine {
    /// Create a new engine builder
    #[must_use]
    pub fn builder() -> PrivacyEngineBuilder {
        PrivacyEngineBuilder::default()
    }

    /// Bind a row source to the agent for `label`.
    ///
    /// The agent is created on first use; opening the same label again shares
    /// its budget.
    #[must_use]
    pub fn open<T: 'static>(
        &self,
        label: &str,
        source: Arc<dyn RowSource<T>>,
    ) -> PrivateSequence<T> {
        let agent: Arc<dyn PrivacyAgent> = self.agent_for(label);
        PrivateSequence::new(source, agent).with_noise(Arc::clone(&self.noise))
    }

    /// Bind in-memory rows to the agent for `label`.
    #[must_use]
    pub fn open_rows<T>(&self, label: &str, rows: Vec<T>) -> PrivateSequence<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.open(label, Arc::new(RowSet::new(rows)))
    }

    /// Agent for `label`, if one was opened.
    #[must_use]
    pub fn agent(&self, label: &str) -> Option<Arc<Agent>> {
        self.agents.get(label).map(|a| Arc::clone(a.value()))
    }

    /// Labels of all opened agents, sorted.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.agents.iter().map(|e| e.key().clone()).collect();
        labels.sort();
        labels
    }

    /// Epsilon approved across every agent of this engine.
    #[must_use]
    pub fn total_spent(&self) -> f64 {
        self.agents.iter().map(|e| e.value().total_spent()).sum()
    }

    /// Shared pool, when the policy is `shared_pool`.
    #[must_use]
    pub fn pool(&self) -> Option<&Arc<BudgetPool>> {
        match &self.policy {
            BudgetPolicy::SharedPool(pool) => Some(pool),
            _ => None,
        }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &PrivacyConfig {
        &self.config
    }

    fn agent_for(&self, label: &str) -> Arc<Agent> {
        let entry = self.agents.entry(label.to_string()).or_insert_with(|| {
            tracing::debug!(agent = label, policy = ?self.policy, "opening agent");
            Arc::new(
                Agent::new(label, self.policy.clone()).with_observer(Arc::clone(&self.observer)),
            )
        });
        Arc::clone(entry.value())
    }
}

/// Engine builder
#[derive(Default)]
pub struct PrivacyEngineBuilder {
    config: PrivacyConfig,
    observer: Option<Arc<dyn BudgetObserver>>,
    noise: Option<Arc<dyn NoiseSource>>,
}

impl PrivacyEngineBuilder {
    /// Set budget policy and noise seeding
    #[must_use]
    pub fn config(mut self, config: PrivacyConfig) -> Self {
        self.config = config;
        self
    }

    /// Receive every budget event (default: [`TracingObserver`])
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn BudgetObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Override the noise source (takes precedence over the configured seed)
    #[must_use]
    pub fn noise(mut self, noise: Arc<dyn NoiseSource>) -> Self {
        self.noise = Some(noise);
        self
    }

    /// Build the engine
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the configuration fails validation
    pub fn build(self) -> Result<PrivacyEngine> {
        self.config.validate()?;

        let ceiling = self.config.budget.ceiling.unwrap_or(0.0);
        let policy = match self.config.budget.policy {
            BudgetPolicyKind::Unlimited => BudgetPolicy::Unlimited,
            BudgetPolicyKind::FixedCap => BudgetPolicy::FixedCap(ceiling),
            BudgetPolicyKind::SharedPool => {
                BudgetPolicy::SharedPool(Arc::new(BudgetPool::new(ceiling)?))
            }
        };

        let noise: Arc<dyn NoiseSource> = if let Some(noise) = self.noise {
            noise
        } else if let Some(seed) = self.config.noise.seed {
            tracing::warn!(seed, "fixed noise seed configured; releases are reproducible");
            Arc::new(LaplaceNoise::seeded(seed))
        } else {
            Arc::new(LaplaceNoise::from_entropy())
        };

        Ok(PrivacyEngine {
            config: self.config,
            policy,
            agents: DashMap::new(),
            observer: self
                .observer
                .unwrap_or_else(|| Arc::new(TracingObserver) as Arc<dyn BudgetObserver>),
            noise,
        })
    }
}
