//! Privacy agents: the single gatekeeper for privacy expenditure
//!
//! Every aggregation asks an agent to admit its epsilon before anything is
//! released. The agent owns the cumulative `total_spent` counter, which only
//! ever grows by approved amounts.
//!
//! Toyota Way Principles:
//! - Jidoka: A denied charge stops the line before the statistic leaves
//! - Poka-Yoke: Read-modify-write of the budget happens under one lock
//!
//! ## Policies
//!
//! Budget policy is data, not a type hierarchy:
//! - [`BudgetPolicy::Unlimited`]: accounting only, always approves
//! - [`BudgetPolicy::FixedCap`]: denies once `total_spent + ε > ceiling`
//! - [`BudgetPolicy::SharedPool`]: one ceiling shared across agents
//!
//! Caps compare plain `f64` running totals, so decimal epsilons can fall a
//! rounding error short: with a ceiling of `0.3`, three charges of `0.1`
//! reach `0.30000000000000004` and the third is denied. Pick epsilons that
//! are exact binary fractions (`0.125`, `0.25`) when a cap must be met
//! exactly.
//!
//! # Example
//!
//! ```rust
//! use trueno_privacy::agent::{Agent, PrivacyAgent};
//!
//! # fn main() -> trueno_privacy::Result<()> {
//! let agent = Agent::with_cap("census.csv", 0.5)?;
//!
//! assert!(agent.approve(0.3)?);
//! assert!(!agent.approve(0.3)?); // 0.6 > 0.5
//! assert!((agent.total_spent() - 0.3).abs() < 1e-12);
//! # Ok(())
//! # }
//! ```

mod observer;
mod pool;

pub use observer::{BudgetEvent, BudgetObserver, EventLog, TracingObserver};
pub use pool::BudgetPool;

use crate::{Error, Result};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

/// Capability required by private sequences: a label plus a charge decision.
///
/// Any type implementing this trait can gate aggregations.
pub trait PrivacyAgent: Send + Sync {
    /// Label used to attribute budget events (e.g. the source file name).
    fn label(&self) -> &str;

    /// Decide whether to admit `epsilon`.
    ///
    /// On approval `total_spent` grows by exactly `epsilon`; on denial it is
    /// unchanged. Decision and increment are atomic with respect to other
    /// callers on the same agent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEpsilon`] without charging if `epsilon` is not
    /// a finite positive number, or [`Error::AgentPoisoned`] if the budget
    /// state is unavailable.
    fn approve(&self, epsilon: f64) -> Result<bool>;

    /// Cumulative approved epsilon.
    fn total_spent(&self) -> f64;

    /// Ceiling this agent enforces, if any.
    fn ceiling(&self) -> Option<f64> {
        None
    }
}

/// Validate an epsilon argument (finite and strictly positive).
///
/// # Errors
///
/// Returns [`Error::InvalidEpsilon`] otherwise.
pub fn check_epsilon(epsilon: f64) -> Result<()> {
    if epsilon.is_finite() && epsilon > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidEpsilon(epsilon))
    }
}

/// Denial policy of an [`Agent`].
#[derive(Debug, Clone)]
pub enum BudgetPolicy {
    /// Always approve; still accounts every charge
    Unlimited,
    /// Deny once `total_spent + ε` would exceed the ceiling (plain `f64`
    /// comparison, see the module docs)
    FixedCap(f64),
    /// Deny once the shared pool's ceiling would be exceeded
    SharedPool(Arc<BudgetPool>),
}

impl BudgetPolicy {
    /// Ceiling enforced by this policy.
    #[must_use]
    pub fn ceiling(&self) -> Option<f64> {
        match self {
            Self::Unlimited => None,
            Self::FixedCap(ceiling) => Some(*ceiling),
            Self::SharedPool(pool) => Some(pool.ceiling()),
        }
    }
}

/// Configurable privacy agent.
pub struct Agent {
    label: String,
    policy: BudgetPolicy,
    spent: Mutex<f64>,
    observer: Arc<dyn BudgetObserver>,
}

impl Agent {
    /// Create an agent with the given policy, reporting to [`TracingObserver`].
    #[must_use]
    pub fn new(label: impl Into<String>, policy: BudgetPolicy) -> Self {
        Self {
            label: label.into(),
            policy,
            spent: Mutex::new(0.0),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Accounting-only agent that never denies.
    #[must_use]
    pub fn unlimited(label: impl Into<String>) -> Self {
        Self::new(label, BudgetPolicy::Unlimited)
    }

    /// Agent with its own fixed ceiling.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `ceiling` is negative or not finite.
    pub fn with_cap(label: impl Into<String>, ceiling: f64) -> Result<Self> {
        pool::validate_ceiling(ceiling)?;
        Ok(Self::new(label, BudgetPolicy::FixedCap(ceiling)))
    }

    /// Agent drawing on a shared pool.
    #[must_use]
    pub fn in_pool(label: impl Into<String>, pool: Arc<BudgetPool>) -> Self {
        Self::new(label, BudgetPolicy::SharedPool(pool))
    }

    /// Replace the observer that receives budget events.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn BudgetObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Active policy.
    #[must_use]
    pub const fn policy(&self) -> &BudgetPolicy {
        &self.policy
    }

    /// Budget left before the ceiling (`None` when unlimited).
    ///
    /// For pooled agents this is the pool's remaining budget.
    #[must_use]
    pub fn remaining(&self) -> Option<f64> {
        match &self.policy {
            BudgetPolicy::Unlimited => None,
            BudgetPolicy::FixedCap(ceiling) => Some((ceiling - self.total_spent()).max(0.0)),
            BudgetPolicy::SharedPool(pool) => Some(pool.remaining()),
        }
    }

    fn notify(&self, event: &BudgetEvent) {
        let delivered = catch_unwind(AssertUnwindSafe(|| self.observer.on_decision(event)));
        if delivered.is_err() {
            tracing::error!(agent = %self.label, "budget observer panicked; decision stands");
        }
    }
}

impl PrivacyAgent for Agent {
    fn label(&self) -> &str {
        &self.label
    }

    fn approve(&self, epsilon: f64) -> Result<bool> {
        check_epsilon(epsilon)?;

        let (approved, total) = {
            let mut spent = self
                .spent
                .lock()
                .map_err(|_| Error::AgentPoisoned(self.label.clone()))?;

            // Lock order is always agent -> pool
            let approved = match &self.policy {
                BudgetPolicy::Unlimited => true,
                BudgetPolicy::FixedCap(ceiling) => *spent + epsilon <= *ceiling,
                BudgetPolicy::SharedPool(pool) => pool.try_charge(epsilon)?,
            };
            if approved {
                *spent += epsilon;
            }
            (approved, *spent)
        };

        self.notify(&BudgetEvent::new(self.label.clone(), epsilon, total, approved));
        Ok(approved)
    }

    fn total_spent(&self) -> f64 {
        *self.spent.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ceiling(&self) -> Option<f64> {
        self.policy.ceiling()
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("label", &self.label)
            .field("policy", &self.policy)
            .field("total_spent", &self.total_spent())
            .finish_non_exhaustive()
    }
}
