//! Shared budget pool (composite accounting across agents).

use crate::{Error, Result};
use std::sync::{Mutex, PoisonError};

/// One ceiling shared by several agents.
///
/// Each agent still tracks what it spent itself; the pool tracks the sum and
/// denies once the shared ceiling would be crossed. The check is a plain
/// `f64` comparison of the running total, like [`super::BudgetPolicy::FixedCap`].
#[derive(Debug)]
pub struct BudgetPool {
    ceiling: f64,
    spent: Mutex<f64>,
}

impl BudgetPool {
    /// Create a pool with the given ceiling.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `ceiling` is negative or not finite.
    pub fn new(ceiling: f64) -> Result<Self> {
        validate_ceiling(ceiling)?;
        Ok(Self {
            ceiling,
            spent: Mutex::new(0.0),
        })
    }

    /// Shared ceiling.
    #[must_use]
    pub const fn ceiling(&self) -> f64 {
        self.ceiling
    }

    /// Epsilon spent by all member agents.
    #[must_use]
    pub fn total_spent(&self) -> f64 {
        *self.spent.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Budget left before the ceiling.
    #[must_use]
    pub fn remaining(&self) -> f64 {
        (self.ceiling - self.total_spent()).max(0.0)
    }

    /// Admit `epsilon` if it fits; all-or-nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AgentPoisoned`] if the pool lock was poisoned.
    pub(crate) fn try_charge(&self, epsilon: f64) -> Result<bool> {
        let mut spent = self
            .spent
            .lock()
            .map_err(|_| Error::AgentPoisoned("shared budget pool".to_string()))?;
        if *spent + epsilon > self.ceiling {
            return Ok(false);
        }
        *spent += epsilon;
        Ok(true)
    }
}

pub(crate) fn validate_ceiling(ceiling: f64) -> Result<()> {
    if ceiling.is_finite() && ceiling >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!(
            "budget ceiling must be finite and >= 0, got {ceiling}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_charges_until_ceiling() {
        let pool = BudgetPool::new(1.0).unwrap();

        assert!(pool.try_charge(0.5).unwrap());
        assert!(pool.try_charge(0.5).unwrap());
        assert!(!pool.try_charge(0.1).unwrap());
        assert!((pool.total_spent() - 1.0).abs() < 1e-12);
        assert!(pool.remaining().abs() < 1e-12);
    }

    #[test]
    fn test_pool_denial_leaves_total_unchanged() {
        let pool = BudgetPool::new(0.5).unwrap();

        assert!(pool.try_charge(0.3).unwrap());
        assert!(!pool.try_charge(0.3).unwrap());
        assert!((pool.total_spent() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_pool_compares_raw_f64_totals() {
        let pool = BudgetPool::new(0.3).unwrap();

        assert!(pool.try_charge(0.1).unwrap());
        assert!(pool.try_charge(0.1).unwrap());
        assert!(!pool.try_charge(0.1).unwrap());
        assert_eq!(pool.total_spent(), 0.2);
    }

    #[test]
    fn test_pool_rejects_bad_ceiling() {
        assert!(BudgetPool::new(-1.0).is_err());
        assert!(BudgetPool::new(f64::NAN).is_err());
        assert!(BudgetPool::new(f64::INFINITY).is_err());
        assert!(BudgetPool::new(0.0).is_ok());
    }
}
