//! Noisy aggregation operators (Laplace mechanism)
//!
//! Terminal operations on a [`PrivateSequence`]: the only place privacy is
//! spent. Every operator follows the same order:
//!
//! 1. Reject a bad epsilon before touching any row
//! 2. Pull the full pipeline exactly once and compute the true statistic
//! 3. Ask the agent to admit epsilon (one charge per call)
//! 4. On approval release `truth + Lap(Δ/ε)`; on denial drop the truth and
//!    return [`Error::BudgetExceeded`]
//!
//! Selector outputs are clamped into the operator's bounds, so the stated
//! sensitivity holds whatever the caller's selector returns. Sums are
//! accumulated in fixed point so the bound also holds under
//! floating-point rounding: summing `f64` values left to right can let one
//! row move the total by several units.
//!
//! Toyota Way: Jidoka (a denied charge stops the release, never degrades it)

mod exact;

use self::exact::FixedPointSum;
use crate::agent::check_epsilon;
use crate::sequence::PrivateSequence;
use crate::{Error, Result};

/// Aggregation kind and its per-row sensitivity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    /// Sum of selector outputs clamped to `[-1, 1]`
    Sum,
    /// Number of rows
    Count,
    /// Sum of selector outputs clamped to `[lower, upper]`
    BoundedSum {
        /// Lower clamping bound
        lower: f64,
        /// Upper clamping bound
        upper: f64,
    },
    /// Mean of selector outputs clamped to `[-1, 1]`
    Average,
}

impl Aggregation {
    /// Maximum change one row's presence can cause in each released component.
    ///
    /// Sums report `max(|lower|, |upper|)` plus the rounding slack of their
    /// single fixed-point to `f64` conversion (under `2^-19` of the bound).
    /// `Count` is exactly 1 below `2^53` rows. `Average` releases two
    /// components (sum and count), both noised at the sum's sensitivity with
    /// half the epsilon. Invalid bounds report an infinite sensitivity.
    #[must_use]
    pub fn sensitivity(&self) -> f64 {
        match self {
            Self::Count => 1.0,
            Self::Sum | Self::Average => sum_sensitivity(-1.0, 1.0),
            Self::BoundedSum { lower, upper } => sum_sensitivity(*lower, *upper),
        }
    }

    /// Laplace scale for one released component at `epsilon`.
    #[must_use]
    pub fn noise_scale(&self, epsilon: f64) -> f64 {
        match self {
            Self::Average => self.sensitivity() / (epsilon / 2.0),
            _ => self.sensitivity() / epsilon,
        }
    }
}

fn sum_sensitivity(lower: f64, upper: f64) -> f64 {
    FixedPointSum::new(lower, upper).map_or(f64::INFINITY, |acc| acc.sensitivity())
}

/// Exact statistic; never leaves this module unless a charge was approved.
struct Truth {
    sum: f64,
    count: u64,
}

impl<T: 'static> PrivateSequence<T> {
    /// Release the sum of `selector` over all rows with Laplace noise.
    ///
    /// Each selector output is clamped into `[-1, 1]` and summed exactly, so
    /// `Δ` is 1 (plus a `2^-20` conversion slack) and the noise scale is
    /// `Δ / epsilon`. An empty sequence still charges.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidEpsilon`] if `epsilon` is not finite and positive
    /// - [`Error::MalformedRow`] if a row fails or the selector returns a
    ///   non-finite value (nothing is charged)
    /// - [`Error::BudgetExceeded`] if the agent denies the charge
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use trueno_privacy::agent::{Agent, PrivacyAgent};
    /// use trueno_privacy::noise::NoNoise;
    /// use trueno_privacy::sequence::PrivateSequence;
    ///
    /// # fn main() -> trueno_privacy::Result<()> {
    /// let agent = Arc::new(Agent::unlimited("ones"));
    /// let seq = PrivateSequence::from_rows(vec![1.0, 1.0, 1.0], agent.clone())
    ///     .with_noise(Arc::new(NoNoise));
    ///
    /// assert_eq!(seq.noisy_sum(1.0, |x| *x)?, 3.0);
    /// assert_eq!(agent.total_spent(), 1.0);
    /// # Ok(())
    /// # }
    /// ```
    pub fn noisy_sum<F>(&self, epsilon: f64, selector: F) -> Result<f64>
    where
        F: Fn(&T) -> f64,
    {
        check_epsilon(epsilon)?;
        let truth = self.accumulate(FixedPointSum::new(-1.0, 1.0)?, selector)?;
        self.release(Aggregation::Sum, epsilon, truth.sum)
    }

    /// Release the number of rows with Laplace noise (`Δ = 1`).
    ///
    /// # Errors
    ///
    /// Same as [`Self::noisy_sum`].
    #[allow(clippy::cast_precision_loss)]
    pub fn noisy_count(&self, epsilon: f64) -> Result<f64> {
        check_epsilon(epsilon)?;
        let truth = self.accumulate(FixedPointSum::new(-1.0, 1.0)?, |_| 1.0)?;
        self.release(Aggregation::Count, epsilon, truth.count as f64)
    }

    /// Release the sum of `selector` clamped into `[lower, upper]`.
    ///
    /// Sensitivity is `max(|lower|, |upper|)` plus the conversion slack
    /// described on [`Aggregation::sensitivity`].
    ///
    /// # Errors
    ///
    /// [`Error::InvalidBounds`] for inverted or non-finite bounds (or bounds
    /// beyond `±2^900`), otherwise the same as [`Self::noisy_sum`].
    pub fn noisy_sum_bounded<F>(
        &self,
        epsilon: f64,
        lower: f64,
        upper: f64,
        selector: F,
    ) -> Result<f64>
    where
        F: Fn(&T) -> f64,
    {
        check_epsilon(epsilon)?;
        let truth = self.accumulate(FixedPointSum::new(lower, upper)?, selector)?;
        self.release(Aggregation::BoundedSum { lower, upper }, epsilon, truth.sum)
    }

    /// Release the mean of `selector` clamped into `[-1, 1]`.
    ///
    /// Charges `epsilon` once and splits it evenly between a noisy sum and a
    /// noisy count; returns `noisy_sum / max(noisy_count, 1)`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::noisy_sum`].
    #[allow(clippy::cast_precision_loss)]
    pub fn noisy_average<F>(&self, epsilon: f64, selector: F) -> Result<f64>
    where
        F: Fn(&T) -> f64,
    {
        check_epsilon(epsilon)?;
        let truth = self.accumulate(FixedPointSum::new(-1.0, 1.0)?, selector)?;
        self.charge(epsilon)?;

        let scale = Aggregation::Average.noise_scale(epsilon);
        let noisy_sum = truth.sum + self.noise().sample_laplace(scale)?;
        let noisy_count = truth.count as f64 + self.noise().sample_laplace(scale)?;
        tracing::debug!(aggregation = ?Aggregation::Average, epsilon, "released");
        Ok(noisy_sum / noisy_count.max(1.0))
    }

    fn accumulate<F>(&self, mut sum: FixedPointSum, selector: F) -> Result<Truth>
    where
        F: Fn(&T) -> f64,
    {
        let mut count = 0u64;
        for row in self.pull() {
            let row = row?;
            let value = selector(&row);
            if !value.is_finite() {
                return Err(Error::MalformedRow(format!(
                    "selector produced non-finite value {value}"
                )));
            }
            sum.add(value);
            count += 1;
        }
        Ok(Truth {
            sum: sum.value(),
            count,
        })
    }

    fn charge(&self, epsilon: f64) -> Result<()> {
        let agent = self.agent();
        if agent.approve(epsilon)? {
            return Ok(());
        }
        Err(Error::BudgetExceeded {
            agent: agent.label().to_string(),
            epsilon,
            spent: agent.total_spent(),
            ceiling: agent.ceiling().unwrap_or(f64::INFINITY),
        })
    }

    fn release(&self, aggregation: Aggregation, epsilon: f64, truth: f64) -> Result<f64> {
        self.charge(epsilon)?;
        let noise = self.noise().sample_laplace(aggregation.noise_scale(epsilon))?;
        tracing::debug!(aggregation = ?aggregation, epsilon, "released");
        Ok(truth + noise)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, EventLog, PrivacyAgent};
    use crate::noise::{LaplaceNoise, NoNoise};
    use std::sync::Arc;

    fn exact<T: Clone + Send + Sync + 'static>(rows: Vec<T>, agent: Arc<Agent>) -> PrivateSequence<T> {
        PrivateSequence::from_rows(rows, agent).with_noise(Arc::new(NoNoise))
    }

    #[test]
    fn test_sensitivity_per_aggregation() {
        let slack = 2f64.powi(-20);
        assert_eq!(Aggregation::Sum.sensitivity(), 1.0 + slack);
        assert_eq!(Aggregation::Count.sensitivity(), 1.0);
        // bound 5 sits on the 2^3 grid
        assert_eq!(
            Aggregation::BoundedSum { lower: -5.0, upper: 2.0 }.sensitivity(),
            5.0 + 8.0 * slack
        );
        assert_eq!(
            Aggregation::BoundedSum { lower: 2.0, upper: -5.0 }.sensitivity(),
            f64::INFINITY
        );
        assert_eq!(Aggregation::Sum.noise_scale(0.5), 2.0 * (1.0 + slack));
        assert_eq!(Aggregation::Average.noise_scale(1.0), 2.0 * (1.0 + slack));
    }

    #[test]
    fn test_noisy_sum_clamps_selector_output() {
        let agent = Arc::new(Agent::unlimited("a"));
        let seq = exact(vec![10.0, -10.0, 0.5, 1.0], agent);

        // 1 - 1 + 0.5 + 1
        assert!((seq.noisy_sum(1.0, |x| *x).unwrap() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_noisy_count_counts_filtered_rows() {
        let agent = Arc::new(Agent::unlimited("a"));
        let seq = exact((0..10).collect::<Vec<i32>>(), agent.clone());

        let count = seq.filter(|x| *x >= 4).noisy_count(0.25).unwrap();
        assert!((count - 6.0).abs() < 1e-12);
        assert!((agent.total_spent() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_bounded_sum_uses_bounds() {
        let agent = Arc::new(Agent::unlimited("a"));
        let seq = exact(vec![3.0, 50.0, -2.0], agent);

        let sum = seq.noisy_sum_bounded(1.0, 0.0, 10.0, |x| *x).unwrap();
        assert!((sum - 13.0).abs() < 1e-12);
    }

    #[test]
    fn test_bounded_sum_rejects_inverted_bounds_without_charge() {
        let agent = Arc::new(Agent::unlimited("a"));
        let seq = exact(vec![1.0], agent.clone());

        let result = seq.noisy_sum_bounded(1.0, 2.0, -2.0, |x| *x);
        assert!(matches!(result, Err(Error::InvalidBounds { .. })));
        assert_eq!(agent.total_spent(), 0.0);
    }

    #[test]
    fn test_noisy_average_exact() {
        let agent = Arc::new(Agent::unlimited("a"));
        let seq = exact(vec![1.0, 0.0, 0.5, 0.5], agent.clone());

        let avg = seq.noisy_average(1.0, |x| *x).unwrap();
        assert!((avg - 0.5).abs() < 1e-12);
        assert!((agent.total_spent() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_noisy_average_empty_charges_and_is_finite() {
        let agent = Arc::new(Agent::unlimited("a"));
        let seq = exact(Vec::<f64>::new(), agent.clone());

        let avg = seq.noisy_average(0.5, |x| *x).unwrap();
        assert_eq!(avg, 0.0);
        assert!((agent.total_spent() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_selector_is_malformed_and_uncharged() {
        let agent = Arc::new(Agent::unlimited("a"));
        let seq = exact(vec![1.0, f64::NAN], agent.clone());

        assert!(matches!(seq.noisy_sum(1.0, |x| *x), Err(Error::MalformedRow(_))));
        assert_eq!(agent.total_spent(), 0.0);
    }

    #[test]
    fn test_denial_emits_only_the_denial_event() {
        let log = Arc::new(EventLog::new());
        let agent = Arc::new(Agent::with_cap("a", 0.5).unwrap().with_observer(log.clone()));
        let seq = exact(vec![1.0; 3], agent);

        let err = seq.noisy_sum(1.0, |x| *x).unwrap_err();
        match err {
            Error::BudgetExceeded { agent, epsilon, spent, ceiling } => {
                assert_eq!(agent, "a");
                assert_eq!(epsilon, 1.0);
                assert_eq!(spent, 0.0);
                assert_eq!(ceiling, 0.5);
            }
            other => panic!("expected BudgetExceeded, got {other:?}"),
        }

        let events = log.events();
        assert_eq!(events.len(), 1);
        assert!(!events[0].approved());
        assert_eq!(events[0].total(), 0.0);
    }

    #[test]
    fn test_seeded_noise_is_reproducible() {
        let run = || {
            let agent = Arc::new(Agent::unlimited("a"));
            PrivateSequence::from_rows(vec![1.0, 1.0], agent)
                .with_noise(Arc::new(LaplaceNoise::seeded(99)))
                .noisy_sum(0.1, |x| *x)
                .unwrap()
        };

        assert_eq!(run(), run());
    }
}
