//! Private sequences: lazy row pipelines bound to a privacy agent
//!
//! A [`PrivateSequence`] pairs a description of rows (source plus stages) with
//! the agent that pays for every release. Transformations are free and lazy;
//! only the aggregation operators in [`crate::aggregate`] pull rows and spend
//! budget.
//!
//! Toyota Way Principles:
//! - Muda elimination: No intermediate collections between stages
//! - Poka-Yoke: Every derived sequence carries the same agent; there is no way
//!   to reach the rows without going through an aggregation
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use trueno_privacy::agent::Agent;
//! use trueno_privacy::sequence::{PrivateSequence, Stage};
//!
//! let agent = Arc::new(Agent::unlimited("ages.csv"));
//! let ages = PrivateSequence::from_rows(vec![34_u32, 17, 52, 29], agent);
//!
//! let adults = ages.filter(|age| *age >= 18).map(|age| f64::from(age) / 100.0);
//!
//! assert_eq!(adults.stages(), &[Stage::Filter, Stage::Map]);
//! assert_eq!(adults.describe(), "source -> filter -> map");
//! ```

mod source;
mod stage;

pub use source::{FnSource, RowSet, RowSource, Rows};
pub use stage::{Filtered, Mapped, Stage};

use crate::agent::PrivacyAgent;
use crate::noise::{LaplaceNoise, NoiseSource};
use crate::Result;
use std::fmt;
use std::sync::Arc;

/// Handle to a lazily transformed private dataset.
///
/// Cloning is cheap and shares source, agent and noise source.
pub struct PrivateSequence<T> {
    rows: Arc<dyn RowSource<T>>,
    stages: Vec<Stage>,
    agent: Arc<dyn PrivacyAgent>,
    noise: Arc<dyn NoiseSource>,
}

impl<T: 'static> PrivateSequence<T> {
    /// Bind a row source to an agent, drawing noise from OS entropy.
    #[must_use]
    pub fn new(source: Arc<dyn RowSource<T>>, agent: Arc<dyn PrivacyAgent>) -> Self {
        Self {
            rows: source,
            stages: Vec::new(),
            agent,
            noise: Arc::new(LaplaceNoise::from_entropy()),
        }
    }

    /// Bind in-memory rows to an agent.
    #[must_use]
    pub fn from_rows(rows: Vec<T>, agent: Arc<dyn PrivacyAgent>) -> Self
    where
        T: Clone + Send + Sync,
    {
        Self::new(Arc::new(RowSet::new(rows)), agent)
    }

    /// Replace the noise source used by aggregations on this sequence and
    /// everything derived from it afterwards.
    #[must_use]
    pub fn with_noise(mut self, noise: Arc<dyn NoiseSource>) -> Self {
        self.noise = noise;
        self
    }

    /// Lazily project every row. No budget is spent.
    #[must_use]
    pub fn map<U, F>(&self, f: F) -> PrivateSequence<U>
    where
        U: 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        self.derive(Arc::new(Mapped::new(Arc::clone(&self.rows), f)), Stage::Map)
    }

    /// Lazily project every row with a fallible function. No budget is spent.
    ///
    /// A failing row aborts whichever aggregation pulls it.
    #[must_use]
    pub fn try_map<U, F>(&self, f: F) -> PrivateSequence<U>
    where
        U: 'static,
        F: Fn(T) -> Result<U> + Send + Sync + 'static,
    {
        self.derive(
            Arc::new(Mapped::fallible(Arc::clone(&self.rows), f)),
            Stage::TryMap,
        )
    }

    /// Lazily drop rows failing `predicate`. No budget is spent.
    #[must_use]
    pub fn filter<P>(&self, predicate: P) -> Self
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.derive(
            Arc::new(Filtered::new(Arc::clone(&self.rows), predicate)),
            Stage::Filter,
        )
    }

    fn derive<U>(&self, rows: Arc<dyn RowSource<U>>, stage: Stage) -> PrivateSequence<U> {
        let mut stages = self.stages.clone();
        stages.push(stage);
        PrivateSequence {
            rows,
            stages,
            agent: Arc::clone(&self.agent),
            noise: Arc::clone(&self.noise),
        }
    }

    /// Start a fresh pass through source and stages.
    pub(crate) fn pull(&self) -> Rows<'_, T> {
        tracing::trace!(agent = self.agent.label(), pipeline = %self.describe(), "pulling rows");
        self.rows.rows()
    }
}

impl<T> PrivateSequence<T> {
    /// Stages applied on top of the source, in application order.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Human-readable pipeline, e.g. `source -> map -> filter`.
    #[must_use]
    pub fn describe(&self) -> String {
        std::iter::once("source".to_string())
            .chain(self.stages.iter().map(ToString::to_string))
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Agent charged by aggregations on this sequence.
    #[must_use]
    pub fn agent(&self) -> &Arc<dyn PrivacyAgent> {
        &self.agent
    }

    pub(crate) fn noise(&self) -> &dyn NoiseSource {
        self.noise.as_ref()
    }
}

impl<T> Clone for PrivateSequence<T> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
            stages: self.stages.clone(),
            agent: Arc::clone(&self.agent),
            noise: Arc::clone(&self.noise),
        }
    }
}

impl<T> fmt::Debug for PrivateSequence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateSequence")
            .field("agent", &self.agent.label())
            .field("stages", &self.stages)
            .finish_non_exhaustive()
    }
}
