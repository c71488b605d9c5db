//! Pipeline stages: row-local transformations applied at pull time.
//!
//! Each stage is a [`RowSource`] wrapping its input, so a chain is an explicit
//! tree of nodes rather than one opaque closure, and every node can be pulled
//! and tested on its own. Stages see one row at a time; none of them can read
//! across rows, which is why they cost no budget.

use super::source::{RowSource, Rows};
use crate::Result;
use std::fmt;
use std::sync::Arc;

/// Kind of a pipeline stage, as recorded on a [`super::PrivateSequence`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Infallible row-to-row projection
    Map,
    /// Fallible row-to-row projection
    TryMap,
    /// Row-dropping predicate
    Filter,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Map => "map",
            Self::TryMap => "try_map",
            Self::Filter => "filter",
        };
        f.write_str(name)
    }
}

type Projection<T, U> = Arc<dyn Fn(T) -> Result<U> + Send + Sync>;
type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Applies a projection to every row of its input.
pub struct Mapped<T, U> {
    input: Arc<dyn RowSource<T>>,
    projection: Projection<T, U>,
}

impl<T: 'static, U: 'static> Mapped<T, U> {
    /// Wrap `input` with an infallible projection.
    pub fn new<F>(input: Arc<dyn RowSource<T>>, f: F) -> Self
    where
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        Self {
            input,
            projection: Arc::new(move |row| Ok(f(row))),
        }
    }

    /// Wrap `input` with a fallible projection.
    pub fn fallible<F>(input: Arc<dyn RowSource<T>>, f: F) -> Self
    where
        F: Fn(T) -> Result<U> + Send + Sync + 'static,
    {
        Self {
            input,
            projection: Arc::new(f),
        }
    }
}

impl<T: 'static, U: 'static> RowSource<U> for Mapped<T, U> {
    fn rows(&self) -> Rows<'_, U> {
        Box::new(
            self.input
                .rows()
                .map(move |row| row.and_then(|r| (self.projection)(r))),
        )
    }
}

/// Drops rows failing a predicate. Errors pass through untouched.
pub struct Filtered<T> {
    input: Arc<dyn RowSource<T>>,
    predicate: Predicate<T>,
}

impl<T: 'static> Filtered<T> {
    /// Wrap `input` with a predicate.
    pub fn new<P>(input: Arc<dyn RowSource<T>>, predicate: P) -> Self
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            input,
            predicate: Arc::new(predicate),
        }
    }
}

impl<T: 'static> RowSource<T> for Filtered<T> {
    fn rows(&self) -> Rows<'_, T> {
        Box::new(self.input.rows().filter(move |row| match row {
            Ok(r) => (self.predicate)(r),
            Err(_) => true,
        }))
    }
}
