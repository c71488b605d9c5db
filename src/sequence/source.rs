//! Row sources: where a pipeline's rows come from.
//!
//! A source is re-read on every pull. Nothing is memoized between
//! aggregations.

use crate::Result;
use std::sync::Arc;

/// Boxed row iterator returned by a pull.
pub type Rows<'a, T> = Box<dyn Iterator<Item = Result<T>> + 'a>;

/// Anything that can yield the rows of a private dataset.
///
/// Rows are `Result`s so loader failures (`MalformedRow`) flow through the
/// pipeline to the aggregation that pulled them.
pub trait RowSource<T>: Send + Sync {
    /// Start a fresh pass over the rows.
    fn rows(&self) -> Rows<'_, T>;
}

/// In-memory rows, shared read-only by every derived sequence.
#[derive(Debug)]
pub struct RowSet<T> {
    rows: Arc<[T]>,
}

impl<T> RowSet<T> {
    /// Wrap already-typed rows.
    #[must_use]
    pub fn new(rows: Vec<T>) -> Self {
        Self { rows: rows.into() }
    }

    /// Number of rows held.
    ///
    /// Not a privacy-safe release; only for the loader side.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no rows are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<T> From<Vec<T>> for RowSet<T> {
    fn from(rows: Vec<T>) -> Self {
        Self::new(rows)
    }
}

impl<T: Clone + Send + Sync> RowSource<T> for RowSet<T> {
    fn rows(&self) -> Rows<'_, T> {
        Box::new(self.rows.iter().cloned().map(Ok))
    }
}

type Loader<T> = Box<dyn Fn() -> Rows<'static, T> + Send + Sync>;

/// Rows produced by re-invoking a loader on every pull.
///
/// Lets an external reader (file, database) stream rows without the engine
/// holding them in memory.
pub struct FnSource<T> {
    loader: Loader<T>,
}

impl<T: 'static> FnSource<T> {
    /// Wrap a loader closure.
    pub fn new<F, I>(loader: F) -> Self
    where
        F: Fn() -> I + Send + Sync + 'static,
        I: IntoIterator<Item = Result<T>>,
        I::IntoIter: 'static,
    {
        Self {
            loader: Box::new(move || -> Rows<'static, T> { Box::new(loader().into_iter()) }),
        }
    }
}

impl<T: 'static> RowSource<T> for FnSource<T> {
    fn rows(&self) -> Rows<'_, T> {
        (self.loader)()
    }
}
