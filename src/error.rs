//! Error types for Trueno-Privacy
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trueno-Privacy error types
#[derive(Error, Debug)]
pub enum Error {
    /// Epsilon was zero, negative, or not finite
    #[error("Invalid epsilon: {0}\nEpsilon must be a finite value greater than 0")]
    InvalidEpsilon(f64),

    /// The agent denied the charge (Jidoka: stop before releasing anything)
    #[error("Privacy budget exceeded for agent '{agent}': requested epsilon {epsilon}, spent {spent}, ceiling {ceiling}\nRetry with a smaller epsilon or stop querying this source")]
    BudgetExceeded {
        /// Label of the agent that denied the charge
        agent: String,
        /// Epsilon that was requested
        epsilon: f64,
        /// Cumulative epsilon already spent (unchanged by the denial)
        spent: f64,
        /// Ceiling that would have been crossed
        ceiling: f64,
    },

    /// A row could not be projected by a stage or selector
    #[error("Malformed row: {0}")]
    MalformedRow(String),

    /// Clamping bounds are inverted or not finite
    #[error("Invalid bounds: lower {lower} must be <= upper {upper} and both finite")]
    InvalidBounds {
        /// Lower clamping bound
        lower: f64,
        /// Upper clamping bound
        upper: f64,
    },

    /// Configuration rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A lock guarding budget or RNG state was poisoned (fails closed)
    #[error("Privacy state unavailable: {0}\nA thread panicked while holding the lock; refusing to charge or release")]
    AgentPoisoned(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (config) error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
