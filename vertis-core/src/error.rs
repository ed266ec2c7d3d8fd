//! Error types for the LP core.

use thiserror::Error;

/// Errors surfaced across the public boundary.
///
/// Engines never propagate panics or internal failures directly; the
/// orchestrator translates everything into a `(SolverStatus, ModelStatus)`
/// pair, with the error kind below carried for diagnostics.
#[derive(Error, Debug)]
pub enum VertisError {
    /// Unknown option key, type mismatch, or out-of-range value. The
    /// offending call leaves all options unchanged.
    #[error("invalid option: {0}")]
    Options(String),

    /// The LP data failed validation.
    #[error("invalid model: {0}")]
    Model(String),

    /// A model file could not be read or parsed.
    #[error("model load failed: {0}")]
    Load(String),

    /// Presolve could not produce a reduced model.
    #[error("presolve failed: {0}")]
    Presolve(String),

    /// Postsolve could not restore the full-space solution.
    #[error("postsolve failed: {0}")]
    Postsolve(String),

    /// Numerical breakdown the engine could not recover from.
    #[error("solve failed: {0}")]
    Solve(String),
}

/// Result type for core operations.
pub type VertisResult<T> = Result<T, VertisError>;
