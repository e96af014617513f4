//! Error types for the labeling engine.

use thiserror::Error;

/// Result type used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the labeling engine.
///
/// Registration-level problems are local to a single feature: the caller
/// skips that feature and the pass continues. A labeling pass itself never
/// fails once registration is done; the selection phase always returns a
/// best-effort assignment.
#[derive(Debug, Error)]
pub enum Error {
    /// Geometry that is not a point, line or polygon after decomposition.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Label box with negative width or height.
    #[error("invalid label size: {0}")]
    InvalidLabelSize(String),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}
