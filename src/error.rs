//! Error types for freshen.

/// Top-level error type for marker, storage and update handling.
///
/// These errors never leave [`crate::orchestrator::UpdateOrchestrator::run_if_needed`];
/// they are surfaced to callers of the lower-level helpers only.
#[derive(Debug, thiserror::Error)]
pub enum FreshenError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Freshness marker could not be read, parsed or written.
    #[error("marker error: {0}")]
    Marker(String),

    /// Data directory could not be prepared.
    #[error("storage error: {0}")]
    Storage(String),

    /// Update lock could not be acquired or released.
    #[error("lock error: {0}")]
    Lock(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, FreshenError>;
