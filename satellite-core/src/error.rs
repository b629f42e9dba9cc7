//! Error taxonomy.
//!
//! Kinds line up with the abstract recovery classes from the error-handling
//! design: transient I/O and rate-limiting retry with backoff; not-found and
//! integrity errors are terminal for the row they touch; fatal errors
//! propagate immediately.

/// Result type alias used throughout the Satellite crates.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration missing or invalid: {0}")]
    Configuration(String),

    #[error("transient I/O failure: {0}")]
    Transient(String),

    #[error("remote service rate-limited this request: {0}")]
    RateLimited(String),

    #[error("remote resource not found: {0}")]
    NotFoundRemote(String),

    #[error("integrity check failed: {0}")]
    Integrity(String),

    #[error("fatal error, not retryable: {0}")]
    Fatal(String),

    #[error("archive or image is corrupt: {0}")]
    CorruptInput(String),

    #[error("requested lock is already held")]
    Busy,

    #[error("row not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// True if a `retry::backoff` loop should keep retrying this error.
    ///
    /// Covers transient I/O and rate-limiting. Database-locked errors
    /// surface through `Storage` and are deliberately retried indefinitely
    /// by callers that know their store is local (see
    /// `retry::RetryPolicy::unbounded_for_local_db`).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Transient(_) | Error::RateLimited(_) | Error::Storage(_)
        )
    }

    /// True for errors that must never be retried and must surface
    /// immediately to the caller.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Fatal(_))
    }
}
