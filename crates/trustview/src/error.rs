//! Error types for trustview.
//!
//! Errors fall into four groups: store access and concurrency, external
//! services, data invariants, and configuration. Only the first two are
//! ever retried.

/// Trust view error types covering all operations.
#[derive(Debug, thiserror::Error)]
pub enum TrustViewError {
    #[error("Concurrent modification of the trust view")]
    ConcurrentModification,

    #[error("Model access failed: {0}")]
    ModelAccess(String),

    #[error("Validation service timed out")]
    OracleTimeout,

    #[error("Validation service failed: {0}")]
    OracleFailure(String),

    #[error("Revocation service error: {0}")]
    RevocationService(String),

    #[error("Invalid validation request: {0}")]
    InvalidRequest(String),

    #[error("Invalid certificate path: {0}")]
    InvalidPath(String),

    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    #[error("Invalid opinion: {0}")]
    InvalidOpinion(String),

    #[error("Configuration error for '{key}': {reason}")]
    Config { key: String, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrustViewError {
    /// Whether the enclosing transaction may be retried after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TrustViewError::ConcurrentModification
                | TrustViewError::ModelAccess(_)
                | TrustViewError::OracleTimeout
        )
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, TrustViewError>;
