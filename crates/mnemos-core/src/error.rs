//! Error types for the mnemos memory engine
//!
//! One error hierarchy covers providers, stores and caller input.

use thiserror::Error;

/// The main error type for memory engine operations
#[derive(Error, Debug)]
pub enum Error {
    // ========== Provider Errors ==========
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Rate limited by provider")]
    RateLimited {
        /// Delay suggested by the provider, in seconds
        retry_after_secs: Option<u64>,
    },

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Provider call timed out: {0}")]
    ProviderTimeout(String),

    // ========== Storage Errors ==========
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ========== Record Errors ==========
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Validation error: {0}")]
    Validation(String),

    // ========== Caller Errors ==========
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========== IO Errors ==========
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ========== Internal Errors ==========
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for memory engine operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns true if this error originated in an external provider
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Error::ProviderUnavailable(_)
                | Error::RateLimited { .. }
                | Error::MalformedResponse(_)
                | Error::ProviderTimeout(_)
        )
    }

    /// Returns true if the operation may be retried
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::ProviderUnavailable(_)
                | Error::RateLimited { .. }
                | Error::ProviderTimeout(_)
                | Error::NotFound(_)
        )
    }

    /// Returns true if this error must be surfaced to the caller as-is
    ///
    /// Everything else is recovered locally by degrading (null embedding,
    /// dropped candidate, excluded strategy) per the propagation policy.
    pub fn is_hard(&self) -> bool {
        matches!(
            self,
            Error::Storage(_) | Error::InvalidInput(_) | Error::Io(_) | Error::Internal(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotFound("entity Jack".to_string());
        assert_eq!(err.to_string(), "Not found: entity Jack");
    }

    #[test]
    fn test_provider_failure_classification() {
        assert!(Error::ProviderUnavailable("down".to_string()).is_provider_failure());
        assert!(Error::RateLimited {
            retry_after_secs: Some(5)
        }
        .is_provider_failure());
        assert!(!Error::Storage("disk".to_string()).is_provider_failure());
    }

    #[test]
    fn test_hard_errors() {
        assert!(Error::InvalidInput("negative limit".to_string()).is_hard());
        assert!(Error::Storage("connect".to_string()).is_hard());
        assert!(!Error::MalformedResponse("bad json".to_string()).is_hard());
    }

    #[test]
    fn test_recoverable() {
        assert!(Error::ProviderTimeout("embed".to_string()).is_recoverable());
        assert!(!Error::Validation("bad domain".to_string()).is_recoverable());
    }
}
