//! External provider adapters
//!
//! Two provider seams: [`embedding::EmbeddingProvider`] turns text into
//! vectors, [`extraction::ExtractionProvider`] turns conversation text into
//! structured fact candidates. Both ship a deterministic mock so the whole
//! engine runs without network access, and an OpenAI-backed implementation
//! behind the `openai` cargo feature.

pub mod embedding;
pub mod extraction;

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Errors a provider adapter can surface
///
/// Recoverability is decided here, not at the call site: everything except
/// `InvalidInput` is a transient provider condition the caller may retry or
/// degrade around.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Provider rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Malformed provider response: {0}")]
    Malformed(String),

    #[error("Invalid provider input: {0}")]
    InvalidInput(String),

    #[error("Provider call timed out after {0:?}")]
    Timeout(Duration),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

impl From<ProviderError> for mnemos_core::Error {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unavailable(msg) => mnemos_core::Error::ProviderUnavailable(msg),
            ProviderError::RateLimited { retry_after_secs } => {
                mnemos_core::Error::RateLimited { retry_after_secs }
            }
            ProviderError::Malformed(msg) => mnemos_core::Error::MalformedResponse(msg),
            ProviderError::InvalidInput(msg) => mnemos_core::Error::InvalidInput(msg),
            ProviderError::Timeout(d) => {
                mnemos_core::Error::ProviderTimeout(format!("{}ms", d.as_millis()))
            }
        }
    }
}

/// Run a provider call under a deadline, mapping elapse to
/// [`ProviderError::Timeout`]
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> ProviderResult<T>
where
    F: Future<Output = ProviderResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_passes_through() {
        let result = with_timeout(Duration::from_secs(1), async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_timeout_elapses() {
        let result: ProviderResult<()> = with_timeout(Duration::from_millis(5), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(ProviderError::Timeout(_))));
    }

    #[test]
    fn test_error_mapping_keeps_recoverability() {
        let err: mnemos_core::Error = ProviderError::Unavailable("down".into()).into();
        assert!(err.is_recoverable());

        let err: mnemos_core::Error = ProviderError::RateLimited {
            retry_after_secs: Some(30),
        }
        .into();
        assert!(err.is_recoverable());
    }
}
