//! Engine Error Taxonomy
//!
//! Semantic errors surface synchronously at the API boundary; transient
//! storage errors are retried by the watcher loop; submission errors are
//! terminal for the affected order only.

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("signature does not recover to maker")]
    SignatureInvalid,

    #[error("no strategy registered for order type: {0}")]
    UnknownOrderType(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("no price sample for symbol: {0}")]
    PriceMissing(String),

    #[error("stale price sample for symbol: {0}")]
    PriceStale(String),

    #[error("submission failed: {0}")]
    Submission(String),

    #[error("order not found: {0}")]
    NotFound(Uuid),
}

impl EngineError {
    /// Error code used in API envelopes and failure events
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::SignatureInvalid => "InvalidSignature",
            EngineError::UnknownOrderType(_) => "UnknownOrderType",
            EngineError::InvalidParams(_) => "InvalidParams",
            EngineError::Storage(_) => "StorageError",
            EngineError::PriceMissing(_) => "PriceMissing",
            EngineError::PriceStale(_) => "PriceStale",
            EngineError::Submission(_) => "SubmissionFailed",
            EngineError::NotFound(_) => "NotFound",
        }
    }

    /// Transient errors are swallowed and retried on the next tick
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::Storage(_) | EngineError::PriceMissing(_) | EngineError::PriceStale(_)
        )
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(e: sqlx::Error) -> Self {
        EngineError::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(EngineError::SignatureInvalid.code(), "InvalidSignature");
        assert_eq!(
            EngineError::Submission("rpc".into()).code(),
            "SubmissionFailed"
        );
    }

    #[test]
    fn test_transient() {
        assert!(EngineError::Storage("io".into()).is_transient());
        assert!(EngineError::PriceStale("agg:spot:ETHUSDT".into()).is_transient());
        assert!(!EngineError::Submission("rejected".into()).is_transient());
        assert!(!EngineError::SignatureInvalid.is_transient());
    }
}
