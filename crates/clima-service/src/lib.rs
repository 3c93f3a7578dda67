//! Public operations over locations, history and working-hour windows
//!
//! Wraps the stores, the geocoder and the ingestor behind one facade and maps
//! every failure into the [`ServiceError`] taxonomy used by the gateway.

pub mod cache;
pub mod service;

pub use cache::*;
pub use service::*;

use clima_core::{CollaboratorError, LocationId};
use clima_ingest::IngestError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream fetch error: {0}")]
    UpstreamFetch(String),

    #[error("No weather data for location {0}")]
    NoData(LocationId),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Operation cancelled after {committed} observations were committed")]
    Cancelled { committed: u64 },

    #[error("Store error: {0}")]
    Store(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    /// Stable machine-readable tag
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "not_found",
            ServiceError::UpstreamFetch(_) => "upstream_fetch",
            ServiceError::NoData(_) => "no_data",
            ServiceError::InvalidRequest(_) => "invalid_request",
            ServiceError::Cancelled { .. } => "cancelled",
            ServiceError::Store(_) => "store",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::UpstreamFetch(_) | ServiceError::Cancelled { .. } | ServiceError::Store(_)
        )
    }
}

impl From<CollaboratorError> for ServiceError {
    fn from(err: CollaboratorError) -> Self {
        match err {
            CollaboratorError::NotFound(what) => ServiceError::NotFound(what),
            CollaboratorError::Upstream(msg) => ServiceError::UpstreamFetch(msg),
            CollaboratorError::Store(msg) => ServiceError::Store(msg),
        }
    }
}

impl From<IngestError> for ServiceError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::LocationNotFound(id) => ServiceError::NotFound(format!("location {id}")),
            IngestError::Fetch(msg) => ServiceError::UpstreamFetch(msg),
            IngestError::Store(msg) => ServiceError::Store(msg),
            IngestError::InvalidEndpoint(msg) => ServiceError::UpstreamFetch(msg),
            IngestError::Cancelled { committed } => ServiceError::Cancelled { committed },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(ServiceError::UpstreamFetch("x".into()).is_retryable());
        assert!(ServiceError::Cancelled { committed: 3 }.is_retryable());
        assert!(ServiceError::Store("x".into()).is_retryable());
        assert!(!ServiceError::NotFound("x".into()).is_retryable());
        assert!(!ServiceError::NoData(1).is_retryable());
        assert!(!ServiceError::InvalidRequest("x".into()).is_retryable());
    }

    #[test]
    fn test_ingest_error_mapping() {
        let err: ServiceError = IngestError::LocationNotFound(12).into();
        assert_eq!(err.kind(), "not_found");
        assert_eq!(err.to_string(), "Not found: location 12");

        let err: ServiceError = IngestError::Cancelled { committed: 500 }.into();
        assert!(matches!(err, ServiceError::Cancelled { committed: 500 }));

        let err: ServiceError = IngestError::Fetch("no hourly".into()).into();
        assert_eq!(err.kind(), "upstream_fetch");
    }
}
