//! Weather history ingestion
//!
//! Adapters for the external collaborators (Open-Meteo archive, Nominatim
//! geocoder, and an offline simulator) plus the orchestrator that fetches a
//! location's history once and persists it in paced batches.

pub mod archive;
pub mod geocode;
pub mod orchestrator;
pub mod pacer;
pub mod simulator;

pub use archive::*;
pub use geocode::*;
pub use orchestrator::*;
pub use pacer::*;
pub use simulator::*;

use clima_core::{CollaboratorError, LocationId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Location {0} not found")]
    LocationNotFound(LocationId),

    #[error("Data fetch error: {0}")]
    Fetch(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Ingestion cancelled after {committed} observations were committed")]
    Cancelled { committed: u64 },
}

pub type IngestResult<T> = Result<T, IngestError>;

impl From<CollaboratorError> for IngestError {
    fn from(err: CollaboratorError) -> Self {
        match err {
            CollaboratorError::NotFound(what) => IngestError::Fetch(format!("not found: {what}")),
            CollaboratorError::Upstream(msg) => IngestError::Fetch(msg),
            CollaboratorError::Store(msg) => IngestError::Store(msg),
        }
    }
}

/// Keep upstream error bodies short enough for logs
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
