//! Collaborator interfaces: geocoding, weather archive and persistence

use crate::types::{
    Coordinates, DateRange, HourlySeries, Location, LocationId, NaturalKey, NewLocation,
    Observation, Watermark,
};

/// Failure reported by an external collaborator
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream fetch error: {0}")]
    Upstream(String),

    #[error("Store error: {0}")]
    Store(String),
}

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

#[async_trait::async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve a place to coordinates; `NotFound` when nothing matches
    async fn resolve(&self, key: &NaturalKey) -> CollaboratorResult<Coordinates>;
}

#[async_trait::async_trait]
pub trait WeatherArchive: Send + Sync {
    /// Provenance tag stamped on observations from this archive
    fn source(&self) -> &str;

    async fn fetch_hourly(
        &self,
        coordinates: Coordinates,
        range: DateRange,
    ) -> CollaboratorResult<HourlySeries>;
}

#[async_trait::async_trait]
pub trait ObservationStore: Send + Sync {
    /// All observations for a location, in no guaranteed order
    async fn list_by_location(&self, location_id: LocationId)
        -> CollaboratorResult<Vec<Observation>>;

    /// Persist one batch; returns the number of rows written
    async fn append_batch(
        &self,
        location_id: LocationId,
        observations: &[Observation],
    ) -> CollaboratorResult<u64>;

    async fn watermark(&self, location_id: LocationId) -> CollaboratorResult<Watermark>;

    async fn delete_by_location(&self, location_id: LocationId) -> CollaboratorResult<u64>;
}

#[async_trait::async_trait]
pub trait LocationStore: Send + Sync {
    async fn find_by_natural_key(&self, key: &NaturalKey) -> CollaboratorResult<Option<Location>>;

    async fn get(&self, location_id: LocationId) -> CollaboratorResult<Option<Location>>;

    async fn create(&self, location: NewLocation) -> CollaboratorResult<Location>;

    async fn set_history_complete(
        &self,
        location_id: LocationId,
        complete: bool,
    ) -> CollaboratorResult<()>;
}
