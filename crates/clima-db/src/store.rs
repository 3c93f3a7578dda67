//! Store trait implementations backed by MySQL

use crate::DbClient;
use clima_core::{
    CollaboratorResult, Location, LocationId, LocationStore, NaturalKey, NewLocation, Observation,
    ObservationStore, Watermark,
};

#[async_trait::async_trait]
impl ObservationStore for DbClient {
    async fn list_by_location(
        &self,
        location_id: LocationId,
    ) -> CollaboratorResult<Vec<Observation>> {
        let rows = self.get_weather(location_id).await?;
        Ok(rows.into_iter().map(Observation::from).collect())
    }

    async fn append_batch(
        &self,
        location_id: LocationId,
        observations: &[Observation],
    ) -> CollaboratorResult<u64> {
        Ok(self.insert_weather_batch(location_id, observations).await?)
    }

    async fn watermark(&self, location_id: LocationId) -> CollaboratorResult<Watermark> {
        Ok(self.weather_watermark(location_id).await?)
    }

    async fn delete_by_location(&self, location_id: LocationId) -> CollaboratorResult<u64> {
        Ok(self.delete_weather(location_id).await?)
    }
}

#[async_trait::async_trait]
impl LocationStore for DbClient {
    async fn find_by_natural_key(&self, key: &NaturalKey) -> CollaboratorResult<Option<Location>> {
        Ok(self.find_location(key).await?.map(Location::from))
    }

    async fn get(&self, location_id: LocationId) -> CollaboratorResult<Option<Location>> {
        Ok(self.get_location(location_id).await?.map(Location::from))
    }

    async fn create(&self, location: NewLocation) -> CollaboratorResult<Location> {
        Ok(self.insert_location(&location).await?.into())
    }

    async fn set_history_complete(
        &self,
        location_id: LocationId,
        complete: bool,
    ) -> CollaboratorResult<()> {
        Ok(self.update_history_complete(location_id, complete).await?)
    }
}
