//! In-process store for tests and database-less runs

use chrono::Utc;
use clima_core::{
    CollaboratorError, CollaboratorResult, Location, LocationId, LocationStore, NaturalKey,
    NewLocation, Observation, ObservationStore, Watermark,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct MemoryState {
    next_id: LocationId,
    locations: BTreeMap<LocationId, Location>,
    observations: HashMap<LocationId, Vec<Observation>>,
}

/// Shared in-memory location and observation store. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn location_count(&self) -> usize {
        self.state.read().await.locations.len()
    }
}

#[async_trait::async_trait]
impl ObservationStore for MemoryStore {
    async fn list_by_location(
        &self,
        location_id: LocationId,
    ) -> CollaboratorResult<Vec<Observation>> {
        let state = self.state.read().await;
        Ok(state
            .observations
            .get(&location_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn append_batch(
        &self,
        location_id: LocationId,
        observations: &[Observation],
    ) -> CollaboratorResult<u64> {
        let mut state = self.state.write().await;
        if !state.locations.contains_key(&location_id) {
            return Err(CollaboratorError::Store(format!(
                "unknown location {location_id}"
            )));
        }
        state
            .observations
            .entry(location_id)
            .or_default()
            .extend_from_slice(observations);
        Ok(observations.len() as u64)
    }

    async fn watermark(&self, location_id: LocationId) -> CollaboratorResult<Watermark> {
        let state = self.state.read().await;
        let rows = state.observations.get(&location_id);
        Ok(Watermark {
            count: rows.map_or(0, |r| r.len() as u64),
            latest: rows.and_then(|r| r.iter().map(|o| o.observed_at).max()),
        })
    }

    async fn delete_by_location(&self, location_id: LocationId) -> CollaboratorResult<u64> {
        let mut state = self.state.write().await;
        Ok(state
            .observations
            .remove(&location_id)
            .map_or(0, |r| r.len() as u64))
    }
}

#[async_trait::async_trait]
impl LocationStore for MemoryStore {
    async fn find_by_natural_key(&self, key: &NaturalKey) -> CollaboratorResult<Option<Location>> {
        let state = self.state.read().await;
        Ok(state
            .locations
            .values()
            .find(|loc| loc.natural_key() == *key)
            .cloned())
    }

    async fn get(&self, location_id: LocationId) -> CollaboratorResult<Option<Location>> {
        Ok(self.state.read().await.locations.get(&location_id).cloned())
    }

    async fn create(&self, location: NewLocation) -> CollaboratorResult<Location> {
        let mut state = self.state.write().await;
        if let Some(existing) = state
            .locations
            .values()
            .find(|loc| loc.natural_key() == location.key)
        {
            return Ok(existing.clone());
        }

        state.next_id += 1;
        let created = Location {
            id: state.next_id,
            city: location.key.city,
            region: location.key.region,
            country: location.key.country,
            latitude: location.coordinates.latitude,
            longitude: location.coordinates.longitude,
            created_at: Utc::now(),
            history_complete: false,
        };
        state.locations.insert(created.id, created.clone());
        Ok(created)
    }

    async fn set_history_complete(
        &self,
        location_id: LocationId,
        complete: bool,
    ) -> CollaboratorResult<()> {
        let mut state = self.state.write().await;
        let location = state
            .locations
            .get_mut(&location_id)
            .ok_or_else(|| CollaboratorError::NotFound(format!("location {location_id}")))?;
        location.history_complete = complete;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use clima_core::Coordinates;

    fn new_location(city: &str) -> NewLocation {
        NewLocation {
            key: NaturalKey::new(city, "region", "country"),
            coordinates: Coordinates {
                latitude: 1.0,
                longitude: 2.0,
            },
        }
    }

    fn obs(location_id: LocationId, hour: u32) -> Observation {
        Observation {
            location_id,
            observed_at: NaiveDate::from_ymd_opt(2020, 1, 1)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap(),
            temperature: 1.0,
            wind_speed: 2.0,
            precipitation: 0.0,
            source: "test".into(),
        }
    }

    #[tokio::test]
    async fn test_create_is_keyed_by_natural_key() {
        let store = MemoryStore::new();
        let a = store.create(new_location("Bergen")).await.unwrap();
        let b = store.create(new_location(" bergen ")).await.unwrap();
        let c = store.create(new_location("Tromso")).await.unwrap();

        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(store.location_count().await, 2);

        let found = store
            .find_by_natural_key(&NaturalKey::new("BERGEN", "Region", "Country"))
            .await
            .unwrap();
        assert_eq!(found.map(|l| l.id), Some(a.id));
    }

    #[tokio::test]
    async fn test_observation_lifecycle() {
        let store = MemoryStore::new();
        let loc = store.create(new_location("Oslo")).await.unwrap();

        assert_eq!(store.watermark(loc.id).await.unwrap(), Watermark::default());

        let batch = vec![obs(loc.id, 3), obs(loc.id, 1)];
        assert_eq!(store.append_batch(loc.id, &batch).await.unwrap(), 2);

        let mark = store.watermark(loc.id).await.unwrap();
        assert_eq!(mark.count, 2);
        assert_eq!(mark.latest, Some(batch[0].observed_at));
        assert_eq!(store.list_by_location(loc.id).await.unwrap().len(), 2);

        assert_eq!(store.delete_by_location(loc.id).await.unwrap(), 2);
        assert!(store.list_by_location(loc.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_to_unknown_location_fails() {
        let store = MemoryStore::new();
        let err = store.append_batch(99, &[obs(99, 0)]).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Store(_)));
    }

    #[tokio::test]
    async fn test_history_flag() {
        let store = MemoryStore::new();
        let loc = store.create(new_location("Oslo")).await.unwrap();
        store.set_history_complete(loc.id, true).await.unwrap();
        assert!(store.get(loc.id).await.unwrap().unwrap().history_complete);

        let err = store.set_history_complete(42, true).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::NotFound(_)));
    }
}
