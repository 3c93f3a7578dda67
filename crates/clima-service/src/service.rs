//! Service facade

use crate::{ProfileCache, ServiceError, ServiceResult};
use chrono::{Datelike, Utc};
use clima_core::{
    evaluate, forecast, is_valid_year, Climatology, Forecast, Geocoder, Location, LocationId,
    LocationStore, NaturalKey, NewLocation, ObservationStore, Thresholds, WorkingWindow,
};
use clima_ingest::{IngestOutcome, Ingestor};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSettings {
    /// Fetch history as part of registering a new location
    pub ingest_on_register: bool,
    /// Forecast year used when a request names none
    pub default_year: Option<i32>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            ingest_on_register: true,
            default_year: None,
        }
    }
}

pub struct ClimaService {
    locations: Arc<dyn LocationStore>,
    observations: Arc<dyn ObservationStore>,
    geocoder: Arc<dyn Geocoder>,
    ingestor: Arc<Ingestor>,
    settings: ServiceSettings,
    profiles: ProfileCache,
    shutdown: CancellationToken,
}

impl ClimaService {
    pub fn new(
        locations: Arc<dyn LocationStore>,
        observations: Arc<dyn ObservationStore>,
        geocoder: Arc<dyn Geocoder>,
        ingestor: Arc<Ingestor>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            locations,
            observations,
            geocoder,
            ingestor,
            settings,
            profiles: ProfileCache::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Ingestions started implicitly (on register, in forecast mode) stop
    /// when this token is cancelled
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Look up a place by natural key, geocoding and creating it on a miss
    #[instrument(skip(self))]
    pub async fn register_location(
        &self,
        city: &str,
        region: &str,
        country: &str,
    ) -> ServiceResult<Location> {
        let key = NaturalKey::new(city, region, country);
        if key.is_blank() {
            return Err(ServiceError::InvalidRequest(
                "city, region and country may not all be empty".to_string(),
            ));
        }

        let location = match self.locations.find_by_natural_key(&key).await? {
            Some(existing) => {
                debug!("Location '{}' already registered as {}", key.query(), existing.id);
                existing
            }
            None => {
                let coordinates = self.geocoder.resolve(&key).await?;
                let created = self
                    .locations
                    .create(NewLocation { key, coordinates })
                    .await?;
                info!(
                    "Registered location {} at {}, {}",
                    created.id, created.latitude, created.longitude
                );
                created
            }
        };

        if self.settings.ingest_on_register && !location.history_complete {
            self.ingest(location.id, &self.shutdown.child_token()).await?;
            return self.require_location(location.id).await;
        }

        Ok(location)
    }

    /// Fetch and persist history unless the location already has it
    #[instrument(skip(self, cancel))]
    pub async fn ingest(
        &self,
        location_id: LocationId,
        cancel: &CancellationToken,
    ) -> ServiceResult<IngestOutcome> {
        let result = self.ingestor.ensure_history(location_id, cancel).await;
        // Partial commits change the stored set even when the run fails
        self.profiles.invalidate(location_id);
        Ok(result?)
    }

    /// Climatology for a location, served from cache while the store is unchanged
    #[instrument(skip(self))]
    pub async fn aggregate_profile(&self, location_id: LocationId) -> ServiceResult<Arc<Climatology>> {
        self.require_location(location_id).await?;

        let watermark = self.observations.watermark(location_id).await?;
        if watermark.count == 0 {
            return Err(ServiceError::NoData(location_id));
        }

        if let Some(profile) = self.profiles.get(location_id, &watermark) {
            debug!("Profile cache hit for location {}", location_id);
            return Ok(profile);
        }

        let observations = self.observations.list_by_location(location_id).await?;
        let profile = Arc::new(Climatology::from_observations(&observations));
        if profile.is_empty() {
            return Err(ServiceError::NoData(location_id));
        }

        debug!(
            "Built profile for location {}: {} buckets from {} observations",
            location_id,
            profile.len(),
            observations.len()
        );
        self.profiles
            .insert(location_id, watermark, Arc::clone(&profile));
        Ok(profile)
    }

    /// Typical-year hourly series for `year`
    #[instrument(skip(self))]
    pub async fn synthesize_forecast(
        &self,
        location_id: LocationId,
        year: Option<i32>,
    ) -> ServiceResult<Forecast> {
        let year = self.resolve_year(year)?;
        let profile = self.aggregate_profile(location_id).await?;
        Ok(forecast::synthesize(&profile, year))
    }

    /// Count working hours in raw history or in a projected typical year
    #[instrument(skip(self))]
    pub async fn evaluate_window(
        &self,
        location_id: LocationId,
        thresholds: Thresholds,
        print_speed: f64,
        use_forecast: bool,
        year: Option<i32>,
    ) -> ServiceResult<WorkingWindow> {
        if !print_speed.is_finite() || print_speed < 0.0 {
            return Err(ServiceError::InvalidRequest(format!(
                "print_speed must be a non-negative number, got {print_speed}"
            )));
        }

        if !use_forecast {
            self.require_location(location_id).await?;
            let observations = self.observations.list_by_location(location_id).await?;
            return Ok(evaluate(&observations, &thresholds, print_speed));
        }

        let year = self.resolve_year(year)?;
        self.require_location(location_id).await?;

        let watermark = self.observations.watermark(location_id).await?;
        if watermark.count == 0 {
            warn!(
                "No history for location {}; ingesting before projecting",
                location_id
            );
            self.ingest(location_id, &self.shutdown.child_token()).await?;
        }

        let profile = self.aggregate_profile(location_id).await?;
        Ok(evaluate(
            forecast::project(&profile, year),
            &thresholds,
            print_speed,
        ))
    }

    async fn require_location(&self, location_id: LocationId) -> ServiceResult<Location> {
        self.locations
            .get(location_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("location {location_id}")))
    }

    fn resolve_year(&self, year: Option<i32>) -> ServiceResult<i32> {
        let year = year
            .or(self.settings.default_year)
            .unwrap_or_else(|| Utc::now().year());
        if !is_valid_year(year) {
            return Err(ServiceError::InvalidRequest(format!(
                "year {year} is out of range"
            )));
        }
        Ok(year)
    }
}
