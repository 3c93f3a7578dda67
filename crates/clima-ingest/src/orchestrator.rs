//! History ingestion: fetch once per location, persist in paced batches

use crate::{IngestError, IngestResult, Pacer};
use chrono::NaiveDate;
use clima_core::{
    DateRange, HourlySeries, LocationId, LocationStore, Observation, ObservationStore,
    WeatherArchive,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct IngestSettings {
    /// Historical window requested from the archive
    pub range: DateRange,
    /// Observations per committed batch
    pub batch_size: usize,
    /// Minimum spacing between batches; zero disables pacing
    pub pace: Duration,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            range: DateRange {
                start: NaiveDate::from_ymd_opt(2014, 1, 1).unwrap_or_default(),
                end: NaiveDate::from_ymd_opt(2023, 12, 31).unwrap_or_default(),
            },
            batch_size: 500,
            pace: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// History was already complete; nothing fetched
    AlreadyPresent { observations: u64 },
    /// Fresh history fetched and committed
    Completed { inserted: u64, skipped: usize },
}

/// Translate archive arrays into observations, skipping hours with gaps.
///
/// Returns the observations and the number of skipped hours.
pub fn observations_from_series(
    location_id: LocationId,
    series: &HourlySeries,
    source: &str,
) -> IngestResult<(Vec<Observation>, usize)> {
    if !series.is_aligned() {
        return Err(IngestError::Fetch(format!(
            "hourly arrays differ in length (time={}, temperature={}, wind={}, precipitation={})",
            series.time.len(),
            series.temperature.len(),
            series.wind_speed.len(),
            series.precipitation.len()
        )));
    }

    let mut observations = Vec::with_capacity(series.len());
    let mut skipped = 0;
    for (i, at) in series.time.iter().enumerate() {
        match (series.temperature[i], series.wind_speed[i], series.precipitation[i]) {
            (Some(temperature), Some(wind_speed), Some(precipitation)) => {
                observations.push(Observation {
                    location_id,
                    observed_at: *at,
                    temperature,
                    wind_speed,
                    precipitation,
                    source: source.to_string(),
                });
            }
            _ => skipped += 1,
        }
    }

    Ok((observations, skipped))
}

/// Coordinates archive fetches and batched persistence.
///
/// Calls for the same location are serialized; a caller that waited on a
/// completed ingestion returns `AlreadyPresent` without fetching again.
pub struct Ingestor {
    locations: Arc<dyn LocationStore>,
    observations: Arc<dyn ObservationStore>,
    archive: Arc<dyn WeatherArchive>,
    settings: IngestSettings,
    claims: Mutex<HashMap<LocationId, Arc<tokio::sync::Mutex<()>>>>,
}

impl Ingestor {
    pub fn new(
        locations: Arc<dyn LocationStore>,
        observations: Arc<dyn ObservationStore>,
        archive: Arc<dyn WeatherArchive>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            locations,
            observations,
            archive,
            settings,
            claims: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &IngestSettings {
        &self.settings
    }

    fn claims(&self) -> MutexGuard<'_, HashMap<LocationId, Arc<tokio::sync::Mutex<()>>>> {
        self.claims
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn claim(&self, location_id: LocationId) -> Claim<'_> {
        let lock = Arc::clone(self.claims().entry(location_id).or_default());
        Claim {
            ingestor: self,
            location_id,
            lock,
        }
    }

    /// Make sure the location has a complete history
    #[instrument(skip(self, cancel))]
    pub async fn ensure_history(
        &self,
        location_id: LocationId,
        cancel: &CancellationToken,
    ) -> IngestResult<IngestOutcome> {
        let claim = self.claim(location_id);
        let _guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(IngestError::Cancelled { committed: 0 }),
            guard = claim.lock.lock() => guard,
        };

        let location = self
            .locations
            .get(location_id)
            .await?
            .ok_or(IngestError::LocationNotFound(location_id))?;

        if location.history_complete {
            let mark = self.observations.watermark(location_id).await?;
            debug!("Location {} already has {} observations", location_id, mark.count);
            return Ok(IngestOutcome::AlreadyPresent {
                observations: mark.count,
            });
        }

        let stale = self.observations.delete_by_location(location_id).await?;
        if stale > 0 {
            warn!(
                "Discarded {} observations from an incomplete ingestion of location {}",
                stale, location_id
            );
        }

        info!(
            "Fetching history for location {} ({} .. {})",
            location_id, self.settings.range.start, self.settings.range.end
        );
        let series = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(IngestError::Cancelled { committed: 0 }),
            series = self.archive.fetch_hourly(location.coordinates(), self.settings.range) => series?,
        };

        let (observations, skipped) =
            observations_from_series(location_id, &series, self.archive.source())?;
        if skipped > 0 {
            debug!("Skipped {} hours with missing values", skipped);
        }

        let inserted = self.persist(location_id, &observations, cancel).await?;

        // An empty fetch leaves the location open so a later call retries
        if inserted > 0 {
            self.locations
                .set_history_complete(location_id, true)
                .await?;
        }

        info!("Ingested {} observations for location {}", inserted, location_id);
        Ok(IngestOutcome::Completed { inserted, skipped })
    }

    async fn persist(
        &self,
        location_id: LocationId,
        observations: &[Observation],
        cancel: &CancellationToken,
    ) -> IngestResult<u64> {
        let mut pacer = Pacer::new(self.settings.pace);
        let mut committed = 0u64;

        for (n, batch) in observations.chunks(self.settings.batch_size.max(1)).enumerate() {
            if n > 0 {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        warn!(
                            "Ingestion of location {} cancelled after {} observations",
                            location_id, committed
                        );
                        return Err(IngestError::Cancelled { committed });
                    }
                    _ = pacer.tick() => {}
                }
            }

            committed += self.observations.append_batch(location_id, batch).await?;
            debug!("Committed batch {} ({} observations total)", n + 1, committed);
        }

        Ok(committed)
    }
}

/// Holds a location's serialization lock; the map entry is dropped with
/// the last holder
struct Claim<'a> {
    ingestor: &'a Ingestor,
    location_id: LocationId,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        let mut claims = self.ingestor.claims();
        // One reference in the map, one here
        if Arc::strong_count(&self.lock) == 2 {
            claims.remove(&self.location_id);
        }
    }
}
