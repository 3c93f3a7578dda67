//! Simulated archive and geocoder for offline runs and testing

use chrono::{Datelike, Duration, NaiveDateTime, Timelike};
use clima_core::{
    CollaboratorError, CollaboratorResult, Coordinates, DateRange, Geocoder, HourlySeries,
    NaturalKey, WeatherArchive,
};
use std::f64::consts::PI;

pub const SIMULATOR_SOURCE: &str = "simulator";

/// Archive that synthesizes a seasonal + diurnal hourly series
#[derive(Debug, Clone)]
pub struct SimulatedArchive {
    base_temp: f64,
}

impl SimulatedArchive {
    pub fn new() -> Self {
        Self { base_temp: 10.0 }
    }

    pub fn with_base_temp(base_temp: f64) -> Self {
        Self { base_temp }
    }

    fn sample(&self, at: NaiveDateTime, latitude: f64) -> (f64, f64, f64) {
        let doy = at.ordinal() as f64;
        let hour = at.hour() as f64;

        // Southern hemisphere seasons run opposite
        let season = if latitude < 0.0 { -1.0 } else { 1.0 };
        let temperature = self.base_temp
            + season * 12.0 * (2.0 * PI * (doy - 105.0) / 365.0).sin()
            + 5.0 * (2.0 * PI * (hour - 9.0) / 24.0).sin();
        let wind = 8.0 + 6.0 * (2.0 * PI * (hour - 15.0) / 24.0).cos().abs();
        let precipitation = if (at.ordinal() * 24 + at.hour()) % 17 == 0 {
            1.5
        } else {
            0.0
        };

        (temperature, wind, precipitation)
    }
}

impl Default for SimulatedArchive {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl WeatherArchive for SimulatedArchive {
    fn source(&self) -> &str {
        SIMULATOR_SOURCE
    }

    async fn fetch_hourly(
        &self,
        coordinates: Coordinates,
        range: DateRange,
    ) -> CollaboratorResult<HourlySeries> {
        if range.end < range.start {
            return Err(CollaboratorError::Upstream(format!(
                "end date {} precedes start date {}",
                range.end, range.start
            )));
        }

        let (Some(mut at), Some(end)) = (
            range.start.and_hms_opt(0, 0, 0),
            range.end.and_hms_opt(23, 0, 0),
        ) else {
            return Err(CollaboratorError::Upstream("unrepresentable date range".into()));
        };

        let mut series = HourlySeries::default();
        while at <= end {
            let (t, w, p) = self.sample(at, coordinates.latitude);
            series.time.push(at);
            series.temperature.push(Some(t));
            series.wind_speed.push(Some(w));
            series.precipitation.push(Some(p));
            at += Duration::hours(1);
        }
        Ok(series)
    }
}

/// Geocoder that resolves every place to the same point
#[derive(Debug, Clone, Copy)]
pub struct StaticGeocoder {
    coordinates: Coordinates,
}

impl StaticGeocoder {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            coordinates: Coordinates {
                latitude,
                longitude,
            },
        }
    }
}

#[async_trait::async_trait]
impl Geocoder for StaticGeocoder {
    async fn resolve(&self, key: &NaturalKey) -> CollaboratorResult<Coordinates> {
        if key.is_blank() {
            return Err(CollaboratorError::NotFound("empty place name".into()));
        }
        Ok(self.coordinates)
    }
}
