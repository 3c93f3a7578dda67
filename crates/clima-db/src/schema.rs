//! Table layout and row types for the Clima MySQL schema

use chrono::{DateTime, NaiveDateTime, Utc};
use clima_core::{Location, Observation};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Location table record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LocationRow {
    pub id: i64,
    pub city: String,
    pub region: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,

    /// Stored as UTC wall clock
    pub created_at: NaiveDateTime,

    pub history_complete: bool,
}

impl From<LocationRow> for Location {
    fn from(row: LocationRow) -> Self {
        Location {
            id: row.id,
            city: row.city,
            region: row.region,
            country: row.country,
            latitude: row.latitude,
            longitude: row.longitude,
            created_at: DateTime::<Utc>::from_naive_utc_and_offset(row.created_at, Utc),
            history_complete: row.history_complete,
        }
    }
}

/// Hourly observation record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WeatherRow {
    pub location_id: i64,

    /// Location-local hour
    #[sqlx(rename = "datetime")]
    pub observed_at: NaiveDateTime,

    pub temperature: f64,
    pub wind_speed: f64,
    pub precipitation: f64,
    pub source: String,
}

impl From<WeatherRow> for Observation {
    fn from(row: WeatherRow) -> Self {
        Observation {
            location_id: row.location_id,
            observed_at: row.observed_at,
            temperature: row.temperature,
            wind_speed: row.wind_speed,
            precipitation: row.precipitation,
            source: row.source,
        }
    }
}

pub mod tables {
    pub const LOCATIONS: &str = "locations";
    pub const WEATHER_DATA: &str = "weather_data";
}

/// Idempotent DDL, executed one statement at a time
pub const BOOTSTRAP: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS locations (
        id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
        city VARCHAR(255) NOT NULL,
        region VARCHAR(255) NOT NULL,
        country VARCHAR(255) NOT NULL,
        latitude DOUBLE NOT NULL,
        longitude DOUBLE NOT NULL,
        created_at DATETIME NOT NULL,
        history_complete BOOLEAN NOT NULL DEFAULT FALSE,
        UNIQUE KEY uq_locations_natural_key (city, region, country)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS weather_data (
        id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
        location_id BIGINT NOT NULL,
        datetime DATETIME NOT NULL,
        temperature DOUBLE NOT NULL,
        wind_speed DOUBLE NOT NULL,
        precipitation DOUBLE NOT NULL,
        source VARCHAR(64) NOT NULL DEFAULT 'open-meteo',
        INDEX idx_weather_location_time (location_id, datetime),
        CONSTRAINT fk_weather_location FOREIGN KEY (location_id)
            REFERENCES locations (id) ON DELETE CASCADE
    )
    "#,
];

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_location_row_conversion() {
        let created = NaiveDate::from_ymd_opt(2024, 2, 1)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        let row = LocationRow {
            id: 4,
            city: "lyon".into(),
            region: "auvergne-rhone-alpes".into(),
            country: "france".into(),
            latitude: 45.76,
            longitude: 4.83,
            created_at: created,
            history_complete: true,
        };

        let loc = Location::from(row);
        assert_eq!(loc.id, 4);
        assert_eq!(loc.created_at.naive_utc(), created);
        assert!(loc.history_complete);
    }

    #[test]
    fn test_bootstrap_covers_tables() {
        assert_eq!(BOOTSTRAP.len(), 2);
        assert!(BOOTSTRAP[0].contains(tables::LOCATIONS));
        assert!(BOOTSTRAP[1].contains(tables::WEATHER_DATA));
        assert!(BOOTSTRAP[1].contains("ON DELETE CASCADE"));
    }
}
