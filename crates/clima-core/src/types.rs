//! Core data types for locations and hourly observations

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Location identifier as assigned by the location store
pub type LocationId = i64;

/// Provenance tag for observations fetched from the Open-Meteo archive
pub const DEFAULT_SOURCE: &str = "open-meteo";

/// Normalized (city, region, country) triple used as the location natural key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NaturalKey {
    pub city: String,
    pub region: String,
    pub country: String,
}

impl NaturalKey {
    /// Build a key, trimming, lower-casing and collapsing inner whitespace
    pub fn new(city: &str, region: &str, country: &str) -> Self {
        Self {
            city: normalize(city),
            region: normalize(region),
            country: normalize(country),
        }
    }

    /// Free-text query understood by geocoders
    pub fn query(&self) -> String {
        format!("{}, {}, {}", self.city, self.region, self.country)
    }

    pub fn is_blank(&self) -> bool {
        self.city.is_empty() && self.region.is_empty() && self.country.is_empty()
    }
}

fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Latitude/longitude in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// A geocoded place with (possibly) ingested weather history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub city: String,
    pub region: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: DateTime<Utc>,

    /// Set once a full history ingestion has been committed
    #[serde(default)]
    pub history_complete: bool,
}

impl Location {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            city: self.city.clone(),
            region: self.region.clone(),
            country: self.country.clone(),
        }
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// Location insert request; the store assigns id and creation time
#[derive(Debug, Clone, PartialEq)]
pub struct NewLocation {
    pub key: NaturalKey,
    pub coordinates: Coordinates,
}

/// One hourly weather observation for a location.
///
/// `observed_at` is the location-local wall clock as reported by the archive;
/// the same naive clock is used for bucketing and calendar dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub location_id: LocationId,
    pub observed_at: NaiveDateTime,
    pub temperature: f64,
    pub wind_speed: f64,
    pub precipitation: f64,
    pub source: String,
}

/// Parallel hourly arrays as returned by a weather archive.
///
/// Values are optional because archives report gaps as nulls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HourlySeries {
    pub time: Vec<NaiveDateTime>,
    pub temperature: Vec<Option<f64>>,
    pub wind_speed: Vec<Option<f64>>,
    pub precipitation: Vec<Option<f64>>,
}

impl HourlySeries {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// True when every value array matches the timestamp array in length
    pub fn is_aligned(&self) -> bool {
        let n = self.time.len();
        self.temperature.len() == n && self.wind_speed.len() == n && self.precipitation.len() == n
    }
}

/// Operating limits for a working hour
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub min_temp: f64,
    pub max_wind: f64,
    pub max_precip: f64,
}

/// Staleness marker for a location's observation set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Watermark {
    pub count: u64,
    pub latest: Option<NaiveDateTime>,
}

/// Inclusive historical date range requested from an archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_key_normalization() {
        let key = NaturalKey::new("  New   York ", "NY", " United States ");
        assert_eq!(key.city, "new york");
        assert_eq!(key.region, "ny");
        assert_eq!(key.country, "united states");
        assert_eq!(key, NaturalKey::new("new york", "ny", "UNITED  STATES"));
        assert_eq!(key.query(), "new york, ny, united states");
    }

    #[test]
    fn test_blank_key() {
        assert!(NaturalKey::new(" ", "", "\t").is_blank());
        assert!(!NaturalKey::new("Oslo", "", "").is_blank());
    }

    #[test]
    fn test_series_alignment() {
        let at = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut series = HourlySeries {
            time: vec![at],
            temperature: vec![Some(1.0)],
            wind_speed: vec![Some(2.0)],
            precipitation: vec![None],
        };
        assert!(series.is_aligned());
        series.wind_speed.push(Some(3.0));
        assert!(!series.is_aligned());
    }

    #[test]
    fn test_location_serde_defaults_history_flag() {
        let json = r#"{"id":3,"city":"oslo","region":"oslo","country":"norway",
            "latitude":59.9,"longitude":10.7,"created_at":"2024-01-01T00:00:00Z"}"#;
        let loc: Location = serde_json::from_str(json).unwrap();
        assert_eq!(loc.id, 3);
        assert!(!loc.history_complete);
        assert_eq!(loc.natural_key(), NaturalKey::new("Oslo", "Oslo", "Norway"));
    }
}
