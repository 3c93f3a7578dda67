//! Projection of a climatology profile onto a concrete calendar year

use crate::climatology::{BucketKey, Climatology, Conditions};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Every hour of a calendar year, ascending from January 1 00:00
#[derive(Debug, Clone)]
pub struct YearHours {
    range: Option<(NaiveDateTime, NaiveDateTime)>,
}

impl YearHours {
    /// Years chrono cannot represent yield no hours
    pub fn new(year: i32) -> Self {
        let start = year_start(year);
        let end = year.checked_add(1).and_then(year_start);
        Self {
            range: start.zip(end),
        }
    }
}

impl Iterator for YearHours {
    type Item = NaiveDateTime;

    fn next(&mut self) -> Option<Self::Item> {
        let (cursor, end) = self.range.as_mut()?;
        if *cursor >= *end {
            return None;
        }
        let current = *cursor;
        *cursor = current + Duration::hours(1);
        Some(current)
    }
}

fn year_start(year: i32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// True when `year` has a representable January 1
pub fn is_valid_year(year: i32) -> bool {
    year_start(year).is_some() && year.checked_add(1).and_then(year_start).is_some()
}

/// One projected hour carrying unrounded bucket means
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedHour {
    pub at: NaiveDateTime,
    pub conditions: Conditions,
}

/// One emitted forecast hour, rounded to two decimals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastHour {
    pub datetime: NaiveDateTime,
    pub temperature: f64,
    pub wind: f64,
    pub precipitation: f64,
}

impl From<ProjectedHour> for ForecastHour {
    fn from(hour: ProjectedHour) -> Self {
        let rounded = hour.conditions.rounded();
        Self {
            datetime: hour.at,
            temperature: rounded.temperature,
            wind: rounded.wind_speed,
            precipitation: rounded.precipitation,
        }
    }
}

/// Sparse typical-year series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub year: i32,
    pub hours: Vec<ForecastHour>,
}

/// Walk `year` hour by hour, yielding only hours with historical evidence
pub fn project(profile: &Climatology, year: i32) -> impl Iterator<Item = ProjectedHour> + '_ {
    YearHours::new(year).filter_map(move |at| {
        profile
            .mean(&BucketKey::from_datetime(&at))
            .map(|conditions| ProjectedHour { at, conditions })
    })
}

/// Materialize the rounded forecast for `year`
pub fn synthesize(profile: &Climatology, year: i32) -> Forecast {
    Forecast {
        year,
        hours: project(profile, year).map(ForecastHour::from).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Observation;

    fn at(year: i32, month: u32, day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn obs(observed_at: NaiveDateTime, temperature: f64) -> Observation {
        Observation {
            location_id: 1,
            observed_at,
            temperature,
            wind_speed: 3.0,
            precipitation: 0.0,
            source: "test".into(),
        }
    }

    /// One observation for every hour of a leap year
    fn full_leap_profile() -> Climatology {
        let data: Vec<_> = YearHours::new(2024).map(|t| obs(t, 1.0)).collect();
        Climatology::from_observations(&data)
    }

    #[test]
    fn test_year_hours_lengths() {
        assert_eq!(YearHours::new(2025).count(), 8760);
        assert_eq!(YearHours::new(2024).count(), 8784);

        let mut hours = YearHours::new(2025);
        assert_eq!(hours.next(), Some(at(2025, 1, 1, 0)));
        assert_eq!(hours.last(), Some(at(2025, 12, 31, 23)));
    }

    #[test]
    fn test_invalid_year_is_empty() {
        assert!(!is_valid_year(i32::MAX));
        assert_eq!(YearHours::new(i32::MAX).count(), 0);
        assert!(is_valid_year(2025));
    }

    #[test]
    fn test_forecast_uses_rounded_bucket_mean() {
        let temps = [5.0, 6.0, 7.0, 4.0, 5.0, 6.0, 7.0, 5.0, 6.0, 5.0];
        let data: Vec<_> = temps
            .iter()
            .enumerate()
            .map(|(i, t)| obs(at(2014 + i as i32, 1, 15, 8), *t))
            .collect();
        let profile = Climatology::from_observations(&data);

        let forecast = synthesize(&profile, 2025);
        assert_eq!(forecast.year, 2025);
        assert_eq!(forecast.hours.len(), 1);
        assert_eq!(forecast.hours[0].datetime, at(2025, 1, 15, 8));
        assert_eq!(forecast.hours[0].temperature, 5.6);
        assert_eq!(forecast.hours[0].wind, 3.0);
    }

    #[test]
    fn test_sparse_hours_are_omitted() {
        let data = vec![obs(at(2019, 7, 4, 12), 30.0), obs(at(2019, 7, 4, 14), 31.0)];
        let profile = Climatology::from_observations(&data);

        let hours: Vec<_> = project(&profile, 2025).map(|h| h.at).collect();
        assert_eq!(hours, vec![at(2025, 7, 4, 12), at(2025, 7, 4, 14)]);
    }

    #[test]
    fn test_full_coverage_fills_year() {
        let profile = full_leap_profile();
        assert_eq!(synthesize(&profile, 2024).hours.len(), 8784);
        // Feb 29 buckets are never visited in a common year
        assert_eq!(synthesize(&profile, 2025).hours.len(), 8760);
    }

    #[test]
    fn test_output_is_chronological_and_deterministic() {
        let data = vec![
            obs(at(2018, 12, 31, 23), 1.0),
            obs(at(2018, 1, 1, 0), 2.0),
            obs(at(2019, 6, 15, 6), 3.0),
        ];
        let profile = Climatology::from_observations(&data);

        let first = synthesize(&profile, 2025);
        let second = synthesize(&profile, 2025);
        assert_eq!(first, second);
        assert!(first.hours.windows(2).all(|w| w[0].datetime < w[1].datetime));
    }

    #[test]
    fn test_forecast_hour_serialization() {
        let hour = ForecastHour {
            datetime: at(2025, 3, 1, 6),
            temperature: 1.5,
            wind: 4.25,
            precipitation: 0.0,
        };
        insta::assert_snapshot!(
            serde_json::to_string(&hour).unwrap(),
            @r#"{"datetime":"2025-03-01T06:00:00","temperature":1.5,"wind":4.25,"precipitation":0.0}"#
        );
    }
}
