//! Hour-of-year bucketing of multi-year observations

use crate::types::Observation;
use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Calendar slot ignoring year: (month, day-of-month, hour-of-day)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BucketKey {
    pub month: u8,
    pub day: u8,
    pub hour: u8,
}

impl BucketKey {
    pub fn from_datetime(at: &NaiveDateTime) -> Self {
        Self {
            month: at.month() as u8,
            day: at.day() as u8,
            hour: at.hour() as u8,
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02} {:02}", self.month, self.day, self.hour)
    }
}

/// Mean (or single-hour) weather conditions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Conditions {
    pub temperature: f64,
    pub wind_speed: f64,
    pub precipitation: f64,
}

impl Conditions {
    pub fn rounded(&self) -> Self {
        Self {
            temperature: round2(self.temperature),
            wind_speed: round2(self.wind_speed),
            precipitation: round2(self.precipitation),
        }
    }
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Running sums for one bucket. Means are derived on read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HourBucket {
    temperature_sum: f64,
    wind_sum: f64,
    precipitation_sum: f64,
    count: u32,
}

impl HourBucket {
    pub fn add(&mut self, temperature: f64, wind_speed: f64, precipitation: f64) {
        self.temperature_sum += temperature;
        self.wind_sum += wind_speed;
        self.precipitation_sum += precipitation;
        self.count += 1;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn mean(&self) -> Option<Conditions> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        Some(Conditions {
            temperature: self.temperature_sum / n,
            wind_speed: self.wind_sum / n,
            precipitation: self.precipitation_sum / n,
        })
    }
}

/// Emitted view of one bucket, rounded for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSummary {
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub temperature: f64,
    pub wind: f64,
    pub precipitation: f64,
    pub count: u32,
}

/// Typical-year profile built from all observations of a location
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Climatology {
    buckets: BTreeMap<BucketKey, HourBucket>,
}

impl Climatology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single pass over observations in any order
    pub fn from_observations<'a, I>(observations: I) -> Self
    where
        I: IntoIterator<Item = &'a Observation>,
    {
        let mut profile = Self::new();
        for obs in observations {
            profile.add(obs);
        }
        profile
    }

    pub fn add(&mut self, obs: &Observation) {
        self.buckets
            .entry(BucketKey::from_datetime(&obs.observed_at))
            .or_default()
            .add(obs.temperature, obs.wind_speed, obs.precipitation);
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Number of populated buckets
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Total observations folded into the profile
    pub fn sample_count(&self) -> u64 {
        self.buckets.values().map(|b| b.count() as u64).sum()
    }

    pub fn bucket(&self, key: &BucketKey) -> Option<&HourBucket> {
        self.buckets.get(key)
    }

    /// Unrounded mean for a slot, `None` when no history exists for it
    pub fn mean(&self, key: &BucketKey) -> Option<Conditions> {
        self.buckets.get(key).and_then(HourBucket::mean)
    }

    /// Rounded per-bucket view in calendar order
    pub fn summary(&self) -> Vec<BucketSummary> {
        self.buckets
            .iter()
            .filter_map(|(key, bucket)| {
                let mean = bucket.mean()?.rounded();
                Some(BucketSummary {
                    month: key.month,
                    day: key.day,
                    hour: key.hour,
                    temperature: mean.temperature,
                    wind: mean.wind_speed,
                    precipitation: mean.precipitation,
                    count: bucket.count(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn obs(year: i32, month: u32, day: u32, hour: u32, temp: f64) -> Observation {
        Observation {
            location_id: 1,
            observed_at: NaiveDate::from_ymd_opt(year, month, day)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap(),
            temperature: temp,
            wind_speed: temp * 2.0,
            precipitation: 0.1,
            source: "test".into(),
        }
    }

    #[test]
    fn test_bucket_mean_across_years() {
        let temps = [5.0, 6.0, 7.0, 4.0, 5.0, 6.0, 7.0, 5.0, 6.0, 5.0];
        let data: Vec<_> = temps
            .iter()
            .enumerate()
            .map(|(i, t)| obs(2014 + i as i32, 1, 15, 8, *t))
            .collect();

        let profile = Climatology::from_observations(&data);
        let key = BucketKey { month: 1, day: 15, hour: 8 };

        assert_eq!(profile.len(), 1);
        assert_eq!(profile.bucket(&key).unwrap().count(), 10);
        let mean = profile.mean(&key).unwrap().rounded();
        assert_eq!(mean.temperature, 5.6);
        assert_eq!(mean.wind_speed, 11.2);
        assert_eq!(mean.precipitation, 0.1);
    }

    #[test]
    fn test_keys_ignore_year_but_not_hour() {
        let data = vec![
            obs(2015, 3, 1, 0, 1.0),
            obs(2016, 3, 1, 0, 3.0),
            obs(2016, 3, 1, 1, 10.0),
        ];
        let profile = Climatology::from_observations(&data);

        assert_eq!(profile.len(), 2);
        assert_eq!(profile.sample_count(), 3);
        let midnight = profile.mean(&BucketKey { month: 3, day: 1, hour: 0 }).unwrap();
        assert_eq!(midnight.temperature, 2.0);
    }

    #[test]
    fn test_duplicates_increase_count() {
        let data = vec![obs(2020, 6, 1, 12, 20.0), obs(2020, 6, 1, 12, 22.0)];
        let profile = Climatology::from_observations(&data);
        let key = BucketKey { month: 6, day: 1, hour: 12 };
        assert_eq!(profile.bucket(&key).unwrap().count(), 2);
        assert_eq!(profile.mean(&key).unwrap().temperature, 21.0);
    }

    #[test]
    fn test_leap_day_has_its_own_bucket() {
        let data = vec![obs(2016, 2, 29, 5, 1.0), obs(2017, 2, 28, 5, 2.0)];
        let profile = Climatology::from_observations(&data);
        assert!(profile.mean(&BucketKey { month: 2, day: 29, hour: 5 }).is_some());
        assert_eq!(
            profile.mean(&BucketKey { month: 2, day: 28, hour: 5 }).unwrap().temperature,
            2.0
        );
    }

    #[test]
    fn test_empty_profile() {
        let none: Vec<Observation> = Vec::new();
        let profile = Climatology::from_observations(&none);
        assert!(profile.is_empty());
        assert!(profile.summary().is_empty());
        assert_eq!(HourBucket::default().mean(), None);
    }

    #[test]
    fn test_summary_is_rounded_and_ordered() {
        let data = vec![
            obs(2020, 12, 31, 23, 1.0),
            obs(2020, 1, 1, 0, 1.0),
            obs(2021, 1, 1, 0, 1.0),
            obs(2022, 1, 1, 0, 2.0),
        ];
        let summary = Climatology::from_observations(&data).summary();
        assert_eq!(summary.len(), 2);
        assert_eq!((summary[0].month, summary[0].day), (1, 1));
        assert_eq!(summary[0].temperature, 1.33);
        assert_eq!(summary[0].count, 3);
        assert_eq!(summary[1].month, 12);
    }

    #[test]
    fn test_bucket_key_display() {
        let key = BucketKey { month: 2, day: 9, hour: 7 };
        insta::assert_snapshot!(key.to_string(), @"02-09 07");
    }
}
