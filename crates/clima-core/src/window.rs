//! Working-window evaluation against operating thresholds

use crate::forecast::ProjectedHour;
use crate::types::{Observation, Thresholds};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// An hourly record the evaluator can test against thresholds
pub trait HourlyReading {
    fn at(&self) -> NaiveDateTime;
    fn temperature(&self) -> f64;
    fn wind_speed(&self) -> f64;
    fn precipitation(&self) -> f64;
}

impl<R: HourlyReading + ?Sized> HourlyReading for &R {
    fn at(&self) -> NaiveDateTime {
        (**self).at()
    }

    fn temperature(&self) -> f64 {
        (**self).temperature()
    }

    fn wind_speed(&self) -> f64 {
        (**self).wind_speed()
    }

    fn precipitation(&self) -> f64 {
        (**self).precipitation()
    }
}

impl HourlyReading for Observation {
    fn at(&self) -> NaiveDateTime {
        self.observed_at
    }

    fn temperature(&self) -> f64 {
        self.temperature
    }

    fn wind_speed(&self) -> f64 {
        self.wind_speed
    }

    fn precipitation(&self) -> f64 {
        self.precipitation
    }
}

impl HourlyReading for ProjectedHour {
    fn at(&self) -> NaiveDateTime {
        self.at
    }

    fn temperature(&self) -> f64 {
        self.conditions.temperature
    }

    fn wind_speed(&self) -> f64 {
        self.conditions.wind_speed
    }

    fn precipitation(&self) -> f64 {
        self.conditions.precipitation
    }
}

impl Thresholds {
    /// Inclusive at every boundary
    pub fn admits<R: HourlyReading>(&self, reading: &R) -> bool {
        reading.temperature() >= self.min_temp
            && reading.wind_speed() <= self.max_wind
            && reading.precipitation() <= self.max_precip
    }
}

/// Working hours on one calendar date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub hours: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingWindow {
    pub total_hours: usize,
    pub total_output: f64,

    /// Matching timestamps, ascending
    #[serde(skip_serializing, default)]
    pub hours: Vec<NaiveDateTime>,

    pub calendar: Vec<CalendarDay>,
}

impl WorkingWindow {
    pub fn empty() -> Self {
        Self {
            total_hours: 0,
            total_output: 0.0,
            hours: Vec::new(),
            calendar: Vec::new(),
        }
    }
}

/// Scan readings once and collect working hours.
///
/// Input order is not trusted: matches are sorted before the calendar is
/// built, so dates come out ascending.
pub fn evaluate<I>(readings: I, thresholds: &Thresholds, print_speed: f64) -> WorkingWindow
where
    I: IntoIterator,
    I::Item: HourlyReading,
{
    let mut hours: Vec<NaiveDateTime> = readings
        .into_iter()
        .filter(|r| thresholds.admits(r))
        .map(|r| r.at())
        .collect();
    hours.sort_unstable();

    let mut calendar: Vec<CalendarDay> = Vec::new();
    for at in &hours {
        let date = at.date();
        match calendar.last_mut() {
            Some(day) if day.date == date => day.hours += 1,
            _ => calendar.push(CalendarDay { date, hours: 1 }),
        }
    }

    let total_hours = hours.len();
    WorkingWindow {
        total_hours,
        total_output: total_hours as f64 * print_speed,
        hours,
        calendar,
    }
}
