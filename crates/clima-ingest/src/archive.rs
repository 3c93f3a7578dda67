//! Open-Meteo historical archive client

use crate::{truncate_body, IngestError, IngestResult};
use chrono::NaiveDateTime;
use clima_core::{
    CollaboratorError, CollaboratorResult, Coordinates, DateRange, HourlySeries, WeatherArchive,
    DEFAULT_SOURCE,
};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

const HOURLY_FIELDS: &str = "temperature_2m,wind_speed_10m,precipitation";
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

#[derive(Debug, Clone)]
pub struct OpenMeteoArchive {
    http: Client,
    url: Url,
}

impl OpenMeteoArchive {
    pub fn new(url: &str, timeout: Duration) -> IngestResult<Self> {
        let url = Url::parse(url).map_err(|e| IngestError::InvalidEndpoint(format!("{url}: {e}")))?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IngestError::InvalidEndpoint(e.to_string()))?;
        Ok(Self { http, url })
    }
}

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    hourly: Option<HourlyBlock>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HourlyBlock {
    time: Vec<String>,
    temperature_2m: Vec<Option<f64>>,
    wind_speed_10m: Vec<Option<f64>>,
    precipitation: Vec<Option<f64>>,
}

/// Decode an archive response body into parallel hourly arrays
pub fn parse_archive_body(body: &str) -> CollaboratorResult<HourlySeries> {
    let parsed: ArchiveResponse = serde_json::from_str(body)
        .map_err(|e| CollaboratorError::Upstream(format!("unreadable archive response: {e}")))?;

    let hourly = parsed.hourly.ok_or_else(|| {
        CollaboratorError::Upstream(match parsed.reason {
            Some(reason) => format!("archive response has no hourly data: {reason}"),
            None => "archive response has no hourly data".to_string(),
        })
    })?;

    let time = hourly
        .time
        .iter()
        .map(|t| {
            NaiveDateTime::parse_from_str(t, TIME_FORMAT)
                .map_err(|_| CollaboratorError::Upstream(format!("invalid hourly timestamp '{t}'")))
        })
        .collect::<CollaboratorResult<Vec<_>>>()?;

    Ok(HourlySeries {
        time,
        temperature: hourly.temperature_2m,
        wind_speed: hourly.wind_speed_10m,
        precipitation: hourly.precipitation,
    })
}

#[async_trait::async_trait]
impl WeatherArchive for OpenMeteoArchive {
    fn source(&self) -> &str {
        DEFAULT_SOURCE
    }

    #[instrument(skip(self))]
    async fn fetch_hourly(
        &self,
        coordinates: Coordinates,
        range: DateRange,
    ) -> CollaboratorResult<HourlySeries> {
        let start = range.start.format("%Y-%m-%d").to_string();
        let end = range.end.format("%Y-%m-%d").to_string();

        let res = self
            .http
            .get(self.url.clone())
            .query(&[
                ("latitude", coordinates.latitude.to_string()),
                ("longitude", coordinates.longitude.to_string()),
                ("start_date", start),
                ("end_date", end),
                ("hourly", HOURLY_FIELDS.to_string()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await
            .map_err(|e| CollaboratorError::Upstream(format!("archive request failed: {e}")))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| CollaboratorError::Upstream(format!("archive body unreadable: {e}")))?;

        if !status.is_success() {
            return Err(CollaboratorError::Upstream(format!(
                "archive request failed with status {}: {}",
                status,
                truncate_body(&body)
            )));
        }

        let series = parse_archive_body(&body)?;
        debug!("Archive returned {} hourly rows", series.len());
        Ok(series)
    }
}
