//! Nominatim place search

use crate::{truncate_body, IngestError, IngestResult};
use clima_core::{CollaboratorError, CollaboratorResult, Coordinates, Geocoder, NaturalKey};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    http: Client,
    url: Url,
}

impl NominatimGeocoder {
    /// Nominatim rejects requests without an identifying user agent
    pub fn new(url: &str, user_agent: &str, timeout: Duration) -> IngestResult<Self> {
        let url = Url::parse(url).map_err(|e| IngestError::InvalidEndpoint(format!("{url}: {e}")))?;
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| IngestError::InvalidEndpoint(e.to_string()))?;
        Ok(Self { http, url })
    }
}

#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

/// First search hit as coordinates; `NotFound` on an empty result list
pub fn parse_search_body(body: &str, query: &str) -> CollaboratorResult<Coordinates> {
    let places: Vec<Place> = serde_json::from_str(body)
        .map_err(|e| CollaboratorError::Upstream(format!("unreadable geocoder response: {e}")))?;

    let place = places
        .first()
        .ok_or_else(|| CollaboratorError::NotFound(format!("location '{query}'")))?;

    let coordinate = |raw: &str| {
        raw.parse::<f64>()
            .map_err(|_| CollaboratorError::Upstream(format!("invalid coordinate '{raw}'")))
    };

    Ok(Coordinates {
        latitude: coordinate(&place.lat)?,
        longitude: coordinate(&place.lon)?,
    })
}

#[async_trait::async_trait]
impl Geocoder for NominatimGeocoder {
    #[instrument(skip(self))]
    async fn resolve(&self, key: &NaturalKey) -> CollaboratorResult<Coordinates> {
        let query = key.query();
        let res = self
            .http
            .get(self.url.clone())
            .query(&[("q", query.as_str()), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| CollaboratorError::Upstream(format!("geocoder request failed: {e}")))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| CollaboratorError::Upstream(format!("geocoder body unreadable: {e}")))?;

        if !status.is_success() {
            return Err(CollaboratorError::Upstream(format!(
                "geocoder request failed with status {}: {}",
                status,
                truncate_body(&body)
            )));
        }

        let coordinates = parse_search_body(&body, &query)?;
        debug!(
            "Resolved '{}' to {}, {}",
            query, coordinates.latitude, coordinates.longitude
        );
        Ok(coordinates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_hit_wins() {
        let body = r#"[
            {"place_id": 1, "lat": "48.8588897", "lon": "2.3200410", "display_name": "Paris"},
            {"place_id": 2, "lat": "33.66", "lon": "-95.55", "display_name": "Paris, Texas"}
        ]"#;
        let coords = parse_search_body(body, "paris").unwrap();
        assert_eq!(coords.latitude, 48.8588897);
        assert_eq!(coords.longitude, 2.3200410);
    }

    #[test]
    fn test_empty_result_is_not_found() {
        let err = parse_search_body("[]", "atlantis, sea, ocean").unwrap_err();
        match err {
            CollaboratorError::NotFound(msg) => assert!(msg.contains("atlantis")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_garbage_is_upstream_error() {
        assert!(matches!(
            parse_search_body("<html>", "x"),
            Err(CollaboratorError::Upstream(_))
        ));
        assert!(matches!(
            parse_search_body(r#"[{"lat": "north", "lon": "1"}]"#, "x"),
            Err(CollaboratorError::Upstream(_))
        ));
    }
}
