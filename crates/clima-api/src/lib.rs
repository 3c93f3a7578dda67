use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    routing::{get, post},
    Json, Router,
};
use clima_config::{AppConfig, ArchiveKind, GeocoderKind};
use clima_core::{
    DateRange, ForecastHour, Geocoder, LocationId, LocationStore, ObservationStore, Thresholds,
    WeatherArchive,
};
use clima_db::{DbClient, MemoryStore};
use clima_ingest::{
    IngestOutcome, IngestSettings, Ingestor, NominatimGeocoder, OpenMeteoArchive,
    SimulatedArchive, StaticGeocoder,
};
use clima_service::{ClimaService, ServiceError, ServiceSettings};
use opentelemetry::{
    metrics::{Counter, MeterProvider},
    KeyValue,
};
use opentelemetry_prometheus::exporter;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::{Encoder, Registry, TextEncoder};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

pub mod error;

pub use error::*;

pub struct AppState {
    ready: AtomicBool,
    registry: Registry,
    #[allow(dead_code)]
    provider: SdkMeterProvider,
    requests_total: Counter<u64>,
    service: Arc<ClimaService>,
    shutdown: CancellationToken,
}

impl AppState {
    fn count(&self, route: &'static str) {
        self.requests_total
            .add(1, &[KeyValue::new("route", route)]);
    }
}

/// Wire stores, collaborators and the ingestor from configuration.
///
/// Without a database URL everything lives in memory.
pub async fn build_service(cfg: &AppConfig, shutdown: CancellationToken) -> Result<ClimaService> {
    let (locations, observations): (Arc<dyn LocationStore>, Arc<dyn ObservationStore>) =
        match cfg.database.url.as_deref() {
            Some(url) => {
                let client = DbClient::with_max_connections(url, cfg.database.max_connections)
                    .await
                    .context("failed to connect to database")?;
                client
                    .init_schema()
                    .await
                    .context("failed to initialize schema")?;
                tracing::info!("Using MySQL store");
                let locations: Arc<dyn LocationStore> = Arc::new(client.clone());
                let observations: Arc<dyn ObservationStore> = Arc::new(client);
                (locations, observations)
            }
            None => {
                tracing::warn!("No database URL configured; using in-memory store");
                let store = MemoryStore::new();
                let locations: Arc<dyn LocationStore> = Arc::new(store.clone());
                let observations: Arc<dyn ObservationStore> = Arc::new(store);
                (locations, observations)
            }
        };

    let archive: Arc<dyn WeatherArchive> = match cfg.archive.kind {
        ArchiveKind::OpenMeteo => Arc::new(
            OpenMeteoArchive::new(&cfg.archive.url, Duration::from_secs(cfg.archive.timeout_secs))
                .context("invalid archive endpoint")?,
        ),
        ArchiveKind::Simulator => Arc::new(SimulatedArchive::new()),
    };

    let geocoder: Arc<dyn Geocoder> = match cfg.geocoder.kind {
        GeocoderKind::Nominatim => Arc::new(
            NominatimGeocoder::new(
                &cfg.geocoder.url,
                &cfg.geocoder.user_agent,
                Duration::from_secs(cfg.geocoder.timeout_secs),
            )
            .context("invalid geocoder endpoint")?,
        ),
        GeocoderKind::Static => Arc::new(StaticGeocoder::new(
            cfg.geocoder.latitude,
            cfg.geocoder.longitude,
        )),
    };

    let ingestor = Ingestor::new(
        Arc::clone(&locations),
        Arc::clone(&observations),
        archive,
        IngestSettings {
            range: DateRange {
                start: cfg.archive.start_date,
                end: cfg.archive.end_date,
            },
            batch_size: cfg.ingest.batch_size,
            pace: Duration::from_millis(cfg.ingest.pace_ms),
        },
    );

    let settings = ServiceSettings {
        ingest_on_register: cfg.ingest.ingest_on_register,
        default_year: cfg.forecast.year,
    };

    Ok(
        ClimaService::new(locations, observations, geocoder, Arc::new(ingestor), settings)
            .with_shutdown(shutdown),
    )
}

pub fn build_app(
    service: Arc<ClimaService>,
    shutdown: CancellationToken,
) -> Result<(Router, Arc<AppState>)> {
    // Prometheus exporter via OpenTelemetry
    let registry = Registry::new();
    let reader = exporter()
        .with_registry(registry.clone())
        .build()
        .context("failed to build prometheus exporter")?;
    let provider = SdkMeterProvider::builder().with_reader(reader).build();
    let meter = provider.meter("clima-api");

    let requests_total = meter
        .u64_counter("clima_requests_total")
        .with_description("Total HTTP requests served")
        .init();

    let state = Arc::new(AppState {
        ready: AtomicBool::new(false),
        registry,
        provider,
        requests_total,
        service,
        shutdown,
    });

    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/location/", post(add_location))
        .route("/weather/fetch/", post(weather_fetch))
        .route("/weather/forecast/", post(weather_forecast))
        .route("/printer/working-hours/", post(working_hours))
        .route("/printer/forecast-hours/", post(forecast_hours))
        // Browser frontends call from any origin
        .layer(CorsLayer::permissive())
        .with_state(Arc::clone(&state));

    Ok((router, state))
}

pub fn set_ready(state: &Arc<AppState>, is_ready: bool) {
    state.ready.store(is_ready, Ordering::Relaxed);
}

fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> std::result::Result<T, ApiError> {
    payload
        .map(|Json(inner)| inner)
        .map_err(|rejection| ApiError(ServiceError::InvalidRequest(rejection.body_text())))
}

async fn healthz(State(state): State<Arc<AppState>>) -> StatusCode {
    state.count("/healthz");
    StatusCode::OK
}

async fn readyz(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.ready.load(Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn metrics(
    State(state): State<Arc<AppState>>,
) -> (
    [(axum::http::header::HeaderName, axum::http::HeaderValue); 1],
    String,
) {
    let encoder = TextEncoder::new();
    let metric_families = state.registry.gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buf) {
        tracing::warn!(error=?e, "failed to encode metrics");
    }
    let body = String::from_utf8(buf).unwrap_or_default();
    let header = (
        header::CONTENT_TYPE,
        axum::http::HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
    );
    ([header], body)
}

#[derive(Debug, Deserialize)]
pub struct LocationRequest {
    pub city: String,
    pub region: String,
    pub country: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LocationResponse {
    pub id: LocationId,
    pub city: String,
    pub region: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
}

async fn add_location(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<LocationRequest>, JsonRejection>,
) -> std::result::Result<Json<LocationResponse>, ApiError> {
    state.count("/location/");
    let req = body(payload)?;
    let loc = state
        .service
        .register_location(&req.city, &req.region, &req.country)
        .await?;
    Ok(Json(LocationResponse {
        id: loc.id,
        city: loc.city,
        region: loc.region,
        country: loc.country,
        latitude: loc.latitude,
        longitude: loc.longitude,
    }))
}

#[derive(Debug, Deserialize)]
pub struct WeatherRequest {
    pub location_id: LocationId,
}

#[derive(Debug, Serialize)]
pub struct FetchResponse {
    pub status: &'static str,
    pub outcome: IngestOutcome,
}

async fn weather_fetch(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<WeatherRequest>, JsonRejection>,
) -> std::result::Result<Json<FetchResponse>, ApiError> {
    state.count("/weather/fetch/");
    let req = body(payload)?;
    let outcome = state
        .service
        .ingest(req.location_id, &state.shutdown.child_token())
        .await?;
    Ok(Json(FetchResponse {
        status: "ok",
        outcome,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ForecastRequest {
    pub location_id: LocationId,
    #[serde(default)]
    pub year: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct ForecastResponse {
    pub location_id: LocationId,
    pub year: i32,
    pub forecast: Vec<ForecastHour>,
}

async fn weather_forecast(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<ForecastRequest>, JsonRejection>,
) -> std::result::Result<Json<ForecastResponse>, ApiError> {
    state.count("/weather/forecast/");
    let req = body(payload)?;
    let forecast = state
        .service
        .synthesize_forecast(req.location_id, req.year)
        .await?;
    Ok(Json(ForecastResponse {
        location_id: req.location_id,
        year: forecast.year,
        forecast: forecast.hours,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PrinterConditions {
    pub location_id: LocationId,
    pub min_temp: f64,
    pub max_wind: f64,
    pub max_precip: f64,
    pub print_speed: f64,
    /// Only read by the forecast-hours endpoint
    #[serde(default)]
    pub year: Option<i32>,
}

impl PrinterConditions {
    fn thresholds(&self) -> Thresholds {
        Thresholds {
            min_temp: self.min_temp,
            max_wind: self.max_wind,
            max_precip: self.max_precip,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WindowResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<LocationId>,
    #[serde(flatten)]
    pub window: clima_core::WorkingWindow,
}

async fn working_hours(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<PrinterConditions>, JsonRejection>,
) -> std::result::Result<Json<WindowResponse>, ApiError> {
    state.count("/printer/working-hours/");
    let req = body(payload)?;
    let window = state
        .service
        .evaluate_window(req.location_id, req.thresholds(), req.print_speed, false, None)
        .await?;
    Ok(Json(WindowResponse {
        location_id: None,
        window,
    }))
}

async fn forecast_hours(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<PrinterConditions>, JsonRejection>,
) -> std::result::Result<Json<WindowResponse>, ApiError> {
    state.count("/printer/forecast-hours/");
    let req = body(payload)?;
    let window = state
        .service
        .evaluate_window(
            req.location_id,
            req.thresholds(),
            req.print_speed,
            true,
            req.year,
        )
        .await?;
    Ok(Json(WindowResponse {
        location_id: Some(req.location_id),
        window,
    }))
}
