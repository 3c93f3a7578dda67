use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_PATH_ENV: &str = "CLIMA_CONFIG";
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Largest batch one MySQL insert can bind (65,535 placeholders, 6 per row)
pub const MAX_BATCH_SIZE: usize = 10_922;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// MySQL URL; without one the in-memory store is used
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchiveKind {
    OpenMeteo,
    Simulator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub kind: ArchiveKind,
    pub url: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub timeout_secs: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            kind: ArchiveKind::OpenMeteo,
            url: "https://archive-api.open-meteo.com/v1/archive".to_string(),
            start_date: NaiveDate::from_ymd_opt(2014, 1, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2023, 12, 31).unwrap_or_default(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GeocoderKind {
    Nominatim,
    Static,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub kind: GeocoderKind,
    pub url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Coordinates returned by the static geocoder
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            kind: GeocoderKind::Nominatim,
            url: "https://nominatim.openstreetmap.org/search".to_string(),
            user_agent: "GeoApp/1.0".to_string(),
            timeout_secs: 30,
            latitude: 0.0,
            longitude: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub batch_size: usize,
    /// Pause between batches; 0 disables pacing
    pub pace_ms: u64,
    pub ingest_on_register: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            pace_ms: 200,
            ingest_on_register: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Default target year; the current year when unset
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub archive: ArchiveConfig,
    pub geocoder: GeocoderConfig,
    pub ingest: IngestConfig,
    pub forecast: ForecastConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

impl AppConfig {
    /// Load configuration from the CLIMA_CONFIG path (TOML) if present, with
    /// defaults, then apply DATABASE_URL
    pub fn load() -> ConfigResult<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config.toml".to_string());
        let cfg = Self::load_from(path)?;
        cfg.with_database_url(std::env::var(DATABASE_URL_ENV).ok())
            .validated()
    }

    /// Missing file means defaults
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(AppConfig::default());
        }
        let s = fs::read_to_string(path)?;
        Self::parse(&s)
    }

    pub fn parse(s: &str) -> ConfigResult<Self> {
        Ok(toml::from_str::<AppConfig>(s)?)
    }

    /// A non-empty override replaces `[database].url`
    pub fn with_database_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.database.url = Some(url);
        }
        self
    }

    pub fn validated(self) -> ConfigResult<Self> {
        if self.ingest.batch_size == 0 {
            return Err(ConfigError::Invalid("ingest.batch_size must be at least 1".into()));
        }
        if self.ingest.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::Invalid(format!(
                "ingest.batch_size {} exceeds {}",
                self.ingest.batch_size, MAX_BATCH_SIZE
            )));
        }
        if self.archive.end_date < self.archive.start_date {
            return Err(ConfigError::Invalid(format!(
                "archive.end_date {} precedes archive.start_date {}",
                self.archive.end_date, self.archive.start_date
            )));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be at least 1".into(),
            ));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.bind, "0.0.0.0:8080");
        assert_eq!(cfg.database.url, None);
        assert_eq!(cfg.archive.kind, ArchiveKind::OpenMeteo);
        assert_eq!(cfg.archive.start_date.to_string(), "2014-01-01");
        assert_eq!(cfg.archive.url, "https://archive-api.open-meteo.com/v1/archive");
        assert_eq!(cfg.geocoder.url, "https://nominatim.openstreetmap.org/search");
        assert_eq!(cfg.ingest.batch_size, 500);
        assert_eq!(cfg.ingest.pace_ms, 200);
        assert!(cfg.ingest.ingest_on_register);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
bind = "127.0.0.1:9000"

[archive]
kind = "simulator"
start_date = "2020-01-01"

[geocoder]
kind = "static"
latitude = 60.39
longitude = 5.32

[forecast]
year = 2030
"#
        )
        .unwrap();

        let cfg = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(cfg.server.bind, "127.0.0.1:9000");
        assert_eq!(cfg.archive.kind, ArchiveKind::Simulator);
        assert_eq!(cfg.archive.end_date.to_string(), "2023-12-31");
        assert_eq!(cfg.geocoder.kind, GeocoderKind::Static);
        assert_eq!(cfg.geocoder.user_agent, "GeoApp/1.0");
        assert_eq!(cfg.forecast.year, Some(2030));
        assert_eq!(cfg.ingest, IngestConfig::default());
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AppConfig::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn database_url_override() {
        let cfg = AppConfig::parse("[database]\nurl = \"mysql://file/db\"\n").unwrap();
        assert_eq!(
            cfg.clone().with_database_url(Some("mysql://env/db".into())).database.url.as_deref(),
            Some("mysql://env/db")
        );
        assert_eq!(
            cfg.with_database_url(Some("  ".into())).database.url.as_deref(),
            Some("mysql://file/db")
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            AppConfig::parse("[archive]\nkind = \"ftp\"\n"),
            Err(ConfigError::Toml(_))
        ));

        let cfg = AppConfig::parse("[ingest]\nbatch_size = 0\n").unwrap();
        assert!(matches!(cfg.validated(), Err(ConfigError::Invalid(_))));

        let cfg = AppConfig::parse("[ingest]\nbatch_size = 10923\n").unwrap();
        assert!(matches!(cfg.validated(), Err(ConfigError::Invalid(_))));
        let cfg = AppConfig::parse("[ingest]\nbatch_size = 10922\n").unwrap();
        assert!(cfg.validated().is_ok());

        let cfg = AppConfig::parse(
            "[archive]\nstart_date = \"2023-01-01\"\nend_date = \"2022-01-01\"\n",
        )
        .unwrap();
        assert!(matches!(cfg.validated(), Err(ConfigError::Invalid(_))));
    }
}
