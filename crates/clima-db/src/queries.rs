//! Query operations for the locations and weather_data tables

use crate::schema::{LocationRow, WeatherRow};
use crate::{DbClient, DbError, DbResult};
use chrono::{NaiveDateTime, Utc};
use clima_core::{NaturalKey, NewLocation, Observation, Watermark};
use sqlx::{MySql, QueryBuilder, Row};
use tracing::{debug, instrument};

/// MySQL caps a prepared statement at 65,535 placeholders
const MAX_PLACEHOLDERS: usize = 65_535;
const WEATHER_COLUMNS: usize = 6;

/// Rows per multi-row `INSERT` into weather_data
const MAX_ROWS_PER_INSERT: usize = MAX_PLACEHOLDERS / WEATHER_COLUMNS;

impl DbClient {
    #[instrument(skip(self))]
    pub async fn find_location(&self, key: &NaturalKey) -> DbResult<Option<LocationRow>> {
        let row = sqlx::query_as::<_, LocationRow>(
            r#"
            SELECT id, city, region, country, latitude, longitude, created_at, history_complete
            FROM locations
            WHERE city = ? AND region = ? AND country = ?
            LIMIT 1
            "#,
        )
        .bind(&key.city)
        .bind(&key.region)
        .bind(&key.country)
        .fetch_optional(self.pool())
        .await?;

        Ok(row)
    }

    #[instrument(skip(self))]
    pub async fn get_location(&self, id: i64) -> DbResult<Option<LocationRow>> {
        let row = sqlx::query_as::<_, LocationRow>(
            r#"
            SELECT id, city, region, country, latitude, longitude, created_at, history_complete
            FROM locations
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row)
    }

    /// Insert a location, returning the existing row if the natural key is taken
    #[instrument(skip(self, location))]
    pub async fn insert_location(&self, location: &NewLocation) -> DbResult<LocationRow> {
        let created_at = Utc::now().naive_utc();
        let result = sqlx::query(
            r#"
            INSERT INTO locations (city, region, country, latitude, longitude, created_at, history_complete)
            VALUES (?, ?, ?, ?, ?, ?, FALSE)
            "#,
        )
        .bind(&location.key.city)
        .bind(&location.key.region)
        .bind(&location.key.country)
        .bind(location.coordinates.latitude)
        .bind(location.coordinates.longitude)
        .bind(created_at)
        .execute(self.pool())
        .await;

        match result {
            Ok(done) => {
                let id = done.last_insert_id() as i64;
                debug!("Inserted location {} ({})", id, location.key.query());
                self.get_location(id).await?.ok_or(DbError::NotFound)
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                debug!("Location {} already exists", location.key.query());
                self.find_location(&location.key).await?.ok_or_else(|| {
                    DbError::ConstraintViolation(format!(
                        "natural key {} reported duplicate but was not found",
                        location.key.query()
                    ))
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    pub async fn update_history_complete(&self, id: i64, complete: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE locations SET history_complete = ? WHERE id = ?")
            .bind(complete)
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 && self.get_location(id).await?.is_none() {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_weather(&self, location_id: i64) -> DbResult<Vec<WeatherRow>> {
        let rows = sqlx::query_as::<_, WeatherRow>(
            r#"
            SELECT location_id, datetime, temperature, wind_speed, precipitation, source
            FROM weather_data
            WHERE location_id = ?
            ORDER BY datetime ASC
            "#,
        )
        .bind(location_id)
        .fetch_all(self.pool())
        .await?;

        debug!("Retrieved {} weather rows for location {}", rows.len(), location_id);
        Ok(rows)
    }

    /// Insert one batch of observations in a single transaction
    #[instrument(skip(self, observations), fields(rows = observations.len()))]
    pub async fn insert_weather_batch(
        &self,
        location_id: i64,
        observations: &[Observation],
    ) -> DbResult<u64> {
        if observations.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool().begin().await?;
        let mut inserted = 0;
        for chunk in observations.chunks(MAX_ROWS_PER_INSERT) {
            let mut builder: QueryBuilder<MySql> = QueryBuilder::new(
                "INSERT INTO weather_data (location_id, datetime, temperature, wind_speed, precipitation, source) ",
            );
            builder.push_values(chunk, |mut row, obs| {
                row.push_bind(location_id)
                    .push_bind(obs.observed_at)
                    .push_bind(obs.temperature)
                    .push_bind(obs.wind_speed)
                    .push_bind(obs.precipitation)
                    .push_bind(obs.source.as_str());
            });
            inserted += builder.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;

        Ok(inserted)
    }

    #[instrument(skip(self))]
    pub async fn weather_watermark(&self, location_id: i64) -> DbResult<Watermark> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS count, MAX(datetime) AS latest
            FROM weather_data
            WHERE location_id = ?
            "#,
        )
        .bind(location_id)
        .fetch_one(self.pool())
        .await?;

        let count: i64 = row.try_get("count")?;
        let latest: Option<NaiveDateTime> = row.try_get("latest")?;
        Ok(Watermark {
            count: count.max(0) as u64,
            latest,
        })
    }

    #[instrument(skip(self))]
    pub async fn delete_weather(&self, location_id: i64) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM weather_data WHERE location_id = ?")
            .bind(location_id)
            .execute(self.pool())
            .await?;

        let deleted = result.rows_affected();
        debug!("Deleted {} weather rows for location {}", deleted, location_id);
        Ok(deleted)
    }
}
