//! Database client and connection management

use crate::schema::BOOTSTRAP;
use crate::{DbError, DbResult};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use std::time::Duration;
use tracing::{debug, instrument};

/// Database client wrapping a sqlx connection pool.
///
/// Connections are acquired per query and returned when the query finishes;
/// clones share the pool.
#[derive(Clone)]
pub struct DbClient {
    pool: MySqlPool,
}

impl DbClient {
    /// Create a new database client from connection string
    pub async fn new(database_url: &str) -> DbResult<Self> {
        Self::with_max_connections(database_url, 10).await
    }

    pub async fn with_max_connections(database_url: &str, max_connections: u32) -> DbResult<Self> {
        if database_url.trim().is_empty() {
            return Err(DbError::ConfigError("empty database URL".into()));
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Get reference to underlying pool for direct queries
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Create tables that do not exist yet
    #[instrument(skip(self))]
    pub async fn init_schema(&self) -> DbResult<()> {
        for statement in BOOTSTRAP {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("Schema bootstrap complete ({} statements)", BOOTSTRAP.len());
        Ok(())
    }

    /// Close the connection pool gracefully
    pub async fn close(self) {
        self.pool.close().await;
    }
}
