//! Persistence for locations and hourly observations
//!
//! `DbClient` talks to MySQL through a sqlx pool and bootstraps its own
//! tables. `MemoryStore` keeps everything in process for tests and
//! database-less runs. Both implement the `clima-core` store traits.

pub mod client;
pub mod memory;
pub mod queries;
pub mod schema;
pub mod store;

pub use client::*;
pub use memory::*;
pub use schema::*;

use clima_core::CollaboratorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Record not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

pub type DbResult<T> = Result<T, DbError>;

impl From<DbError> for CollaboratorError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => CollaboratorError::NotFound("record not found".into()),
            other => CollaboratorError::Store(other.to_string()),
        }
    }
}
