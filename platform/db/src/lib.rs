//! Database primitives: settings, pool wiring and optimistic-concurrency helpers.

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr, SqlErr};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

/// Shared connection pool alias.
pub type DbPool = DatabaseConnection;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database url missing")]
    MissingUrl,
    #[error("invalid value for {key}: {value}")]
    InvalidSetting { key: &'static str, value: String },
    #[error("failed to connect to database")]
    Connect(#[from] DbErr),
}

pub type DbResult<T> = Result<T, DbError>;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Environment-driven connection settings.
#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

impl DatabaseSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// Reads `DATABASE_URL` and `DATABASE_MAX_CONNECTIONS`.
    pub fn from_env() -> DbResult<Self> {
        let url = std::env::var("DATABASE_URL").map_err(|_| DbError::MissingUrl)?;
        let max_connections = match std::env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(raw) => raw.parse().map_err(|_| DbError::InvalidSetting {
                key: "DATABASE_MAX_CONNECTIONS",
                value: raw,
            })?,
            Err(_) => DEFAULT_MAX_CONNECTIONS,
        };
        Ok(Self {
            url,
            max_connections,
        })
    }
}

/// Open a pool with the configured limits.
pub async fn connect(settings: &DatabaseSettings) -> DbResult<DbPool> {
    let mut options = ConnectOptions::new(settings.url.clone());
    options
        .max_connections(settings.max_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    let pool = Database::connect(options).await?;
    tracing::debug!(max_connections = settings.max_connections, "database pool ready");
    Ok(pool)
}

/// Fresh opaque version tag for optimistic concurrency.
pub fn new_etag() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Compare a caller-submitted etag with the stored one.
pub fn etag_matches(stored: &str, submitted: &str) -> bool {
    !submitted.is_empty() && stored == submitted.trim()
}

/// True when the error is a unique or primary key violation.
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn etags_are_unique_and_compact() {
        let a = new_etag();
        let b = new_etag();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn etag_comparison_rejects_blank_submissions() {
        let stored = new_etag();
        assert!(etag_matches(&stored, &stored));
        assert!(!etag_matches(&stored, ""));
        assert!(!etag_matches(&stored, "stale"));
    }

    #[test]
    fn settings_default_pool_size() {
        let settings = DatabaseSettings::new("sqlite::memory:");
        assert_eq!(settings.max_connections, DEFAULT_MAX_CONNECTIONS);
    }

    #[test]
    fn non_sql_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&DbErr::RecordNotFound("x".into())));
    }
}
