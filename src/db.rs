use std::{future::Future, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{config::DatabaseConfig, error::ModelError};

/// Shared Postgres handle. Every statement issued through [`Database::bounded`]
/// is cut off after `query_timeout`.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    query_timeout: Duration,
}

impl Database {
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self { pool, query_timeout }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs one storage operation under the statement timeout and translates
    /// its failure into a [`ModelError`].
    pub async fn bounded<T, F>(&self, op: F) -> Result<T, ModelError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        bounded(self.query_timeout, op).await
    }
}

pub async fn connect(cfg: &DatabaseConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .idle_timeout(cfg.max_idle)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&cfg.url)
        .await
        .context("connect to database")
}

pub(crate) async fn bounded<T, F>(limit: Duration, op: F) -> Result<T, ModelError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, op).await {
        Ok(result) => result.map_err(translate),
        Err(_) => Err(ModelError::Timeout(limit)),
    }
}

pub(crate) fn translate(err: sqlx::Error) -> ModelError {
    match err {
        sqlx::Error::RowNotFound => ModelError::NotFound,
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            ModelError::DuplicateKey(db.constraint().unwrap_or_default().to_string())
        }
        other => ModelError::Fatal(anyhow::Error::new(other).context("database")),
    }
}
