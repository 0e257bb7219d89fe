use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::database::sqlite::models::{IndexRun, LedgerSummary, NewIndexRun};
use crate::database::sqlite::queries::IndexRunQueries;


pub mod models;
pub mod queries;

pub use models::RunStatus;

pub type DbPool = Pool<Sqlite>;

/// Local ledger of indexing runs
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    pub async fn new<P: AsRef<Path>>(database_url: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_url)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    pub async fn initialize_from_config_dir(config_dir: &Path) -> Result<Self> {
        let db_path = config_dir.join("metadata.db");

        std::fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        Self::new(db_path).await
    }

    // Index run operations
    pub async fn start_run(&self, doc_id: &str, source_path: &Path) -> Result<IndexRun> {
        let new_run = NewIndexRun {
            doc_id: doc_id.to_string(),
            source_path: source_path.display().to_string(),
        };
        IndexRunQueries::create(&self.pool, new_run).await
    }

    pub async fn mark_indexing(&self, id: i64, chunk_count: usize) -> Result<()> {
        IndexRunQueries::mark_indexing(&self.pool, id, to_i64(chunk_count)).await
    }

    pub async fn complete_run(
        &self,
        id: i64,
        chunk_count: usize,
        stored_count: usize,
    ) -> Result<Option<IndexRun>> {
        IndexRunQueries::complete(&self.pool, id, to_i64(chunk_count), to_i64(stored_count)).await
    }

    pub async fn fail_run(&self, id: i64, stored_count: usize, error: &str) -> Result<Option<IndexRun>> {
        IndexRunQueries::fail(&self.pool, id, to_i64(stored_count), error).await
    }

    pub async fn get_run(&self, id: i64) -> Result<Option<IndexRun>> {
        IndexRunQueries::get_by_id(&self.pool, id).await
    }

    pub async fn list_runs(&self) -> Result<Vec<IndexRun>> {
        IndexRunQueries::list_all(&self.pool).await
    }

    pub async fn list_runs_for_doc(&self, doc_id: &str) -> Result<Vec<IndexRun>> {
        IndexRunQueries::list_by_doc(&self.pool, doc_id).await
    }

    pub async fn summary(&self) -> Result<LedgerSummary> {
        IndexRunQueries::summary(&self.pool).await
    }
}

fn to_i64(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}
