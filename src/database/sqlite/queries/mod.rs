
use super::models::*;
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};

const RUN_COLUMNS: &str = "id, doc_id, source_path, status, chunk_count, stored_count, \
                           error_message, started_at, completed_at";

pub struct IndexRunQueries;

impl IndexRunQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, new_run: NewIndexRun) -> Result<IndexRun> {
        let now = Utc::now().naive_utc();
        let id = sqlx::query(
            "INSERT INTO index_runs (doc_id, source_path, status, started_at) VALUES (?, ?, 'pending', ?)",
        )
        .bind(&new_run.doc_id)
        .bind(&new_run.source_path)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create index run")?
        .last_insert_rowid();

        debug!("Created index run {} for document {}", id, new_run.doc_id);

        Self::get_by_id(pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created index run"))
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<IndexRun>> {
        let query = format!("SELECT {} FROM index_runs WHERE id = ?", RUN_COLUMNS);
        let result = sqlx::query_as::<_, IndexRun>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get index run by id")?;

        Ok(result)
    }

    /// Record the number of chunks about to be stored and flag the run as in progress
    #[inline]
    pub async fn mark_indexing(pool: &SqlitePool, id: i64, chunk_count: i64) -> Result<()> {
        let rows = sqlx::query("UPDATE index_runs SET status = ?, chunk_count = ? WHERE id = ?")
            .bind(RunStatus::Indexing)
            .bind(chunk_count)
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to mark index run as indexing")?
            .rows_affected();

        if rows == 0 {
            warn!("No index run with id {} to mark as indexing", id);
        }
        Ok(())
    }

    #[inline]
    pub async fn complete(
        pool: &SqlitePool,
        id: i64,
        chunk_count: i64,
        stored_count: i64,
    ) -> Result<Option<IndexRun>> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            "UPDATE index_runs SET status = ?, chunk_count = ?, stored_count = ?, \
             error_message = NULL, completed_at = ? WHERE id = ?",
        )
        .bind(RunStatus::Completed)
        .bind(chunk_count)
        .bind(stored_count)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to complete index run")?;

        Self::get_by_id(pool, id).await
    }

    /// Mark a run as failed, keeping how many records reached the vector store first
    #[inline]
    pub async fn fail(
        pool: &SqlitePool,
        id: i64,
        stored_count: i64,
        error_message: &str,
    ) -> Result<Option<IndexRun>> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            "UPDATE index_runs SET status = ?, stored_count = ?, error_message = ?, \
             completed_at = ? WHERE id = ?",
        )
        .bind(RunStatus::Failed)
        .bind(stored_count)
        .bind(error_message)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to record index run failure")?;

        Self::get_by_id(pool, id).await
    }

    /// All runs, newest first
    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<IndexRun>> {
        let query = format!(
            "SELECT {} FROM index_runs ORDER BY started_at DESC, id DESC",
            RUN_COLUMNS
        );
        let runs = sqlx::query_as::<_, IndexRun>(&query)
            .fetch_all(pool)
            .await
            .context("Failed to list index runs")?;

        Ok(runs)
    }

    #[inline]
    pub async fn list_by_doc(pool: &SqlitePool, doc_id: &str) -> Result<Vec<IndexRun>> {
        let query = format!(
            "SELECT {} FROM index_runs WHERE doc_id = ? ORDER BY started_at DESC, id DESC",
            RUN_COLUMNS
        );
        let runs = sqlx::query_as::<_, IndexRun>(&query)
            .bind(doc_id)
            .fetch_all(pool)
            .await
            .context("Failed to list index runs for document")?;

        Ok(runs)
    }

    #[inline]
    pub async fn summary(pool: &SqlitePool) -> Result<LedgerSummary> {
        let summary = sqlx::query_as::<_, LedgerSummary>(
            r#"
            SELECT COUNT(*) AS total_runs,
                   COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0) AS completed_runs,
                   COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0) AS failed_runs,
                   COALESCE(SUM(stored_count), 0) AS stored_records
            FROM index_runs
            "#,
        )
        .fetch_one(pool)
        .await
        .context("Failed to summarize index runs")?;

        Ok(summary)
    }
}
