
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct IndexRun {
    pub id: i64,
    pub doc_id: String,
    pub source_path: String,
    pub status: RunStatus,
    pub chunk_count: i64,
    pub stored_count: i64,
    pub error_message: Option<String>,
    pub started_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Indexing,
    Completed,
    Failed,
}

impl std::fmt::Display for RunStatus {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            RunStatus::Pending => write!(f, "Pending"),
            RunStatus::Indexing => write!(f, "Indexing"),
            RunStatus::Completed => write!(f, "Completed"),
            RunStatus::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIndexRun {
    pub doc_id: String,
    pub source_path: String,
}

/// Totals across every run in the ledger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LedgerSummary {
    pub total_runs: i64,
    pub completed_runs: i64,
    pub failed_runs: i64,
    pub stored_records: i64,
}

impl IndexRun {
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        self.status == RunStatus::Failed
    }

    /// Wall-clock time between start and completion, if the run has finished
    #[inline]
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|end| end - self.started_at)
    }
}
