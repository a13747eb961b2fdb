//! Report persistence.
//!
//! The core only needs [`Datastore`]; reports travel through it as JSON so
//! a round trip returns an identical value. [`MemoryStore`] backs tests and
//! one-shot CLI runs, [`SqliteStore`] keeps history on disk. Each write is
//! its own transaction.

use crate::report::{AnalysisReport, AnalysisReportSummary};
use async_trait::async_trait;
use chrono::SecondsFormat;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::RwLock;
use uuid::Uuid;

pub type StoredId = Uuid;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("report {0} not found")]
    NotFound(Uuid),

    #[error("report serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait Datastore: Send + Sync {
    async fn save(&self, report: &AnalysisReport, user_id: &str) -> Result<StoredId, StoreError>;

    /// The user's reports, newest first.
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<AnalysisReportSummary>, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<AnalysisReport>, StoreError>;

    /// Like [`Datastore::get`] but a missing report is an error.
    async fn require(&self, id: Uuid) -> Result<AnalysisReport, StoreError> {
        self.get(id).await?.ok_or(StoreError::NotFound(id))
    }
}

struct StoredReport {
    user_id: String,
    json: String,
}

/// Process-local store. Reports are kept serialised, as a database would.
#[derive(Default)]
pub struct MemoryStore {
    reports: RwLock<HashMap<Uuid, StoredReport>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Datastore for MemoryStore {
    async fn save(&self, report: &AnalysisReport, user_id: &str) -> Result<StoredId, StoreError> {
        let json = serde_json::to_string(report)?;
        let mut reports = self.reports.write().unwrap_or_else(|e| e.into_inner());
        reports.insert(
            report.id,
            StoredReport {
                user_id: user_id.to_string(),
                json,
            },
        );
        tracing::debug!(id = %report.id, user_id, "store.memory.saved");
        Ok(report.id)
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<AnalysisReportSummary>, StoreError> {
        let reports = self.reports.read().unwrap_or_else(|e| e.into_inner());
        let mut out = reports
            .values()
            .filter(|r| r.user_id == user_id)
            .map(|r| {
                serde_json::from_str::<AnalysisReport>(&r.json).map(|report| report.summary(user_id))
            })
            .collect::<Result<Vec<_>, _>>()?;
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(out)
    }

    async fn get(&self, id: Uuid) -> Result<Option<AnalysisReport>, StoreError> {
        let reports = self.reports.read().unwrap_or_else(|e| e.into_inner());
        reports
            .get(&id)
            .map(|r| serde_json::from_str(&r.json))
            .transpose()
            .map_err(StoreError::from)
    }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS analysis_report (
    id            TEXT PRIMARY KEY,
    user_id       TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    truth_rating  TEXT NOT NULL,
    truth_score   REAL NOT NULL,
    report        TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_analysis_report_user
    ON analysis_report (user_id, created_at);
"#;

/// SQLite-backed store; the report itself is a JSON column.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `url` and ensure the schema.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = pool_options(url).connect_with(options).await?;
        Self::with_pool(pool).await
    }

    pub async fn with_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        tracing::info!("store.sqlite.ready");
        Ok(Self { pool })
    }
}

/// Every in-memory connection is its own database, so an in-memory pool
/// holds exactly one connection and never retires it.
fn pool_options(url: &str) -> SqlitePoolOptions {
    if url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(4)
    }
}

#[async_trait]
impl Datastore for SqliteStore {
    async fn save(&self, report: &AnalysisReport, user_id: &str) -> Result<StoredId, StoreError> {
        let json = serde_json::to_string(report)?;
        let mut tx = self.pool.begin().await?;
        let res = sqlx::query(
            r#"INSERT INTO analysis_report
               (id, user_id, created_at, truth_rating, truth_score, report)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)
               ON CONFLICT(id) DO UPDATE SET
                 user_id=excluded.user_id,
                 truth_rating=excluded.truth_rating,
                 truth_score=excluded.truth_score,
                 report=excluded.report"#,
        )
        .bind(report.id.to_string())
        .bind(user_id)
        .bind(report.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true))
        .bind(report.truth_rating.as_str())
        .bind(report.truth_score)
        .bind(json)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        tracing::info!(
            id = %report.id,
            user_id,
            rows = res.rows_affected(),
            "store.sqlite.saved"
        );
        Ok(report.id)
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<AnalysisReportSummary>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT report FROM analysis_report
               WHERE user_id = ?1
               ORDER BY created_at DESC"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        tracing::debug!(user_id, rows = rows.len(), "store.sqlite.list_by_user");

        rows.into_iter()
            .map(|r| -> Result<AnalysisReportSummary, StoreError> {
                let json: String = r.try_get("report")?;
                let report: AnalysisReport = serde_json::from_str(&json)?;
                Ok(report.summary(user_id))
            })
            .collect()
    }

    async fn get(&self, id: Uuid) -> Result<Option<AnalysisReport>, StoreError> {
        let row = sqlx::query("SELECT report FROM analysis_report WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(r) => {
                let json: String = r.try_get("report")?;
                Ok(Some(serde_json::from_str(&json)?))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_pool_keeps_its_connection() {
        let memory = pool_options("sqlite::memory:");
        assert_eq!(memory.get_max_connections(), 1);
        assert!(memory.get_idle_timeout().is_none());
        assert!(memory.get_max_lifetime().is_none());

        let file = pool_options("sqlite://veracity.db");
        assert_eq!(file.get_max_connections(), 4);
        assert!(file.get_idle_timeout().is_some());
    }
}
