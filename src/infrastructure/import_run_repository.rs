//! Bookkeeping for import runs
//!
//! Each `scrape` invocation records one row so `status` can show what ran
//! last and how it ended.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::language::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    fn from_db(value: &str) -> Self {
        match value {
            "completed" => Self::Completed,
            "cancelled" => Self::Cancelled,
            "failed" => Self::Failed,
            _ => Self::Running,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRun {
    pub id: Uuid,
    pub language: Language,
    pub mode: String,
    pub status: RunStatus,
    pub series_total: i64,
    pub series_done: i64,
    pub series_failed: i64,
    pub cards_created: i64,
    pub versions_created: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Counters written when a run finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub series_total: i64,
    pub series_done: i64,
    pub series_failed: i64,
    pub cards_created: i64,
    pub versions_created: i64,
}

#[derive(Clone)]
pub struct ImportRunRepository {
    pool: Arc<SqlitePool>,
}

impl ImportRunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    pub async fn start(&self, language: Language, mode: &str) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO import_runs (id, language, mode, status, started_at) VALUES (?, ?, ?, ?, ?)")
            .bind(id.to_string())
            .bind(language.as_str())
            .bind(mode)
            .bind(RunStatus::Running.as_str())
            .bind(Utc::now())
            .execute(&*self.pool)
            .await?;
        Ok(id)
    }

    pub async fn finish(&self, id: Uuid, status: RunStatus, totals: RunTotals) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE import_runs SET
                status = ?, series_total = ?, series_done = ?, series_failed = ?,
                cards_created = ?, versions_created = ?, completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(totals.series_total)
        .bind(totals.series_done)
        .bind(totals.series_failed)
        .bind(totals.cards_created)
        .bind(totals.versions_created)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<ImportRun>> {
        let rows = sqlx::query(
            r#"
            SELECT id, language, mode, status, series_total, series_done, series_failed,
                   cards_created, versions_created, started_at, completed_at
            FROM import_runs
            ORDER BY started_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&*self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(ImportRun {
                    id: Uuid::parse_str(&row.try_get::<String, _>("id")?)?,
                    language: row.try_get::<String, _>("language")?.parse()?,
                    mode: row.try_get("mode")?,
                    status: RunStatus::from_db(&row.try_get::<String, _>("status")?),
                    series_total: row.try_get("series_total")?,
                    series_done: row.try_get("series_done")?,
                    series_failed: row.try_get("series_failed")?,
                    cards_created: row.try_get("cards_created")?,
                    versions_created: row.try_get("versions_created")?,
                    started_at: row.try_get("started_at")?,
                    completed_at: row.try_get("completed_at")?,
                })
            })
            .collect()
    }
}
