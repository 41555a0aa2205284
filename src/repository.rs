//! SQLite persistence for extracted fact records.
//!
//! The repository owns exactly one connection. Writes happen in batches: a
//! batch is validated up front, then written inside a single transaction that
//! either commits every record or rolls back all of them.
//!
//! An extraction run stages its records with [`FactRepository::stage`] and
//! finishes with [`FactRepository::commit_and_close`], so the records of one
//! run land together or not at all.

use anyhow::Context;
use chrono::{DateTime, Utc};
use plu_extract_core::facts::FactRecord;
use plu_extract_core::{Error, FailureReport, Result};
use serde::{Deserialize, Serialize};
use sqlx::{Connection, Row, SqliteConnection};
use std::path::Path;
use tracing::{debug, warn};

use crate::{db, migrate};

/// How a record whose natural key already exists is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertMode {
    /// Plain `INSERT`: an existing key fails the batch.
    #[default]
    Insert,
    /// Replace the measures of the existing row.
    Upsert,
}

/// Row filter for [`FactRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct FactFilter {
    pub codcom: Option<String>,
    pub annee: Option<i32>,
}

/// A record as stored, with its timestamps.
#[derive(Debug, Clone, Serialize)]
pub struct StoredFact {
    pub idterritoire: String,
    pub codcom: String,
    pub annee: i32,
    pub zone: String,
    pub section: String,
    pub hauteur: Option<f64>,
    pub emprise: Option<f64>,
    pub created_at: String,
    pub updated_at: String,
}

const INSERT_SQL: &str = "INSERT INTO plu_reglement \
    (idterritoire, codcom, annee, zone, section, hauteur, emprise, created_at, updated_at) \
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)";

const UPSERT_SQL: &str = "INSERT INTO plu_reglement \
    (idterritoire, codcom, annee, zone, section, hauteur, emprise, created_at, updated_at) \
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
    ON CONFLICT(idterritoire, codcom, annee, zone, section) DO UPDATE SET \
    hauteur = excluded.hauteur, emprise = excluded.emprise, updated_at = excluded.updated_at";

pub struct FactRepository {
    conn: SqliteConnection,
    mode: InsertMode,
    staged: Vec<FactRecord>,
}

impl FactRepository {
    /// Open the database at `db_path`, creating the schema if needed.
    pub async fn open(db_path: &Path, mode: InsertMode) -> anyhow::Result<Self> {
        let mut conn = db::connect(db_path).await?;
        migrate::apply(&mut conn)
            .await
            .context("Failed to prepare plu_reglement schema")?;
        Ok(Self {
            conn,
            mode,
            staged: Vec::new(),
        })
    }

    pub fn mode(&self) -> InsertMode {
        self.mode
    }

    /// Write one record.
    pub async fn insert(&mut self, record: &FactRecord) -> Result<()> {
        self.insert_batch(std::slice::from_ref(record)).await?;
        Ok(())
    }

    /// Write `records` in one transaction and return how many were written.
    ///
    /// # Errors
    ///
    /// [`Error::PersistenceFailure`] if any record is invalid or any statement
    /// fails. Nothing from the batch is left in the table.
    pub async fn insert_batch(&mut self, records: &[FactRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let attempted = records.len();

        for (i, record) in records.iter().enumerate() {
            if let Err(e) = record.validate() {
                return Err(failure(attempted, Some(i), e.to_string()));
            }
        }

        let sql = match self.mode {
            InsertMode::Insert => INSERT_SQL,
            InsertMode::Upsert => UPSERT_SQL,
        };
        let now = Utc::now().timestamp();

        let mut tx = self
            .conn
            .begin()
            .await
            .map_err(|e| failure(attempted, None, e.to_string()))?;

        for (i, record) in records.iter().enumerate() {
            let result = sqlx::query(sql)
                .bind(&record.territoire)
                .bind(&record.codcom)
                .bind(record.annee)
                .bind(&record.zone)
                .bind(&record.section)
                .bind(record.hauteur)
                .bind(record.emprise)
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await;

            if let Err(e) = result {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                return Err(failure(attempted, Some(i), e.to_string()));
            }
        }

        tx.commit()
            .await
            .map_err(|e| failure(attempted, None, e.to_string()))?;

        debug!(records = attempted, mode = ?self.mode, "fact batch committed");
        Ok(attempted)
    }

    /// Queue a record for [`commit_and_close`](Self::commit_and_close).
    pub fn stage(&mut self, record: FactRecord) {
        self.staged.push(record);
    }

    pub fn staged(&self) -> &[FactRecord] {
        &self.staged
    }

    /// Write every staged record as one batch, then close the connection.
    pub async fn commit_and_close(mut self) -> Result<usize> {
        let staged = std::mem::take(&mut self.staged);
        let written = self.insert_batch(&staged).await;
        if let Err(e) = self.conn.close().await {
            warn!(error = %e, "closing database connection failed");
        }
        written
    }

    /// Read rows back, ordered by key.
    pub async fn list(&mut self, filter: &FactFilter) -> anyhow::Result<Vec<StoredFact>> {
        let rows = sqlx::query(
            "SELECT idterritoire, codcom, annee, zone, section, hauteur, emprise, created_at, updated_at \
             FROM plu_reglement \
             WHERE (?1 IS NULL OR codcom = ?1) AND (?2 IS NULL OR annee = ?2) \
             ORDER BY codcom, annee, zone, section",
        )
        .bind(filter.codcom.as_deref())
        .bind(filter.annee)
        .fetch_all(&mut self.conn)
        .await?;

        Ok(rows
            .iter()
            .map(|row| StoredFact {
                idterritoire: row.get("idterritoire"),
                codcom: row.get("codcom"),
                annee: row.get("annee"),
                zone: row.get("zone"),
                section: row.get("section"),
                hauteur: row.get("hauteur"),
                emprise: row.get("emprise"),
                created_at: format_ts(row.get("created_at")),
                updated_at: format_ts(row.get("updated_at")),
            })
            .collect())
    }

    pub async fn close(self) -> anyhow::Result<()> {
        self.conn.close().await?;
        Ok(())
    }
}

fn failure(attempted: usize, failed_index: Option<usize>, reason: String) -> Error {
    Error::PersistenceFailure(FailureReport {
        attempted,
        failed_index,
        reason,
    })
}

fn format_ts(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}
