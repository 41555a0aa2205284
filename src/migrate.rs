use anyhow::Result;
use sqlx::{Connection, SqliteConnection};

use crate::config::Config;
use crate::db;

/// Create the `plu_reglement` table and its natural-key index. Idempotent.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let mut conn = db::connect(&config.db.path).await?;
    apply(&mut conn).await?;
    conn.close().await?;
    Ok(())
}

pub(crate) async fn apply(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS plu_reglement (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            idterritoire TEXT NOT NULL CHECK (length(idterritoire) <= 10),
            codcom TEXT NOT NULL CHECK (length(codcom) <= 6),
            annee INTEGER NOT NULL,
            zone TEXT NOT NULL CHECK (length(zone) <= 2),
            section TEXT NOT NULL CHECK (length(section) <= 10),
            hauteur REAL CHECK (hauteur IS NULL OR (hauteur >= 0 AND hauteur < 1000)),
            emprise REAL CHECK (emprise IS NULL OR (emprise >= 0 AND emprise < 1000)),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_plu_reglement_key \
         ON plu_reglement(idterritoire, codcom, annee, zone, section)",
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_plu_reglement_codcom ON plu_reglement(codcom, annee)")
        .execute(&mut *conn)
        .await?;

    Ok(())
}
