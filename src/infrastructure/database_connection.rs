// Database connection and pool management
// This module handles SQLite database connections using sqlx

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    pub async fn new(database_url: &str) -> Result<Self> {
        // Create database file directory if it doesn't exist
        let db_path = database_url
            .strip_prefix("sqlite://")
            .or_else(|| database_url.strip_prefix("sqlite:"))
            .unwrap_or(database_url);

        if db_path != ":memory:" {
            if let Some(parent) = Path::new(db_path).parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .with_context(|| format!("Failed to create database directory {}", parent.display()))?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database url: {database_url}"))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database {database_url}"))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Migration statement failed: {}", first_line(statement)))?;
        }
        tracing::debug!("Database schema is up to date ({} statements)", SCHEMA.len());
        Ok(())
    }
}

fn first_line(sql: &str) -> &str {
    sql.trim().lines().next().unwrap_or_default()
}

/// Catalog schema. Natural keys carry UNIQUE constraints so that
/// imports can upsert by them.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS series (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        code TEXT NOT NULL,
        language TEXT NOT NULL,
        name TEXT NOT NULL,
        series_type TEXT NOT NULL DEFAULT 'other',
        official_series_id TEXT,
        release_date DATE,
        card_count INTEGER,
        cover_image TEXT,
        created_at DATETIME NOT NULL,
        updated_at DATETIME NOT NULL,
        UNIQUE (code, language)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cards (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        card_number TEXT NOT NULL,
        language TEXT NOT NULL,
        series_id INTEGER NOT NULL REFERENCES series (id),
        name TEXT NOT NULL,
        card_type TEXT NOT NULL,
        rarity TEXT NOT NULL,
        colors TEXT NOT NULL,
        cost INTEGER,
        life INTEGER,
        power INTEGER,
        counter INTEGER,
        attribute TEXT,
        traits TEXT,
        effect_text TEXT,
        trigger_text TEXT,
        source_info TEXT,
        block_icon INTEGER,
        created_at DATETIME NOT NULL,
        updated_at DATETIME NOT NULL,
        UNIQUE (card_number, language)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS card_series (
        card_id INTEGER NOT NULL REFERENCES cards (id) ON DELETE CASCADE,
        series_id INTEGER NOT NULL REFERENCES series (id) ON DELETE CASCADE,
        is_reprint BOOLEAN NOT NULL DEFAULT 0,
        source_info TEXT,
        created_at DATETIME NOT NULL,
        PRIMARY KEY (card_id, series_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS card_versions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        card_id INTEGER NOT NULL REFERENCES cards (id) ON DELETE CASCADE,
        series_id INTEGER NOT NULL REFERENCES series (id),
        version_type TEXT NOT NULL DEFAULT 'normal',
        version_suffix TEXT NOT NULL DEFAULT '',
        has_star_mark BOOLEAN NOT NULL DEFAULT 0,
        rarity_variant TEXT,
        source_description TEXT,
        illustration_type TEXT,
        created_at DATETIME NOT NULL,
        updated_at DATETIME NOT NULL,
        UNIQUE (card_id, series_id, version_suffix)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS card_images (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        version_id INTEGER NOT NULL REFERENCES card_versions (id) ON DELETE CASCADE,
        image_type TEXT NOT NULL DEFAULT 'front',
        local_path TEXT,
        original_url TEXT,
        width INTEGER,
        height INTEGER,
        created_at DATETIME NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS price_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        version_id INTEGER NOT NULL REFERENCES card_versions (id) ON DELETE CASCADE,
        source TEXT NOT NULL,
        currency TEXT NOT NULL DEFAULT 'JPY',
        price REAL NOT NULL,
        condition TEXT NOT NULL DEFAULT 'unsealed',
        price_type TEXT NOT NULL DEFAULT 'lowest',
        listing_count INTEGER,
        source_url TEXT,
        recorded_at DATETIME NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        display_name TEXT,
        created_at DATETIME NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_collections (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        version_id INTEGER NOT NULL REFERENCES card_versions (id),
        quantity INTEGER NOT NULL DEFAULT 1,
        condition TEXT NOT NULL DEFAULT 'near_mint',
        grade TEXT,
        purchase_price REAL,
        purchase_date DATE,
        notes TEXT,
        created_at DATETIME NOT NULL,
        updated_at DATETIME NOT NULL,
        UNIQUE (user_id, version_id, condition, grade)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS wishlists (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        version_id INTEGER NOT NULL REFERENCES card_versions (id),
        quantity INTEGER NOT NULL DEFAULT 1,
        max_price REAL,
        priority TEXT NOT NULL DEFAULT 'medium',
        notes TEXT,
        created_at DATETIME NOT NULL,
        updated_at DATETIME NOT NULL,
        UNIQUE (user_id, version_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS decks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        description TEXT,
        format TEXT NOT NULL DEFAULT 'standard',
        leader_version_id INTEGER REFERENCES card_versions (id) ON DELETE SET NULL,
        is_public BOOLEAN NOT NULL DEFAULT 0,
        share_code TEXT NOT NULL UNIQUE,
        created_at DATETIME NOT NULL,
        updated_at DATETIME NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS deck_cards (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        deck_id INTEGER NOT NULL REFERENCES decks (id) ON DELETE CASCADE,
        version_id INTEGER NOT NULL REFERENCES card_versions (id),
        quantity INTEGER NOT NULL DEFAULT 1,
        UNIQUE (deck_id, version_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS import_runs (
        id TEXT PRIMARY KEY,
        language TEXT NOT NULL,
        mode TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'running',
        series_total INTEGER NOT NULL DEFAULT 0,
        series_done INTEGER NOT NULL DEFAULT 0,
        series_failed INTEGER NOT NULL DEFAULT 0,
        cards_created INTEGER NOT NULL DEFAULT 0,
        versions_created INTEGER NOT NULL DEFAULT 0,
        started_at DATETIME NOT NULL,
        completed_at DATETIME
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_cards_language ON cards (language)",
    "CREATE INDEX IF NOT EXISTS idx_cards_series_id ON cards (series_id)",
    "CREATE INDEX IF NOT EXISTS idx_versions_series_id ON card_versions (series_id)",
    "CREATE INDEX IF NOT EXISTS idx_versions_card_id ON card_versions (card_id)",
    "CREATE INDEX IF NOT EXISTS idx_images_version_id ON card_images (version_id)",
    "CREATE INDEX IF NOT EXISTS idx_prices_version_source ON price_history (version_id, source, recorded_at)",
    "CREATE INDEX IF NOT EXISTS idx_collections_user ON user_collections (user_id)",
    "CREATE INDEX IF NOT EXISTS idx_deck_cards_deck ON deck_cards (deck_id)",
];

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_database_connection() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("nested").join("catalog.db");
        let database_url = format!("sqlite:{}", db_path.to_string_lossy());

        let db = DatabaseConnection::new(&database_url).await?;

        assert!(!db.pool().is_closed());
        assert!(db_path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_database_migration_is_idempotent() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("test_migration.db");
        let database_url = format!("sqlite:{}", db_path.display());

        let db = DatabaseConnection::new(&database_url).await?;
        db.migrate().await?;
        db.migrate().await?;

        for table in ["series", "cards", "card_series", "card_versions", "price_history", "import_runs"] {
            let result = sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name = ?")
                .bind(table)
                .fetch_optional(db.pool())
                .await?;
            assert!(result.is_some(), "missing table {table}");
        }
        Ok(())
    }
}
