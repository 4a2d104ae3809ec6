//! SQLite-backed profile storage, so the catalog cache survives restarts.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tokio::sync::OnceCell;

use crate::storage::StorageBackend;

/// `kv_store` table in a SQLite file (or an in-memory database).
///
/// The pool is created lazily on first use.
#[derive(Debug)]
pub struct SqliteBackend {
    location: Location,
    pool: OnceCell<SqlitePool>,
}

#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

impl SqliteBackend {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            location: Location::File(path.into()),
            pool: OnceCell::new(),
        }
    }

    /// A private in-memory database (one connection, never recycled).
    pub fn in_memory() -> Self {
        Self {
            location: Location::Memory,
            pool: OnceCell::new(),
        }
    }

    async fn pool(&self) -> anyhow::Result<&SqlitePool> {
        self.pool.get_or_try_init(|| connect(&self.location)).await
    }
}

async fn connect(location: &Location) -> anyhow::Result<SqlitePool> {
    let pool = match location {
        Location::File(path) => {
            ensure_parent_dir(path)?;
            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true);
            SqlitePoolOptions::new()
                .connect_with(options)
                .await
                .with_context(|| format!("failed to open profile storage at {path:?}"))?
        }
        // Every connection to `sqlite::memory:` is its own database.
        Location::Memory => SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .context("failed to open in-memory profile storage")?,
    };

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kv_store (
            key        TEXT PRIMARY KEY,
            value      TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await
    .context("failed to create kv_store table")?;

    tracing::debug!(location = ?location, "profile storage ready");
    Ok(pool)
}

fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create storage directory at {parent:?}"))?;
    }
    Ok(())
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let pool = self.pool().await?;
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?1")
            .bind(key)
            .fetch_optional(pool)
            .await
            .with_context(|| format!("failed to read key {key}"))?;

        row.map(|row| row.try_get::<String, _>("value"))
            .transpose()
            .with_context(|| format!("failed to decode value of {key}"))
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let pool = self.pool().await?;
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await
        .with_context(|| format!("failed to write key {key}"))?;
        Ok(())
    }
}
