//! Durable SQLite session registry.
//!
//! Holds no in-memory cache: every call reflects durable state at the
//! time of the call. The UNIQUE constraint on `remote_name` is the
//! arbiter for concurrent create races.

use std::path::Path;

use async_trait::async_trait;
use dev_sessions_core::{Session, SessionStatus, SessionStore, StoreError, to_remote_name};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::now_millis;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS dev_sessions (
        id TEXT PRIMARY KEY,
        remote_name TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL,
        creator TEXT NOT NULL,
        workspace_path TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        last_used INTEGER NOT NULL,
        status TEXT NOT NULL CHECK(status IN ('active', 'inactive'))
    )",
    "CREATE INDEX IF NOT EXISTS idx_dev_sessions_status ON dev_sessions(status)",
    "CREATE INDEX IF NOT EXISTS idx_dev_sessions_created_at ON dev_sessions(created_at DESC)",
];

const COLUMNS: &str =
    "id, remote_name, description, creator, workspace_path, created_at, last_used, status";

/// SQLite-backed registry.
pub struct SqliteStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    remote_name: String,
    description: String,
    creator: String,
    workspace_path: String,
    created_at: i64,
    last_used: i64,
    status: String,
}

impl TryFrom<SessionRow> for Session {
    type Error = StoreError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<SessionStatus>()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(Self {
            id: row.id,
            remote_name: row.remote_name,
            description: row.description,
            creator: row.creator,
            workspace_path: row.workspace_path,
            created_at: row.created_at,
            last_used: row.last_used,
            status,
        })
    }
}

impl SqliteStore {
    /// Open (creating if missing) the registry at `path` and apply the
    /// schema.
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or migrated.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(internal)?;

        Self::with_pool(pool).await
    }

    /// Open a private in-memory registry. Intended for tests.
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or migrated.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        // A single connection keeps every call on the same in-memory DB.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(SqliteConnectOptions::new().in_memory(true))
            .await
            .map_err(internal)?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await.map_err(internal)?;
        }
        Ok(Self { pool })
    }
}

fn internal(err: sqlx::Error) -> StoreError {
    StoreError::Internal(err.to_string())
}

fn insert_error(id: &str, err: &sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::DuplicateKey(id.to_string())
        }
        other => StoreError::Internal(other.to_string()),
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn create(
        &self,
        id: &str,
        description: &str,
        creator: &str,
        workspace_path: &str,
    ) -> Result<Session, StoreError> {
        let now = now_millis();
        let remote_name = to_remote_name(id);

        sqlx::query(
            "INSERT INTO dev_sessions (id, remote_name, description, creator, workspace_path, \
             created_at, last_used, status) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(&remote_name)
        .bind(description)
        .bind(creator)
        .bind(workspace_path)
        .bind(now)
        .bind(now)
        .bind(SessionStatus::Active.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| insert_error(id, &e))?;

        Ok(Session {
            id: id.to_string(),
            remote_name,
            description: description.to_string(),
            creator: creator.to_string(),
            workspace_path: workspace_path.to_string(),
            created_at: now,
            last_used: now,
            status: SessionStatus::Active,
        })
    }

    async fn get(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let row: Option<SessionRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM dev_sessions WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(internal)?;

        row.map(Session::try_from).transpose()
    }

    async fn list(&self, status: Option<SessionStatus>) -> Result<Vec<Session>, StoreError> {
        let rows: Vec<SessionRow> = match status {
            Some(status) => {
                sqlx::query_as(&format!(
                    "SELECT {COLUMNS} FROM dev_sessions WHERE status = ? ORDER BY last_used DESC"
                ))
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {COLUMNS} FROM dev_sessions ORDER BY last_used DESC"
                ))
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(internal)?;

        rows.into_iter().map(Session::try_from).collect()
    }

    async fn touch(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE dev_sessions SET last_used = ? WHERE id = ?")
            .bind(now_millis())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(internal)?;

        Ok(())
    }

    async fn set_status(&self, id: &str, status: SessionStatus) -> Result<(), StoreError> {
        sqlx::query("UPDATE dev_sessions SET status = ?, last_used = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(now_millis())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(internal)?;

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM dev_sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(internal)?;

        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
