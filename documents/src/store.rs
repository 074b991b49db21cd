//! Relational store tier. Records are looked up by id and only active rows
//! (`is_active = 1`) are considered.
use crate::config::StoreConfig;
use crate::document::{DocumentFields, DocumentLayout};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::Row;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const MAX_CONNECTIONS: u32 = 5;
// A store that cannot hand out a connection must not stall the request.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn backend(&self) -> &'static str;

    /// Fetches the active record with the given id. `Ok(None)` when there is
    /// no such record or it is inactive.
    async fn fetch(
        &self,
        layout: &DocumentLayout,
        id: &str,
    ) -> Result<Option<DocumentFields>, StoreError>;
}

/// Builds the store for the configured backend. Connections are opened lazily,
/// so an unreachable database only shows up as failed lookups.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn DocumentStore>, StoreError> {
    let store: Arc<dyn DocumentStore> = match config {
        StoreConfig::Sqlite { path } => Arc::new(SqliteStore::open(path)),
        StoreConfig::Mysql { url } => Arc::new(MySqlStore::open(url)?),
    };
    tracing::info!(backend = store.backend(), "Configured document store");
    Ok(store)
}

fn select_sql(layout: &DocumentLayout, data_expr: &str) -> String {
    format!(
        "SELECT {prompt}, {instructions}, {data} FROM {table} WHERE {id} = ? AND is_active = 1 LIMIT 1",
        prompt = layout.prompt.column,
        instructions = layout.instructions.column,
        data = data_expr,
        table = layout.table,
        id = layout.id_column,
    )
}

fn parse_payload(text: Option<String>) -> Result<Option<Value>, StoreError> {
    match text {
        Some(text) if !text.trim().is_empty() => Ok(Some(serde_json::from_str(&text)?)),
        _ => Ok(None),
    }
}

fn fields_from_columns(
    prompt: Option<String>,
    instructions: Option<String>,
    data: Option<String>,
) -> Result<DocumentFields, StoreError> {
    let fields = DocumentFields {
        prompt,
        instructions,
        data: parse_payload(data)?,
        ..Default::default()
    };
    Ok(fields.normalized())
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Must be called from within a tokio runtime.
    pub fn open(path: &Path) -> Self {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(false)
            .read_only(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_lazy_with(options);

        if !path.exists() {
            tracing::warn!(path = %path.display(), "SQLite database not found, lookups will fall through");
        }

        SqliteStore { pool }
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn fetch(
        &self,
        layout: &DocumentLayout,
        id: &str,
    ) -> Result<Option<DocumentFields>, StoreError> {
        let sql = select_sql(layout, layout.data.column);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                fields_from_columns(row.try_get(0)?, row.try_get(1)?, row.try_get(2)?).map(Some)
            }
            None => Ok(None),
        }
    }
}

pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    /// Must be called from within a tokio runtime.
    pub fn open(url: &str) -> Result<Self, StoreError> {
        let options = MySqlConnectOptions::from_str(url)?.charset("utf8mb4");
        let pool = MySqlPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_lazy_with(options);

        Ok(MySqlStore { pool })
    }
}

#[async_trait]
impl DocumentStore for MySqlStore {
    fn backend(&self) -> &'static str {
        "mysql"
    }

    async fn fetch(
        &self,
        layout: &DocumentLayout,
        id: &str,
    ) -> Result<Option<DocumentFields>, StoreError> {
        // JSON columns are read back as text
        let data_expr = format!("CAST({} AS CHAR)", layout.data.column);
        let sql = select_sql(layout, &data_expr);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                fields_from_columns(row.try_get(0)?, row.try_get(1)?, row.try_get(2)?).map(Some)
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
pub(crate) mod testutils {
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::path::Path;

    const SCHEMA: &[&str] = &[
        "CREATE TABLE report_context (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            report_id TEXT UNIQUE NOT NULL,
            project_name TEXT,
            system_prompt TEXT,
            context_data TEXT,
            instructions TEXT,
            is_active INTEGER DEFAULT 1
        )",
        "CREATE TABLE tools_prompt (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            prompt_id TEXT UNIQUE NOT NULL,
            tools_system_prompt TEXT,
            recommendation_instructions TEXT,
            tools_data TEXT,
            is_active INTEGER DEFAULT 1
        )",
    ];

    /// Creates a SQLite database at `path` with the document tables and runs
    /// the given statements against it.
    pub async fn create_database(path: &Path, statements: &[&str]) {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();

        for statement in SCHEMA.iter().chain(statements) {
            sqlx::query(statement).execute(&pool).await.unwrap();
        }
        pool.close().await;
    }
}
