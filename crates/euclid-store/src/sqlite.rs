use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::{Error, ExecutionRecord, Store};

/// SQLite-based store implementation.
pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Connect to a database URL (e.g. `sqlite://euclid.db`), creating the file
  /// if needed, and run migrations.
  pub async fn connect(url: &str) -> Result<Self, Error> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    let store = Self::new(pool);
    store.migrate().await?;
    Ok(store)
  }

  /// A private in-memory database, migrated and ready.
  ///
  /// Pinned to a single connection that never idles out; every new
  /// connection to `:memory:` would otherwise see an empty database.
  pub async fn in_memory() -> Result<Self, Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
    let pool = SqlitePoolOptions::new()
      .max_connections(1)
      .min_connections(1)
      .idle_timeout(None::<Duration>)
      .max_lifetime(None::<Duration>)
      .connect_with(options)
      .await?;
    let store = Self::new(pool);
    store.migrate().await?;
    Ok(store)
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), Error> {
    sqlx::migrate!().run(&self.pool).await?;
    Ok(())
  }
}

#[async_trait]
impl Store for SqliteStore {
  async fn create_execution(&self, record: &ExecutionRecord) -> Result<(), Error> {
    let result = sqlx::query(
      r#"
      INSERT INTO executions (execution_id, workflow_id, status, current_state, input, accumulated, history, failure, started_at, completed_at)
      VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
      "#,
    )
    .bind(&record.execution_id)
    .bind(&record.workflow_id)
    .bind(record.status)
    .bind(&record.current_state)
    .bind(&record.input)
    .bind(&record.accumulated)
    .bind(&record.history)
    .bind(&record.failure)
    .bind(record.started_at)
    .bind(record.completed_at)
    .execute(&self.pool)
    .await;

    match result {
      Ok(_) => Ok(()),
      Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
        Err(Error::AlreadyExists(record.execution_id.clone()))
      }
      Err(e) => Err(Error::Database(e)),
    }
  }

  async fn get_execution(&self, execution_id: &str) -> Result<ExecutionRecord, Error> {
    sqlx::query_as(
      r#"
      SELECT execution_id, workflow_id, status, current_state, input, accumulated, history, failure, started_at, completed_at
      FROM executions
      WHERE execution_id = ?
      "#,
    )
    .bind(execution_id)
    .fetch_optional(&self.pool)
    .await?
    .ok_or_else(|| Error::NotFound(execution_id.to_string()))
  }

  async fn update_execution(&self, record: &ExecutionRecord) -> Result<(), Error> {
    let result = sqlx::query(
      r#"
      UPDATE executions
      SET status = ?, current_state = ?, accumulated = ?, history = ?, failure = ?, completed_at = ?
      WHERE execution_id = ?
      "#,
    )
    .bind(record.status)
    .bind(&record.current_state)
    .bind(&record.accumulated)
    .bind(&record.history)
    .bind(&record.failure)
    .bind(record.completed_at)
    .bind(&record.execution_id)
    .execute(&self.pool)
    .await?;

    if result.rows_affected() == 0 {
      return Err(Error::NotFound(record.execution_id.clone()));
    }
    Ok(())
  }

  async fn list_executions(&self, workflow_id: &str) -> Result<Vec<ExecutionRecord>, Error> {
    let records = sqlx::query_as(
      r#"
      SELECT execution_id, workflow_id, status, current_state, input, accumulated, history, failure, started_at, completed_at
      FROM executions
      WHERE workflow_id = ?
      ORDER BY started_at DESC
      "#,
    )
    .bind(workflow_id)
    .fetch_all(&self.pool)
    .await?;
    Ok(records)
  }
}
