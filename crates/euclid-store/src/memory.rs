use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{Error, ExecutionRecord, Store};

/// In-memory store. Records live as long as the process.
#[derive(Default)]
pub struct MemoryStore {
  records: RwLock<HashMap<String, ExecutionRecord>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl Store for MemoryStore {
  async fn create_execution(&self, record: &ExecutionRecord) -> Result<(), Error> {
    let mut records = self.records.write().await;
    if records.contains_key(&record.execution_id) {
      return Err(Error::AlreadyExists(record.execution_id.clone()));
    }
    records.insert(record.execution_id.clone(), record.clone());
    Ok(())
  }

  async fn get_execution(&self, execution_id: &str) -> Result<ExecutionRecord, Error> {
    self
      .records
      .read()
      .await
      .get(execution_id)
      .cloned()
      .ok_or_else(|| Error::NotFound(execution_id.to_string()))
  }

  async fn update_execution(&self, record: &ExecutionRecord) -> Result<(), Error> {
    let mut records = self.records.write().await;
    let existing = records
      .get_mut(&record.execution_id)
      .ok_or_else(|| Error::NotFound(record.execution_id.clone()))?;
    existing.status = record.status;
    existing.current_state = record.current_state.clone();
    existing.accumulated = record.accumulated.clone();
    existing.history = record.history.clone();
    existing.failure = record.failure.clone();
    existing.completed_at = record.completed_at;
    Ok(())
  }

  async fn list_executions(&self, workflow_id: &str) -> Result<Vec<ExecutionRecord>, Error> {
    let mut records: Vec<ExecutionRecord> = self
      .records
      .read()
      .await
      .values()
      .filter(|r| r.workflow_id == workflow_id)
      .cloned()
      .collect();
    records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    Ok(records)
  }
}
