use std::collections::HashMap;
use std::collections::hash_map::Entry;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use tokio::sync::RwLock;

use crate::{ByteStream, Error, Store, bytes_stream, validate_key};

/// In-memory object store for tests and single-process runs.
#[derive(Default)]
pub struct MemoryStore {
  objects: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Keys currently stored, sorted.
  pub async fn keys(&self) -> Vec<String> {
    let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
    keys.sort();
    keys
  }
}

#[async_trait]
impl Store for MemoryStore {
  async fn get(&self, key: &str) -> Result<ByteStream, Error> {
    let objects = self.objects.read().await;
    let data = objects
      .get(key)
      .cloned()
      .ok_or_else(|| Error::NotFound(key.to_string()))?;
    Ok(bytes_stream(data))
  }

  async fn put(&self, key: &str, data: ByteStream, _content_type: &str) -> Result<(), Error> {
    validate_key(key)?;
    let mut buf = BytesMut::new();
    let mut stream = std::pin::pin!(data);
    while let Some(chunk) = stream.next().await {
      buf.extend_from_slice(&chunk?);
    }
    match self.objects.write().await.entry(key.to_string()) {
      Entry::Occupied(_) => Err(Error::AlreadyExists(key.to_string())),
      Entry::Vacant(slot) => {
        slot.insert(buf.freeze());
        Ok(())
      }
    }
  }

  async fn delete(&self, key: &str) -> Result<(), Error> {
    self
      .objects
      .write()
      .await
      .remove(key)
      .map(|_| ())
      .ok_or_else(|| Error::NotFound(key.to_string()))
  }

  async fn exists(&self, key: &str) -> Result<bool, Error> {
    Ok(self.objects.read().await.contains_key(key))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{get_bytes, put_bytes};

  #[tokio::test]
  async fn test_memory_store() {
    let store = MemoryStore::new();
    put_bytes(&store, "output/x.json", "15", "text/plain")
      .await
      .unwrap();

    assert_eq!(store.keys().await, vec!["output/x.json".to_string()]);
    assert_eq!(get_bytes(&store, "output/x.json").await.unwrap().as_ref(), b"15");
    assert!(matches!(
      store.get("output/y.json").await,
      Err(Error::NotFound(_))
    ));

    let again = put_bytes(&store, "output/x.json", "16", "text/plain").await;
    assert!(matches!(again, Err(Error::AlreadyExists(_))));
    assert_eq!(get_bytes(&store, "output/x.json").await.unwrap().as_ref(), b"15");
  }
}
