use std::path::PathBuf;
use std::sync::Arc;

use euclid_artifact::{FsStore, Store};

use crate::error::TaskError;

/// Maps a storage container name to the store holding its objects.
pub trait StoreResolver: Send + Sync {
  fn resolve(&self, storage_container: &str) -> Result<Arc<dyn Store>, TaskError>;
}

/// One directory per storage container under a common root.
#[derive(Debug, Clone)]
pub struct FsStoreResolver {
  root: PathBuf,
}

impl FsStoreResolver {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }
}

impl StoreResolver for FsStoreResolver {
  fn resolve(&self, storage_container: &str) -> Result<Arc<dyn Store>, TaskError> {
    let valid = !storage_container.is_empty()
      && storage_container
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
      && storage_container != "."
      && storage_container != "..";
    if !valid {
      return Err(TaskError::validation(format!(
        "invalid storage container '{}'",
        storage_container
      )));
    }
    Ok(Arc::new(FsStore::for_container(&self.root, storage_container)))
  }
}

/// A single known container backed by one store.
pub struct SingleStoreResolver {
  storage_container: String,
  store: Arc<dyn Store>,
}

impl SingleStoreResolver {
  pub fn new(storage_container: impl Into<String>, store: Arc<dyn Store>) -> Self {
    Self {
      storage_container: storage_container.into(),
      store,
    }
  }
}

impl StoreResolver for SingleStoreResolver {
  fn resolve(&self, storage_container: &str) -> Result<Arc<dyn Store>, TaskError> {
    if storage_container != self.storage_container {
      return Err(TaskError::validation(format!(
        "unknown storage container '{}'",
        storage_container
      )));
    }
    Ok(self.store.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use euclid_artifact::put_bytes;

  #[tokio::test]
  async fn test_fs_resolver_per_container() {
    let dir = tempfile::tempdir().unwrap();
    let resolver = FsStoreResolver::new(dir.path());

    let store = resolver.resolve("euclid-bucket").unwrap();
    put_bytes(store.as_ref(), "input/a.json", "{}", "application/json")
      .await
      .unwrap();
    assert!(dir.path().join("euclid-bucket").join("input").join("a.json").exists());

    for bad in ["", "..", "a/b", "../up"] {
      assert!(resolver.resolve(bad).is_err(), "expected '{}' to be rejected", bad);
    }
  }

  #[test]
  fn test_single_resolver_rejects_other_containers() {
    let resolver = SingleStoreResolver::new("bucket", Arc::new(euclid_artifact::MemoryStore::new()));
    assert!(resolver.resolve("bucket").is_ok());
    assert!(resolver.resolve("other").is_err());
  }
}
