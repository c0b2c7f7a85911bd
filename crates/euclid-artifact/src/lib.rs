//! Euclid Artifact
//!
//! This crate provides the result channel storage for Euclid. Objects are
//! opaque blobs (the ingested request, the computed result) stored under
//! keys in a storage container. The orchestration layer only carries small
//! structured data; anything larger travels through here.
//!
//! The [`Store`] trait defines the backend layer. Implementations handle the
//! actual storage (filesystem, memory) while callers decide on keys; see
//! [`layout`] for the key conventions.
//!
//! The trait uses async streaming for efficient handling of large objects.

mod fs;
pub mod layout;
mod memory;

pub use fs::FsStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;

/// A boxed stream of bytes for object data.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, Error>> + Send>>;

/// Error type for object storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested object was not found.
  #[error("object not found: {0}")]
  NotFound(String),

  /// An object is already stored under this key.
  #[error("object already exists: {0}")]
  AlreadyExists(String),

  /// The key is not a valid relative object key.
  #[error("invalid object key: {0}")]
  InvalidKey(String),

  /// An I/O error occurred.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Object storage trait.
///
/// Objects are written once under a fresh key and never mutated.
#[async_trait]
pub trait Store: Send + Sync {
  /// Retrieve an object by key.
  ///
  /// Returns a stream of bytes for efficient handling of large objects.
  async fn get(&self, key: &str) -> Result<ByteStream, Error>;

  /// Store an object under a key that is not yet taken. Fails with
  /// [`Error::AlreadyExists`] otherwise; existing objects are never replaced.
  async fn put(&self, key: &str, data: ByteStream, content_type: &str) -> Result<(), Error>;

  /// Delete an object by key.
  async fn delete(&self, key: &str) -> Result<(), Error>;

  /// Check whether an object exists.
  async fn exists(&self, key: &str) -> Result<bool, Error>;
}

/// Wrap an in-memory buffer as a [`ByteStream`].
pub fn bytes_stream(data: impl Into<Bytes>) -> ByteStream {
  let data: Bytes = data.into();
  Box::pin(futures::stream::once(async move { Ok(data) }))
}

/// Store a complete in-memory buffer.
pub async fn put_bytes(
  store: &dyn Store,
  key: &str,
  data: impl Into<Bytes>,
  content_type: &str,
) -> Result<(), Error> {
  store.put(key, bytes_stream(data), content_type).await
}

/// Read a whole object into memory.
pub async fn get_bytes(store: &dyn Store, key: &str) -> Result<Bytes, Error> {
  let mut stream = store.get(key).await?;
  let mut buf = Vec::new();
  while let Some(chunk) = stream.next().await {
    buf.extend_from_slice(&chunk?);
  }
  Ok(Bytes::from(buf))
}

/// Reject keys that could escape the store root.
pub(crate) fn validate_key(key: &str) -> Result<(), Error> {
  let bad = key.is_empty()
    || key.starts_with('/')
    || key.contains('\\')
    || key.split('/').any(|part| part.is_empty() || part == "." || part == "..");
  if bad {
    return Err(Error::InvalidKey(key.to_string()));
  }
  Ok(())
}
