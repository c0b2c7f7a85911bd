use std::path::PathBuf;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use crate::{ByteStream, Error, Store, validate_key};

/// Filesystem-based object store.
///
/// Stores objects as files on the local filesystem. Each object is stored
/// at `{base_path}/{key}`. Parent directories are created automatically.
/// Writes go to a temporary sibling first and are linked into place, so a
/// reader never observes a partial object and an existing object is never
/// replaced.
pub struct FsStore {
  base_path: PathBuf,
}

impl FsStore {
  /// Create a new filesystem store with the given base path.
  pub fn new(base_path: impl Into<PathBuf>) -> Self {
    Self {
      base_path: base_path.into(),
    }
  }

  /// Store rooted at `{root}/{storage_container}`.
  pub fn for_container(root: impl Into<PathBuf>, storage_container: &str) -> Self {
    Self::new(root.into().join(storage_container))
  }

  fn key_to_path(&self, key: &str) -> Result<PathBuf, Error> {
    validate_key(key)?;
    Ok(self.base_path.join(key))
  }
}

fn not_found_or_io(key: &str, e: std::io::Error) -> Error {
  if e.kind() == std::io::ErrorKind::NotFound {
    Error::NotFound(key.to_string())
  } else {
    Error::Io(e)
  }
}

#[async_trait]
impl Store for FsStore {
  async fn get(&self, key: &str) -> Result<ByteStream, Error> {
    let path = self.key_to_path(key)?;
    let file = File::open(&path)
      .await
      .map_err(|e| not_found_or_io(key, e))?;
    let stream = ReaderStream::new(file).map(|r| r.map_err(Error::Io));
    Ok(Box::pin(stream))
  }

  async fn put(&self, key: &str, data: ByteStream, _content_type: &str) -> Result<(), Error> {
    let path = self.key_to_path(key)?;

    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).await?;
    }

    if fs::try_exists(&path).await? {
      return Err(Error::AlreadyExists(key.to_string()));
    }

    let mut tmp_path = path.clone().into_os_string();
    tmp_path.push(format!(".{}.partial", uuid::Uuid::new_v4().simple()));
    let tmp_path = PathBuf::from(tmp_path);

    let mut file = File::create(&tmp_path).await?;
    let mut stream = std::pin::pin!(data);

    while let Some(chunk) = stream.next().await {
      let bytes = match chunk {
        Ok(bytes) => bytes,
        Err(e) => {
          drop(file);
          let _ = fs::remove_file(&tmp_path).await;
          return Err(e);
        }
      };
      file.write_all(&bytes).await?;
    }

    file.flush().await?;
    drop(file);

    // hard_link refuses to replace an existing file, unlike rename
    let linked = fs::hard_link(&tmp_path, &path).await;
    let _ = fs::remove_file(&tmp_path).await;
    match linked {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
        Err(Error::AlreadyExists(key.to_string()))
      }
      Err(e) => Err(Error::Io(e)),
    }
  }

  async fn delete(&self, key: &str) -> Result<(), Error> {
    let path = self.key_to_path(key)?;
    fs::remove_file(&path)
      .await
      .map_err(|e| not_found_or_io(key, e))
  }

  async fn exists(&self, key: &str) -> Result<bool, Error> {
    let path = self.key_to_path(key)?;
    Ok(fs::try_exists(&path).await?)
  }
}
