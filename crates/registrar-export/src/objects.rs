//! Local filesystem object store.
//!
//! Objects live under a root directory at their key's relative path. Writes
//! go to a uniquely named temp file first and are renamed into place, so a
//! reader never sees a partial object. Download URLs are signed with
//! SHA-256 over the key, the expiry and a server secret.

use std::{
  path::{Component, Path, PathBuf},
  time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use registrar_core::collaborators::ObjectStore;
use sha2::{Digest, Sha256};
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

use crate::{Error, Result};

pub struct LocalObjectStore {
  root:            PathBuf,
  /// Prefix of generated download URLs, e.g. `http://localhost:8080/objects`.
  public_base_url: String,
  signing_key:     Vec<u8>,
}

impl LocalObjectStore {
  /// Create the store, creating `root` if needed.
  pub async fn new(
    root: impl AsRef<Path>,
    public_base_url: impl Into<String>,
    signing_key: impl Into<Vec<u8>>,
  ) -> Result<Self> {
    let root = root.as_ref().to_path_buf();
    fs::create_dir_all(&root).await?;
    Ok(Self {
      root,
      public_base_url: public_base_url.into().trim_end_matches('/').to_owned(),
      signing_key: signing_key.into(),
    })
  }

  /// Resolve `key` below the root, refusing anything that could escape it.
  fn key_path(&self, key: &str) -> Result<PathBuf> {
    if key.is_empty() || key.contains("..") || key.starts_with('/') || key.starts_with('\\') {
      return Err(Error::InvalidKey(format!("path traversal not allowed: {key}")));
    }
    if !Path::new(key).components().all(|c| matches!(c, Component::Normal(_))) {
      return Err(Error::InvalidKey(format!("contains unsafe path component: {key}")));
    }
    Ok(self.root.join(key))
  }

  pub async fn put_object(&self, key: &str, data: Bytes) -> Result<PathBuf> {
    let path = self.key_path(key)?;
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).await?;
    }

    let temp_name = format!(".tmp.{}", Uuid::new_v4());
    let temp_path = path.with_file_name(
      path
        .file_name()
        .map(|n| format!("{}{temp_name}", n.to_string_lossy()))
        .unwrap_or_else(|| temp_name.clone()),
    );
    {
      let mut file = fs::File::create(&temp_path).await?;
      file.write_all(&data).await?;
      file.sync_all().await?;
    }
    fs::rename(&temp_path, &path).await?;

    tracing::debug!(key, size = data.len(), "object stored");
    Ok(path)
  }

  pub async fn get(&self, key: &str) -> Result<Bytes> {
    let path = self.key_path(key)?;
    let data = fs::read(&path).await.map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        Error::NotFound(key.to_owned())
      } else {
        Error::Io(e)
      }
    })?;
    Ok(Bytes::from(data))
  }

  pub async fn remove(&self, key: &str) -> Result<()> {
    let path = self.key_path(key)?;
    match fs::remove_file(&path).await {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(Error::Io(e)),
    }
  }

  /// Signed URL for `key`, valid until `expires` (Unix seconds).
  pub fn signed_url(&self, key: &str, expires: i64) -> String {
    let signature = sign(&self.signing_key, key, expires);
    format!("{}/{key}?expires={expires}&signature={signature}", self.public_base_url)
  }

  /// Whether `signature` authorises reading `key` at Unix time `now`.
  pub fn verify(&self, key: &str, expires: i64, signature: &str, now: i64) -> bool {
    verify_signature(&self.signing_key, key, expires, signature, now)
  }
}

fn sign(secret: &[u8], key: &str, expires: i64) -> String {
  let mut hasher = Sha256::new();
  hasher.update(secret);
  hasher.update([0]);
  hasher.update(key.as_bytes());
  hasher.update([0]);
  hasher.update(expires.to_string().as_bytes());
  hex::encode(hasher.finalize())
}

/// Check a download signature. Expired links never verify.
pub fn verify_signature(secret: &[u8], key: &str, expires: i64, signature: &str, now: i64) -> bool {
  if now > expires {
    return false;
  }
  let expected = sign(secret, key, expires);
  expected.len() == signature.len()
    && expected.bytes().zip(signature.bytes()).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
  async fn put(&self, key: &str, bytes: Bytes) -> registrar_core::Result<String> {
    let path = self.put_object(key, bytes).await?;
    Ok(format!("file://{}", path.display()))
  }

  async fn delete(&self, key: &str) -> registrar_core::Result<()> { Ok(self.remove(key).await?) }

  async fn presigned_url(&self, key: &str, ttl: Duration) -> registrar_core::Result<String> {
    self.key_path(key)?;
    let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
    let expires = Utc::now().timestamp().saturating_add(ttl);
    Ok(self.signed_url(key, expires))
  }
}
