//! [`LocalDiskBackend`] — the local-filesystem fallback store.
//!
//! Objects live under a configured root directory; the storage key maps
//! directly to a relative path. Content types are persisted in a JSON
//! sidecar next to each object so downloads round-trip them faithfully.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use locum_core::storage::{ObjectBackend, ObjectSummary, StoredBlob};

use crate::{key::validate_key, Error, Result};

const META_SUFFIX: &str = ".locum-meta";

#[derive(Serialize, Deserialize)]
struct SidecarMeta {
  content_type: String,
}

/// A blob store rooted at a local directory.
///
/// Cloning is cheap — only the root path is copied.
#[derive(Debug, Clone)]
pub struct LocalDiskBackend {
  root: PathBuf,
}

impl LocalDiskBackend {
  /// Create a backend rooted at `root`. The directory is created lazily on
  /// first write.
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path { &self.root }

  fn path_for(&self, key: &str) -> Result<PathBuf> {
    validate_key(key)?;
    Ok(self.root.join(key))
  }

  /// Serving path used in place of a signed URL. Local serving sits behind
  /// the application's own auth, so no signature or expiry is attached.
  pub fn internal_url(key: &str) -> String {
    format!("/api/documents/download/local/{key}")
  }

  /// Walk the tree under `root`, returning summaries for every object whose
  /// relative key starts with `prefix`. Sidecar files are skipped.
  async fn walk(&self, prefix: &str) -> Result<Vec<ObjectSummary>> {
    let mut out = Vec::new();
    if !self.root.exists() {
      return Ok(out);
    }

    let mut pending = vec![self.root.clone()];
    while let Some(dir) = pending.pop() {
      let mut entries = tokio::fs::read_dir(&dir).await?;
      while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_dir() {
          pending.push(path);
          continue;
        }
        let Ok(rel) = path.strip_prefix(&self.root) else { continue };
        let key = rel.to_string_lossy().replace('\\', "/");
        if key.ends_with(META_SUFFIX) || !key.starts_with(prefix) {
          continue;
        }
        let meta = entry.metadata().await?;
        let last_modified: DateTime<Utc> = meta
          .modified()
          .map(DateTime::<Utc>::from)
          .unwrap_or_else(|_| Utc::now());
        out.push(ObjectSummary { key, size: meta.len(), last_modified });
      }
    }

    out.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(out)
  }
}

impl ObjectBackend for LocalDiskBackend {
  type Error = Error;

  async fn put(&self, key: &str, blob: StoredBlob) -> Result<()> {
    let path = self.path_for(key)?;
    if let Some(parent) = path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }

    tokio::fs::write(&path, &blob.bytes).await?;

    let sidecar = SidecarMeta { content_type: blob.content_type };
    let meta_path = sidecar_path(&path);
    tokio::fs::write(&meta_path, serde_json::to_vec(&sidecar)?).await?;
    Ok(())
  }

  async fn get(&self, key: &str) -> Result<Option<StoredBlob>> {
    let path = self.path_for(key)?;
    let bytes = match tokio::fs::read(&path).await {
      Ok(b) => Bytes::from(b),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(e.into()),
    };

    let content_type = match tokio::fs::read(sidecar_path(&path)).await {
      Ok(raw) => {
        serde_json::from_slice::<SidecarMeta>(&raw)
          .map(|m| m.content_type)
          .unwrap_or_else(|_| "application/octet-stream".to_string())
      }
      Err(_) => "application/octet-stream".to_string(),
    };

    Ok(Some(StoredBlob { bytes, content_type }))
  }

  async fn delete(&self, key: &str) -> Result<bool> {
    let path = self.path_for(key)?;
    match tokio::fs::remove_file(&path).await {
      Ok(()) => {
        // Sidecar removal is best-effort; a stray sidecar is harmless.
        let _ = tokio::fs::remove_file(sidecar_path(&path)).await;
        Ok(true)
      }
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
      Err(e) => Err(e.into()),
    }
  }

  async fn list(&self, prefix: &str) -> Result<Vec<ObjectSummary>> {
    self.walk(prefix).await
  }

  async fn signed_url(&self, key: &str, _expiry_secs: u64) -> Result<String> {
    validate_key(key)?;
    Ok(Self::internal_url(key))
  }

  async fn bucket_region(&self) -> Result<String> {
    Ok("local".to_string())
  }
}

fn sidecar_path(path: &Path) -> PathBuf {
  let mut s = path.as_os_str().to_owned();
  s.push(META_SUFFIX);
  PathBuf::from(s)
}
