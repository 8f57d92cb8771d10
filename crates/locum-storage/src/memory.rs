//! [`MemoryBackend`] — an in-memory remote-store stand-in.
//!
//! Behaves like a region-aware object bucket: useful for testing the adapter
//! and for development without remote credentials. Reachability can be
//! toggled to exercise the fallback path.

use std::{
  collections::BTreeMap,
  sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
  },
};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use locum_core::storage::{ObjectBackend, ObjectSummary, StoredBlob};

use crate::{Error, Result};

#[derive(Debug)]
struct StoredRec {
  blob:          StoredBlob,
  last_modified: DateTime<Utc>,
}

/// An in-memory bucket with a name, a region, and a URL-signing secret.
#[derive(Debug)]
pub struct MemoryBackend {
  bucket:    String,
  region:    String,
  secret:    String,
  reachable: AtomicBool,
  objects:   Mutex<BTreeMap<String, StoredRec>>,
}

impl MemoryBackend {
  pub fn new(
    bucket: impl Into<String>,
    region: impl Into<String>,
    secret: impl Into<String>,
  ) -> Self {
    Self {
      bucket:    bucket.into(),
      region:    region.into(),
      secret:    secret.into(),
      reachable: AtomicBool::new(true),
      objects:   Mutex::new(BTreeMap::new()),
    }
  }

  /// Simulate a remote outage (or recovery).
  pub fn set_reachable(&self, reachable: bool) {
    self.reachable.store(reachable, Ordering::SeqCst);
  }

  pub fn object_count(&self) -> usize {
    self.objects.lock().expect("objects lock").len()
  }

  fn check_reachable(&self) -> Result<()> {
    if self.reachable.load(Ordering::SeqCst) {
      Ok(())
    } else {
      Err(Error::Unreachable(format!("bucket {} is unreachable", self.bucket)))
    }
  }
}

impl ObjectBackend for MemoryBackend {
  type Error = Error;

  async fn put(&self, key: &str, blob: StoredBlob) -> Result<()> {
    self.check_reachable()?;
    self.objects.lock().expect("objects lock").insert(
      key.to_string(),
      StoredRec { blob, last_modified: Utc::now() },
    );
    Ok(())
  }

  async fn get(&self, key: &str) -> Result<Option<StoredBlob>> {
    self.check_reachable()?;
    Ok(
      self
        .objects
        .lock()
        .expect("objects lock")
        .get(key)
        .map(|rec| rec.blob.clone()),
    )
  }

  async fn delete(&self, key: &str) -> Result<bool> {
    self.check_reachable()?;
    Ok(self.objects.lock().expect("objects lock").remove(key).is_some())
  }

  async fn list(&self, prefix: &str) -> Result<Vec<ObjectSummary>> {
    self.check_reachable()?;
    Ok(
      self
        .objects
        .lock()
        .expect("objects lock")
        .range(prefix.to_string()..)
        .take_while(|(k, _)| k.starts_with(prefix))
        .map(|(k, rec)| ObjectSummary {
          key:           k.clone(),
          size:          rec.blob.bytes.len() as u64,
          last_modified: rec.last_modified,
        })
        .collect(),
    )
  }

  async fn signed_url(&self, key: &str, expiry_secs: u64) -> Result<String> {
    self.check_reachable()?;

    let mut hasher = Sha256::new();
    hasher.update(self.secret.as_bytes());
    hasher.update(key.as_bytes());
    hasher.update(expiry_secs.to_le_bytes());
    let sig = hex::encode(hasher.finalize());

    Ok(format!(
      "https://{}.s3.{}.amazonaws.com/{key}?X-Locum-Expires={expiry_secs}&X-Locum-Signature={sig}",
      self.bucket, self.region,
    ))
  }

  async fn bucket_region(&self) -> Result<String> {
    self.check_reachable()?;
    Ok(self.region.clone())
  }
}
