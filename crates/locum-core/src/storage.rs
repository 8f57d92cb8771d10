//! The `ObjectBackend` trait and supporting blob types.
//!
//! The trait is implemented by storage backends (`locum-storage` ships a
//! local-disk backend and an in-memory remote stand-in). Higher layers
//! depend on this abstraction, not on any concrete backend.

use std::future::Future;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Blob types ──────────────────────────────────────────────────────────────

/// Where a blob physically lives. Serialised into upload results so callers
/// can tell whether the fallback path was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
  S3,
  Local,
}

/// Raw object content plus the content type it was stored with.
#[derive(Debug, Clone)]
pub struct StoredBlob {
  pub bytes:        Bytes,
  pub content_type: String,
}

/// One entry in a prefix listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectSummary {
  pub key:           String,
  pub size:          u64,
  pub last_modified: DateTime<Utc>,
}

/// Result of a successful upload.
///
/// `previous_version_key` is a weak back-reference for lineage only; the new
/// object does not own (and never deletes) its predecessor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadOutcome {
  pub storage_key:          String,
  pub storage_kind:         StorageKind,
  /// SHA-256 hex digest of the stored bytes.
  pub etag:                 Option<String>,
  /// Present only for versioned (compliance) uploads: `v{version}_{token}`.
  pub version_id:           Option<String>,
  pub previous_version_key: Option<String>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over one physical object store (a remote bucket or a local
/// directory).
///
/// Key strings are opaque to the backend; namespacing and sanitisation are
/// the adapter's concern. All methods return `Send` futures so the trait can
/// be used in multi-threaded async runtimes (tokio with `axum`).
pub trait ObjectBackend: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Store `blob` under `key`, overwriting any existing object.
  fn put<'a>(
    &'a self,
    key: &'a str,
    blob: StoredBlob,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Retrieve the object at `key`. Returns `None` if absent.
  fn get<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<StoredBlob>, Self::Error>> + Send + 'a;

  /// Remove the object at `key`. Returns `true` if an object was removed,
  /// `false` if the key did not exist.
  fn delete<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// List all objects whose key starts with `prefix`.
  /// An empty match is an empty vec, never an error.
  fn list<'a>(
    &'a self,
    prefix: &'a str,
  ) -> impl Future<Output = Result<Vec<ObjectSummary>, Self::Error>> + Send + 'a;

  /// Produce a time-limited read URL for `key`, valid for `expiry_secs`.
  fn signed_url<'a>(
    &'a self,
    key: &'a str,
    expiry_secs: u64,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'a;

  /// The region the configured bucket actually lives in — compared against
  /// the configured region by `check_access`.
  fn bucket_region(
    &self,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + '_;
}
