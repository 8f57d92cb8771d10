//! [`StorageAdapter`] — the fallback-capable front door for document storage.
//!
//! Uploads are routed to the remote backend when one is configured; a remote
//! failure is retried exactly once against local disk when fallback is
//! enabled, and surfaced immediately otherwise. There is never an automatic
//! retry against the same failing remote target — a systemic problem (wrong
//! region, bad credentials) must be fixed and re-checked via `check_access`.

use std::{collections::BTreeMap, path::PathBuf};

use bytes::Bytes;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use locum_core::storage::{
  ObjectBackend, ObjectSummary, StorageKind, StoredBlob, UploadOutcome,
};

use crate::{
  key::{compute_etag, derive_key, validate_key, version_id, KeyNamespace},
  local::LocalDiskBackend,
  Error, Result,
};

pub const DEFAULT_SIGNED_URL_EXPIRY_SECS: u64 = 3600;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

// ─── Configuration ───────────────────────────────────────────────────────────

/// Storage settings, deserialised from the `[storage]` table of config.toml.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
  pub bucket:               Option<String>,
  pub region:               Option<String>,
  pub local_root:           PathBuf,
  /// When `true`, a missing or failing remote degrades to local disk rather
  /// than failing the operation.
  #[serde(default = "default_true")]
  pub allow_local_fallback: bool,
}

fn default_true() -> bool { true }

// ─── Requests & results ──────────────────────────────────────────────────────

/// Input to [`StorageAdapter::upload_file`].
#[derive(Debug, Clone)]
pub struct UploadRequest {
  pub bytes:        Bytes,
  pub filename:     String,
  pub content_type: Option<String>,
  /// With `category`, routes the key under `employees/{id}/{category}/`.
  pub employee_id:  Option<String>,
  pub category:     Option<String>,
  /// Routes the key under `company/{id}/{category}/` when no employee id is
  /// given.
  pub company_id:   Option<String>,
}

/// Input metadata for [`StorageAdapter::upload_compliance_document`].
#[derive(Debug, Clone, Deserialize)]
pub struct ComplianceUpload {
  pub location_id:         Option<String>,
  pub document_type:       String,
  pub version:             u32,
  #[serde(default)]
  pub tags:                BTreeMap<String, String>,
  pub expiration_date:     Option<NaiveDate>,
  #[serde(default)]
  pub is_required:         bool,
  pub previous_version_id: Option<String>,
}

/// Result of a compliance upload: the plain outcome plus the caller's
/// metadata echoed through unchanged.
#[derive(Debug, Clone, Serialize)]
pub struct ComplianceReceipt {
  #[serde(flatten)]
  pub upload:          UploadOutcome,
  pub document_type:   String,
  pub version:         u32,
  pub tags:            BTreeMap<String, String>,
  pub expiration_date: Option<NaiveDate>,
  pub is_required:     bool,
}

/// Result of [`StorageAdapter::check_access`].
#[derive(Debug, Clone, Serialize)]
pub struct AccessReport {
  pub has_access: bool,
  pub error:      Option<String>,
}

// ─── Adapter ─────────────────────────────────────────────────────────────────

/// Fronts one optional remote backend and the local-disk fallback.
#[derive(Debug)]
pub struct StorageAdapter<R: ObjectBackend> {
  remote: Option<R>,
  local:  LocalDiskBackend,
  config: StorageConfig,
}

impl<R: ObjectBackend> StorageAdapter<R> {
  /// Initialise the adapter. Fails with a configuration error when no remote
  /// backend is supplied and local fallback is disabled; with fallback
  /// enabled the adapter starts in degraded (local-only) mode.
  pub fn new(config: StorageConfig, remote: Option<R>) -> Result<Self> {
    if remote.is_none() && !config.allow_local_fallback {
      return Err(Error::Configuration(
        "no remote storage configured and local fallback is disabled".into(),
      ));
    }
    if remote.is_none() {
      tracing::warn!(
        root = %config.local_root.display(),
        "no remote storage configured; running on local disk only"
      );
    }

    let local = LocalDiskBackend::new(config.local_root.clone());
    Ok(Self { remote, local, config })
  }

  /// Verify the remote bucket is reachable and in the configured region.
  ///
  /// A region mismatch is reported with the actual region named so the
  /// operator can correct the configuration; it is never silently retried.
  pub async fn check_access(&self) -> AccessReport {
    let Some(remote) = &self.remote else {
      return AccessReport {
        has_access: false,
        error:      Some("no remote storage configured".to_string()),
      };
    };

    let actual = match remote.bucket_region().await {
      Ok(region) => region,
      Err(e) => {
        return AccessReport { has_access: false, error: Some(e.to_string()) };
      }
    };

    if let Some(expected) = &self.config.region
      && expected != &actual
    {
      let err = Error::RegionMismatch {
        expected: expected.clone(),
        actual:   actual.clone(),
      };
      return AccessReport { has_access: false, error: Some(err.to_string()) };
    }

    AccessReport { has_access: true, error: None }
  }

  // ── Uploads ───────────────────────────────────────────────────────────────

  /// Upload a file, deriving its key from the subject namespace.
  pub async fn upload_file(&self, req: UploadRequest) -> Result<UploadOutcome> {
    let namespace = match (&req.employee_id, &req.category, &req.company_id) {
      (Some(employee_id), Some(category), _) => KeyNamespace::Employee {
        employee_id: employee_id.clone(),
        category:    category.clone(),
      },
      (_, Some(category), Some(company_id)) => KeyNamespace::Company {
        company_id: company_id.clone(),
        category:   category.clone(),
      },
      _ => KeyNamespace::General,
    };

    let key = derive_key(&namespace, &req.filename);
    let etag = compute_etag(&req.bytes);
    let blob = StoredBlob {
      bytes:        req.bytes,
      content_type: req
        .content_type
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
    };

    let storage_kind = self.store_blob(&key, blob).await?;

    Ok(UploadOutcome {
      storage_key: key,
      storage_kind,
      etag: Some(etag),
      version_id: None,
      previous_version_key: None,
    })
  }

  /// Versioned upload for compliance documents. The result carries a
  /// `v{version}_{token}` version id; a supplied `previous_version_id`
  /// becomes the back-reference of the new version (backward-only, never a
  /// cycle).
  pub async fn upload_compliance_document(
    &self,
    bytes: Bytes,
    filename: &str,
    meta: ComplianceUpload,
  ) -> Result<ComplianceReceipt> {
    let namespace = KeyNamespace::Compliance {
      location_id:   meta.location_id.clone(),
      document_type: meta.document_type.clone(),
    };

    let key = derive_key(&namespace, filename);
    let etag = compute_etag(&bytes);
    let blob = StoredBlob {
      bytes,
      content_type: "application/pdf".to_string(),
    };

    let storage_kind = self.store_blob(&key, blob).await?;

    Ok(ComplianceReceipt {
      upload:          UploadOutcome {
        storage_key: key,
        storage_kind,
        etag: Some(etag),
        version_id: Some(version_id(meta.version)),
        previous_version_key: meta.previous_version_id,
      },
      document_type:   meta.document_type,
      version:         meta.version,
      tags:            meta.tags,
      expiration_date: meta.expiration_date,
      is_required:     meta.is_required,
    })
  }

  /// Route one blob to remote storage, falling back to local disk at most
  /// once when permitted.
  async fn store_blob(&self, key: &str, blob: StoredBlob) -> Result<StorageKind> {
    if let Some(remote) = &self.remote {
      match remote.put(key, blob.clone()).await {
        Ok(()) => return Ok(StorageKind::S3),
        Err(e) if self.config.allow_local_fallback => {
          tracing::warn!(key, error = %e, "remote upload failed; falling back to local disk");
        }
        Err(e) => return Err(Error::Backend(Box::new(e))),
      }
    }

    self.local.put(key, blob).await?;
    Ok(StorageKind::Local)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  /// Download a stored object. Checks the remote first, then local disk.
  pub async fn download_file(&self, key: &str) -> Result<StoredBlob> {
    validate_key(key)?;

    if let Some(remote) = &self.remote {
      match remote.get(key).await {
        Ok(Some(blob)) => return Ok(blob),
        Ok(None) => {}
        Err(e) if self.config.allow_local_fallback => {
          tracing::warn!(key, error = %e, "remote read failed; trying local disk");
        }
        Err(e) => return Err(Error::Backend(Box::new(e))),
      }
    }

    match self.local.get(key).await? {
      Some(blob) => Ok(blob),
      None => Err(Error::NoSuchKey(key.to_string())),
    }
  }

  /// Download from the local fallback only — backs the internal
  /// `/api/documents/download/local/{key}` serving path, which must never
  /// proxy remote objects.
  pub async fn download_local_file(&self, key: &str) -> Result<StoredBlob> {
    validate_key(key)?;
    match self.local.get(key).await? {
      Some(blob) => Ok(blob),
      None => Err(Error::NoSuchKey(key.to_string())),
    }
  }

  /// List all objects under `prefix` across both backends.
  /// No match is an empty vec, never an error.
  pub async fn list_files(&self, prefix: &str) -> Result<Vec<ObjectSummary>> {
    let mut out = Vec::new();

    if let Some(remote) = &self.remote {
      match remote.list(prefix).await {
        Ok(mut summaries) => out.append(&mut summaries),
        Err(e) if self.config.allow_local_fallback => {
          tracing::warn!(prefix, error = %e, "remote listing failed; listing local only");
        }
        Err(e) => return Err(Error::Backend(Box::new(e))),
      }
    }

    out.append(&mut self.local.list(prefix).await?);
    out.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(out)
  }

  /// Produce a time-limited URL for a remote object, or the stable internal
  /// path for a local one.
  pub async fn signed_url(&self, key: &str, expiry_secs: u64) -> Result<String> {
    validate_key(key)?;

    if let Some(remote) = &self.remote {
      match remote.get(key).await {
        Ok(Some(_)) => {
          return remote
            .signed_url(key, expiry_secs)
            .await
            .map_err(|e| Error::Backend(Box::new(e)));
        }
        Ok(None) => {}
        Err(e) if self.config.allow_local_fallback => {
          tracing::warn!(key, error = %e, "remote lookup failed; trying local disk");
        }
        Err(e) => return Err(Error::Backend(Box::new(e))),
      }
    }

    if self.local.get(key).await?.is_some() {
      return Ok(LocalDiskBackend::internal_url(key));
    }

    Err(Error::NoSuchKey(key.to_string()))
  }

  // ── Deletes ───────────────────────────────────────────────────────────────

  /// Remove a stored object. A missing key is a reported `NoSuchKey` error,
  /// never a crash; deleting twice yields success then `NoSuchKey`.
  pub async fn delete_file(&self, key: &str) -> Result<()> {
    validate_key(key)?;

    let mut removed = false;

    if let Some(remote) = &self.remote {
      match remote.delete(key).await {
        Ok(was_there) => removed |= was_there,
        Err(e) if self.config.allow_local_fallback => {
          tracing::warn!(key, error = %e, "remote delete failed; trying local disk");
        }
        Err(e) => return Err(Error::Backend(Box::new(e))),
      }
    }

    removed |= self.local.delete(key).await?;

    if removed {
      Ok(())
    } else {
      Err(Error::NoSuchKey(key.to_string()))
    }
  }
}
