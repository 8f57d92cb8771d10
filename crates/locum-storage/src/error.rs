//! Error type for `locum-storage`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] locum_core::Error),

  #[error("missing or invalid storage configuration: {0}")]
  Configuration(String),

  #[error("no such key: {0}")]
  NoSuchKey(String),

  /// Keys arriving from callers (download, delete, signed-url) are rejected
  /// if they try to escape the storage root.
  #[error("invalid storage key: {0}")]
  InvalidKey(String),

  #[error(
    "bucket is in region {actual} but storage is configured for {expected}; \
     update the configured region"
  )]
  RegionMismatch { expected: String, actual: String },

  #[error("remote storage unreachable: {0}")]
  Unreachable(String),

  #[error("remote storage error: {0}")]
  Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("metadata error: {0}")]
  Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
