//! Storage adapter for Locum documents.
//!
//! Maps logical uploads (subject + category + file) to physical storage,
//! preferring a remote object store and falling back to local disk when the
//! remote is unavailable or unconfigured. All reads, writes, deletes, and
//! listings go through the [`locum_core::storage::ObjectBackend`] seam.

mod adapter;
mod key;
mod local;
mod memory;

pub mod error;

pub use adapter::{
  AccessReport, ComplianceReceipt, ComplianceUpload, StorageAdapter,
  StorageConfig, UploadRequest, DEFAULT_SIGNED_URL_EXPIRY_SECS,
};
pub use error::{Error, Result};
pub use local::LocalDiskBackend;
pub use memory::MemoryBackend;
