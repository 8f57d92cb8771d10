//! Storage-key derivation and filename sanitisation.
//!
//! Keys are `/`-joined namespace paths ending in a uniqueness token plus the
//! sanitised original filename, so concurrent uploads of the same file never
//! collide and a key never carries traversal sequences or shell metacharacters.

use chrono::Utc;
use sha2::{Digest, Sha256};
use uuid::Uuid;

// ─── Namespaces ──────────────────────────────────────────────────────────────

/// Which namespace a key is derived under.
#[derive(Debug, Clone)]
pub enum KeyNamespace {
  /// `employees/{employee_id}/{category}/…`
  Employee { employee_id: String, category: String },
  /// `company/{company_id}/{category}/…`
  Company { company_id: String, category: String },
  /// `compliance/{location?}/{document_type}/…`
  Compliance {
    location_id:   Option<String>,
    document_type: String,
  },
  /// `documents/…`
  General,
}

/// Build a collision-free storage key for `filename` under `namespace`.
pub fn derive_key(namespace: &KeyNamespace, filename: &str) -> String {
  let file = format!("{}_{}", unique_token(), sanitize_filename(filename));
  match namespace {
    KeyNamespace::Employee { employee_id, category } => format!(
      "employees/{}/{}/{file}",
      sanitize_segment(employee_id),
      sanitize_segment(category),
    ),
    KeyNamespace::Company { company_id, category } => format!(
      "company/{}/{}/{file}",
      sanitize_segment(company_id),
      sanitize_segment(category),
    ),
    KeyNamespace::Compliance { location_id, document_type } => {
      match location_id {
        Some(loc) => format!(
          "compliance/{}/{}/{file}",
          sanitize_segment(loc),
          sanitize_segment(document_type),
        ),
        None => {
          format!("compliance/{}/{file}", sanitize_segment(document_type))
        }
      }
    }
    KeyNamespace::General => format!("documents/{file}"),
  }
}

/// Opaque token embedded in every derived key: millisecond timestamp plus a
/// uuid fragment. The uuid fragment keeps keys distinct even for uploads
/// landing in the same millisecond.
pub fn unique_token() -> String {
  let uuid = Uuid::new_v4().simple().to_string();
  format!("{}-{}", Utc::now().timestamp_millis(), &uuid[..8])
}

/// Version id for compliance uploads: `v{version}_{token}`.
pub fn version_id(version: u32) -> String {
  let uuid = Uuid::new_v4().simple().to_string();
  format!("v{version}_{}", &uuid[..12])
}

// ─── Sanitisation ────────────────────────────────────────────────────────────

/// Strip path traversal, control characters, and shell/HTML metacharacters
/// from a caller-supplied filename before it is embedded in a key.
pub fn sanitize_filename(filename: &str) -> String {
  let mut out = String::with_capacity(filename.len());
  for c in filename.chars() {
    match c {
      '/' | '\\' => out.push('_'),
      c if c.is_control() => {}
      '<' | '>' | '&' | '"' | '\'' | '`' | '$' | ';' | '|' | '*' | '?' => {}
      c => out.push(c),
    }
  }
  // Collapse any traversal sequences that survived separator replacement.
  while out.contains("..") {
    out = out.replace("..", ".");
  }
  let trimmed = out.trim_matches(|c: char| c == '.' || c.is_whitespace());
  if trimmed.is_empty() {
    "file".to_string()
  } else {
    trimmed.to_string()
  }
}

/// Sanitise one interior path segment (ids, categories). Stricter than
/// filenames: only alphanumerics, dash, underscore survive.
pub fn sanitize_segment(segment: &str) -> String {
  let out: String = segment
    .chars()
    .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
    .collect();
  if out.is_empty() { "unknown".to_string() } else { out }
}

/// Reject caller-supplied keys that try to escape the storage root.
pub fn validate_key(key: &str) -> crate::Result<()> {
  if key.is_empty()
    || key.starts_with('/')
    || key.contains("..")
    || key.contains('\\')
    || key.chars().any(char::is_control)
  {
    return Err(crate::Error::InvalidKey(key.to_string()));
  }
  Ok(())
}

// ─── Etags ───────────────────────────────────────────────────────────────────

/// Content etag: SHA-256 hex over the stored bytes.
pub fn compute_etag(bytes: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(bytes);
  hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn traversal_sequences_are_stripped() {
    let s = sanitize_filename("../../../etc/passwd");
    assert!(!s.contains(".."));
    assert!(!s.contains('/'));
  }

  #[test]
  fn shell_and_html_metacharacters_are_stripped() {
    let s = sanitize_filename("re<script>`$(rm)';|*?.pdf");
    for c in ['<', '>', '`', '$', '\'', ';', '|', '*', '?'] {
      assert!(!s.contains(c), "{c:?} survived: {s}");
    }
    assert!(s.ends_with(".pdf"));
  }

  #[test]
  fn empty_after_sanitising_falls_back() {
    assert_eq!(sanitize_filename("..."), "file");
    assert_eq!(sanitize_segment("$$$"), "unknown");
  }

  #[test]
  fn employee_namespace_shape() {
    let key = derive_key(
      &KeyNamespace::Employee {
        employee_id: "emp-42".into(),
        category:    "licenses".into(),
      },
      "rn-license.pdf",
    );
    assert!(key.starts_with("employees/emp-42/licenses/"));
    assert!(key.ends_with("_rn-license.pdf"));
  }

  #[test]
  fn derived_keys_never_collide() {
    let ns = KeyNamespace::General;
    let a = derive_key(&ns, "same.pdf");
    let b = derive_key(&ns, "same.pdf");
    assert_ne!(a, b);
  }

  #[test]
  fn version_id_shape() {
    let v = version_id(3);
    assert!(v.starts_with("v3_"));
  }

  #[test]
  fn validate_key_rejects_escapes() {
    assert!(validate_key("employees/a/b/file.pdf").is_ok());
    assert!(validate_key("../secrets").is_err());
    assert!(validate_key("/absolute").is_err());
    assert!(validate_key("").is_err());
  }
}
