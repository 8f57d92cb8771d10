//! Template types — reusable document definitions with typed fields.
//!
//! Templates are immutable once synced from the provider; a sync replaces
//! the cached set wholesale.

use serde::{Deserialize, Serialize};

/// The input kind of one template field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
  Text,
  Signature,
  Date,
  Checkbox,
  Initials,
}

/// One named, typed field within a template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateField {
  pub name:     String,
  pub kind:     FieldKind,
  pub required: bool,
}

/// A reusable document definition referenced by submissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
  pub id:     String,
  pub name:   String,
  /// Ordered as presented to the signer.
  pub fields: Vec<TemplateField>,
}
