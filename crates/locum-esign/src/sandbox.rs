//! [`SandboxProvider`] — an in-memory e-signature provider stand-in.
//!
//! Ships a small canned template catalogue and allocates uuid-based
//! submission ids. Useful for development and testing without provider
//! credentials; connectivity can be toggled offline to exercise failure
//! paths.

use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use uuid::Uuid;

use locum_core::{
  provider::SignatureProvider,
  storage::StoredBlob,
  submission::{Submission, Submitter},
  template::{FieldKind, Template, TemplateField},
  Error, Result,
};

use crate::pdf;

/// A provider that never leaves the process.
pub struct SandboxProvider {
  templates: Vec<Template>,
  offline:   AtomicBool,
}

impl SandboxProvider {
  /// Provider with the default onboarding catalogue.
  pub fn new() -> Self {
    Self {
      templates: default_templates(),
      offline:   AtomicBool::new(false),
    }
  }

  /// Provider with a caller-supplied catalogue.
  pub fn with_templates(templates: Vec<Template>) -> Self {
    Self { templates, offline: AtomicBool::new(false) }
  }

  /// Simulate a provider outage (or recovery).
  pub fn set_offline(&self, offline: bool) {
    self.offline.store(offline, Ordering::SeqCst);
  }

  fn check_online(&self) -> Result<()> {
    if self.offline.load(Ordering::SeqCst) {
      Err(Error::Provider("signature provider unreachable".into()))
    } else {
      Ok(())
    }
  }
}

impl Default for SandboxProvider {
  fn default() -> Self { Self::new() }
}

impl SignatureProvider for SandboxProvider {
  type Error = Error;

  async fn test_connection(&self) -> Result<()> {
    self.check_online()
  }

  async fn list_templates(&self) -> Result<Vec<Template>> {
    self.check_online()?;
    Ok(self.templates.clone())
  }

  async fn create_submission(
    &self,
    _template: &Template,
    _submitters: &[Submitter],
    _message: Option<&str>,
  ) -> Result<String> {
    self.check_online()?;
    Ok(format!("sub_{}", Uuid::new_v4().simple()))
  }

  async fn fetch_completed_documents(
    &self,
    submission: &Submission,
    template: Option<&Template>,
  ) -> Result<StoredBlob> {
    self.check_online()?;
    Ok(StoredBlob {
      bytes:        Bytes::from(pdf::completion_certificate(submission, template)),
      content_type: "application/pdf".to_string(),
    })
  }
}

fn default_templates() -> Vec<Template> {
  vec![
    Template {
      id:     "template_001".into(),
      name:   "Employment Agreement".into(),
      fields: vec![
        TemplateField {
          name:     "full_name".into(),
          kind:     FieldKind::Text,
          required: true,
        },
        TemplateField {
          name:     "start_date".into(),
          kind:     FieldKind::Date,
          required: true,
        },
        TemplateField {
          name:     "signature".into(),
          kind:     FieldKind::Signature,
          required: true,
        },
      ],
    },
    Template {
      id:     "template_002".into(),
      name:   "HIPAA Confidentiality Acknowledgement".into(),
      fields: vec![
        TemplateField {
          name:     "full_name".into(),
          kind:     FieldKind::Text,
          required: true,
        },
        TemplateField {
          name:     "acknowledged".into(),
          kind:     FieldKind::Checkbox,
          required: true,
        },
        TemplateField {
          name:     "initials".into(),
          kind:     FieldKind::Initials,
          required: false,
        },
        TemplateField {
          name:     "signature".into(),
          kind:     FieldKind::Signature,
          required: true,
        },
      ],
    },
  ]
}
