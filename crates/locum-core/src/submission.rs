//! Submission types — one outbound e-signature request and its lifecycle.
//!
//! A submission is created `pending` and only ever moves along the legal
//! transition graph; it is never deleted. The `locum-esign` manager owns all
//! mutation; everything here is data plus legality predicates.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Status ──────────────────────────────────────────────────────────────────

/// The lifecycle state of a submission.
///
/// ```text
/// pending ─send─> sent ─open─> opened ─sign─> completed
/// sent|opened ─expire─> expired ─resend─> sent
/// sent|opened ─resend─> sent
/// pending|sent|opened ─decline─> declined
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
  Pending,
  Sent,
  Opened,
  Completed,
  Expired,
  Declined,
}

impl SubmissionStatus {
  /// Terminal states accept no further transitions of any kind.
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Completed | Self::Declined)
  }

  /// States from which a recipient action (open/sign) or an expiry may
  /// legally originate.
  pub fn is_in_flight(self) -> bool {
    matches!(self, Self::Sent | Self::Opened)
  }

  /// `expired` is semi-terminal: resend is its only exit.
  pub fn may_resend(self) -> bool {
    matches!(self, Self::Sent | Self::Opened | Self::Expired)
  }

  pub fn may_decline(self) -> bool { !self.is_terminal() }
}

impl std::fmt::Display for SubmissionStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      Self::Pending => "pending",
      Self::Sent => "sent",
      Self::Opened => "opened",
      Self::Completed => "completed",
      Self::Expired => "expired",
      Self::Declined => "declined",
    };
    f.write_str(s)
  }
}

// ─── Submitter ───────────────────────────────────────────────────────────────

/// One recipient/signer. Insertion order in [`Submission::submitters`] is the
/// invitation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submitter {
  pub email:        String,
  pub name:         Option<String>,
  pub sent_at:      Option<DateTime<Utc>>,
  pub viewed_at:    Option<DateTime<Utc>>,
  pub completed_at: Option<DateTime<Utc>>,
  /// Field values as submitted by the signer; absent until completion.
  pub values:       Option<BTreeMap<String, serde_json::Value>>,
}

impl Submitter {
  pub fn new(email: impl Into<String>) -> Self {
    Self {
      email:        email.into(),
      name:         None,
      sent_at:      None,
      viewed_at:    None,
      completed_at: None,
      values:       None,
    }
  }
}

// ─── Submission ──────────────────────────────────────────────────────────────

/// One e-signature request. Callers only ever see read-only snapshots; the
/// lifecycle manager exclusively owns the mutable record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
  /// Opaque, provider-issued id.
  pub id:           String,
  /// Referenced template; not owned by the submission.
  pub template_id:  String,
  pub status:       SubmissionStatus,
  pub submitters:   Vec<Submitter>,
  pub created_at:   DateTime<Utc>,
  pub sent_at:      Option<DateTime<Utc>>,
  pub completed_at: Option<DateTime<Utc>>,
  pub expires_at:   Option<DateTime<Utc>>,
  /// Caller correlation data (e.g. `employee_id`); never interpreted by the
  /// lifecycle manager.
  pub metadata:     BTreeMap<String, String>,
}

// ─── Inputs & events ─────────────────────────────────────────────────────────

/// Input to `create_submission`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSubmission {
  pub template_id: String,
  pub submitters:  Vec<Submitter>,
  /// When `true`, delivery is kicked off immediately after creation.
  #[serde(default)]
  pub send_email:  bool,
  pub message:     Option<String>,
  #[serde(default)]
  pub metadata:    BTreeMap<String, String>,
}

/// The transition kind carried by a webhook or simulated-delivery event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
  Sent,
  Opened,
  Completed,
  Expired,
  Declined,
}

/// Payload handed to a registered callback on every transition.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionEvent {
  pub event:      EventKind,
  /// Snapshot of the submission after the transition was applied.
  pub submission: Submission,
}
