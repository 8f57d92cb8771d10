//! Error types for `locum-core`.

use thiserror::Error;

use crate::submission::SubmissionStatus;

#[derive(Debug, Error)]
pub enum Error {
  #[error("missing or invalid configuration: {0}")]
  Configuration(String),

  #[error("invalid input: {0}")]
  Validation(String),

  #[error("template not found: {0}")]
  TemplateNotFound(String),

  #[error("submission not found: {0}")]
  SubmissionNotFound(String),

  #[error("no such key: {0}")]
  NoSuchKey(String),

  #[error("operation invoked before initialize()")]
  NotInitialized,

  #[error("illegal transition: cannot {action} a submission in state {from}")]
  InvalidTransition {
    from:   SubmissionStatus,
    action: &'static str,
  },

  #[error("submission {0} is not completed; documents are unavailable")]
  NotCompleted(String),

  #[error("provider error: {0}")]
  Provider(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
