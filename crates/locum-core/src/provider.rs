//! The `SignatureProvider` trait — the seam to the e-signature service.
//!
//! The lifecycle manager owns all submission state; the provider is only
//! consulted for connectivity, the template catalogue, id allocation at
//! creation time, and the finished documents of a completed submission.

use std::future::Future;

use crate::{
  storage::StoredBlob,
  submission::{Submission, Submitter},
  template::Template,
};

/// Abstraction over an e-signature provider API.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait SignatureProvider: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Verify provider connectivity/credentials. Called by `initialize`.
  fn test_connection(
    &self,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Fetch the full template catalogue. The caller replaces its cache
  /// wholesale with the result.
  fn list_templates(
    &self,
  ) -> impl Future<Output = Result<Vec<Template>, Self::Error>> + Send + '_;

  /// Register a new submission with the provider and return its opaque id.
  fn create_submission<'a>(
    &'a self,
    template: &'a Template,
    submitters: &'a [Submitter],
    message: Option<&'a str>,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'a;

  /// Retrieve the signed document bundle for a completed submission.
  fn fetch_completed_documents<'a>(
    &'a self,
    submission: &'a Submission,
    template: Option<&'a Template>,
  ) -> impl Future<Output = Result<StoredBlob, Self::Error>> + Send + 'a;
}
