//! JSON REST API composing the storage adapter and the lifecycle manager.
//!
//! Exposes an axum [`Router`] generic over the two core seams
//! ([`locum_core::storage::ObjectBackend`] and
//! [`locum_core::provider::SignatureProvider`]); everything but the
//! provider webhook sits behind HTTP Basic auth.

pub mod auth;
pub mod documents;
pub mod error;
pub mod submissions;
pub mod templates;
pub mod webhook;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use locum_core::{provider::SignatureProvider, storage::ObjectBackend};
use locum_esign::LifecycleManager;
use locum_storage::{StorageAdapter, StorageConfig};

use auth::AuthConfig;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:               String,
  pub port:               u16,
  pub auth_username:      String,
  /// PHC string produced by argon2; see the `--hash-password` helper.
  pub auth_password_hash: String,
  /// Shared secret the provider signs webhook bodies with.
  pub webhook_secret:     String,
  /// Secret used by the dev in-memory bucket to sign URLs.
  pub url_signing_secret: Option<String>,
  pub storage:            StorageConfig,
}

impl ServerConfig {
  pub fn local_root(&self) -> PathBuf {
    self.storage.local_root.clone()
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<R, P>
where
  R: ObjectBackend,
  P: SignatureProvider + 'static,
{
  pub storage:        Arc<StorageAdapter<R>>,
  pub esign:          LifecycleManager<P>,
  pub auth:           Arc<AuthConfig>,
  pub webhook_secret: Arc<str>,
}

impl<R: ObjectBackend, P: SignatureProvider + 'static> Clone for AppState<R, P> {
  fn clone(&self) -> Self {
    Self {
      storage:        Arc::clone(&self.storage),
      esign:          self.esign.clone(),
      auth:           Arc::clone(&self.auth),
      webhook_secret: Arc::clone(&self.webhook_secret),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn router<R, P>(state: AppState<R, P>) -> Router<()>
where
  R: ObjectBackend + 'static,
  P: SignatureProvider + 'static,
{
  Router::new()
    // Documents
    .route(
      "/api/documents",
      get(documents::list::<R, P>).post(documents::upload::<R, P>),
    )
    .route("/api/documents/compliance", post(documents::upload_compliance::<R, P>))
    .route("/api/documents/download/local/{*key}", get(documents::download_local::<R, P>))
    .route("/api/documents/download/{*key}", get(documents::download::<R, P>))
    .route("/api/documents/signed-url/{*key}", get(documents::signed_url::<R, P>))
    .route("/api/documents/{*key}", axum::routing::delete(documents::delete::<R, P>))
    // Storage health
    .route("/api/storage/access", get(documents::check_access::<R, P>))
    // Templates
    .route("/api/esign/templates", get(templates::list::<R, P>))
    .route("/api/esign/templates/sync", post(templates::sync::<R, P>))
    .route("/api/esign/templates/{id}", get(templates::get_one::<R, P>))
    // Submissions
    .route(
      "/api/esign/submissions",
      get(submissions::list::<R, P>).post(submissions::create::<R, P>),
    )
    .route("/api/esign/submissions/{id}", get(submissions::get_one::<R, P>))
    .route("/api/esign/submissions/{id}/complete", post(submissions::complete::<R, P>))
    .route("/api/esign/submissions/{id}/expire", post(submissions::expire::<R, P>))
    .route("/api/esign/submissions/{id}/decline", post(submissions::decline::<R, P>))
    .route("/api/esign/submissions/{id}/resend", post(submissions::resend::<R, P>))
    .route("/api/esign/submissions/{id}/documents", get(submissions::documents::<R, P>))
    // Provider webhook (secret-signed, not Basic-authed)
    .route("/api/esign/webhook", post(webhook::handler::<R, P>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────
