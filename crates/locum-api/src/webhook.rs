//! Inbound provider webhook.
//!
//! The provider signs the raw request body with a shared secret:
//! `X-Locum-Signature: hex(sha256(secret ‖ body))`. A bad or missing
//! signature is a 401; a structurally valid event that is illegal for the
//! submission's current state is a 409 and leaves the state unchanged.

use axum::{
  Json,
  body::Bytes,
  extract::State,
  http::HeaderMap,
  response::IntoResponse,
};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use locum_core::{
  provider::SignatureProvider, storage::ObjectBackend, submission::EventKind,
};

use crate::{error::ApiError, AppState};

pub const SIGNATURE_HEADER: &str = "x-locum-signature";

#[derive(Debug, Deserialize)]
pub struct WebhookBody {
  pub submission_id: String,
  pub event:         EventKind,
}

/// Compute the expected body signature. Also used by tests and by the
/// sandbox tooling that emits synthetic webhooks.
pub fn sign_body(secret: &str, body: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(secret.as_bytes());
  hasher.update(body);
  hex::encode(hasher.finalize())
}

/// `POST /api/esign/webhook`
pub async fn handler<R, P>(
  State(state): State<AppState<R, P>>,
  headers: HeaderMap,
  body: Bytes,
) -> Result<impl IntoResponse, ApiError>
where
  R: ObjectBackend + 'static,
  P: SignatureProvider + 'static,
{
  let presented = headers
    .get(SIGNATURE_HEADER)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  if presented != sign_body(&state.webhook_secret, &body) {
    tracing::warn!("webhook body signature mismatch");
    return Err(ApiError::Unauthorized);
  }

  let event: WebhookBody = serde_json::from_slice(&body)
    .map_err(|e| ApiError::BadRequest(format!("invalid webhook body: {e}")))?;

  tracing::info!(
    submission_id = %event.submission_id,
    event = ?event.event,
    "provider webhook received"
  );

  let submission = state
    .esign
    .ingest_event(&event.submission_id, event.event)
    .await?;

  Ok(Json(submission))
}
