//! Handlers for `/api/documents` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/api/documents` | Raw body; routing params in the query string |
//! | `GET`    | `/api/documents?prefix=` | Prefix listing |
//! | `DELETE` | `/api/documents/{*key}` | 404 on the second delete of a key |
//! | `GET`    | `/api/documents/download/{*key}` | Remote-or-local download |
//! | `GET`    | `/api/documents/download/local/{*key}` | Local fallback only |
//! | `GET`    | `/api/documents/signed-url/{*key}?expires=` | Signed URL |
//! | `POST`   | `/api/documents/compliance` | Versioned upload, JSON body |
//! | `GET`    | `/api/storage/access` | Remote reachability / region check |

use axum::{
  Json,
  body::Bytes,
  extract::{Path, Query, State},
  http::{StatusCode, header},
  response::IntoResponse,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use serde::Deserialize;
use serde_json::json;

use locum_core::{
  provider::SignatureProvider,
  storage::{ObjectBackend, ObjectSummary, UploadOutcome},
};
use locum_storage::{
  ComplianceReceipt, ComplianceUpload, UploadRequest,
  DEFAULT_SIGNED_URL_EXPIRY_SECS,
};

use crate::{auth::Authenticated, error::ApiError, AppState};

// ─── Upload ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UploadParams {
  pub filename:     String,
  pub content_type: Option<String>,
  pub employee_id:  Option<String>,
  pub category:     Option<String>,
  pub company_id:   Option<String>,
}

/// `POST /api/documents?filename=…` — the request body is the file content.
pub async fn upload<R, P>(
  State(state): State<AppState<R, P>>,
  _auth: Authenticated,
  Query(params): Query<UploadParams>,
  body: Bytes,
) -> Result<impl IntoResponse, ApiError>
where
  R: ObjectBackend + 'static,
  P: SignatureProvider + 'static,
{
  let outcome: UploadOutcome = state
    .storage
    .upload_file(UploadRequest {
      bytes:        body,
      filename:     params.filename,
      content_type: params.content_type,
      employee_id:  params.employee_id,
      category:     params.category,
      company_id:   params.company_id,
    })
    .await?;
  Ok((StatusCode::CREATED, Json(outcome)))
}

#[derive(Debug, Deserialize)]
pub struct CompliancePayload {
  pub filename:       String,
  /// File content, base64-encoded.
  pub content_base64: String,
  #[serde(flatten)]
  pub meta:           ComplianceUpload,
}

/// `POST /api/documents/compliance`
pub async fn upload_compliance<R, P>(
  State(state): State<AppState<R, P>>,
  _auth: Authenticated,
  Json(payload): Json<CompliancePayload>,
) -> Result<impl IntoResponse, ApiError>
where
  R: ObjectBackend + 'static,
  P: SignatureProvider + 'static,
{
  let bytes = B64
    .decode(payload.content_base64.as_bytes())
    .map_err(|e| ApiError::BadRequest(format!("invalid base64 content: {e}")))?;

  let receipt: ComplianceReceipt = state
    .storage
    .upload_compliance_document(bytes.into(), &payload.filename, payload.meta)
    .await?;
  Ok((StatusCode::CREATED, Json(receipt)))
}

// ─── Download ─────────────────────────────────────────────────────────────────

/// `GET /api/documents/download/{*key}`
pub async fn download<R, P>(
  State(state): State<AppState<R, P>>,
  _auth: Authenticated,
  Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
  R: ObjectBackend + 'static,
  P: SignatureProvider + 'static,
{
  let blob = state.storage.download_file(&key).await?;
  Ok(([(header::CONTENT_TYPE, blob.content_type)], blob.bytes))
}

/// `GET /api/documents/download/local/{*key}` — the stable serving path
/// embedded in local "signed" URLs. Never proxies remote objects.
pub async fn download_local<R, P>(
  State(state): State<AppState<R, P>>,
  _auth: Authenticated,
  Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
  R: ObjectBackend + 'static,
  P: SignatureProvider + 'static,
{
  let blob = state.storage.download_local_file(&key).await?;
  Ok(([(header::CONTENT_TYPE, blob.content_type)], blob.bytes))
}

// ─── Signed URLs ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SignedUrlParams {
  pub expires: Option<u64>,
}

/// `GET /api/documents/signed-url/{*key}?expires=3600`
pub async fn signed_url<R, P>(
  State(state): State<AppState<R, P>>,
  _auth: Authenticated,
  Path(key): Path<String>,
  Query(params): Query<SignedUrlParams>,
) -> Result<impl IntoResponse, ApiError>
where
  R: ObjectBackend + 'static,
  P: SignatureProvider + 'static,
{
  let expires = params.expires.unwrap_or(DEFAULT_SIGNED_URL_EXPIRY_SECS);
  let url = state.storage.signed_url(&key, expires).await?;
  Ok(Json(json!({ "url": url, "expires": expires })))
}

// ─── Listing & deletion ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  #[serde(default)]
  pub prefix: String,
}

/// `GET /api/documents?prefix=employees/emp-1/`
pub async fn list<R, P>(
  State(state): State<AppState<R, P>>,
  _auth: Authenticated,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<ObjectSummary>>, ApiError>
where
  R: ObjectBackend + 'static,
  P: SignatureProvider + 'static,
{
  Ok(Json(state.storage.list_files(&params.prefix).await?))
}

/// `DELETE /api/documents/{*key}`
pub async fn delete<R, P>(
  State(state): State<AppState<R, P>>,
  _auth: Authenticated,
  Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
  R: ObjectBackend + 'static,
  P: SignatureProvider + 'static,
{
  state.storage.delete_file(&key).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Health ───────────────────────────────────────────────────────────────────

/// `GET /api/storage/access`
pub async fn check_access<R, P>(
  State(state): State<AppState<R, P>>,
  _auth: Authenticated,
) -> Result<impl IntoResponse, ApiError>
where
  R: ObjectBackend + 'static,
  P: SignatureProvider + 'static,
{
  Ok(Json(state.storage.check_access().await))
}
