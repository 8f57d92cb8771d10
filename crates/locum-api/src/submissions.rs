//! Handlers for `/api/esign/submissions` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/esign/submissions` | Body: [`NewSubmission`] |
//! | `GET`  | `/api/esign/submissions?employee_id=` | Metadata filter |
//! | `GET`  | `/api/esign/submissions/:id` | 404 if unknown |
//! | `POST` | `/api/esign/submissions/:id/complete` | 409 on illegal state |
//! | `POST` | `/api/esign/submissions/:id/expire` | 409 on illegal state |
//! | `POST` | `/api/esign/submissions/:id/decline` | 409 on illegal state |
//! | `POST` | `/api/esign/submissions/:id/resend` | 409 on illegal state |
//! | `GET`  | `/api/esign/submissions/:id/documents` | PDF; 409 unless completed |

use std::collections::BTreeMap;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{StatusCode, header},
  response::IntoResponse,
};
use serde::Deserialize;

use locum_core::{
  provider::SignatureProvider,
  storage::ObjectBackend,
  submission::{NewSubmission, Submission},
};

use crate::{auth::Authenticated, error::ApiError, AppState};

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /api/esign/submissions`
pub async fn create<R, P>(
  State(state): State<AppState<R, P>>,
  _auth: Authenticated,
  Json(body): Json<NewSubmission>,
) -> Result<impl IntoResponse, ApiError>
where
  R: ObjectBackend + 'static,
  P: SignatureProvider + 'static,
{
  let submission = state.esign.create_submission(body).await?;
  Ok((StatusCode::CREATED, Json(submission)))
}

// ─── Reads ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub employee_id: String,
}

/// `GET /api/esign/submissions?employee_id=emp-7`
pub async fn list<R, P>(
  State(state): State<AppState<R, P>>,
  _auth: Authenticated,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Submission>>, ApiError>
where
  R: ObjectBackend + 'static,
  P: SignatureProvider + 'static,
{
  Ok(Json(state.esign.submissions_by_employee(&params.employee_id).await))
}

/// `GET /api/esign/submissions/:id`
pub async fn get_one<R, P>(
  State(state): State<AppState<R, P>>,
  _auth: Authenticated,
  Path(id): Path<String>,
) -> Result<Json<Submission>, ApiError>
where
  R: ObjectBackend + 'static,
  P: SignatureProvider + 'static,
{
  state
    .esign
    .submission(&id)
    .await
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("submission {id} not found")))
}

// ─── Transitions ──────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct CompleteBody {
  pub values: Option<BTreeMap<String, serde_json::Value>>,
}

/// `POST /api/esign/submissions/:id/complete`
pub async fn complete<R, P>(
  State(state): State<AppState<R, P>>,
  _auth: Authenticated,
  Path(id): Path<String>,
  body: Option<Json<CompleteBody>>,
) -> Result<Json<Submission>, ApiError>
where
  R: ObjectBackend + 'static,
  P: SignatureProvider + 'static,
{
  let values = body.and_then(|Json(b)| b.values);
  Ok(Json(state.esign.complete_submission(&id, values).await?))
}

/// `POST /api/esign/submissions/:id/expire`
pub async fn expire<R, P>(
  State(state): State<AppState<R, P>>,
  _auth: Authenticated,
  Path(id): Path<String>,
) -> Result<Json<Submission>, ApiError>
where
  R: ObjectBackend + 'static,
  P: SignatureProvider + 'static,
{
  Ok(Json(state.esign.expire_submission(&id).await?))
}

/// `POST /api/esign/submissions/:id/decline`
pub async fn decline<R, P>(
  State(state): State<AppState<R, P>>,
  _auth: Authenticated,
  Path(id): Path<String>,
) -> Result<Json<Submission>, ApiError>
where
  R: ObjectBackend + 'static,
  P: SignatureProvider + 'static,
{
  Ok(Json(state.esign.decline_submission(&id).await?))
}

/// `POST /api/esign/submissions/:id/resend`
pub async fn resend<R, P>(
  State(state): State<AppState<R, P>>,
  _auth: Authenticated,
  Path(id): Path<String>,
) -> Result<Json<Submission>, ApiError>
where
  R: ObjectBackend + 'static,
  P: SignatureProvider + 'static,
{
  Ok(Json(state.esign.resend_submission(&id).await?))
}

// ─── Documents ────────────────────────────────────────────────────────────────

/// `GET /api/esign/submissions/:id/documents`
pub async fn documents<R, P>(
  State(state): State<AppState<R, P>>,
  _auth: Authenticated,
  Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
  R: ObjectBackend + 'static,
  P: SignatureProvider + 'static,
{
  let blob = state.esign.download_documents(&id).await?;
  Ok(([(header::CONTENT_TYPE, blob.content_type)], blob.bytes))
}
