//! Handlers for `/api/esign/templates` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/api/esign/templates` | The synced cache |
//! | `POST` | `/api/esign/templates/sync` | Wholesale provider re-sync |
//! | `GET`  | `/api/esign/templates/:id` | 404 if not in the cache |

use axum::{
  Json,
  extract::{Path, State},
  response::IntoResponse,
};
use serde_json::json;

use locum_core::{
  provider::SignatureProvider, storage::ObjectBackend, template::Template,
};

use crate::{auth::Authenticated, error::ApiError, AppState};

/// `GET /api/esign/templates`
pub async fn list<R, P>(
  State(state): State<AppState<R, P>>,
  _auth: Authenticated,
) -> Result<Json<Vec<Template>>, ApiError>
where
  R: ObjectBackend + 'static,
  P: SignatureProvider + 'static,
{
  Ok(Json(state.esign.templates()))
}

/// `POST /api/esign/templates/sync`
pub async fn sync<R, P>(
  State(state): State<AppState<R, P>>,
  _auth: Authenticated,
) -> Result<impl IntoResponse, ApiError>
where
  R: ObjectBackend + 'static,
  P: SignatureProvider + 'static,
{
  let count = state.esign.sync_templates().await?;
  Ok(Json(json!({ "synced": count })))
}

/// `GET /api/esign/templates/:id`
pub async fn get_one<R, P>(
  State(state): State<AppState<R, P>>,
  _auth: Authenticated,
  Path(id): Path<String>,
) -> Result<Json<Template>, ApiError>
where
  R: ObjectBackend + 'static,
  P: SignatureProvider + 'static,
{
  state
    .esign
    .template(&id)
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("template {id} not found")))
}
