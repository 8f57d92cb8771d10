//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized")]
  Unauthorized,

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("core error: {0}")]
  Core(#[from] locum_core::Error),

  #[error("storage error: {0}")]
  Storage(#[from] locum_storage::Error),
}

impl ApiError {
  fn status(&self) -> StatusCode {
    use locum_core::Error as Core;
    use locum_storage::Error as Storage;

    match self {
      Self::Unauthorized => StatusCode::UNAUTHORIZED,
      Self::NotFound(_) => StatusCode::NOT_FOUND,
      Self::BadRequest(_) => StatusCode::BAD_REQUEST,

      Self::Core(e) => match e {
        Core::TemplateNotFound(_) | Core::SubmissionNotFound(_) => {
          StatusCode::NOT_FOUND
        }
        Core::Validation(_) => StatusCode::BAD_REQUEST,
        Core::InvalidTransition { .. } | Core::NotCompleted(_) => {
          StatusCode::CONFLICT
        }
        Core::NotInitialized => StatusCode::SERVICE_UNAVAILABLE,
        Core::Provider(_) => StatusCode::BAD_GATEWAY,
        Core::Configuration(_) | Core::NoSuchKey(_) | Core::Serialization(_) => {
          StatusCode::INTERNAL_SERVER_ERROR
        }
      },

      Self::Storage(e) => match e {
        Storage::NoSuchKey(_) => StatusCode::NOT_FOUND,
        Storage::InvalidKey(_) => StatusCode::BAD_REQUEST,
        Storage::Unreachable(_) | Storage::Backend(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();

    if status == StatusCode::UNAUTHORIZED {
      let mut res =
        (status, Json(json!({ "error": "unauthorized" }))).into_response();
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"locum\""),
      );
      return res;
    }

    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
