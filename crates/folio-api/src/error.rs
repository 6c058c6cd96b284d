//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("sync error: {0}")]
  Sync(#[source] folio_sync::Error),
}

impl From<folio_sync::Error> for ApiError {
  fn from(err: folio_sync::Error) -> Self {
    match err {
      folio_sync::Error::DocumentNotFound(cid) => Self::NotFound(format!("document {cid} not found")),
      folio_sync::Error::Collision(title) => {
        Self::Conflict(format!("no free path for title {title:?}"))
      }
      folio_sync::Error::UnsafePath(path) => Self::BadRequest(format!("unsafe path {path:?}")),
      other => Self::Sync(other),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Sync(e) => {
        tracing::error!(error = %e, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
