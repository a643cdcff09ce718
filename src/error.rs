//! Error taxonomy shared by every operation. Exactly four classes; the
//! router boundary maps them to transport codes and a small JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApiError {
  /// Entity missing at the given id. Message is scoped to the entity
  /// ("course not found" vs "section not found").
  #[error("{0}")]
  NotFound(String),
  /// An authorization predicate failed. Message names the required
  /// capability class.
  #[error("{0}")]
  Forbidden(String),
  /// Malformed ids, missing required fields, type-validation failures.
  #[error("{0}")]
  InvalidInput(String),
  /// Unexpected storage failure. Never leaks internals to the caller.
  #[error("internal error")]
  Internal,
}

impl ApiError {
  pub fn not_found(entity: &str) -> Self {
    ApiError::NotFound(format!("{} not found", entity))
  }

  pub fn forbidden(required: &str) -> Self {
    ApiError::Forbidden(format!("requires {} access", required))
  }

  pub fn invalid(msg: impl Into<String>) -> Self {
    ApiError::InvalidInput(msg.into())
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
      ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
      ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
      error!(target: "learnhub_backend", "Internal failure surfaced to caller");
    }
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
