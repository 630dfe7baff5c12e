//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every core [`ErrorKind`] maps to exactly one status code here. The body
//! carries the user-safe message; the log gets the full one.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use registrar_core::{Error, ErrorKind};
use serde_json::{Value, json};
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub Error);

impl ApiError {
  /// Convert any backend error.
  pub fn store<E: Into<Error>>(e: E) -> Self { Self(e.into()) }

  pub fn status(&self) -> StatusCode { status_for(self.0.kind()) }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
  match kind {
    ErrorKind::Validation => StatusCode::BAD_REQUEST,
    ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
    ErrorKind::Forbidden => StatusCode::FORBIDDEN,
    ErrorKind::NotFound => StatusCode::NOT_FOUND,
    ErrorKind::Conflict | ErrorKind::Transition => StatusCode::CONFLICT,
    ErrorKind::Fatal => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

/// Structured fields a client can act on, merged into the body.
fn details(e: &Error) -> Option<(&'static str, Value)> {
  match e {
    Error::Validation { field, .. } => Some(("field", json!(field))),
    Error::UniqueViolation { field, .. } => Some(("field", json!(field))),
    Error::RelatedEntityNotFound { field, .. } => Some(("field", json!(field))),
    Error::ArchiveDependency { labels } => Some(("labels", json!(labels))),
    Error::StatusAlreadySet { status, .. } => Some(("status", json!(status))),
    _ => None,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let kind = self.0.kind();
    let status = status_for(kind);
    if status.is_server_error() {
      tracing::error!(error = %self.0, "request failed");
    } else {
      tracing::warn!(status = status.as_u16(), error = %self.0, "request rejected");
    }

    let mut body = json!({ "error": self.0.user_message(), "kind": kind.as_ref() });
    if let Some((key, value)) = details(&self.0) {
      body[key] = value;
    }

    let mut res = (status, Json(body)).into_response();
    if status == StatusCode::UNAUTHORIZED {
      res
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Basic realm=\"registrar\""));
    }
    res
  }
}

pub type ApiResult<T> = Result<T, ApiError>;
