//! `GET /objects/{*key}?expires=..&signature=..` — serves objects from the
//! local object store to holders of a presigned URL.

use std::sync::Arc;

use axum::{
  Router,
  extract::{Path, Query, State},
  http::{StatusCode, header},
  response::{IntoResponse, Response},
  routing::get,
};
use chrono::Utc;
use registrar_core::collaborators::{MimeProbe, PROBE_WINDOW};
use registrar_export::{Error, LocalObjectStore, MagicProbe};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Signed {
  pub expires:   i64,
  pub signature: String,
}

pub fn router(objects: Arc<LocalObjectStore>) -> Router {
  Router::new().route("/objects/{*key}", get(fetch)).with_state(objects)
}

async fn fetch(
  State(objects): State<Arc<LocalObjectStore>>,
  Path(key): Path<String>,
  Query(signed): Query<Signed>,
) -> Response {
  if !objects.verify(&key, signed.expires, &signed.signature, Utc::now().timestamp()) {
    tracing::warn!(%key, "rejected object download with a bad or expired signature");
    return (StatusCode::FORBIDDEN, "invalid or expired signature").into_response();
  }

  match objects.get(&key).await {
    Ok(bytes) => {
      let mime = MagicProbe.probe(&bytes[..bytes.len().min(PROBE_WINDOW)]);
      ([(header::CONTENT_TYPE, mime)], bytes).into_response()
    }
    Err(Error::NotFound(_)) => StatusCode::NOT_FOUND.into_response(),
    Err(Error::InvalidKey(msg)) => (StatusCode::BAD_REQUEST, msg).into_response(),
    Err(e) => {
      tracing::error!(%key, error = %e, "object download failed");
      StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
  }
}
