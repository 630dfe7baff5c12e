//! Approval endpoints for transfer, repetition and promotion workflows.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/{collection}/{id}/approve` | applies the workflow's effect |
//! | `POST` | `/{collection}/{id}/reject`  | body: `{"reason": "..."}` |
//!
//! A second decision on the same workflow is a 409.

use axum::{
  Json,
  extract::{Path, State},
};
use bytes::Bytes;
use registrar_core::{
  AccessLevel, Record,
  approval::{Decision, Workflow},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState, Backend, parse_body,
  auth::Actor,
  error::{ApiError, ApiResult},
};

pub async fn approve<S: Backend, W: Workflow>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<Uuid>,
) -> ApiResult<Json<Record<W>>> {
  let principal = actor.require(AccessLevel::Editor)?;
  let record =
    state.store.decide::<W>(id, principal, Decision::Approve).await.map_err(ApiError::store)?;
  Ok(Json(record))
}

#[derive(Debug, Deserialize)]
pub struct RejectBody {
  pub reason: String,
}

pub async fn reject<S: Backend, W: Workflow>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<Uuid>,
  body: Bytes,
) -> ApiResult<Json<Record<W>>> {
  let principal = actor.require(AccessLevel::Editor)?;
  let RejectBody { reason } = parse_body(&body)?;
  let record = state
    .store
    .decide::<W>(id, principal, Decision::Reject { reason })
    .await
    .map_err(ApiError::store)?;
  Ok(Json(record))
}
