//! Generic lifecycle handlers shared by every managed entity, plus the
//! document content endpoints.

use std::collections::HashMap;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use bytes::Bytes;
use registrar_core::{
  AccessLevel, ArchiveReason, Entity, Error, Record,
  collaborators::PROBE_WINDOW,
  entities::{Document, DocumentContent},
  query::{ListQuery, Page},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
  AppState, Backend, parse_body,
  auth::Actor,
  error::{ApiError, ApiResult},
};

#[derive(Debug, Deserialize)]
pub struct ReasonBody {
  pub reason: ArchiveReason,
}

// ─── Active partition ─────────────────────────────────────────────────────────

/// `GET /{collection}` — filters, `q`, `limit`, `offset`, `order_by`,
/// `order_dir` from the query string.
pub async fn list<S: Backend, T: Entity>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Page<T>>> {
  actor.require(AccessLevel::Viewer)?;
  let query = ListQuery::from_params(T::table(), &params)?;
  let page = state
    .store
    .execute_query::<T>(T::table().searchable, &query)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(page))
}

/// `POST /{collection}` → 201.
pub async fn create<S: Backend, T: Entity>(
  State(state): State<AppState<S>>,
  actor: Actor,
  body: Bytes,
) -> ApiResult<impl IntoResponse> {
  let principal = actor.require(AccessLevel::Editor)?;
  let body: T = parse_body(&body)?;
  let record = state.store.create(principal, body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_one<S: Backend, T: Entity>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<Uuid>,
) -> ApiResult<Json<Record<T>>> {
  actor.require(AccessLevel::Viewer)?;
  let record = state.store.get_by_id::<T>(id).await.map_err(ApiError::store)?;
  Ok(Json(record))
}

/// `PUT /{collection}/{id}` — body is a partial object of body attributes.
pub async fn update<S: Backend, T: Entity>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<Uuid>,
  body: Bytes,
) -> ApiResult<Json<Record<T>>> {
  let principal = actor.require(AccessLevel::Editor)?;
  let patch: Map<String, Value> = parse_body(&body)?;
  let record = state.store.update::<T>(id, principal, patch).await.map_err(ApiError::store)?;
  Ok(Json(record))
}

/// `PATCH /{collection}/{id}` — archive → 204.
pub async fn archive<S: Backend, T: Entity>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<Uuid>,
  body: Bytes,
) -> ApiResult<StatusCode> {
  let principal = actor.require(AccessLevel::Editor)?;
  let ReasonBody { reason } = parse_body(&body)?;
  state.store.archive::<T>(id, principal, reason).await.map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /{collection}/{id}` → 204.
pub async fn delete<S: Backend, T: Entity>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
  let principal = actor.require(AccessLevel::Admin)?;
  state.store.delete::<T>(id, principal).await.map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Archived partition ───────────────────────────────────────────────────────

pub async fn list_archived<S: Backend, T: Entity>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Page<T>>> {
  actor.require(AccessLevel::Viewer)?;
  let query = ListQuery::from_params(T::table(), &params)?;
  let page = state
    .store
    .execute_archive_query::<T>(T::table().searchable, &query)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(page))
}

pub async fn get_archived<S: Backend, T: Entity>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<Uuid>,
) -> ApiResult<Json<Record<T>>> {
  actor.require(AccessLevel::Viewer)?;
  let record = state.store.get_archive_by_id::<T>(id).await.map_err(ApiError::store)?;
  Ok(Json(record))
}

/// `PATCH /{collection}/archive/{id}` — restore.
pub async fn restore<S: Backend, T: Entity>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<Uuid>,
) -> ApiResult<Json<Record<T>>> {
  let principal = actor.require(AccessLevel::Editor)?;
  let record = state.store.restore::<T>(id, principal).await.map_err(ApiError::store)?;
  Ok(Json(record))
}

pub async fn delete_archived<S: Backend, T: Entity>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
  let principal = actor.require(AccessLevel::Admin)?;
  state.store.delete_archive::<T>(id, principal).await.map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Sweep ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SweepOutcome {
  pub archived: Vec<Uuid>,
}

/// `POST /{collection}/sweep` — archive every orphaned row.
pub async fn sweep<S: Backend, T: Entity>(
  State(state): State<AppState<S>>,
  actor: Actor,
  body: Bytes,
) -> ApiResult<Json<SweepOutcome>> {
  let principal = actor.require(AccessLevel::Editor)?;
  let ReasonBody { reason } = parse_body(&body)?;
  let archived =
    state.store.sweep_orphans(T::KIND, principal, reason).await.map_err(ApiError::store)?;
  Ok(Json(SweepOutcome { archived }))
}

// ─── Document content ─────────────────────────────────────────────────────────

/// `PUT /documents/{id}/content` — raw bytes; the content type is sniffed.
pub async fn upload_content<S: Backend>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<Uuid>,
  body: Bytes,
) -> ApiResult<Json<Record<Document>>> {
  let principal = actor.require(AccessLevel::Editor)?;
  if body.is_empty() {
    return Err(Error::validation("content", "must not be empty").into());
  }
  let document = state.store.get_by_id::<Document>(id).await.map_err(ApiError::store)?;

  let object_key = Document::object_key_for(document.body.student_id, id);
  let mime_type = state.probe.probe(&body[..body.len().min(PROBE_WINDOW)]).to_owned();
  let size_bytes = i64::try_from(body.len()).unwrap_or(i64::MAX);
  state.objects.put(&object_key, body).await?;

  let content = DocumentContent { object_key, mime_type, size_bytes };
  let record =
    state.store.record_document_content(id, principal, content).await.map_err(ApiError::store)?;
  Ok(Json(record))
}

#[derive(Debug, Serialize)]
pub struct ContentUrl {
  pub url:             String,
  pub expires_in_secs: u64,
}

/// `GET /documents/{id}/url` — presigned download link.
pub async fn content_url<S: Backend>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<Uuid>,
) -> ApiResult<Json<ContentUrl>> {
  actor.require(AccessLevel::Viewer)?;
  let document = state.store.get_by_id::<Document>(id).await.map_err(ApiError::store)?;
  let key = document
    .body
    .object_key
    .ok_or(Error::NotFound { entity: "Document content", id })?;
  let url = state.objects.presigned_url(&key, state.presign_ttl).await?;
  Ok(Json(ContentUrl { url, expires_in_secs: state.presign_ttl.as_secs() }))
}
