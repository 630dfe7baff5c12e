//! `POST /{collection}/{id}/export` — write an artifact, then archive or
//! hard-delete the entity.
//!
//! Body: `{"format": "json"|"xml", "then": "archive"|"delete", "notify": "a@b"}`,
//! all optional. Deleting afterwards needs admin access.

use axum::{
  Json,
  extract::{Path, State},
};
use bytes::Bytes;
use registrar_core::{
  AccessLevel, Entity,
  collaborators::ExportFormat,
  export::{ExportOutcome, ExportRequest, Exporter, Then},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, Backend, auth::Actor, error::ApiResult, parse_body};

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ExportBody {
  pub format: ExportFormat,
  pub then:   Then,
  pub notify: Option<String>,
}

impl Default for ExportBody {
  fn default() -> Self { Self { format: ExportFormat::Json, then: Then::Archive, notify: None } }
}

pub async fn export<S: Backend, T: Entity>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<Uuid>,
  body: Bytes,
) -> ApiResult<Json<ExportOutcome>> {
  let ExportBody { format, then, notify } =
    if body.is_empty() { ExportBody::default() } else { parse_body(&body)? };
  let required = match then {
    Then::Archive => AccessLevel::Editor,
    Then::Delete => AccessLevel::Admin,
  };
  let principal = actor.require(required)?;

  let exporter = Exporter {
    renderer: state.renderer.as_ref(),
    objects:  state.objects.as_ref(),
    mailer:   state.mailer.as_ref(),
  };
  let request = ExportRequest { kind: T::KIND, id, actor: principal, format, then, notify };
  let outcome = exporter.export_and_remove(state.store.as_ref(), request).await?;
  Ok(Json(outcome))
}
