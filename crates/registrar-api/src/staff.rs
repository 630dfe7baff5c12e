//! Staff account endpoints.
//!
//! - `PUT /staff/{id}/password`: admins may set anyone's password, everyone
//!   else only their own.
//! - `PUT /staff/{id}/access`: admins only. Access levels are locked against
//!   ordinary patches.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use bytes::Bytes;
use registrar_core::{AccessLevel, Error, Record, entities::Staff};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState, Backend,
  auth::{Actor, hash_password},
  error::{ApiError, ApiResult},
  parse_body,
};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
pub struct PasswordBody {
  pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct AccessBody {
  pub access_level: AccessLevel,
}

pub async fn set_password<S: Backend>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<Uuid>,
  body: Bytes,
) -> ApiResult<StatusCode> {
  if actor.principal.id() != id {
    actor.require(AccessLevel::Admin)?;
  }
  let PasswordBody { password } = parse_body(&body)?;
  if password.chars().count() < MIN_PASSWORD_LEN {
    return Err(
      Error::validation("password", format!("must be at least {MIN_PASSWORD_LEN} characters")).into(),
    );
  }

  let hash = hash_password(&password)?;
  state.store.set_password(id, hash).await.map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

pub async fn set_access_level<S: Backend>(
  State(state): State<AppState<S>>,
  actor: Actor,
  Path(id): Path<Uuid>,
  body: Bytes,
) -> ApiResult<Json<Record<Staff>>> {
  let principal = actor.require(AccessLevel::Admin)?;
  let AccessBody { access_level } = parse_body(&body)?;
  let record =
    state.store.set_access_level(id, principal, access_level).await.map_err(ApiError::store)?;
  Ok(Json(record))
}
