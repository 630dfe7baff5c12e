//! JSON REST API for Registrar.
//!
//! Exposes an axum [`Router`] backed by any store implementing both
//! [`Repository`] and [`CredentialStore`]. Every managed entity gets the same
//! route shape under its collection:
//!
//! | Method   | Path                          | Access |
//! |----------|-------------------------------|--------|
//! | `POST`   | `/{collection}`               | editor |
//! | `GET`    | `/{collection}`               | viewer |
//! | `GET`    | `/{collection}/{id}`          | viewer |
//! | `PUT`    | `/{collection}/{id}`          | editor |
//! | `PATCH`  | `/{collection}/{id}`          | editor, body `{"reason": ...}` |
//! | `DELETE` | `/{collection}/{id}`          | admin  |
//! | `GET`    | `/{collection}/archive`       | viewer |
//! | `GET`    | `/{collection}/archive/{id}`  | viewer |
//! | `PATCH`  | `/{collection}/archive/{id}`  | editor, restores |
//! | `DELETE` | `/{collection}/archive/{id}`  | admin  |
//!
//! Workflows add `approve`/`reject`, orphan-swept kinds add `sweep`,
//! exportable kinds add `export`, and documents add `content`/`url`.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", registrar_api::api_router(state))
//! ```

pub mod auth;
pub mod entities;
pub mod error;
pub mod export;
pub mod staff;
pub mod workflows;


use std::{sync::Arc, time::Duration};

use axum::{
  Router,
  routing::{get, post, put},
};
use bytes::Bytes;
use registrar_core::{
  Entity, Error,
  approval::Workflow,
  collaborators::{ExportRenderer, Mailer, MimeProbe, ObjectStore},
  entities::*,
  export::gatherer,
  repository::{CredentialStore, Repository},
};
use serde::de::DeserializeOwned;

pub use auth::Actor;
pub use error::ApiError;

/// Everything a store must provide to back the API.
pub trait Backend: Repository + CredentialStore + Clone + Send + Sync + 'static {}

impl<S> Backend for S where S: Repository + CredentialStore + Clone + Send + Sync + 'static {}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S> {
  pub store:       Arc<S>,
  pub objects:     Arc<dyn ObjectStore>,
  pub renderer:    Arc<dyn ExportRenderer>,
  pub mailer:      Arc<dyn Mailer>,
  pub probe:       Arc<dyn MimeProbe>,
  /// Lifetime of presigned document URLs.
  pub presign_ttl: Duration,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
pub fn api_router<S: Backend>(state: AppState<S>) -> Router<()> {
  let router = Router::new();
  let router = mount::<S, Department>(router);
  let router = mount::<S, Role>(router);
  let router = mount::<S, Level>(router);
  let router = mount::<S, Staff>(router);
  let router = mount::<S, Qualification>(router);
  let router = mount::<S, Class>(router);
  let router = mount::<S, Subject>(router);
  let router = mount::<S, Guardian>(router);
  let router = mount::<S, Student>(router);
  let router = mount::<S, Grade>(router);
  let router = mount::<S, Document>(router);
  let router = mount_workflow::<S, ClassTransfer>(router);
  let router = mount_workflow::<S, DepartmentTransfer>(router);
  let router = mount_workflow::<S, Repetition>(router);
  let router = mount_workflow::<S, Promotion>(router);

  router
    .route("/documents/{id}/content", put(entities::upload_content::<S>))
    .route("/documents/{id}/url", get(entities::content_url::<S>))
    .route("/staff/{id}/password", put(staff::set_password::<S>))
    .route("/staff/{id}/access", put(staff::set_access_level::<S>))
    .with_state(state)
}

/// The uniform lifecycle routes for `T`, plus sweep and export where `T`
/// declares an orphan rule or has a gatherer.
fn mount<S: Backend, T: Entity>(router: Router<AppState<S>>) -> Router<AppState<S>> {
  let table = T::table();
  let c = table.collection;

  let mut router = router
    .route(&format!("/{c}"), get(entities::list::<S, T>).post(entities::create::<S, T>))
    .route(
      &format!("/{c}/{{id}}"),
      get(entities::get_one::<S, T>)
        .put(entities::update::<S, T>)
        .patch(entities::archive::<S, T>)
        .delete(entities::delete::<S, T>),
    )
    .route(&format!("/{c}/archive"), get(entities::list_archived::<S, T>))
    .route(
      &format!("/{c}/archive/{{id}}"),
      get(entities::get_archived::<S, T>)
        .patch(entities::restore::<S, T>)
        .delete(entities::delete_archived::<S, T>),
    );

  if !table.orphan_rule.is_empty() {
    router = router.route(&format!("/{c}/sweep"), post(entities::sweep::<S, T>));
  }
  if gatherer(T::KIND).is_some() {
    router = router.route(&format!("/{c}/{{id}}/export"), post(export::export::<S, T>));
  }
  router
}

fn mount_workflow<S: Backend, W: Workflow>(router: Router<AppState<S>>) -> Router<AppState<S>> {
  let c = W::table().collection;
  mount::<S, W>(router)
    .route(&format!("/{c}/{{id}}/approve"), post(workflows::approve::<S, W>))
    .route(&format!("/{c}/{{id}}/reject"), post(workflows::reject::<S, W>))
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// Decode a JSON request body, reporting malformed input as a validation
/// error rather than axum's default rejection.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
  serde_json::from_slice(body).map_err(|e| ApiError(Error::validation("body", e.to_string())))
}
