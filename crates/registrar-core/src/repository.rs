//! The `Repository` and `CredentialStore` traits.
//!
//! Implemented by storage backends (e.g. `registrar-store-sqlite`). The HTTP
//! layer and the export orchestrator depend on these abstractions only.
//!
//! Every mutating operation takes the acting [`Principal`] explicitly and runs
//! in a single transaction; a failure leaves the store unchanged.

use std::future::Future;

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
  AccessLevel, ArchiveReason, Entity, EntityKind, Principal, Record,
  approval::{Decision, Workflow},
  entities::{Document, DocumentContent, Staff},
  export::Then,
  query::{ListQuery, Page},
};

/// Persistence for every managed entity.
///
/// Methods are generic over the entity type; the type's declared table
/// decides the storage, the dependency checks and the query whitelists.
/// All methods return `Send` futures so the trait can be used behind `axum`.
pub trait Repository: Send + Sync {
  type Error: std::error::Error + Send + Sync + Into<crate::Error> + 'static;

  // ── Active partition ──────────────────────────────────────────────────

  /// Validate and insert a new active entity stamped by `actor`.
  fn create<T: Entity>(
    &self,
    actor: Principal,
    body: T,
  ) -> impl Future<Output = Result<Record<T>, Self::Error>> + Send + '_;

  /// Whether an active entity with this id exists.
  fn exists<T: Entity>(&self, id: Uuid)
  -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Fetch an active entity, failing with `NotFound` otherwise.
  fn get_by_id<T: Entity>(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Record<T>, Self::Error>> + Send + '_;

  /// Merge `patch` into an active entity's body and revalidate.
  ///
  /// Header fields and the table's locked attributes cannot be patched.
  fn update<T: Entity>(
    &self,
    id: Uuid,
    actor: Principal,
    patch: Map<String, Value>,
  ) -> impl Future<Output = Result<Record<T>, Self::Error>> + Send + '_;

  /// `Active → Archived`.
  fn archive<T: Entity>(
    &self,
    id: Uuid,
    actor: Principal,
    reason: ArchiveReason,
  ) -> impl Future<Output = Result<Record<T>, Self::Error>> + Send + '_;

  /// Hard-delete an active entity, gated by the dependency graph.
  fn delete<T: Entity>(
    &self,
    id: Uuid,
    actor: Principal,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Archived partition ────────────────────────────────────────────────

  fn get_archive_by_id<T: Entity>(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Record<T>, Self::Error>> + Send + '_;

  /// `Archived → Active`. Dependents archived alongside are left archived.
  fn restore<T: Entity>(
    &self,
    id: Uuid,
    actor: Principal,
  ) -> impl Future<Output = Result<Record<T>, Self::Error>> + Send + '_;

  /// Hard-delete an archived entity, gated exactly like [`Repository::delete`].
  fn delete_archive<T: Entity>(
    &self,
    id: Uuid,
    actor: Principal,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Queries ───────────────────────────────────────────────────────────

  /// One page of active entities. `search_fields` must be searchable
  /// attributes of `T`; `query.text` is matched against them.
  fn execute_query<'a, T: Entity>(
    &'a self,
    search_fields: &'a [&'a str],
    query: &'a ListQuery,
  ) -> impl Future<Output = Result<Page<T>, Self::Error>> + Send + 'a;

  /// As [`Repository::execute_query`], over the archived partition.
  fn execute_archive_query<'a, T: Entity>(
    &'a self,
    search_fields: &'a [&'a str],
    query: &'a ListQuery,
  ) -> impl Future<Output = Result<Page<T>, Self::Error>> + Send + 'a;

  // ── Workflows and sweeps ──────────────────────────────────────────────

  /// Approve or reject a pending workflow. Approval applies the workflow's
  /// effect to its student in the same transaction.
  fn decide<W: Workflow>(
    &self,
    id: Uuid,
    actor: Principal,
    decision: Decision,
  ) -> impl Future<Output = Result<Record<W>, Self::Error>> + Send + '_;

  /// Archive every active `kind` row whose orphan rule finds no active
  /// children. Returns the archived ids.
  fn sweep_orphans(
    &self,
    kind: EntityKind,
    actor: Principal,
    reason: ArchiveReason,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  // ── Export support ────────────────────────────────────────────────────

  /// The stored row of any kind, archived or not, as JSON.
  fn snapshot(
    &self,
    kind: EntityKind,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Value>, Self::Error>> + Send + '_;

  /// Active `kind` rows whose `fk` equals `parent_id`, as JSON.
  fn snapshot_children(
    &self,
    kind: EntityKind,
    fk: &'static str,
    parent_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Value>, Self::Error>> + Send + '_;

  /// Mark an entity exported, then archive it (`ADMINISTRATIVE`) or
  /// hard-delete it, in one transaction.
  fn finalize_export(
    &self,
    kind: EntityKind,
    id: Uuid,
    actor: Principal,
    then: Then,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Documents ─────────────────────────────────────────────────────────

  /// Record where an active document's uploaded bytes were stored.
  fn record_document_content(
    &self,
    id: Uuid,
    actor: Principal,
    content: DocumentContent,
  ) -> impl Future<Output = Result<Record<Document>, Self::Error>> + Send + '_;
}

// ─── Credentials ─────────────────────────────────────────────────────────────

/// What the boundary needs to authenticate a staff member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
  pub principal:     Principal,
  /// Argon2 PHC string.
  pub password_hash: String,
  pub access_level:  AccessLevel,
  pub is_archived:   bool,
}

pub trait CredentialStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + Into<crate::Error> + 'static;

  /// Look up the staff member with `email` that has a password set.
  fn find_login(
    &self,
    email: String,
  ) -> impl Future<Output = Result<Option<Login>, Self::Error>> + Send + '_;

  fn set_password(
    &self,
    staff_id: Uuid,
    password_hash: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Change an active staff member's access level. Patches cannot touch it.
  fn set_access_level(
    &self,
    staff_id: Uuid,
    actor: Principal,
    level: AccessLevel,
  ) -> impl Future<Output = Result<Record<Staff>, Self::Error>> + Send + '_;
}
