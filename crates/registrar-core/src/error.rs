//! Error taxonomy for `registrar-core`.
//!
//! Every variant belongs to exactly one [`ErrorKind`], and every kind maps to
//! exactly one HTTP status at the API boundary. `Display` is the log-only
//! message; [`Error::user_message`] is what a client is allowed to see.

use thiserror::Error;
use uuid::Uuid;

use crate::{approval::ApprovalStatus, principal::AccessLevel};

/// Coarse classification used by the HTTP layer to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
  Validation,
  Unauthenticated,
  Forbidden,
  NotFound,
  Conflict,
  Transition,
  Fatal,
}

#[derive(Debug, Error)]
pub enum Error {
  // ── Validation ──────────────────────────────────────────────────────────
  #[error("validation failed on {field}: {message}")]
  Validation { field: String, message: String },

  // ── Auth ────────────────────────────────────────────────────────────────
  #[error("authentication failed: {0}")]
  Unauthenticated(String),

  #[error("no acting principal supplied for a user-initiated mutation")]
  AuthorityMissing,

  #[error("access level {required} required, principal has {actual}")]
  Forbidden {
    required: AccessLevel,
    actual:   AccessLevel,
  },

  // ── Not found ───────────────────────────────────────────────────────────
  #[error("{entity} {id} not found")]
  NotFound { entity: &'static str, id: Uuid },

  #[error("related {entity} referenced by {field} not found")]
  RelatedEntityNotFound { entity: String, field: String },

  // ── Conflict ────────────────────────────────────────────────────────────
  #[error("unique violation on {field} = {value:?}")]
  UniqueViolation { field: String, value: String },

  #[error("active dependents block deletion: {}", .labels.join(", "))]
  ArchiveDependency { labels: Vec<String> },

  // ── Transition ──────────────────────────────────────────────────────────
  #[error("{0} is already archived")]
  AlreadyArchived(Uuid),

  #[error("{0} is not archived")]
  NotArchived(Uuid),

  #[error("status of {id} is already {status}")]
  StatusAlreadySet { id: Uuid, status: ApprovalStatus },

  #[error("{0} is not eligible for deletion")]
  Undeletable(Uuid),

  // ── Fatal ───────────────────────────────────────────────────────────────
  #[error("no export gatherer registered for {0}")]
  UnimplementedGatherer(&'static str),

  #[error("export renderer failed: {0}")]
  ExportRenderFailed(String),

  #[error("object store failure: {0}")]
  ObjectStore(String),

  #[error("email to {to} failed to send: {reason}")]
  EmailFailedToSend { to: String, reason: String },

  #[error("storage failure: {0}")]
  Storage(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  /// Shorthand for a field-level validation failure.
  pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
    Self::Validation { field: field.into(), message: message.into() }
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Validation { .. } => ErrorKind::Validation,
      Self::Unauthenticated(_) | Self::AuthorityMissing => ErrorKind::Unauthenticated,
      Self::Forbidden { .. } => ErrorKind::Forbidden,
      Self::NotFound { .. } | Self::RelatedEntityNotFound { .. } => ErrorKind::NotFound,
      Self::UniqueViolation { .. } | Self::ArchiveDependency { .. } => ErrorKind::Conflict,
      Self::AlreadyArchived(_)
      | Self::NotArchived(_)
      | Self::StatusAlreadySet { .. }
      | Self::Undeletable(_) => ErrorKind::Transition,
      Self::UnimplementedGatherer(_)
      | Self::ExportRenderFailed(_)
      | Self::ObjectStore(_)
      | Self::EmailFailedToSend { .. }
      | Self::Storage(_)
      | Self::Serialization(_) => ErrorKind::Fatal,
    }
  }

  /// Message safe to return to a client. Fatal errors never leak internals.
  pub fn user_message(&self) -> String {
    match self {
      Self::Unauthenticated(_) | Self::AuthorityMissing => "authentication required".to_owned(),
      Self::Forbidden { required, .. } => format!("{required} access required"),
      Self::UnimplementedGatherer(entity) => format!("{entity} records cannot be exported"),
      Self::EmailFailedToSend { to, .. } => format!("email to {to} could not be sent"),
      Self::ExportRenderFailed(_)
      | Self::ObjectStore(_)
      | Self::Storage(_)
      | Self::Serialization(_) => "internal server error".to_owned(),
      other => other.to_string(),
    }
  }
}
