//! Error types for the export collaborators.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid object key: {0}")]
  InvalidKey(String),

  #[error("object {0} not found")]
  NotFound(String),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("XML error: {0}")]
  Xml(String),

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("mail to {to} rejected: {reason}")]
  Mail { to: String, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for registrar_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Xml(_) | Error::Json(_) => Self::ExportRenderFailed(e.to_string()),
      Error::Mail { to, reason } => Self::EmailFailedToSend { to, reason },
      other => Self::ObjectStore(other.to_string()),
    }
  }
}
