//! Error type for `registrar-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] registrar_core::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("database connection error: {0}")]
  Connection(String),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored value did not have the type its column declares.
  #[error("cannot decode {table}.{column}: {message}")]
  Decode {
    table:   &'static str,
    column:  &'static str,
    message: String,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  /// Carry this error out of a `Connection::call` closure.
  pub(crate) fn into_call(self) -> tokio_rusqlite::Error {
    match self {
      Self::Sqlite(e) => tokio_rusqlite::Error::Rusqlite(e),
      other => tokio_rusqlite::Error::Other(Box::new(other)),
    }
  }
}

impl From<tokio_rusqlite::Error> for Error {
  fn from(e: tokio_rusqlite::Error) -> Self {
    match e {
      tokio_rusqlite::Error::Rusqlite(e) => Self::Sqlite(e),
      tokio_rusqlite::Error::Other(inner) => match inner.downcast::<Error>() {
        Ok(ours) => *ours,
        Err(other) => Self::Connection(other.to_string()),
      },
      other => Self::Connection(other.to_string()),
    }
  }
}

impl From<Error> for registrar_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(core) => core,
      Error::Json(json) => Self::Serialization(json),
      other => Self::Storage(other.to_string()),
    }
  }
}
