//! Contracts for the capabilities injected from outside the lifecycle engine.
//!
//! Rendering is pure and synchronous. Storage and mail are async and used as
//! trait objects, so they go through `async_trait`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;

use crate::Result;

// ─── Renderer ────────────────────────────────────────────────────────────────

/// Artifact encodings the renderer must support.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExportFormat {
  #[default]
  Json,
  Xml,
}

impl ExportFormat {
  pub fn extension(self) -> &'static str {
    match self {
      Self::Json => "json",
      Self::Xml => "xml",
    }
  }

  pub fn content_type(self) -> &'static str {
    match self {
      Self::Json => "application/json",
      Self::Xml => "application/xml",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
  pub bytes:    Bytes,
  /// `filename` with the format's extension applied.
  pub filename: String,
}

/// Turns gathered export data into artifact bytes.
pub trait ExportRenderer: Send + Sync {
  fn render(
    &self,
    data: &serde_json::Value,
    filename: &str,
    format: ExportFormat,
  ) -> Result<Rendered>;
}

// ─── Object store ────────────────────────────────────────────────────────────

/// Durable blob storage under deterministic keys.
#[async_trait]
pub trait ObjectStore: Send + Sync {
  /// Write `bytes` at `key`, replacing any previous object. Returns the
  /// location the object can be addressed by.
  async fn put(&self, key: &str, bytes: Bytes) -> Result<String>;

  async fn delete(&self, key: &str) -> Result<()>;

  /// A time-limited URL granting read access to `key`.
  async fn presigned_url(&self, key: &str, ttl: Duration) -> Result<String>;
}

// ─── Mailer ──────────────────────────────────────────────────────────────────

/// Outbound mail. Failures surface as `Error::EmailFailedToSend`.
#[async_trait]
pub trait Mailer: Send + Sync {
  async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

// ─── Mime probe ──────────────────────────────────────────────────────────────

/// Content-type detection from the leading bytes of a buffer.
pub trait MimeProbe: Send + Sync {
  fn probe(&self, head: &[u8]) -> &'static str;
}

/// How many leading bytes a probe is given.
pub const PROBE_WINDOW: usize = 4096;
