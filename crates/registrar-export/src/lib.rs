//! Concrete export collaborators for Registrar.
//!
//! - [`ArtifactRenderer`] turns gathered export data into JSON or XML bytes.
//! - [`LocalObjectStore`] keeps artifacts and uploaded documents on the local
//!   filesystem and signs time-limited download URLs.
//! - [`MagicProbe`] sniffs a content type from leading bytes.
//! - [`LogMailer`] records outbound mail in the log instead of sending it.
//!
//! Each implements the matching trait from `registrar_core::collaborators`.

pub mod error;
mod mail;
mod objects;
mod probe;
mod render;

pub use error::{Error, Result};
pub use mail::LogMailer;
pub use objects::{LocalObjectStore, verify_signature};
pub use probe::MagicProbe;
pub use render::ArtifactRenderer;
