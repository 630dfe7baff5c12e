//! Core types and trait definitions for the Registrar school-records store.
//!
//! This crate is deliberately free of HTTP and database dependencies. It
//! holds the lifecycle contract every managed entity obeys (audit stamping,
//! archive, restore, dependency-gated hard delete), the declarative schema
//! the storage backends are generated from, and the contracts of the
//! external collaborators (renderer, object store, mailer, mime probe).

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod approval;
pub mod clock;
pub mod collaborators;
pub mod entities;
pub mod error;
pub mod export;
pub mod graph;
pub mod lifecycle;
pub mod principal;
pub mod query;
pub mod repository;
pub mod resolver;
pub mod schema;
pub mod validate;

pub use error::{Error, ErrorKind, Result};
pub use lifecycle::{ArchiveReason, Lifecycle, Record};
pub use principal::{AccessLevel, Principal};
pub use schema::{Entity, EntityKind};
