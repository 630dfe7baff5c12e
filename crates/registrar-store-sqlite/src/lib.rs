//! SQLite backend for the Registrar store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every mutation runs in one transaction
//! with foreign keys deferred to commit, so constraint violations can be
//! inspected and translated before anything is written.

mod credentials;
mod encode;
mod engine;
mod planner;
mod rows;
mod schema;
mod seed;
mod store;
mod violation;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
