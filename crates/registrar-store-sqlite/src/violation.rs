//! Classification of constraint violations raised by SQLite.
//!
//! Unique violations surface immediately as a failed statement and are
//! recognised by their extended result code. Foreign keys are deferred for
//! the whole transaction, so violations are collected with
//! `PRAGMA foreign_key_check` before commit and handed to the resolver under
//! the synthesised name `fk_{table}_{column}`.

use registrar_core::{EntityKind, resolver::constraint_name, resolver::resolver, schema::Table};
use rusqlite::{Connection, ffi};
use serde_json::{Map, Value as Json};

use crate::{Error, Result};

/// Turn a failed write into a typed `UniqueViolation` where it is one.
pub fn classify_write(err: rusqlite::Error, table: &Table, body: &Map<String, Json>) -> Error {
  if let rusqlite::Error::SqliteFailure(code, Some(message)) = &err {
    if code.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
      || code.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    {
      let field = unique_field(message).unwrap_or("id");
      tracing::debug!(table = table.name, field, "unique constraint violated");
      let value = match body.get(field) {
        Some(Json::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
      };
      return registrar_core::Error::UniqueViolation { field: field.to_owned(), value }.into();
    }
  }
  Error::Sqlite(err)
}

/// `UNIQUE constraint failed: subjects.code` → `code`.
fn unique_field(message: &str) -> Option<&str> {
  let (_, columns) = message.split_once("failed: ")?;
  let first = columns.split(", ").next()?;
  first.split_once('.').map(|(_, column)| column)
}

/// Names of every foreign key currently violated, in report order.
pub fn foreign_key_violations(conn: &Connection) -> Result<Vec<String>> {
  let mut stmt = conn.prepare("PRAGMA foreign_key_check")?;
  let reports = stmt
    .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(3)?)))?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut names = Vec::new();
  for (table, fk_index) in reports {
    let column: String = conn.query_row(
      "SELECT \"from\" FROM pragma_foreign_key_list(?1) WHERE id = ?2",
      rusqlite::params![table, fk_index],
      |row| row.get(0),
    )?;
    let name = constraint_name(&table, &column);
    if !names.contains(&name) {
      names.push(name);
    }
  }
  Ok(names)
}

/// After an insert or update: a dangling reference means the related entity
/// does not exist.
pub fn check_writes(conn: &Connection, scope: EntityKind) -> Result<()> {
  match foreign_key_violations(conn)?.first() {
    Some(name) => Err(resolver().resolve(scope, name).into_write_error().into()),
    None => Ok(()),
  }
}

/// After a delete: a dangling reference names a dependent that still points
/// at the deleted row.
pub fn check_delete(conn: &Connection, scope: EntityKind) -> Result<()> {
  let mut labels: Vec<String> = Vec::new();
  for name in foreign_key_violations(conn)? {
    let label = resolver().resolve(scope, &name).dependency_label();
    if !labels.contains(&label) {
      labels.push(label);
    }
  }
  if labels.is_empty() {
    Ok(())
  } else {
    Err(registrar_core::Error::ArchiveDependency { labels }.into())
  }
}
