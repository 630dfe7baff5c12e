//! SQL schema for the Registrar SQLite store, generated from the entity
//! declarations in `registrar-core`.
//!
//! Every foreign key is a named column constraint `fk_{table}_{column}`.
//! Restricting references are `NO ACTION` rather than `RESTRICT` so that they
//! honour `PRAGMA defer_foreign_keys` and are reported by
//! `PRAGMA foreign_key_check` instead of failing the statement.

use registrar_core::{
  EntityKind,
  resolver::constraint_name,
  schema::{Column, ColumnType, OnDelete, Table, Unique},
};

/// Connection-level settings, applied before the tables.
const PRELUDE: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
";

const CREDENTIALS: &str = "
CREATE TABLE IF NOT EXISTS credentials (
    staff_id      TEXT PRIMARY KEY NOT NULL
                  CONSTRAINT fk_credentials_staff_id REFERENCES staff(id) ON DELETE CASCADE,
    password_hash TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);
";

const SCHEMA_VERSION: u32 = 1;

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub fn schema() -> String {
  let mut sql = String::from(PRELUDE);
  for kind in EntityKind::all() {
    sql.push_str(&create_table(kind.table()));
    sql.push_str(&create_indexes(kind.table()));
  }
  sql.push_str(CREDENTIALS);
  sql.push_str(&format!("PRAGMA user_version = {SCHEMA_VERSION};\n"));
  sql
}

fn sql_type(ty: ColumnType) -> &'static str {
  match ty {
    ColumnType::Integer | ColumnType::Bool => "INTEGER",
    ColumnType::Real => "REAL",
    ColumnType::Text | ColumnType::Uuid | ColumnType::Date | ColumnType::Timestamp => "TEXT",
  }
}

fn on_delete(action: OnDelete) -> &'static str {
  match action {
    OnDelete::Restrict => "NO ACTION",
    OnDelete::Cascade => "CASCADE",
    OnDelete::SetNull => "SET NULL",
  }
}

fn audit_reference(table: &str, column: &str) -> String {
  format!("CONSTRAINT {} REFERENCES staff(id) ON DELETE NO ACTION", constraint_name(table, column))
}

fn column_def(table: &Table, column: &Column) -> String {
  let mut def = format!("{} {}", column.name, sql_type(column.ty));
  if !column.nullable {
    def.push_str(" NOT NULL");
  }
  if let Some(reference) = column.reference {
    def.push_str(&format!(
      " CONSTRAINT {} REFERENCES {}(id) ON DELETE {}",
      constraint_name(table.name, column.name),
      reference.parent.table().name,
      on_delete(reference.on_delete),
    ));
  }
  def
}

pub fn create_table(table: &Table) -> String {
  let t = table.name;
  let mut lines = vec![
    "id               TEXT PRIMARY KEY NOT NULL".to_owned(),
    "created_at       TEXT NOT NULL".to_owned(),
    format!("created_by       TEXT NOT NULL {}", audit_reference(t, "created_by")),
    "last_modified_at TEXT NOT NULL".to_owned(),
    format!("last_modified_by TEXT NOT NULL {}", audit_reference(t, "last_modified_by")),
    "is_archived      INTEGER NOT NULL DEFAULT 0".to_owned(),
    "archived_at      TEXT".to_owned(),
    format!("archived_by      TEXT {}", audit_reference(t, "archived_by")),
    "archive_reason   TEXT".to_owned(),
    "is_exported      INTEGER NOT NULL DEFAULT 0".to_owned(),
  ];
  lines.extend(table.columns.iter().map(|c| column_def(table, c)));
  lines.push(
    "CHECK ((is_archived = 1 AND archived_at IS NOT NULL AND archived_by IS NOT NULL \
     AND archive_reason IS NOT NULL) OR (is_archived = 0 AND archived_at IS NULL \
     AND archived_by IS NULL AND archive_reason IS NULL))"
      .to_owned(),
  );
  lines.push("CHECK (last_modified_at >= created_at)".to_owned());

  format!("\nCREATE TABLE IF NOT EXISTS {t} (\n    {}\n);\n", lines.join(",\n    "))
}

pub fn create_indexes(table: &Table) -> String {
  let t = table.name;
  let mut sql = format!(
    "CREATE INDEX IF NOT EXISTS ix_{t}_listing ON {t}(is_archived, created_at, id);\n"
  );
  for column in table.columns {
    let c = column.name;
    let key = if column.fold_case { format!("{c} COLLATE NOCASE") } else { c.to_owned() };
    match column.unique {
      Unique::Global => {
        sql.push_str(&format!("CREATE UNIQUE INDEX IF NOT EXISTS ux_{t}_{c} ON {t}({key});\n"));
      }
      Unique::ActiveOnly => sql.push_str(&format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS ux_{t}_{c} ON {t}({key}) WHERE is_archived = 0;\n"
      )),
      Unique::No if column.reference.is_some() => {
        sql.push_str(&format!("CREATE INDEX IF NOT EXISTS ix_{t}_{c} ON {t}({c});\n"));
      }
      Unique::No => {}
    }
  }
  sql
}
