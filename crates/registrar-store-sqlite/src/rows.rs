//! Row-level reads and writes shared by every operation.
//!
//! All functions take a plain `&Connection` and are called with the open
//! transaction of the operation they belong to.

use chrono::{DateTime, Utc};
use registrar_core::{
  AccessLevel, Entity, EntityKind, Lifecycle, Principal, Record,
  approval::{ApprovalStatus, Decision, Effect, Workflow},
  entities::{Document, DocumentContent, Staff, StaffType},
  lifecycle::{HEADER_FIELDS, Partition},
  schema::Table,
};
use rusqlite::{Connection, OptionalExtension as _, Transaction, types::Value as Sql};
use serde_json::{Map, Value as Json};
use uuid::Uuid;

use crate::{
  Result,
  encode::{HEADER_COLUMNS, RawRow, encode_body, encode_uuid, header_values, select_list},
  violation::{check_writes, classify_write},
};

/// A decoded row: lifecycle header plus the serde form of the body.
pub struct Row {
  pub header: Lifecycle,
  pub body:   Map<String, Json>,
}

impl Row {
  pub fn into_record<T: Entity>(self) -> Result<Record<T>> {
    Ok(Record { header: self.header, body: serde_json::from_value(Json::Object(self.body))? })
  }
}

/// Run `f` inside a transaction with foreign keys deferred to commit.
///
/// `f` is expected to call [`check_writes`] or
/// [`check_delete`](crate::violation::check_delete) before returning, so a
/// violated reference is reported as a typed error instead of a failed commit.
pub fn in_tx<R>(conn: &mut Connection, f: impl FnOnce(&Transaction<'_>) -> Result<R>) -> Result<R> {
  let tx = conn.transaction()?;
  tx.execute_batch("PRAGMA defer_foreign_keys = ON")?;
  let out = f(&tx)?;
  tx.commit()?;
  Ok(out)
}

pub fn not_found(kind: EntityKind, id: Uuid) -> crate::Error {
  registrar_core::Error::NotFound { entity: kind.label(), id }.into()
}

// ─── Reads ───────────────────────────────────────────────────────────────────

pub fn load(conn: &Connection, table: &'static Table, id: Uuid) -> Result<Option<RawRow>> {
  let sql = format!("SELECT {} FROM {} WHERE id = ?1", select_list(table), table.name);
  Ok(
    conn
      .query_row(&sql, rusqlite::params![encode_uuid(id)], |row| RawRow::from_row(table, row))
      .optional()?,
  )
}

/// Load a row that must exist in `partition`.
pub fn load_in(conn: &Connection, kind: EntityKind, id: Uuid, partition: Partition) -> Result<Row> {
  let raw = load(conn, kind.table(), id)?
    .filter(|raw| raw.is_archived() == partition.is_archived())
    .ok_or_else(|| not_found(kind, id))?;
  let (header, body) = raw.into_parts()?;
  Ok(Row { header, body })
}

pub fn load_many(
  conn: &Connection,
  table: &'static Table,
  sql: &str,
  params: &[Sql],
) -> Result<Vec<RawRow>> {
  let mut stmt = conn.prepare(sql)?;
  let rows = stmt
    .query_map(rusqlite::params_from_iter(params), |row| RawRow::from_row(table, row))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

// ─── Writes ──────────────────────────────────────────────────────────────────

pub fn insert(
  conn: &Connection,
  table: &'static Table,
  header: &Lifecycle,
  values: Vec<Sql>,
  body: &Map<String, Json>,
) -> Result<()> {
  let columns = select_list(table);
  let placeholders =
    (1..=HEADER_COLUMNS.len() + values.len()).map(|i| format!("?{i}")).collect::<Vec<_>>();
  let sql = format!("INSERT INTO {} ({columns}) VALUES ({})", table.name, placeholders.join(", "));
  let params = header_values(header).into_iter().chain(values);
  conn
    .execute(&sql, rusqlite::params_from_iter(params))
    .map_err(|e| classify_write(e, table, body))?;
  Ok(())
}

/// Rewrite every mutable header column.
pub fn write_header(
  conn: &Connection,
  table: &'static Table,
  header: &Lifecycle,
  body: &Map<String, Json>,
) -> Result<()> {
  write(conn, table, header, Vec::new(), body)
}

/// Rewrite the mutable header columns and the whole body.
pub fn write_row(
  conn: &Connection,
  table: &'static Table,
  header: &Lifecycle,
  values: Vec<Sql>,
  body: &Map<String, Json>,
) -> Result<()> {
  write(conn, table, header, values, body)
}

fn write(
  conn: &Connection,
  table: &'static Table,
  header: &Lifecycle,
  values: Vec<Sql>,
  body: &Map<String, Json>,
) -> Result<()> {
  // id, created_at and created_by never change.
  let header_columns = &HEADER_COLUMNS[3..];
  let mut params: Vec<Sql> = header_values(header).into_iter().skip(3).collect();
  let mut assignments: Vec<String> = header_columns.iter().map(|c| c.to_string()).collect();
  if !values.is_empty() {
    assignments.extend(table.columns.iter().map(|c| c.name.to_owned()));
    params.extend(values);
  }
  let set = assignments
    .iter()
    .enumerate()
    .map(|(i, c)| format!("{c} = ?{}", i + 2))
    .collect::<Vec<_>>()
    .join(", ");
  let sql = format!("UPDATE {} SET {set} WHERE id = ?1", table.name);
  let all = std::iter::once(Sql::Text(encode_uuid(header.id))).chain(params);
  conn.execute(&sql, rusqlite::params_from_iter(all)).map_err(|e| classify_write(e, table, body))?;
  Ok(())
}

// ─── Entity operations ───────────────────────────────────────────────────────

pub fn create<T: Entity>(conn: &Connection, header: Lifecycle, body: T) -> Result<Record<T>> {
  let table = T::table();
  let (values, json) = encode_body(table, &body)?;
  insert(conn, table, &header, values, &json)?;
  check_writes(conn, T::KIND)?;
  tracing::debug!(kind = T::KIND.as_ref(), id = %header.id, actor = %header.created_by, "entity created");
  Ok(Record { header, body })
}

/// Reject patch keys that are unknown, part of the header, or locked.
fn check_patchable(table: &Table, key: &str) -> registrar_core::Result<()> {
  if HEADER_FIELDS.contains(&key) || table.locked.contains(&key) {
    return Err(registrar_core::Error::validation(key, "cannot be changed"));
  }
  if table.column(key).is_none() {
    return Err(registrar_core::Error::validation(key, "unknown attribute"));
  }
  Ok(())
}

pub fn update<T: Entity>(
  conn: &Connection,
  id: Uuid,
  actor: Principal,
  patch: Map<String, Json>,
  now: DateTime<Utc>,
) -> Result<Record<T>> {
  let table = T::table();
  for key in patch.keys() {
    check_patchable(table, key)?;
  }

  let Row { mut header, mut body } = load_in(conn, T::KIND, id, Partition::Active)?;
  body.extend(patch);
  let entity: T = serde_json::from_value(Json::Object(body))
    .map_err(|e| registrar_core::Error::validation(table.name, e.to_string()))?;
  entity.validate()?;

  header.touch(actor, now);
  let (values, json) = encode_body(table, &entity)?;
  write_row(conn, table, &header, values, &json)?;
  check_writes(conn, T::KIND)?;
  tracing::debug!(kind = T::KIND.as_ref(), %id, %actor, "entity updated");
  Ok(Record { header, body: entity })
}

pub fn decide<W: Workflow>(
  conn: &Connection,
  id: Uuid,
  actor: Principal,
  decision: Decision,
  now: DateTime<Utc>,
) -> Result<Record<W>> {
  let table = W::table();
  let Row { mut header, body } = load_in(conn, W::KIND, id, Partition::Active)?;
  let mut workflow: W = serde_json::from_value(Json::Object(body))?;

  let status = workflow.approval_mut().decide(id, actor, decision, now)?;
  header.touch(actor, now);
  let (values, json) = encode_body(table, &workflow)?;
  write_row(conn, table, &header, values, &json)?;

  if status == ApprovalStatus::Approved {
    apply_effect(conn, workflow.effect(), actor, now)?;
  }
  check_writes(conn, W::KIND)?;

  tracing::info!(kind = W::KIND.as_ref(), %id, %actor, status = status.as_ref(), "workflow decided");
  Ok(Record { header, body: workflow })
}

/// Point the student at the workflow's target.
fn apply_effect(conn: &Connection, effect: Effect, actor: Principal, now: DateTime<Utc>) -> Result<()> {
  let students = EntityKind::Student.table();
  let Row { mut header, mut body } =
    load_in(conn, EntityKind::Student, effect.student_id, Partition::Active)?;
  body.insert(effect.column.to_owned(), Json::String(encode_uuid(effect.value)));
  header.touch(actor, now);
  let (values, json) = encode_body(students, &body)?;
  write_row(conn, students, &header, values, &json)?;
  tracing::debug!(student = %effect.student_id, column = effect.column, "approval effect applied");
  Ok(())
}

pub fn attach_document(
  conn: &Connection,
  id: Uuid,
  actor: Principal,
  content: DocumentContent,
  now: DateTime<Utc>,
) -> Result<Record<Document>> {
  let table = Document::table();
  let Row { mut header, body } = load_in(conn, EntityKind::Document, id, Partition::Active)?;
  let mut document: Document = serde_json::from_value(Json::Object(body))?;
  document.attach(content);
  header.touch(actor, now);
  let (values, json) = encode_body(table, &document)?;
  write_row(conn, table, &header, values, &json)?;
  check_writes(conn, EntityKind::Document)?;
  Ok(Record { header, body: document })
}

pub fn grant_access(
  conn: &Connection,
  id: Uuid,
  actor: Principal,
  level: AccessLevel,
  now: DateTime<Utc>,
) -> Result<Record<Staff>> {
  let table = Staff::table();
  let Row { mut header, body } = load_in(conn, EntityKind::Staff, id, Partition::Active)?;
  let mut staff: Staff = serde_json::from_value(Json::Object(body))?;
  if staff.staff_type == StaffType::System {
    return Err(registrar_core::Error::validation("staff_type", "system staff is reserved").into());
  }
  staff.access_level = level;
  header.touch(actor, now);
  let (values, json) = encode_body(table, &staff)?;
  write_row(conn, table, &header, values, &json)?;
  check_writes(conn, EntityKind::Staff)?;
  tracing::info!(%id, %actor, level = level.as_ref(), "access level changed");
  Ok(Record { header, body: staff })
}
