//! The archival engine: archive, restore, dependency-gated hard delete, the
//! orphan sweep and export finalisation.
//!
//! Each function runs against the caller's open transaction and leaves the
//! rows it touched consistent with the lifecycle invariants; the caller
//! commits.

use chrono::{DateTime, Utc};
use registrar_core::{
  ArchiveReason, EntityKind, Principal,
  export::Then,
  graph::graph,
  lifecycle::Partition,
  schema::DELETION_GUARD,
};
use rusqlite::Connection;
use serde_json::Value as Json;
use uuid::Uuid;

use crate::{
  Result,
  encode::{decode_uuid, encode_dt, encode_uuid},
  rows::{Row, load, load_in, not_found, write_header},
  violation::check_delete,
};

// ─── Archive and restore ─────────────────────────────────────────────────────

/// `Active → Archived`. Archiving an archived row is a transition error.
pub fn archive(
  conn: &Connection,
  kind: EntityKind,
  id: Uuid,
  actor: Principal,
  reason: ArchiveReason,
  now: DateTime<Utc>,
) -> Result<Row> {
  let (mut header, body) =
    load(conn, kind.table(), id)?.ok_or_else(|| not_found(kind, id))?.into_parts()?;
  header.archive(actor, reason, now)?;
  write_header(conn, kind.table(), &header, &body)?;
  tracing::info!(kind = kind.as_ref(), %id, %actor, reason = reason.as_ref(), "entity archived");
  Ok(Row { header, body })
}

/// `Archived → Active`. Does not cascade: dependents archived with the
/// entity stay archived.
pub fn restore(
  conn: &Connection,
  kind: EntityKind,
  id: Uuid,
  actor: Principal,
  now: DateTime<Utc>,
) -> Result<Row> {
  let Row { mut header, body } = match load_in(conn, kind, id, Partition::Archived) {
    Ok(row) => row,
    // Active rows get the transition error rather than NotFound.
    Err(e) => match load_in(conn, kind, id, Partition::Active) {
      Ok(_) => return Err(registrar_core::Error::NotArchived(id).into()),
      Err(_) => return Err(e),
    },
  };
  header.restore(actor, now)?;
  // An active-only unique value may have been reused meanwhile.
  write_header(conn, kind.table(), &header, &body)?;
  tracing::info!(kind = kind.as_ref(), %id, %actor, "entity restored");
  Ok(Row { header, body })
}

// ─── Hard delete ─────────────────────────────────────────────────────────────

/// Labels of every dependency with at least one active row pointing at `id`.
pub fn active_dependents(conn: &Connection, parent: EntityKind, id: Uuid) -> Result<Vec<String>> {
  let mut labels: Vec<String> = Vec::new();
  for dep in graph().dependents(parent) {
    let sql = format!(
      "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1 AND is_archived = 0)",
      dep.child.table().name,
      dep.fk,
    );
    let found: bool = conn.query_row(&sql, rusqlite::params![encode_uuid(id)], |r| r.get(0))?;
    if found && !labels.contains(&dep.label) {
      labels.push(dep.label.clone());
    }
  }
  Ok(labels)
}

/// Clear nullable references to `id` held by archived dependents, stamping
/// each as modified by `actor`.
fn detach_archived(
  conn: &Connection,
  parent: EntityKind,
  id: Uuid,
  actor: Principal,
  now: DateTime<Utc>,
) -> Result<()> {
  for dep in graph().dependents(parent).iter().filter(|d| d.nullable) {
    let sql = format!(
      "UPDATE {child} SET {fk} = NULL, last_modified_at = MAX(last_modified_at, ?2), \
       last_modified_by = ?3 WHERE {fk} = ?1 AND is_archived = 1",
      child = dep.child.table().name,
      fk = dep.fk,
    );
    let detached = conn.execute(
      &sql,
      rusqlite::params![encode_uuid(id), encode_dt(now), encode_uuid(actor.id())],
    )?;
    if detached > 0 {
      tracing::debug!(child = dep.child.as_ref(), fk = dep.fk, detached, "archived dependents detached");
    }
  }
  Ok(())
}

/// Remove `id` from `partition` of `kind` for good.
///
/// Refused when the row's deletion guard is off, or when any active row
/// still depends on it. Archived dependents with an optional reference are
/// detached; any other reference left dangling aborts the delete.
pub fn hard_delete(
  conn: &Connection,
  kind: EntityKind,
  id: Uuid,
  actor: Principal,
  now: DateTime<Utc>,
  partition: Partition,
) -> Result<()> {
  let table = kind.table();
  let Row { body, .. } = load_in(conn, kind, id, partition)?;
  if body.get(DELETION_GUARD) == Some(&Json::Bool(false)) {
    return Err(registrar_core::Error::Undeletable(id).into());
  }

  let labels = active_dependents(conn, kind, id)?;
  if !labels.is_empty() {
    tracing::debug!(kind = kind.as_ref(), %id, ?labels, "deletion blocked by active dependents");
    return Err(registrar_core::Error::ArchiveDependency { labels }.into());
  }

  detach_archived(conn, kind, id, actor, now)?;
  conn.execute(
    &format!("DELETE FROM {} WHERE id = ?1", table.name),
    rusqlite::params![encode_uuid(id)],
  )?;
  check_delete(conn, kind)?;

  tracing::info!(kind = kind.as_ref(), %id, %actor, "entity deleted");
  Ok(())
}

// ─── Orphan sweep ────────────────────────────────────────────────────────────

/// `WHERE` fragment over alias `p` matching parents that had children under
/// the kind's orphan rules but have no active one left.
fn orphan_predicate(kind: EntityKind) -> Option<String> {
  let rules = kind.table().orphan_rule;
  if rules.is_empty() {
    return None;
  }
  let none_active = rules
    .iter()
    .map(|r| {
      format!(
        "NOT EXISTS (SELECT 1 FROM {} c WHERE c.{} = p.id AND c.is_archived = 0)",
        r.child.table().name,
        r.fk
      )
    })
    .collect::<Vec<_>>()
    .join(" AND ");
  let any_child = rules
    .iter()
    .map(|r| format!("EXISTS (SELECT 1 FROM {} c WHERE c.{} = p.id)", r.child.table().name, r.fk))
    .collect::<Vec<_>>()
    .join(" OR ");
  Some(format!("{none_active} AND ({any_child})"))
}

fn require_orphan_rule(kind: EntityKind) -> Result<String> {
  orphan_predicate(kind).ok_or_else(|| {
    registrar_core::Error::validation("kind", format!("{kind} has no orphan rule")).into()
  })
}

/// Active `kind` rows that are orphaned right now, oldest first.
pub fn orphan_candidates(conn: &Connection, kind: EntityKind) -> Result<Vec<Uuid>> {
  let predicate = require_orphan_rule(kind)?;
  let sql = format!(
    "SELECT p.id FROM {} p WHERE p.is_archived = 0 AND {predicate} ORDER BY p.created_at, p.id",
    kind.table().name
  );
  let mut stmt = conn.prepare(&sql)?;
  let ids = stmt
    .query_map([], |row| row.get::<_, String>(0))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  ids.iter().map(|s| decode_uuid(s)).collect()
}

/// Archive one candidate if it is still orphaned. Returns whether it was.
pub fn sweep_one(
  conn: &Connection,
  kind: EntityKind,
  id: Uuid,
  actor: Principal,
  reason: ArchiveReason,
  now: DateTime<Utc>,
) -> Result<bool> {
  let predicate = require_orphan_rule(kind)?;
  let sql = format!(
    "SELECT EXISTS(SELECT 1 FROM {} p WHERE p.id = ?1 AND p.is_archived = 0 AND {predicate})",
    kind.table().name
  );
  let still: bool = conn.query_row(&sql, rusqlite::params![encode_uuid(id)], |r| r.get(0))?;
  if !still {
    return Ok(false);
  }
  archive(conn, kind, id, actor, reason, now)?;
  Ok(true)
}

// ─── Export ──────────────────────────────────────────────────────────────────

/// Flag an active entity as exported, then archive or delete it.
pub fn finalize_export(
  conn: &Connection,
  kind: EntityKind,
  id: Uuid,
  actor: Principal,
  then: Then,
  now: DateTime<Utc>,
) -> Result<()> {
  let table = kind.table();
  let Row { mut header, body } = load_in(conn, kind, id, Partition::Active)?;
  header.mark_exported(actor, now);
  write_header(conn, table, &header, &body)?;

  match then {
    Then::Archive => {
      header.archive(actor, ArchiveReason::Administrative, now)?;
      write_header(conn, table, &header, &body)?;
      tracing::info!(kind = kind.as_ref(), %id, %actor, "exported entity archived");
    }
    Then::Delete => hard_delete(conn, kind, id, actor, now, Partition::Active)?,
  }
  Ok(())
}
