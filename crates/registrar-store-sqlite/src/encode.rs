//! Encoding and decoding between domain types and SQLite column values.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`),
//! so text order is chronological order. UUIDs are stored as hyphenated
//! lowercase strings and booleans as `0`/`1`. Entity bodies go through their
//! serde form: each declared column is one key of the serialised object.

use chrono::{DateTime, SecondsFormat, Utc};
use registrar_core::{
  ArchiveReason, Entity, Lifecycle, Principal, Record,
  lifecycle::ArchiveStamp,
  schema::{Column, ColumnType, Table},
};
use rusqlite::types::Value as Sql;
use serde::Serialize;
use serde_json::{Map, Number, Value as Json};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Header ──────────────────────────────────────────────────────────────────

/// Header columns, in the order every `SELECT` and `INSERT` lists them.
pub const HEADER_COLUMNS: &[&str] = &[
  "id",
  "created_at",
  "created_by",
  "last_modified_at",
  "last_modified_by",
  "is_archived",
  "archived_at",
  "archived_by",
  "archive_reason",
  "is_exported",
];

/// `id, created_at, …, <body columns>` for `table`.
pub fn select_list(table: &Table) -> String {
  HEADER_COLUMNS
    .iter()
    .copied()
    .chain(table.columns.iter().map(|c| c.name))
    .collect::<Vec<_>>()
    .join(", ")
}

/// Header values in [`HEADER_COLUMNS`] order.
pub fn header_values(h: &Lifecycle) -> Vec<Sql> {
  let archive = h.archive.as_ref();
  vec![
    Sql::Text(encode_uuid(h.id)),
    Sql::Text(encode_dt(h.created_at)),
    Sql::Text(encode_uuid(h.created_by.id())),
    Sql::Text(encode_dt(h.last_modified_at)),
    Sql::Text(encode_uuid(h.last_modified_by.id())),
    Sql::Integer(i64::from(h.is_archived())),
    archive.map_or(Sql::Null, |a| Sql::Text(encode_dt(a.at))),
    archive.map_or(Sql::Null, |a| Sql::Text(encode_uuid(a.by.id()))),
    archive.map_or(Sql::Null, |a| Sql::Text(a.reason.as_ref().to_owned())),
    Sql::Integer(i64::from(h.is_exported)),
  ]
}

/// Raw strings read directly from the header columns of a row.
pub struct RawHeader {
  pub id:               String,
  pub created_at:       String,
  pub created_by:       String,
  pub last_modified_at: String,
  pub last_modified_by: String,
  pub is_archived:      bool,
  pub archived_at:      Option<String>,
  pub archived_by:      Option<String>,
  pub archive_reason:   Option<String>,
  pub is_exported:      bool,
}

impl RawHeader {
  fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:               row.get(0)?,
      created_at:       row.get(1)?,
      created_by:       row.get(2)?,
      last_modified_at: row.get(3)?,
      last_modified_by: row.get(4)?,
      is_archived:      row.get(5)?,
      archived_at:      row.get(6)?,
      archived_by:      row.get(7)?,
      archive_reason:   row.get(8)?,
      is_exported:      row.get(9)?,
    })
  }

  pub fn into_header(self, table: &'static str) -> Result<Lifecycle> {
    let archive = match (self.archived_at, self.archived_by, self.archive_reason) {
      (Some(at), Some(by), Some(reason)) => Some(ArchiveStamp {
        at:     decode_dt(&at)?,
        by:     Principal(decode_uuid(&by)?),
        reason: reason.parse::<ArchiveReason>().map_err(|e| Error::Decode {
          table,
          column: "archive_reason",
          message: e.to_string(),
        })?,
      }),
      _ => None,
    };
    if archive.is_some() != self.is_archived {
      return Err(Error::Decode {
        table,
        column: "is_archived",
        message: "archive stamp is incomplete".to_owned(),
      });
    }

    Ok(Lifecycle {
      id: decode_uuid(&self.id)?,
      created_at: decode_dt(&self.created_at)?,
      created_by: Principal(decode_uuid(&self.created_by)?),
      last_modified_at: decode_dt(&self.last_modified_at)?,
      last_modified_by: Principal(decode_uuid(&self.last_modified_by)?),
      archive,
      is_exported: self.is_exported,
    })
  }
}

/// One stored row, read with [`select_list`].
pub struct RawRow {
  pub table:  &'static Table,
  pub header: RawHeader,
  pub body:   Vec<Sql>,
}

impl RawRow {
  pub fn from_row(table: &'static Table, row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    let header = RawHeader::from_row(row)?;
    let body = (0..table.columns.len())
      .map(|i| row.get::<_, Sql>(HEADER_COLUMNS.len() + i))
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(Self { table, header, body })
  }

  pub fn is_archived(&self) -> bool { self.header.is_archived }

  pub fn into_parts(self) -> Result<(Lifecycle, Map<String, Json>)> {
    let header = self.header.into_header(self.table.name)?;
    let body = body_json(self.table, self.body)?;
    Ok((header, body))
  }

  pub fn into_record<T: Entity>(self) -> Result<Record<T>> {
    let (header, body) = self.into_parts()?;
    Ok(Record { header, body: serde_json::from_value(Json::Object(body))? })
  }

  /// Header and body as one flat JSON object.
  pub fn into_json(self) -> Result<Json> {
    let (header, body) = self.into_parts()?;
    Ok(flatten(&header, body)?)
  }
}

pub fn flatten(header: &Lifecycle, body: Map<String, Json>) -> serde_json::Result<Json> {
  let mut object = match serde_json::to_value(header)? {
    Json::Object(map) => map,
    _ => Map::new(),
  };
  object.extend(body);
  Ok(Json::Object(object))
}

// ─── Body ────────────────────────────────────────────────────────────────────

/// Serialise `body` to its column values, in declaration order. The JSON
/// object is returned too, for error reporting.
pub fn encode_body<T: Serialize>(
  table: &'static Table,
  body: &T,
) -> Result<(Vec<Sql>, Map<String, Json>)> {
  let map = match serde_json::to_value(body)? {
    Json::Object(map) => map,
    other => {
      return Err(Error::Decode {
        table:   table.name,
        column:  "*",
        message: format!("body serialised to {other}, not an object"),
      });
    }
  };
  let values = table
    .columns
    .iter()
    .map(|c| to_sql(table, c, map.get(c.name)))
    .collect::<Result<Vec<_>>>()?;
  Ok((values, map))
}

/// Rebuild the serde form of a body from its column values. Nulls are left
/// out so optional fields fall back to their defaults.
pub fn body_json(table: &'static Table, values: Vec<Sql>) -> Result<Map<String, Json>> {
  let mut map = Map::new();
  for (column, value) in table.columns.iter().zip(values) {
    if let Some(json) = to_json(table, column, value)? {
      map.insert(column.name.to_owned(), json);
    }
  }
  Ok(map)
}

fn to_sql(table: &'static Table, column: &'static Column, value: Option<&Json>) -> Result<Sql> {
  let mismatch = |found: &Json| Error::Decode {
    table:   table.name,
    column:  column.name,
    message: format!("expected {:?}, found {found}", column.ty),
  };
  let Some(value) = value.filter(|v| !v.is_null()) else {
    if column.nullable {
      return Ok(Sql::Null);
    }
    return Err(registrar_core::Error::validation(column.name, "is required").into());
  };
  match (column.ty, value) {
    (ColumnType::Timestamp, Json::String(s)) => Ok(Sql::Text(encode_dt(decode_dt(s)?))),
    (ColumnType::Text | ColumnType::Uuid | ColumnType::Date, Json::String(s)) => {
      Ok(Sql::Text(s.clone()))
    }
    (ColumnType::Integer, Json::Number(n)) => n.as_i64().map(Sql::Integer).ok_or_else(|| mismatch(value)),
    (ColumnType::Real, Json::Number(n)) => n.as_f64().map(Sql::Real).ok_or_else(|| mismatch(value)),
    (ColumnType::Bool, Json::Bool(b)) => Ok(Sql::Integer(i64::from(*b))),
    _ => Err(mismatch(value)),
  }
}

fn to_json(table: &'static Table, column: &'static Column, value: Sql) -> Result<Option<Json>> {
  let mismatch = |found: &Sql| Error::Decode {
    table:   table.name,
    column:  column.name,
    message: format!("expected {:?}, found {found:?}", column.ty),
  };
  Ok(match (column.ty, value) {
    (_, Sql::Null) => None,
    (ColumnType::Bool, Sql::Integer(i)) => Some(Json::Bool(i != 0)),
    (ColumnType::Integer, Sql::Integer(i)) => Some(Json::from(i)),
    (ColumnType::Real, Sql::Integer(i)) => Some(Json::from(i as f64)),
    (ColumnType::Real, Sql::Real(f)) => {
      Some(Number::from_f64(f).map(Json::Number).ok_or_else(|| mismatch(&Sql::Real(f)))?)
    }
    (
      ColumnType::Text | ColumnType::Uuid | ColumnType::Date | ColumnType::Timestamp,
      Sql::Text(s),
    ) => Some(Json::String(s)),
    (_, other) => return Err(mismatch(&other)),
  })
}
