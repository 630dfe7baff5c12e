//! The filter envelope shared by every list endpoint.
//!
//! [`ListQuery::from_params`] validates raw query-string parameters against an
//! entity's declared whitelists, so a backend only ever sees attribute names
//! that exist on the table.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::{
  Error, Record, Result,
  schema::{Column, ColumnType, Table},
};

pub const DEFAULT_LIMIT: u32 = 50;
pub const MAX_LIMIT: u32 = 100;
pub const DEFAULT_ORDER_BY: &str = "created_at";

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, strum::EnumString, strum::AsRefStr, strum::Display,
)]
#[strum(serialize_all = "lowercase")]
pub enum OrderDir {
  Asc,
  #[default]
  Desc,
}

/// A typed equality-filter operand.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
  Text(String),
  Integer(i64),
  Real(f64),
  Bool(bool),
}

/// `column = value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
  pub column: &'static Column,
  pub value:  FilterValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
  pub limit:     u32,
  pub offset:    u32,
  pub order_by:  &'static str,
  pub order_dir: OrderDir,
  /// Case-insensitive substring searched across the caller's search fields.
  pub text:      Option<String>,
  pub filters:   Vec<Filter>,
}

impl Default for ListQuery {
  fn default() -> Self {
    Self {
      limit:     DEFAULT_LIMIT,
      offset:    0,
      order_by:  DEFAULT_ORDER_BY,
      order_dir: OrderDir::Desc,
      text:      None,
      filters:   Vec::new(),
    }
  }
}

const RESERVED: &[&str] = &["limit", "offset", "order_by", "order_dir", "q"];

impl ListQuery {
  /// Parse and validate query-string parameters for `table`.
  ///
  /// Unknown parameters are rejected rather than ignored. Empty values are
  /// treated as absent.
  pub fn from_params(table: &'static Table, params: &HashMap<String, String>) -> Result<Self> {
    let mut query = Self::default();
    let present = |key: &str| params.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

    if let Some(limit) = present("limit") {
      query.limit = limit
        .parse()
        .ok()
        .filter(|l| (1..=MAX_LIMIT).contains(l))
        .ok_or_else(|| Error::validation("limit", format!("must be between 1 and {MAX_LIMIT}")))?;
    }
    if let Some(offset) = present("offset") {
      query.offset =
        offset.parse().map_err(|_| Error::validation("offset", "must be a non-negative integer"))?;
    }
    if let Some(order_by) = present("order_by") {
      query.order_by = crate::schema::HEADER_ORDERABLE
        .iter()
        .chain(table.orderable)
        .find(|attr| **attr == order_by)
        .copied()
        .ok_or_else(|| Error::validation("order_by", format!("cannot order by {order_by}")))?;
    }
    if let Some(dir) = present("order_dir") {
      query.order_dir =
        dir.parse().map_err(|_| Error::validation("order_dir", "must be asc or desc"))?;
    }
    query.text = present("q").map(str::to_owned);

    let mut keys: Vec<&String> = params.keys().filter(|k| !RESERVED.contains(&k.as_str())).collect();
    keys.sort();
    for key in keys {
      let Some(raw) = present(key.as_str()) else { continue };
      let column = table
        .filterable
        .contains(&key.as_str())
        .then(|| table.column(key))
        .flatten()
        .ok_or_else(|| Error::validation(key.as_str(), "is not a filterable attribute"))?;
      query.filters.push(Filter { column, value: parse_operand(column, raw)? });
    }

    Ok(query)
  }

  pub fn with_filter(mut self, column: &'static Column, value: FilterValue) -> Self {
    self.filters.push(Filter { column, value });
    self
  }
}

fn parse_operand(column: &Column, raw: &str) -> Result<FilterValue> {
  let bad = |what: &str| Error::validation(column.name, format!("must be {what}"));
  Ok(match column.ty {
    ColumnType::Text | ColumnType::Timestamp => FilterValue::Text(raw.to_owned()),
    ColumnType::Uuid => {
      FilterValue::Text(Uuid::parse_str(raw).map_err(|_| bad("a UUID"))?.to_string())
    }
    ColumnType::Date => FilterValue::Text(
      NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| bad("a YYYY-MM-DD date"))?.to_string(),
    ),
    ColumnType::Integer => FilterValue::Integer(raw.parse().map_err(|_| bad("an integer"))?),
    ColumnType::Real => FilterValue::Real(raw.parse().map_err(|_| bad("a number"))?),
    ColumnType::Bool => FilterValue::Bool(raw.parse().map_err(|_| bad("true or false"))?),
  })
}

/// Validate caller-declared search fields against `table`.
pub fn search_fields(table: &Table, fields: &[&str]) -> Result<Vec<&'static str>> {
  fields
    .iter()
    .map(|f| {
      table
        .searchable
        .iter()
        .find(|s| **s == *f)
        .copied()
        .ok_or_else(|| Error::validation("search_fields", format!("{f} is not searchable")))
    })
    .collect()
}

/// One ordered page of a list query.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
  pub items:  Vec<Record<T>>,
  /// Rows matching the filters, ignoring limit and offset.
  pub total:  u64,
  pub limit:  u32,
  pub offset: u32,
}
