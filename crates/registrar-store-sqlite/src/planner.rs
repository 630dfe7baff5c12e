//! Translate a validated [`ListQuery`] into SQL.
//!
//! Attribute names reaching this module have already been checked against the
//! table's whitelists, so they are interpolated directly; every operand is a
//! bound parameter.
//!
//! Free-text search compares `fold(column)` with a folded pattern. SQLite's
//! own `LIKE` only folds ASCII, so [`register_fold`] installs a Unicode
//! lowercase function on every connection the store opens.

use registrar_core::{
  lifecycle::Partition,
  query::{FilterValue, ListQuery, OrderDir},
  schema::Table,
};
use rusqlite::{
  Connection,
  functions::FunctionFlags,
  types::{Value as Sql, ValueRef},
};

use crate::encode::select_list;

/// A page query and its matching count query. `params` binds the `WHERE`
/// clause; `LIMIT` and `OFFSET` follow it in `page_params`.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
  pub sql:         String,
  pub count_sql:   String,
  pub params:      Vec<Sql>,
  pub page_params: Vec<Sql>,
}

/// SQL name of the case-folding function.
pub const FOLD: &str = "fold";

/// Install `fold(text)`: the Unicode lowercase of a text value, `NULL` for
/// anything else.
pub fn register_fold(conn: &Connection) -> rusqlite::Result<()> {
  conn.create_scalar_function(
    FOLD,
    1,
    FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
    |ctx| {
      Ok(match ctx.get_raw(0) {
        ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).to_lowercase()),
        _ => None,
      })
    },
  )
}

/// Folded `%text%`; `%`, `_` and `\` are literal in the user's search text.
fn like_pattern(text: &str) -> String {
  let mut escaped = String::with_capacity(text.len() + 2);
  escaped.push('%');
  for c in text.to_lowercase().chars() {
    if matches!(c, '%' | '_' | '\\') {
      escaped.push('\\');
    }
    escaped.push(c);
  }
  escaped.push('%');
  escaped
}

fn operand(value: &FilterValue) -> Sql {
  match value {
    FilterValue::Text(s) => Sql::Text(s.clone()),
    FilterValue::Integer(i) => Sql::Integer(*i),
    FilterValue::Real(f) => Sql::Real(*f),
    FilterValue::Bool(b) => Sql::Integer(i64::from(*b)),
  }
}

pub fn plan(
  table: &'static Table,
  partition: Partition,
  search_fields: &[&str],
  query: &ListQuery,
) -> Plan {
  let mut clauses = vec!["is_archived = ?".to_owned()];
  let mut params = vec![Sql::Integer(i64::from(partition.is_archived()))];

  for filter in &query.filters {
    clauses.push(format!("{} = ?", filter.column.name));
    params.push(operand(&filter.value));
  }

  if let Some(text) = query.text.as_deref().filter(|_| !search_fields.is_empty()) {
    let pattern = like_pattern(text);
    let any = search_fields
      .iter()
      .map(|f| format!("{FOLD}({f}) LIKE ? ESCAPE '\\'"))
      .collect::<Vec<_>>()
      .join(" OR ");
    clauses.push(format!("({any})"));
    params.extend(search_fields.iter().map(|_| Sql::Text(pattern.clone())));
  }

  let where_clause = clauses.join(" AND ");
  let dir = match query.order_dir {
    OrderDir::Asc => "ASC",
    OrderDir::Desc => "DESC",
  };
  let sql = format!(
    "SELECT {} FROM {} WHERE {where_clause} ORDER BY {} {dir}, id ASC LIMIT ? OFFSET ?",
    select_list(table),
    table.name,
    query.order_by,
  );
  let count_sql = format!("SELECT COUNT(*) FROM {} WHERE {where_clause}", table.name);

  tracing::debug!(table = table.name, %sql, "planned list query");
  Plan {
    sql,
    count_sql,
    params,
    page_params: vec![Sql::Integer(i64::from(query.limit)), Sql::Integer(i64::from(query.offset))],
  }
}
