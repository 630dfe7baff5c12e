//! Declarative schema for managed entities.
//!
//! Each entity type declares a static [`Table`]: its storage name, REST
//! collection, human label, and typed columns (including foreign-key
//! references and uniqueness scope). Storage DDL, the dependency graph and
//! the constraint-violation resolver are all derived from these declarations,
//! so a relationship exists in exactly one place.

use std::fmt;

use serde::{Serialize, de::DeserializeOwned};

use crate::{Result, entities};

// ─── Entity kinds ────────────────────────────────────────────────────────────

/// Every managed entity type known to the system.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  serde::Deserialize,
  strum::EnumIter,
  strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
  Department,
  Role,
  Level,
  Staff,
  Qualification,
  Class,
  Subject,
  Guardian,
  Student,
  Grade,
  Document,
  ClassTransfer,
  DepartmentTransfer,
  Repetition,
  Promotion,
}

impl EntityKind {
  pub fn table(self) -> &'static Table {
    use entities::*;
    match self {
      Self::Department => &academic::DEPARTMENTS,
      Self::Role => &academic::ROLES,
      Self::Level => &academic::LEVELS,
      Self::Staff => &people::STAFF,
      Self::Qualification => &people::QUALIFICATIONS,
      Self::Class => &academic::CLASSES,
      Self::Subject => &academic::SUBJECTS,
      Self::Guardian => &people::GUARDIANS,
      Self::Student => &people::STUDENTS,
      Self::Grade => &records::GRADES,
      Self::Document => &records::DOCUMENTS,
      Self::ClassTransfer => &workflows::CLASS_TRANSFERS,
      Self::DepartmentTransfer => &workflows::DEPARTMENT_TRANSFERS,
      Self::Repetition => &workflows::REPETITIONS,
      Self::Promotion => &workflows::PROMOTIONS,
    }
  }

  pub fn label(self) -> &'static str { self.table().label }

  pub fn all() -> impl Iterator<Item = EntityKind> { <Self as strum::IntoEnumIterator>::iter() }

  pub fn from_table_name(name: &str) -> Option<EntityKind> {
    Self::all().find(|k| k.table().name == name)
  }

  pub fn from_collection(collection: &str) -> Option<EntityKind> {
    Self::all().find(|k| k.table().collection == collection)
  }
}

impl fmt::Display for EntityKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.label()) }
}

// ─── Columns ─────────────────────────────────────────────────────────────────

/// Storage type of a body column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
  Text,
  Uuid,
  Integer,
  Real,
  Bool,
  /// `YYYY-MM-DD`.
  Date,
  /// RFC 3339, UTC.
  Timestamp,
}

impl ColumnType {
  pub fn is_textual(self) -> bool { matches!(self, Self::Text) }
}

/// Scope over which a unique column is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unique {
  No,
  /// Across active and archived rows.
  Global,
  /// Among active rows only; an archived row frees its value.
  ActiveOnly,
}

/// Referential action when the parent row is hard-deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
  /// Lookup relationship. Active dependents block deletion.
  Restrict,
  /// Strict ownership. Dependents are removed with the parent.
  Cascade,
  /// Optional back-reference. Cleared when the parent goes.
  SetNull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
  pub parent:    EntityKind,
  pub on_delete: OnDelete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
  pub name:      &'static str,
  pub ty:        ColumnType,
  pub nullable:  bool,
  pub unique:    Unique,
  /// Uniqueness ignores ASCII case.
  pub fold_case: bool,
  pub reference: Option<Reference>,
}

impl Column {
  pub const fn new(name: &'static str, ty: ColumnType) -> Self {
    Self { name, ty, nullable: false, unique: Unique::No, fold_case: false, reference: None }
  }

  pub const fn text(name: &'static str) -> Self { Self::new(name, ColumnType::Text) }

  pub const fn uuid(name: &'static str) -> Self { Self::new(name, ColumnType::Uuid) }

  pub const fn integer(name: &'static str) -> Self { Self::new(name, ColumnType::Integer) }

  pub const fn real(name: &'static str) -> Self { Self::new(name, ColumnType::Real) }

  pub const fn bool(name: &'static str) -> Self { Self::new(name, ColumnType::Bool) }

  pub const fn date(name: &'static str) -> Self { Self::new(name, ColumnType::Date) }

  pub const fn timestamp(name: &'static str) -> Self { Self::new(name, ColumnType::Timestamp) }

  pub const fn optional(mut self) -> Self {
    self.nullable = true;
    self
  }

  pub const fn unique(mut self, scope: Unique) -> Self {
    self.unique = scope;
    self
  }

  pub const fn case_insensitive(mut self) -> Self {
    self.fold_case = true;
    self
  }

  pub const fn references(mut self, parent: EntityKind, on_delete: OnDelete) -> Self {
    self.ty = ColumnType::Uuid;
    self.reference = Some(Reference { parent, on_delete });
    self
  }
}

// ─── Tables ──────────────────────────────────────────────────────────────────

/// Name of the optional per-row guard that vetoes hard deletion.
pub const DELETION_GUARD: &str = "deletion_eligible";

/// Header attributes every list endpoint may order by.
pub const HEADER_ORDERABLE: &[&str] = &["created_at", "last_modified_at", "archived_at", "id"];

/// A child relation whose absence makes a parent worthless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrphanRule {
  pub child: EntityKind,
  pub fk:    &'static str,
}

/// Static description of one managed entity's storage and query surface.
#[derive(Debug)]
pub struct Table {
  pub kind:       EntityKind,
  /// Storage table name.
  pub name:       &'static str,
  /// REST collection segment.
  pub collection: &'static str,
  /// Human-readable singular label.
  pub label:      &'static str,
  /// Body columns, in storage order. The lifecycle header is implicit.
  pub columns:    &'static [Column],
  /// Body attributes accepted by `order_by` in addition to the header ones.
  pub orderable:  &'static [&'static str],
  /// Textual attributes eligible for free-text search.
  pub searchable: &'static [&'static str],
  /// Attributes accepted as equality filters.
  pub filterable: &'static [&'static str],
  /// Attributes a patch may not touch.
  pub locked:     &'static [&'static str],
  /// Archive the parent once none of these children remain active.
  pub orphan_rule: &'static [OrphanRule],
}

impl Table {
  pub fn column(&self, name: &str) -> Option<&'static Column> {
    self.columns.iter().find(|c| c.name == name)
  }

  pub fn has_deletion_guard(&self) -> bool { self.column(DELETION_GUARD).is_some() }

  pub fn references(&self) -> impl Iterator<Item = (&'static Column, Reference)> + '_ {
    self.columns.iter().filter_map(|c| c.reference.map(|r| (c, r)))
  }

  pub fn is_orderable(&self, attr: &str) -> bool {
    HEADER_ORDERABLE.contains(&attr) || self.orderable.contains(&attr)
  }
}

// ─── Entity trait ────────────────────────────────────────────────────────────

/// A domain body that can be stored as a managed entity.
///
/// The serialised form of the body must consist of exactly the columns
/// declared in [`Entity::table`]; this is checked by tests for every entity.
pub trait Entity: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static {
  const KIND: EntityKind;

  fn table() -> &'static Table { Self::KIND.table() }

  /// Factory-level validation, run before every insert and update.
  fn validate(&self) -> Result<()> { Ok(()) }

  /// Normalise a body before its first insert.
  fn prepare_create(&mut self) {}
}
