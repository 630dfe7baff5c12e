//! Organisational lookup entities: departments, roles, levels, classes,
//! subjects.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Result,
  schema::{Column, Entity, EntityKind, OnDelete, Table, Unique},
  validate,
};

fn eligible() -> bool { true }

// ─── Department ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
  pub name:              String,
  pub description:       Option<String>,
  /// Seeded departments are pinned with `false`.
  #[serde(default = "eligible")]
  pub deletion_eligible: bool,
}

pub static DEPARTMENTS: Table = Table {
  kind:        EntityKind::Department,
  name:        "departments",
  collection:  "departments",
  label:       "Department",
  columns:     &[
    Column::text("name").unique(Unique::Global),
    Column::text("description").optional(),
    Column::bool("deletion_eligible"),
  ],
  orderable:   &["name"],
  searchable:  &["name", "description"],
  filterable:  &["name"],
  locked:      &["deletion_eligible"],
  orphan_rule: &[],
};

impl Entity for Department {
  const KIND: EntityKind = EntityKind::Department;

  fn validate(&self) -> Result<()> {
    validate::required_text("name", &self.name, 100)?;
    validate::optional_text("description", self.description.as_deref(), 1000)
  }
}

// ─── Role ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
  pub name:              String,
  pub description:       Option<String>,
  #[serde(default = "eligible")]
  pub deletion_eligible: bool,
}

pub static ROLES: Table = Table {
  kind:        EntityKind::Role,
  name:        "roles",
  collection:  "roles",
  label:       "Role",
  columns:     &[
    Column::text("name").unique(Unique::Global),
    Column::text("description").optional(),
    Column::bool("deletion_eligible"),
  ],
  orderable:   &["name"],
  searchable:  &["name", "description"],
  filterable:  &["name"],
  locked:      &["deletion_eligible"],
  orphan_rule: &[],
};

impl Entity for Role {
  const KIND: EntityKind = EntityKind::Role;

  fn validate(&self) -> Result<()> {
    validate::required_text("name", &self.name, 100)?;
    validate::optional_text("description", self.description.as_deref(), 1000)
  }
}

// ─── Level ───────────────────────────────────────────────────────────────────

/// An academic level (year group), ordered by `rank`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
  pub name: String,
  pub rank: i64,
}

pub static LEVELS: Table = Table {
  kind:        EntityKind::Level,
  name:        "levels",
  collection:  "levels",
  label:       "Level",
  columns:     &[Column::text("name").unique(Unique::Global), Column::integer("rank")],
  orderable:   &["name", "rank"],
  searchable:  &["name"],
  filterable:  &["rank"],
  locked:      &[],
  orphan_rule: &[],
};

impl Entity for Level {
  const KIND: EntityKind = EntityKind::Level;

  fn validate(&self) -> Result<()> {
    validate::required_text("name", &self.name, 50)?;
    if self.rank < 0 {
      return Err(crate::Error::validation("rank", "must not be negative"));
    }
    Ok(())
  }
}

// ─── Class ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Class {
  pub name:             String,
  pub academic_session: String,
  pub level_id:         Option<Uuid>,
  pub department_id:    Option<Uuid>,
  /// The educator responsible for the class.
  pub supervisor_id:    Option<Uuid>,
  /// Optional back-reference; cleared if the student is deleted.
  pub student_rep_id:   Option<Uuid>,
}

pub static CLASSES: Table = Table {
  kind:        EntityKind::Class,
  name:        "classes",
  collection:  "classes",
  label:       "Class",
  columns:     &[
    Column::text("name"),
    Column::text("academic_session"),
    Column::uuid("level_id").optional().references(EntityKind::Level, OnDelete::Restrict),
    Column::uuid("department_id")
      .optional()
      .references(EntityKind::Department, OnDelete::Restrict),
    Column::uuid("supervisor_id").optional().references(EntityKind::Staff, OnDelete::Restrict),
    Column::uuid("student_rep_id")
      .optional()
      .references(EntityKind::Student, OnDelete::SetNull),
  ],
  orderable:   &["name", "academic_session"],
  searchable:  &["name"],
  filterable:  &["academic_session", "level_id", "department_id", "supervisor_id"],
  locked:      &[],
  orphan_rule: &[],
};

impl Entity for Class {
  const KIND: EntityKind = EntityKind::Class;

  fn validate(&self) -> Result<()> {
    validate::required_text("name", &self.name, 100)?;
    validate::session_year("academic_session", &self.academic_session)
  }
}

// ─── Subject ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
  pub name:          String,
  /// Short code, unique among active subjects (e.g. `MATH-101`).
  pub code:          String,
  pub description:   Option<String>,
  pub department_id: Option<Uuid>,
  pub level_id:      Option<Uuid>,
}

pub static SUBJECTS: Table = Table {
  kind:        EntityKind::Subject,
  name:        "subjects",
  collection:  "subjects",
  label:       "Subject",
  columns:     &[
    Column::text("name"),
    Column::text("code").unique(Unique::ActiveOnly),
    Column::text("description").optional(),
    Column::uuid("department_id")
      .optional()
      .references(EntityKind::Department, OnDelete::Restrict),
    Column::uuid("level_id").optional().references(EntityKind::Level, OnDelete::Restrict),
  ],
  orderable:   &["name", "code"],
  searchable:  &["name", "code", "description"],
  filterable:  &["code", "department_id", "level_id"],
  locked:      &[],
  orphan_rule: &[],
};

impl Entity for Subject {
  const KIND: EntityKind = EntityKind::Subject;

  fn validate(&self) -> Result<()> {
    validate::required_text("name", &self.name, 100)?;
    validate::required_text("code", &self.code, 20)?;
    validate::optional_text("description", self.description.as_deref(), 1000)
  }
}
