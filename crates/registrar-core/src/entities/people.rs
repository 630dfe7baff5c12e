//! People: staff (and their qualifications), guardians, students.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  principal::AccessLevel,
  schema::{Column, Entity, EntityKind, OnDelete, OrphanRule, Table, Unique},
  validate,
};

// ─── Staff ───────────────────────────────────────────────────────────────────

/// The staff subtype, stored in the `staff_type` column. Subtype-specific
/// attributes live alongside the tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "staff_type", rename_all = "snake_case")]
pub enum StaffType {
  Admin,
  Educator { specialization: Option<String> },
  Support { position: Option<String> },
  /// The reserved bootstrap principal. Never created through the API.
  System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Staff {
  pub first_name:    String,
  pub last_name:     String,
  pub email:         String,
  pub phone:         Option<String>,
  pub department_id: Option<Uuid>,
  pub role_id:       Option<Uuid>,
  #[serde(default)]
  pub access_level:  AccessLevel,
  #[serde(flatten)]
  pub staff_type:    StaffType,
}

pub static STAFF: Table = Table {
  kind:        EntityKind::Staff,
  name:        "staff",
  collection:  "staff",
  label:       "Staff",
  columns:     &[
    Column::text("first_name"),
    Column::text("last_name"),
    Column::text("email").unique(Unique::Global).case_insensitive(),
    Column::text("phone").optional(),
    Column::uuid("department_id")
      .optional()
      .references(EntityKind::Department, OnDelete::Restrict),
    Column::uuid("role_id").optional().references(EntityKind::Role, OnDelete::Restrict),
    Column::text("access_level"),
    Column::text("staff_type"),
    Column::text("specialization").optional(),
    Column::text("position").optional(),
  ],
  orderable:   &["first_name", "last_name", "email"],
  searchable:  &["first_name", "last_name", "email", "specialization", "position"],
  filterable:  &["department_id", "role_id", "access_level", "staff_type"],
  locked:      &["staff_type", "access_level"],
  orphan_rule: &[],
};

impl Staff {
  pub fn full_name(&self) -> String { format!("{} {}", self.first_name, self.last_name) }
}

impl Entity for Staff {
  const KIND: EntityKind = EntityKind::Staff;

  fn validate(&self) -> Result<()> {
    validate::required_text("first_name", &self.first_name, 100)?;
    validate::required_text("last_name", &self.last_name, 100)?;
    validate::email("email", &self.email)?;
    validate::optional_text("phone", self.phone.as_deref(), 32)?;
    match &self.staff_type {
      StaffType::System => Err(Error::validation("staff_type", "system staff is reserved")),
      StaffType::Educator { specialization } => {
        validate::optional_text("specialization", specialization.as_deref(), 100)
      }
      StaffType::Support { position } => {
        validate::optional_text("position", position.as_deref(), 100)
      }
      StaffType::Admin => Ok(()),
    }
  }
}

// ─── Qualification ───────────────────────────────────────────────────────────

/// A qualification held by an educator; owned by (and deleted with) them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Qualification {
  pub educator_id: Uuid,
  pub title:       String,
  pub institution: Option<String>,
  pub awarded_on:  Option<NaiveDate>,
}

pub static QUALIFICATIONS: Table = Table {
  kind:        EntityKind::Qualification,
  name:        "qualifications",
  collection:  "qualifications",
  label:       "Qualification",
  columns:     &[
    Column::uuid("educator_id").references(EntityKind::Staff, OnDelete::Cascade),
    Column::text("title"),
    Column::text("institution").optional(),
    Column::date("awarded_on").optional(),
  ],
  orderable:   &["title", "awarded_on"],
  searchable:  &["title", "institution"],
  filterable:  &["educator_id"],
  locked:      &["educator_id"],
  orphan_rule: &[],
};

impl Entity for Qualification {
  const KIND: EntityKind = EntityKind::Qualification;

  fn validate(&self) -> Result<()> {
    validate::required_text("title", &self.title, 200)?;
    validate::optional_text("institution", self.institution.as_deref(), 200)?;
    self.awarded_on.map_or(Ok(()), |d| validate::not_future_date("awarded_on", d))
  }
}

// ─── Guardian ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guardian {
  pub first_name: String,
  pub last_name:  String,
  /// Unique among active guardians; archived guardians release the address.
  pub email:      String,
  pub phone:      Option<String>,
  pub address:    Option<String>,
}

pub static GUARDIANS: Table = Table {
  kind:        EntityKind::Guardian,
  name:        "guardians",
  collection:  "guardians",
  label:       "Guardian",
  columns:     &[
    Column::text("first_name"),
    Column::text("last_name"),
    Column::text("email").unique(Unique::ActiveOnly).case_insensitive(),
    Column::text("phone").optional(),
    Column::text("address").optional(),
  ],
  orderable:   &["first_name", "last_name", "email"],
  searchable:  &["first_name", "last_name", "email", "phone"],
  filterable:  &["email"],
  locked:      &[],
  orphan_rule: &[OrphanRule { child: EntityKind::Student, fk: "guardian_id" }],
};

impl Entity for Guardian {
  const KIND: EntityKind = EntityKind::Guardian;

  fn validate(&self) -> Result<()> {
    validate::required_text("first_name", &self.first_name, 100)?;
    validate::required_text("last_name", &self.last_name, 100)?;
    validate::email("email", &self.email)?;
    validate::optional_text("phone", self.phone.as_deref(), 32)?;
    validate::optional_text("address", self.address.as_deref(), 500)
  }
}

// ─── Student ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
  pub student_number: String,
  pub first_name:     String,
  pub last_name:      String,
  pub date_of_birth:  NaiveDate,
  pub email:          Option<String>,
  pub department_id:  Option<Uuid>,
  pub class_id:       Option<Uuid>,
  pub level_id:       Option<Uuid>,
  pub guardian_id:    Option<Uuid>,
}

pub static STUDENTS: Table = Table {
  kind:        EntityKind::Student,
  name:        "students",
  collection:  "students",
  label:       "Student",
  columns:     &[
    Column::text("student_number").unique(Unique::Global),
    Column::text("first_name"),
    Column::text("last_name"),
    Column::date("date_of_birth"),
    Column::text("email").optional(),
    Column::uuid("department_id")
      .optional()
      .references(EntityKind::Department, OnDelete::Restrict),
    Column::uuid("class_id").optional().references(EntityKind::Class, OnDelete::Restrict),
    Column::uuid("level_id").optional().references(EntityKind::Level, OnDelete::Restrict),
    Column::uuid("guardian_id").optional().references(EntityKind::Guardian, OnDelete::Restrict),
  ],
  orderable:   &["student_number", "first_name", "last_name", "date_of_birth"],
  searchable:  &["student_number", "first_name", "last_name", "email"],
  filterable:  &["department_id", "class_id", "level_id", "guardian_id"],
  locked:      &[],
  orphan_rule: &[],
};

impl Student {
  pub fn full_name(&self) -> String { format!("{} {}", self.first_name, self.last_name) }
}

impl Entity for Student {
  const KIND: EntityKind = EntityKind::Student;

  fn validate(&self) -> Result<()> {
    validate::required_text("student_number", &self.student_number, 32)?;
    validate::required_text("first_name", &self.first_name, 100)?;
    validate::required_text("last_name", &self.last_name, 100)?;
    validate::past_date("date_of_birth", self.date_of_birth)?;
    self.email.as_deref().map_or(Ok(()), |e| validate::email("email", e))
  }
}
