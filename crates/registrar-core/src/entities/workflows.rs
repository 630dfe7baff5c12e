//! Approval-gated student workflows: class and department transfers,
//! repetitions, promotions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Result,
  approval::{Approval, Effect, Workflow},
  schema::{Column, Entity, EntityKind, OnDelete, Table},
  validate,
};

/// Body columns followed by the approval columns every workflow shares.
macro_rules! workflow_columns {
  ($($column:expr),* $(,)?) => {
    &[
      $($column,)*
      Column::text("status"),
      Column::uuid("status_updated_by")
        .optional()
        .references(EntityKind::Staff, OnDelete::Restrict),
      Column::timestamp("status_updated_at").optional(),
      Column::text("rejection_reason").optional(),
    ]
  };
}

const LOCKED: &[&str] =
  &["student_id", "status", "status_updated_by", "status_updated_at", "rejection_reason"];

macro_rules! impl_workflow {
  ($ty:ty, |$this:ident| $effect:expr) => {
    impl Workflow for $ty {
      fn approval(&self) -> &Approval { &self.approval }

      fn approval_mut(&mut self) -> &mut Approval { &mut self.approval }

      fn effect(&self) -> Effect {
        let $this = self;
        $effect
      }
    }
  };
}

// ─── Class transfer ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassTransfer {
  pub student_id:    Uuid,
  pub from_class_id: Option<Uuid>,
  pub to_class_id:   Uuid,
  pub reason:        String,
  #[serde(flatten)]
  pub approval:      Approval,
}

pub static CLASS_TRANSFERS: Table = Table {
  kind:        EntityKind::ClassTransfer,
  name:        "class_transfers",
  collection:  "class-transfers",
  label:       "Class transfer",
  columns:     workflow_columns![
    Column::uuid("student_id").references(EntityKind::Student, OnDelete::Cascade),
    Column::uuid("from_class_id").optional().references(EntityKind::Class, OnDelete::Restrict),
    Column::uuid("to_class_id").references(EntityKind::Class, OnDelete::Restrict),
    Column::text("reason"),
  ],
  orderable:   &["status"],
  searchable:  &["reason"],
  filterable:  &["student_id", "status", "from_class_id", "to_class_id"],
  locked:      LOCKED,
  orphan_rule: &[],
};

impl Entity for ClassTransfer {
  const KIND: EntityKind = EntityKind::ClassTransfer;

  fn validate(&self) -> Result<()> {
    validate::required_text("reason", &self.reason, 1000)?;
    validate::distinct("to_class_id", self.from_class_id.as_ref(), &self.to_class_id)
  }

  fn prepare_create(&mut self) { self.approval = Approval::pending(); }
}

impl_workflow!(ClassTransfer, |t| Effect {
  student_id: t.student_id,
  column:     "class_id",
  value:      t.to_class_id,
});

// ─── Department transfer ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentTransfer {
  pub student_id:         Uuid,
  pub from_department_id: Option<Uuid>,
  pub to_department_id:   Uuid,
  pub reason:             String,
  #[serde(flatten)]
  pub approval:           Approval,
}

pub static DEPARTMENT_TRANSFERS: Table = Table {
  kind:        EntityKind::DepartmentTransfer,
  name:        "department_transfers",
  collection:  "department-transfers",
  label:       "Department transfer",
  columns:     workflow_columns![
    Column::uuid("student_id").references(EntityKind::Student, OnDelete::Cascade),
    Column::uuid("from_department_id")
      .optional()
      .references(EntityKind::Department, OnDelete::Restrict),
    Column::uuid("to_department_id").references(EntityKind::Department, OnDelete::Restrict),
    Column::text("reason"),
  ],
  orderable:   &["status"],
  searchable:  &["reason"],
  filterable:  &["student_id", "status", "from_department_id", "to_department_id"],
  locked:      LOCKED,
  orphan_rule: &[],
};

impl Entity for DepartmentTransfer {
  const KIND: EntityKind = EntityKind::DepartmentTransfer;

  fn validate(&self) -> Result<()> {
    validate::required_text("reason", &self.reason, 1000)?;
    validate::distinct("to_department_id", self.from_department_id.as_ref(), &self.to_department_id)
  }

  fn prepare_create(&mut self) { self.approval = Approval::pending(); }
}

impl_workflow!(DepartmentTransfer, |t| Effect {
  student_id: t.student_id,
  column:     "department_id",
  value:      t.to_department_id,
});

// ─── Repetition ──────────────────────────────────────────────────────────────

/// A student repeating `level_id` in `academic_session`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repetition {
  pub student_id:       Uuid,
  pub level_id:         Uuid,
  pub academic_session: String,
  pub reason:           String,
  #[serde(flatten)]
  pub approval:         Approval,
}

pub static REPETITIONS: Table = Table {
  kind:        EntityKind::Repetition,
  name:        "repetitions",
  collection:  "repetitions",
  label:       "Repetition",
  columns:     workflow_columns![
    Column::uuid("student_id").references(EntityKind::Student, OnDelete::Cascade),
    Column::uuid("level_id").references(EntityKind::Level, OnDelete::Restrict),
    Column::text("academic_session"),
    Column::text("reason"),
  ],
  orderable:   &["status", "academic_session"],
  searchable:  &["reason"],
  filterable:  &["student_id", "status", "level_id", "academic_session"],
  locked:      LOCKED,
  orphan_rule: &[],
};

impl Entity for Repetition {
  const KIND: EntityKind = EntityKind::Repetition;

  fn validate(&self) -> Result<()> {
    validate::session_year("academic_session", &self.academic_session)?;
    validate::required_text("reason", &self.reason, 1000)
  }

  fn prepare_create(&mut self) { self.approval = Approval::pending(); }
}

impl_workflow!(Repetition, |r| Effect {
  student_id: r.student_id,
  column:     "level_id",
  value:      r.level_id,
});

// ─── Promotion ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Promotion {
  pub student_id:       Uuid,
  pub from_level_id:    Option<Uuid>,
  pub to_level_id:      Uuid,
  pub academic_session: String,
  #[serde(flatten)]
  pub approval:         Approval,
}

pub static PROMOTIONS: Table = Table {
  kind:        EntityKind::Promotion,
  name:        "promotions",
  collection:  "promotions",
  label:       "Promotion",
  columns:     workflow_columns![
    Column::uuid("student_id").references(EntityKind::Student, OnDelete::Cascade),
    Column::uuid("from_level_id").optional().references(EntityKind::Level, OnDelete::Restrict),
    Column::uuid("to_level_id").references(EntityKind::Level, OnDelete::Restrict),
    Column::text("academic_session"),
  ],
  orderable:   &["status", "academic_session"],
  searchable:  &[],
  filterable:  &["student_id", "status", "from_level_id", "to_level_id", "academic_session"],
  locked:      LOCKED,
  orphan_rule: &[],
};

impl Entity for Promotion {
  const KIND: EntityKind = EntityKind::Promotion;

  fn validate(&self) -> Result<()> {
    validate::session_year("academic_session", &self.academic_session)?;
    validate::distinct("to_level_id", self.from_level_id.as_ref(), &self.to_level_id)
  }

  fn prepare_create(&mut self) { self.approval = Approval::pending(); }
}

impl_workflow!(Promotion, |p| Effect {
  student_id: p.student_id,
  column:     "level_id",
  value:      p.to_level_id,
});
