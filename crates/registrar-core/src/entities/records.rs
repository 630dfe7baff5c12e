//! Student records: grades and uploaded documents.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Result,
  schema::{Column, Entity, EntityKind, OnDelete, Table},
  validate,
};

// ─── Grade ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Term {
  First,
  Second,
  Third,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grade {
  pub student_id:       Uuid,
  pub subject_id:       Uuid,
  pub graded_by:        Option<Uuid>,
  pub academic_session: String,
  pub term:             Term,
  /// Percentage, 0–100.
  pub score:            f64,
  pub remark:           Option<String>,
}

pub static GRADES: Table = Table {
  kind:        EntityKind::Grade,
  name:        "grades",
  collection:  "grades",
  label:       "Grade",
  columns:     &[
    Column::uuid("student_id").references(EntityKind::Student, OnDelete::Cascade),
    Column::uuid("subject_id").references(EntityKind::Subject, OnDelete::Restrict),
    Column::uuid("graded_by").optional().references(EntityKind::Staff, OnDelete::Restrict),
    Column::text("academic_session"),
    Column::text("term"),
    Column::real("score"),
    Column::text("remark").optional(),
  ],
  orderable:   &["score", "academic_session", "term"],
  searchable:  &["remark"],
  filterable:  &["student_id", "subject_id", "graded_by", "academic_session", "term"],
  locked:      &["student_id"],
  orphan_rule: &[],
};

impl Entity for Grade {
  const KIND: EntityKind = EntityKind::Grade;

  fn validate(&self) -> Result<()> {
    validate::session_year("academic_session", &self.academic_session)?;
    validate::range("score", self.score, 0.0, 100.0)?;
    validate::optional_text("remark", self.remark.as_deref(), 500)
  }
}

// ─── Document ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
  Transcript,
  Certificate,
  IdCard,
  Medical,
  Other,
}

/// A file attached to a student. The bytes live in the object store; the row
/// only records where.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
  pub student_id:    Uuid,
  pub title:         String,
  pub document_type: DocumentType,
  #[serde(default)]
  pub object_key:    Option<String>,
  #[serde(default)]
  pub mime_type:     Option<String>,
  #[serde(default)]
  pub size_bytes:    Option<i64>,
}

/// Where uploaded document bytes were stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentContent {
  pub object_key: String,
  pub mime_type:  String,
  pub size_bytes: i64,
}

pub static DOCUMENTS: Table = Table {
  kind:        EntityKind::Document,
  name:        "documents",
  collection:  "documents",
  label:       "Document",
  columns:     &[
    Column::uuid("student_id").references(EntityKind::Student, OnDelete::Cascade),
    Column::text("title"),
    Column::text("document_type"),
    Column::text("object_key").optional(),
    Column::text("mime_type").optional(),
    Column::integer("size_bytes").optional(),
  ],
  orderable:   &["title", "document_type"],
  searchable:  &["title"],
  filterable:  &["student_id", "document_type", "mime_type"],
  locked:      &["student_id", "object_key", "mime_type", "size_bytes"],
  orphan_rule: &[],
};

impl Document {
  /// Deterministic object-store key for this document's bytes.
  pub fn object_key_for(student_id: Uuid, document_id: Uuid) -> String {
    format!("documents/{student_id}/{document_id}")
  }

  pub fn attach(&mut self, content: DocumentContent) {
    self.object_key = Some(content.object_key);
    self.mime_type = Some(content.mime_type);
    self.size_bytes = Some(content.size_bytes);
  }
}

impl Entity for Document {
  const KIND: EntityKind = EntityKind::Document;

  fn validate(&self) -> Result<()> { validate::required_text("title", &self.title, 200) }

  fn prepare_create(&mut self) {
    self.object_key = None;
    self.mime_type = None;
    self.size_bytes = None;
  }
}
