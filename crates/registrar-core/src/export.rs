//! Export-then-remove: emit a durable artifact for an entity, then archive or
//! hard-delete it.
//!
//! Each exportable kind registers a [`Gatherer`] describing which related rows
//! give the artifact its context. Gathering itself ([`gather`]) is pure; the
//! I/O lives in [`Exporter::export_and_remove`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
  Error, Principal, Result,
  collaborators::{ExportFormat, ExportRenderer, Mailer, ObjectStore},
  lifecycle::HEADER_FIELDS,
  repository::Repository,
  schema::EntityKind,
};

/// What happens to an entity once its artifact is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Then {
  Archive,
  Delete,
}

// ─── Gatherers ───────────────────────────────────────────────────────────────

/// Per-kind export recipe.
pub struct Gatherer {
  pub kind:     EntityKind,
  /// Foreign keys on the entity whose targets are included.
  pub parents:  &'static [&'static str],
  /// `(child kind, fk on child)` collections to include.
  pub children: &'static [(EntityKind, &'static str)],
  /// Suggested filename stem, from the entity's own fields.
  pub filename: fn(&Value) -> String,
}

static GATHERERS: &[Gatherer] = &[
  Gatherer {
    kind:     EntityKind::Student,
    parents:  &["department_id", "class_id", "level_id", "guardian_id"],
    children: &[(EntityKind::Grade, "student_id"), (EntityKind::Document, "student_id")],
    filename: student_filename,
  },
  Gatherer {
    kind:     EntityKind::Guardian,
    parents:  &[],
    children: &[(EntityKind::Student, "guardian_id")],
    filename: guardian_filename,
  },
  Gatherer {
    kind:     EntityKind::Staff,
    parents:  &["department_id", "role_id"],
    children: &[(EntityKind::Qualification, "educator_id")],
    filename: staff_filename,
  },
  Gatherer {
    kind:     EntityKind::Grade,
    parents:  &["student_id", "subject_id", "graded_by"],
    children: &[],
    filename: grade_filename,
  },
  Gatherer {
    kind:     EntityKind::Document,
    parents:  &["student_id"],
    children: &[],
    filename: document_filename,
  },
];

fn student_filename(v: &Value) -> String { format!("student-{}", field(v, "student_number")) }

fn guardian_filename(v: &Value) -> String {
  format!("guardian-{}-{}", field(v, "last_name"), field(v, "first_name"))
}

fn staff_filename(v: &Value) -> String {
  format!("staff-{}-{}", field(v, "last_name"), field(v, "first_name"))
}

fn grade_filename(v: &Value) -> String { format!("grade-{}", field(v, "id")) }

fn document_filename(v: &Value) -> String { format!("document-{}", field(v, "title")) }

pub fn gatherer(kind: EntityKind) -> Option<&'static Gatherer> {
  GATHERERS.iter().find(|g| g.kind == kind)
}

fn field(value: &Value, name: &str) -> String {
  match &value[name] {
    Value::String(s) => s.clone(),
    Value::Null => String::new(),
    other => other.to_string(),
  }
}

/// Reduce a suggested name to `[a-z0-9-]`, collapsing runs of anything else.
pub fn sanitize_filename(stem: &str) -> String {
  let mut out = String::with_capacity(stem.len());
  for c in stem.chars().flat_map(char::to_lowercase) {
    if c.is_ascii_alphanumeric() {
      out.push(c);
    } else if !out.ends_with('-') {
      out.push('-');
    }
  }
  let trimmed = out.trim_matches('-');
  if trimmed.is_empty() { "export".to_owned() } else { trimmed.to_owned() }
}

/// Related rows loaded for a gatherer.
#[derive(Debug, Clone, Default)]
pub struct Related {
  /// Keyed by the foreign key with its `_id`/`_by` suffix dropped.
  pub parents:  BTreeMap<String, Value>,
  /// Keyed by the child collection.
  pub children: BTreeMap<String, Vec<Value>>,
}

/// Strip lifecycle bookkeeping from a related row, keeping its id.
pub fn curate(row: &Value) -> Value {
  match row {
    Value::Object(map) => Value::Object(
      map
        .iter()
        .filter(|(k, _)| k.as_str() == "id" || !HEADER_FIELDS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect(),
    ),
    other => other.clone(),
  }
}

fn relation_name(fk: &str) -> &str {
  fk.strip_suffix("_id").or_else(|| fk.strip_suffix("_by")).unwrap_or(fk)
}

/// Build the artifact data and suggested filename. Pure.
pub fn gather(gatherer: &Gatherer, entity: &Value, related: &Related) -> (Value, String) {
  let mut data = Map::new();
  data.insert("entity".into(), Value::String(gatherer.kind.label().to_owned()));
  data.insert("record".into(), entity.clone());
  for (name, row) in &related.parents {
    data.insert(name.clone(), curate(row));
  }
  for (name, rows) in &related.children {
    data.insert(name.clone(), Value::Array(rows.iter().map(curate).collect()));
  }
  (Value::Object(data), sanitize_filename(&(gatherer.filename)(entity)))
}

// ─── Orchestration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ExportRequest {
  pub kind:   EntityKind,
  pub id:     Uuid,
  pub actor:  Principal,
  pub format: ExportFormat,
  pub then:   Then,
  /// Address to tell about the artifact. Best-effort.
  pub notify: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportOutcome {
  pub location:   String,
  pub object_key: String,
  pub filename:   String,
  pub notified:   bool,
}

/// The collaborators an export needs.
pub struct Exporter<'a> {
  pub renderer: &'a dyn ExportRenderer,
  pub objects:  &'a dyn ObjectStore,
  pub mailer:   &'a dyn Mailer,
}

impl Exporter<'_> {
  /// Export the active entity `req.id`, store the artifact, then remove the
  /// entity per `req.then`.
  ///
  /// A missing gatherer or a render failure leaves the entity untouched. An
  /// artifact already stored stays stored if the final transaction fails.
  pub async fn export_and_remove<R: Repository>(
    &self,
    repo: &R,
    req: ExportRequest,
  ) -> Result<ExportOutcome> {
    let not_found = || Error::NotFound { entity: req.kind.label(), id: req.id };
    let entity =
      repo.snapshot(req.kind, req.id).await.map_err(Into::<Error>::into)?.ok_or_else(not_found)?;
    if entity["is_archived"].as_bool().unwrap_or(false) {
      return Err(not_found());
    }

    let gatherer = gatherer(req.kind).ok_or(Error::UnimplementedGatherer(req.kind.label()))?;
    let related = self.load_related(repo, gatherer, req.id, &entity).await?;
    let (data, filename) = gather(gatherer, &entity, &related);

    let rendered = self.renderer.render(&data, &filename, req.format)?;
    let object_key =
      format!("exports/{}/{}/{}", req.kind.table().collection, req.id, rendered.filename);
    let location = self.objects.put(&object_key, rendered.bytes).await?;

    repo
      .finalize_export(req.kind, req.id, req.actor, req.then)
      .await
      .map_err(Into::<Error>::into)?;
    tracing::info!(
      kind = req.kind.as_ref(),
      id = %req.id,
      actor = %req.actor,
      then = req.then.as_ref(),
      %object_key,
      "entity exported"
    );

    let notified = match &req.notify {
      Some(to) => self.notify(to, req.kind, req.id, &location).await,
      None => false,
    };

    Ok(ExportOutcome { location, object_key, filename: rendered.filename, notified })
  }

  async fn load_related<R: Repository>(
    &self,
    repo: &R,
    gatherer: &Gatherer,
    id: Uuid,
    entity: &Value,
  ) -> Result<Related> {
    let table = gatherer.kind.table();
    let mut related = Related::default();

    for fk in gatherer.parents {
      let Some(reference) = table.column(fk).and_then(|c| c.reference) else { continue };
      let Some(parent_id) = entity[*fk].as_str().and_then(|s| Uuid::parse_str(s).ok()) else {
        continue;
      };
      let row = repo.snapshot(reference.parent, parent_id).await.map_err(Into::<Error>::into)?;
      if let Some(row) = row {
        related.parents.insert(relation_name(fk).to_owned(), row);
      }
    }

    for (child, fk) in gatherer.children {
      let rows = repo.snapshot_children(*child, fk, id).await.map_err(Into::<Error>::into)?;
      related.children.insert(child.table().collection.to_owned(), rows);
    }

    Ok(related)
  }

  async fn notify(&self, to: &str, kind: EntityKind, id: Uuid, location: &str) -> bool {
    let subject = format!("{kind} record exported");
    let body = format!("The {kind} record {id} was exported and is available at {location}.");
    match self.mailer.send(to, &subject, &body).await {
      Ok(()) => true,
      Err(e) => {
        tracing::warn!(to, error = %e, "export notification not sent");
        false
      }
    }
  }
}
