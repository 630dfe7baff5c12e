//! Translate foreign-key constraint names into field-level errors.
//!
//! Storage backends name every foreign key `fk_{table}_{column}` (see
//! [`constraint_name`]). When the database reports a violated constraint, the
//! backend hands the name to [`resolver`] together with the entity whose
//! operation was running, and gets back which relationship broke.
//!
//! Lookup is scope-specific first (references owned by, or pointing at, the
//! operating entity), then the common scope holding the audit references every
//! table carries, then [`Resolution::Unresolved`].

use std::{collections::HashMap, sync::LazyLock};

use crate::{
  Error,
  graph::dependency_label,
  lifecycle::AUDIT_REFERENCES,
  schema::EntityKind,
};

/// The storage name of the foreign key on `table.column`.
pub fn constraint_name(table: &str, column: &str) -> String { format!("fk_{table}_{column}") }

/// A constraint the resolver recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
  /// The row holding the foreign key.
  pub child:     EntityKind,
  /// The row the key points at.
  pub parent:    EntityKind,
  /// Attribute on `child`.
  pub attribute: &'static str,
  /// `Parent → Child`.
  pub label:     String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
  Resolved(Resolved),
  Unresolved(String),
}

impl Resolution {
  /// Error for an insert or update whose reference points nowhere.
  pub fn into_write_error(self) -> Error {
    match self {
      Self::Resolved(r) => Error::RelatedEntityNotFound {
        entity: r.parent.label().to_owned(),
        field:  r.attribute.to_owned(),
      },
      Self::Unresolved(name) => {
        Error::RelatedEntityNotFound { entity: "related entity".to_owned(), field: name }
      }
    }
  }

  /// Label naming the dependent that blocked a delete.
  pub fn dependency_label(&self) -> String {
    match self {
      Self::Resolved(r) => r.label.clone(),
      Self::Unresolved(name) => name.clone(),
    }
  }
}

type ConstraintMap = HashMap<String, Resolved>;

#[derive(Debug, Default)]
pub struct Resolver {
  scopes: HashMap<EntityKind, ConstraintMap>,
  common: ConstraintMap,
}

static RESOLVER: LazyLock<Resolver> = LazyLock::new(Resolver::build);

pub fn resolver() -> &'static Resolver { &RESOLVER }

impl Resolver {
  fn build() -> Self {
    let mut scopes: HashMap<EntityKind, ConstraintMap> = HashMap::new();
    let mut common = ConstraintMap::new();

    for child in EntityKind::all() {
      let table = child.table();
      for (column, reference) in table.references() {
        let name = constraint_name(table.name, column.name);
        let resolved = Resolved {
          child,
          parent: reference.parent,
          attribute: column.name,
          label: dependency_label(reference.parent, child),
        };
        // Writes on the child and deletes of the parent both trip this key.
        scopes.entry(reference.parent).or_default().insert(name.clone(), resolved.clone());
        scopes.entry(child).or_default().insert(name, resolved);
      }
      for attribute in AUDIT_REFERENCES {
        common.insert(constraint_name(table.name, attribute), Resolved {
          child,
          parent: EntityKind::Staff,
          attribute,
          label: dependency_label(EntityKind::Staff, child),
        });
      }
    }

    Self { scopes, common }
  }

  /// Resolve `constraint` raised while operating on `scope`.
  pub fn resolve(&self, scope: EntityKind, constraint: &str) -> Resolution {
    self
      .scopes
      .get(&scope)
      .and_then(|m| m.get(constraint))
      .or_else(|| self.common.get(constraint))
      .cloned()
      .map_or_else(|| Resolution::Unresolved(constraint.to_owned()), Resolution::Resolved)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn delete_scope_resolves_incoming_reference() {
    let r = resolver().resolve(EntityKind::Department, "fk_students_department_id");
    let Resolution::Resolved(r) = r else { panic!("unresolved") };
    assert_eq!(r.child, EntityKind::Student);
    assert_eq!(r.parent, EntityKind::Department);
    assert_eq!(r.attribute, "department_id");
    assert_eq!(r.label, "Department → Student");
  }

  #[test]
  fn write_scope_resolves_outgoing_reference() {
    let err = resolver().resolve(EntityKind::Grade, "fk_grades_subject_id").into_write_error();
    match err {
      Error::RelatedEntityNotFound { entity, field } => {
        assert_eq!(entity, "Subject");
        assert_eq!(field, "subject_id");
      }
      other => panic!("unexpected {other:?}"),
    }
  }

  #[test]
  fn audit_references_fall_back_to_common_scope() {
    let r = resolver().resolve(EntityKind::Level, "fk_levels_last_modified_by");
    let Resolution::Resolved(r) = r else { panic!("unresolved") };
    assert_eq!(r.parent, EntityKind::Staff);
    assert_eq!(r.attribute, "last_modified_by");
  }

  #[test]
  fn foreign_scope_does_not_match() {
    // Belongs to students/departments, not levels.
    let r = resolver().resolve(EntityKind::Level, "fk_students_department_id");
    assert_eq!(r, Resolution::Unresolved("fk_students_department_id".into()));
    assert_eq!(r.dependency_label(), "fk_students_department_id");
  }
}
