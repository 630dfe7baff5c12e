//! The dependency graph: which child rows block a parent's hard deletion.
//!
//! Derived once from the table declarations. Only `Restrict` references are
//! blockers; cascading children go with their parent and `SetNull`
//! back-references are cleared.

use std::{collections::HashMap, sync::LazyLock};

use crate::schema::{EntityKind, OnDelete};

/// One `(child, fk, label)` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
  pub child:    EntityKind,
  /// Foreign-key attribute on the child that points at the parent.
  pub fk:       &'static str,
  /// Human label, e.g. `Department → Student`.
  pub label:    String,
  /// Whether the child's reference may be cleared.
  pub nullable: bool,
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
  by_parent: HashMap<EntityKind, Vec<Dependency>>,
}

static GRAPH: LazyLock<DependencyGraph> = LazyLock::new(DependencyGraph::build);

/// The process-wide graph.
pub fn graph() -> &'static DependencyGraph { &GRAPH }

pub fn dependency_label(parent: EntityKind, child: EntityKind) -> String {
  format!("{} → {}", parent.label(), child.label())
}

impl DependencyGraph {
  fn build() -> Self {
    let mut by_parent: HashMap<EntityKind, Vec<Dependency>> = HashMap::new();
    for child in EntityKind::all() {
      for (column, reference) in child.table().references() {
        if reference.on_delete != OnDelete::Restrict {
          continue;
        }
        by_parent.entry(reference.parent).or_default().push(Dependency {
          child,
          fk: column.name,
          label: dependency_label(reference.parent, child),
          nullable: column.nullable,
        });
      }
    }
    Self { by_parent }
  }

  /// Blocking dependents of `parent`, in declaration order.
  pub fn dependents(&self, parent: EntityKind) -> &[Dependency] {
    self.by_parent.get(&parent).map(Vec::as_slice).unwrap_or_default()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn department_is_blocked_by_students_and_classes() {
    let deps = graph().dependents(EntityKind::Department);
    let labels: Vec<&str> = deps.iter().map(|d| d.label.as_str()).collect();
    assert!(labels.contains(&"Department → Student"));
    assert!(labels.contains(&"Department → Class"));
    assert!(labels.contains(&"Department → Staff"));
    let student = deps.iter().find(|d| d.child == EntityKind::Student).unwrap();
    assert_eq!(student.fk, "department_id");
  }

  #[test]
  fn cascade_and_set_null_children_do_not_block() {
    let student_deps = graph().dependents(EntityKind::Student);
    assert!(student_deps.iter().all(|d| d.child != EntityKind::Grade));
    assert!(student_deps.iter().all(|d| d.child != EntityKind::Document));
    assert!(student_deps.iter().all(|d| d.fk != "student_rep_id"));
  }

  #[test]
  fn every_triple_names_a_real_column() {
    for parent in EntityKind::all() {
      for dep in graph().dependents(parent) {
        let column = dep.child.table().column(dep.fk).expect("declared fk");
        assert_eq!(column.reference.map(|r| r.parent), Some(parent));
      }
    }
  }

  #[test]
  fn leaf_entities_have_no_dependents() {
    assert!(graph().dependents(EntityKind::Grade).is_empty());
    assert!(graph().dependents(EntityKind::Promotion).is_empty());
  }
}
