//! Managed entity bodies and their table declarations.

pub mod academic;
pub mod people;
pub mod records;
pub mod workflows;

pub use academic::{Class, Department, Level, Role, Subject};
pub use people::{Guardian, Qualification, Staff, StaffType, Student};
pub use records::{Document, DocumentContent, DocumentType, Grade, Term};
pub use workflows::{ClassTransfer, DepartmentTransfer, Promotion, Repetition};

#[cfg(test)]
mod tests {
  use std::collections::BTreeSet;

  use chrono::NaiveDate;
  use uuid::Uuid;

  use super::*;
  use crate::{
    approval::Approval,
    lifecycle::HEADER_FIELDS,
    principal::AccessLevel,
    schema::{Entity, EntityKind},
  };

  /// Serialised keys of `body` must be declared columns, and every
  /// non-nullable column must be present.
  fn assert_matches_table<T: Entity>(body: &T) {
    let table = T::table();
    let json = serde_json::to_value(body).unwrap();
    let keys: BTreeSet<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
    for key in &keys {
      assert!(table.column(key).is_some(), "{}: undeclared field {key}", table.name);
    }
    for column in table.columns.iter().filter(|c| !c.nullable) {
      assert!(keys.contains(column.name), "{}: missing column {}", table.name, column.name);
    }
  }

  fn id() -> Uuid { Uuid::new_v4() }

  fn dob() -> NaiveDate { NaiveDate::from_ymd_opt(2010, 3, 14).unwrap() }

  #[test]
  fn every_entity_serialises_to_its_columns() {
    assert_matches_table(&Department {
      name:              "Science".into(),
      description:       None,
      deletion_eligible: true,
    });
    assert_matches_table(&Role { name: "Principal".into(), description: None, deletion_eligible: true });
    assert_matches_table(&Level { name: "Year 7".into(), rank: 7 });
    assert_matches_table(&Class {
      name:             "7B".into(),
      academic_session: "2024/2025".into(),
      level_id:         Some(id()),
      department_id:    None,
      supervisor_id:    None,
      student_rep_id:   None,
    });
    assert_matches_table(&Subject {
      name:          "Mathematics".into(),
      code:          "MATH-7".into(),
      description:   None,
      department_id: None,
      level_id:      None,
    });
    for staff_type in [
      StaffType::Admin,
      StaffType::Educator { specialization: Some("Physics".into()) },
      StaffType::Support { position: None },
      StaffType::System,
    ] {
      assert_matches_table(&Staff {
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        email: "ada@school.example".into(),
        phone: None,
        department_id: None,
        role_id: None,
        access_level: AccessLevel::Editor,
        staff_type,
      });
    }
    assert_matches_table(&Qualification {
      educator_id: id(),
      title:       "PGCE".into(),
      institution: None,
      awarded_on:  None,
    });
    assert_matches_table(&Guardian {
      first_name: "Grace".into(),
      last_name:  "Hopper".into(),
      email:      "grace@home.example".into(),
      phone:      None,
      address:    None,
    });
    assert_matches_table(&Student {
      student_number: "S-001".into(),
      first_name:     "Alan".into(),
      last_name:      "Turing".into(),
      date_of_birth:  dob(),
      email:          None,
      department_id:  None,
      class_id:       None,
      level_id:       None,
      guardian_id:    None,
    });
    assert_matches_table(&Grade {
      student_id:       id(),
      subject_id:       id(),
      graded_by:        None,
      academic_session: "2024/2025".into(),
      term:             Term::First,
      score:            88.5,
      remark:           None,
    });
    assert_matches_table(&Document {
      student_id:    id(),
      title:         "Transcript".into(),
      document_type: DocumentType::Transcript,
      object_key:    None,
      mime_type:     None,
      size_bytes:    None,
    });
    assert_matches_table(&ClassTransfer {
      student_id:    id(),
      from_class_id: None,
      to_class_id:   id(),
      reason:        "timetable clash".into(),
      approval:      Approval::pending(),
    });
    assert_matches_table(&DepartmentTransfer {
      student_id:         id(),
      from_department_id: None,
      to_department_id:   id(),
      reason:             "stream change".into(),
      approval:           Approval::pending(),
    });
    assert_matches_table(&Repetition {
      student_id:       id(),
      level_id:         id(),
      academic_session: "2024/2025".into(),
      reason:           "absence".into(),
      approval:         Approval::pending(),
    });
    assert_matches_table(&Promotion {
      student_id:       id(),
      from_level_id:    None,
      to_level_id:      id(),
      academic_session: "2024/2025".into(),
      approval:         Approval::pending(),
    });
  }

  #[test]
  fn tables_are_consistent() {
    let mut names = BTreeSet::new();
    let mut collections = BTreeSet::new();
    for kind in EntityKind::all() {
      let table = kind.table();
      assert_eq!(table.kind, kind);
      assert!(names.insert(table.name), "duplicate table {}", table.name);
      assert!(collections.insert(table.collection), "duplicate collection {}", table.collection);

      for column in table.columns {
        assert!(!HEADER_FIELDS.contains(&column.name), "{} shadows a header field", column.name);
      }
      for attr in table.orderable.iter().chain(table.filterable).chain(table.locked) {
        assert!(table.column(attr).is_some(), "{}: unknown attribute {attr}", table.name);
      }
      for attr in table.searchable {
        let column = table.column(attr).expect("searchable column declared");
        assert!(column.ty.is_textual(), "{}: {attr} is not textual", table.name);
      }
      for rule in table.orphan_rule {
        let column = rule.child.table().column(rule.fk).expect("orphan fk declared");
        assert_eq!(column.reference.map(|r| r.parent), Some(kind));
      }
    }
  }

  #[test]
  fn staff_subtype_roundtrips_through_flattened_tag() {
    let json = serde_json::json!({
      "first_name": "Ada",
      "last_name": "Lovelace",
      "email": "ada@school.example",
      "staff_type": "educator",
      "specialization": "Computing"
    });
    let staff: Staff = serde_json::from_value(json).unwrap();
    assert_eq!(staff.access_level, AccessLevel::Viewer);
    assert_eq!(staff.staff_type, StaffType::Educator { specialization: Some("Computing".into()) });
  }
}
