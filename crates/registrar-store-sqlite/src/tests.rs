//! Integration tests for `SqliteStore` against an in-memory database.

use std::{collections::HashMap, sync::Arc};

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use serde_json::{Map, json};
use uuid::Uuid;

use registrar_core::{
  AccessLevel, ArchiveReason, EntityKind, Principal,
  approval::{Approval, ApprovalStatus, Decision},
  clock::FixedClock,
  entities::{
    Class, ClassTransfer, Department, Document, DocumentContent, DocumentType, Grade, Guardian,
    Role, Staff, StaffType, Student, Subject, Term,
  },
  export::Then,
  query::{ListQuery, OrderDir, Page},
  repository::{CredentialStore, Repository},
};

use crate::{Error, SqliteStore};

fn clock() -> Arc<FixedClock> {
  Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 9, 2, 8, 0, 0).unwrap()))
}

async fn store() -> (SqliteStore, Arc<FixedClock>) {
  let clock = clock();
  let s = SqliteStore::open_in_memory().await.expect("in-memory store").with_clock(clock.clone());
  (s, clock)
}

/// A real staff member to act as; audit columns must reference staff.
async fn actor(s: &SqliteStore) -> Principal {
  let staff = s
    .create(Principal::SYSTEM, Staff {
      first_name:    "Ada".into(),
      last_name:     "Lovelace".into(),
      email:         format!("ada-{}@school.example", Uuid::new_v4().simple()),
      phone:         None,
      department_id: None,
      role_id:       None,
      access_level:  AccessLevel::Editor,
      staff_type:    StaffType::Admin,
    })
    .await
    .unwrap();
  Principal(staff.id())
}

fn department(name: &str) -> Department {
  Department { name: name.into(), description: None, deletion_eligible: true }
}

fn student(number: &str, department_id: Option<Uuid>, guardian_id: Option<Uuid>) -> Student {
  Student {
    student_number: number.into(),
    first_name: "Alan".into(),
    last_name: "Turing".into(),
    date_of_birth: NaiveDate::from_ymd_opt(2010, 6, 23).unwrap(),
    email: None,
    department_id,
    class_id: None,
    level_id: None,
    guardian_id,
  }
}

fn guardian(email: &str) -> Guardian {
  Guardian {
    first_name: "Grace".into(),
    last_name:  "Hopper".into(),
    email:      email.into(),
    phone:      None,
    address:    None,
  }
}

fn core(err: Error) -> registrar_core::Error {
  match err {
    Error::Core(e) => e,
    other => panic!("expected a core error, got {other:?}"),
  }
}

// ─── Seed ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn seeded_rows_exist_and_are_pinned() {
  let (s, _) = store().await;
  let system: Staff = s.get_by_id::<Staff>(Principal::SYSTEM.id()).await.unwrap().body;
  assert_eq!(system.staff_type, StaffType::System);

  let q = ListQuery::default();
  let departments = s.execute_query::<Department>(&[], &q).await.unwrap();
  assert_eq!(departments.total, 1);
  let admin_dept = &departments.items[0];
  assert!(!admin_dept.body.deletion_eligible);

  let err = s.delete::<Department>(admin_dept.id(), Principal::SYSTEM).await.unwrap_err();
  assert!(matches!(core(err), registrar_core::Error::Undeletable(id) if id == admin_dept.id()));
}

#[tokio::test]
async fn deletion_guard_cannot_be_patched() {
  let (s, _) = store().await;
  let a = actor(&s).await;
  let q = ListQuery::default();
  let dept = s.execute_query::<Department>(&[], &q).await.unwrap().items.remove(0);
  let role = s.execute_query::<Role>(&[], &q).await.unwrap().items.remove(0);

  let mut patch = Map::new();
  patch.insert("deletion_eligible".into(), json!(true));
  let err = s.update::<Department>(dept.id(), a, patch.clone()).await.unwrap_err();
  assert!(matches!(
    core(err),
    registrar_core::Error::Validation { ref field, .. } if field == "deletion_eligible"
  ));
  let err = s.update::<Role>(role.id(), a, patch).await.unwrap_err();
  assert!(matches!(core(err), registrar_core::Error::Validation { .. }));

  let err = s.delete::<Department>(dept.id(), a).await.unwrap_err();
  assert!(matches!(core(err), registrar_core::Error::Undeletable(_)));
  let err = s.delete::<Role>(role.id(), a).await.unwrap_err();
  assert!(matches!(core(err), registrar_core::Error::Undeletable(_)));
}

// ─── Audit stamping ──────────────────────────────────────────────────────────

#[tokio::test]
async fn writes_stamp_the_acting_principal() {
  let (s, clock) = store().await;
  let creator = actor(&s).await;
  let editor = actor(&s).await;

  let d = s.create(creator, department("Science")).await.unwrap();
  assert_eq!(d.header.created_by, creator);
  assert_eq!(d.header.last_modified_by, creator);

  clock.advance(Duration::minutes(5));
  let mut patch = Map::new();
  patch.insert("description".into(), json!("Physics and chemistry"));
  let updated = s.update::<Department>(d.id(), editor, patch).await.unwrap();
  assert_eq!(updated.header.created_by, creator);
  assert_eq!(updated.header.last_modified_by, editor);
  assert!(updated.header.last_modified_at > updated.header.created_at);
  assert_eq!(updated.body.description.as_deref(), Some("Physics and chemistry"));

  let fetched = s.get_by_id::<Department>(d.id()).await.unwrap();
  assert_eq!(fetched.header, updated.header);
}

#[tokio::test]
async fn unknown_actor_is_a_missing_related_staff() {
  let (s, _) = store().await;
  let ghost = Principal(Uuid::new_v4());
  let err = s.create(ghost, department("Science")).await.unwrap_err();
  assert!(matches!(
    core(err),
    registrar_core::Error::RelatedEntityNotFound { ref entity, ref field }
      if entity == "Staff" && field.ends_with("_by")
  ));
  let page = s.execute_query::<Department>(&["name"], &ListQuery {
    text: Some("Science".into()),
    ..ListQuery::default()
  })
  .await
  .unwrap();
  assert_eq!(page.total, 0);
}

#[tokio::test]
async fn dangling_reference_names_the_parent() {
  let (s, _) = store().await;
  let a = actor(&s).await;
  let err = s.create(a, student("S-001", Some(Uuid::new_v4()), None)).await.unwrap_err();
  assert!(matches!(
    core(err),
    registrar_core::Error::RelatedEntityNotFound { ref entity, ref field }
      if entity == "Department" && field == "department_id"
  ));
}

#[tokio::test]
async fn patches_cannot_touch_header_or_locked_fields() {
  let (s, _) = store().await;
  let a = actor(&s).await;
  let d = s.create(a, department("Science")).await.unwrap();

  let mut patch = Map::new();
  patch.insert("is_archived".into(), json!(true));
  let err = s.update::<Department>(d.id(), a, patch).await.unwrap_err();
  assert!(matches!(core(err), registrar_core::Error::Validation { .. }));

  let mut patch = Map::new();
  patch.insert("staff_type".into(), json!("support"));
  let err = s.update::<Staff>(a.id(), a, patch).await.unwrap_err();
  assert!(matches!(core(err), registrar_core::Error::Validation { ref field, .. } if field == "staff_type"));

  let mut patch = Map::new();
  patch.insert("name".into(), json!("   "));
  let err = s.update::<Department>(d.id(), a, patch).await.unwrap_err();
  assert!(matches!(core(err), registrar_core::Error::Validation { ref field, .. } if field == "name"));
}

// ─── Archive and restore ─────────────────────────────────────────────────────

#[tokio::test]
async fn archive_then_restore_round_trip() {
  let (s, _) = store().await;
  let a = actor(&s).await;
  let d = s.create(a, department("Science")).await.unwrap();

  let archived =
    s.archive::<Department>(d.id(), a, ArchiveReason::Administrative).await.unwrap();
  let stamp = archived.header.archive.clone().unwrap();
  assert_eq!(stamp.by, a);
  assert_eq!(stamp.reason, ArchiveReason::Administrative);

  let err = s.get_by_id::<Department>(d.id()).await.unwrap_err();
  assert!(matches!(core(err), registrar_core::Error::NotFound { entity: "Department", .. }));
  let from_archive = s.get_archive_by_id::<Department>(d.id()).await.unwrap();
  assert!(from_archive.header.is_archived());

  let restored = s.restore::<Department>(d.id(), a).await.unwrap();
  assert!(!restored.header.is_archived());
  assert!(restored.header.last_modified_at > archived.header.last_modified_at);

  let json = serde_json::to_value(s.get_by_id::<Department>(d.id()).await.unwrap()).unwrap();
  assert_eq!(json["is_archived"], json!(false));
  assert!(json["archived_at"].is_null());
  assert!(json["archived_by"].is_null());
  assert!(json["archive_reason"].is_null());
}

#[tokio::test]
async fn transitions_are_checked() {
  let (s, _) = store().await;
  let a = actor(&s).await;
  let d = s.create(a, department("Science")).await.unwrap();

  let err = s.restore::<Department>(d.id(), a).await.unwrap_err();
  assert!(matches!(core(err), registrar_core::Error::NotArchived(_)));

  s.archive::<Department>(d.id(), a, ArchiveReason::Other).await.unwrap();
  let err = s.archive::<Department>(d.id(), a, ArchiveReason::Other).await.unwrap_err();
  assert!(matches!(core(err), registrar_core::Error::AlreadyArchived(id) if id == d.id()));

  let err = s.restore::<Department>(Uuid::new_v4(), a).await.unwrap_err();
  assert!(matches!(core(err), registrar_core::Error::NotFound { .. }));
}

#[tokio::test]
async fn active_only_unique_value_is_freed_by_archive() {
  let (s, _) = store().await;
  let a = actor(&s).await;
  let subject = |code: &str| Subject {
    name:          "Mathematics".into(),
    code:          code.into(),
    description:   None,
    department_id: None,
    level_id:      None,
  };

  let first = s.create(a, subject("MATH-7")).await.unwrap();
  s.archive::<Subject>(first.id(), a, ArchiveReason::Administrative).await.unwrap();
  s.create(a, subject("MATH-7")).await.unwrap();

  let err = s.restore::<Subject>(first.id(), a).await.unwrap_err();
  assert!(matches!(
    core(err),
    registrar_core::Error::UniqueViolation { ref field, ref value } if field == "code" && value == "MATH-7"
  ));
  assert!(s.get_archive_by_id::<Subject>(first.id()).await.is_ok());
}

// ─── Unique violations ───────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_role_name_is_a_unique_violation() {
  let (s, _) = store().await;
  let a = actor(&s).await;
  let principal = Role { name: "Principal".into(), description: None, deletion_eligible: true };
  s.create(a, principal.clone()).await.unwrap();

  let err = s.create(a, principal).await.unwrap_err();
  assert!(matches!(
    core(err),
    registrar_core::Error::UniqueViolation { ref field, .. } if field == "name"
  ));
}

#[tokio::test]
async fn email_uniqueness_ignores_case() {
  let (s, _) = store().await;
  let a = actor(&s).await;
  let staff = |email: &str| Staff {
    first_name:    "Ada".into(),
    last_name:     "Lovelace".into(),
    email:         email.into(),
    phone:         None,
    department_id: None,
    role_id:       None,
    access_level:  AccessLevel::Viewer,
    staff_type:    StaffType::Support { position: None },
  };
  s.create(a, staff("ada@school.example")).await.unwrap();
  let err = s.create(a, staff("ADA@School.Example")).await.unwrap_err();
  assert!(matches!(
    core(err),
    registrar_core::Error::UniqueViolation { ref field, .. } if field == "email"
  ));

  let g = s.create(a, guardian("grace@home.example")).await.unwrap();
  let err = s.create(a, guardian("Grace@Home.example")).await.unwrap_err();
  assert!(matches!(core(err), registrar_core::Error::UniqueViolation { .. }));
  // Archiving the first guardian frees the address in any case.
  s.archive::<Guardian>(g.id(), a, ArchiveReason::Administrative).await.unwrap();
  s.create(a, guardian("Grace@Home.example")).await.unwrap();
}

// ─── Hard delete ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_is_blocked_by_active_dependents() {
  let (s, _) = store().await;
  let a = actor(&s).await;
  let d = s.create(a, department("Science")).await.unwrap();
  let st = s.create(a, student("S-001", Some(d.id()), None)).await.unwrap();

  let err = s.delete::<Department>(d.id(), a).await.unwrap_err();
  match core(err) {
    registrar_core::Error::ArchiveDependency { labels } => {
      assert_eq!(labels, vec!["Department → Student".to_owned()]);
    }
    other => panic!("unexpected {other:?}"),
  }
  assert!(s.exists::<Department>(d.id()).await.unwrap());

  let archived = s.archive::<Student>(st.id(), a, ArchiveReason::Withdrawn).await.unwrap();
  s.delete::<Department>(d.id(), a).await.unwrap();
  assert!(!s.exists::<Department>(d.id()).await.unwrap());

  // The archived student's optional reference was cleared, by the deleter.
  let after = s.get_archive_by_id::<Student>(st.id()).await.unwrap();
  assert_eq!(after.body.department_id, None);
  assert_eq!(after.header.last_modified_by, a);
  assert!(after.header.last_modified_at >= archived.header.last_modified_at);
  assert!(after.header.is_archived());
}

#[tokio::test]
async fn archived_required_dependent_still_blocks_delete() {
  let (s, _) = store().await;
  let a = actor(&s).await;
  let subject = s
    .create(a, Subject {
      name:          "Physics".into(),
      code:          "PHY-1".into(),
      description:   None,
      department_id: None,
      level_id:      None,
    })
    .await
    .unwrap();
  let st = s.create(a, student("S-002", None, None)).await.unwrap();
  let grade = s
    .create(a, Grade {
      student_id:       st.id(),
      subject_id:       subject.id(),
      graded_by:        None,
      academic_session: "2024/2025".into(),
      term:             Term::First,
      score:            64.0,
      remark:           None,
    })
    .await
    .unwrap();
  s.archive::<Grade>(grade.id(), a, ArchiveReason::Other).await.unwrap();

  let err = s.delete::<Subject>(subject.id(), a).await.unwrap_err();
  assert!(matches!(
    core(err),
    registrar_core::Error::ArchiveDependency { ref labels } if labels == &["Subject → Grade".to_owned()]
  ));
  assert!(s.exists::<Subject>(subject.id()).await.unwrap());
}

#[tokio::test]
async fn deleting_a_student_cascades_to_owned_rows() {
  let (s, _) = store().await;
  let a = actor(&s).await;
  let st = s.create(a, student("S-003", None, None)).await.unwrap();
  let doc = s
    .create(a, Document {
      student_id:    st.id(),
      title:         "Transcript".into(),
      document_type: DocumentType::Transcript,
      object_key:    None,
      mime_type:     None,
      size_bytes:    None,
    })
    .await
    .unwrap();

  s.delete::<Student>(st.id(), a).await.unwrap();
  assert!(s.snapshot(EntityKind::Document, doc.id()).await.unwrap().is_none());
}

#[tokio::test]
async fn archived_rows_are_deleted_from_the_archive_only() {
  let (s, _) = store().await;
  let a = actor(&s).await;
  let d = s.create(a, department("History")).await.unwrap();

  let err = s.delete_archive::<Department>(d.id(), a).await.unwrap_err();
  assert!(matches!(core(err), registrar_core::Error::NotFound { .. }));

  s.archive::<Department>(d.id(), a, ArchiveReason::Administrative).await.unwrap();
  let err = s.delete::<Department>(d.id(), a).await.unwrap_err();
  assert!(matches!(core(err), registrar_core::Error::NotFound { .. }));

  s.delete_archive::<Department>(d.id(), a).await.unwrap();
  assert!(s.snapshot(EntityKind::Department, d.id()).await.unwrap().is_none());
}

// ─── Approval ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn approval_is_terminal_and_moves_the_student() {
  let (s, _) = store().await;
  let a = actor(&s).await;
  let st = s.create(a, student("S-004", None, None)).await.unwrap();
  let class = s
    .create(a, Class {
      name:             "7B".into(),
      academic_session: "2024/2025".into(),
      level_id:         None,
      department_id:    None,
      supervisor_id:    None,
      student_rep_id:   None,
    })
    .await
    .unwrap();

  // A caller-supplied status is reset on create.
  let mut approval = Approval::pending();
  approval.status = ApprovalStatus::Approved;
  let transfer = s
    .create(a, ClassTransfer {
      student_id: st.id(),
      from_class_id: None,
      to_class_id: class.id(),
      reason: "timetable clash".into(),
      approval,
    })
    .await
    .unwrap();
  assert_eq!(transfer.body.approval.status, ApprovalStatus::Pending);

  let approved =
    s.decide::<ClassTransfer>(transfer.id(), a, Decision::Approve).await.unwrap();
  assert_eq!(approved.body.approval.status, ApprovalStatus::Approved);
  assert!(approved.body.approval.status_updated_at.is_some());
  assert_eq!(approved.body.approval.status_updated_by, Some(a));

  let moved = s.get_by_id::<Student>(st.id()).await.unwrap();
  assert_eq!(moved.body.class_id, Some(class.id()));
  assert_eq!(moved.header.last_modified_by, a);

  let err = s.decide::<ClassTransfer>(transfer.id(), a, Decision::Approve).await.unwrap_err();
  assert!(matches!(
    core(err),
    registrar_core::Error::StatusAlreadySet { status: ApprovalStatus::Approved, .. }
  ));
}

#[tokio::test]
async fn rejection_leaves_the_student_alone() {
  let (s, _) = store().await;
  let a = actor(&s).await;
  let st = s.create(a, student("S-005", None, None)).await.unwrap();
  let class = s
    .create(a, Class {
      name:             "8A".into(),
      academic_session: "2024/2025".into(),
      level_id:         None,
      department_id:    None,
      supervisor_id:    None,
      student_rep_id:   None,
    })
    .await
    .unwrap();
  let transfer = s
    .create(a, ClassTransfer {
      student_id: st.id(),
      from_class_id: None,
      to_class_id: class.id(),
      reason: "parent request".into(),
      approval: Approval::pending(),
    })
    .await
    .unwrap();

  let rejected = s
    .decide::<ClassTransfer>(transfer.id(), a, Decision::Reject { reason: "class is full".into() })
    .await
    .unwrap();
  assert_eq!(rejected.body.approval.status, ApprovalStatus::Rejected);
  assert_eq!(rejected.body.approval.rejection_reason.as_deref(), Some("class is full"));
  assert_eq!(s.get_by_id::<Student>(st.id()).await.unwrap().body.class_id, None);
}

// ─── Orphan sweep ────────────────────────────────────────────────────────────

#[tokio::test]
async fn guardian_sweep_archives_once_all_wards_are_archived() {
  let (s, _) = store().await;
  let a = actor(&s).await;
  let g = s.create(a, guardian("grace@home.example")).await.unwrap();
  let lonely = s.create(a, guardian("nobody@home.example")).await.unwrap();
  let s1 = s.create(a, student("S-010", None, Some(g.id()))).await.unwrap();
  let s2 = s.create(a, student("S-011", None, Some(g.id()))).await.unwrap();

  s.archive::<Student>(s1.id(), a, ArchiveReason::Graduated).await.unwrap();
  let swept = s.sweep_orphans(EntityKind::Guardian, a, ArchiveReason::Graduated).await.unwrap();
  assert!(swept.is_empty(), "one ward is still active");

  s.archive::<Student>(s2.id(), a, ArchiveReason::Graduated).await.unwrap();
  let swept = s.sweep_orphans(EntityKind::Guardian, a, ArchiveReason::Graduated).await.unwrap();
  assert_eq!(swept, vec![g.id()]);

  let archived = s.get_archive_by_id::<Guardian>(g.id()).await.unwrap();
  assert_eq!(archived.header.archive.as_ref().map(|st| st.reason), Some(ArchiveReason::Graduated));
  // A guardian who never had wards is not an orphan.
  assert!(s.exists::<Guardian>(lonely.id()).await.unwrap());

  // A new ward does not bring the guardian back.
  s.create(a, student("S-012", None, Some(g.id()))).await.unwrap();
  assert!(!s.exists::<Guardian>(g.id()).await.unwrap());
  assert!(s.get_archive_by_id::<Guardian>(g.id()).await.is_ok());
}

#[tokio::test]
async fn sweep_requires_an_orphan_rule() {
  let (s, _) = store().await;
  let err = s
    .sweep_orphans(EntityKind::Department, Principal::SYSTEM, ArchiveReason::Other)
    .await
    .unwrap_err();
  assert!(matches!(core(err), registrar_core::Error::Validation { .. }));
}

// ─── Queries ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_queries_respect_the_partition() {
  let (s, _) = store().await;
  let a = actor(&s).await;
  let keep = s.create(a, guardian("keep@home.example")).await.unwrap();
  let gone = s.create(a, guardian("gone@home.example")).await.unwrap();
  s.archive::<Guardian>(gone.id(), a, ArchiveReason::Other).await.unwrap();

  let q = ListQuery::default();
  let active = s.execute_query::<Guardian>(&[], &q).await.unwrap();
  assert_eq!(active.items.iter().map(|r| r.id()).collect::<Vec<_>>(), vec![keep.id()]);
  let archived = s.execute_archive_query::<Guardian>(&[], &q).await.unwrap();
  assert_eq!(archived.items.iter().map(|r| r.id()).collect::<Vec<_>>(), vec![gone.id()]);
}

#[tokio::test]
async fn search_and_filters_narrow_the_page() {
  let (s, _) = store().await;
  let a = actor(&s).await;
  let science = s.create(a, department("Science")).await.unwrap();
  for (name, code, dept) in [
    ("Algebra", "MATH-1", Some(science.id())),
    ("Geometry", "MATH-2", Some(science.id())),
    ("Literature", "ENG-1", None),
  ] {
    s.create(a, Subject {
      name:          name.into(),
      code:          code.into(),
      description:   None,
      department_id: dept,
      level_id:      None,
    })
    .await
    .unwrap();
  }

  let q = ListQuery { text: Some("math".into()), ..ListQuery::default() };
  let page = s.execute_query::<Subject>(&["code"], &q).await.unwrap();
  assert_eq!(page.total, 2);

  let params: HashMap<String, String> =
    [("department_id".to_owned(), science.id().to_string())].into_iter().collect();
  let q = ListQuery::from_params(EntityKind::Subject.table(), &params).unwrap();
  let page = s.execute_query::<Subject>(&[], &q).await.unwrap();
  assert_eq!(page.total, 2);
  assert!(page.items.iter().all(|r| r.body.department_id == Some(science.id())));

  let err = s.execute_query::<Subject>(&["department_id"], &q).await.unwrap_err();
  assert!(matches!(core(err), registrar_core::Error::Validation { .. }));
}

#[tokio::test]
async fn search_folds_case_beyond_ascii() {
  let (s, _) = store().await;
  let a = actor(&s).await;
  s.create(a, department("ÉTUDES")).await.unwrap();
  s.create(a, department("Études Supérieures")).await.unwrap();
  s.create(a, department("Science")).await.unwrap();

  for text in ["études", "ÉTUDES", "tudes"] {
    let q = ListQuery { text: Some(text.into()), ..ListQuery::default() };
    let page = s.execute_query::<Department>(&["name"], &q).await.unwrap();
    assert_eq!(page.total, 2, "searching {text:?}");
  }

  let q = ListQuery { text: Some("supérieures".into()), ..ListQuery::default() };
  let page = s.execute_query::<Department>(&["name"], &q).await.unwrap();
  assert_eq!(page.total, 1);
}

#[tokio::test]
async fn pagination_is_stable_under_identical_timestamps() {
  let (s, _) = store().await;
  let a = actor(&s).await;
  for i in 0..120 {
    s.create(a, Subject {
      name:          format!("Subject {i}"),
      code:          format!("SUB-{i:03}"),
      description:   None,
      department_id: None,
      level_id:      None,
    })
    .await
    .unwrap();
  }

  let first = ListQuery { limit: 50, ..ListQuery::default() };
  let second = ListQuery { limit: 50, offset: 50, ..ListQuery::default() };
  let ids = |p: &Page<Subject>| p.items.iter().map(|r| r.id()).collect::<Vec<_>>();

  let a1 = ids(&s.execute_query::<Subject>(&[], &first).await.unwrap());
  let a2 = ids(&s.execute_query::<Subject>(&[], &first).await.unwrap());
  let b = s.execute_query::<Subject>(&[], &second).await.unwrap();
  assert_eq!(a1, a2);
  assert_eq!(b.total, 120);
  assert_eq!(a1.len(), 50);
  assert!(ids(&b).iter().all(|id| !a1.contains(id)));

  // Ties on created_at fall back to ascending id.
  let mut sorted = a1.clone();
  sorted.sort_by_key(|id| id.hyphenated().to_string());
  assert_eq!(a1, sorted);

  let asc = ListQuery { order_dir: OrderDir::Asc, ..first };
  assert_eq!(ids(&s.execute_query::<Subject>(&[], &asc).await.unwrap()), a1);
}

// ─── Export support ──────────────────────────────────────────────────────────

#[tokio::test]
async fn finalize_export_marks_and_archives() {
  let (s, _) = store().await;
  let a = actor(&s).await;
  let g = s.create(a, guardian("export@home.example")).await.unwrap();

  s.finalize_export(EntityKind::Guardian, g.id(), a, Then::Archive).await.unwrap();
  let snapshot = s.snapshot(EntityKind::Guardian, g.id()).await.unwrap().unwrap();
  assert_eq!(snapshot["is_exported"], json!(true));
  assert_eq!(snapshot["is_archived"], json!(true));
  assert_eq!(snapshot["archive_reason"], json!("ADMINISTRATIVE"));
  assert_eq!(snapshot["email"], json!("export@home.example"));
}

#[tokio::test]
async fn finalize_export_delete_is_dependency_gated() {
  let (s, _) = store().await;
  let a = actor(&s).await;
  let g = s.create(a, guardian("ward@home.example")).await.unwrap();
  let st = s.create(a, student("S-020", None, Some(g.id()))).await.unwrap();

  let err = s.finalize_export(EntityKind::Guardian, g.id(), a, Then::Delete).await.unwrap_err();
  assert!(matches!(core(err), registrar_core::Error::ArchiveDependency { .. }));
  // Nothing was written, not even the export flag.
  let snapshot = s.snapshot(EntityKind::Guardian, g.id()).await.unwrap().unwrap();
  assert_eq!(snapshot["is_exported"], json!(false));

  let children = s.snapshot_children(EntityKind::Student, "guardian_id", g.id()).await.unwrap();
  assert_eq!(children.len(), 1);
  assert_eq!(children[0]["id"], json!(st.id().to_string()));

  s.delete::<Student>(st.id(), a).await.unwrap();
  s.finalize_export(EntityKind::Guardian, g.id(), a, Then::Delete).await.unwrap();
  assert!(s.snapshot(EntityKind::Guardian, g.id()).await.unwrap().is_none());
}

#[tokio::test]
async fn document_content_is_recorded() {
  let (s, _) = store().await;
  let a = actor(&s).await;
  let st = s.create(a, student("S-030", None, None)).await.unwrap();
  let doc = s
    .create(a, Document {
      student_id:    st.id(),
      title:         "Birth certificate".into(),
      document_type: DocumentType::Certificate,
      object_key:    Some("smuggled".into()),
      mime_type:     None,
      size_bytes:    None,
    })
    .await
    .unwrap();
  assert_eq!(doc.body.object_key, None);

  let key = Document::object_key_for(st.id(), doc.id());
  let updated = s
    .record_document_content(doc.id(), a, DocumentContent {
      object_key: key.clone(),
      mime_type:  "application/pdf".into(),
      size_bytes: 1024,
    })
    .await
    .unwrap();
  assert_eq!(updated.body.object_key, Some(key));
  assert_eq!(updated.body.size_bytes, Some(1024));
  assert_eq!(updated.header.last_modified_by, a);
}

// ─── Credentials ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn bootstrap_admin_is_idempotent() {
  let (s, _) = store().await;
  let first = s.bootstrap_admin("Admin@School.example".into(), "$argon2id$one".into()).await.unwrap();
  let again = s.bootstrap_admin("admin@school.example".into(), "$argon2id$two".into()).await.unwrap();
  assert_eq!(first, again);

  let login = s.find_login("ADMIN@school.example".into()).await.unwrap().unwrap();
  assert_eq!(login.principal, first);
  assert_eq!(login.password_hash, "$argon2id$two");
  assert_eq!(login.access_level, AccessLevel::Admin);
  assert!(!login.is_archived);

  let admin = s.get_by_id::<Staff>(first.id()).await.unwrap();
  assert_eq!(admin.header.created_by, Principal::SYSTEM);
}

#[tokio::test]
async fn staff_without_password_cannot_log_in() {
  let (s, _) = store().await;
  let a = actor(&s).await;
  let email = s.get_by_id::<Staff>(a.id()).await.unwrap().body.email;
  assert!(s.find_login(email.clone()).await.unwrap().is_none());

  s.set_password(a.id(), "$argon2id$x".into()).await.unwrap();
  assert_eq!(s.find_login(email).await.unwrap().unwrap().access_level, AccessLevel::Editor);

  let err = s.set_password(Uuid::new_v4(), "$argon2id$y".into()).await.unwrap_err();
  assert!(matches!(core(err), registrar_core::Error::NotFound { .. }));
}

#[tokio::test]
async fn access_level_changes_only_through_a_grant() {
  let (s, clock) = store().await;
  let granter = actor(&s).await;
  let clerk = actor(&s).await;

  let mut patch = Map::new();
  patch.insert("access_level".into(), json!("admin"));
  let err = s.update::<Staff>(clerk.id(), clerk, patch).await.unwrap_err();
  assert!(matches!(
    core(err),
    registrar_core::Error::Validation { ref field, .. } if field == "access_level"
  ));

  clock.advance(Duration::minutes(1));
  let granted = s.set_access_level(clerk.id(), granter, AccessLevel::Admin).await.unwrap();
  assert_eq!(granted.body.access_level, AccessLevel::Admin);
  assert_eq!(granted.header.last_modified_by, granter);
  let fetched = s.get_by_id::<Staff>(clerk.id()).await.unwrap();
  assert_eq!(fetched.body.access_level, AccessLevel::Admin);

  let err = s.set_access_level(Principal::SYSTEM.id(), granter, AccessLevel::Viewer).await.unwrap_err();
  assert!(matches!(core(err), registrar_core::Error::Validation { .. }));
  let err = s.set_access_level(Uuid::new_v4(), granter, AccessLevel::Viewer).await.unwrap_err();
  assert!(matches!(core(err), registrar_core::Error::NotFound { .. }));
}
