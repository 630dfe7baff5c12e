//! The lifecycle header carried by every managed entity, and the audit mixin
//! that stamps it.
//!
//! An entity is `Active` or `Archived` while it exists; hard deletion removes
//! it from the store altogether. The archive stamp is a single optional value
//! so "archived" and "all three archive fields set" cannot drift apart.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::{Error, Result, principal::Principal};

// ─── Archive reason ──────────────────────────────────────────────────────────

/// Why an entity left the active set.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ArchiveReason {
  Administrative,
  Graduated,
  Transferred,
  Withdrawn,
  Expelled,
  Deceased,
  Resigned,
  Retired,
  Other,
}

// ─── States ──────────────────────────────────────────────────────────────────

/// Entity lifecycle state while the row exists. `Deleted` is terminal and
/// represented by absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
  Active,
  Archived,
}

/// Which partition of a table an operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
  Active,
  Archived,
}

impl Partition {
  pub fn is_archived(self) -> bool { matches!(self, Self::Archived) }
}

/// Who archived an entity, when, and why. Set and cleared as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveStamp {
  pub at:     DateTime<Utc>,
  pub by:     Principal,
  pub reason: ArchiveReason,
}

// ─── Header ──────────────────────────────────────────────────────────────────

/// Audit and soft-delete header shared by every managed entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lifecycle {
  pub id:               Uuid,
  pub created_at:       DateTime<Utc>,
  pub created_by:       Principal,
  pub last_modified_at: DateTime<Utc>,
  pub last_modified_by: Principal,
  pub archive:          Option<ArchiveStamp>,
  /// Set once an export artifact has been produced for this entity.
  pub is_exported:      bool,
}

impl Lifecycle {
  /// Stamp a freshly created, active entity.
  pub fn create(actor: Principal, now: DateTime<Utc>) -> Self {
    Self::create_with_id(Uuid::new_v4(), actor, now)
  }

  /// As [`Lifecycle::create`], with a caller-chosen id (seed rows).
  pub fn create_with_id(id: Uuid, actor: Principal, now: DateTime<Utc>) -> Self {
    Self {
      id,
      created_at: now,
      created_by: actor,
      last_modified_at: now,
      last_modified_by: actor,
      archive: None,
      is_exported: false,
    }
  }

  pub fn is_archived(&self) -> bool { self.archive.is_some() }

  pub fn state(&self) -> LifecycleState {
    if self.is_archived() { LifecycleState::Archived } else { LifecycleState::Active }
  }

  pub fn in_partition(&self, partition: Partition) -> bool {
    self.is_archived() == partition.is_archived()
  }

  /// Record a mutation by `actor`. `last_modified_at` strictly advances even
  /// when the clock has not moved.
  pub fn touch(&mut self, actor: Principal, now: DateTime<Utc>) {
    let floor = self.last_modified_at + Duration::microseconds(1);
    self.last_modified_at = now.max(floor);
    self.last_modified_by = actor;
  }

  /// `Active → Archived`.
  pub fn archive(
    &mut self,
    actor: Principal,
    reason: ArchiveReason,
    now: DateTime<Utc>,
  ) -> Result<()> {
    if self.is_archived() {
      return Err(Error::AlreadyArchived(self.id));
    }
    self.touch(actor, now);
    self.archive = Some(ArchiveStamp { at: self.last_modified_at, by: actor, reason });
    Ok(())
  }

  /// `Archived → Active`.
  pub fn restore(&mut self, actor: Principal, now: DateTime<Utc>) -> Result<()> {
    if !self.is_archived() {
      return Err(Error::NotArchived(self.id));
    }
    self.archive = None;
    self.touch(actor, now);
    Ok(())
  }

  /// Idempotently flag the entity as exported.
  pub fn mark_exported(&mut self, actor: Principal, now: DateTime<Utc>) {
    if !self.is_exported {
      self.is_exported = true;
      self.touch(actor, now);
    }
  }
}

/// Flat wire form: the archive stamp is spread over three nullable fields
/// next to an explicit `is_archived` flag.
#[derive(Serialize)]
struct LifecycleWire<'a> {
  id:               Uuid,
  created_at:       DateTime<Utc>,
  created_by:       Principal,
  last_modified_at: DateTime<Utc>,
  last_modified_by: Principal,
  is_archived:      bool,
  archived_at:      Option<DateTime<Utc>>,
  archived_by:      Option<Principal>,
  archive_reason:   Option<&'a ArchiveReason>,
  is_exported:      bool,
}

impl Serialize for Lifecycle {
  fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    LifecycleWire {
      id:               self.id,
      created_at:       self.created_at,
      created_by:       self.created_by,
      last_modified_at: self.last_modified_at,
      last_modified_by: self.last_modified_by,
      is_archived:      self.is_archived(),
      archived_at:      self.archive.as_ref().map(|a| a.at),
      archived_by:      self.archive.as_ref().map(|a| a.by),
      archive_reason:   self.archive.as_ref().map(|a| &a.reason),
      is_exported:      self.is_exported,
    }
    .serialize(serializer)
  }
}

/// Names of the header attributes, in storage order.
pub const HEADER_FIELDS: &[&str] = &[
  "id",
  "created_at",
  "created_by",
  "last_modified_at",
  "last_modified_by",
  "is_archived",
  "archived_at",
  "archived_by",
  "archive_reason",
  "is_exported",
];

/// Header attributes that reference the acting staff member.
pub const AUDIT_REFERENCES: &[&str] = &["created_by", "last_modified_by", "archived_by"];

// ─── Record ──────────────────────────────────────────────────────────────────

/// A managed entity as stored: lifecycle header plus domain body.
#[derive(Debug, Clone, Serialize)]
pub struct Record<T> {
  #[serde(flatten)]
  pub header: Lifecycle,
  #[serde(flatten)]
  pub body:   T,
}

impl<T> Record<T> {
  pub fn id(&self) -> Uuid { self.header.id }
}
