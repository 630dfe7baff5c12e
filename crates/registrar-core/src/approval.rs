//! Approval lifecycle for transfer, repetition, and promotion workflows.
//!
//! `Pending → Approved` or `Pending → Rejected`. Both outcomes are terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, principal::Principal, schema::Entity, validate};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
  #[default]
  Pending,
  Approved,
  Rejected,
}

impl ApprovalStatus {
  pub fn is_terminal(self) -> bool { !matches!(self, Self::Pending) }
}

/// A reviewer's verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
  Approve,
  Reject { reason: String },
}

/// Approval fields embedded in every workflow body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Approval {
  pub status:            ApprovalStatus,
  pub status_updated_by: Option<Principal>,
  pub status_updated_at: Option<DateTime<Utc>>,
  pub rejection_reason:  Option<String>,
}

/// Attributes of [`Approval`]; only [`Approval::decide`] may change them.
pub const APPROVAL_FIELDS: &[&str] =
  &["status", "status_updated_by", "status_updated_at", "rejection_reason"];

impl Approval {
  pub fn pending() -> Self { Self::default() }

  /// Apply `decision`. Fails with [`Error::StatusAlreadySet`] once terminal.
  pub fn decide(
    &mut self,
    id: Uuid,
    actor: Principal,
    decision: Decision,
    now: DateTime<Utc>,
  ) -> Result<ApprovalStatus> {
    if self.status.is_terminal() {
      return Err(Error::StatusAlreadySet { id, status: self.status });
    }
    match decision {
      Decision::Approve => {
        self.status = ApprovalStatus::Approved;
        self.rejection_reason = None;
      }
      Decision::Reject { reason } => {
        validate::required_text("rejection_reason", &reason, 1000)?;
        self.status = ApprovalStatus::Rejected;
        self.rejection_reason = Some(reason);
      }
    }
    self.status_updated_by = Some(actor);
    self.status_updated_at = Some(now);
    Ok(self.status)
  }
}

/// What approving a workflow does to the student it concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Effect {
  pub student_id: Uuid,
  /// Column on the student to overwrite.
  pub column:     &'static str,
  pub value:      Uuid,
}

/// An entity that moves through the approval lifecycle.
pub trait Workflow: Entity {
  fn approval(&self) -> &Approval;

  fn approval_mut(&mut self) -> &mut Approval;

  /// The change applied to the student when the workflow is approved.
  fn effect(&self) -> Effect;
}
