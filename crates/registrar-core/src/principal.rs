//! The acting principal: who is performing a mutation.
//!
//! Principals are passed explicitly into every mutating repository call.
//! There is no ambient "current user".

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Identifier of the acting staff member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(pub Uuid);

impl Principal {
  /// The reserved all-zero principal that stamps seed rows written before any
  /// real user exists.
  pub const SYSTEM: Principal = Principal(Uuid::nil());

  pub fn id(self) -> Uuid { self.0 }

  pub fn is_system(self) -> bool { self == Self::SYSTEM }
}

impl From<Uuid> for Principal {
  fn from(id: Uuid) -> Self { Self(id) }
}

impl fmt::Display for Principal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

/// What a staff member is allowed to do. Ordered: `Viewer < Editor < Admin`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AccessLevel {
  #[default]
  Viewer,
  Editor,
  Admin,
}

impl AccessLevel {
  /// Fail with [`Error::Forbidden`] unless `self` is at least `required`.
  pub fn ensure(self, required: AccessLevel) -> Result<()> {
    if self >= required {
      Ok(())
    } else {
      Err(Error::Forbidden { required, actual: self })
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn system_principal_is_nil() {
    assert!(Principal::SYSTEM.is_system());
    assert_eq!(Principal::SYSTEM.id(), Uuid::nil());
  }

  #[test]
  fn access_levels_are_ordered() {
    assert!(AccessLevel::Admin.ensure(AccessLevel::Editor).is_ok());
    assert!(AccessLevel::Editor.ensure(AccessLevel::Editor).is_ok());
    let err = AccessLevel::Viewer.ensure(AccessLevel::Admin).unwrap_err();
    assert!(matches!(err, Error::Forbidden { required: AccessLevel::Admin, .. }));
  }

  #[test]
  fn access_level_text_roundtrip() {
    assert_eq!(AccessLevel::Editor.as_ref(), "editor");
    assert_eq!("admin".parse::<AccessLevel>().unwrap(), AccessLevel::Admin);
  }
}
