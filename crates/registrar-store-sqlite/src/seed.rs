//! Rows every fresh store starts with.
//!
//! The reserved system staff member stamps seed rows and is the only
//! principal allowed to create itself. The administration department and
//! the administrator role are pinned against hard deletion. Seeding is
//! idempotent and bypasses entity validation.

use chrono::{DateTime, Utc};
use registrar_core::{
  AccessLevel, Entity, Lifecycle, Principal,
  entities::{Department, Role, Staff, StaffType},
};
use rusqlite::{Connection, OptionalExtension as _};

use crate::{
  Result,
  encode::{encode_body, encode_uuid},
  rows::{in_tx, insert, load},
};

pub const SYSTEM_EMAIL: &str = "system@registrar.invalid";
pub const ADMIN_DEPARTMENT: &str = "Administration";
pub const ADMIN_ROLE: &str = "System Administrator";

fn system_staff() -> Staff {
  Staff {
    first_name:    "Registrar".into(),
    last_name:     "System".into(),
    email:         SYSTEM_EMAIL.into(),
    phone:         None,
    department_id: None,
    role_id:       None,
    access_level:  AccessLevel::Admin,
    staff_type:    StaffType::System,
  }
}

fn insert_seed<T: Entity>(conn: &Connection, header: Lifecycle, body: &T) -> Result<()> {
  let (values, json) = encode_body(T::table(), body)?;
  insert(conn, T::table(), &header, values, &json)
}

/// Whether a row of `T` already carries `name`.
fn named<T: Entity>(conn: &Connection, name: &str) -> Result<bool> {
  let sql = format!("SELECT 1 FROM {} WHERE name = ?1", T::table().name);
  Ok(conn.query_row(&sql, rusqlite::params![name], |_| Ok(())).optional()?.is_some())
}

pub fn seed(conn: &mut Connection, now: DateTime<Utc>) -> Result<()> {
  in_tx(conn, |tx| {
    let system = Principal::SYSTEM;
    if load(tx, Staff::table(), system.id())?.is_none() {
      insert_seed(tx, Lifecycle::create_with_id(system.id(), system, now), &system_staff())?;
      tracing::info!(id = %encode_uuid(system.id()), "system staff seeded");
    }

    if !named::<Department>(tx, ADMIN_DEPARTMENT)? {
      let department = Department {
        name:              ADMIN_DEPARTMENT.into(),
        description:       Some("Seeded administrative department".into()),
        deletion_eligible: false,
      };
      insert_seed(tx, Lifecycle::create(system, now), &department)?;
    }

    if !named::<Role>(tx, ADMIN_ROLE)? {
      let role = Role {
        name:              ADMIN_ROLE.into(),
        description:       Some("Seeded administrator role".into()),
        deletion_eligible: false,
      };
      insert_seed(tx, Lifecycle::create(system, now), &role)?;
    }
    Ok(())
  })
}
