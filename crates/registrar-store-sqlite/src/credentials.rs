//! Password credentials for staff members, kept beside the staff table.
//!
//! Only argon2 PHC strings are stored; hashing and verification happen at
//! the HTTP boundary.

use chrono::{DateTime, Utc};
use registrar_core::{
  AccessLevel, EntityKind, Principal, Record,
  entities::Staff,
  lifecycle::Partition,
  repository::{CredentialStore, Login},
};
use rusqlite::{Connection, OptionalExtension as _};
use uuid::Uuid;

use crate::{
  Error, Result, SqliteStore,
  encode::{decode_uuid, encode_dt, encode_uuid},
  rows::{grant_access, load_in},
};

pub fn upsert_password(
  conn: &Connection,
  staff_id: Uuid,
  password_hash: &str,
  now: DateTime<Utc>,
) -> Result<()> {
  conn.execute(
    "INSERT INTO credentials (staff_id, password_hash, updated_at) VALUES (?1, ?2, ?3)
     ON CONFLICT(staff_id) DO UPDATE SET
       password_hash = excluded.password_hash,
       updated_at    = excluded.updated_at",
    rusqlite::params![encode_uuid(staff_id), password_hash, encode_dt(now)],
  )?;
  Ok(())
}

struct RawLogin {
  id:            String,
  password_hash: String,
  access_level:  String,
  is_archived:   bool,
}

impl RawLogin {
  fn into_login(self) -> Result<Login> {
    Ok(Login {
      principal:     Principal(decode_uuid(&self.id)?),
      password_hash: self.password_hash,
      access_level:  self.access_level.parse::<AccessLevel>().map_err(|e| Error::Decode {
        table:   "staff",
        column:  "access_level",
        message: e.to_string(),
      })?,
      is_archived:   self.is_archived,
    })
  }
}

impl CredentialStore for SqliteStore {
  type Error = Error;

  async fn find_login(&self, email: String) -> Result<Option<Login>> {
    let raw: Option<RawLogin> = self
      .conn()
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT s.id, c.password_hash, s.access_level, s.is_archived
               FROM staff s JOIN credentials c ON c.staff_id = s.id
               WHERE s.email = ?1 COLLATE NOCASE",
              rusqlite::params![email.trim()],
              |row| {
                Ok(RawLogin {
                  id:            row.get(0)?,
                  password_hash: row.get(1)?,
                  access_level:  row.get(2)?,
                  is_archived:   row.get(3)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawLogin::into_login).transpose()
  }

  async fn set_password(&self, staff_id: Uuid, password_hash: String) -> Result<()> {
    let now = self.now();
    self
      .conn()
      .call(move |conn| {
        load_in(conn, EntityKind::Staff, staff_id, Partition::Active)
          .and_then(|_| upsert_password(conn, staff_id, &password_hash, now))
          .map_err(Error::into_call)
      })
      .await?;
    tracing::info!(%staff_id, "password updated");
    Ok(())
  }

  async fn set_access_level(
    &self,
    staff_id: Uuid,
    actor: Principal,
    level: AccessLevel,
  ) -> Result<Record<Staff>> {
    self.write(move |conn, now| grant_access(conn, staff_id, actor, level, now)).await
  }
}
