//! [`SqliteStore`] — the SQLite implementation of [`Repository`].

use std::{path::Path, sync::Arc};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, types::Value as Sql};
use serde_json::{Map, Value};
use uuid::Uuid;

use registrar_core::{
  AccessLevel, ArchiveReason, Entity, EntityKind, Lifecycle, Principal, Record,
  approval::{Decision, Workflow},
  clock::{Clock, SystemClock},
  entities::{Document, DocumentContent, Staff, StaffType},
  export::Then,
  lifecycle::Partition,
  query::{ListQuery, Page, search_fields},
  repository::Repository,
};

use crate::{
  Error, Result,
  credentials::upsert_password,
  encode::{RawRow, decode_uuid, encode_uuid, select_list},
  engine, planner,
  rows::{self, in_tx, load, load_in, load_many},
  schema::schema,
  seed,
  violation::check_writes,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Registrar store backed by a single SQLite file.
///
/// Cloning is cheap; the connection and clock are reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:  tokio_rusqlite::Connection,
  clock: Arc<dyn Clock>,
}

impl SqliteStore {
  /// Open (or create) a store at `path`, create the schema and seed it.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, clock: Arc::new(SystemClock) };
    store.init().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, clock: Arc::new(SystemClock) };
    store.init().await?;
    Ok(store)
  }

  /// Stamp subsequent mutations from `clock`.
  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  async fn init(&self) -> Result<()> {
    let now = self.clock.now();
    self
      .conn
      .call(move |conn| {
        planner::register_fold(conn)?;
        conn.execute_batch(&schema())?;
        seed::seed(conn, now).map_err(Error::into_call)
      })
      .await?;
    Ok(())
  }

  pub(crate) fn conn(&self) -> &tokio_rusqlite::Connection { &self.conn }

  pub(crate) fn now(&self) -> DateTime<Utc> { self.clock.now() }

  /// Run `f` in one transaction, stamped with the current clock reading.
  pub(crate) async fn write<R, F>(&self, f: F) -> Result<R>
  where
    R: Send + 'static,
    F: FnOnce(&Connection, DateTime<Utc>) -> Result<R> + Send + 'static,
  {
    let now = self.clock.now();
    Ok(
      self
        .conn
        .call(move |conn| in_tx(conn, |tx| f(tx, now)).map_err(Error::into_call))
        .await?,
    )
  }

  async fn read<R, F>(&self, f: F) -> Result<R>
  where
    R: Send + 'static,
    F: FnOnce(&Connection) -> Result<R> + Send + 'static,
  {
    Ok(self.conn.call(move |conn| f(conn).map_err(Error::into_call)).await?)
  }

  async fn get_in<T: Entity>(&self, id: Uuid, partition: Partition) -> Result<Record<T>> {
    self.read(move |conn| load_in(conn, T::KIND, id, partition)?.into_record()).await
  }

  async fn list<T: Entity>(
    &self,
    fields: &[&str],
    query: &ListQuery,
    partition: Partition,
  ) -> Result<Page<T>> {
    let table = T::table();
    let fields = search_fields(table, fields)?;
    let plan = planner::plan(table, partition, &fields, query);
    let (limit, offset) = (query.limit, query.offset);

    self
      .read(move |conn| {
        let total: i64 = conn.query_row(
          &plan.count_sql,
          rusqlite::params_from_iter(&plan.params),
          |r| r.get(0),
        )?;
        let params: Vec<_> = plan.params.iter().chain(&plan.page_params).cloned().collect();
        let items = load_many(conn, table, &plan.sql, &params)?
          .into_iter()
          .map(RawRow::into_record::<T>)
          .collect::<Result<Vec<_>>>()?;
        Ok(Page { items, total: u64::try_from(total).unwrap_or_default(), limit, offset })
      })
      .await
  }

  async fn remove(
    &self,
    kind: EntityKind,
    id: Uuid,
    actor: Principal,
    partition: Partition,
  ) -> Result<()> {
    self
      .write(move |conn, now| engine::hard_delete(conn, kind, id, actor, now, partition))
      .await
  }

  /// Ensure an admin staff member with `email` exists and set its password.
  ///
  /// The account is created by the system principal on first run. Returns
  /// the admin's principal.
  pub async fn bootstrap_admin(&self, email: String, password_hash: String) -> Result<Principal> {
    let id = self
      .write(move |conn, now| {
        let existing: Option<String> = conn
          .query_row(
            "SELECT id FROM staff WHERE email = ?1 COLLATE NOCASE",
            rusqlite::params![email],
            |r| r.get(0),
          )
          .optional()?;
        let id = match existing {
          Some(id) => decode_uuid(&id)?,
          None => {
            let admin = Staff {
              first_name:    "Registrar".into(),
              last_name:     "Administrator".into(),
              email:         email.clone(),
              phone:         None,
              department_id: None,
              role_id:       None,
              access_level:  AccessLevel::Admin,
              staff_type:    StaffType::Admin,
            };
            admin.validate()?;
            let record = rows::create(conn, Lifecycle::create(Principal::SYSTEM, now), admin)?;
            tracing::info!(id = %record.id(), %email, "bootstrap administrator created");
            record.id()
          }
        };
        upsert_password(conn, id, &password_hash, now)?;
        Ok(id)
      })
      .await?;
    Ok(Principal(id))
  }
}

// ─── Repository impl ─────────────────────────────────────────────────────────

impl Repository for SqliteStore {
  type Error = Error;

  async fn create<T: Entity>(&self, actor: Principal, mut body: T) -> Result<Record<T>> {
    body.prepare_create();
    body.validate()?;
    self.write(move |conn, now| rows::create(conn, Lifecycle::create(actor, now), body)).await
  }

  async fn exists<T: Entity>(&self, id: Uuid) -> Result<bool> {
    self
      .read(move |conn| Ok(load(conn, T::table(), id)?.is_some_and(|raw| !raw.is_archived())))
      .await
  }

  async fn get_by_id<T: Entity>(&self, id: Uuid) -> Result<Record<T>> {
    self.get_in(id, Partition::Active).await
  }

  async fn update<T: Entity>(
    &self,
    id: Uuid,
    actor: Principal,
    patch: Map<String, Value>,
  ) -> Result<Record<T>> {
    self.write(move |conn, now| rows::update::<T>(conn, id, actor, patch, now)).await
  }

  async fn archive<T: Entity>(
    &self,
    id: Uuid,
    actor: Principal,
    reason: ArchiveReason,
  ) -> Result<Record<T>> {
    self
      .write(move |conn, now| {
        let row = engine::archive(conn, T::KIND, id, actor, reason, now)?;
        check_writes(conn, T::KIND)?;
        row.into_record()
      })
      .await
  }

  async fn delete<T: Entity>(&self, id: Uuid, actor: Principal) -> Result<()> {
    self.remove(T::KIND, id, actor, Partition::Active).await
  }

  async fn get_archive_by_id<T: Entity>(&self, id: Uuid) -> Result<Record<T>> {
    self.get_in(id, Partition::Archived).await
  }

  async fn restore<T: Entity>(&self, id: Uuid, actor: Principal) -> Result<Record<T>> {
    self
      .write(move |conn, now| {
        let row = engine::restore(conn, T::KIND, id, actor, now)?;
        check_writes(conn, T::KIND)?;
        row.into_record()
      })
      .await
  }

  async fn delete_archive<T: Entity>(&self, id: Uuid, actor: Principal) -> Result<()> {
    self.remove(T::KIND, id, actor, Partition::Archived).await
  }

  async fn execute_query<'a, T: Entity>(
    &'a self,
    search_fields: &'a [&'a str],
    query: &'a ListQuery,
  ) -> Result<Page<T>> {
    self.list(search_fields, query, Partition::Active).await
  }

  async fn execute_archive_query<'a, T: Entity>(
    &'a self,
    search_fields: &'a [&'a str],
    query: &'a ListQuery,
  ) -> Result<Page<T>> {
    self.list(search_fields, query, Partition::Archived).await
  }

  async fn decide<W: Workflow>(
    &self,
    id: Uuid,
    actor: Principal,
    decision: Decision,
  ) -> Result<Record<W>> {
    self.write(move |conn, now| rows::decide::<W>(conn, id, actor, decision, now)).await
  }

  async fn sweep_orphans(
    &self,
    kind: EntityKind,
    actor: Principal,
    reason: ArchiveReason,
  ) -> Result<Vec<Uuid>> {
    let candidates = self.read(move |conn| engine::orphan_candidates(conn, kind)).await?;

    // One transaction per entity, each rechecking that it is still orphaned.
    let mut swept = Vec::new();
    for id in candidates {
      let archived = self
        .write(move |conn, now| {
          let archived = engine::sweep_one(conn, kind, id, actor, reason, now)?;
          check_writes(conn, kind)?;
          Ok(archived)
        })
        .await?;
      if archived {
        swept.push(id);
      }
    }

    tracing::info!(kind = kind.as_ref(), %actor, swept = swept.len(), "orphan sweep finished");
    Ok(swept)
  }

  async fn snapshot(&self, kind: EntityKind, id: Uuid) -> Result<Option<Value>> {
    self
      .read(move |conn| load(conn, kind.table(), id)?.map(RawRow::into_json).transpose())
      .await
  }

  async fn snapshot_children(
    &self,
    kind: EntityKind,
    fk: &'static str,
    parent_id: Uuid,
  ) -> Result<Vec<Value>> {
    let table = kind.table();
    if table.column(fk).and_then(|c| c.reference).is_none() {
      return Err(registrar_core::Error::validation(fk, "is not a foreign key").into());
    }
    self
      .read(move |conn| {
        let sql = format!(
          "SELECT {} FROM {} WHERE {fk} = ?1 AND is_archived = 0 ORDER BY created_at, id",
          select_list(table),
          table.name,
        );
        let params = [Sql::Text(encode_uuid(parent_id))];
        load_many(conn, table, &sql, &params)?.into_iter().map(RawRow::into_json).collect()
      })
      .await
  }

  async fn finalize_export(
    &self,
    kind: EntityKind,
    id: Uuid,
    actor: Principal,
    then: Then,
  ) -> Result<()> {
    self
      .write(move |conn, now| {
        engine::finalize_export(conn, kind, id, actor, then, now)?;
        if then == Then::Archive {
          check_writes(conn, kind)?;
        }
        Ok(())
      })
      .await
  }

  async fn record_document_content(
    &self,
    id: Uuid,
    actor: Principal,
    content: DocumentContent,
  ) -> Result<Record<Document>> {
    self.write(move |conn, now| rows::attach_document(conn, id, actor, content, now)).await
  }
}
