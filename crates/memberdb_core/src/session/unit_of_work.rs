//! Explicit unit-of-work handle threaded through repository calls.
//!
//! # Responsibility
//! - Scope one SQLite transaction and its persistence context.
//! - Write pending changes on flush: inserts, dirty updates, deletes.
//! - Execute repository queries against the transaction.
//!
//! # Invariants
//! - In `FlushMode::Auto`, pending writes are flushed before every query and
//!   bulk statement, so reads observe earlier saves in the same unit of work.
//! - Query rows for an identity already in the context resolve to the
//!   tracked instance; its in-memory state wins over the row.
//! - Dropping the handle without `commit` rolls the transaction back.

use crate::model::member::{Member, TeamRef};
use crate::model::team::Team;
use crate::model::{Entity, EntityId};
use crate::query::{FetchMode, Projection, QueryHints};
use crate::repo::error::{RepoError, RepoResult};
use crate::session::{EntryState, Managed, PersistenceContext};
use log::{debug, error, info};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Transaction};
use std::time::Instant;
use uuid::Uuid;

/// When pending writes reach the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushMode {
    /// Flush before each query and on commit.
    #[default]
    Auto,
    /// Flush only on explicit `flush` and on commit.
    Commit,
}

/// Statement counts written by one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl FlushStats {
    pub fn is_empty(&self) -> bool {
        self.inserted == 0 && self.updated == 0 && self.deleted == 0
    }
}

/// How rows of an entity query are turned into managed instances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    pub fetch: FetchMode,
    pub hints: QueryHints,
}

/// One transactional unit of work over a SQLite connection.
pub struct UnitOfWork<'conn> {
    tx: Transaction<'conn>,
    context: PersistenceContext,
    flush_mode: FlushMode,
}

impl<'conn> UnitOfWork<'conn> {
    /// Starts a unit of work in `FlushMode::Auto`.
    pub fn begin(conn: &'conn mut Connection) -> RepoResult<Self> {
        Self::begin_with(conn, FlushMode::default())
    }

    pub fn begin_with(conn: &'conn mut Connection, flush_mode: FlushMode) -> RepoResult<Self> {
        let tx = conn.transaction()?;
        debug!("event=uow_begin module=session status=ok flush_mode={flush_mode:?}");
        Ok(Self {
            tx,
            context: PersistenceContext::default(),
            flush_mode,
        })
    }

    pub fn flush_mode(&self) -> FlushMode {
        self.flush_mode
    }

    pub fn set_flush_mode(&mut self, flush_mode: FlushMode) {
        self.flush_mode = flush_mode;
    }

    pub fn context(&self) -> &PersistenceContext {
        &self.context
    }

    /// Underlying transaction, for statements the repositories do not cover.
    pub fn connection(&self) -> &Connection {
        &self.tx
    }

    /// Makes a transient entity managed, assigning its identity.
    ///
    /// # Errors
    /// - `DetachedEntity` when the entity already carries an identity; use
    ///   [`UnitOfWork::merge`] for those.
    pub fn persist<T: Entity>(&mut self, entity: T) -> RepoResult<Managed<T>> {
        if let Some(id) = entity.id() {
            return Err(RepoError::DetachedEntity {
                entity: T::META.name,
                id,
            });
        }
        Ok(self.schedule_insert(Uuid::new_v4(), entity))
    }

    /// Copies `entity` onto the managed instance with the same identity.
    ///
    /// Loads the row first when the identity is not tracked yet; an identity
    /// with no row is inserted at flush. Transient entities are persisted.
    pub fn merge<T: Entity>(&mut self, entity: T) -> RepoResult<Managed<T>> {
        let Some(id) = entity.id() else {
            return Ok(self.schedule_insert(Uuid::new_v4(), entity));
        };

        if T::identity_map_ref(&self.context).state(id) == Some(EntryState::Removed) {
            return Err(RepoError::RemovedEntity {
                entity: T::META.name,
                id,
            });
        }

        match self.find::<T>(id)? {
            Some(managed) => {
                *managed.try_borrow_mut()? = entity;
                debug!(
                    "event=uow_merge module=session status=ok entity={} id={id}",
                    T::META.name
                );
                Ok(managed)
            }
            None => Ok(self.schedule_insert(id, entity)),
        }
    }

    /// Looks up an entity by identity: context first, then the store.
    pub fn find<T: Entity>(&mut self, id: EntityId) -> RepoResult<Option<Managed<T>>> {
        let tracked = T::identity_map_ref(&self.context);
        match tracked.state(id) {
            Some(EntryState::Removed) => return Ok(None),
            Some(_) => return Ok(tracked.get(id)),
            None => {}
        }

        let sql = T::META.select_by_id_sql();
        let mut stmt = self.tx.prepare_cached(&sql)?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => {
                let entity = T::from_row(row, 0)?;
                Ok(Some(self.context.attach(entity, false)?))
            }
            None => Ok(None),
        }
    }

    /// Schedules deletion of `entity`; the row is deleted at flush.
    pub fn remove<T: Entity>(&mut self, entity: &Managed<T>) -> RepoResult<()> {
        match entity.id() {
            Some(id) => self.remove_by_id::<T>(id),
            None => Ok(()),
        }
    }

    /// Schedules deletion by identity. Unknown identities are ignored.
    pub fn remove_by_id<T: Entity>(&mut self, id: EntityId) -> RepoResult<()> {
        if T::identity_map_ref(&self.context).state(id).is_none() && self.find::<T>(id)?.is_none()
        {
            return Ok(());
        }
        T::identity_map(&mut self.context).mark_removed(id);
        debug!(
            "event=uow_remove module=session status=ok entity={} id={id}",
            T::META.name
        );
        Ok(())
    }

    pub fn contains<T: Entity>(&self, entity: &Managed<T>) -> bool {
        self.context.contains(entity)
    }

    /// Stops tracking `entity`; its pending changes are discarded.
    pub fn detach<T: Entity>(&mut self, entity: &Managed<T>) {
        if !self.contains(entity) {
            return;
        }
        if let Some(id) = entity.id() {
            T::identity_map(&mut self.context).evict(id);
        }
    }

    /// Detaches every managed entity and discards unflushed changes.
    pub fn clear(&mut self) {
        let discarded = self.context.len();
        self.context.clear();
        debug!("event=uow_clear module=session status=ok detached={discarded}");
    }

    /// Writes pending inserts, dirty updates and deletes to the store.
    pub fn flush(&mut self) -> RepoResult<FlushStats> {
        let started_at = Instant::now();
        let result = flush_context(&self.tx, &mut self.context);
        match &result {
            Ok(stats) if !stats.is_empty() => debug!(
                "event=uow_flush module=session status=ok inserted={} updated={} deleted={} duration_ms={}",
                stats.inserted,
                stats.updated,
                stats.deleted,
                started_at.elapsed().as_millis()
            ),
            Ok(_) => {}
            Err(err) => error!(
                "event=uow_flush module=session status=error duration_ms={} error={err}",
                started_at.elapsed().as_millis()
            ),
        }
        result
    }

    /// Loads the team of a managed member now.
    ///
    /// # Errors
    /// - `AssociationUnavailable` when `member` is not managed by this unit
    ///   of work (detached, cleared or from another unit of work).
    pub fn load_team(&mut self, member: &Managed<Member>) -> RepoResult<Option<Managed<Team>>> {
        if !self.context.contains(member) {
            return Err(RepoError::AssociationUnavailable {
                association: "team",
                id: member.try_borrow()?.team_id(),
            });
        }

        let team_ref = member.try_borrow()?.team().cloned();
        match team_ref {
            None => Ok(None),
            Some(TeamRef::Loaded(team)) => Ok(Some(team)),
            Some(TeamRef::Deferred(team_id)) => {
                let team = self.find::<Team>(team_id)?.ok_or_else(|| {
                    RepoError::InvalidData(format!("member references missing team {team_id}"))
                })?;
                member.try_borrow_mut()?.resolve_team(team.clone());
                Ok(Some(team))
            }
        }
    }

    /// Flushes and commits. Managed handles become detached.
    pub fn commit(mut self) -> RepoResult<FlushStats> {
        let stats = self.flush()?;
        self.tx.commit()?;
        info!(
            "event=uow_commit module=session status=ok inserted={} updated={} deleted={}",
            stats.inserted, stats.updated, stats.deleted
        );
        Ok(stats)
    }

    /// Discards every change made in this unit of work.
    pub fn rollback(self) -> RepoResult<()> {
        self.tx.rollback()?;
        info!("event=uow_rollback module=session status=ok");
        Ok(())
    }

    /// Runs an entity query; rows resolve through the identity map.
    ///
    /// `label` names the query in diagnostics. With `FetchMode::Eager` the
    /// select list must continue with the joined association's columns.
    pub fn query_entities<T: Entity>(
        &mut self,
        label: &str,
        sql: &str,
        values: Vec<Value>,
        options: LoadOptions,
    ) -> RepoResult<Vec<Managed<T>>> {
        self.before_query()?;
        let started_at = Instant::now();
        let read_only = options.hints.read_only;
        let join_offset = match options.fetch {
            FetchMode::Lazy => None,
            FetchMode::Eager => Some(T::META.column_count()),
        };

        let mut stmt = self.tx.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(values))?;
        let mut loaded = Vec::new();
        while let Some(row) = rows.next()? {
            let handle = self.context.attach(T::from_row(row, 0)?, read_only)?;
            if let Some(offset) = join_offset {
                T::attach_joined(&mut self.context, &handle, row, offset, read_only)?;
            }
            loaded.push(handle);
        }

        log_query(label, loaded.len(), started_at);
        Ok(loaded)
    }

    /// Runs a query whose rows are shaped into projections.
    pub fn query_projections<P: Projection>(
        &mut self,
        label: &str,
        sql: &str,
        values: Vec<Value>,
    ) -> RepoResult<Vec<P>> {
        self.before_query()?;
        let started_at = Instant::now();
        let mut stmt = self.tx.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(values))?;
        let mut projected = Vec::new();
        while let Some(row) = rows.next()? {
            projected.push(P::from_row(row)?);
        }

        log_query(label, projected.len(), started_at);
        Ok(projected)
    }

    /// Runs a `SELECT COUNT(*)`-shaped query.
    pub fn query_count(&mut self, label: &str, sql: &str, values: Vec<Value>) -> RepoResult<u64> {
        self.before_query()?;
        let started_at = Instant::now();
        let count: i64 = self
            .tx
            .query_row(sql, params_from_iter(values), |row| row.get(0))?;
        log_query(label, 1, started_at);
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative count {count} from `{label}`")))
    }

    /// Executes a bulk mutation directly against the store.
    ///
    /// Managed instances are not refreshed; clear the context to observe
    /// the new row state.
    pub fn execute_update(&mut self, label: &str, sql: &str, values: Vec<Value>) -> RepoResult<usize> {
        self.before_query()?;
        let started_at = Instant::now();
        let changed = self.tx.execute(sql, params_from_iter(values))?;
        info!(
            "event=bulk_update module=session status=ok query={label} rows={changed} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(changed)
    }

    fn before_query(&mut self) -> RepoResult<()> {
        if self.flush_mode == FlushMode::Auto {
            self.flush()?;
        }
        Ok(())
    }

    fn schedule_insert<T: Entity>(&mut self, id: EntityId, mut entity: T) -> Managed<T> {
        entity.assign_id(id);
        let handle = Managed::new(entity);
        T::identity_map(&mut self.context).insert_pending(id, handle.clone());
        debug!(
            "event=uow_persist module=session status=ok entity={} id={id}",
            T::META.name
        );
        handle
    }
}

// Teams are inserted before and deleted after members so references hold.
fn flush_context(conn: &Connection, context: &mut PersistenceContext) -> RepoResult<FlushStats> {
    let inserted = context.teams.flush_inserts(conn)? + context.members.flush_inserts(conn)?;
    let updated = context.teams.flush_updates(conn)? + context.members.flush_updates(conn)?;
    let deleted = context.members.flush_deletes(conn)? + context.teams.flush_deletes(conn)?;
    Ok(FlushStats {
        inserted,
        updated,
        deleted,
    })
}

fn log_query(label: &str, rows: usize, started_at: Instant) {
    debug!(
        "event=query_execute module=query status=ok query={label} rows={rows} duration_ms={}",
        started_at.elapsed().as_millis()
    );
}
