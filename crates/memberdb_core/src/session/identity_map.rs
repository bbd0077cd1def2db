//! Per-type identity map with write-behind state.
//!
//! # Invariants
//! - At most one entry per identity.
//! - `order` lists identities in first-seen order; pending inserts flush in
//!   that order.
//! - Read-only entries carry no snapshot and are never dirty-checked.

use crate::model::{id_value, Entity, EntityId};
use crate::repo::error::RepoResult;
use crate::session::Managed;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::collections::HashMap;

/// Lifecycle state of a tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Saved in memory, not yet inserted.
    Pending,
    /// Backed by a row; dirty-checked at flush.
    Persistent,
    /// Scheduled for deletion at flush.
    Removed,
}

struct Entry<T> {
    handle: Managed<T>,
    state: EntryState,
    snapshot: Option<Vec<Value>>,
}

/// Identity-keyed cache of managed instances of one entity type.
pub struct IdentityMap<T> {
    entries: HashMap<EntityId, Entry<T>>,
    order: Vec<EntityId>,
}

impl<T> Default for IdentityMap<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<T: Entity> IdentityMap<T> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn state(&self, id: EntityId) -> Option<EntryState> {
        self.entries.get(&id).map(|entry| entry.state)
    }

    /// Live (not removed) handle for `id`.
    pub fn get(&self, id: EntityId) -> Option<Managed<T>> {
        self.entries
            .get(&id)
            .filter(|entry| entry.state != EntryState::Removed)
            .map(|entry| entry.handle.clone())
    }

    /// Whether `handle` is the live instance tracked for its identity.
    pub fn contains(&self, handle: &Managed<T>) -> bool {
        handle.id().is_some_and(|id| {
            self.get(id)
                .is_some_and(|tracked| tracked.same_instance(handle))
        })
    }

    pub(crate) fn insert_pending(&mut self, id: EntityId, handle: Managed<T>) {
        self.insert(id, handle, EntryState::Pending, None);
    }

    /// Tracks a freshly loaded row, or returns the instance already tracked
    /// for the same identity without touching its state.
    pub(crate) fn attach(&mut self, entity: T, read_only: bool) -> RepoResult<Managed<T>> {
        let id = entity.id().ok_or_else(|| {
            crate::repo::error::RepoError::InvalidData(format!(
                "loaded {} row has no identity",
                T::META.name
            ))
        })?;
        if let Some(entry) = self.entries.get(&id) {
            return Ok(entry.handle.clone());
        }

        let snapshot = if read_only {
            None
        } else {
            Some(entity.column_values()?)
        };
        let handle = Managed::new(entity);
        self.insert(id, handle.clone(), EntryState::Persistent, snapshot);
        Ok(handle)
    }

    /// Schedules removal. Pending entries are dropped outright.
    pub(crate) fn mark_removed(&mut self, id: EntityId) {
        match self.state(id) {
            Some(EntryState::Pending) => self.evict(id),
            Some(EntryState::Persistent) => {
                if let Some(entry) = self.entries.get_mut(&id) {
                    entry.state = EntryState::Removed;
                }
            }
            Some(EntryState::Removed) | None => {}
        }
    }

    pub(crate) fn evict(&mut self, id: EntityId) {
        if self.entries.remove(&id).is_some() {
            self.order.retain(|tracked| *tracked != id);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub(crate) fn flush_inserts(&mut self, conn: &Connection) -> RepoResult<usize> {
        let sql = T::META.insert_sql();
        let mut inserted = 0;
        for id in &self.order {
            let Some(entry) = self.entries.get_mut(id) else {
                continue;
            };
            if entry.state != EntryState::Pending {
                continue;
            }
            let values = entry.handle.try_borrow()?.column_values()?;
            let bind = std::iter::once(id_value(*id)).chain(values.iter().cloned());
            conn.prepare_cached(&sql)?.execute(params_from_iter(bind))?;
            entry.state = EntryState::Persistent;
            entry.snapshot = Some(values);
            inserted += 1;
        }
        Ok(inserted)
    }

    pub(crate) fn flush_updates(&mut self, conn: &Connection) -> RepoResult<usize> {
        let sql = T::META.update_sql();
        let mut updated = 0;
        for id in &self.order {
            let Some(entry) = self.entries.get_mut(id) else {
                continue;
            };
            if entry.state != EntryState::Persistent {
                continue;
            }
            let Some(snapshot) = entry.snapshot.as_mut() else {
                continue;
            };
            let values = entry.handle.try_borrow()?.column_values()?;
            if values == *snapshot {
                continue;
            }
            let bind = values.iter().cloned().chain(std::iter::once(id_value(*id)));
            conn.prepare_cached(&sql)?.execute(params_from_iter(bind))?;
            *snapshot = values;
            updated += 1;
        }
        Ok(updated)
    }

    pub(crate) fn flush_deletes(&mut self, conn: &Connection) -> RepoResult<usize> {
        let removed = self
            .order
            .iter()
            .copied()
            .filter(|id| self.state(*id) == Some(EntryState::Removed))
            .collect::<Vec<_>>();
        let sql = T::META.delete_sql();
        for id in &removed {
            conn.prepare_cached(&sql)?.execute([id.to_string()])?;
            self.evict(*id);
        }
        Ok(removed.len())
    }

    fn insert(
        &mut self,
        id: EntityId,
        handle: Managed<T>,
        state: EntryState,
        snapshot: Option<Vec<Value>>,
    ) {
        let previous = self.entries.insert(
            id,
            Entry {
                handle,
                state,
                snapshot,
            },
        );
        if previous.is_none() {
            self.order.push(id);
        }
    }
}
