//! Identity maps of all entity types in one unit of work.

use crate::model::member::Member;
use crate::model::team::Team;
use crate::model::Entity;
use crate::repo::error::RepoResult;
use crate::session::{IdentityMap, Managed};

/// Managed entities of one unit of work, keyed by identity.
#[derive(Default)]
pub struct PersistenceContext {
    pub(crate) teams: IdentityMap<Team>,
    pub(crate) members: IdentityMap<Member>,
}

impl PersistenceContext {
    /// Number of tracked entities across all types.
    pub fn len(&self) -> usize {
        self.teams.len() + self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get<T: Entity>(&self, id: crate::model::EntityId) -> Option<Managed<T>> {
        T::identity_map_ref(self).get(id)
    }

    pub fn contains<T: Entity>(&self, handle: &Managed<T>) -> bool {
        T::identity_map_ref(self).contains(handle)
    }

    pub(crate) fn attach<T: Entity>(&mut self, entity: T, read_only: bool) -> RepoResult<Managed<T>> {
        T::identity_map(self).attach(entity, read_only)
    }

    pub(crate) fn clear(&mut self) {
        self.teams.clear();
        self.members.clear();
    }
}
