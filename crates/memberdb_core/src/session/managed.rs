//! Shared handle to an entity instance.

use crate::model::{Entity, EntityId};
use crate::repo::error::{RepoError, RepoResult};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// Handle to the single in-memory instance of an entity.
///
/// Cloning the handle shares the instance. Mutations through
/// [`Managed::borrow_mut`] are picked up by dirty checking at the next flush
/// while the handle is managed by a unit of work.
///
/// The identity is fixed when the handle is created; reading it never
/// borrows the instance.
pub struct Managed<T> {
    id: Option<EntityId>,
    cell: Rc<RefCell<T>>,
}

impl<T> Managed<T> {
    /// Panics while a mutable borrow is alive; see [`Managed::try_borrow`].
    pub fn borrow(&self) -> Ref<'_, T> {
        self.cell.borrow()
    }

    /// Panics while any other borrow is alive; see [`Managed::try_borrow_mut`].
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.cell.borrow_mut()
    }

    /// Whether both handles point at the same instance.
    pub fn same_instance(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }

    pub fn id(&self) -> Option<EntityId> {
        self.id
    }
}

impl<T: Entity> Managed<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            id: value.id(),
            cell: Rc::new(RefCell::new(value)),
        }
    }

    /// # Errors
    /// - `EntityBorrowed` while a mutable borrow of the instance is alive.
    pub fn try_borrow(&self) -> RepoResult<Ref<'_, T>> {
        self.cell.try_borrow().map_err(|_| self.borrowed())
    }

    /// # Errors
    /// - `EntityBorrowed` while any other borrow of the instance is alive.
    pub fn try_borrow_mut(&self) -> RepoResult<RefMut<'_, T>> {
        self.cell.try_borrow_mut().map_err(|_| self.borrowed())
    }

    /// Copies the current state out of the handle.
    pub fn snapshot(&self) -> T {
        self.cell.borrow().clone()
    }

    fn borrowed(&self) -> RepoError {
        RepoError::EntityBorrowed {
            entity: T::META.name,
            id: self.id,
        }
    }
}

impl<T> Clone for Managed<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<T: Debug> Debug for Managed<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.cell.try_borrow() {
            Ok(value) => f.debug_tuple("Managed").field(&*value).finish(),
            Err(_) => f.write_str("Managed(<borrowed>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Managed;
    use crate::model::member::Member;
    use crate::model::Entity;
    use crate::repo::error::RepoError;
    use uuid::Uuid;

    #[test]
    fn try_borrow_reports_conflicting_borrow() {
        let mut member = Member::new("member1");
        let id = Uuid::new_v4();
        member.assign_id(id);
        let handle = Managed::new(member);

        let guard = handle.borrow_mut();
        let err = handle.try_borrow().unwrap_err();
        assert!(matches!(
            err,
            RepoError::EntityBorrowed { entity: "Member", id: Some(found) } if found == id
        ));
        assert_eq!(handle.id(), Some(id));
        drop(guard);

        let reader = handle.borrow();
        assert!(handle.try_borrow_mut().is_err());
        assert!(handle.try_borrow().is_ok());
        drop(reader);
    }
}
