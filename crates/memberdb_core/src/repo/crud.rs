//! Generic CRUD contract shared by every entity repository.

use crate::model::{Entity, EntityId};
use crate::paging::{Page, PageRequest, Pageable, Sort};
use crate::query::sql::{count_entities, limit_clause, order_clause, select_entities};
use crate::query::FetchMode;
use crate::repo::error::RepoResult;
use crate::session::{LoadOptions, Managed, UnitOfWork};

/// CRUD operations over entity `T`, run inside an explicit unit of work.
///
/// All methods are provided; implementors only pick the entity type.
pub trait CrudRepository<T: Entity> {
    /// Saves `entity` and returns its managed instance.
    ///
    /// Transient entities get a fresh identity and are inserted at flush.
    /// Entities that already carry an identity are merged: their state is
    /// copied onto the managed instance for that identity.
    fn save(&self, uow: &mut UnitOfWork<'_>, entity: T) -> RepoResult<Managed<T>> {
        match entity.id() {
            None => uow.persist(entity),
            Some(_) => uow.merge(entity),
        }
    }

    fn find_by_id(&self, uow: &mut UnitOfWork<'_>, id: EntityId) -> RepoResult<Option<Managed<T>>> {
        uow.find(id)
    }

    fn exists_by_id(&self, uow: &mut UnitOfWork<'_>, id: EntityId) -> RepoResult<bool> {
        Ok(uow.find::<T>(id)?.is_some())
    }

    /// Every entity, in no particular order.
    fn find_all(&self, uow: &mut UnitOfWork<'_>) -> RepoResult<Vec<Managed<T>>> {
        self.find_all_sorted(uow, &Sort::unsorted())
    }

    /// # Errors
    /// - `UnknownProperty` when `sort` names an unmapped property.
    fn find_all_sorted(&self, uow: &mut UnitOfWork<'_>, sort: &Sort) -> RepoResult<Vec<Managed<T>>> {
        let order_sql = order_clause(T::META, &[sort], false)?;
        let sql = format!("{}{order_sql}", select_entities(T::META, FetchMode::Lazy));
        uow.query_entities(
            &format!("{}.findAll", T::META.name),
            &sql,
            Vec::new(),
            LoadOptions::default(),
        )
    }

    fn find_all_paged(
        &self,
        uow: &mut UnitOfWork<'_>,
        request: &PageRequest,
    ) -> RepoResult<Page<Managed<T>>> {
        let mut values = Vec::new();
        let order_sql = order_clause(T::META, &[request.sort()], true)?;
        let limit_sql = limit_clause(Some(u64::from(request.size())), request.offset(), &mut values);
        let sql = format!(
            "{}{order_sql}{limit_sql}",
            select_entities(T::META, FetchMode::Lazy)
        );
        let content = uow.query_entities(
            &format!("{}.findAll", T::META.name),
            &sql,
            values,
            LoadOptions::default(),
        )?;
        let total_elements = self.count(uow)?;
        Ok(Page::new(content, Pageable::from(request), total_elements))
    }

    fn count(&self, uow: &mut UnitOfWork<'_>) -> RepoResult<u64> {
        uow.query_count(
            &format!("{}.count", T::META.name),
            &count_entities(T::META),
            Vec::new(),
        )
    }

    /// Schedules removal; unknown identities are ignored.
    fn delete(&self, uow: &mut UnitOfWork<'_>, entity: &Managed<T>) -> RepoResult<()> {
        uow.remove(entity)
    }

    fn delete_by_id(&self, uow: &mut UnitOfWork<'_>, id: EntityId) -> RepoResult<()> {
        uow.remove_by_id::<T>(id)
    }
}
