//! Member repository: CRUD, derived and declared queries, custom queries.
//!
//! # Invariants
//! - Every query is compiled in `register`; a registered repository never
//!   reports configuration errors per call.
//! - Entity results resolve through the caller's unit of work, so repeated
//!   lookups of one identity return the same instance.

use crate::model::dto::MemberDto;
use crate::model::member::Member;
use crate::paging::{Page, Pageable};
use crate::query::derived::DerivedQuery;
use crate::query::named::{EntityQuery, ProjectionQuery, UpdateQuery};
use crate::query::{FetchMode, QueryHints, QueryParam, QueryParams};
use crate::repo::crud::CrudRepository;
use crate::repo::error::{RegistrationError, RepoResult};
use crate::repo::member_custom::{MemberRepositoryCustom, MemberRepositoryImpl, MemberSearchCondition};
use crate::session::{Managed, UnitOfWork};
use log::info;
use rusqlite::Connection;

const FIND_USER_SQL: &str = "SELECT m.id, m.username, m.age, m.team_id
     FROM members m
     WHERE m.username = :username AND m.age = :age";
const FIND_USERNAME_LIST_SQL: &str = "SELECT m.username FROM members m";
const FIND_MEMBER_DTO_SQL: &str = "SELECT m.id, m.username, t.name
     FROM members m
     JOIN teams t ON t.id = m.team_id";
const FIND_BY_NAMES_SQL: &str = "SELECT m.id, m.username, m.age, m.team_id
     FROM members m
     WHERE m.username IN (:names)";
const FIND_MEMBER_FETCH_JOIN_SQL: &str = "SELECT m.id, m.username, m.age, m.team_id, t.id, t.name
     FROM members m
     LEFT JOIN teams t ON t.id = m.team_id";
const BULK_AGE_PLUS_SQL: &str = "UPDATE members SET age = age + 1 WHERE age >= :age";

/// Repository for `Member` entities.
#[derive(Debug, Clone)]
pub struct MemberRepository {
    by_username_and_age_greater_than: DerivedQuery<Member>,
    by_username_and_age: DerivedQuery<Member>,
    list_by_username: DerivedQuery<Member>,
    member_by_username: DerivedQuery<Member>,
    optional_by_username: DerivedQuery<Member>,
    by_age: DerivedQuery<Member>,
    count_by_age: DerivedQuery<Member>,
    by_username: DerivedQuery<Member>,
    entity_graph_by_username: DerivedQuery<Member>,
    read_only_by_username: DerivedQuery<Member>,
    find_user: EntityQuery<Member>,
    by_names: EntityQuery<Member>,
    member_fetch_join: EntityQuery<Member>,
    username_list: ProjectionQuery<String>,
    member_dto: ProjectionQuery<MemberDto>,
    bulk_age_plus: UpdateQuery,
    custom: MemberRepositoryImpl,
}

impl MemberRepository {
    /// Compiles every member query against `conn`'s schema.
    ///
    /// # Errors
    /// - Any `RegistrationError` raised by a query declaration.
    pub fn register(conn: &Connection) -> Result<Self, RegistrationError> {
        let repository = Self {
            by_username_and_age_greater_than: DerivedQuery::from_method_name(
                "findByUsernameAndAgeGreaterThan",
            )?,
            by_username_and_age: DerivedQuery::from_method_name("findByUsernameAndAge")?,
            list_by_username: DerivedQuery::from_method_name("findListByUsername")?,
            member_by_username: DerivedQuery::from_method_name("findMemberByUsername")?,
            optional_by_username: DerivedQuery::from_method_name("findOptionalByUsername")?,
            by_age: DerivedQuery::from_method_name("findByAge")?,
            count_by_age: DerivedQuery::from_method_name("countByAge")?,
            by_username: DerivedQuery::from_method_name("findByUsername")?,
            entity_graph_by_username: DerivedQuery::from_method_name(
                "findEntityGraphByUsername",
            )?
            .with_fetch(FetchMode::Eager)?,
            read_only_by_username: DerivedQuery::from_method_name("findReadOnlyByUsername")?
                .with_hints(QueryHints::read_only()),
            find_user: EntityQuery::register(conn, "Member.findUser", FIND_USER_SQL)?,
            by_names: EntityQuery::register(conn, "Member.findByNames", FIND_BY_NAMES_SQL)?,
            member_fetch_join: EntityQuery::register_eager(
                conn,
                "Member.findMemberFetchJoin",
                FIND_MEMBER_FETCH_JOIN_SQL,
            )?,
            username_list: ProjectionQuery::register(
                conn,
                "Member.findUsernameList",
                FIND_USERNAME_LIST_SQL,
            )?,
            member_dto: ProjectionQuery::register(conn, "Member.findMemberDto", FIND_MEMBER_DTO_SQL)?,
            bulk_age_plus: UpdateQuery::register(conn, "Member.bulkAgePlus", BULK_AGE_PLUS_SQL)?,
            custom: MemberRepositoryImpl,
        };
        info!("event=repo_register module=repo status=ok repository=MemberRepository queries=16");
        Ok(repository)
    }

    pub fn find_by_username_and_age_greater_than(
        &self,
        uow: &mut UnitOfWork<'_>,
        username: &str,
        age: i32,
    ) -> RepoResult<Vec<Managed<Member>>> {
        self.by_username_and_age_greater_than
            .list(uow, &[username.into(), age.into()])
    }

    pub fn find_by_username_and_age(
        &self,
        uow: &mut UnitOfWork<'_>,
        username: &str,
        age: i32,
    ) -> RepoResult<Vec<Managed<Member>>> {
        self.by_username_and_age
            .list(uow, &[username.into(), age.into()])
    }

    /// Declared-SQL twin of `find_by_username_and_age`.
    pub fn find_user(
        &self,
        uow: &mut UnitOfWork<'_>,
        username: &str,
        age: i32,
    ) -> RepoResult<Vec<Managed<Member>>> {
        let params = QueryParams::new().bind("username", username).bind("age", age);
        self.find_user.list(uow, &params)
    }

    pub fn find_username_list(&self, uow: &mut UnitOfWork<'_>) -> RepoResult<Vec<String>> {
        self.username_list.list(uow, &QueryParams::new())
    }

    /// Members that belong to a team, with the team name.
    pub fn find_member_dto(&self, uow: &mut UnitOfWork<'_>) -> RepoResult<Vec<MemberDto>> {
        self.member_dto.list(uow, &QueryParams::new())
    }

    /// Members whose username is one of `names`; an empty slice matches none.
    pub fn find_by_names(
        &self,
        uow: &mut UnitOfWork<'_>,
        names: &[&str],
    ) -> RepoResult<Vec<Managed<Member>>> {
        let params = QueryParams::new().bind("names", QueryParam::list(names.iter().copied()));
        self.by_names.list(uow, &params)
    }

    pub fn find_list_by_username(
        &self,
        uow: &mut UnitOfWork<'_>,
        username: &str,
    ) -> RepoResult<Vec<Managed<Member>>> {
        self.list_by_username.list(uow, &[username.into()])
    }

    /// # Errors
    /// - `NonUniqueResult` when several members share `username`.
    pub fn find_member_by_username(
        &self,
        uow: &mut UnitOfWork<'_>,
        username: &str,
    ) -> RepoResult<Option<Managed<Member>>> {
        self.member_by_username.single(uow, &[username.into()])
    }

    pub fn find_optional_by_username(
        &self,
        uow: &mut UnitOfWork<'_>,
        username: &str,
    ) -> RepoResult<Option<Managed<Member>>> {
        self.optional_by_username.single(uow, &[username.into()])
    }

    pub fn find_by_age(
        &self,
        uow: &mut UnitOfWork<'_>,
        age: i32,
        pageable: impl Into<Pageable>,
    ) -> RepoResult<Page<Managed<Member>>> {
        self.by_age.page(uow, &[age.into()], pageable)
    }

    pub fn count_by_age(&self, uow: &mut UnitOfWork<'_>, age: i32) -> RepoResult<u64> {
        self.count_by_age.count(uow, &[age.into()])
    }

    /// Adds one year to every member aged `age` or older.
    ///
    /// Runs directly against the store: members already loaded in `uow`
    /// keep their old age until the context is cleared.
    pub fn bulk_age_plus(&self, uow: &mut UnitOfWork<'_>, age: i32) -> RepoResult<usize> {
        self.bulk_age_plus
            .execute(uow, &QueryParams::new().bind("age", age))
    }

    /// Teams stay deferred; load them with `UnitOfWork::load_team`.
    pub fn find_by_username(
        &self,
        uow: &mut UnitOfWork<'_>,
        username: &str,
    ) -> RepoResult<Vec<Managed<Member>>> {
        self.by_username.list(uow, &[username.into()])
    }

    /// Every member with its team loaded by the same query.
    pub fn find_member_fetch_join(
        &self,
        uow: &mut UnitOfWork<'_>,
    ) -> RepoResult<Vec<Managed<Member>>> {
        self.member_fetch_join.list(uow, &QueryParams::new())
    }

    pub fn find_entity_graph_by_username(
        &self,
        uow: &mut UnitOfWork<'_>,
        username: &str,
    ) -> RepoResult<Vec<Managed<Member>>> {
        self.entity_graph_by_username.list(uow, &[username.into()])
    }

    /// Loads without a dirty-check snapshot; edits to the result are never
    /// flushed.
    pub fn find_read_only_by_username(
        &self,
        uow: &mut UnitOfWork<'_>,
        username: &str,
    ) -> RepoResult<Option<Managed<Member>>> {
        self.read_only_by_username.single(uow, &[username.into()])
    }
}

impl CrudRepository<Member> for MemberRepository {}

impl MemberRepositoryCustom for MemberRepository {
    fn find_member_custom(&self, uow: &mut UnitOfWork<'_>) -> RepoResult<Vec<Managed<Member>>> {
        self.custom.find_member_custom(uow)
    }

    fn search_members(
        &self,
        uow: &mut UnitOfWork<'_>,
        condition: &MemberSearchCondition,
    ) -> RepoResult<Vec<MemberDto>> {
        self.custom.search_members(uow, condition)
    }
}
