//! Repository query contract for members and teams over SQLite.
//! Derived, declared and paged queries resolve through an explicit unit of
//! work with an identity map.

pub mod db;
pub mod logging;
pub mod model;
pub mod paging;
pub mod query;
pub mod repo;
pub mod session;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel, LoggingError};
pub use model::dto::MemberDto;
pub use model::member::{Member, MemberId, TeamRef};
pub use model::team::{Team, TeamId};
pub use model::{Entity, EntityId};
pub use paging::{Direction, Order, Page, PageRequest, Pageable, PagingError, Sort};
pub use query::derived::DerivedQuery;
pub use query::named::{EntityQuery, ProjectionQuery, UpdateQuery};
pub use query::spec::{Criterion, Operator, QuerySpec, Subject};
pub use query::{FetchMode, Projection, QueryHints, QueryParam, QueryParams};
pub use repo::{
    CrudRepository, MemberRepository, MemberRepositoryCustom, MemberRepositoryImpl,
    MemberSearchCondition, RegistrationError, RepoError, RepoResult, TeamRepository,
};
pub use session::{FlushMode, FlushStats, Managed, UnitOfWork};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
