//! Repository contracts and their SQLite-backed implementations.
//!
//! # Responsibility
//! - Expose CRUD, derived and explicit queries per entity.
//! - Compose hand-written custom queries into the same repository surface.
//!
//! # Invariants
//! - Repositories are registered once against a migrated connection; every
//!   query they hold has already been validated.
//! - Repositories hold no connection; each call takes the unit of work it
//!   runs in.

pub mod crud;
pub mod error;
pub mod member_custom;
pub mod member_repo;
pub mod team_repo;

pub use crud::CrudRepository;
pub use error::{RegistrationError, RepoError, RepoResult};
pub use member_custom::{MemberRepositoryCustom, MemberRepositoryImpl, MemberSearchCondition};
pub use member_repo::MemberRepository;
pub use team_repo::TeamRepository;
