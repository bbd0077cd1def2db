//! Repository error types.
//!
//! # Invariants
//! - `RegistrationError` is only produced while repositories are wired up;
//!   a registered repository never reports configuration problems per call.
//! - Not-found single results are `Ok(None)`, never an error.

use crate::db::DbError;
use crate::model::EntityId;
use crate::paging::PagingError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Per-call repository failure.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// A single-result query matched more than one row.
    NonUniqueResult { query: String },
    /// Positional argument count differs from the query's criteria.
    ParameterCount {
        query: String,
        expected: usize,
        actual: usize,
    },
    MissingParameter { query: String, name: String },
    UnknownParameter { query: String, name: String },
    /// Argument shape does not fit the operator (list vs single value).
    InvalidParameter {
        query: String,
        name: String,
        reason: &'static str,
    },
    /// Sort property not mapped on the entity.
    UnknownProperty {
        entity: &'static str,
        property: String,
    },
    /// Association was never loaded and cannot be loaded any more.
    AssociationUnavailable {
        association: &'static str,
        id: Option<EntityId>,
    },
    /// Entity references an association target that was never saved.
    TransientReference {
        entity: &'static str,
        association: &'static str,
    },
    /// `persist` was given an entity that already has an identity.
    DetachedEntity { entity: &'static str, id: EntityId },
    /// `merge` was given an entity scheduled for removal.
    RemovedEntity { entity: &'static str, id: EntityId },
    /// A caller-held borrow of a managed instance blocks reading or
    /// updating it.
    EntityBorrowed {
        entity: &'static str,
        id: Option<EntityId>,
    },
    InvalidData(String),
    Paging(PagingError),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NonUniqueResult { query } => {
                write!(f, "query `{query}` returned more than one row")
            }
            Self::ParameterCount {
                query,
                expected,
                actual,
            } => write!(
                f,
                "query `{query}` expects {expected} argument(s), got {actual}"
            ),
            Self::MissingParameter { query, name } => {
                write!(f, "query `{query}` has no value bound for `:{name}`")
            }
            Self::UnknownParameter { query, name } => {
                write!(f, "query `{query}` declares no parameter `:{name}`")
            }
            Self::InvalidParameter {
                query,
                name,
                reason,
            } => write!(f, "invalid argument `{name}` for query `{query}`: {reason}"),
            Self::UnknownProperty { entity, property } => {
                write!(f, "no property `{property}` on entity {entity}")
            }
            Self::AssociationUnavailable { association, id } => match id {
                Some(id) => write!(
                    f,
                    "association `{association}` ({id}) is not loaded and no unit of work can load it"
                ),
                None => write!(
                    f,
                    "association `{association}` is not loaded and no unit of work can load it"
                ),
            },
            Self::TransientReference {
                entity,
                association,
            } => write!(
                f,
                "{entity}.{association} references an entity that was never saved"
            ),
            Self::DetachedEntity { entity, id } => {
                write!(f, "{entity} {id} already has an identity; merge it instead")
            }
            Self::RemovedEntity { entity, id } => {
                write!(f, "{entity} {id} is scheduled for removal")
            }
            Self::EntityBorrowed { entity, id } => match id {
                Some(id) => write!(f, "{entity} {id} is borrowed by the caller"),
                None => write!(f, "{entity} is borrowed by the caller"),
            },
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::Paging(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Paging(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<PagingError> for RepoError {
    fn from(value: PagingError) -> Self {
        Self::Paging(value)
    }
}

/// Configuration error raised while declaring or registering queries.
#[derive(Debug)]
pub enum RegistrationError {
    /// Method-style name does not follow the derivation grammar.
    InvalidMethodName { method: String, reason: String },
    /// Criterion or ordering names a property the entity does not map.
    UnknownField {
        query: String,
        entity: &'static str,
        field: String,
    },
    /// Query text failed to prepare against the schema.
    InvalidQuery {
        query: String,
        source: rusqlite::Error,
    },
    /// Selected column count does not match the declared result shape.
    ColumnMismatch {
        query: String,
        expected: usize,
        actual: usize,
    },
    /// Eager fetch requested for an entity with no joinable association.
    NoEagerAssociation { query: String, entity: &'static str },
}

impl Display for RegistrationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidMethodName { method, reason } => {
                write!(f, "cannot derive a query from `{method}`: {reason}")
            }
            Self::UnknownField {
                query,
                entity,
                field,
            } => write!(
                f,
                "query `{query}` references unknown property `{field}` of {entity}"
            ),
            Self::InvalidQuery { query, source } => {
                write!(f, "query `{query}` is invalid: {source}")
            }
            Self::ColumnMismatch {
                query,
                expected,
                actual,
            } => write!(
                f,
                "query `{query}` selects {actual} column(s), result shape needs {expected}"
            ),
            Self::NoEagerAssociation { query, entity } => write!(
                f,
                "query `{query}` requests eager fetch but {entity} has no joinable association"
            ),
        }
    }
}

impl Error for RegistrationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidQuery { source, .. } => Some(source),
            _ => None,
        }
    }
}
