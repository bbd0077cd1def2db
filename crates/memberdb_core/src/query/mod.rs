//! Query declarations, parameter binding and result shaping.
//!
//! # Responsibility
//! - Build derived queries from declarative `QuerySpec`s.
//! - Register explicit SQL queries with named parameters.
//! - Shape rows into managed entities or read-only projections.
//!
//! # Invariants
//! - Every query is validated when registered; per-call errors are limited
//!   to argument binding and storage failures.

pub mod derived;
pub mod named;
pub mod spec;
pub(crate) mod sql;

use crate::repo::error::RepoResult;
use rusqlite::types::Value;
use rusqlite::Row;
use uuid::Uuid;

/// How an entity's association is loaded by a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// Association stays a deferred reference.
    #[default]
    Lazy,
    /// Association is joined and attached in the same query.
    Eager,
}

/// Per-query loading hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryHints {
    /// Loaded entities are never dirty-checked; in-memory edits are not
    /// written back.
    pub read_only: bool,
}

impl QueryHints {
    pub fn read_only() -> Self {
        Self { read_only: true }
    }
}

/// Row shape for non-entity query results, read positionally.
pub trait Projection: Sized {
    /// Number of selected columns the shape consumes.
    const COLUMNS: usize;

    fn from_row(row: &Row<'_>) -> RepoResult<Self>;
}

impl Projection for String {
    const COLUMNS: usize = 1;

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(row.get(0)?)
    }
}

impl Projection for i64 {
    const COLUMNS: usize = 1;

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(row.get(0)?)
    }
}

impl Projection for i32 {
    const COLUMNS: usize = 1;

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(row.get(0)?)
    }
}

/// Argument bound to one query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Value(Value),
    /// Multi-value argument for `IN` predicates.
    List(Vec<Value>),
}

impl QueryParam {
    /// Collects values for an `IN` predicate.
    pub fn list<I>(values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<QueryParam>,
    {
        let mut flattened = Vec::new();
        for value in values {
            match value.into() {
                Self::Value(single) => flattened.push(single),
                Self::List(many) => flattened.extend(many),
            }
        }
        Self::List(flattened)
    }

    pub(crate) fn into_values(self) -> Vec<Value> {
        match self {
            Self::Value(value) => vec![value],
            Self::List(values) => values,
        }
    }
}

impl From<&str> for QueryParam {
    fn from(value: &str) -> Self {
        Self::Value(Value::Text(value.to_string()))
    }
}

impl From<String> for QueryParam {
    fn from(value: String) -> Self {
        Self::Value(Value::Text(value))
    }
}

impl From<&String> for QueryParam {
    fn from(value: &String) -> Self {
        Self::Value(Value::Text(value.clone()))
    }
}

impl From<i32> for QueryParam {
    fn from(value: i32) -> Self {
        Self::Value(Value::Integer(i64::from(value)))
    }
}

impl From<i64> for QueryParam {
    fn from(value: i64) -> Self {
        Self::Value(Value::Integer(value))
    }
}

impl From<Uuid> for QueryParam {
    fn from(value: Uuid) -> Self {
        Self::Value(Value::Text(value.to_string()))
    }
}

impl<T: Into<QueryParam>> From<Option<T>> for QueryParam {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Value(Value::Null), Into::into)
    }
}

impl<T: Into<QueryParam>> From<Vec<T>> for QueryParam {
    fn from(values: Vec<T>) -> Self {
        Self::list(values)
    }
}

/// Named arguments for explicit queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    bindings: Vec<(String, QueryParam)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `value` to `:name`, replacing an earlier binding.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<QueryParam>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.bindings.iter_mut().find(|(bound, _)| *bound == name) {
            Some(binding) => binding.1 = value,
            None => self.bindings.push((name, value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&QueryParam> {
        self.bindings
            .iter()
            .find(|(bound, _)| bound == name)
            .map(|(_, value)| value)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|(name, _)| name.as_str())
    }
}
