//! Entity model persisted through the repositories.
//!
//! # Responsibility
//! - Define `Member`, `Team` and the `MemberDto` projection.
//! - Describe table/column metadata used to validate and render queries.
//!
//! # Invariants
//! - Every persisted entity is identified by a stable UUID assigned on save.
//! - Entity equality is identity equality once an id is assigned.

pub mod dto;
pub mod member;
pub mod team;

use crate::repo::error::RepoResult;
use crate::session::{Managed, PersistenceContext};
use rusqlite::types::Value;
use rusqlite::Row;
use uuid::Uuid;

/// Surrogate key shared by all entity tables.
pub type EntityId = Uuid;

/// One mapped attribute of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMeta {
    /// Property name used by query declarations and sort orders.
    pub name: &'static str,
    /// Backing column name.
    pub column: &'static str,
}

/// Association that can be join-fetched together with its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinMeta {
    /// Association property name on the owning entity.
    pub association: &'static str,
    /// Join clause appended after the owner's `FROM`.
    pub clause: &'static str,
    /// Select list of the joined columns, id first.
    pub select: &'static str,
    /// Number of columns in `select`.
    pub column_count: usize,
}

/// Table mapping of an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityMeta {
    pub name: &'static str,
    pub table: &'static str,
    /// Alias used for the table in generated SQL.
    pub alias: &'static str,
    pub id_column: &'static str,
    /// Mapped attributes in column order, id excluded.
    pub fields: &'static [FieldMeta],
    pub eager_join: Option<JoinMeta>,
}

impl EntityMeta {
    /// Number of columns read for one entity row, id included.
    pub fn column_count(&self) -> usize {
        self.fields.len() + 1
    }

    /// Resolves a property name (`id` or a mapped field) to its column.
    pub fn property_column(&self, property: &str) -> Option<&'static str> {
        if property == "id" {
            return Some(self.id_column);
        }
        self.fields
            .iter()
            .find(|field| field.name == property)
            .map(|field| field.column)
    }

    pub fn qualified(&self, column: &str) -> String {
        format!("{}.{column}", self.alias)
    }

    /// `alias.id, alias.col1, ...` in entity column order.
    pub fn select_list(&self) -> String {
        std::iter::once(self.id_column)
            .chain(self.fields.iter().map(|field| field.column))
            .map(|column| self.qualified(column))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub(crate) fn insert_sql(&self) -> String {
        let columns = std::iter::once(self.id_column)
            .chain(self.fields.iter().map(|field| field.column))
            .collect::<Vec<_>>();
        let placeholders = (1..=columns.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>();
        format!(
            "INSERT INTO {} ({}) VALUES ({});",
            self.table,
            columns.join(", "),
            placeholders.join(", ")
        )
    }

    pub(crate) fn update_sql(&self) -> String {
        let assignments = self
            .fields
            .iter()
            .enumerate()
            .map(|(index, field)| format!("{} = ?{}", field.column, index + 1))
            .collect::<Vec<_>>();
        format!(
            "UPDATE {} SET {} WHERE {} = ?{};",
            self.table,
            assignments.join(", "),
            self.id_column,
            self.fields.len() + 1
        )
    }

    pub(crate) fn delete_sql(&self) -> String {
        format!("DELETE FROM {} WHERE {} = ?1;", self.table, self.id_column)
    }

    pub(crate) fn select_by_id_sql(&self) -> String {
        format!(
            "SELECT {} FROM {} {} WHERE {} = ?1;",
            self.select_list(),
            self.table,
            self.alias,
            self.qualified(self.id_column)
        )
    }
}

/// Persistent type tracked by a unit of work.
pub trait Entity: Clone + Sized + 'static {
    const META: &'static EntityMeta;

    /// Identity, `None` while transient.
    fn id(&self) -> Option<EntityId>;

    fn assign_id(&mut self, id: EntityId);

    /// Column values in `META.fields` order.
    fn column_values(&self) -> RepoResult<Vec<Value>>;

    /// Decodes one entity whose id column is at `offset`.
    fn from_row(row: &Row<'_>, offset: usize) -> RepoResult<Self>;

    /// Identity map slot for this type inside a persistence context.
    fn identity_map(context: &mut PersistenceContext) -> &mut crate::session::IdentityMap<Self>;

    fn identity_map_ref(context: &PersistenceContext) -> &crate::session::IdentityMap<Self>;

    /// Links the eagerly joined association decoded from `row` at `offset`.
    fn attach_joined(
        _context: &mut PersistenceContext,
        _owner: &Managed<Self>,
        _row: &Row<'_>,
        _offset: usize,
        _read_only: bool,
    ) -> RepoResult<()> {
        Ok(())
    }
}

pub(crate) fn parse_entity_id(value: &str, column: &str) -> RepoResult<EntityId> {
    Uuid::parse_str(value).map_err(|_| {
        crate::repo::error::RepoError::InvalidData(format!(
            "invalid uuid value `{value}` in {column}"
        ))
    })
}

pub(crate) fn id_value(id: EntityId) -> Value {
    Value::Text(id.to_string())
}
