//! Team entity.

use crate::model::{parse_entity_id, Entity, EntityId, EntityMeta, FieldMeta};
use crate::repo::error::RepoResult;
use crate::session::{IdentityMap, PersistenceContext};
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

pub type TeamId = EntityId;

const TEAM_META: EntityMeta = EntityMeta {
    name: "Team",
    table: "teams",
    alias: "t",
    id_column: "id",
    fields: &[FieldMeta {
        name: "name",
        column: "name",
    }],
    eager_join: None,
};

/// Group a member may belong to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    id: Option<TeamId>,
    pub name: String,
}

impl Team {
    /// Creates a transient team; the id is assigned on save.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

impl PartialEq for Team {
    fn eq(&self, other: &Self) -> bool {
        self.id.is_some() && self.id == other.id
    }
}

impl Entity for Team {
    const META: &'static EntityMeta = &TEAM_META;

    fn id(&self) -> Option<TeamId> {
        self.id
    }

    fn assign_id(&mut self, id: TeamId) {
        self.id = Some(id);
    }

    fn column_values(&self) -> RepoResult<Vec<Value>> {
        Ok(vec![Value::Text(self.name.clone())])
    }

    fn from_row(row: &Row<'_>, offset: usize) -> RepoResult<Self> {
        let id_text: String = row.get(offset)?;
        Ok(Self {
            id: Some(parse_entity_id(&id_text, "teams.id")?),
            name: row.get(offset + 1)?,
        })
    }

    fn identity_map(context: &mut PersistenceContext) -> &mut IdentityMap<Self> {
        &mut context.teams
    }

    fn identity_map_ref(context: &PersistenceContext) -> &IdentityMap<Self> {
        &context.teams
    }
}
