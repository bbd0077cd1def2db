//! Member entity and its many-to-one team association.
//!
//! # Invariants
//! - The team association is either a deferred id (`TeamRef::Deferred`) or a
//!   loaded handle (`TeamRef::Loaded`); reading a deferred reference never
//!   touches storage.
//! - Only the team id is persisted; replacing a deferred reference with the
//!   loaded handle of the same team is not a change.

use crate::model::team::{Team, TeamId};
use crate::model::{id_value, parse_entity_id, Entity, EntityId, EntityMeta, FieldMeta, JoinMeta};
use crate::repo::error::{RepoError, RepoResult};
use crate::session::{IdentityMap, Managed, PersistenceContext};
use rusqlite::types::Value;
use rusqlite::Row;

pub type MemberId = EntityId;

const MEMBER_META: EntityMeta = EntityMeta {
    name: "Member",
    table: "members",
    alias: "m",
    id_column: "id",
    fields: &[
        FieldMeta {
            name: "username",
            column: "username",
        },
        FieldMeta {
            name: "age",
            column: "age",
        },
        FieldMeta {
            name: "team_id",
            column: "team_id",
        },
    ],
    eager_join: Some(JoinMeta {
        association: "team",
        clause: "LEFT JOIN teams t ON t.id = m.team_id",
        select: "t.id, t.name",
        column_count: 2,
    }),
};

/// Reference from a member to its team.
#[derive(Debug, Clone)]
pub enum TeamRef {
    /// Only the id is known; load it through `UnitOfWork::load_team`.
    Deferred(TeamId),
    /// The team was join-fetched or explicitly loaded.
    Loaded(Managed<Team>),
}

impl TeamRef {
    /// Referenced team id, `None` when pointing at an unsaved team.
    pub fn id(&self) -> Option<TeamId> {
        match self {
            Self::Deferred(id) => Some(*id),
            Self::Loaded(team) => team.id(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    /// Returns the loaded team.
    ///
    /// # Errors
    /// - `AssociationUnavailable` when the reference was never loaded.
    pub fn get(&self) -> RepoResult<Managed<Team>> {
        match self {
            Self::Loaded(team) => Ok(team.clone()),
            Self::Deferred(id) => Err(RepoError::AssociationUnavailable {
                association: "team",
                id: Some(*id),
            }),
        }
    }
}

/// Person registered in the system, optionally on a team.
#[derive(Debug, Clone)]
pub struct Member {
    id: Option<MemberId>,
    pub username: String,
    pub age: i32,
    team: Option<TeamRef>,
}

impl Member {
    pub fn new(username: impl Into<String>) -> Self {
        Self::with_age(username, 0)
    }

    pub fn with_age(username: impl Into<String>, age: i32) -> Self {
        Self {
            id: None,
            username: username.into(),
            age,
            team: None,
        }
    }

    pub fn with_team(username: impl Into<String>, age: i32, team: &Managed<Team>) -> Self {
        let mut member = Self::with_age(username, age);
        member.change_team(team);
        member
    }

    pub fn team(&self) -> Option<&TeamRef> {
        self.team.as_ref()
    }

    pub fn team_id(&self) -> Option<TeamId> {
        self.team.as_ref().and_then(TeamRef::id)
    }

    pub fn change_team(&mut self, team: &Managed<Team>) {
        self.team = Some(TeamRef::Loaded(team.clone()));
    }

    pub fn leave_team(&mut self) {
        self.team = None;
    }

    pub(crate) fn resolve_team(&mut self, team: Managed<Team>) {
        self.team = Some(TeamRef::Loaded(team));
    }
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        self.id.is_some() && self.id == other.id
    }
}

impl Entity for Member {
    const META: &'static EntityMeta = &MEMBER_META;

    fn id(&self) -> Option<MemberId> {
        self.id
    }

    fn assign_id(&mut self, id: MemberId) {
        self.id = Some(id);
    }

    fn column_values(&self) -> RepoResult<Vec<Value>> {
        let team_id = match &self.team {
            None => Value::Null,
            Some(team) => match team.id() {
                Some(id) => id_value(id),
                None => {
                    return Err(RepoError::TransientReference {
                        entity: MEMBER_META.name,
                        association: "team",
                    })
                }
            },
        };
        Ok(vec![
            Value::Text(self.username.clone()),
            Value::Integer(i64::from(self.age)),
            team_id,
        ])
    }

    fn from_row(row: &Row<'_>, offset: usize) -> RepoResult<Self> {
        let id_text: String = row.get(offset)?;
        let team = match row.get::<_, Option<String>>(offset + 3)? {
            Some(value) => Some(TeamRef::Deferred(parse_entity_id(&value, "members.team_id")?)),
            None => None,
        };
        Ok(Self {
            id: Some(parse_entity_id(&id_text, "members.id")?),
            username: row.get(offset + 1)?,
            age: row.get(offset + 2)?,
            team,
        })
    }

    fn identity_map(context: &mut PersistenceContext) -> &mut IdentityMap<Self> {
        &mut context.members
    }

    fn identity_map_ref(context: &PersistenceContext) -> &IdentityMap<Self> {
        &context.members
    }

    fn attach_joined(
        context: &mut PersistenceContext,
        owner: &Managed<Self>,
        row: &Row<'_>,
        offset: usize,
        read_only: bool,
    ) -> RepoResult<()> {
        if row.get::<_, Option<String>>(offset)?.is_none() {
            return Ok(());
        }
        let team = context.attach(Team::from_row(row, offset)?, read_only)?;
        let mut member = owner.try_borrow_mut()?;
        if member.team_id() == team.id() {
            member.resolve_team(team);
        }
        Ok(())
    }
}
