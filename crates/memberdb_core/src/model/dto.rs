//! Read-only query projections.

use crate::model::member::MemberId;
use crate::model::parse_entity_id;
use crate::query::Projection;
use crate::repo::error::RepoResult;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// Member summary joined with its team name.
///
/// Built positionally from `(member id, username, team name)` columns; never
/// tracked by a unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDto {
    pub id: MemberId,
    pub username: String,
    pub team_name: Option<String>,
}

impl MemberDto {
    pub fn new(id: MemberId, username: impl Into<String>, team_name: Option<String>) -> Self {
        Self {
            id,
            username: username.into(),
            team_name,
        }
    }
}

impl Projection for MemberDto {
    const COLUMNS: usize = 3;

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        let id_text: String = row.get(0)?;
        Ok(Self {
            id: parse_entity_id(&id_text, "members.id")?,
            username: row.get(1)?,
            team_name: row.get(2)?,
        })
    }
}
