//! Hand-written member queries composed into `MemberRepository`.

use crate::model::dto::MemberDto;
use crate::model::member::Member;
use crate::repo::error::RepoResult;
use crate::session::{LoadOptions, Managed, UnitOfWork};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

const MEMBER_SELECT_SQL: &str = "SELECT m.id, m.username, m.age, m.team_id FROM members m";
const MEMBER_DTO_SELECT_SQL: &str = "SELECT m.id, m.username, t.name
     FROM members m
     LEFT JOIN teams t ON t.id = m.team_id";

/// Optional filters for `search_members`; unset fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSearchCondition {
    pub username: Option<String>,
    pub team_name: Option<String>,
    /// Inclusive lower age bound.
    pub age_goe: Option<i32>,
    /// Inclusive upper age bound.
    pub age_loe: Option<i32>,
}

/// Member queries that are not expressible as derived or declared queries.
pub trait MemberRepositoryCustom {
    /// Every member, loaded through the unit of work.
    fn find_member_custom(&self, uow: &mut UnitOfWork<'_>) -> RepoResult<Vec<Managed<Member>>>;

    /// Members matching every set field of `condition`, ordered by username.
    fn search_members(
        &self,
        uow: &mut UnitOfWork<'_>,
        condition: &MemberSearchCondition,
    ) -> RepoResult<Vec<MemberDto>>;
}

/// SQLite implementation of the custom member queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemberRepositoryImpl;

impl MemberRepositoryCustom for MemberRepositoryImpl {
    fn find_member_custom(&self, uow: &mut UnitOfWork<'_>) -> RepoResult<Vec<Managed<Member>>> {
        uow.query_entities(
            "Member.findMemberCustom",
            MEMBER_SELECT_SQL,
            Vec::new(),
            LoadOptions::default(),
        )
    }

    fn search_members(
        &self,
        uow: &mut UnitOfWork<'_>,
        condition: &MemberSearchCondition,
    ) -> RepoResult<Vec<MemberDto>> {
        let mut sql = format!("{MEMBER_DTO_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(username) = condition.username.as_deref() {
            sql.push_str(" AND m.username = ?");
            bind_values.push(Value::Text(username.to_string()));
        }
        if let Some(team_name) = condition.team_name.as_deref() {
            sql.push_str(" AND t.name = ?");
            bind_values.push(Value::Text(team_name.to_string()));
        }
        if let Some(age_goe) = condition.age_goe {
            sql.push_str(" AND m.age >= ?");
            bind_values.push(Value::Integer(i64::from(age_goe)));
        }
        if let Some(age_loe) = condition.age_loe {
            sql.push_str(" AND m.age <= ?");
            bind_values.push(Value::Integer(i64::from(age_loe)));
        }

        sql.push_str(" ORDER BY m.username ASC, m.rowid ASC");
        uow.query_projections("Member.searchMembers", &sql, bind_values)
    }
}
