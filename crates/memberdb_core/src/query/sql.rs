//! SQL fragments shared by derived, CRUD and paged queries.

use crate::model::EntityMeta;
use crate::paging::Sort;
use crate::query::FetchMode;
use crate::repo::error::{RepoError, RepoResult};
use rusqlite::types::Value;

/// `SELECT <entity columns>[, <joined columns>] FROM <table> <alias>[ <join>]`
pub(crate) fn select_entities(meta: &EntityMeta, fetch: FetchMode) -> String {
    match (fetch, meta.eager_join) {
        (FetchMode::Eager, Some(join)) => format!(
            "SELECT {}, {} FROM {} {} {}",
            meta.select_list(),
            join.select,
            meta.table,
            meta.alias,
            join.clause
        ),
        _ => format!(
            "SELECT {} FROM {} {}",
            meta.select_list(),
            meta.table,
            meta.alias
        ),
    }
}

pub(crate) fn count_entities(meta: &EntityMeta) -> String {
    format!("SELECT COUNT(*) FROM {} {}", meta.table, meta.alias)
}

/// Renders ` ORDER BY ...` for the given sorts, in priority order.
///
/// `stable` appends the row id so paged results never straddle ties.
pub(crate) fn order_clause(meta: &EntityMeta, sorts: &[&Sort], stable: bool) -> RepoResult<String> {
    let mut terms = Vec::new();
    for order in sorts.iter().flat_map(|sort| sort.orders()) {
        let column =
            meta.property_column(&order.property)
                .ok_or_else(|| RepoError::UnknownProperty {
                    entity: meta.name,
                    property: order.property.clone(),
                })?;
        terms.push(format!(
            "{} {}",
            meta.qualified(column),
            order.direction.sql()
        ));
    }
    if stable {
        terms.push(format!("{}.rowid ASC", meta.alias));
    }

    if terms.is_empty() {
        Ok(String::new())
    } else {
        Ok(format!(" ORDER BY {}", terms.join(", ")))
    }
}

/// Renders ` LIMIT ? OFFSET ?` and pushes the bound values.
pub(crate) fn limit_clause(limit: Option<u64>, offset: u64, values: &mut Vec<Value>) -> String {
    match (limit, offset) {
        (None, 0) => String::new(),
        (limit, offset) => {
            values.push(Value::Integer(limit.map_or(-1, clamp_i64)));
            values.push(Value::Integer(clamp_i64(offset)));
            " LIMIT ? OFFSET ?".to_string()
        }
    }
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
