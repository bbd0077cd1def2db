//! Explicit queries declared with SQL text and `:name` parameters.
//!
//! # Responsibility
//! - Validate query text and result shape against the schema at
//!   registration.
//! - Bind named arguments per call, expanding list arguments for `IN`.
//!
//! # Invariants
//! - Every declared parameter must be bound and every bound name declared.
//! - An empty list argument renders `NULL`, so `x IN (:names)` matches no row.
//! - `:name` inside a quoted literal or identifier is not a parameter.

use crate::model::Entity;
use crate::query::{FetchMode, Projection, QueryHints, QueryParam, QueryParams};
use crate::repo::error::{RegistrationError, RepoError, RepoResult};
use crate::session::{LoadOptions, Managed, UnitOfWork};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use rusqlite::Connection;
use std::marker::PhantomData;

/// Quoted literals match without a capture, so `:` inside them is plain text.
static NAMED_PARAM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"'(?:[^']|'')*'|"(?:[^"]|"")*"|:([A-Za-z_][A-Za-z0-9_]*)"#)
        .expect("valid named parameter regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Param(String),
}

/// SQL text split around its named parameters.
#[derive(Debug, Clone)]
struct NamedSql {
    segments: Vec<Segment>,
    names: Vec<String>,
}

impl NamedSql {
    fn parse(sql: &str) -> Self {
        let mut segments = Vec::new();
        let mut names: Vec<String> = Vec::new();
        let mut cursor = 0;
        for captures in NAMED_PARAM_RE.captures_iter(sql) {
            let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            if whole.start() > cursor {
                segments.push(Segment::Text(sql[cursor..whole.start()].to_string()));
            }
            let name = name.as_str().to_string();
            if !names.contains(&name) {
                names.push(name.clone());
            }
            segments.push(Segment::Param(name));
            cursor = whole.end();
        }
        if cursor < sql.len() {
            segments.push(Segment::Text(sql[cursor..].to_string()));
        }
        Self { segments, names }
    }

    /// Positional SQL with one placeholder per parameter, used to prepare.
    fn template(&self) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Text(text) => text.as_str(),
                Segment::Param(_) => "?",
            })
            .collect()
    }

    fn render(&self, query: &str, params: &QueryParams) -> RepoResult<(String, Vec<Value>)> {
        if let Some(unknown) = params
            .names()
            .find(|bound| !self.names.iter().any(|declared| declared == bound))
        {
            return Err(RepoError::UnknownParameter {
                query: query.to_string(),
                name: unknown.to_string(),
            });
        }

        let mut sql = String::new();
        let mut values = Vec::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => sql.push_str(text),
                Segment::Param(name) => match params.get(name) {
                    None => {
                        return Err(RepoError::MissingParameter {
                            query: query.to_string(),
                            name: name.clone(),
                        })
                    }
                    Some(QueryParam::Value(value)) => {
                        sql.push('?');
                        values.push(value.clone());
                    }
                    Some(QueryParam::List(items)) if items.is_empty() => sql.push_str("NULL"),
                    Some(QueryParam::List(items)) => {
                        sql.push_str(&vec!["?"; items.len()].join(", "));
                        values.extend(items.iter().cloned());
                    }
                },
            }
        }
        Ok((sql, values))
    }
}

fn prepare(
    conn: &Connection,
    name: &str,
    sql: &str,
    expected_columns: usize,
    kind: &str,
) -> Result<NamedSql, RegistrationError> {
    let named = NamedSql::parse(sql);
    let stmt = conn
        .prepare(&named.template())
        .map_err(|source| RegistrationError::InvalidQuery {
            query: name.to_string(),
            source,
        })?;
    let actual = stmt.column_count();
    if actual != expected_columns {
        return Err(RegistrationError::ColumnMismatch {
            query: name.to_string(),
            expected: expected_columns,
            actual,
        });
    }
    debug!(
        "event=query_register module=query status=ok query={name} kind={kind} params={}",
        named.names.len()
    );
    Ok(named)
}

/// Explicit query whose rows are managed entities.
#[derive(Debug, Clone)]
pub struct EntityQuery<T> {
    name: String,
    sql: NamedSql,
    options: LoadOptions,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> EntityQuery<T> {
    /// Registers a query selecting exactly `T`'s columns in mapping order.
    pub fn register(
        conn: &Connection,
        name: impl Into<String>,
        sql: &str,
    ) -> Result<Self, RegistrationError> {
        let name = name.into();
        let sql = prepare(conn, &name, sql, T::META.column_count(), "entity")?;
        Ok(Self {
            name,
            sql,
            options: LoadOptions::default(),
            _entity: PhantomData,
        })
    }

    /// Registers a fetch-join query: `T`'s columns followed by the joined
    /// association's columns. Rows without a match leave the association
    /// deferred.
    pub fn register_eager(
        conn: &Connection,
        name: impl Into<String>,
        sql: &str,
    ) -> Result<Self, RegistrationError> {
        let name = name.into();
        let Some(join) = T::META.eager_join else {
            return Err(RegistrationError::NoEagerAssociation {
                query: name,
                entity: T::META.name,
            });
        };
        let expected = T::META.column_count() + join.column_count;
        let sql = prepare(conn, &name, sql, expected, "entity_fetch_join")?;
        Ok(Self {
            name,
            sql,
            options: LoadOptions {
                fetch: FetchMode::Eager,
                hints: QueryHints::default(),
            },
            _entity: PhantomData,
        })
    }

    pub fn with_hints(mut self, hints: QueryHints) -> Self {
        self.options.hints = hints;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn list(&self, uow: &mut UnitOfWork<'_>, params: &QueryParams) -> RepoResult<Vec<Managed<T>>> {
        let (sql, values) = self.sql.render(&self.name, params)?;
        uow.query_entities(&self.name, &sql, values, self.options)
    }

    /// # Errors
    /// - `NonUniqueResult` when more than one row matches.
    pub fn single(
        &self,
        uow: &mut UnitOfWork<'_>,
        params: &QueryParams,
    ) -> RepoResult<Option<Managed<T>>> {
        let mut rows = self.list(uow, params)?;
        if rows.len() > 1 {
            return Err(RepoError::NonUniqueResult {
                query: self.name.clone(),
            });
        }
        Ok(rows.pop())
    }
}

/// Explicit query whose rows are read-only projections.
#[derive(Debug, Clone)]
pub struct ProjectionQuery<P> {
    name: String,
    sql: NamedSql,
    _shape: PhantomData<fn() -> P>,
}

impl<P: Projection> ProjectionQuery<P> {
    pub fn register(
        conn: &Connection,
        name: impl Into<String>,
        sql: &str,
    ) -> Result<Self, RegistrationError> {
        let name = name.into();
        let sql = prepare(conn, &name, sql, P::COLUMNS, "projection")?;
        Ok(Self {
            name,
            sql,
            _shape: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn list(&self, uow: &mut UnitOfWork<'_>, params: &QueryParams) -> RepoResult<Vec<P>> {
        let (sql, values) = self.sql.render(&self.name, params)?;
        uow.query_projections(&self.name, &sql, values)
    }

    pub fn single(&self, uow: &mut UnitOfWork<'_>, params: &QueryParams) -> RepoResult<Option<P>> {
        let mut rows = self.list(uow, params)?;
        if rows.len() > 1 {
            return Err(RepoError::NonUniqueResult {
                query: self.name.clone(),
            });
        }
        Ok(rows.pop())
    }
}

/// Explicit bulk `UPDATE`/`DELETE` executed directly against the store.
#[derive(Debug, Clone)]
pub struct UpdateQuery {
    name: String,
    sql: NamedSql,
    clear_automatically: bool,
}

impl UpdateQuery {
    /// # Errors
    /// - `ColumnMismatch` when the statement returns rows.
    pub fn register(
        conn: &Connection,
        name: impl Into<String>,
        sql: &str,
    ) -> Result<Self, RegistrationError> {
        let name = name.into();
        let sql = prepare(conn, &name, sql, 0, "update")?;
        Ok(Self {
            name,
            sql,
            clear_automatically: false,
        })
    }

    /// Clears the persistence context after each execution so later reads
    /// observe the updated rows.
    pub fn clear_automatically(mut self) -> Self {
        self.clear_automatically = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of affected rows.
    pub fn execute(&self, uow: &mut UnitOfWork<'_>, params: &QueryParams) -> RepoResult<usize> {
        let (sql, values) = self.sql.render(&self.name, params)?;
        let changed = uow.execute_update(&self.name, &sql, values)?;
        if self.clear_automatically {
            uow.clear();
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::{EntityQuery, NamedSql, ProjectionQuery, UpdateQuery};
    use crate::db::open_db_in_memory;
    use crate::model::dto::MemberDto;
    use crate::model::member::Member;
    use crate::model::team::Team;
    use crate::query::{QueryParam, QueryParams};
    use crate::repo::error::{RegistrationError, RepoError};
    use rusqlite::types::Value;

    #[test]
    fn repeated_names_share_one_declaration() {
        let named = NamedSql::parse("SELECT 1 WHERE :a = :b OR :a IS NULL");
        assert_eq!(named.names, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(named.template(), "SELECT 1 WHERE ? = ? OR ? IS NULL");
    }

    #[test]
    fn colons_inside_quoted_literals_are_text() {
        let named = NamedSql::parse(
            "SELECT 1 WHERE x <> 'x:y' AND \"a:b\" = 'it''s :not' AND y = :age",
        );
        assert_eq!(named.names, vec!["age".to_string()]);
        assert_eq!(
            named.template(),
            "SELECT 1 WHERE x <> 'x:y' AND \"a:b\" = 'it''s :not' AND y = ?"
        );

        let params = QueryParams::new().bind("age", 10);
        let (sql, values) = named.render("q", &params).unwrap();
        assert!(sql.contains("'x:y'"));
        assert_eq!(values, vec![Value::Integer(10)]);
    }

    #[test]
    fn list_arguments_expand_in_place() {
        let named = NamedSql::parse("SELECT 1 WHERE x IN (:names) AND y = :age");
        let params = QueryParams::new()
            .bind("names", QueryParam::list(["a", "b", "c"]))
            .bind("age", 10);
        let (sql, values) = named.render("q", &params).unwrap();
        assert_eq!(sql, "SELECT 1 WHERE x IN (?, ?, ?) AND y = ?");
        assert_eq!(values.len(), 4);
        assert_eq!(values[3], Value::Integer(10));

        let params = QueryParams::new()
            .bind("names", QueryParam::list(Vec::<&str>::new()))
            .bind("age", 10);
        let (sql, _) = named.render("q", &params).unwrap();
        assert_eq!(sql, "SELECT 1 WHERE x IN (NULL) AND y = ?");
    }

    #[test]
    fn binding_mismatches_are_reported() {
        let named = NamedSql::parse("SELECT 1 WHERE x = :username");
        let err = named.render("q", &QueryParams::new()).unwrap_err();
        assert!(matches!(err, RepoError::MissingParameter { ref name, .. } if name == "username"));

        let params = QueryParams::new().bind("username", "a").bind("age", 1);
        let err = named.render("q", &params).unwrap_err();
        assert!(matches!(err, RepoError::UnknownParameter { ref name, .. } if name == "age"));
    }

    #[test]
    fn registration_checks_text_and_shape() {
        let conn = open_db_in_memory().unwrap();

        let err = EntityQuery::<Member>::register(&conn, "broken", "SELECT nope FROM members")
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidQuery { .. }));

        let err = ProjectionQuery::<MemberDto>::register(
            &conn,
            "short",
            "SELECT m.id, m.username FROM members m",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::ColumnMismatch {
                expected: 3,
                actual: 2,
                ..
            }
        ));

        let err = UpdateQuery::register(&conn, "select", "SELECT 1").unwrap_err();
        assert!(matches!(err, RegistrationError::ColumnMismatch { .. }));

        let err = EntityQuery::<Team>::register_eager(&conn, "join", "SELECT t.id, t.name FROM teams t")
            .unwrap_err();
        assert!(matches!(err, RegistrationError::NoEagerAssociation { .. }));
    }
}
