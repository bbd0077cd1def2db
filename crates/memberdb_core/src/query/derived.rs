//! Derived queries compiled from `QuerySpec`s.
//!
//! # Invariants
//! - Every criterion and static ordering property is resolved against the
//!   entity mapping in `compile`; unknown properties never reach a call.
//! - Positional arguments bind to criteria in declaration order.
//! - Paged results count the same predicate with a separate query.

use crate::model::Entity;
use crate::paging::{Page, Pageable, Sort};
use crate::query::spec::{Operator, QuerySpec};
use crate::query::sql::{count_entities, limit_clause, order_clause, select_entities};
use crate::query::{FetchMode, QueryHints, QueryParam};
use crate::repo::error::{RegistrationError, RepoError, RepoResult};
use crate::session::{LoadOptions, Managed, UnitOfWork};
use log::debug;
use rusqlite::types::Value;
use std::marker::PhantomData;

/// Query over entity `T` whose predicate is fixed at registration.
#[derive(Debug, Clone)]
pub struct DerivedQuery<T> {
    name: String,
    spec: QuerySpec,
    columns: Vec<&'static str>,
    options: LoadOptions,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> DerivedQuery<T> {
    /// Parses and compiles a method-style query name.
    pub fn from_method_name(method: &str) -> Result<Self, RegistrationError> {
        Self::compile(method, QuerySpec::from_method_name(method)?)
    }

    /// Resolves `spec` against `T`'s mapping.
    ///
    /// # Errors
    /// - `UnknownField` when a criterion or ordering names an unmapped
    ///   property.
    pub fn compile(name: impl Into<String>, spec: QuerySpec) -> Result<Self, RegistrationError> {
        let name = name.into();
        let meta = T::META;
        let unknown = |property: &str| RegistrationError::UnknownField {
            query: name.clone(),
            entity: meta.name,
            field: property.to_string(),
        };

        let columns = spec
            .criteria()
            .iter()
            .map(|criterion| {
                meta.property_column(&criterion.property)
                    .ok_or_else(|| unknown(&criterion.property))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(order) = spec
            .sort()
            .orders()
            .iter()
            .find(|order| meta.property_column(&order.property).is_none())
        {
            return Err(unknown(&order.property));
        }

        debug!(
            "event=query_register module=query status=ok query={name} kind=derived entity={} criteria={}",
            meta.name,
            columns.len()
        );
        Ok(Self {
            name,
            spec,
            columns,
            options: LoadOptions::default(),
            _entity: PhantomData,
        })
    }

    /// # Errors
    /// - `NoEagerAssociation` when `T` has nothing to join.
    pub fn with_fetch(mut self, fetch: FetchMode) -> Result<Self, RegistrationError> {
        if fetch == FetchMode::Eager && T::META.eager_join.is_none() {
            return Err(RegistrationError::NoEagerAssociation {
                query: self.name,
                entity: T::META.name,
            });
        }
        self.options.fetch = fetch;
        Ok(self)
    }

    pub fn with_hints(mut self, hints: QueryHints) -> Self {
        self.options.hints = hints;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    /// Number of positional arguments each call takes.
    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    pub fn list(&self, uow: &mut UnitOfWork<'_>, args: &[QueryParam]) -> RepoResult<Vec<Managed<T>>> {
        let limit = self.spec.row_limit().map(u64::from);
        self.select(uow, args, None, limit, 0)
    }

    /// Returns the only match, `None` when nothing matches.
    ///
    /// # Errors
    /// - `NonUniqueResult` when more than one row matches.
    pub fn single(
        &self,
        uow: &mut UnitOfWork<'_>,
        args: &[QueryParam],
    ) -> RepoResult<Option<Managed<T>>> {
        let mut rows = self.select(uow, args, None, Some(2), 0)?;
        if rows.len() > 1 {
            return Err(RepoError::NonUniqueResult {
                query: self.name.clone(),
            });
        }
        Ok(rows.pop())
    }

    /// Pages within the `Top`/`First` limit when the query declares one;
    /// the total counts at most that many rows.
    pub fn page(
        &self,
        uow: &mut UnitOfWork<'_>,
        args: &[QueryParam],
        pageable: impl Into<Pageable>,
    ) -> RepoResult<Page<Managed<T>>> {
        let pageable = pageable.into();
        let Pageable::Paged(request) = &pageable else {
            return Ok(Page::unpaged(self.list(uow, args)?));
        };
        let row_limit = self.spec.row_limit().map(u64::from);
        let offset = request.offset();
        let size = u64::from(request.size());
        let rows = row_limit.map_or(size, |limit| size.min(limit.saturating_sub(offset)));
        let content = if rows == 0 {
            Vec::new()
        } else {
            self.select(uow, args, pageable.sort(), Some(rows), offset)?
        };
        let counted = self.count(uow, args)?;
        let total_elements = row_limit.map_or(counted, |limit| counted.min(limit));
        Ok(Page::new(content, pageable, total_elements))
    }

    pub fn count(&self, uow: &mut UnitOfWork<'_>, args: &[QueryParam]) -> RepoResult<u64> {
        let (where_sql, values) = self.where_clause(args)?;
        let sql = format!("{}{where_sql}", count_entities(T::META));
        uow.query_count(&self.name, &sql, values)
    }

    pub fn exists(&self, uow: &mut UnitOfWork<'_>, args: &[QueryParam]) -> RepoResult<bool> {
        Ok(self.count(uow, args)? > 0)
    }

    fn select(
        &self,
        uow: &mut UnitOfWork<'_>,
        args: &[QueryParam],
        dynamic_sort: Option<&Sort>,
        limit: Option<u64>,
        offset: u64,
    ) -> RepoResult<Vec<Managed<T>>> {
        let (where_sql, mut values) = self.where_clause(args)?;
        let mut sorts = vec![self.spec.sort()];
        sorts.extend(dynamic_sort);
        let order_sql = order_clause(T::META, &sorts, limit.is_some() || offset > 0)?;
        let limit_sql = limit_clause(limit, offset, &mut values);
        let sql = format!(
            "{}{where_sql}{order_sql}{limit_sql}",
            select_entities(T::META, self.options.fetch)
        );
        uow.query_entities(&self.name, &sql, values, self.options)
    }

    fn where_clause(&self, args: &[QueryParam]) -> RepoResult<(String, Vec<Value>)> {
        if args.len() != self.columns.len() {
            return Err(RepoError::ParameterCount {
                query: self.name.clone(),
                expected: self.columns.len(),
                actual: args.len(),
            });
        }

        let mut terms = Vec::with_capacity(args.len());
        let mut values = Vec::with_capacity(args.len());
        let bindings = self.spec.criteria().iter().zip(&self.columns).zip(args);
        for (position, ((criterion, column), arg)) in bindings.enumerate() {
            let column = T::META.qualified(column);
            match (criterion.operator, arg) {
                (Operator::In, arg) => {
                    let candidates = arg.clone().into_values();
                    if candidates.is_empty() {
                        terms.push("0 = 1".to_string());
                    } else {
                        let placeholders = vec!["?"; candidates.len()].join(", ");
                        terms.push(format!("{column} IN ({placeholders})"));
                        values.extend(candidates);
                    }
                }
                (Operator::Equals, QueryParam::Value(Value::Null)) => {
                    terms.push(format!("{column} IS NULL"));
                }
                (operator, QueryParam::Value(value)) => {
                    terms.push(format!("{column} {} ?", operator.sql()));
                    values.push(value.clone());
                }
                (_, QueryParam::List(_)) => {
                    return Err(RepoError::InvalidParameter {
                        query: self.name.clone(),
                        name: format!("?{}", position + 1),
                        reason: "collection arguments need an `In` criterion",
                    });
                }
            }
        }

        let where_sql = if terms.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", terms.join(" AND "))
        };
        Ok((where_sql, values))
    }
}

#[cfg(test)]
mod tests {
    use super::DerivedQuery;
    use crate::model::member::Member;
    use crate::model::team::Team;
    use crate::query::spec::{Operator, QuerySpec};
    use crate::query::{FetchMode, QueryParam};
    use crate::repo::error::{RegistrationError, RepoError};
    use rusqlite::types::Value;

    #[test]
    fn unknown_property_fails_compile() {
        let err = DerivedQuery::<Member>::from_method_name("findByNicknameAndAge").unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::UnknownField { ref field, entity: "Member", .. } if field == "nickname"
        ));

        let err = DerivedQuery::<Member>::from_method_name("findByAgeOrderByNicknameAsc")
            .unwrap_err();
        assert!(matches!(err, RegistrationError::UnknownField { .. }));
    }

    #[test]
    fn where_clause_binds_in_declaration_order() {
        let query =
            DerivedQuery::<Member>::from_method_name("findByUsernameAndAgeGreaterThan").unwrap();
        let (sql, values) = query
            .where_clause(&["aaa".into(), 15.into()])
            .unwrap();
        assert_eq!(sql, " WHERE m.username = ? AND m.age > ?");
        assert_eq!(
            values,
            vec![Value::Text("aaa".to_string()), Value::Integer(15)]
        );
    }

    #[test]
    fn in_criterion_expands_and_empty_matches_nothing() {
        let query = DerivedQuery::<Member>::compile(
            "byNames",
            QuerySpec::find().and("username", Operator::In),
        )
        .unwrap();

        let (sql, values) = query
            .where_clause(&[QueryParam::list(["a", "b"])])
            .unwrap();
        assert_eq!(sql, " WHERE m.username IN (?, ?)");
        assert_eq!(values.len(), 2);

        let (sql, values) = query
            .where_clause(&[QueryParam::list(Vec::<String>::new())])
            .unwrap();
        assert_eq!(sql, " WHERE 0 = 1");
        assert!(values.is_empty());
    }

    #[test]
    fn null_equality_renders_is_null() {
        let query = DerivedQuery::<Member>::from_method_name("findByTeamId").unwrap();
        let (sql, values) = query.where_clause(&[QueryParam::from(None::<i32>)]).unwrap();
        assert_eq!(sql, " WHERE m.team_id IS NULL");
        assert!(values.is_empty());
    }

    #[test]
    fn argument_shape_is_checked() {
        let query = DerivedQuery::<Member>::from_method_name("findByUsername").unwrap();
        let err = query.where_clause(&[]).unwrap_err();
        assert!(matches!(
            err,
            RepoError::ParameterCount {
                expected: 1,
                actual: 0,
                ..
            }
        ));

        let err = query
            .where_clause(&[QueryParam::list(["a"])])
            .unwrap_err();
        assert!(matches!(err, RepoError::InvalidParameter { .. }));
    }

    #[test]
    fn eager_fetch_requires_association() {
        let err = DerivedQuery::<Team>::from_method_name("findByName")
            .unwrap()
            .with_fetch(FetchMode::Eager)
            .unwrap_err();
        assert!(matches!(err, RegistrationError::NoEagerAssociation { .. }));
    }
}
