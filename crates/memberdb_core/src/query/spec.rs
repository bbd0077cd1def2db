//! Declarative query specifications.
//!
//! A `QuerySpec` is the configuration-time description of a derived query:
//! a conjunction of `(property, operator)` criteria in declaration order,
//! plus optional static ordering and row limit. Specs are built directly or
//! parsed from method-style names such as `findByUsernameAndAgeGreaterThan`.

use crate::paging::{Direction, Sort};
use crate::repo::error::RegistrationError;
use once_cell::sync::Lazy;
use regex::Regex;

static METHOD_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(find|read|get|query|count|exists)([A-Za-z0-9]*?)By([A-Z][A-Za-z0-9]*)$")
        .expect("valid method name regex")
});
static LIMIT_SUBJECT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:Top|First)(\d*)$").expect("valid limit subject regex"));
static ORDER_TERM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Z][A-Za-z0-9]*?)(Asc|Desc)").expect("valid order term regex"));

/// Comparison applied by one criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
    /// Matches any value of a collection argument.
    In,
}

impl Operator {
    // Longest keywords first so `GreaterThanEqual` wins over `GreaterThan`.
    const SUFFIXES: [(&'static str, Operator); 5] = [
        ("GreaterThanEqual", Operator::GreaterThanEqual),
        ("GreaterThan", Operator::GreaterThan),
        ("LessThanEqual", Operator::LessThanEqual),
        ("LessThan", Operator::LessThan),
        ("In", Operator::In),
    ];

    pub(crate) fn sql(self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::GreaterThan => ">",
            Self::GreaterThanEqual => ">=",
            Self::LessThan => "<",
            Self::LessThanEqual => "<=",
            Self::In => "IN",
        }
    }
}

/// One `property <operator> ?` predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Criterion {
    pub property: String,
    pub operator: Operator,
}

/// What a derived query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Subject {
    #[default]
    Find,
    Count,
    Exists,
}

/// Configuration-time description of a derived query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuerySpec {
    subject: Subject,
    criteria: Vec<Criterion>,
    sort: Sort,
    limit: Option<u32>,
}

impl QuerySpec {
    pub fn find() -> Self {
        Self::default()
    }

    pub fn count() -> Self {
        Self {
            subject: Subject::Count,
            ..Self::default()
        }
    }

    pub fn exists() -> Self {
        Self {
            subject: Subject::Exists,
            ..Self::default()
        }
    }

    /// Adds a criterion; arguments bind in the order criteria are added.
    pub fn and(mut self, property: impl Into<String>, operator: Operator) -> Self {
        self.criteria.push(Criterion {
            property: property.into(),
            operator,
        });
        self
    }

    pub fn order_by(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn subject(&self) -> Subject {
        self.subject
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    pub fn row_limit(&self) -> Option<u32> {
        self.limit
    }

    /// Parses a method-style name into a spec.
    ///
    /// Grammar: `<find|read|get|query|count|exists><Subject>By<Predicate>[OrderBy<Orders>]`
    /// where the predicate is `And`-joined `<Property>[Operator]` parts and
    /// orders are `<Property><Asc|Desc>` terms. The subject is free text
    /// except `Top<N>`/`First<N>`, which limit the result.
    ///
    /// Property names are not checked here; see `DerivedQuery::compile`.
    pub fn from_method_name(method: &str) -> Result<Self, RegistrationError> {
        let invalid = |reason: &str| RegistrationError::InvalidMethodName {
            method: method.to_string(),
            reason: reason.to_string(),
        };

        let captures = METHOD_NAME_RE
            .captures(method)
            .ok_or_else(|| invalid("expected `<verb>[Subject]By<Predicate>`"))?;

        let mut spec = match &captures[1] {
            "count" => Self::count(),
            "exists" => Self::exists(),
            _ => Self::find(),
        };

        if let Some(limit) = LIMIT_SUBJECT_RE.captures(&captures[2]) {
            spec.limit = Some(match &limit[1] {
                "" => 1,
                digits => digits
                    .parse::<u32>()
                    .map_err(|_| invalid("result limit is not a valid number"))?,
            });
        }

        let body = &captures[3];
        let (predicate, ordering) = match body.find("OrderBy") {
            Some(index) => (&body[..index], Some(&body[index + "OrderBy".len()..])),
            None => (body, None),
        };

        for part in split_keyword(predicate, "And") {
            let (property, operator) = parse_criterion(part);
            if property.is_empty() {
                return Err(invalid("criterion has no property"));
            }
            spec = spec.and(property, operator);
        }

        if let Some(ordering) = ordering {
            spec.sort = parse_ordering(ordering)
                .ok_or_else(|| invalid("expected `OrderBy<Property><Asc|Desc>...`"))?;
        }

        Ok(spec)
    }
}

fn parse_criterion(part: &str) -> (String, Operator) {
    for (suffix, operator) in Operator::SUFFIXES {
        if let Some(property) = part.strip_suffix(suffix) {
            return (camel_to_snake(property), operator);
        }
    }
    (camel_to_snake(part), Operator::Equals)
}

fn parse_ordering(ordering: &str) -> Option<Sort> {
    let mut sort = Sort::unsorted();
    let mut consumed = 0;
    for term in ORDER_TERM_RE.captures_iter(ordering) {
        let whole = term.get(0)?;
        if whole.start() != consumed {
            return None;
        }
        consumed = whole.end();
        let direction = if &term[2] == "Desc" {
            Direction::Desc
        } else {
            Direction::Asc
        };
        sort = sort.and(direction, camel_to_snake(&term[1]));
    }
    (consumed == ordering.len() && !sort.is_unsorted()).then_some(sort)
}

/// Splits at `keyword` occurrences that sit between two camel-case words.
fn split_keyword<'a>(value: &'a str, keyword: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut search_from = 0;
    while let Some(found) = value[search_from..].find(keyword) {
        let index = search_from + found;
        let next = value[index + keyword.len()..].chars().next();
        if index > start && next.is_some_and(|c| c.is_ascii_uppercase()) {
            parts.push(&value[start..index]);
            start = index + keyword.len();
        }
        search_from = index + keyword.len();
    }
    parts.push(&value[start..]);
    parts
}

fn camel_to_snake(value: &str) -> String {
    let mut snake = String::with_capacity(value.len() + 4);
    for (index, c) in value.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if index > 0 {
                snake.push('_');
            }
            snake.push(c.to_ascii_lowercase());
        } else {
            snake.push(c);
        }
    }
    snake
}
