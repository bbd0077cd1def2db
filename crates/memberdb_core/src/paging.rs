//! Page requests, sort orders and page results.
//!
//! # Invariants
//! - `content.len() <= size` for paged results.
//! - `total_pages == ceil(total_elements / size)`; an unpaged result is one
//!   page holding everything.
//! - `is_first == (number == 0)`, `has_next == (number + 1 < total_pages)`.
//! - A page index past the end yields empty content with unchanged totals.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Invalid page request input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingError {
    InvalidPageSize,
}

impl Display for PagingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPageSize => write!(f, "page size must be greater than zero"),
        }
    }
}

impl Error for PagingError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub(crate) fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One ordering term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub property: String,
    pub direction: Direction,
}

/// Ordered list of ordering terms; empty means unsorted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sort {
    orders: Vec<Order>,
}

impl Sort {
    pub fn unsorted() -> Self {
        Self::default()
    }

    pub fn by(direction: Direction, property: impl Into<String>) -> Self {
        Self::unsorted().and(direction, property)
    }

    /// Appends a lower-priority ordering term.
    pub fn and(mut self, direction: Direction, property: impl Into<String>) -> Self {
        self.orders.push(Order {
            property: property.into(),
            direction,
        });
        self
    }

    pub fn is_unsorted(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }
}

/// Zero-based page index, page size and optional sort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    size: u32,
    sort: Sort,
}

impl PageRequest {
    /// # Errors
    /// - `InvalidPageSize` when `size == 0`.
    pub fn of(page: u32, size: u32) -> Result<Self, PagingError> {
        Self::of_sorted(page, size, Sort::unsorted())
    }

    pub fn of_sorted(page: u32, size: u32, sort: Sort) -> Result<Self, PagingError> {
        if size == 0 {
            return Err(PagingError::InvalidPageSize);
        }
        Ok(Self { page, size, sort })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    /// Number of rows skipped before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }

    pub fn next(&self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            ..self.clone()
        }
    }

    pub fn first(&self) -> Self {
        Self {
            page: 0,
            ..self.clone()
        }
    }
}

/// Either a full scan or one bounded page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Pageable {
    #[default]
    Unpaged,
    Paged(PageRequest),
}

impl Pageable {
    pub fn sort(&self) -> Option<&Sort> {
        match self {
            Self::Unpaged => None,
            Self::Paged(request) => Some(request.sort()),
        }
    }
}

impl From<PageRequest> for Pageable {
    fn from(value: PageRequest) -> Self {
        Self::Paged(value)
    }
}

impl From<&PageRequest> for Pageable {
    fn from(value: &PageRequest) -> Self {
        Self::Paged(value.clone())
    }
}

/// One page of query results plus totals of the whole result.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    content: Vec<T>,
    pageable: Pageable,
    total_elements: u64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, pageable: Pageable, total_elements: u64) -> Self {
        Self {
            content,
            pageable,
            total_elements,
        }
    }

    /// Page holding the complete result of an unpaged query.
    pub fn unpaged(content: Vec<T>) -> Self {
        let total_elements = content.len() as u64;
        Self::new(content, Pageable::Unpaged, total_elements)
    }

    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    pub fn pageable(&self) -> &Pageable {
        &self.pageable
    }

    /// Zero-based page index.
    pub fn number(&self) -> u32 {
        match &self.pageable {
            Pageable::Unpaged => 0,
            Pageable::Paged(request) => request.page(),
        }
    }

    /// Requested page size; the content length for unpaged results.
    pub fn size(&self) -> u32 {
        match &self.pageable {
            Pageable::Unpaged => u32::try_from(self.content.len()).unwrap_or(u32::MAX),
            Pageable::Paged(request) => request.size(),
        }
    }

    pub fn number_of_elements(&self) -> usize {
        self.content.len()
    }

    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }

    pub fn total_elements(&self) -> u64 {
        self.total_elements
    }

    pub fn total_pages(&self) -> u64 {
        match &self.pageable {
            Pageable::Unpaged => 1,
            Pageable::Paged(request) => self.total_elements.div_ceil(u64::from(request.size())),
        }
    }

    pub fn is_first(&self) -> bool {
        self.number() == 0
    }

    pub fn is_last(&self) -> bool {
        !self.has_next()
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.number()) + 1 < self.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.number() > 0
    }

    /// Request for the following page, if there is one.
    pub fn next_pageable(&self) -> Option<PageRequest> {
        match &self.pageable {
            Pageable::Paged(request) if self.has_next() => Some(request.next()),
            _ => None,
        }
    }

    /// Transforms the content element-wise, keeping all paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            pageable: self.pageable,
            total_elements: self.total_elements,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Direction, Page, PageRequest, Pageable, PagingError, Sort};

    fn paged(page: u32, size: u32, content_len: usize, total: u64) -> Page<usize> {
        let request = PageRequest::of(page, size).unwrap();
        Page::new((0..content_len).collect(), request.into(), total)
    }

    #[test]
    fn zero_page_size_is_rejected() {
        assert_eq!(PageRequest::of(0, 0), Err(PagingError::InvalidPageSize));
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(paged(0, 3, 3, 5).total_pages(), 2);
        assert_eq!(paged(0, 5, 5, 5).total_pages(), 1);
        assert_eq!(paged(0, 3, 0, 0).total_pages(), 0);
    }

    #[test]
    fn first_and_next_flags_follow_page_index() {
        let first = paged(0, 3, 3, 5);
        assert!(first.is_first());
        assert!(first.has_next());
        assert!(!first.has_previous());

        let last = paged(1, 3, 2, 5);
        assert!(!last.is_first());
        assert!(!last.has_next());
        assert!(last.is_last());
        assert!(last.has_previous());
    }

    #[test]
    fn page_past_the_end_keeps_totals() {
        let beyond = paged(7, 3, 0, 5);
        assert!(!beyond.has_content());
        assert_eq!(beyond.total_elements(), 5);
        assert_eq!(beyond.total_pages(), 2);
        assert!(!beyond.has_next());
    }

    #[test]
    fn map_preserves_metadata() {
        let page = paged(0, 3, 3, 5).map(|value| format!("item-{value}"));
        assert_eq!(page.content(), ["item-0", "item-1", "item-2"]);
        assert_eq!(page.total_elements(), 5);
        assert_eq!(page.total_pages(), 2);
        assert_eq!(page.number(), 0);
        assert!(page.has_next());
    }

    #[test]
    fn unpaged_is_single_page() {
        let page = Page::unpaged(vec![1, 2, 3]);
        assert_eq!(page.pageable(), &Pageable::Unpaged);
        assert_eq!(page.total_pages(), 1);
        assert_eq!(page.size(), 3);
        assert!(page.is_first());
        assert!(!page.has_next());
    }

    #[test]
    fn next_pageable_advances_and_keeps_sort() {
        let request =
            PageRequest::of_sorted(0, 2, Sort::by(Direction::Desc, "username")).unwrap();
        let page = Page::new(vec![1, 2], request.into(), 3);
        let next = page.next_pageable().unwrap();
        assert_eq!(next.page(), 1);
        assert_eq!(next.sort(), &Sort::by(Direction::Desc, "username"));
        assert_eq!(next.offset(), 2);
    }
}
