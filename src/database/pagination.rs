use serde::Serialize;

/// Fixed page size for every `/page/:n` route
pub const PAGE_SIZE: i64 = 10;

/// A validated 1-based page number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest(i64);

impl PageRequest {
    /// Accepts decimal integers >= 1 only
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().parse::<i64>() {
            Ok(n) if n >= 1 => Some(Self(n)),
            _ => None,
        }
    }

    pub fn number(&self) -> i64 {
        self.0
    }

    pub fn offset(&self) -> i64 {
        (self.0 - 1) * PAGE_SIZE
    }

    /// True when the page lies past the last row (every page of an empty table)
    pub fn is_beyond(&self, total: i64) -> bool {
        self.0 > total_pages(total)
    }
}

pub fn total_pages(total: i64) -> i64 {
    if total <= 0 {
        0
    } else {
        (total + PAGE_SIZE - 1) / PAGE_SIZE
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: i64) -> Self {
        Self {
            items,
            page: request.number(),
            page_size: PAGE_SIZE,
            total,
            total_pages: total_pages(total),
        }
    }
}
