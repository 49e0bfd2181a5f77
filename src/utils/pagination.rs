//! Paging and ordering helpers shared by the catalog listings.
//!
//! Sorting is restricted to a closed set of keys per entity: each key maps to a
//! fixed column name, so no caller-supplied text ever reaches an `ORDER BY`.

use rocket_okapi::JsonSchema;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// A column an entity listing may be ordered by.
pub trait SortKey: Copy {
    fn column(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema, EnumString, Display)]
#[strum(ascii_case_insensitive)]
pub enum SortOrder {
    #[default]
    #[strum(serialize = "asc", serialize = "ascending")]
    Ascending,
    #[strum(serialize = "desc", serialize = "descending")]
    Descending,
}

impl SortOrder {
    pub fn sql(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Build a request from optional query values, clamping out-of-range input.
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
        PageRequest {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.page_size as i64
    }

    pub fn limit(&self) -> i64 {
        self.page_size as i64
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct PagedList<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total_count: i64,
    pub has_previous_page: bool,
    pub has_next_page: bool,
}

impl<T> PagedList<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total_count: i64) -> Self {
        PagedList {
            items,
            page: request.page,
            page_size: request.page_size,
            total_count,
            has_previous_page: request.page > 1,
            has_next_page: (request.page as i64) * (request.page_size as i64) < total_count,
        }
    }
}
