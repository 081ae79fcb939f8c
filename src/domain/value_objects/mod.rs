//! Value Objects for the catalog

use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_SLUG_LEN: usize = 120;
const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

/// URL-safe product handle, unique across live and trashed products.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    pub fn parse(value: impl AsRef<str>) -> Result<Self, SlugError> {
        let value = value.as_ref().trim().to_lowercase();
        if value.is_empty() { return Err(SlugError::Empty); }
        if value.len() > MAX_SLUG_LEN { return Err(SlugError::TooLong); }
        if !value.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
            return Err(SlugError::InvalidCharacter);
        }
        if value.starts_with('-') || value.ends_with('-') || value.contains("--") {
            return Err(SlugError::MisplacedDash);
        }
        Ok(Self(value))
    }

    /// Derives a slug from a display name: "Blue Widget (XL)" -> "blue-widget-xl".
    pub fn from_name(name: &str) -> Result<Self, SlugError> {
        let mut out = String::with_capacity(name.len());
        for c in name.trim().chars() {
            if c.is_ascii_alphanumeric() {
                out.push(c.to_ascii_lowercase());
            } else if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
        }
        out.truncate(MAX_SLUG_LEN);
        Self::parse(out.trim_end_matches('-'))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlugError {
    #[error("Slug must not be empty")]
    Empty,
    #[error("Slug must be at most 120 characters")]
    TooLong,
    #[error("Slug may only contain lowercase letters, digits and dashes")]
    InvalidCharacter,
    #[error("Slug must not start or end with a dash or contain consecutive dashes")]
    MisplacedDash,
}

impl From<SlugError> for crate::CatalogError {
    fn from(e: SlugError) -> Self { Self::BadRequest(e.to_string()) }
}

/// SKU (Stock Keeping Unit) value object
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    pub fn new(value: impl Into<String>) -> Result<Self, SkuError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(SkuError::Empty); }
        if value.len() > 50 { return Err(SkuError::TooLong); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkuError {
    #[error("SKU must not be empty")]
    Empty,
    #[error("SKU must be at most 50 characters")]
    TooLong,
}

impl From<SkuError> for crate::CatalogError {
    fn from(e: SkuError) -> Self { Self::BadRequest(e.to_string()) }
}

/// 1-based page window. Out-of-range input is clamped rather than rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }
    pub fn first(limit: u32) -> Self { Self::new(Some(1), Some(limit)) }
    pub fn page(&self) -> u32 { self.page }
    pub fn limit(&self) -> u32 { self.limit }
    pub fn skip(&self) -> u64 { u64::from(self.page - 1) * u64::from(self.limit) }
}

impl Default for PageRequest { fn default() -> Self { Self::new(None, None) } }

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub pages: u64,
}

/// Listing envelope: `{ data, pagination: { total, page, limit, pages } }`.
#[derive(Clone, Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: u64, req: PageRequest) -> Self {
        let limit = u64::from(req.limit());
        Self {
            data,
            pagination: Pagination { total, page: req.page(), limit: req.limit(), pages: total.div_ceil(limit) },
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page { data: self.data.into_iter().map(f).collect(), pagination: self.pagination }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sku() { let sku = Sku::new("prod-001").unwrap(); assert_eq!(sku.as_str(), "PROD-001"); }

    #[test]
    fn test_slug_normalises_case() {
        assert_eq!(Slug::parse("  Widget-1 ").unwrap().as_str(), "widget-1");
    }

    #[test]
    fn test_slug_rejects_unsafe_input() {
        assert_eq!(Slug::parse("").unwrap_err(), SlugError::Empty);
        assert_eq!(Slug::parse("hello world").unwrap_err(), SlugError::InvalidCharacter);
        assert_eq!(Slug::parse("-widget").unwrap_err(), SlugError::MisplacedDash);
        assert_eq!(Slug::parse("a--b").unwrap_err(), SlugError::MisplacedDash);
    }

    #[test]
    fn test_slug_from_name() {
        assert_eq!(Slug::from_name("Blue Widget (XL)").unwrap().as_str(), "blue-widget-xl");
        assert!(Slug::from_name("!!!").is_err());
    }

    #[test]
    fn test_slug_from_long_name_drops_trailing_dash() {
        let slug = Slug::from_name(&format!("{} tail", "a".repeat(MAX_SLUG_LEN - 1))).unwrap();
        assert_eq!(slug.as_str(), "a".repeat(MAX_SLUG_LEN - 1));
        let slug = Slug::from_name(&"word ".repeat(60)).unwrap();
        assert!(slug.as_str().len() <= MAX_SLUG_LEN);
        assert!(!slug.as_str().ends_with('-'));
    }

    #[test]
    fn test_page_request_clamps() {
        let req = PageRequest::new(Some(0), Some(0));
        assert_eq!((req.page(), req.limit()), (1, 1));
        let req = PageRequest::new(Some(3), Some(500));
        assert_eq!((req.limit(), req.skip()), (100, 200));
        assert_eq!(PageRequest::default().limit(), 10);
    }

    #[test]
    fn test_pages_is_ceiling() {
        let page = Page::new(vec![1, 2, 3], 23, PageRequest::new(Some(1), Some(10)));
        assert_eq!(page.pagination.pages, 3);
        let empty: Page<u8> = Page::new(vec![], 0, PageRequest::default());
        assert_eq!(empty.pagination.pages, 0);
    }
}
