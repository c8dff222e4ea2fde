//! List windowing.
//!
//! Two strategies are supported, selected once through configuration:
//! page-number (`?page=2&page_size=20`) and limit/offset
//! (`?limit=20&offset=40`). Both produce the same envelope with total
//! count and relative `next`/`previous` links that keep any other query
//! parameters (filters) intact.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, Uri},
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaginationMode {
    PageNumber,
    LimitOffset,
}

/// Path and decoded query pairs of a list request
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    path: String,
    pairs: Vec<(String, String)>,
}

impl ListQuery {
    pub fn from_uri(uri: &Uri) -> AppResult<Self> {
        let pairs = match uri.query() {
            Some(query) => serde_urlencoded::from_str::<Vec<(String, String)>>(query)
                .map_err(|e| AppError::invalid("query", format!("Malformed query string: {}", e)))?,
            None => Vec::new(),
        };

        Ok(Self {
            path: uri.path().to_string(),
            pairs,
        })
    }

    /// Last value supplied for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Link to the same path with `updates` applied; `None` values remove the key
    fn link_with(&self, updates: &[(&str, Option<u64>)]) -> String {
        let mut pairs: Vec<(String, String)> = self
            .pairs
            .iter()
            .filter(|(k, _)| !updates.iter().any(|(key, _)| k == key))
            .cloned()
            .collect();

        for (key, value) in updates {
            if let Some(value) = value {
                pairs.push((key.to_string(), value.to_string()));
            }
        }

        match serde_urlencoded::to_string(&pairs) {
            Ok(query) if !query.is_empty() => format!("{}?{}", self.path, query),
            _ => self.path.clone(),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ListQuery
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        ListQuery::from_uri(&parts.uri)
    }
}

/// Offset/limit slice requested from a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: i64,
    pub limit: i64,
    /// 1-based page number when page-number pagination is active
    pub page: Option<u64>,
}

/// A window of results plus the total number of matching rows
#[derive(Debug, Clone, PartialEq)]
pub struct Slice<T> {
    pub items: Vec<T>,
    pub total: i64,
}

impl<T> Slice<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Slice<U> {
        Slice {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
        }
    }
}

/// Envelope returned by every list endpoint
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            count: 0,
            next: None,
            previous: None,
            results: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    mode: PaginationMode,
    page_size: u32,
    max_page_size: u32,
}

impl Paginator {
    pub fn new(mode: PaginationMode, page_size: u32, max_page_size: u32) -> Self {
        let max_page_size = max_page_size.max(1);
        Self {
            mode,
            page_size: page_size.clamp(1, max_page_size),
            max_page_size,
        }
    }

    pub fn mode(&self) -> PaginationMode {
        self.mode
    }

    /// Resolves the window requested by the query parameters
    pub fn window(&self, query: &ListQuery) -> AppResult<Window> {
        match self.mode {
            PaginationMode::PageNumber => {
                let page = match query.get("page") {
                    None => 1,
                    Some(raw) => match raw.parse::<u64>() {
                        Ok(page) if page >= 1 => page,
                        _ => return Err(AppError::InvalidPage),
                    },
                };
                let size = self.size_param(query.get("page_size"));
                let offset = (page - 1)
                    .checked_mul(size)
                    .and_then(|offset| i64::try_from(offset).ok())
                    .ok_or(AppError::InvalidPage)?;
                Ok(Window {
                    offset,
                    limit: size as i64,
                    page: Some(page),
                })
            }
            PaginationMode::LimitOffset => {
                let limit = self.size_param(query.get("limit"));
                // unparseable or out-of-range offsets start from the beginning
                let offset = query
                    .get("offset")
                    .and_then(|raw| raw.parse::<i64>().ok())
                    .filter(|offset| *offset >= 0)
                    .unwrap_or(0);
                Ok(Window {
                    offset,
                    limit: limit as i64,
                    page: None,
                })
            }
        }
    }

    fn size_param(&self, raw: Option<&str>) -> u64 {
        raw.and_then(|raw| raw.parse::<u64>().ok())
            .filter(|size| *size > 0)
            .map(|size| size.min(u64::from(self.max_page_size)))
            .unwrap_or(u64::from(self.page_size))
    }

    /// Builds the response envelope for a fetched slice
    pub fn page<T>(&self, query: &ListQuery, window: Window, slice: Slice<T>) -> AppResult<Page<T>> {
        let Slice { items, total } = slice;
        let has_next = window.offset.saturating_add(window.limit) < total;

        let (next, previous) = match self.mode {
            PaginationMode::PageNumber => {
                let page = window.page.unwrap_or(1);
                if page > 1 && window.offset >= total {
                    return Err(AppError::InvalidPage);
                }
                let next = has_next.then(|| query.link_with(&[("page", Some(page + 1))]));
                let previous = match page {
                    1 => None,
                    2 => Some(query.link_with(&[("page", None)])),
                    _ => Some(query.link_with(&[("page", Some(page - 1))])),
                };
                (next, previous)
            }
            PaginationMode::LimitOffset => {
                let limit = window.limit as u64;
                let offset = window.offset as u64;
                let next = has_next.then(|| {
                    query.link_with(&[("limit", Some(limit)), ("offset", Some(offset.saturating_add(limit)))])
                });
                let previous = if offset == 0 {
                    None
                } else if offset <= limit {
                    Some(query.link_with(&[("limit", Some(limit)), ("offset", None)]))
                } else {
                    Some(query.link_with(&[("limit", Some(limit)), ("offset", Some(offset - limit))]))
                };
                (next, previous)
            }
        };

        Ok(Page {
            count: total,
            next,
            previous,
            results: items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(uri: &str) -> ListQuery {
        ListQuery::from_uri(&uri.parse::<Uri>().unwrap()).unwrap()
    }

    fn slice(total: i64, len: usize) -> Slice<u32> {
        Slice {
            items: vec![0; len],
            total,
        }
    }

    #[test]
    fn test_page_number_defaults_to_first_page() {
        let paginator = Paginator::new(PaginationMode::PageNumber, 10, 100);
        let window = paginator.window(&query("/")).unwrap();
        assert_eq!(window, Window { offset: 0, limit: 10, page: Some(1) });
    }

    #[test]
    fn test_page_number_rejects_garbage_and_zero() {
        let paginator = Paginator::new(PaginationMode::PageNumber, 10, 100);
        assert!(matches!(paginator.window(&query("/?page=abc")), Err(AppError::InvalidPage)));
        assert!(matches!(paginator.window(&query("/?page=0")), Err(AppError::InvalidPage)));
    }

    #[test]
    fn test_huge_page_is_invalid() {
        let paginator = Paginator::new(PaginationMode::PageNumber, 10, 100);
        assert!(matches!(
            paginator.window(&query("/?page=18446744073709551615")),
            Err(AppError::InvalidPage)
        ));
        assert!(matches!(
            paginator.window(&query("/?page=1000000000000000000")),
            Err(AppError::InvalidPage)
        ));
        assert!(matches!(
            paginator.window(&query("/?page=99999999999999999999")),
            Err(AppError::InvalidPage)
        ));
    }

    #[test]
    fn test_out_of_range_offset_starts_from_beginning() {
        let paginator = Paginator::new(PaginationMode::LimitOffset, 10, 100);
        for raw in ["18446744073709551615", "-5", "abc"] {
            let window = paginator.window(&query(&format!("/?offset={}", raw))).unwrap();
            assert_eq!(window, Window { offset: 0, limit: 10, page: None });
        }
    }

    #[test]
    fn test_largest_offset_has_no_next() {
        let paginator = Paginator::new(PaginationMode::LimitOffset, 10, 100);
        let q = query("/?offset=9223372036854775807");
        let window = paginator.window(&q).unwrap();
        assert_eq!(window.offset, i64::MAX);

        let page = paginator.page(&q, window, slice(3, 0)).unwrap();
        assert!(page.next.is_none());
        assert_eq!(page.count, 3);
    }

    #[test]
    fn test_page_size_is_capped() {
        let paginator = Paginator::new(PaginationMode::PageNumber, 10, 50);
        let window = paginator.window(&query("/?page=2&page_size=500")).unwrap();
        assert_eq!(window.limit, 50);
        assert_eq!(window.offset, 50);
    }

    #[test]
    fn test_page_number_links_keep_filters() {
        let paginator = Paginator::new(PaginationMode::PageNumber, 2, 100);
        let q = query("/1/reviews/?active=true&page=2");
        let window = paginator.window(&q).unwrap();
        let page = paginator.page(&q, window, slice(5, 2)).unwrap();
        assert_eq!(page.count, 5);
        assert_eq!(page.next.as_deref(), Some("/1/reviews/?active=true&page=3"));
        assert_eq!(page.previous.as_deref(), Some("/1/reviews/?active=true"));
    }

    #[test]
    fn test_page_past_end_is_invalid_but_empty_first_page_is_not() {
        let paginator = Paginator::new(PaginationMode::PageNumber, 10, 100);
        let q = query("/?page=3");
        let window = paginator.window(&q).unwrap();
        assert!(matches!(paginator.page(&q, window, slice(12, 0)), Err(AppError::InvalidPage)));

        let q = query("/");
        let window = paginator.window(&q).unwrap();
        let page = paginator.page(&q, window, slice(0, 0)).unwrap();
        assert_eq!(page.count, 0);
        assert!(page.next.is_none());
        assert!(page.previous.is_none());
    }

    #[test]
    fn test_limit_offset_links() {
        let paginator = Paginator::new(PaginationMode::LimitOffset, 10, 100);
        let q = query("/stream/?limit=5&offset=5");
        let window = paginator.window(&q).unwrap();
        assert_eq!(window, Window { offset: 5, limit: 5, page: None });

        let page = paginator.page(&q, window, slice(20, 5)).unwrap();
        assert_eq!(page.next.as_deref(), Some("/stream/?limit=5&offset=10"));
        assert_eq!(page.previous.as_deref(), Some("/stream/?limit=5"));
    }

    #[test]
    fn test_limit_offset_last_window_has_no_next() {
        let paginator = Paginator::new(PaginationMode::LimitOffset, 10, 100);
        let q = query("/?offset=15");
        let window = paginator.window(&q).unwrap();
        let page = paginator.page(&q, window, slice(20, 5)).unwrap();
        assert!(page.next.is_none());
        assert_eq!(page.previous.as_deref(), Some("/?limit=10&offset=5"));
    }
}
