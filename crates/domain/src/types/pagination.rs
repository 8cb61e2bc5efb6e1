//! Page cursor for incremental list loading

use serde::{Deserialize, Serialize};

/// `pagination` block of a list response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub page: u32,
    pub limit: u32,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub has_next: Option<bool>,
    #[serde(default)]
    pub has_prev: Option<bool>,
}

/// `{data: T[], pagination: {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub pagination: Option<PaginationMeta>,
}

/// Position of a paginated listing.
///
/// `page` is the last successfully loaded page, `0` before the first load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageCursor {
    pub page: u32,
    pub limit: u32,
    pub total: Option<u64>,
    pub has_more: bool,
}

impl PageCursor {
    pub fn new(limit: u32) -> Self {
        Self { page: 0, limit: limit.max(1), total: None, has_more: true }
    }

    /// Page number the next load should request.
    pub fn next_page(&self) -> u32 {
        self.page + 1
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.limit);
    }

    /// Advance after page `page` returned `returned` items.
    ///
    /// `hasNext` from the server wins, then `total`, and only without either
    /// does a full page imply more data. The full-page heuristic misreports
    /// `has_more` when the final page is exactly full; it costs one empty
    /// fetch.
    pub fn advance(&mut self, page: u32, returned: usize, meta: Option<&PaginationMeta>) {
        self.page = page;
        self.total = meta.and_then(|m| m.total).or(self.total);

        let server_has_next = meta.and_then(|m| m.has_next);
        let server_total = meta.and_then(|m| m.total);

        self.has_more = match (server_has_next, server_total) {
            (Some(has_next), _) => has_next,
            (None, Some(total)) => u64::from(page) * u64::from(self.limit) < total,
            (None, None) => returned == self.limit as usize,
        };
    }
}
