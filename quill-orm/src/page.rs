//! Pagination over counted result sets

use serde::{Deserialize, Serialize};

use crate::repo::Limit;

/// Default items per page
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// One page of a result set of `item_count` rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub item_count: u64,
    /// 1-indexed
    pub page_index: u64,
    pub page_size: u64,
    pub page_count: u64,
    pub offset: u64,
    pub limit: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl Page {
    /// Compute the window for `page_index`.
    ///
    /// - Page size is clamped to a minimum of 1
    /// - Page index is clamped into `1..=page_count`
    /// - An empty result set yields a zero-length window at offset 0
    pub fn new(item_count: u64, page_index: u64, page_size: u64) -> Self {
        let page_size = page_size.max(1);
        let page_count = item_count.div_ceil(page_size);

        if item_count == 0 {
            return Self {
                item_count,
                page_index: 1,
                page_size,
                page_count: 0,
                offset: 0,
                limit: 0,
                has_next: false,
                has_previous: false,
            };
        }

        let page_index = page_index.clamp(1, page_count);
        Self {
            item_count,
            page_index,
            page_size,
            page_count,
            offset: page_size * (page_index - 1),
            limit: page_size,
            has_next: page_index < page_count,
            has_previous: page_index > 1,
        }
    }

    /// `limit offset, count` clause for `Repo::find_all`.
    pub fn limit_clause(&self) -> Limit {
        Limit::Range(self.offset, self.limit)
    }

    pub fn is_empty(&self) -> bool {
        self.item_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_calculation() {
        let p = Page::new(91, 1, 10);
        assert_eq!(p.offset, 0);
        assert_eq!(p.page_count, 10);

        let p = Page::new(91, 2, 10);
        assert_eq!(p.offset, 10);

        let p = Page::new(91, 10, 10);
        assert_eq!(p.offset, 90);
        assert!(!p.has_next);
        assert!(p.has_previous);
    }

    #[test]
    fn clamps_page_index() {
        let p = Page::new(25, 0, 10);
        assert_eq!(p.page_index, 1);

        let p = Page::new(25, 99, 10);
        assert_eq!(p.page_index, 3);
        assert_eq!(p.offset, 20);
    }

    #[test]
    fn clamps_page_size() {
        let p = Page::new(3, 1, 0);
        assert_eq!(p.page_size, 1);
        assert_eq!(p.page_count, 3);
    }

    #[test]
    fn empty_result_set() {
        let p = Page::new(0, 1, 10);
        assert!(p.is_empty());
        assert_eq!(p.limit, 0);
        assert!(!p.has_next);
        assert!(!p.has_previous);
        assert_eq!(p.limit_clause(), Limit::Range(0, 0));
    }

    #[test]
    fn has_next_prev() {
        let p = Page::new(30, 2, 10);
        assert!(p.has_next);
        assert!(p.has_previous);
    }
}
