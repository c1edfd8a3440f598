//! Page clamping.
//!
//! A requested page never fails: pages below 1 become page 1, pages past
//! the end become the last page, and an empty result set still yields the
//! first window. Stale links and shrinking result sets therefore always
//! land on a valid page.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Half-open, zero-based range of result positions `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    pub start: u64,
    pub end: u64,
}

impl Window {
    pub fn new(start: u64, end: u64) -> Self {
        Window { start, end }
    }

    pub fn size(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }
}

/// Number of pages needed for `total_hits`; an empty result set still has
/// one page. A zero `page_size` is treated as 1.
pub fn max_page(total_hits: u64, page_size: u64) -> u64 {
    let page_size = page_size.max(1);
    if total_hits == 0 {
        1
    } else {
        total_hits.div_ceil(page_size)
    }
}

/// Clamped result window for `requested_page` (1-based).
///
/// `end` is not clamped to `total_hits`; the store returns a short page
/// when the window overruns the tail.
pub fn window(total_hits: u64, requested_page: i64, page_size: u64) -> Window {
    Page::clamp(total_hits, requested_page, page_size).window
}

/// Pager metadata for one clamped page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Effective 1-based page number after clamping.
    pub number: u64,
    pub max_page: u64,
    pub size: u64,
    pub total_hits: u64,
    pub window: Window,
}

impl Page {
    pub fn clamp(total_hits: u64, requested_page: i64, page_size: u64) -> Self {
        let size = page_size.max(1);
        let max_page = max_page(total_hits, size);
        let requested = u64::try_from(requested_page).unwrap_or(0);
        let number = requested.clamp(1, max_page);
        let start = (number - 1) * size;
        Page {
            number,
            max_page,
            size,
            total_hits,
            window: Window::new(start, start + size),
        }
    }

    pub fn has_next(&self) -> bool {
        self.number < self.max_page
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_exceeds_max_uses_last_page() {
        assert_eq!(window(15, 3, 10), Window::new(10, 20));
    }

    #[test]
    fn page_exceeds_max_with_small_pages() {
        assert_eq!(window(25, 10, 5), Window::new(20, 25));
    }

    #[test]
    fn valid_page_unchanged() {
        assert_eq!(window(30, 2, 10), Window::new(10, 20));
    }

    #[test]
    fn empty_results_use_first_page() {
        assert_eq!(window(0, 5, 10), Window::new(0, 10));
        assert_eq!(window(0, 1, 10), Window::new(0, 10));
    }

    #[test]
    fn exact_boundary() {
        assert_eq!(max_page(20, 10), 2);
        assert_eq!(window(20, 2, 10), Window::new(10, 20));
        assert_eq!(window(20, 3, 10), Window::new(10, 20));
    }

    #[test]
    fn single_hit_high_page() {
        assert_eq!(window(1, 100, 10), Window::new(0, 10));
    }

    #[test]
    fn below_one_is_first_page() {
        assert_eq!(window(50, 0, 10), Window::new(0, 10));
        assert_eq!(window(50, -3, 10), Window::new(0, 10));
    }

    #[test]
    fn page_metadata() {
        let page = Page::clamp(45, 3, 10);
        assert_eq!(page.number, 3);
        assert_eq!(page.max_page, 5);
        assert!(page.has_next());
        assert!(page.has_previous());

        let last = Page::clamp(45, 9, 10);
        assert_eq!(last.number, 5);
        assert!(!last.has_next());
        assert_eq!(last.window, Window::new(40, 50));
    }
}
