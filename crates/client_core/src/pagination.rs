//! Page arithmetic for offset-paginated word lists.

use crate::store::RowRange;

pub const PAGE_SIZE: u32 = 20;
/// Number of page buttons shown at once.
pub const MAX_VISIBLE_PAGES: u32 = 10;

/// `ceil(count / page_size)`; zero for an empty list.
pub fn total_pages(count: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    let pages = count.div_ceil(u64::from(page_size));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Clamps a requested page into `[1, max(total_pages, 1)]`.
pub fn clamp_page(requested: u32, total_pages: u32) -> u32 {
    requested.clamp(1, total_pages.max(1))
}

pub fn row_range(page: u32, page_size: u32) -> RowRange {
    let page = u64::from(page.max(1));
    RowRange {
        offset: (page - 1) * u64::from(page_size),
        limit: u64::from(page_size),
    }
}

/// The run of page buttons around the current page, plus the jump targets
/// for the "..." buttons on either side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub current: u32,
    pub total_pages: u32,
    pub start: u32,
    pub end: u32,
    pub jump_back: Option<u32>,
    pub jump_forward: Option<u32>,
}

impl PageWindow {
    pub fn new(current: u32, total_pages: u32, max_visible: u32) -> Self {
        let max_visible = max_visible.max(1);
        let start = current.saturating_sub(max_visible / 2).max(1);
        let end = total_pages.min(start + max_visible - 1);
        let start = end.saturating_sub(max_visible - 1).max(1);

        let jump_back = (current > max_visible).then(|| current.saturating_sub(max_visible).max(1));
        let jump_forward = (current < total_pages.saturating_sub(max_visible))
            .then(|| total_pages.min(current + max_visible));

        Self {
            current,
            total_pages,
            start,
            end,
            jump_back,
            jump_forward,
        }
    }

    pub fn pages(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }

    pub fn has_prev(&self) -> bool {
        self.current > 1
    }

    pub fn has_next(&self) -> bool {
        self.current < self.total_pages
    }

    /// Pagination controls are only shown for more than one page.
    pub fn is_visible(&self) -> bool {
        self.total_pages > 1
    }
}
