//! Pagination state for cached collections.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Page size used until the caller picks another one.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Pagination metadata as served by list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub current_page: u32,
    pub last_page: u32,
    pub per_page: u32,
    pub total: u64,
}

/// Pagination cursor owned by a store.
///
/// Invariants: `page >= 1`, `page_size > 0`, `total_pages >= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
    page_size: u32,
    total_pages: u32,
    total_count: u64,
}

impl Pagination {
    pub fn new(page_size: u32) -> DomainResult<Self> {
        if page_size == 0 {
            return Err(DomainError::validation("page size must be positive"));
        }
        Ok(Self {
            page: 1,
            page_size,
            total_pages: 1,
            total_count: 0,
        })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Select the page requested by the next fetch. Page numbers start at 1.
    pub fn set_page(&mut self, page: u32) -> DomainResult<()> {
        if page == 0 {
            return Err(DomainError::validation("page numbers start at 1"));
        }
        self.page = page;
        Ok(())
    }

    /// Change the page size; always rewinds to the first page.
    pub fn set_page_size(&mut self, page_size: u32) -> DomainResult<()> {
        if page_size == 0 {
            return Err(DomainError::validation("page size must be positive"));
        }
        self.page_size = page_size;
        self.page = 1;
        Ok(())
    }

    pub fn rewind(&mut self) {
        self.page = 1;
    }

    /// Replace the cursor with what the server reported for a loaded page.
    ///
    /// Zero values from a sloppy backend are clamped so the invariants hold.
    pub fn apply(&mut self, meta: PageMeta) {
        self.total_pages = meta.last_page.max(1);
        self.page = meta.current_page.clamp(1, self.total_pages);
        if meta.per_page > 0 {
            self.page_size = meta.per_page;
        }
        self.total_count = meta.total;
    }

    /// One entry disappeared server-side (successful delete).
    pub fn record_removal(&mut self) {
        self.total_count = self.total_count.saturating_sub(1);
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            total_pages: 1,
            total_count: 0,
        }
    }
}
