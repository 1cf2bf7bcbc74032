//! Paginated list envelope shared by every list endpoint.

use serde::{Deserialize, Serialize};

/// Page size the backend uses unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    #[serde(default = "first_page")]
    pub current_page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

fn first_page() -> u32 {
    1
}

/// Number of pages needed to hold `count` items.
pub fn total_pages(count: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    count.div_ceil(u64::from(page_size)) as u32
}

impl<T> Page<T> {
    /// A page past the end: correct totals, no results.
    pub fn empty(count: u64, current_page: u32, page_size: u32) -> Self {
        Self {
            count,
            current_page,
            total_pages: total_pages(count, page_size),
            next: None,
            previous: None,
            results: Vec::new(),
        }
    }

    /// Check the envelope invariants for the given page size.
    pub fn is_well_formed(&self, page_size: u32) -> bool {
        self.total_pages == total_pages(self.count, page_size)
            && self.results.len() <= page_size as usize
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            current_page: self.current_page,
            total_pages: self.total_pages,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

/// Slice an in-memory list into a 1-based page.
/// Page 0 is treated as page 1; pages past the end are empty.
pub fn paginate<T: Clone>(items: &[T], page: u32, page_size: u32) -> Page<T> {
    let page = page.max(1);
    let count = items.len() as u64;
    let pages = total_pages(count, page_size);

    if page_size == 0 || page > pages {
        return Page::empty(count, page, page_size);
    }

    let start = (page as usize - 1) * page_size as usize;
    let end = (start + page_size as usize).min(items.len());

    Page {
        count,
        current_page: page,
        total_pages: pages,
        next: (page < pages).then(|| format!("?page={}", page + 1)),
        previous: (page > 1).then(|| format!("?page={}", page - 1)),
        results: items[start..end].to_vec(),
    }
}
