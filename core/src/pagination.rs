//! Keyset pagination protocol.
//!
//! Every listing follows the same steps:
//!
//! 1. Clamp the requested limit with [`PageLimits::clamp`].
//! 2. Ask the store for `limit + 1` rows strictly past the cursor, in the
//!    listing's single total order ([`PageLimits::fetch_size`]).
//! 3. Hand the rows to [`Page::from_overfetch`], which trims the extra row and
//!    derives the next cursor from the last row that is kept.
//!
//! The extra row only proves that another page exists; it is never returned.
//! Offsets are never used, so rows inserted ahead of the cursor do not shift
//! later pages.

use crate::cursor::Cursor;
use serde::{Deserialize, Serialize};

/// Limit used when a caller passes zero or a negative value.
pub const DEFAULT_PAGE_LIMIT: usize = 10;

/// Largest page a caller may request.
pub const MAX_PAGE_LIMIT: usize = 50;

/// Default and maximum page sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    default_limit: usize,
    max_limit: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT)
    }
}

impl PageLimits {
    /// Create limits; `max_limit` is raised to `default_limit` if smaller.
    #[must_use]
    pub const fn new(default_limit: usize, max_limit: usize) -> Self {
        let default_limit = if default_limit == 0 { 1 } else { default_limit };
        let max_limit = if max_limit < default_limit {
            default_limit
        } else {
            max_limit
        };
        Self {
            default_limit,
            max_limit,
        }
    }

    /// Set the default limit.
    #[must_use]
    pub const fn with_default_limit(self, default_limit: usize) -> Self {
        Self::new(default_limit, self.max_limit)
    }

    /// Set the maximum limit.
    #[must_use]
    pub const fn with_max_limit(self, max_limit: usize) -> Self {
        Self::new(self.default_limit, max_limit)
    }

    /// Normalize a caller-supplied limit.
    ///
    /// # Examples
    ///
    /// ```
    /// use recipebox_core::pagination::PageLimits;
    ///
    /// let limits = PageLimits::default();
    /// assert_eq!(limits.clamp(0), 10);
    /// assert_eq!(limits.clamp(-3), 10);
    /// assert_eq!(limits.clamp(25), 25);
    /// assert_eq!(limits.clamp(500), 50);
    /// ```
    #[must_use]
    pub fn clamp(&self, requested: i64) -> usize {
        if requested <= 0 {
            return self.default_limit;
        }
        usize::try_from(requested).map_or(self.max_limit, |n| n.min(self.max_limit))
    }

    /// Number of rows to ask the store for: one more than the page size.
    #[must_use]
    pub const fn fetch_size(limit: usize) -> usize {
        limit + 1
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items in listing order
    pub items: Vec<T>,
    /// Token for the next page; absent on the last page
    pub next_cursor: Option<Cursor>,
}

impl<T> Page<T> {
    /// Empty page with no next cursor.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
        }
    }

    /// Build a page from rows fetched with [`PageLimits::fetch_size`].
    ///
    /// When more than `limit` rows came back, the rows are trimmed to `limit`
    /// and `cursor_of` is applied to the last kept row. Otherwise this is the
    /// last page.
    pub fn from_overfetch<F>(mut rows: Vec<T>, limit: usize, cursor_of: F) -> Self
    where
        F: FnOnce(&T) -> Cursor,
    {
        if rows.len() <= limit {
            return Self {
                items: rows,
                next_cursor: None,
            };
        }
        rows.truncate(limit);
        let next_cursor = rows.last().map(cursor_of);
        Self {
            items: rows,
            next_cursor,
        }
    }

    /// Transform the items while keeping the cursor.
    ///
    /// Secondary lookups use this so the page boundary stays tied to the
    /// primary rows even when some of them are dropped.
    #[must_use]
    pub fn map_items<U, F>(self, f: F) -> Page<U>
    where
        F: FnOnce(Vec<T>) -> Vec<U>,
    {
        Page {
            items: f(self.items),
            next_cursor: self.next_cursor,
        }
    }

    /// Number of items on this page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the page has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether another page may follow.
    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }
}
