//! # Bounded-offset pagination
//!
//! The small/medium result-set strategy: repeated offset fetches until the
//! backend reports no further pages. Strictly sequential — each fetch's
//! offset depends on the previous page — and not restartable once begun.

use crate::backend::{RawHit, SearchBackend};
use crate::error::QueryError;
use crate::query::QuerySpec;

/// Default page size for bounded-offset retrieval.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Bounded-offset controller. One instance per configuration; each
/// [`fetch_all`](PagedFetch::fetch_all) call owns its own iteration state.
#[derive(Debug, Clone, Copy)]
pub struct PagedFetch {
    page_size: usize,
}

impl Default for PagedFetch {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PagedFetch {
    /// # Panics
    /// Panics if `page_size` is zero.
    pub fn new(page_size: usize) -> Self {
        assert!(page_size >= 1, "page size must be at least 1");
        Self { page_size }
    }

    /// Fetch every matching hit, exactly once, in backend-native order.
    ///
    /// No consistency guarantee is made across concurrent writes to the
    /// backend during iteration.
    pub async fn fetch_all<B>(&self, backend: &B, spec: &QuerySpec) -> Result<Vec<RawHit>, QueryError>
    where
        B: SearchBackend + ?Sized,
    {
        let mut out = Vec::new();
        let mut from = 0usize;

        loop {
            let page_spec = spec.clone().with_page(from, self.page_size);
            let page = backend.search(&page_spec).await?;
            let fetched = page.hits.len();
            out.extend(page.hits);
            from += fetched;

            // A short page, or reaching the reported total, is the end.
            if fetched < self.page_size || from as u64 >= page.total {
                break;
            }
        }

        tracing::debug!(records = out.len(), "bounded-offset fetch complete");
        Ok(out)
    }
}
