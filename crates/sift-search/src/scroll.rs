//! # Cursor/scroll pagination
//!
//! The large result-set strategy: a backend-issued cursor advanced batch
//! by batch within a keep-alive window. The first empty batch — not an
//! absent cursor token — is the authoritative end-of-data condition.
//!
//! If the keep-alive lapses between steps the backend invalidates the
//! cursor; that surfaces as [`QueryError::CursorExpired`] and is never
//! retried here. Sizing the keep-alive is the caller's responsibility.

use std::time::Duration;

use sift_core::{hydrate, HydratedBatch, HydrationPolicy};

use crate::backend::SearchBackend;
use crate::error::QueryError;
use crate::query::QuerySpec;

/// Default batch size for scroll retrieval.
pub const DEFAULT_SCROLL_PAGE_SIZE: usize = 100;

/// Default cursor keep-alive window.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Cursor/scroll controller. Each [`fetch_all`](ScrollFetch::fetch_all)
/// call owns its own cursor; iteration is not restartable once begun.
#[derive(Debug, Clone, Copy)]
pub struct ScrollFetch {
    page_size: usize,
    keep_alive: Duration,
}

impl Default for ScrollFetch {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_SCROLL_PAGE_SIZE,
            keep_alive: DEFAULT_KEEP_ALIVE,
        }
    }
}

impl ScrollFetch {
    /// # Panics
    /// Panics if `page_size` is zero.
    pub fn new(page_size: usize, keep_alive: Duration) -> Self {
        assert!(page_size >= 1, "scroll page size must be at least 1");
        Self {
            page_size,
            keep_alive,
        }
    }

    /// Scroll through every matching hit, hydrating each batch as it
    /// arrives.
    ///
    /// Under [`HydrationPolicy::AbortOnFirst`] a single malformed record
    /// aborts the whole scroll (the cursor is released best-effort first).
    /// Under [`HydrationPolicy::CollectErrors`] failures accumulate in the
    /// returned batch instead.
    pub async fn fetch_all<B>(
        &self,
        backend: &B,
        spec: &QuerySpec,
        policy: HydrationPolicy,
    ) -> Result<HydratedBatch, QueryError>
    where
        B: SearchBackend + ?Sized,
    {
        let open_spec = spec.clone().with_page(0, self.page_size);
        let mut batch = backend.open_scroll(&open_spec, self.keep_alive).await?;
        let mut out = HydratedBatch::default();

        loop {
            if batch.hits.is_empty() {
                // Exhausted. Release the cursor rather than waiting out
                // its keep-alive.
                if let Some(id) = &batch.scroll_id {
                    backend.clear_scroll(id).await.ok();
                }
                break;
            }

            for raw in &batch.hits {
                match hydrate(&raw.fields, &raw.id) {
                    Ok(record) => out.records.push(record),
                    Err(err) => match policy {
                        HydrationPolicy::AbortOnFirst => {
                            if let Some(id) = &batch.scroll_id {
                                backend.clear_scroll(id).await.ok();
                            }
                            return Err(err.into());
                        }
                        HydrationPolicy::CollectErrors => out.failures.push(err),
                    },
                }
            }

            let Some(id) = batch.scroll_id.take() else {
                break;
            };
            batch = backend.continue_scroll(&id, self.keep_alive).await?;
        }

        tracing::debug!(
            records = out.records.len(),
            failures = out.failures.len(),
            "scroll fetch complete"
        );
        Ok(out)
    }
}
