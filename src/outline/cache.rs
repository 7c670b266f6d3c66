//! Run-scoped memo of resolved outlines.

use crate::document::DocumentId;
use crate::error::ResolveError;
use crate::output::ResolvedOutline;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;
use tracing::debug;

type Slot = Arc<OnceCell<Arc<ResolvedOutline>>>;

/// Resolved outlines keyed by document identity and trust threshold.
///
/// The first caller for a key runs the resolution; concurrent callers for the
/// same key wait for it instead of starting their own. Failed resolutions are
/// not stored, so the next caller tries again.
#[derive(Debug, Default)]
pub struct OutlineCache {
    slots: Mutex<HashMap<(DocumentId, u64), Slot>>,
}

impl OutlineCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached outline for `(id, min_coverage)`, running `init` to
    /// produce it if none is cached yet.
    pub async fn get_or_try_init<F, Fut>(
        &self,
        id: &DocumentId,
        min_coverage: f64,
        init: F,
    ) -> Result<Arc<ResolvedOutline>, ResolveError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ResolvedOutline, ResolveError>>,
    {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                slots
                    .entry((id.clone(), min_coverage.to_bits()))
                    .or_default(),
            )
        };

        if let Some(outline) = slot.get() {
            debug!("Outline cache hit for {}", id);
            return Ok(Arc::clone(outline));
        }

        let outline = slot
            .get_or_try_init(|| async { init().await.map(Arc::new) })
            .await?;
        Ok(Arc::clone(outline))
    }

    /// Number of cached outlines.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{OutlineEntry, OutlineSource};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn outline() -> ResolvedOutline {
        ResolvedOutline {
            source: OutlineSource::Embedded { coverage: 0.9 },
            entries: vec![OutlineEntry::new(1, "Chapter 1", 0)],
        }
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let cache = OutlineCache::new();
        let id = DocumentId::from_bytes(b"doc");
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let got = cache
                .get_or_try_init(&id, 0.3, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(outline())
                })
                .await
                .unwrap();
            assert_eq!(got.entries.len(), 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn threshold_and_identity_are_part_of_the_key() {
        let cache = OutlineCache::new();
        let a = DocumentId::from_bytes(b"a");
        let b = DocumentId::from_bytes(b"b");
        cache.get_or_try_init(&a, 0.3, || async { Ok(outline()) }).await.unwrap();
        cache.get_or_try_init(&a, 0.5, || async { Ok(outline()) }).await.unwrap();
        cache.get_or_try_init(&b, 0.3, || async { Ok(outline()) }).await.unwrap();
        assert_eq!(cache.len(), 3);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = OutlineCache::new();
        let id = DocumentId::from_bytes(b"flaky");
        let err = cache
            .get_or_try_init(&id, 0.3, || async {
                Err(ResolveError::analysis_on_page(0, "model down"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::LayoutAnalysisFailed { .. }));
        assert!(cache.is_empty());

        let ok = cache.get_or_try_init(&id, 0.3, || async { Ok(outline()) }).await;
        assert!(ok.is_ok());
        assert_eq!(cache.len(), 1);
    }
}
