//! Outline sources: embedded bookmarks, or headings inferred by layout
//! analysis when the bookmarks are missing or do not reach far enough.
//!
//! ```text
//! native bookmarks ──▶ embedded_entries ──▶ decide(coverage ≥ min_coverage)
//!                                             │ trust        │ infer
//!                                             ▼              ▼
//!                                          entries   LayoutAnalyzer ──▶ filter_noise
//!                                                                        ──▶ numbering | font size
//! ```

pub mod cache;
pub mod embedded;
pub mod infer;
pub mod layout;

pub use cache::OutlineCache;
pub use embedded::{coverage, decide, embedded_entries, OutlineDecision};
pub use infer::{
    assign_by_font_size, assign_by_numbering, choose_strategy, filter_noise, infer_outline,
    numbering_depth,
};
pub use layout::{HeadingCandidate, LayoutAnalyzer};

use crate::document::{blocking, DocumentSource};
use crate::error::ResolveError;
use crate::output::{OutlineSource, ResolvedOutline};
use std::sync::Arc;
use tracing::info;

/// Resolve a document's outline without caching.
///
/// The analyser only runs when the bookmarks are not trusted. Errors opening
/// the document or running the analyser propagate; a document with no
/// headings at all resolves to [`OutlineSource::None`].
pub async fn resolve_outline(
    doc: Arc<dyn DocumentSource>,
    analyzer: &dyn LayoutAnalyzer,
    min_coverage: f64,
) -> Result<ResolvedOutline, ResolveError> {
    let (total_pages, bookmarks) = blocking(&doc, |d| {
        let total = d.page_count()?;
        let bookmarks = d.native_outline()?;
        Ok((total, bookmarks))
    })
    .await?;

    let entries = embedded_entries(bookmarks, total_pages);
    match decide(&entries, total_pages, min_coverage) {
        OutlineDecision::Trust { coverage } => {
            info!(
                "Using {} embedded bookmark(s) ({:.0}% coverage)",
                entries.len(),
                coverage * 100.0
            );
            Ok(ResolvedOutline {
                source: OutlineSource::Embedded { coverage },
                entries,
            })
        }
        OutlineDecision::Infer { coverage } => {
            match coverage {
                Some(c) => info!(
                    "Embedded bookmarks cover {:.0}% of the document (< {:.0}%); inferring outline",
                    c * 100.0,
                    min_coverage * 100.0
                ),
                None => info!("No embedded bookmarks; inferring outline"),
            }
            infer_outline(doc, analyzer, total_pages).await
        }
    }
}

/// Outline resolution with a run-scoped cache.
pub struct OutlineProvider {
    analyzer: Arc<dyn LayoutAnalyzer>,
    cache: OutlineCache,
}

impl OutlineProvider {
    pub fn new(analyzer: Arc<dyn LayoutAnalyzer>) -> Self {
        Self {
            analyzer,
            cache: OutlineCache::new(),
        }
    }

    /// [`resolve_outline`], computed at most once per document identity and
    /// threshold for the provider's lifetime.
    pub async fn resolve_outline(
        &self,
        doc: Arc<dyn DocumentSource>,
        min_coverage: f64,
    ) -> Result<Arc<ResolvedOutline>, ResolveError> {
        let id = doc.identity().clone();
        let analyzer = Arc::clone(&self.analyzer);
        self.cache
            .get_or_try_init(&id, min_coverage, || async move {
                resolve_outline(doc, analyzer.as_ref(), min_coverage).await
            })
            .await
    }

    pub fn cache(&self) -> &OutlineCache {
        &self.cache
    }
}
