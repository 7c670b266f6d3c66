//! Embedded bookmarks and the coverage trust check.

use crate::document::NativeBookmark;
use crate::output::OutlineEntry;
use tracing::{debug, warn};

/// Convert raw bookmarks to outline entries.
///
/// Pages go from 1-based to 0-based. Bookmarks without a page, pointing
/// before the first page or past the last, or with a blank title are dropped.
pub fn embedded_entries(bookmarks: Vec<NativeBookmark>, total_pages: usize) -> Vec<OutlineEntry> {
    let mut dropped = 0usize;
    let entries: Vec<OutlineEntry> = bookmarks
        .into_iter()
        .filter_map(|b| {
            let page = match b.page_1based {
                Some(p) if p >= 1 && ((p - 1) as u64) < total_pages as u64 => (p - 1) as usize,
                _ => {
                    dropped += 1;
                    return None;
                }
            };
            let title = b.title.trim();
            if title.is_empty() {
                dropped += 1;
                return None;
            }
            Some(OutlineEntry::new(b.depth.max(1), title, page))
        })
        .collect();

    if dropped > 0 {
        warn!("Discarded {} bookmark(s) with no valid page or title", dropped);
    }
    debug!("{} usable bookmark(s)", entries.len());
    entries
}

/// Highest bookmarked page as a fraction of the page count.
pub fn coverage(entries: &[OutlineEntry], total_pages: usize) -> f64 {
    if total_pages == 0 {
        return 0.0;
    }
    let max_page = entries.iter().map(|e| e.page).max().unwrap_or(0);
    max_page as f64 / total_pages as f64
}

/// Outcome of the trust check on embedded bookmarks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutlineDecision {
    /// Use the bookmarks.
    Trust { coverage: f64 },
    /// Infer the outline instead. `coverage` is `None` when there were no bookmarks.
    Infer { coverage: Option<f64> },
}

/// Bookmarks are trusted when there is at least one and their coverage
/// reaches `min_coverage` (inclusive).
pub fn decide(entries: &[OutlineEntry], total_pages: usize, min_coverage: f64) -> OutlineDecision {
    if entries.is_empty() {
        return OutlineDecision::Infer { coverage: None };
    }
    let coverage = coverage(entries, total_pages);
    if coverage >= min_coverage {
        OutlineDecision::Trust { coverage }
    } else {
        OutlineDecision::Infer {
            coverage: Some(coverage),
        }
    }
}
