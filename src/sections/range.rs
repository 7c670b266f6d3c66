//! Content range resolution from the classified top-level outline.

use crate::output::{ClassifiedEntry, ContentRange, EntryKind, SkippedEntry};
use tracing::debug;

/// Compute the inclusive page range holding the real content.
///
/// Only depth-1 entries are considered. The range starts at the first
/// preamble/content entry and ends the page before the trailing run of
/// back-matter entries. A back-matter entry followed by more content (an
/// appendix between two parts, say) does not end the range.
///
/// With no top-level entries at all the whole document is content. With
/// top-level entries but none of them preamble/content the range is empty.
pub fn resolve_range(entries: &[ClassifiedEntry], total_pages: usize) -> ContentRange {
    let top_level: Vec<&ClassifiedEntry> = entries.iter().filter(|e| e.depth() == 1).collect();

    if top_level.is_empty() || total_pages == 0 {
        return ContentRange::whole(total_pages);
    }

    let skipped = |e: &ClassifiedEntry| SkippedEntry {
        page: e.page(),
        title: e.title().to_string(),
        kind: e.kind,
    };

    let mut skipped_front = Vec::new();
    let mut start_page = None;
    for entry in &top_level {
        if entry.kind.is_included() {
            start_page = Some(entry.page());
            break;
        }
        skipped_front.push(skipped(entry));
    }

    let mut skipped_back = Vec::new();
    let mut back_start = None;
    for entry in top_level.iter().rev() {
        if entry.kind != EntryKind::Back {
            break;
        }
        back_start = Some(entry.page());
        skipped_back.push(skipped(entry));
    }
    skipped_back.reverse();

    let Some(start_page) = start_page else {
        debug!("No preamble or content among {} top-level entries", top_level.len());
        return ContentRange::collapsed(total_pages, skipped_front, skipped_back);
    };

    let end_page = match back_start {
        // Back matter starting on the first page leaves nothing.
        Some(0) => {
            return ContentRange::collapsed(total_pages, skipped_front, skipped_back);
        }
        Some(page) => (page - 1).min(total_pages - 1),
        None => total_pages - 1,
    };

    if start_page > end_page {
        return ContentRange::collapsed(total_pages, skipped_front, skipped_back);
    }

    ContentRange {
        start_page,
        end_page,
        total_pages,
        skipped_front,
        skipped_back,
    }
}
