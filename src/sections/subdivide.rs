//! Budget-driven subdivision of oversized sections.
//!
//! Sections are checked from a worklist. An oversized section is replaced by
//! its children from the next outline level found inside its pages, or, when
//! the outline has nothing deeper there, by consecutive page chunks that each
//! fit the budget. Pieces produced from children go back on the front of the
//! worklist so they are checked in document order; chunks are final.

use crate::error::ResolveError;
use crate::output::{ClassifiedEntry, Section, SectionDepth};
use crate::sections::build::{tile_pages, verify_tiling};
use std::collections::VecDeque;
use tracing::{debug, info};

/// Characters per estimated token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Default per-section budget in estimated tokens.
pub const DEFAULT_MAX_SIZE: usize = 24_000;

/// Cheap size proxy for an inclusive page range.
pub trait SizeEstimator {
    fn estimate(&self, start_page: usize, end_page: usize) -> usize;
}

/// Estimates tokens from per-page character counts.
#[derive(Debug, Clone, Default)]
pub struct PageSizeEstimator {
    chars_per_page: Vec<usize>,
}

impl PageSizeEstimator {
    pub fn new(chars_per_page: Vec<usize>) -> Self {
        Self { chars_per_page }
    }
}

impl SizeEstimator for PageSizeEstimator {
    fn estimate(&self, start_page: usize, end_page: usize) -> usize {
        if start_page > end_page {
            return 0;
        }
        let chars: usize = self
            .chars_per_page
            .iter()
            .skip(start_page)
            .take(end_page - start_page + 1)
            .sum();
        chars / CHARS_PER_TOKEN
    }
}

impl<F> SizeEstimator for F
where
    F: Fn(usize, usize) -> usize,
{
    fn estimate(&self, start_page: usize, end_page: usize) -> usize {
        self(start_page, end_page)
    }
}

/// Split every section estimated above `max_size` until each output section
/// fits or is a single page.
///
/// The output tiles exactly the pages the input tiled. Running it again on
/// its own output returns the output unchanged.
pub fn subdivide(
    sections: Vec<Section>,
    entries: &[ClassifiedEntry],
    estimator: &dyn SizeEstimator,
    max_size: usize,
) -> Result<Vec<Section>, ResolveError> {
    let span = match (sections.first(), sections.last()) {
        (Some(first), Some(last)) => (first.start_page, last.end_page),
        _ => return Ok(sections),
    };
    let input_count = sections.len();

    let mut pending: VecDeque<Section> = sections.into();
    let mut done = Vec::with_capacity(pending.len());

    while let Some(section) = pending.pop_front() {
        let size = estimator.estimate(section.start_page, section.end_page);
        if size <= max_size || section.is_single_page() || section.depth.is_chunk() {
            done.push(section);
            continue;
        }

        let children = children_of(&section, entries);
        if children.is_empty() {
            let chunks = chunk_pages(&section, estimator, max_size);
            debug!(
                "'{}' ({} est. tokens, pages {}-{}) has no deeper entries; {} page chunk(s)",
                section.title,
                size,
                section.start_page,
                section.end_page,
                chunks.len()
            );
            done.extend(chunks);
            continue;
        }

        let pieces = split_at_children(&section, &children);
        debug!(
            "'{}' ({} est. tokens) split into {} piece(s) at depth {}",
            section.title,
            size,
            pieces.len(),
            children[0].depth()
        );
        for piece in pieces.into_iter().rev() {
            pending.push_front(piece);
        }
    }

    verify_tiling(&done, span.0, span.1)?;
    if done.len() != input_count {
        info!(
            "Subdivided {} section(s) into {} (budget {} est. tokens)",
            input_count,
            done.len(),
            max_size
        );
    }
    Ok(done)
}

/// Included entries strictly inside the section's pages at the shallowest
/// depth below the section's own.
fn children_of<'a>(section: &Section, entries: &'a [ClassifiedEntry]) -> Vec<&'a ClassifiedEntry> {
    let level = section.level();
    let deeper: Vec<&ClassifiedEntry> = entries
        .iter()
        .filter(|e| {
            e.depth() > level
                && e.kind.is_included()
                && e.page() >= section.start_page
                && e.page() <= section.end_page
        })
        .collect();

    let Some(next_level) = deeper.iter().map(|e| e.depth()).min() else {
        return Vec::new();
    };
    let mut children: Vec<&ClassifiedEntry> = deeper
        .into_iter()
        .filter(|e| e.depth() == next_level)
        .collect();
    children.sort_by_key(|e| e.page());
    children
}

fn split_at_children(section: &Section, children: &[&ClassifiedEntry]) -> Vec<Section> {
    let first_child_page = children[0].page();
    let mut pieces = Vec::with_capacity(children.len() + 1);
    if first_child_page > section.start_page {
        // The parent keeps its own opening pages.
        pieces.push(Section {
            title: section.title.clone(),
            depth: section.depth,
            start_page: section.start_page,
            end_page: first_child_page - 1,
        });
    }
    pieces.extend(tile_pages(children, first_child_page, section.end_page));
    pieces
}

/// Greedy page grouping: grow a chunk page by page and close it just before
/// the page that would push it over budget. A chunk always holds at least one
/// page.
fn chunk_pages(section: &Section, estimator: &dyn SizeEstimator, max_size: usize) -> Vec<Section> {
    let mut bounds = Vec::new();
    let mut chunk_start = section.start_page;
    for page in section.start_page..=section.end_page {
        if page > chunk_start && estimator.estimate(chunk_start, page) > max_size {
            bounds.push((chunk_start, page - 1));
            chunk_start = page;
        }
    }
    bounds.push((chunk_start, section.end_page));

    if bounds.len() == 1 {
        return vec![section.clone()];
    }

    let level = section.level();
    bounds
        .into_iter()
        .zip(1u32..)
        .map(|((start_page, end_page), part)| Section {
            title: format!("{} (part {})", section.title, part),
            depth: SectionDepth::Chunk { level, part },
            start_page,
            end_page,
        })
        .collect()
}
