//! First-pass sections from the depth-filtered outline.

use crate::error::ResolveError;
use crate::output::{ClassifiedEntry, ContentRange, Section};
use tracing::debug;

/// Title of the single section emitted when no entry survives filtering.
pub const FULL_DOCUMENT_TITLE: &str = "Full Document";

/// Split `range` at every included entry of depth `<= max_depth`.
///
/// Each entry's section runs until the page before the next entry; the last
/// one runs to `range.end_page`. The result always tiles the range exactly.
pub fn build_sections(
    entries: &[ClassifiedEntry],
    range: &ContentRange,
    max_depth: u32,
) -> Result<Vec<Section>, ResolveError> {
    if range.is_empty() {
        return Ok(Vec::new());
    }

    let mut openers: Vec<&ClassifiedEntry> = entries
        .iter()
        .filter(|e| e.depth() <= max_depth && e.kind.is_included() && range.contains(e.page()))
        .collect();
    // Stable: same-page entries keep outline order.
    openers.sort_by_key(|e| e.page());

    let sections = if openers.is_empty() {
        debug!("No outline entries inside the content range; emitting one section");
        vec![Section::new(
            FULL_DOCUMENT_TITLE,
            1,
            range.start_page,
            range.end_page,
        )]
    } else {
        tile_pages(&openers, range.start_page, range.end_page)
    };

    verify_tiling(&sections, range.start_page, range.end_page)?;
    Ok(sections)
}

/// Turn page-sorted openers into sections covering `start..=end`.
///
/// The first opener on a page owns it; later openers on the same page are
/// folded in. The first section is stretched back to `start` when the first
/// opener sits later.
pub(crate) fn tile_pages(openers: &[&ClassifiedEntry], start: usize, end: usize) -> Vec<Section> {
    let mut distinct: Vec<&ClassifiedEntry> = Vec::with_capacity(openers.len());
    for &entry in openers {
        match distinct.last() {
            Some(prev) if prev.page() == entry.page() => {
                debug!(
                    "Folding '{}' into '{}' (both on page {})",
                    entry.title(),
                    prev.title(),
                    entry.page()
                );
            }
            _ => distinct.push(entry),
        }
    }

    let mut sections = Vec::with_capacity(distinct.len());
    for (i, entry) in distinct.iter().enumerate() {
        let section_start = if i == 0 { start } else { entry.page() };
        let section_end = match distinct.get(i + 1) {
            Some(next) => next.page() - 1,
            None => end,
        };
        sections.push(Section::new(
            entry.title(),
            entry.depth(),
            section_start,
            section_end,
        ));
    }
    sections
}

/// Check that `sections` cover `start..=end` in order with no gap or overlap.
pub fn verify_tiling(sections: &[Section], start: usize, end: usize) -> Result<(), ResolveError> {
    let mut expected = start;
    for s in sections {
        if s.start_page > s.end_page {
            return Err(ResolveError::InvariantViolation(format!(
                "section '{}' has inverted pages {}..={}",
                s.title, s.start_page, s.end_page
            )));
        }
        if s.start_page != expected {
            return Err(ResolveError::InvariantViolation(format!(
                "section '{}' starts at page {} but page {} was expected",
                s.title, s.start_page, expected
            )));
        }
        expected = s.end_page + 1;
    }
    match sections.last() {
        Some(last) if last.end_page == end => Ok(()),
        Some(last) => Err(ResolveError::InvariantViolation(format!(
            "sections end at page {} but content ends at page {}",
            last.end_page, end
        ))),
        None => Err(ResolveError::InvariantViolation(format!(
            "no sections for non-empty content {}..={}",
            start, end
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::EntryClassifier;
    use crate::output::OutlineEntry;
    use crate::sections::range::resolve_range;

    fn classified(raw: &[(u32, &str, usize)]) -> Vec<ClassifiedEntry> {
        let entries: Vec<OutlineEntry> = raw
            .iter()
            .map(|&(d, t, p)| OutlineEntry::new(d, t, p))
            .collect();
        EntryClassifier::default().classify_all(&entries)
    }

    fn spans(sections: &[Section]) -> Vec<(&str, usize, usize)> {
        sections
            .iter()
            .map(|s| (s.title.as_str(), s.start_page, s.end_page))
            .collect()
    }

    #[test]
    fn chapters_split_at_next_entry() {
        let entries = classified(&[
            (1, "Cover", 0),
            (1, "Preface", 2),
            (1, "Chapter 1", 5),
            (2, "1.1 Setup", 7),
            (1, "Chapter 2", 20),
            (1, "Index", 40),
        ]);
        let range = resolve_range(&entries, 45);
        let sections = build_sections(&entries, &range, 1).unwrap();
        assert_eq!(
            spans(&sections),
            vec![("Preface", 2, 4), ("Chapter 1", 5, 19), ("Chapter 2", 20, 39)]
        );
    }

    #[test]
    fn max_depth_two_includes_subsections() {
        let entries = classified(&[
            (1, "Chapter 1", 0),
            (2, "1.1 Setup", 3),
            (2, "1.2 Usage", 6),
            (1, "Chapter 2", 10),
        ]);
        let range = resolve_range(&entries, 12);
        let sections = build_sections(&entries, &range, 2).unwrap();
        assert_eq!(
            spans(&sections),
            vec![
                ("Chapter 1", 0, 2),
                ("1.1 Setup", 3, 5),
                ("1.2 Usage", 6, 9),
                ("Chapter 2", 10, 11)
            ]
        );
        assert_eq!(sections[1].level(), 2);
    }

    #[test]
    fn same_page_entries_do_not_overlap() {
        let entries = classified(&[
            (1, "Chapter 1", 0),
            (2, "1.1 Opening", 0),
            (2, "1.2 Next", 4),
        ]);
        let range = resolve_range(&entries, 8);
        let sections = build_sections(&entries, &range, 2).unwrap();
        assert_eq!(spans(&sections), vec![("Chapter 1", 0, 3), ("1.2 Next", 4, 7)]);
    }

    #[test]
    fn first_section_stretches_to_range_start() {
        // Only depth-2 entries: the range is the whole document.
        let entries = classified(&[(2, "Methods", 3), (2, "Results", 6)]);
        let range = resolve_range(&entries, 10);
        let sections = build_sections(&entries, &range, 2).unwrap();
        assert_eq!(spans(&sections), vec![("Methods", 0, 5), ("Results", 6, 9)]);
    }

    #[test]
    fn nothing_survives_filter_gives_full_document() {
        let entries = classified(&[(2, "Methods", 3)]);
        let range = resolve_range(&entries, 10);
        let sections = build_sections(&entries, &range, 1).unwrap();
        assert_eq!(spans(&sections), vec![(FULL_DOCUMENT_TITLE, 0, 9)]);
    }

    #[test]
    fn empty_range_gives_no_sections() {
        let entries = classified(&[(1, "Cover", 0), (1, "Index", 1)]);
        let range = resolve_range(&entries, 2);
        assert!(build_sections(&entries, &range, 1).unwrap().is_empty());
    }

    #[test]
    fn verify_tiling_catches_gaps_and_overlaps() {
        let ok = vec![Section::new("a", 1, 0, 4), Section::new("b", 1, 5, 9)];
        assert!(verify_tiling(&ok, 0, 9).is_ok());

        let gap = vec![Section::new("a", 1, 0, 3), Section::new("b", 1, 5, 9)];
        assert!(matches!(
            verify_tiling(&gap, 0, 9),
            Err(ResolveError::InvariantViolation(_))
        ));

        let overlap = vec![Section::new("a", 1, 0, 5), Section::new("b", 1, 5, 9)];
        assert!(verify_tiling(&overlap, 0, 9).is_err());

        let short = vec![Section::new("a", 1, 0, 8)];
        assert!(verify_tiling(&short, 0, 9).is_err());
    }
}
