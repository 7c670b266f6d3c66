//! Heading inference: noise filtering and hierarchy assignment over layout
//! candidates.
//!
//! Everything except [`infer_outline`] is a pure function of the candidate
//! list, so the same candidates always give the same outline.

use crate::document::{blocking, DocumentSource, FontQuery};
use crate::error::ResolveError;
use crate::outline::layout::{HeadingCandidate, LayoutAnalyzer};
use crate::output::{HierarchyStrategy, OutlineEntry, OutlineSource, ResolvedOutline};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Shorter candidates are discarded.
const MIN_HEADING_CHARS: usize = 3;

/// Text seen more often than this is a running header or footer.
const MAX_REPEATS: usize = 2;

static MATH_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]\(.+\)$").expect("static regex"));

static NUMERIC_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+(?:\.\d+)*)\s").expect("static regex"));

/// Apply the noise filters in order: too short, bare math/axis label,
/// repeated more than twice, then keep the first occurrence of each text.
///
/// Texts are trimmed first; empty candidates are dropped.
pub fn filter_noise(candidates: Vec<HeadingCandidate>) -> Vec<HeadingCandidate> {
    let raw = candidates.len();
    let trimmed: Vec<HeadingCandidate> = candidates
        .into_iter()
        .filter_map(|mut c| {
            let text = c.text.trim();
            if text.chars().count() < MIN_HEADING_CHARS {
                return None;
            }
            if text.len() != c.text.len() {
                c.text = text.to_string();
            }
            Some(c)
        })
        .filter(|c| !MATH_LABEL.is_match(&c.text))
        .collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for c in &trimmed {
        *counts.entry(c.text.as_str()).or_default() += 1;
    }
    let repeated: HashSet<String> = counts
        .into_iter()
        .filter(|&(_, n)| n > MAX_REPEATS)
        .map(|(t, _)| t.to_string())
        .collect();

    let mut seen = HashSet::new();
    let kept: Vec<HeadingCandidate> = trimmed
        .into_iter()
        .filter(|c| !repeated.contains(&c.text))
        .filter(|c| seen.insert(c.text.clone()))
        .collect();

    debug!("Noise filters kept {} of {} heading candidate(s)", kept.len(), raw);
    kept
}

/// Depth implied by a leading section number: `"3 "` → 1, `"3.1 "` → 2.
pub fn numbering_depth(text: &str) -> Option<u32> {
    NUMERIC_PREFIX
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().matches('.').count() as u32 + 1)
}

/// Numbering is used only when strictly more than half the candidates carry
/// a section number.
pub fn choose_strategy(candidates: &[HeadingCandidate]) -> HierarchyStrategy {
    let numbered = candidates
        .iter()
        .filter(|c| numbering_depth(&c.text).is_some())
        .count();
    if numbered * 2 > candidates.len() {
        HierarchyStrategy::Numbering
    } else {
        HierarchyStrategy::FontSize
    }
}

/// Numbered candidates take their number's depth; the rest are depth 1.
pub fn assign_by_numbering(candidates: &[HeadingCandidate]) -> Vec<OutlineEntry> {
    candidates
        .iter()
        .map(|c| {
            let depth = numbering_depth(&c.text).unwrap_or(1);
            OutlineEntry::new(depth, c.text.clone(), c.page.unwrap_or(0))
        })
        .collect()
}

/// With at least two distinct positive sizes, the largest is depth 1 and
/// every other candidate depth 2. Otherwise everything is depth 1.
///
/// `sizes` is aligned with `candidates`; unknown sizes count as 0.
pub fn assign_by_font_size(candidates: &[HeadingCandidate], sizes: &[Option<f32>]) -> Vec<OutlineEntry> {
    let size_of = |i: usize| sizes.get(i).copied().flatten().unwrap_or(0.0);
    let largest = (0..candidates.len())
        .map(size_of)
        .filter(|s| *s > 0.0)
        .fold(None, |acc: Option<f32>, s| Some(acc.map_or(s, |a| a.max(s))));
    let two_sizes = largest
        .map(|top| (0..candidates.len()).map(size_of).any(|s| s > 0.0 && s < top))
        .unwrap_or(false);

    candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let depth = match largest {
                Some(top) if two_sizes && size_of(i) < top => 2,
                _ => 1,
            };
            OutlineEntry::new(depth, c.text.clone(), c.page.unwrap_or(0))
        })
        .collect()
}

/// Sort into document order (stable, so detection order is kept within a
/// page) and drop entries outside the document.
fn into_document_order(mut entries: Vec<OutlineEntry>, total_pages: usize) -> Vec<OutlineEntry> {
    entries.retain(|e| e.page < total_pages);
    entries.sort_by_key(|e| e.page);
    entries
}

/// Infer an outline by layout analysis.
///
/// Analyser failures propagate. An empty result is [`OutlineSource::None`].
pub async fn infer_outline(
    doc: Arc<dyn DocumentSource>,
    analyzer: &dyn LayoutAnalyzer,
    total_pages: usize,
) -> Result<ResolvedOutline, ResolveError> {
    let raw = analyzer.detect_headings(Arc::clone(&doc)).await?;
    info!("Layout analysis found {} raw heading(s)", raw.len());

    let candidates = filter_noise(raw);
    if candidates.is_empty() {
        info!("No usable headings after filtering");
        return Ok(ResolvedOutline::empty());
    }

    let strategy = choose_strategy(&candidates);
    let entries = match strategy {
        HierarchyStrategy::Numbering => {
            info!("Using section numbering for hierarchy");
            assign_by_numbering(&candidates)
        }
        HierarchyStrategy::FontSize => {
            info!("No section numbering; using font size for hierarchy");
            let sizes = lookup_font_sizes(&doc, &candidates).await?;
            assign_by_font_size(&candidates, &sizes)
        }
    };

    let entries = into_document_order(entries, total_pages);
    info!("Inferred {} outline entries", entries.len());
    if entries.is_empty() {
        return Ok(ResolvedOutline::empty());
    }
    Ok(ResolvedOutline {
        source: OutlineSource::Inferred { strategy },
        entries,
    })
}

/// Sizes from the analyser's hints, falling back to the document for the
/// rest. Candidates without a page get no size.
async fn lookup_font_sizes(
    doc: &Arc<dyn DocumentSource>,
    candidates: &[HeadingCandidate],
) -> Result<Vec<Option<f32>>, ResolveError> {
    let mut sizes: Vec<Option<f32>> = candidates.iter().map(|c| c.font_size).collect();
    let missing: Vec<(usize, FontQuery)> = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.font_size.is_none())
        .filter_map(|(i, c)| {
            c.page.map(|page| {
                (
                    i,
                    FontQuery {
                        page,
                        text: c.text.clone(),
                    },
                )
            })
        })
        .collect();
    if missing.is_empty() {
        return Ok(sizes);
    }

    let queries: Vec<FontQuery> = missing.iter().map(|(_, q)| q.clone()).collect();
    let found = blocking(doc, move |d| d.font_sizes(&queries)).await?;
    for ((i, _), size) in missing.iter().zip(found) {
        sizes[*i] = size;
    }
    Ok(sizes)
}
