//! Value types produced by the resolver.
//!
//! Everything here is an immutable value object: created once by one stage,
//! handed to the next, never mutated afterwards. All types serialise with
//! serde so the CLI can emit them as JSON unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One detected heading, from bookmarks or from inference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineEntry {
    /// 1 = top level. No upper bound.
    pub depth: u32,
    /// Trimmed, never empty.
    pub title: String,
    /// 0-indexed page.
    pub page: usize,
}

impl OutlineEntry {
    pub fn new(depth: u32, title: impl Into<String>, page: usize) -> Self {
        Self {
            depth,
            title: title.into(),
            page,
        }
    }
}

/// Structural role of an outline entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Cover, copyright, table of contents, …; never narrated.
    Front,
    /// Index, glossary, appendix, …; never narrated.
    Back,
    /// Foreword, preface, …; sits before chapter one but is real content.
    Preamble,
    Content,
}

impl EntryKind {
    /// Whether entries of this kind end up inside sections.
    pub fn is_included(self) -> bool {
        matches!(self, EntryKind::Preamble | EntryKind::Content)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::Front => "front",
            EntryKind::Back => "back",
            EntryKind::Preamble => "preamble",
            EntryKind::Content => "content",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An [`OutlineEntry`] with its classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedEntry {
    #[serde(flatten)]
    pub entry: OutlineEntry,
    pub kind: EntryKind,
}

impl ClassifiedEntry {
    pub fn depth(&self) -> u32 {
        self.entry.depth
    }

    pub fn title(&self) -> &str {
        &self.entry.title
    }

    pub fn page(&self) -> usize {
        self.entry.page
    }
}

/// A top-level entry left outside the content range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub page: usize,
    pub title: String,
    pub kind: EntryKind,
}

impl fmt::Display for SkippedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p.{}: {} [{}]", self.page, self.title, self.kind)
    }
}

/// The inclusive, 0-indexed page range holding the document's real content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRange {
    pub start_page: usize,
    pub end_page: usize,
    pub total_pages: usize,
    pub skipped_front: Vec<SkippedEntry>,
    pub skipped_back: Vec<SkippedEntry>,
}

impl ContentRange {
    /// The whole document. Used when there is no outline at all.
    pub fn whole(total_pages: usize) -> Self {
        if total_pages == 0 {
            return Self::collapsed(0, Vec::new(), Vec::new());
        }
        Self {
            start_page: 0,
            end_page: total_pages - 1,
            total_pages,
            skipped_front: Vec::new(),
            skipped_back: Vec::new(),
        }
    }

    /// A range with no content pages (`start_page > end_page`).
    pub fn collapsed(
        total_pages: usize,
        skipped_front: Vec<SkippedEntry>,
        skipped_back: Vec<SkippedEntry>,
    ) -> Self {
        Self {
            start_page: total_pages.max(1),
            end_page: 0,
            total_pages,
            skipped_front,
            skipped_back,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_pages == 0 || self.start_page > self.end_page
    }

    /// Number of content pages.
    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.end_page - self.start_page + 1
        }
    }

    pub fn contains(&self, page: usize) -> bool {
        !self.is_empty() && page >= self.start_page && page <= self.end_page
    }
}

/// Where a section's depth comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SectionDepth {
    /// Outline depth of the entry that opened the section.
    Outline { level: u32 },
    /// Fixed-size page group carved out of an oversized section at `level`.
    Chunk { level: u32, part: u32 },
}

impl SectionDepth {
    /// The outline level this section belongs to.
    pub fn level(self) -> u32 {
        match self {
            SectionDepth::Outline { level } | SectionDepth::Chunk { level, .. } => level,
        }
    }

    pub fn is_chunk(self) -> bool {
        matches!(self, SectionDepth::Chunk { .. })
    }
}

/// A bounded slice of the content range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub depth: SectionDepth,
    /// Inclusive, 0-indexed.
    pub start_page: usize,
    /// Inclusive, 0-indexed.
    pub end_page: usize,
}

impl Section {
    pub fn new(title: impl Into<String>, level: u32, start_page: usize, end_page: usize) -> Self {
        Self {
            title: title.into(),
            depth: SectionDepth::Outline { level },
            start_page,
            end_page,
        }
    }

    pub fn level(&self) -> u32 {
        self.depth.level()
    }

    pub fn page_count(&self) -> usize {
        self.end_page - self.start_page + 1
    }

    pub fn is_single_page(&self) -> bool {
        self.start_page == self.end_page
    }
}

/// A section of web markdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSection {
    pub title: String,
    /// Body without the heading line itself.
    pub content: String,
}

impl WebSection {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

/// How the hierarchy of an inferred outline was assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyStrategy {
    /// Depth from section numbers like `3.1.2`.
    Numbering,
    /// Largest font is depth 1, everything else depth 2.
    FontSize,
}

/// Which source produced the outline the sections were built from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum OutlineSource {
    /// The PDF's own bookmarks, trusted by coverage.
    Embedded { coverage: f64 },
    /// Headings found by layout analysis.
    Inferred { strategy: HierarchyStrategy },
    /// Neither source produced a single heading.
    None,
}

impl fmt::Display for OutlineSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutlineSource::Embedded { coverage } => {
                write!(f, "embedded bookmarks ({:.0}% coverage)", coverage * 100.0)
            }
            OutlineSource::Inferred { strategy } => match strategy {
                HierarchyStrategy::Numbering => f.write_str("inferred (section numbering)"),
                HierarchyStrategy::FontSize => f.write_str("inferred (font size)"),
            },
            OutlineSource::None => f.write_str("none"),
        }
    }
}

/// A resolved outline, shared read-only through the outline cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedOutline {
    pub source: OutlineSource,
    pub entries: Vec<OutlineEntry>,
}

impl ResolvedOutline {
    pub fn empty() -> Self {
        Self {
            source: OutlineSource::None,
            entries: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The full result of resolving one PDF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub outline_source: OutlineSource,
    pub entries: Vec<ClassifiedEntry>,
    pub content_range: ContentRange,
    pub sections: Vec<Section>,
}

/// A titled block of text ready for downstream generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedSection {
    pub title: String,
    pub content: String,
}

impl From<WebSection> for ExtractedSection {
    fn from(ws: WebSection) -> Self {
        Self {
            title: ws.title,
            content: ws.content.trim().to_string(),
        }
    }
}
