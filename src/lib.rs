//! # edgequake-sections
//!
//! Find the real content of a PDF book or paper and cut it into ordered,
//! size-bounded sections.
//!
//! A PDF's pages are not all content: covers, tables of contents, indices and
//! bibliographies surround the chapters. This crate reads the document's
//! outline (its own bookmarks, or headings a vision model finds on the
//! rendered pages when the bookmarks are missing), classifies every entry as
//! front matter, back matter, preamble or content, and returns page ranges
//! that tile exactly the content span. Sections over a size budget are split
//! at deeper outline levels, then into page chunks.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Outline   embedded bookmarks, or VLM heading inference
//!  ├─ 3. Classify  front / back / preamble / content
//!  ├─ 4. Range     first to last content page
//!  ├─ 5. Sections  split at entries of depth ≤ max_depth
//!  └─ 6. Budget    subdivide sections above max_size
//! ```
//!
//! Web articles take a short path: fetch, convert to markdown, split at
//! headings.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_sections::{resolve_sections, ResolverConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ResolverConfig::builder().max_depth(2).build()?;
//!     let resolution = resolve_sections("book.pdf", &config).await?;
//!     println!("outline: {}", resolution.outline_source);
//!     for section in &resolution.sections {
//!         println!("{:>4}-{:<4} {}", section.start_page + 1, section.end_page + 1, section.title);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2sections` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ```toml
//! edgequake-sections = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod classify;
pub mod config;
pub mod document;
pub mod error;
pub mod outline;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod resolve;
pub mod sections;
pub mod web;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use classify::{classify, EntryClassifier};
pub use config::{ResolverConfig, ResolverConfigBuilder};
pub use document::{DocumentId, DocumentSource, FontQuery, NativeBookmark};
pub use error::ResolveError;
pub use outline::{HeadingCandidate, LayoutAnalyzer, OutlineCache, OutlineProvider};
pub use output::{
    ClassifiedEntry, ContentRange, EntryKind, ExtractedSection, HierarchyStrategy, OutlineEntry,
    OutlineSource, Resolution, ResolvedOutline, Section, SectionDepth, SkippedEntry, WebSection,
};
pub use pipeline::llm::VlmLayoutAnalyzer;
pub use pipeline::render::PdfiumDocument;
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback};
pub use resolve::{
    extract_sections, open_input, resolve_from_bytes, resolve_sections, resolve_sections_sync,
    section_texts, OpenedInput, SectionResolver,
};
pub use sections::{
    build_sections, resolve_range, subdivide, PageSizeEstimator, SizeEstimator, CHARS_PER_TOKEN,
    DEFAULT_MAX_SIZE,
};
pub use web::split_by_headings;
