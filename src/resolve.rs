//! Top-level resolution: outline → classification → content range →
//! sections → subdivision, plus the input-string entry points.
//!
//! [`SectionResolver`] owns the outline cache, so a resolver constructed once
//! per run answers repeated questions about the same document (outline,
//! content range, sections) with a single outline resolution.

use crate::config::ResolverConfig;
use crate::document::{blocking, DocumentSource};
use crate::error::ResolveError;
use crate::outline::{LayoutAnalyzer, OutlineCache, OutlineProvider};
use crate::output::{ContentRange, ExtractedSection, Resolution, ResolvedOutline, Section};
use crate::pipeline::input::{self, InputSource, ResolvedInput};
use crate::pipeline::llm::VlmLayoutAnalyzer;
use crate::pipeline::render::PdfiumDocument;
use crate::sections::{build_sections, resolve_range, subdivide, PageSizeEstimator};
use crate::web;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Resolves documents into sections, sharing one outline cache.
pub struct SectionResolver {
    config: ResolverConfig,
    outline: OutlineProvider,
}

impl SectionResolver {
    /// A resolver that infers missing outlines with the configured vision model.
    ///
    /// No provider is contacted until a document actually needs inference.
    pub fn new(config: ResolverConfig) -> Self {
        let analyzer = Arc::new(VlmLayoutAnalyzer::new(config.clone()));
        Self::with_analyzer(config, analyzer)
    }

    /// A resolver with a caller-supplied layout analyser.
    pub fn with_analyzer(config: ResolverConfig, analyzer: Arc<dyn LayoutAnalyzer>) -> Self {
        Self {
            config,
            outline: OutlineProvider::new(analyzer),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn outline_cache(&self) -> &OutlineCache {
        self.outline.cache()
    }

    /// The document's outline: trusted bookmarks or inferred headings.
    pub async fn resolve_outline(
        &self,
        doc: Arc<dyn DocumentSource>,
    ) -> Result<Arc<ResolvedOutline>, ResolveError> {
        self.outline
            .resolve_outline(doc, self.config.min_coverage)
            .await
    }

    /// The page span holding the document's real content.
    pub async fn resolve_content_range(
        &self,
        doc: Arc<dyn DocumentSource>,
    ) -> Result<ContentRange, ResolveError> {
        let outline = self.resolve_outline(Arc::clone(&doc)).await?;
        let total_pages = blocking(&doc, |d| d.page_count()).await?;
        let entries = self.config.classifier.classify_all(&outline.entries);
        Ok(resolve_range(&entries, total_pages))
    }

    /// Resolve the full section list of one document.
    pub async fn resolve(&self, doc: Arc<dyn DocumentSource>) -> Result<Resolution, ResolveError> {
        let start = Instant::now();
        let outline = self.resolve_outline(Arc::clone(&doc)).await?;
        let total_pages = blocking(&doc, |d| d.page_count()).await?;

        let entries = self.config.classifier.classify_all(&outline.entries);
        for entry in &entries {
            debug!("[{}] p.{} {}", entry.kind, entry.page() + 1, entry.title());
        }

        let content_range = resolve_range(&entries, total_pages);
        if content_range.is_empty() {
            info!("No content pages in {} page(s)", total_pages);
        } else {
            info!(
                "Content range: pages {}-{} of {}",
                content_range.start_page + 1,
                content_range.end_page + 1,
                total_pages
            );
        }

        let sections = build_sections(&entries, &content_range, self.config.max_depth)?;
        let sections = match self.config.max_size {
            Some(max_size) if !sections.is_empty() => {
                let counts = blocking(&doc, |d| d.page_char_counts()).await?;
                subdivide(sections, &entries, &PageSizeEstimator::new(counts), max_size)?
            }
            _ => sections,
        };

        info!(
            "Resolved {} section(s) from {} in {}ms",
            sections.len(),
            outline.source,
            start.elapsed().as_millis()
        );
        Ok(Resolution {
            outline_source: outline.source,
            entries,
            content_range,
            sections,
        })
    }

    /// Resolve sections and attach the text of their pages.
    pub async fn extract(
        &self,
        doc: Arc<dyn DocumentSource>,
    ) -> Result<Vec<ExtractedSection>, ResolveError> {
        let resolution = self.resolve(Arc::clone(&doc)).await?;
        section_texts(doc, resolution.sections).await
    }
}

/// Page text of each section, pages joined by a blank line.
pub async fn section_texts(
    doc: Arc<dyn DocumentSource>,
    sections: Vec<Section>,
) -> Result<Vec<ExtractedSection>, ResolveError> {
    blocking(&doc, move |d| {
        sections
            .into_iter()
            .map(|section| {
                let pages = d.page_texts(section.start_page, section.end_page)?;
                Ok(ExtractedSection {
                    title: section.title,
                    content: pages.join("\n\n").trim().to_string(),
                })
            })
            .collect()
    })
    .await
}

// ── Input entry points ───────────────────────────────────────────────────

/// A resolved input, ready to hand to a [`SectionResolver`].
pub enum OpenedInput {
    /// A PDF opened with pdfium. `source` keeps a downloaded file alive.
    Pdf {
        document: Arc<PdfiumDocument>,
        source: ResolvedInput,
    },
    Web {
        url: String,
    },
}

/// Resolve a path or URL and open it if it is a PDF.
pub async fn open_input(input: &str, config: &ResolverConfig) -> Result<OpenedInput, ResolveError> {
    let source = input::resolve_input(
        input,
        config.download_timeout_secs,
        config.download_dir.as_deref(),
    )
    .await?;

    match source {
        InputSource::Web { url } => Ok(OpenedInput::Web { url }),
        InputSource::Pdf(resolved) => {
            let path = resolved.path().to_path_buf();
            let password = config.password.clone();
            let document = tokio::task::spawn_blocking(move || {
                PdfiumDocument::open(&path, password.as_deref())
            })
            .await
            .map_err(|e| ResolveError::Internal(format!("Open task panicked: {}", e)))??;
            Ok(OpenedInput::Pdf {
                document: Arc::new(document),
                source: resolved,
            })
        }
    }
}

/// Resolve the sections of a PDF given by local path or URL.
///
/// # Errors
/// [`ResolveError::NotAPdfUrl`] when the URL serves a web page; use
/// [`extract_sections`] for those.
///
/// # Example
/// ```rust,no_run
/// use edgequake_sections::{resolve_sections, ResolverConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let resolution = resolve_sections("book.pdf", &ResolverConfig::default()).await?;
/// for s in &resolution.sections {
///     println!("{} (pages {}-{})", s.title, s.start_page + 1, s.end_page + 1);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn resolve_sections(
    input: impl AsRef<str>,
    config: &ResolverConfig,
) -> Result<Resolution, ResolveError> {
    match open_input(input.as_ref(), config).await? {
        OpenedInput::Pdf { document, source: _source } => {
            SectionResolver::new(config.clone()).resolve(document).await
        }
        OpenedInput::Web { url } => Err(ResolveError::NotAPdfUrl { url }),
    }
}

/// Synchronous wrapper around [`resolve_sections`].
///
/// Creates a temporary tokio runtime internally.
pub fn resolve_sections_sync(
    input: impl AsRef<str>,
    config: &ResolverConfig,
) -> Result<Resolution, ResolveError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ResolveError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(resolve_sections(input, config))
}

/// Resolve the sections of PDF bytes held in memory.
pub async fn resolve_from_bytes(
    bytes: &[u8],
    config: &ResolverConfig,
) -> Result<Resolution, ResolveError> {
    let mut tmp = tempfile::Builder::new()
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| ResolveError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| ResolveError::Internal(format!("tempfile write: {e}")))?;
    let path = tmp.path().to_string_lossy().to_string();
    // `tmp` outlives the resolution and is deleted on return.
    resolve_sections(&path, config).await
}

/// Titled text blocks for a PDF or a web article.
///
/// PDFs go through the full resolver. Web pages are fetched, reduced to
/// markdown and split at headings up to `config.max_depth`.
pub async fn extract_sections(
    input: impl AsRef<str>,
    config: &ResolverConfig,
) -> Result<Vec<ExtractedSection>, ResolveError> {
    match open_input(input.as_ref(), config).await? {
        OpenedInput::Pdf { document, source: _source } => {
            SectionResolver::new(config.clone()).extract(document).await
        }
        OpenedInput::Web { url } => {
            let markdown = web::fetch_url_content(&url, config.download_timeout_secs).await?;
            let sections = web::split_by_headings(&markdown, config.max_depth);
            info!("Split {} into {} section(s)", url, sections.len());
            Ok(sections.into_iter().map(ExtractedSection::from).collect())
        }
    }
}
