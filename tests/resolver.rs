//! Integration tests for `SectionResolver`.
//!
//! An in-memory `DocumentSource` and a scripted `LayoutAnalyzer` stand in for
//! pdfium and the vision model, so every test here runs offline.
//!
//! Run with:
//!   cargo test --test resolver

use edgequake_sections::sections::verify_tiling;
use edgequake_sections::{
    split_by_headings, subdivide, DocumentId, DocumentSource, EntryKind, FontQuery,
    HeadingCandidate, HierarchyStrategy, LayoutAnalyzer, NativeBookmark, OutlineSource,
    PageSizeEstimator, ResolveError, ResolverConfig, SectionDepth, SectionResolver, SizeEstimator,
    WebSection,
};
use futures::future::{join_all, BoxFuture};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ── Test doubles ─────────────────────────────────────────────────────────────

struct FakeDocument {
    id: DocumentId,
    texts: Vec<String>,
    bookmarks: Vec<NativeBookmark>,
    fonts: HashMap<String, f32>,
    unreadable: bool,
}

impl FakeDocument {
    /// `total` pages of `chars` characters each (100 estimated tokens per 400 chars).
    fn uniform(name: &str, total: usize, chars: usize) -> Self {
        Self {
            id: DocumentId::from_raw(name),
            texts: (0..total).map(|_| "x".repeat(chars)).collect(),
            bookmarks: Vec::new(),
            fonts: HashMap::new(),
            unreadable: false,
        }
    }

    fn with_texts(name: &str, texts: Vec<String>) -> Self {
        Self {
            texts,
            ..Self::uniform(name, 0, 0)
        }
    }

    /// `(depth, title, 1-based page)`.
    fn bookmarks(mut self, marks: &[(u32, &str, i64)]) -> Self {
        self.bookmarks = marks
            .iter()
            .map(|&(depth, title, page)| NativeBookmark::new(depth, title, page))
            .collect();
        self
    }

    fn font(mut self, text: &str, size: f32) -> Self {
        self.fonts.insert(text.to_string(), size);
        self
    }

    fn unreadable(mut self) -> Self {
        self.unreadable = true;
        self
    }

    fn check(&self) -> Result<(), ResolveError> {
        if self.unreadable {
            return Err(ResolveError::DocumentUnreadable {
                path: format!("{}.pdf", self.id).into(),
                detail: "xref table is corrupt".into(),
            });
        }
        Ok(())
    }

    fn shared(self) -> Arc<dyn DocumentSource> {
        Arc::new(self)
    }
}

impl DocumentSource for FakeDocument {
    fn identity(&self) -> &DocumentId {
        &self.id
    }

    fn page_count(&self) -> Result<usize, ResolveError> {
        self.check()?;
        Ok(self.texts.len())
    }

    fn native_outline(&self) -> Result<Vec<NativeBookmark>, ResolveError> {
        self.check()?;
        Ok(self.bookmarks.clone())
    }

    fn font_sizes(&self, queries: &[FontQuery]) -> Result<Vec<Option<f32>>, ResolveError> {
        self.check()?;
        Ok(queries.iter().map(|q| self.fonts.get(&q.text).copied()).collect())
    }

    fn page_texts(&self, start: usize, end: usize) -> Result<Vec<String>, ResolveError> {
        self.check()?;
        Ok(self.texts[start..=end].to_vec())
    }
}

#[derive(Default)]
struct ScriptedAnalyzer {
    candidates: Vec<HeadingCandidate>,
    fail: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedAnalyzer {
    fn returning(candidates: Vec<HeadingCandidate>) -> Arc<Self> {
        Arc::new(Self {
            candidates,
            ..Default::default()
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Default::default()
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LayoutAnalyzer for ScriptedAnalyzer {
    fn detect_headings<'a>(
        &'a self,
        _doc: Arc<dyn DocumentSource>,
    ) -> BoxFuture<'a, Result<Vec<HeadingCandidate>, ResolveError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(ResolveError::LayoutAnalysisFailed {
                    page: Some(2),
                    detail: "page 3: model unavailable".into(),
                });
            }
            Ok(self.candidates.clone())
        })
    }
}

fn config(max_size: Option<usize>) -> ResolverConfig {
    ResolverConfig::builder().max_size(max_size).build().unwrap()
}

fn resolver(config: ResolverConfig, analyzer: &Arc<ScriptedAnalyzer>) -> SectionResolver {
    SectionResolver::with_analyzer(config, Arc::clone(analyzer) as Arc<dyn LayoutAnalyzer>)
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn front_content_back_from_bookmarks() {
    let doc = FakeDocument::uniform("book-a", 45, 100)
        .bookmarks(&[(1, "Cover", 1), (1, "Chapter 1", 6), (1, "Index", 41)])
        .shared();
    let analyzer = ScriptedAnalyzer::returning(Vec::new());
    let r = resolver(config(None), &analyzer);

    let res = r.resolve(doc).await.unwrap();

    let kinds: Vec<EntryKind> = res.entries.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![EntryKind::Front, EntryKind::Content, EntryKind::Back]);
    assert_eq!(
        (res.content_range.start_page, res.content_range.end_page, res.content_range.total_pages),
        (5, 39, 45)
    );
    assert_eq!(res.content_range.skipped_front[0].title, "Cover");
    assert_eq!(res.content_range.skipped_back[0].title, "Index");
    assert_eq!(res.sections.len(), 1);
    assert_eq!(res.sections[0].title, "Chapter 1");
    assert_eq!((res.sections[0].start_page, res.sections[0].end_page), (5, 39));
    assert!(matches!(res.outline_source, OutlineSource::Embedded { .. }));
    assert_eq!(analyzer.calls(), 0, "trusted bookmarks must not trigger inference");
}

#[tokio::test]
async fn numbered_headings_pick_numbering_hierarchy() {
    let texts = [
        "Preface",
        "1 Background",
        "1.1 Motivation",
        "1.2 Scope",
        "2 Method",
        "2.1 Data Collection",
        "Interlude on Terms",
        "3 Results",
        "3.1 Ablations",
        "Closing Remarks",
    ];
    let candidates = texts
        .iter()
        .enumerate()
        .map(|(i, t)| HeadingCandidate::new(*t, i * 2))
        .collect();
    let doc = FakeDocument::uniform("paper-b", 20, 100).shared();
    let analyzer = ScriptedAnalyzer::returning(candidates);
    let r = resolver(config(None), &analyzer);

    let res = r.resolve(doc).await.unwrap();

    assert_eq!(
        res.outline_source,
        OutlineSource::Inferred {
            strategy: HierarchyStrategy::Numbering
        }
    );
    let depths: Vec<u32> = res.entries.iter().map(|e| e.depth()).collect();
    assert_eq!(depths, vec![1, 1, 2, 2, 1, 2, 1, 1, 2, 1]);
    assert_eq!(res.entries[0].kind, EntryKind::Preamble);
    assert_eq!(analyzer.calls(), 1);

    let titles: Vec<&str> = res.sections.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["Preface", "1 Background", "2 Method", "Interlude on Terms", "3 Results", "Closing Remarks"]
    );
}

#[tokio::test]
async fn half_numbered_falls_back_to_font_size() {
    let candidates = vec![
        HeadingCandidate::new("1 Overview", 0),
        HeadingCandidate::new("Part Two", 3),
        HeadingCandidate::new("2 Details", 5),
        HeadingCandidate::new("A Side Note", 7),
    ];
    let doc = FakeDocument::uniform("half", 10, 100)
        .font("1 Overview", 18.0)
        .font("Part Two", 24.0)
        .font("2 Details", 18.0)
        .font("A Side Note", 12.0)
        .shared();
    let analyzer = ScriptedAnalyzer::returning(candidates);
    let r = resolver(config(None), &analyzer);

    let outline = r.resolve_outline(doc).await.unwrap();

    assert_eq!(
        outline.source,
        OutlineSource::Inferred {
            strategy: HierarchyStrategy::FontSize
        }
    );
    let depths: Vec<(u32, &str)> = outline
        .entries
        .iter()
        .map(|e| (e.depth, e.title.as_str()))
        .collect();
    assert_eq!(
        depths,
        vec![(2, "1 Overview"), (1, "Part Two"), (2, "2 Details"), (2, "A Side Note")]
    );
}

#[tokio::test]
async fn analyzer_font_sizes_take_precedence_over_document_lookup() {
    let candidates = vec![
        HeadingCandidate::new("Deep Learning Survey", 0).with_font_size(22.0),
        HeadingCandidate::new("Convolutional Models", 2).with_font_size(14.0),
        HeadingCandidate::new("Recurrent Models", 4),
        HeadingCandidate::new("Outlook", 6).with_font_size(14.0),
    ];
    // The document disagrees for hinted lines; only the unhinted one is looked up.
    let doc = FakeDocument::uniform("hinted", 8, 100)
        .font("Convolutional Models", 40.0)
        .font("Recurrent Models", 22.0)
        .shared();
    let analyzer = ScriptedAnalyzer::returning(candidates);
    let r = resolver(config(None), &analyzer);

    let outline = r.resolve_outline(doc).await.unwrap();

    assert_eq!(
        outline.source,
        OutlineSource::Inferred {
            strategy: HierarchyStrategy::FontSize
        }
    );
    let depths: Vec<(u32, &str)> = outline
        .entries
        .iter()
        .map(|e| (e.depth, e.title.as_str()))
        .collect();
    assert_eq!(
        depths,
        vec![
            (1, "Deep Learning Survey"),
            (2, "Convolutional Models"),
            (1, "Recurrent Models"),
            (2, "Outlook"),
        ]
    );
}

#[tokio::test]
async fn oversized_chapter_without_children_is_chunked() {
    // 200 pages × 100 tokens, budget a tenth of that.
    let doc = FakeDocument::uniform("long-c", 200, 400)
        .bookmarks(&[(1, "Chapter 1", 1)])
        .shared();
    let cfg = ResolverConfig::builder()
        .min_coverage(0.0)
        .max_size(Some(2_000))
        .build()
        .unwrap();
    let analyzer = ScriptedAnalyzer::returning(Vec::new());
    let r = resolver(cfg, &analyzer);

    let res = r.resolve(doc).await.unwrap();

    assert_eq!(res.sections.len(), 10);
    for (i, s) in res.sections.iter().enumerate() {
        assert_eq!(s.title, format!("Chapter 1 (part {})", i + 1));
        assert_eq!(s.page_count(), 20);
        assert!(matches!(s.depth, SectionDepth::Chunk { level: 1, .. }));
    }
    verify_tiling(&res.sections, 0, 199).unwrap();
}

#[test]
fn web_markdown_splits_into_intro_and_sections() {
    let out = split_by_headings("intro text\n## A\nbody a\n## B\nbody b", 2);
    assert_eq!(
        out,
        vec![
            WebSection::new("Introduction", "intro text"),
            WebSection::new("A", "body a"),
            WebSection::new("B", "body b"),
        ]
    );
}

// ── Coverage boundary ────────────────────────────────────────────────────────

#[tokio::test]
async fn coverage_exactly_at_threshold_is_trusted() {
    // Highest bookmark on page index 3 of 10 → 0.3.
    let doc = FakeDocument::uniform("edge", 10, 100)
        .bookmarks(&[(1, "Chapter 1", 1), (1, "Chapter 2", 4)])
        .shared();
    let analyzer = ScriptedAnalyzer::returning(vec![HeadingCandidate::new("Inferred", 0)]);
    let r = resolver(config(None), &analyzer);

    let outline = r.resolve_outline(doc).await.unwrap();
    assert!(matches!(outline.source, OutlineSource::Embedded { coverage } if coverage == 0.3));
    assert_eq!(analyzer.calls(), 0);
}

#[tokio::test]
async fn coverage_below_threshold_triggers_inference() {
    let doc = FakeDocument::uniform("short-toc", 10, 100)
        .bookmarks(&[(1, "Contents", 1), (1, "Chapter 1", 3)])
        .shared();
    let analyzer = ScriptedAnalyzer::returning(vec![
        HeadingCandidate::new("1 Getting Started", 2),
        HeadingCandidate::new("2 Going Further", 6),
    ]);
    let r = resolver(config(None), &analyzer);

    let res = r.resolve(doc).await.unwrap();
    assert_eq!(analyzer.calls(), 1);
    assert!(matches!(res.outline_source, OutlineSource::Inferred { .. }));
    let titles: Vec<&str> = res.sections.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["1 Getting Started", "2 Going Further"]);
    assert_eq!((res.sections[0].start_page, res.sections[1].end_page), (2, 9));
}

// ── No outline at all ────────────────────────────────────────────────────────

#[tokio::test]
async fn no_headings_anywhere_is_one_section() {
    let doc = FakeDocument::uniform("plain", 12, 100).shared();
    let analyzer = ScriptedAnalyzer::returning(vec![
        // All noise: too short, a math label, and a running header seen 3 times.
        HeadingCandidate::new("ab", 0),
        HeadingCandidate::new("f(x)", 1),
        HeadingCandidate::new("Journal of Things", 2),
        HeadingCandidate::new("Journal of Things", 3),
        HeadingCandidate::new("Journal of Things", 4),
    ]);
    let r = resolver(config(None), &analyzer);

    let res = r.resolve(doc).await.unwrap();
    assert_eq!(res.outline_source, OutlineSource::None);
    assert!(res.entries.is_empty());
    assert_eq!(res.sections.len(), 1);
    assert_eq!(res.sections[0].title, "Full Document");
    assert_eq!((res.sections[0].start_page, res.sections[0].end_page), (0, 11));
}

// ── Caching ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn outline_is_resolved_once_per_document() {
    let doc = FakeDocument::uniform("cached", 10, 100).shared();
    let analyzer = ScriptedAnalyzer::returning(vec![
        HeadingCandidate::new("1 First", 0),
        HeadingCandidate::new("2 Second", 5),
    ]);
    let r = resolver(config(None), &analyzer);

    r.resolve_outline(Arc::clone(&doc)).await.unwrap();
    r.resolve_content_range(Arc::clone(&doc)).await.unwrap();
    r.resolve(Arc::clone(&doc)).await.unwrap();
    assert_eq!(analyzer.calls(), 1);
    assert_eq!(r.outline_cache().len(), 1);

    let other = FakeDocument::uniform("other", 10, 100).shared();
    r.resolve(other).await.unwrap();
    assert_eq!(analyzer.calls(), 2);

    r.outline_cache().clear();
    r.resolve(doc).await.unwrap();
    assert_eq!(analyzer.calls(), 3);
}

#[tokio::test]
async fn concurrent_first_access_runs_inference_once() {
    let doc = FakeDocument::uniform("racy", 10, 100).shared();
    let analyzer = Arc::new(ScriptedAnalyzer {
        candidates: vec![HeadingCandidate::new("1 Only Chapter", 0)],
        delay: Some(Duration::from_millis(50)),
        ..Default::default()
    });
    let r = resolver(config(None), &analyzer);

    let results = join_all((0..8).map(|_| r.resolve(Arc::clone(&doc)))).await;

    assert!(results.iter().all(|res| res.is_ok()));
    assert_eq!(analyzer.calls(), 1);
}

// ── Error propagation ────────────────────────────────────────────────────────

#[tokio::test]
async fn layout_failure_is_fatal_and_not_cached() {
    let doc = FakeDocument::uniform("broken-model", 10, 100).shared();
    let analyzer = ScriptedAnalyzer::failing();
    let r = resolver(config(None), &analyzer);

    let err = r.resolve(Arc::clone(&doc)).await.unwrap_err();
    assert!(matches!(err, ResolveError::LayoutAnalysisFailed { page: Some(2), .. }));
    assert!(r.outline_cache().is_empty());

    // A retry runs the analyser again instead of serving a cached failure.
    r.resolve(doc).await.unwrap_err();
    assert_eq!(analyzer.calls(), 2);
}

#[tokio::test]
async fn unreadable_document_is_reported() {
    let doc = FakeDocument::uniform("corrupt", 10, 100).unreadable().shared();
    let analyzer = ScriptedAnalyzer::returning(Vec::new());
    let r = resolver(config(None), &analyzer);

    let err = r.resolve(doc).await.unwrap_err();
    assert!(matches!(err, ResolveError::DocumentUnreadable { .. }));
    assert_eq!(analyzer.calls(), 0);

    // Other documents are unaffected.
    let fine = FakeDocument::uniform("fine", 4, 100)
        .bookmarks(&[(1, "Chapter 1", 1), (1, "Chapter 2", 3)])
        .shared();
    assert_eq!(r.resolve(fine).await.unwrap().sections.len(), 2);
}

// ── Tiling and budget ────────────────────────────────────────────────────────

#[tokio::test]
async fn subdivided_sections_tile_and_fit() {
    // 60 pages × 100 tokens; two chapters with sections, budget 1 000.
    let doc = FakeDocument::uniform("nested", 60, 400)
        .bookmarks(&[
            (1, "Contents", 1),
            (1, "Chapter 1", 3),
            (2, "1.1 Start", 3),
            (2, "1.2 Middle", 10),
            (2, "1.3 End", 20),
            (1, "Chapter 2", 31),
            (2, "2.1 Alpha", 35),
            (1, "Bibliography", 59),
        ])
        .shared();
    let cfg = ResolverConfig::builder()
        .max_size(Some(1_000))
        .build()
        .unwrap();
    let analyzer = ScriptedAnalyzer::returning(Vec::new());
    let r = resolver(cfg, &analyzer);

    let res = r.resolve(Arc::clone(&doc)).await.unwrap();
    let range = &res.content_range;
    assert_eq!((range.start_page, range.end_page), (2, 57));

    verify_tiling(&res.sections, range.start_page, range.end_page).unwrap();
    let estimator = PageSizeEstimator::new(doc.page_char_counts().unwrap());
    for s in &res.sections {
        assert!(
            estimator.estimate(s.start_page, s.end_page) <= 1_000 || s.is_single_page(),
            "{} is over budget",
            s.title
        );
    }

    assert_eq!(res.sections[0].title, "1.1 Start");
    assert!(res.sections.iter().any(|s| s.title == "Chapter 2"));
    assert!(res.sections.iter().any(|s| s.title.starts_with("2.1 Alpha (part")));

    let again = subdivide(res.sections.clone(), &res.entries, &estimator, 1_000).unwrap();
    assert_eq!(again, res.sections);
}

#[tokio::test]
async fn extract_joins_page_text() {
    let texts = (0..6).map(|i| format!("text of page {}", i + 1)).collect();
    let doc = FakeDocument::with_texts("texty", texts)
        .bookmarks(&[(1, "Cover", 1), (1, "Chapter 1", 2), (1, "Chapter 2", 4), (1, "Index", 6)])
        .shared();
    let analyzer = ScriptedAnalyzer::returning(Vec::new());
    let r = resolver(config(None), &analyzer);

    let sections = r.extract(doc).await.unwrap();
    assert_eq!(sections.len(), 2);
    assert_eq!(sections[0].title, "Chapter 1");
    assert_eq!(sections[0].content, "text of page 2\n\ntext of page 3");
    assert_eq!(sections[1].content, "text of page 4\n\ntext of page 5");
}
