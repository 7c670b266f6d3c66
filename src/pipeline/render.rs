//! pdfium-backed [`DocumentSource`].
//!
//! pdfium wraps a C++ library with thread-local state, so every method here
//! is blocking and the resolver drives them through `spawn_blocking`. Each
//! call binds pdfium and reloads the file; the document itself is never held
//! across calls, which keeps `PdfiumDocument` `Send + Sync` without locking.
//!
//! ## Binding order
//!
//! 1. `PDFIUM_LIB_PATH`: a library file, or a directory containing one
//! 2. the platform library name in the working directory
//! 3. the system library

use crate::document::{DocumentId, DocumentSource, FontQuery, NativeBookmark};
use crate::error::ResolveError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Bind to a pdfium library.
pub fn bind_pdfium() -> Result<Pdfium, ResolveError> {
    if let Ok(path) = std::env::var("PDFIUM_LIB_PATH") {
        let pb = PathBuf::from(path);
        let lib_path = if pb.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(&pb)
        } else {
            pb
        };
        match Pdfium::bind_to_library(&lib_path) {
            Ok(bindings) => return Ok(Pdfium::new(bindings)),
            Err(e) => warn!("PDFIUM_LIB_PATH={} could not be bound: {:?}", lib_path.display(), e),
        }
    }

    let local = Pdfium::pdfium_platform_library_name_at_path("./");
    if local.exists() {
        if let Ok(bindings) = Pdfium::bind_to_library(&local) {
            return Ok(Pdfium::new(bindings));
        }
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| ResolveError::PdfiumBindingFailed(format!("{:?}", e)))
}

/// A PDF on disk, read through pdfium.
#[derive(Debug, Clone)]
pub struct PdfiumDocument {
    path: PathBuf,
    password: Option<String>,
    id: DocumentId,
    page_count: usize,
}

impl PdfiumDocument {
    /// Open and validate a PDF. Blocking: reads the whole file to compute its
    /// identity and loads it once to count pages.
    pub fn open(path: impl AsRef<Path>, password: Option<&str>) -> Result<Self, ResolveError> {
        let path = path.as_ref().to_path_buf();
        let bytes = std::fs::read(&path).map_err(|e| ResolveError::DocumentUnreadable {
            path: path.clone(),
            detail: e.to_string(),
        })?;
        let id = DocumentId::from_bytes(&bytes);
        drop(bytes);

        let pdfium = bind_pdfium()?;
        let page_count = {
            let document = load(&pdfium, &path, password)?;
            document.pages().len() as usize
        };
        info!("PDF loaded: {} pages ({})", page_count, id);

        Ok(Self {
            path,
            password: password.map(str::to_string),
            id,
            page_count,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_document<T>(
        &self,
        f: impl FnOnce(&PdfDocument<'_>) -> Result<T, ResolveError>,
    ) -> Result<T, ResolveError> {
        let pdfium = bind_pdfium()?;
        let document = load(&pdfium, &self.path, self.password.as_deref())?;
        f(&document)
    }

    fn unreadable(&self, detail: impl Into<String>) -> ResolveError {
        ResolveError::DocumentUnreadable {
            path: self.path.clone(),
            detail: detail.into(),
        }
    }
}

fn load<'a>(
    pdfium: &'a Pdfium,
    path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, ResolveError> {
    pdfium.load_pdf_from_file(path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                ResolveError::WrongPassword {
                    path: path.to_path_buf(),
                }
            } else {
                ResolveError::PasswordRequired {
                    path: path.to_path_buf(),
                }
            }
        } else {
            ResolveError::DocumentUnreadable {
                path: path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

fn normalise(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Font size of the first text run, in page order, holding the whole of
/// `wanted`. Headings split across runs fall back to the first run that is a
/// fragment (3+ chars) of it.
fn first_match_size<I>(runs: I, wanted: &str) -> Option<f32>
where
    I: IntoIterator<Item = (String, f32)>,
{
    let mut fragment = None;
    for (text, size) in runs {
        let found = normalise(&text);
        if found.is_empty() {
            continue;
        }
        if found.contains(wanted) {
            return Some(size);
        }
        if fragment.is_none() && found.chars().count() >= 3 && wanted.contains(&found) {
            fragment = Some(size);
        }
    }
    fragment
}

impl DocumentSource for PdfiumDocument {
    fn identity(&self) -> &DocumentId {
        &self.id
    }

    fn page_count(&self) -> Result<usize, ResolveError> {
        Ok(self.page_count)
    }

    fn native_outline(&self) -> Result<Vec<NativeBookmark>, ResolveError> {
        self.with_document(|document| {
            let mut out = Vec::new();
            let bookmarks = document.bookmarks();
            // Depth-first, siblings pushed after children so document order is kept.
            let mut stack: Vec<(PdfBookmark<'_>, u32)> = Vec::new();
            if let Some(root) = bookmarks.root() {
                stack.push((root, 1));
            }
            while let Some((bookmark, depth)) = stack.pop() {
                let title = bookmark.title().unwrap_or_default();
                let page_1based = bookmark
                    .destination()
                    .and_then(|d| d.page_index().ok())
                    .map(|idx| idx as i64 + 1);
                out.push(NativeBookmark {
                    depth,
                    title,
                    page_1based,
                });
                if let Some(sibling) = bookmark.next_sibling() {
                    stack.push((sibling, depth));
                }
                if let Some(child) = bookmark.first_child() {
                    stack.push((child, depth + 1));
                }
            }
            debug!("Read {} bookmark(s)", out.len());
            Ok(out)
        })
    }

    fn font_sizes(&self, queries: &[FontQuery]) -> Result<Vec<Option<f32>>, ResolveError> {
        self.with_document(|document| {
            let pages = document.pages();
            let mut sizes = Vec::with_capacity(queries.len());
            for query in queries {
                let Ok(page) = pages.get(query.page as u16) else {
                    sizes.push(None);
                    continue;
                };
                let runs = page.objects().iter().filter_map(|object| {
                    object
                        .as_text_object()
                        .map(|t| (t.text(), t.scaled_font_size().value))
                });
                sizes.push(first_match_size(runs, &normalise(&query.text)));
            }
            Ok(sizes)
        })
    }

    fn page_texts(&self, start: usize, end: usize) -> Result<Vec<String>, ResolveError> {
        if start > end || end >= self.page_count {
            return Err(self.unreadable(format!(
                "page range {}..={} outside 0..{}",
                start, end, self.page_count
            )));
        }
        self.with_document(|document| {
            let pages = document.pages();
            let mut texts = Vec::with_capacity(end - start + 1);
            for idx in start..=end {
                let page = pages
                    .get(idx as u16)
                    .map_err(|e| self.unreadable(format!("page {}: {:?}", idx + 1, e)))?;
                let text = page
                    .text()
                    .map_err(|e| self.unreadable(format!("page {} text: {:?}", idx + 1, e)))?;
                texts.push(text.all());
            }
            Ok(texts)
        })
    }

    fn render_page(&self, page: usize, max_pixels: u32) -> Result<DynamicImage, ResolveError> {
        self.with_document(|document| {
            let render_config = PdfRenderConfig::new()
                .set_target_width(max_pixels as i32)
                .set_maximum_height(max_pixels as i32);

            let pdf_page = document
                .pages()
                .get(page as u16)
                .map_err(|e| ResolveError::analysis_on_page(page, format!("{:?}", e)))?;
            let bitmap = pdf_page
                .render_with_config(&render_config)
                .map_err(|e| ResolveError::analysis_on_page(page, format!("{:?}", e)))?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                page + 1,
                image.width(),
                image.height()
            );
            Ok(image)
        })
    }
}
