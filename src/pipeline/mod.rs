//! I/O stages around the pure resolver.
//!
//! Each submodule implements exactly one step and is only reached when the
//! resolver needs it: a document with trusted bookmarks never renders a page
//! or calls a model.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ─────────────────────────▶ bookmarks, page text
//! (URL/path) (pdfium)
//!               └──▶ encode ──▶ llm ─────────▶ heading candidates
//!                    (base64)   (VLM)
//! ```
//!
//! 1. [`input`]: canonicalise the user-supplied path or URL to a local file
//! 2. [`render`]: pdfium-backed [`crate::DocumentSource`]; blocking, so it
//!    is always called through `spawn_blocking`
//! 3. [`encode`]: PNG-encode and base64-wrap a rendered page
//! 4. [`llm`]: per-page heading detection with retry and backoff

pub mod encode;
pub mod input;
pub mod llm;
pub mod render;
