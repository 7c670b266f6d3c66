//! Input resolution: a local path, a PDF URL, or a web page URL.
//!
//! PDF URLs are downloaded because pdfium needs a file-system path. With a
//! `download_dir` the file is kept under a name derived from the URL and
//! reused on later runs; without one it lives in a `TempDir` that is removed
//! when the [`ResolvedInput`] is dropped. Magic bytes (`%PDF`) are checked
//! before anything is handed to pdfium.

use crate::error::ResolveError;
use futures::StreamExt;
use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

static GITHUB_BLOB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://github\.com/([^/]+/[^/]+)/blob/(.+)$").expect("static regex")
});

const HEAD_TIMEOUT_SECS: u64 = 10;

/// A PDF available on the local file system.
#[derive(Debug)]
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Downloaded into (or found in) the configured download directory.
    Cached(PathBuf),
    /// Downloaded to a temp directory, kept alive until drop.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) | ResolvedInput::Cached(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }
}

/// What an input string turned out to be.
pub enum InputSource {
    Pdf(ResolvedInput),
    /// A URL that does not serve a PDF.
    Web { url: String },
}

pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// `github.com/<owner>/<repo>/blob/<ref>/<path>` →
/// `raw.githubusercontent.com/<owner>/<repo>/<ref>/<path>`.
pub fn github_raw_url(url: &str) -> Option<String> {
    GITHUB_BLOB.captures(url).map(|caps| {
        format!(
            "https://raw.githubusercontent.com/{}/{}",
            &caps[1], &caps[2]
        )
    })
}

/// File name for a downloaded PDF: last URL path segment, percent-decoded,
/// `.pdf` appended when missing, everything outside `[A-Za-z0-9_.-]`
/// replaced by `_`.
pub fn download_filename(url: &str) -> String {
    let last = reqwest::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .map(|s| percent_decode_str(&s).decode_utf8_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "download.pdf".to_string());

    let mut name: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if !name.to_ascii_lowercase().ends_with(".pdf") {
        name.push_str(".pdf");
    }
    name
}

/// Resolve an input string.
///
/// Anything that is not an `http(s)` URL is a local PDF path. A URL is a PDF
/// when its path ends in `.pdf` or a HEAD request reports
/// `application/pdf`; every other URL is a web page.
pub async fn resolve_input(
    input: &str,
    timeout_secs: u64,
    download_dir: Option<&Path>,
) -> Result<InputSource, ResolveError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ResolveError::InvalidInput {
            input: input.to_string(),
        });
    }
    if !is_url(input) {
        return resolve_local(input).map(InputSource::Pdf);
    }

    let url = match github_raw_url(input) {
        Some(raw) => {
            info!("Resolved GitHub URL → {}", raw);
            raw
        }
        None => input.to_string(),
    };

    if url.to_ascii_lowercase().ends_with(".pdf") || serves_pdf(&url).await {
        let resolved = download_pdf(&url, timeout_secs, download_dir).await?;
        return Ok(InputSource::Pdf(resolved));
    }

    debug!("Treating {} as a web page", url);
    Ok(InputSource::Web { url })
}

/// Best-effort HEAD request; any failure means "not a PDF".
async fn serves_pdf(url: &str) -> bool {
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(HEAD_TIMEOUT_SECS))
        .build()
    {
        Ok(c) => c,
        Err(_) => return false,
    };
    match client.head(url).send().await {
        Ok(resp) => resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("application/pdf"))
            .unwrap_or(false),
        Err(e) => {
            debug!("HEAD {} failed: {}", url, e);
            false
        }
    }
}

/// Resolve a local file path, validating existence and PDF magic bytes.
pub fn resolve_local(path_str: &str) -> Result<ResolvedInput, ResolveError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(ResolveError::FileNotFound { path });
    }
    check_magic(&path)?;

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

fn check_magic(path: &Path) -> Result<(), ResolveError> {
    use std::io::Read;
    match std::fs::File::open(path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(ResolveError::NotAPdf {
                    path: path.to_path_buf(),
                    magic,
                });
            }
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(ResolveError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(_) => Err(ResolveError::FileNotFound {
            path: path.to_path_buf(),
        }),
    }
}

async fn download_pdf(
    url: &str,
    timeout_secs: u64,
    download_dir: Option<&Path>,
) -> Result<ResolvedInput, ResolveError> {
    let filename = download_filename(url);

    let Some(dir) = download_dir else {
        let temp_dir = TempDir::new().map_err(|e| ResolveError::Internal(e.to_string()))?;
        let path = temp_dir.path().join(&filename);
        download_to(url, &path, timeout_secs).await?;
        return Ok(ResolvedInput::Downloaded {
            path,
            _temp_dir: temp_dir,
        });
    };

    let path = dir.join(&filename);
    if path.is_file() {
        info!("Using cached PDF: {}", path.display());
        check_magic(&path)?;
        return Ok(ResolvedInput::Cached(path));
    }
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ResolveError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;
    download_to(url, &path, timeout_secs).await?;
    Ok(ResolvedInput::Cached(path))
}

/// Stream `url` into `dest` through a `.part` file, renamed once complete.
async fn download_to(url: &str, dest: &Path, timeout_secs: u64) -> Result<(), ResolveError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ResolveError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| download_error(url, timeout_secs, e))?;
    if !response.status().is_success() {
        return Err(ResolveError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let part = dest.with_extension("pdf.part");
    let written = match stream_to_file(response, &part, url, timeout_secs).await {
        Ok(written) => written,
        Err(e) => {
            discard_partial(&part).await;
            return Err(e);
        }
    };
    if let Err(e) = check_magic(&part) {
        discard_partial(&part).await;
        return Err(e);
    }
    if let Err(e) = tokio::fs::rename(&part, dest).await {
        discard_partial(&part).await;
        return Err(ResolveError::OutputWriteFailed {
            path: dest.to_path_buf(),
            source: e,
        });
    }

    info!(
        "Saved to {} ({:.1} MB)",
        dest.display(),
        written as f64 / (1u64 << 20) as f64
    );
    Ok(())
}

fn download_error(url: &str, timeout_secs: u64, e: reqwest::Error) -> ResolveError {
    if e.is_timeout() {
        ResolveError::DownloadTimeout {
            url: url.to_string(),
            secs: timeout_secs,
        }
    } else {
        ResolveError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

/// Write the response body to `part`; returns the byte count.
async fn stream_to_file(
    response: reqwest::Response,
    part: &Path,
    url: &str,
    timeout_secs: u64,
) -> Result<usize, ResolveError> {
    let write_err = |e: std::io::Error| ResolveError::OutputWriteFailed {
        path: part.to_path_buf(),
        source: e,
    };
    let mut file = tokio::fs::File::create(part).await.map_err(write_err)?;
    let mut body = response.bytes_stream();
    let mut written = 0usize;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| download_error(url, timeout_secs, e))?;
        file.write_all(&chunk).await.map_err(write_err)?;
        written += chunk.len();
    }
    file.flush().await.map_err(write_err)?;
    Ok(written)
}

async fn discard_partial(part: &Path) {
    match tokio::fs::remove_file(part).await {
        Ok(()) => debug!("Removed partial download {}", part.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove {}: {}", part.display(), e),
    }
}
