//! Fetch a web page and reduce it to markdown.
//!
//! Markdown and plain-text responses are used as served. HTML is parsed and
//! rendered by [`html_to_markdown`].

use crate::error::ResolveError;
use crate::web::html::html_to_markdown;
use std::time::Duration;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("edgequake-sections/", env!("CARGO_PKG_VERSION"));

/// Download `url` and return its main text as markdown.
///
/// Network failures and non-success statuses are [`ResolveError::FetchFailed`];
/// a page that yields no text is [`ResolveError::NoExtractableContent`].
pub async fn fetch_url_content(url: &str, timeout_secs: u64) -> Result<String, ResolveError> {
    let failed = |reason: String| ResolveError::FetchFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| failed(e.to_string()))?;

    info!("Fetching {}", url);
    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            failed(format!("timed out after {timeout_secs}s"))
        } else {
            failed(e.to_string())
        }
    })?;
    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();
    let body = response.text().await.map_err(|e| failed(e.to_string()))?;

    let markdown = if is_html(&content_type, &body) {
        debug!("Converting {} bytes of HTML from {}", body.len(), url);
        html_to_markdown(&body)
    } else {
        body.trim().to_string()
    };

    if markdown.is_empty() {
        return Err(ResolveError::NoExtractableContent {
            url: url.to_string(),
        });
    }
    Ok(markdown)
}

fn is_html(content_type: &str, body: &str) -> bool {
    if content_type.contains("html") {
        return true;
    }
    if content_type.contains("markdown") || content_type.starts_with("text/plain") {
        return false;
    }
    let head = body.trim_start().get(..64).unwrap_or(body.trim_start());
    let head = head.to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}
