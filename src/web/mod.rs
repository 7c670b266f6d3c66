//! Web article inputs: fetch a page as markdown and split it at headings.

pub mod fetch;
mod html;
pub mod split;

pub use fetch::fetch_url_content;
pub use html::html_to_markdown;
pub use split::{split_by_headings, FULL_ARTICLE_TITLE, INTRODUCTION_TITLE};
