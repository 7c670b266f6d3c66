//! Split web markdown into sections at its headings.

use crate::output::WebSection;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

/// Title used when the markdown has no heading at all.
pub const FULL_ARTICLE_TITLE: &str = "Full article";

/// Title for text before the first heading.
pub const INTRODUCTION_TITLE: &str = "Introduction";

/// Markdown has six heading levels; deeper limits behave like six.
const MAX_HEADING_LEVEL: u32 = 6;

static HEADING_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    (1..=MAX_HEADING_LEVEL)
        .map(|level| {
            RegexBuilder::new(&format!(r"^(#{{1,{level}}})\s+(.+)$"))
                .multi_line(true)
                .build()
                .expect("static regex")
        })
        .collect()
});

fn heading_pattern(max_depth: u32) -> &'static Regex {
    &HEADING_PATTERNS[(max_depth.clamp(1, MAX_HEADING_LEVEL) - 1) as usize]
}

/// Split `markdown` at headings of level `1..=max_depth`.
///
/// Deeper headings stay inside their parent's body. Text before the first
/// heading becomes an "Introduction" section; without any heading the whole
/// input is a single "Full article" section (even when empty). Sections
/// whose body is empty are dropped.
pub fn split_by_headings(markdown: &str, max_depth: u32) -> Vec<WebSection> {
    let pattern = heading_pattern(max_depth);
    let headings: Vec<regex::Captures<'_>> = pattern.captures_iter(markdown).collect();

    let Some(first) = headings.first() else {
        return vec![WebSection::new(FULL_ARTICLE_TITLE, markdown.trim())];
    };

    let mut sections = Vec::with_capacity(headings.len() + 1);

    let first_start = first.get(0).map_or(0, |m| m.start());
    let preamble = markdown[..first_start].trim();
    if !preamble.is_empty() {
        sections.push(WebSection::new(INTRODUCTION_TITLE, preamble));
    }

    for (i, caps) in headings.iter().enumerate() {
        let (Some(whole), Some(title)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        let end = headings
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(markdown.len(), |m| m.start());
        let body = markdown[whole.end()..end].trim();
        if !body.is_empty() {
            sections.push(WebSection::new(title.as_str().trim(), body));
        }
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titles(sections: &[WebSection]) -> Vec<&str> {
        sections.iter().map(|s| s.title.as_str()).collect()
    }

    #[test]
    fn intro_and_two_sections() {
        let md = "intro text\n## A\nbody a\n## B\nbody b";
        assert_eq!(
            split_by_headings(md, 2),
            vec![
                WebSection::new("Introduction", "intro text"),
                WebSection::new("A", "body a"),
                WebSection::new("B", "body b"),
            ]
        );
    }

    #[test]
    fn no_headings_is_full_article() {
        let md = "Just some plain text without any headings.";
        assert_eq!(split_by_headings(md, 2), vec![WebSection::new("Full article", md)]);
        assert_eq!(split_by_headings("", 2), vec![WebSection::new("Full article", "")]);
        // No space after the marker: not a heading.
        assert_eq!(titles(&split_by_headings("##not a heading\n\nSome text.", 2)), vec!["Full article"]);
    }

    #[test]
    fn no_introduction_when_heading_first() {
        let out = split_by_headings("# Title\n\nContent.", 1);
        assert_eq!(out, vec![WebSection::new("Title", "Content.")]);
    }

    #[test]
    fn depth_limits_split_points() {
        let md = "# Chapter 1\n\nIntro.\n\n## Section 1.1\n\nDetail.\n\n# Chapter 2\n\nMore.";
        assert_eq!(titles(&split_by_headings(md, 1)), vec!["Chapter 1", "Chapter 2"]);
        assert_eq!(
            titles(&split_by_headings(md, 2)),
            vec!["Chapter 1", "Section 1.1", "Chapter 2"]
        );

        let one = split_by_headings(md, 1);
        assert!(one[0].content.contains("## Section 1.1"));
    }

    #[test]
    fn deeper_headings_fold_in() {
        let md = "## A\n\nText.\n\n### B\n\nMore.\n\n## C\n\nEnd.";
        assert_eq!(titles(&split_by_headings(md, 2)), vec!["A", "C"]);
    }

    #[test]
    fn empty_sections_dropped() {
        let md = "# Empty\n\n# Also empty\n   \n# Real\nbody";
        assert_eq!(split_by_headings(md, 1), vec![WebSection::new("Real", "body")]);
    }

    #[test]
    fn depth_beyond_six_splits_at_every_level() {
        let md = "# A\none\n###### F\nsix";
        for depth in [6, 7, 1_000_000, u32::MAX] {
            assert_eq!(titles(&split_by_headings(md, depth)), vec!["A", "F"], "depth {depth}");
        }
    }

    #[test]
    fn depth_zero_behaves_like_one() {
        let md = "# A\none\n## B\ntwo";
        assert_eq!(split_by_headings(md, 0), split_by_headings(md, 1));
    }

    #[test]
    fn heading_text_is_trimmed() {
        let out = split_by_headings("#   Spaced title   \nbody", 1);
        assert_eq!(out[0].title, "Spaced title");
    }
}
