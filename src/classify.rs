//! Entry classification: front matter, back matter, preamble or content.
//!
//! Each title is matched case-insensitively against an ordered pattern table.
//! Categories are tried in priority order (front, back, preamble); the first
//! match wins and anything unmatched is content. Classification looks at one
//! entry at a time and never at its neighbours, so it is pure and total.
//!
//! The table is part of the public contract: callers can extend any category
//! with [`EntryClassifier::with_pattern`].

use crate::error::ResolveError;
use crate::output::{ClassifiedEntry, EntryKind, OutlineEntry};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

/// Titles that open non-content pages before the body.
pub const FRONT_MATTER_PATTERNS: &[&str] = &[
    r"^cover$",
    r"^half\s*title",
    r"^title\s*page",
    r"^copyright",
    r"^table\s*of\s*contents$",
    r"^contents$",
    r"^list\s*of\s*(figures|tables|illustrations)",
    r"^dedication",
    r"^epigraph",
    r"^praise\b",
    r"^endorsements?$",
    r"^also\s*by\b",
    r"^about\s*the\s*cover",
];

/// Titles that open non-content pages after the body.
pub const BACK_MATTER_PATTERNS: &[&str] = &[
    r"^index$",
    r"^glossary$",
    r"^bibliography$",
    r"^references$",
    r"^about\s*the\s*authors?$",
    r"^colophon$",
    r"^appendix",
];

/// Content even though it appears before chapter one.
pub const PREAMBLE_PATTERNS: &[&str] = &[
    r"^foreword",
    r"^preface",
    r"^introduction$",
    r"^acknowledgments?$",
];

static DEFAULT_CLASSIFIER: Lazy<EntryClassifier> = Lazy::new(|| {
    let compile_all = |patterns: &[&str]| -> Vec<Regex> {
        patterns
            .iter()
            .map(|p| compile(p).expect("built-in classification pattern is valid"))
            .collect()
    };
    EntryClassifier {
        front: compile_all(FRONT_MATTER_PATTERNS),
        back: compile_all(BACK_MATTER_PATTERNS),
        preamble: compile_all(PREAMBLE_PATTERNS),
    }
});

fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

/// Ordered, case-insensitive title patterns for the three non-default kinds.
#[derive(Debug, Clone)]
pub struct EntryClassifier {
    front: Vec<Regex>,
    back: Vec<Regex>,
    preamble: Vec<Regex>,
}

impl Default for EntryClassifier {
    fn default() -> Self {
        DEFAULT_CLASSIFIER.clone()
    }
}

impl EntryClassifier {
    /// Append a pattern to one category. Patterns are matched against the
    /// trimmed title, case-insensitively; anchor them yourself.
    ///
    /// `EntryKind::Content` is the fallback and takes no patterns.
    pub fn with_pattern(mut self, kind: EntryKind, pattern: &str) -> Result<Self, ResolveError> {
        let re = compile(pattern).map_err(|source| ResolveError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        match kind {
            EntryKind::Front => self.front.push(re),
            EntryKind::Back => self.back.push(re),
            EntryKind::Preamble => self.preamble.push(re),
            EntryKind::Content => {
                return Err(ResolveError::InvalidConfig(
                    "content is the fallback kind and cannot take patterns".into(),
                ))
            }
        }
        Ok(self)
    }

    /// Classify a title.
    pub fn classify_title(&self, title: &str) -> EntryKind {
        let title = title.trim();
        let ordered = [
            (EntryKind::Front, &self.front),
            (EntryKind::Back, &self.back),
            (EntryKind::Preamble, &self.preamble),
        ];
        for (kind, patterns) in ordered {
            if patterns.iter().any(|re| re.is_match(title)) {
                return kind;
            }
        }
        EntryKind::Content
    }

    pub fn classify(&self, entry: &OutlineEntry) -> EntryKind {
        self.classify_title(&entry.title)
    }

    /// Classify a whole outline, keeping order.
    pub fn classify_all(&self, entries: &[OutlineEntry]) -> Vec<ClassifiedEntry> {
        entries
            .iter()
            .map(|e| ClassifiedEntry {
                kind: self.classify(e),
                entry: e.clone(),
            })
            .collect()
    }
}

/// Classify with the default pattern table.
pub fn classify(entry: &OutlineEntry) -> EntryKind {
    DEFAULT_CLASSIFIER.classify(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(title: &str) -> EntryKind {
        classify(&OutlineEntry::new(1, title, 0))
    }

    #[test]
    fn front_matter() {
        for title in [
            "Cover",
            "cover",
            "Half Title",
            "Title Page",
            "Copyright",
            "Table of Contents",
            "Contents",
            "List of Figures",
            "List of Tables",
            "Dedication",
            "Epigraph",
            "Praise for the Book",
            "Endorsements",
            "Also by Author",
            "About the Cover",
        ] {
            assert_eq!(kind_of(title), EntryKind::Front, "{title}");
        }
    }

    #[test]
    fn back_matter() {
        for title in [
            "Index",
            "Glossary",
            "Bibliography",
            "References",
            "About the Author",
            "About the Authors",
            "Colophon",
            "Appendix A",
        ] {
            assert_eq!(kind_of(title), EntryKind::Back, "{title}");
        }
    }

    #[test]
    fn preamble() {
        for title in ["Foreword", "Preface", "Introduction", "Acknowledgments", "acknowledgment"] {
            assert_eq!(kind_of(title), EntryKind::Preamble, "{title}");
        }
    }

    #[test]
    fn content() {
        for title in [
            "Chapter 1: Getting Started",
            "1. Foundations",
            "Part I",
            "Data Pipelines",
            "Advanced Topics",
            // Anchored: only a bare "Introduction" is preamble.
            "Introduction to Rust",
            "Coverage Analysis",
        ] {
            assert_eq!(kind_of(title), EntryKind::Content, "{title}");
        }
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!(kind_of("  Index \n"), EntryKind::Back);
    }

    #[test]
    fn front_wins_over_back() {
        let c = EntryClassifier::default()
            .with_pattern(EntryKind::Back, "^contents$")
            .unwrap();
        assert_eq!(c.classify_title("Contents"), EntryKind::Front);
    }

    #[test]
    fn custom_pattern_extends_category() {
        let c = EntryClassifier::default()
            .with_pattern(EntryKind::Back, r"^endnotes$")
            .unwrap();
        assert_eq!(c.classify_title("ENDNOTES"), EntryKind::Back);
        // The default table is untouched.
        assert_eq!(kind_of("Endnotes"), EntryKind::Content);
    }

    #[test]
    fn invalid_or_content_patterns_rejected() {
        assert!(matches!(
            EntryClassifier::default().with_pattern(EntryKind::Front, "(unclosed"),
            Err(ResolveError::InvalidPattern { .. })
        ));
        assert!(matches!(
            EntryClassifier::default().with_pattern(EntryKind::Content, "^x$"),
            Err(ResolveError::InvalidConfig(_))
        ));
    }

    #[test]
    fn classification_is_deterministic() {
        let entries = vec![
            OutlineEntry::new(1, "Cover", 0),
            OutlineEntry::new(1, "Chapter 1", 5),
            OutlineEntry::new(1, "Index", 40),
        ];
        let c = EntryClassifier::default();
        let first = c.classify_all(&entries);
        let second = c.classify_all(&entries);
        assert_eq!(first, second);
        let kinds: Vec<_> = first.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EntryKind::Front, EntryKind::Content, EntryKind::Back]);
    }
}
