//! Prompts for VLM-based heading detection.
//!
//! The vision model plays the role of a layout analyser: it looks at one
//! rendered page and reports the lines it would tag as a document title or a
//! section header. Hierarchy is not asked for; depth is assigned afterwards
//! from section numbering or rendered font size.

/// System prompt sent with every page image.
pub const HEADING_DETECTION_PROMPT: &str = r#"You are a document layout analyser. You receive one rendered page of a PDF document.

List every line on the page that is a heading: the document title, or the header of a chapter, section or subsection.

Rules:
- Copy each heading's text exactly as printed, including any section number such as "3.1.2".
- Keep the order in which the headings appear on the page, top to bottom.
- Use the label "title" for the document or chapter title and "section_header" for every other heading.
- Do NOT report running headers or footers, page numbers, figure or table captions, axis labels, or bold words inside a paragraph.
- If the page has no heading, return an empty list.

Respond with JSON only, no commentary and no code fences:
{"headings": [{"text": "3.1 Results", "label": "section_header"}]}"#;

/// The user turn that accompanies the page image.
pub fn page_message(page_num: usize, total_pages: usize) -> String {
    format!(
        "Page {} of {}. Return the headings on this page as JSON.",
        page_num, total_pages
    )
}
