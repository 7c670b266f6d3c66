//! HTML → markdown through an html5ever parse tree.
//!
//! The page is parsed into a small reference-counted DOM ([`HtmlSink`] is
//! the html5ever [`TreeSink`] that builds it), then one content root is
//! chosen and rendered:
//!
//! 1. the first `<main>`, when the page has one
//! 2. otherwise every outermost `<article>`, in document order
//! 3. otherwise `<body>`, with page chrome (`nav`, `header`, `footer`,
//!    `aside`) skipped
//!
//! Inside a `<main>` or `<article>` nothing but non-text elements (scripts,
//! styles, forms, embedded media) is dropped, so an article's own `<header>`
//! keeps its title. `<head>` is never rendered.

use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{parse_document, Attribute, ParseOpts, QualName};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

// ── DOM ──────────────────────────────────────────────────────────────────────

type Handle = Rc<Node>;

struct Node {
    parent: RefCell<Option<Weak<Node>>>,
    children: RefCell<Vec<Handle>>,
    data: NodeData,
}

enum NodeData {
    Document,
    Element(QualName),
    Text(RefCell<String>),
    /// Comments, processing instructions: kept in the tree, never rendered.
    Other,
}

impl Node {
    fn new(data: NodeData) -> Handle {
        Rc::new(Self {
            parent: RefCell::new(None),
            children: RefCell::new(Vec::new()),
            data,
        })
    }

    fn tag(&self) -> Option<&str> {
        match &self.data {
            NodeData::Element(name) => Some(&*name.local),
            _ => None,
        }
    }

    fn parent(&self) -> Option<Handle> {
        self.parent.borrow().as_ref().and_then(Weak::upgrade)
    }
}

fn detach(target: &Handle) {
    let parent = target.parent.borrow_mut().take().and_then(|w| w.upgrade());
    if let Some(parent) = parent {
        parent.children.borrow_mut().retain(|c| !Rc::ptr_eq(c, target));
    }
}

fn append_node(parent: &Handle, child: Handle) {
    detach(&child);
    *child.parent.borrow_mut() = Some(Rc::downgrade(parent));
    parent.children.borrow_mut().push(child);
}

fn text_node(text: &str) -> Handle {
    Node::new(NodeData::Text(RefCell::new(text.to_string())))
}

// ── Tree sink ────────────────────────────────────────────────────────────────

/// html5ever tree sink producing the [`Node`] tree.
///
/// Adjacent text is merged into one node. Attributes, doctype and quirks
/// mode are discarded: rendering only needs tag names and text.
struct HtmlSink {
    document: Handle,
}

impl Default for HtmlSink {
    fn default() -> Self {
        Self {
            document: Node::new(NodeData::Document),
        }
    }
}

impl TreeSink for HtmlSink {
    type Handle = Handle;
    type Output = Handle;
    type ElemName<'a>
        = &'a QualName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        self.document
    }

    fn parse_error(&self, _msg: Cow<'static, str>) {}

    fn get_document(&self) -> Self::Handle {
        Rc::clone(&self.document)
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a> {
        static NONE: QualName = QualName {
            prefix: None,
            ns: html5ever::ns!(),
            local: html5ever::local_name!(""),
        };
        match &target.data {
            NodeData::Element(name) => name,
            _ => &NONE,
        }
    }

    fn create_element(
        &self,
        name: QualName,
        _attrs: Vec<Attribute>,
        _flags: ElementFlags,
    ) -> Self::Handle {
        Node::new(NodeData::Element(name))
    }

    fn create_comment(&self, _text: StrTendril) -> Self::Handle {
        Node::new(NodeData::Other)
    }

    fn create_pi(&self, _target: StrTendril, _data: StrTendril) -> Self::Handle {
        Node::new(NodeData::Other)
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        match child {
            NodeOrText::AppendNode(node) => append_node(parent, node),
            NodeOrText::AppendText(text) => {
                if let Some(last) = parent.children.borrow().last() {
                    if let NodeData::Text(contents) = &last.data {
                        contents.borrow_mut().push_str(&text);
                        return;
                    }
                }
                append_node(parent, text_node(&text));
            }
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        if element.parent().is_some() {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        _name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        Rc::clone(target)
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        Rc::ptr_eq(x, y)
    }

    fn set_quirks_mode(&self, _mode: QuirksMode) {}

    fn append_before_sibling(&self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        let Some(parent) = sibling.parent() else {
            return;
        };
        let child = match new_node {
            NodeOrText::AppendNode(node) => {
                detach(&node);
                node
            }
            NodeOrText::AppendText(text) => text_node(&text),
        };

        let mut children = parent.children.borrow_mut();
        let index = children
            .iter()
            .position(|c| Rc::ptr_eq(c, sibling))
            .unwrap_or(children.len());
        if let NodeData::Text(new_text) = &child.data {
            if let Some(NodeData::Text(prev)) = index.checked_sub(1).map(|i| &children[i].data) {
                prev.borrow_mut().push_str(&new_text.borrow());
                return;
            }
        }
        *child.parent.borrow_mut() = Some(Rc::downgrade(&parent));
        children.insert(index, child);
    }

    fn add_attrs_if_missing(&self, _target: &Self::Handle, _attrs: Vec<Attribute>) {}

    fn remove_from_parent(&self, target: &Self::Handle) {
        detach(target);
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let children = std::mem::take(&mut *node.children.borrow_mut());
        for child in children {
            *child.parent.borrow_mut() = Some(Rc::downgrade(new_parent));
            new_parent.children.borrow_mut().push(child);
        }
    }
}

fn parse_html(html: &str) -> Handle {
    parse_document(HtmlSink::default(), ParseOpts::default())
        .from_utf8()
        .one(html.as_bytes())
}

// ── Content roots ────────────────────────────────────────────────────────────

fn find_first(handle: &Handle, tag: &str) -> Option<Handle> {
    if handle.tag() == Some(tag) {
        return Some(Rc::clone(handle));
    }
    handle
        .children
        .borrow()
        .iter()
        .find_map(|child| find_first(child, tag))
}

fn outermost_articles(handle: &Handle, found: &mut Vec<Handle>) {
    if handle.tag() == Some("article") {
        found.push(Rc::clone(handle));
        return;
    }
    for child in handle.children.borrow().iter() {
        outermost_articles(child, found);
    }
}

/// Subtrees to render, and whether page chrome must be skipped inside them.
fn content_roots(document: &Handle) -> (Vec<Handle>, bool) {
    if let Some(main) = find_first(document, "main") {
        return (vec![main], false);
    }
    let mut articles = Vec::new();
    outermost_articles(document, &mut articles);
    if !articles.is_empty() {
        return (articles, false);
    }
    let body = find_first(document, "body").unwrap_or_else(|| Rc::clone(document));
    (vec![body], true)
}

// ── Rendering ────────────────────────────────────────────────────────────────

/// Elements that never carry article text.
const NON_TEXT: &[&str] = &[
    "head", "script", "style", "noscript", "template", "svg", "canvas", "iframe", "object",
    "form", "button", "select",
];

/// Page chrome, skipped only when rendering the whole body.
const PAGE_CHROME: &[&str] = &["nav", "header", "footer", "aside"];

const BLOCKS: &[&str] = &[
    "p", "div", "section", "article", "main", "header", "footer", "nav", "aside", "blockquote",
    "pre", "table", "tr", "ul", "ol", "dl", "dt", "dd", "figure", "figcaption", "hr", "address",
    "details", "summary",
];

fn heading_level(tag: &str) -> Option<usize> {
    match tag {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

fn collapse_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn text_content(handle: &Handle, out: &mut String) {
    if let NodeData::Text(contents) = &handle.data {
        out.push_str(&contents.borrow());
        return;
    }
    if handle.tag().is_some_and(|t| NON_TEXT.contains(&t)) {
        return;
    }
    for child in handle.children.borrow().iter() {
        text_content(child, out);
    }
}

struct MarkdownWriter {
    out: String,
    skip_chrome: bool,
    pre_depth: usize,
}

impl MarkdownWriter {
    fn block_break(&mut self) {
        self.out.push_str("\n\n");
    }

    fn push_text(&mut self, text: &str) {
        if self.pre_depth > 0 {
            self.out.push_str(text);
            return;
        }
        let mut last_space = self.out.ends_with([' ', '\n']);
        for c in text.chars() {
            if c.is_whitespace() {
                if !last_space {
                    self.out.push(' ');
                    last_space = true;
                }
            } else {
                self.out.push(c);
                last_space = false;
            }
        }
    }

    fn render(&mut self, handle: &Handle) {
        match &handle.data {
            NodeData::Text(contents) => {
                self.push_text(&contents.borrow());
                return;
            }
            NodeData::Other => return,
            NodeData::Document | NodeData::Element(_) => {}
        }
        let tag = handle.tag();

        if let Some(tag) = tag {
            if NON_TEXT.contains(&tag) || (self.skip_chrome && PAGE_CHROME.contains(&tag)) {
                return;
            }
            if let Some(level) = heading_level(tag) {
                let mut text = String::new();
                text_content(handle, &mut text);
                let text = collapse_spaces(&text);
                if !text.is_empty() {
                    self.block_break();
                    self.out.push_str(&"#".repeat(level));
                    self.out.push(' ');
                    self.out.push_str(&text);
                    self.block_break();
                }
                return;
            }
            match tag {
                "br" => self.out.push('\n'),
                "li" => self.out.push_str("\n- "),
                "td" | "th" => self.out.push(' '),
                _ if BLOCKS.contains(&tag) => self.block_break(),
                _ => {}
            }
        }

        let is_pre = tag == Some("pre");
        if is_pre {
            self.pre_depth += 1;
        }
        for child in handle.children.borrow().iter() {
            self.render(child);
        }
        if is_pre {
            self.pre_depth -= 1;
        }
        if tag.is_some_and(|t| BLOCKS.contains(&t)) {
            self.block_break();
        }
    }
}

/// Convert an HTML document into markdown text.
///
/// Headings become `#`..`######` lines, list items `- ` lines, block
/// elements paragraphs. Entities are decoded by the parser.
pub fn html_to_markdown(html: &str) -> String {
    let document = parse_html(html);
    let (roots, skip_chrome) = content_roots(&document);

    let mut writer = MarkdownWriter {
        out: String::new(),
        skip_chrome,
        pre_depth: 0,
    };
    for root in &roots {
        writer.render(root);
        writer.block_break();
    }
    tidy_whitespace(&writer.out)
}

static RE_BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("static regex"));

static RE_INLINE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").expect("static regex"));

fn tidy_whitespace(input: &str) -> String {
    let normalised = input.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<String> = normalised
        .lines()
        .map(|line| RE_INLINE_SPACES.replace_all(line.trim(), " ").into_owned())
        .collect();
    let joined = lines.join("\n");
    RE_BLANK_RUN.replace_all(&joined, "\n\n").trim().to_string()
}
