//! Heading anchors and the table of contents.

use std::collections::HashSet;
use std::fmt::Write;
use std::sync::LazyLock;

use regex::Regex;

use crate::macros::Placement;
use crate::sanitize::{decode_entities, escape_html, strip_tags};

static NON_ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\s\-\w]").unwrap());

static SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+(?:-+\s*)?").unwrap());

/// Deepest heading level listed in the table of contents.
const TOC_MAX_LEVEL: u8 = 4;

/// Turn text into an anchor name.
///
/// Removes everything but word characters, whitespace and hyphens, then
/// collapses whitespace (with any hyphens after it) into a single hyphen.
///
/// ```ignore
/// assert_eq!(sanitize_anchor("Title - with dash"), "Title-with-dash");
/// ```
pub fn sanitize_anchor(text: &str) -> String {
    let cleaned = NON_ANCHOR_RE.replace_all(text, "");
    SEPARATOR_RE.replace_all(&cleaned, "-").into_owned()
}

/// A heading of the rendered document.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HeadingEntry {
    /// Heading level (1-6).
    pub level: u8,
    /// Heading text without markup.
    pub title: String,
    /// Anchor name, unique within the document.
    pub anchor: String,
    /// Position among the document's headings, starting at 1.
    pub index: usize,
}

/// Hands out unique anchor names for one document.
#[derive(Debug, Default)]
pub(crate) struct AnchorNamer {
    used: HashSet<String>,
}

impl AnchorNamer {
    /// Return `base`, or `base-2`, `base-3`, ... if already taken.
    pub fn unique(&mut self, base: String) -> String {
        if self.used.insert(base.clone()) {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}-{n}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Anchor of a heading on the page titled `page_title` when pages are
/// exported into one document.
pub(crate) fn page_anchor(page_title: &str, anchor: &str) -> String {
    format!("{}_{anchor}", sanitize_anchor(page_title))
}

/// Plain text of a rendered heading.
pub(crate) fn heading_text(inner_html: &str) -> String {
    decode_entities(&strip_tags(inner_html)).trim().to_owned()
}

struct TocNode<'a> {
    entry: Option<&'a HeadingEntry>,
    children: Vec<TocNode<'a>>,
}

impl<'a> TocNode<'a> {
    fn insert(nodes: &mut Vec<TocNode<'a>>, depth: usize, entry: &'a HeadingEntry) {
        if depth == 0 {
            nodes.push(TocNode {
                entry: Some(entry),
                children: Vec::new(),
            });
            return;
        }
        if nodes.is_empty() {
            // Level gap: hold the deeper entry in an empty item.
            nodes.push(TocNode {
                entry: None,
                children: Vec::new(),
            });
        }
        if let Some(last) = nodes.last_mut() {
            Self::insert(&mut last.children, depth - 1, entry);
        }
    }

    fn render(nodes: &[TocNode<'_>], out: &mut String) {
        for node in nodes {
            out.push_str("<li>");
            if let Some(entry) = node.entry {
                let _ = write!(
                    out,
                    "<a href=\"#{}\">{}</a>",
                    escape_html(&entry.anchor),
                    escape_html(&entry.title)
                );
            }
            if !node.children.is_empty() {
                out.push_str("<ul>");
                Self::render(&node.children, out);
                out.push_str("</ul>");
            }
            out.push_str("</li>");
        }
    }
}

/// Render the table of contents as nested lists.
///
/// Headings deeper than level 4 are left out. Returns an empty string when
/// there is nothing to list.
pub(crate) fn render_toc(headings: &[HeadingEntry], placement: Option<Placement>) -> String {
    let listed: Vec<&HeadingEntry> = headings
        .iter()
        .filter(|h| h.level <= TOC_MAX_LEVEL)
        .collect();
    let Some(min_level) = listed.iter().map(|h| h.level).min() else {
        return String::new();
    };

    let mut roots = Vec::new();
    for entry in listed {
        TocNode::insert(&mut roots, usize::from(entry.level - min_level), entry);
    }

    let class = match placement {
        Some(Placement::Left) => "toc left",
        Some(Placement::Right) => "toc right",
        None => "toc",
    };
    let mut out = format!("<ul class=\"{class}\">");
    TocNode::render(&roots, &mut out);
    out.push_str("</ul>");
    out
}
