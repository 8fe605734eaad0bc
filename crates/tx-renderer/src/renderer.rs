//! Render orchestration: blocks in, HTML out.

use std::fmt::Write;

use tx_lookup::Lookup;

use crate::anchor::{
    AnchorNamer, HeadingEntry, heading_text, page_anchor, render_toc, sanitize_anchor,
};
use crate::block::{Block, BlockKind, ListItem, Origin, Pre, Table, parse_blocks};
use crate::context::{RenderContext, WikiLinkMode};
use crate::highlight::Highlighter;
use crate::inline::{InlineFormatter, is_placeholder};
use crate::macros::{Macro, MacroExpander, Placement};
use crate::modifiers::Modifiers;
use crate::resolver::Resolver;
use crate::routes::{DefaultRoutes, Routes};
use crate::sanitize::{escape_code, escape_html};

/// Default limit for nested `{{include}}` macros.
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 10;

/// Anchor name used when a heading has no usable text.
const FALLBACK_ANCHOR: &str = "section";

/// Result of rendering text.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RenderResult {
    /// Rendered HTML.
    pub html: String,
    /// Headings in document order, including those of included pages.
    pub headings: Vec<HeadingEntry>,
    /// Problems an author may want to know about (failed includes, unknown
    /// macros). Rendering never fails because of them.
    pub warnings: Vec<String>,
}

/// Textile renderer bound to a lookup service.
///
/// A renderer holds no per-render state; one instance may serve many
/// renders, including concurrent ones.
///
/// # Example
///
/// ```ignore
/// use tx_lookup::MemoryLookup;
/// use tx_renderer::{RenderContext, Renderer};
///
/// let lookup = MemoryLookup::new();
/// let renderer = Renderer::new(&lookup).with_max_include_depth(5);
/// let result = renderer.render("h1. Title\n\nSome *text*", &RenderContext::new());
/// assert!(result.html.contains("<strong>text</strong>"));
/// ```
pub struct Renderer<'a> {
    lookup: &'a dyn Lookup,
    routes: Box<dyn Routes>,
    highlighter: Option<Box<dyn Highlighter>>,
    macros: Vec<Box<dyn Macro>>,
    max_include_depth: usize,
}

impl<'a> Renderer<'a> {
    /// Create a renderer with default routes and no highlighter.
    #[must_use]
    pub fn new(lookup: &'a dyn Lookup) -> Self {
        Self {
            lookup,
            routes: Box::new(DefaultRoutes::new()),
            highlighter: None,
            macros: Vec::new(),
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }

    /// Set the URL builder for generated links.
    #[must_use]
    pub fn with_routes<R: Routes + 'static>(mut self, routes: R) -> Self {
        self.routes = Box::new(routes);
        self
    }

    /// Set the syntax highlighter for tagged code blocks.
    #[must_use]
    pub fn with_highlighter<H: Highlighter + 'static>(mut self, highlighter: H) -> Self {
        self.highlighter = Some(Box::new(highlighter));
        self
    }

    /// Register a block macro.
    ///
    /// `toc` and `include` are built in and cannot be replaced.
    #[must_use]
    pub fn with_macro<M: Macro + 'static>(mut self, handler: M) -> Self {
        self.macros.push(Box::new(handler));
        self
    }

    /// Limit the nesting of included pages and macro output.
    ///
    /// A depth of 0 is treated as 1.
    #[must_use]
    pub fn with_max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth.max(1);
        self
    }

    /// Render `text` to HTML.
    pub fn render(&self, text: &str, ctx: &RenderContext) -> RenderResult {
        let text = normalize(text);
        let blocks = parse_blocks(&text);
        let (blocks, warnings) =
            MacroExpander::new(self.lookup, ctx, &self.macros, self.max_include_depth)
                .expand(blocks);

        let resolver = Resolver::new(self.lookup, self.routes.as_ref(), ctx);
        let mut session = RenderSession {
            ctx,
            inline: InlineFormatter::new(&resolver),
            highlighter: self.highlighter.as_deref(),
            anchors: AnchorNamer::default(),
            headings: Vec::new(),
            sections: 0,
        };
        let parts: Vec<Part> = blocks.iter().map(|block| session.block(block)).collect();

        let headings = session.headings;
        let html = parts
            .into_iter()
            .map(|part| match part {
                Part::Html(html) => html,
                Part::Toc(placement) => render_toc(&headings, placement),
            })
            .filter(|html| !html.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        tracing::debug!(
            bytes = html.len(),
            headings = headings.len(),
            warnings = warnings.len(),
            "Rendered text"
        );
        RenderResult {
            html,
            headings,
            warnings,
        }
    }
}

/// Render `text` with default routes and no plugins.
pub fn render(text: &str, ctx: &RenderContext, lookup: &dyn Lookup) -> String {
    Renderer::new(lookup).render(text, ctx).html
}

/// Normalize line endings and replace characters reserved for placeholders.
pub(crate) fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n")
        .chars()
        .map(|c| match c {
            '\r' => '\n',
            c if is_placeholder(c) => char::REPLACEMENT_CHARACTER,
            c => c,
        })
        .collect()
}

/// Rendered block, or a marker for the table of contents which can only be
/// built once every heading is known.
enum Part {
    Html(String),
    Toc(Option<Placement>),
}

/// Mutable state of one render.
struct RenderSession<'r> {
    ctx: &'r RenderContext,
    inline: InlineFormatter<'r>,
    highlighter: Option<&'r dyn Highlighter>,
    anchors: AnchorNamer,
    headings: Vec<HeadingEntry>,
    /// Editable sections seen so far.
    sections: usize,
}

impl RenderSession<'_> {
    fn block(&mut self, block: &Block) -> Part {
        let html = match &block.kind {
            BlockKind::Paragraph { modifiers, text } => {
                format!("<p{}>{}</p>", modifiers.to_attrs(), self.inline.format(text))
            }
            BlockKind::Heading {
                level,
                modifiers,
                text,
            } => self.heading(*level, modifiers, text, &block.origin),
            BlockKind::BlockQuote { modifiers, text } => format!(
                "<blockquote{}>\n<p>{}</p>\n</blockquote>",
                modifiers.to_attrs(),
                self.inline.format(text)
            ),
            BlockKind::Pre(pre) => self.pre(pre),
            BlockKind::Unparsed(content) => escape_code(content),
            BlockKind::List(items) => self.list(items),
            BlockKind::Table(table) => self.table(table),
            BlockKind::Macro(call) if call.name == "toc" => return Part::Toc(call.placement),
            BlockKind::Macro(call) => format!("<p>{}</p>", self.inline.format(&call.raw)),
            BlockKind::Rule => "<hr />".to_owned(),
            BlockKind::FootnoteDef {
                number,
                modifiers,
                text,
            } => {
                let style = modifiers
                    .style_value()
                    .map(|s| format!(" style=\"{}\"", escape_html(&s)))
                    .unwrap_or_default();
                format!(
                    "<p id=\"fn{number}\" class=\"footnote\"{style}><sup>{number}</sup> {}</p>",
                    self.inline.format(text)
                )
            }
            BlockKind::Html(html) => html.clone(),
        };
        Part::Html(html)
    }

    fn heading(&mut self, level: u8, modifiers: &Modifiers, text: &str, origin: &Origin) -> String {
        let inner = self.inline.format(text);
        if !self.ctx.headings {
            return format!("<h{level}{}>{inner}</h{level}>", modifiers.to_attrs());
        }

        let title = heading_text(&inner);
        let mut slug = sanitize_anchor(&title);
        if slug.is_empty() {
            slug = FALLBACK_ANCHOR.to_owned();
        }
        if self.ctx.wiki_links == WikiLinkMode::Anchor
            && let Some(page) = self.ctx.wiki_page()
        {
            slug = page_anchor(&page.title, &slug);
        }
        let anchor = self.anchors.unique(slug);
        self.headings.push(HeadingEntry {
            level,
            title,
            anchor: anchor.clone(),
            index: self.headings.len() + 1,
        });

        let mut out = String::new();
        if let Some(links) = &self.ctx.edit_sections
            && *origin == Origin::Host
        {
            self.sections += 1;
            let _ = write!(
                out,
                "<div class=\"contextual\" id=\"section-{n}\" title=\"{title}\"><a href=\"{url}\"><img alt=\"Edit\" src=\"{icon}\" /></a></div>",
                n = self.sections,
                title = escape_html(&links.title),
                url = escape_html(&links.url(self.sections)),
                icon = escape_html(&links.icon),
            );
        }
        let anchor = escape_html(&anchor);
        let _ = write!(
            out,
            "<a name=\"{anchor}\"></a>\n<h{level} {}>{inner}<a href=\"#{anchor}\" class=\"wiki-anchor\">&para;</a></h{level}>",
            modifiers.to_attrs().trim_start()
        );
        out
    }

    fn pre(&self, pre: &Pre) -> String {
        let mut out = format!("<pre{}>", pre.class_attr.as_deref().unwrap_or_default());
        match &pre.code {
            Some(code) => {
                let highlighted = code
                    .language()
                    .zip(self.highlighter)
                    .and_then(|(language, highlighter)| {
                        highlighter.highlight(language, &pre.content)
                    });
                match highlighted {
                    Some(html) => {
                        let classes = code.classes.as_deref().unwrap_or_default();
                        let _ = write!(
                            out,
                            "<code class=\"{} syntaxhl\">{html}</code>",
                            escape_html(classes)
                        );
                    }
                    None => {
                        let _ = write!(
                            out,
                            "<code{}>{}</code>",
                            code.class_attr.as_deref().unwrap_or_default(),
                            escape_code(&pre.content)
                        );
                    }
                }
            }
            None => out.push_str(&escape_code(&pre.content)),
        }
        out.push_str("</pre>");
        out
    }

    /// Render list items, nesting by depth.
    fn list(&self, items: &[ListItem]) -> String {
        fn close(ordered: bool) -> &'static str {
            if ordered { "</li>\n</ol>" } else { "</li>\n</ul>" }
        }

        let mut out = String::new();
        let mut stack: Vec<bool> = Vec::new();
        for item in items {
            while stack.len() > item.depth
                || (stack.len() == item.depth && stack.last() != Some(&item.ordered))
            {
                if let Some(ordered) = stack.pop() {
                    out.push_str(close(ordered));
                }
            }
            if stack.len() == item.depth {
                out.push_str("</li>\n");
            }
            while stack.len() < item.depth {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(if item.ordered { "<ol>\n" } else { "<ul>\n" });
                stack.push(item.ordered);
                if stack.len() < item.depth {
                    out.push_str("\t<li>");
                }
            }
            let _ = write!(out, "\t<li>{}", self.inline.format(&item.text));
        }
        while let Some(ordered) = stack.pop() {
            out.push_str(close(ordered));
        }
        out
    }

    fn table(&self, table: &Table) -> String {
        let mut out = String::from("<table>\n");
        for row in &table.rows {
            out.push_str("<tr>");
            for cell in row {
                let tag = if cell.header { "th" } else { "td" };
                let _ = write!(out, "<{tag}{}", cell.modifiers.to_attrs());
                if let Some(colspan) = cell.colspan {
                    let _ = write!(out, " colspan=\"{colspan}\"");
                }
                if let Some(rowspan) = cell.rowspan {
                    let _ = write!(out, " rowspan=\"{rowspan}\"");
                }
                let _ = write!(out, ">{}</{tag}>", self.inline.format(&cell.text));
            }
            out.push_str("</tr>\n");
        }
        out.push_str("</table>");
        out
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tx_lookup::{
        Attachment, Board, Changeset, Document, Issue, MemoryLookup, Message, News, Project,
        Repository, Version, WikiPage,
    };

    use super::*;
    use crate::context::SectionEditLinks;
    use crate::macros::{MacroContext, MacroError, MacroOutput};

    fn ecookbook() -> Project {
        Project::new(1, "ecookbook", "eCookbook").with_wiki("CookBook_documentation")
    }

    fn lookup() -> MemoryLookup {
        MemoryLookup::new()
            .with_project(ecookbook())
            .with_project(Project::new(2, "onlinestore", "OnlineStore").with_wiki("Start_page"))
            .with_issue(Issue::new(1, 1, "Cannot print recipes", "New"))
            .with_issue(Issue::new(3, 1, "Error 281 when updating a recipe", "New"))
            .with_issue(
                Issue::new(11, 1, "Closed issue on a closed version", "Closed")
                    .with_closed_status(5),
            )
            .with_repository(Repository {
                id: 10,
                project_id: 1,
                identifier: None,
                is_default: true,
                uses_scmid: false,
            })
            .with_changeset(Changeset {
                repository_id: 10,
                revision: "1".to_owned(),
                scmid: Some("691322a8eb01e11fd7".to_owned()),
                comments: "My very first commit do not escaping #<>&".to_owned(),
            })
            .with_wiki_page(WikiPage::new(1, "CookBook documentation", "h1. CookBook"))
            .with_wiki_page(WikiPage::new(1, "Another page", "h1. Another page\n\ntext"))
            .with_wiki_page(WikiPage::new(1, "Child 1", "h1. Child page 1\n\nchild text"))
    }

    /// Fixture with every kind of referenced object.
    fn reference_lookup() -> MemoryLookup {
        lookup()
            .with_repository(Repository {
                id: 11,
                project_id: 1,
                identifier: Some("foo".to_owned()),
                is_default: false,
                uses_scmid: true,
            })
            .with_changeset(Changeset {
                repository_id: 11,
                revision: "123".to_owned(),
                scmid: Some("abcd1234".to_owned()),
                comments: "Foo commit".to_owned(),
            })
            .with_repository(Repository {
                id: 20,
                project_id: 2,
                identifier: None,
                is_default: true,
                uses_scmid: false,
            })
            .with_changeset(Changeset {
                repository_id: 20,
                revision: "2".to_owned(),
                scmid: None,
                comments: "Onlinestore commit".to_owned(),
            })
            .with_document(Document {
                id: 1,
                project_id: 1,
                title: "Test document".to_owned(),
            })
            .with_document(Document {
                id: 2,
                project_id: 2,
                title: "Other doc".to_owned(),
            })
            .with_version(Version {
                id: 2,
                project_id: 1,
                name: "1.0".to_owned(),
            })
            .with_board(Board {
                id: 1,
                project_id: 1,
                name: "Help".to_owned(),
            })
            .with_message(Message {
                id: 4,
                board_id: 1,
                subject: "Post 2".to_owned(),
                parent_id: None,
            })
            .with_message(Message {
                id: 5,
                board_id: 1,
                subject: "RE: post 2".to_owned(),
                parent_id: Some(4),
            })
            .with_news(News {
                id: 1,
                project_id: 1,
                title: "eCookbook first release".to_owned(),
            })
            .with_wiki_page(WikiPage::new(2, "Start page", ""))
    }

    /// Render each reference alone, then check its `!` form stays literal.
    fn assert_links(ctx: &RenderContext, cases: &[(&str, &str)]) {
        let lookup = reference_lookup();
        let renderer = Renderer::new(&lookup);
        for (text, expected) in cases {
            assert_eq!(
                renderer.render(text, ctx).html,
                format!("<p>{expected}</p>"),
                "input: {text}"
            );
            assert_eq!(
                renderer.render(&format!("!{text}"), ctx).html,
                format!("<p>{text}</p>"),
                "input: !{text}"
            );
        }
    }

    fn ctx() -> RenderContext {
        RenderContext::new().with_project(ecookbook())
    }

    fn render_with(text: &str, ctx: &RenderContext) -> String {
        let lookup = lookup();
        Renderer::new(&lookup).render(text, ctx).html
    }

    fn textilize(text: &str) -> String {
        render_with(text, &ctx())
    }

    struct UpcaseHighlighter;

    impl Highlighter for UpcaseHighlighter {
        fn highlight(&self, language: &str, source: &str) -> Option<String> {
            (language == "ruby").then(|| format!("<span class=\"c\">{}</span>", source.to_uppercase()))
        }
    }

    struct HelloMacro;

    impl Macro for HelloMacro {
        fn name(&self) -> &str {
            "hello"
        }

        fn expand(&self, args: &[String], _ctx: &MacroContext<'_>) -> Result<MacroOutput, MacroError> {
            match args.first() {
                Some(name) => Ok(MacroOutput::text(format!("Hello *{name}*"))),
                None => Err(MacroError::Failed("Name required".to_owned())),
            }
        }
    }

    #[test]
    fn test_plain_text_is_one_paragraph() {
        assert_eq!(textilize("Just text"), "<p>Just text</p>");
        assert_eq!(textilize("line one\nline two"), "<p>line one<br />line two</p>");
        assert_eq!(textilize(""), "");
    }

    #[test]
    fn test_autolink_sample() {
        assert_eq!(
            textilize("http://foo.bar."),
            "<p><a class=\"external\" href=\"http://foo.bar\">http://foo.bar</a>.</p>"
        );
    }

    #[test]
    fn test_image_sample() {
        assert_eq!(
            textilize("!http://foo.bar/image.jpg!"),
            "<p><img src=\"http://foo.bar/image.jpg\" alt=\"\" /></p>"
        );
    }

    #[test]
    fn test_issue_links() {
        assert_eq!(
            textilize("#3, #11 and #03"),
            "<p><a href=\"/issues/3\" class=\"issue tracker-1 status-1\" title=\"Error 281 when updating a recipe (New)\">#3</a>, <a href=\"/issues/11\" class=\"issue tracker-1 status-5 closed\" title=\"Closed issue on a closed version (Closed)\">#11</a> and #03</p>"
        );
    }

    #[test]
    fn test_escaped_reference_renders_literally() {
        assert_eq!(textilize("!#3"), "<p>#3</p>");
        assert_eq!(textilize("!r1"), "<p>r1</p>");
    }

    #[test]
    fn test_revision_link() {
        assert_eq!(
            textilize("r1"),
            "<p><a href=\"/projects/ecookbook/repository/revisions/1\" class=\"changeset\" title=\"My very first commit do not escaping #&lt;&gt;&amp;\">r1</a></p>"
        );
    }

    #[test]
    fn test_unknown_wiki_page_is_new() {
        assert_eq!(
            textilize("[[Unknown page]]"),
            "<p><a href=\"/projects/ecookbook/wiki/Unknown_page\" class=\"wiki-page new\">Unknown page</a></p>"
        );
    }

    #[test]
    fn test_wiki_links_in_tables() {
        assert_eq!(
            textilize("|[[Page|Link title]]|[[Other Page|Other title]]|\n|Cell 21|[[Another page]]|"),
            "<table>\n<tr><td><a href=\"/projects/ecookbook/wiki/Page\" class=\"wiki-page new\">Link title</a></td><td><a href=\"/projects/ecookbook/wiki/Other_Page\" class=\"wiki-page new\">Other title</a></td></tr>\n<tr><td>Cell 21</td><td><a href=\"/projects/ecookbook/wiki/Another_page\" class=\"wiki-page\">Another page</a></td></tr>\n</table>"
        );
    }

    #[test]
    fn test_heading() {
        assert_eq!(
            textilize("h1. Some heading"),
            "<a name=\"Some-heading\"></a>\n<h1 >Some heading<a href=\"#Some-heading\" class=\"wiki-anchor\">&para;</a></h1>"
        );
    }

    #[test]
    fn test_heading_with_modifiers() {
        assert_eq!(
            textilize("h2(intro). Intro"),
            "<a name=\"Intro\"></a>\n<h2 class=\"intro\">Intro<a href=\"#Intro\" class=\"wiki-anchor\">&para;</a></h2>"
        );
    }

    #[test]
    fn test_heading_without_anchors() {
        let ctx = ctx().with_headings(false);
        assert_eq!(render_with("h1. Some heading", &ctx), "<h1>Some heading</h1>");
    }

    #[test]
    fn test_heading_in_anchor_mode_is_prefixed_with_page_title() {
        let ctx = ctx()
            .with_wiki_page(WikiPage::new(1, "Page Title", ""))
            .with_wiki_links(WikiLinkMode::Anchor);
        assert_eq!(
            render_with("h1. Some heading", &ctx),
            "<a name=\"Page_Title_Some-heading\"></a>\n<h1 >Some heading<a href=\"#Page_Title_Some-heading\" class=\"wiki-anchor\">&para;</a></h1>"
        );
    }

    #[test]
    fn test_table_of_contents() {
        let text = "{{toc}}\n\nh1. Title\n\nLorem ipsum.\n\nh2. Subtitle with a [[Wiki]] link\n\nh2. Subtitle with %{color:red}red text%\n\n<pre>\nsome code\n\nh2. Not a heading\n</pre>\n\nh3. Subtitle with @inline code@\n\nh1. Another title\n\nh3. An \"Internet link\":http://www.redmine.org/ inside subtitle\n\nh2. \"Project Name !/attachments/1234/logo_small.gif!\":/projects/projectname/issues";
        let html = textilize(text);
        let toc = html.lines().next().unwrap();
        assert_eq!(
            toc,
            "<ul class=\"toc\"><li><a href=\"#Title\">Title</a><ul><li><a href=\"#Subtitle-with-a-Wiki-link\">Subtitle with a Wiki link</a></li><li><a href=\"#Subtitle-with-red-text\">Subtitle with red text</a><ul><li><a href=\"#Subtitle-with-inline-code\">Subtitle with inline code</a></li></ul></li></ul></li><li><a href=\"#Another-title\">Another title</a><ul><li><ul><li><a href=\"#An-Internet-link-inside-subtitle\">An Internet link inside subtitle</a></li></ul></li><li><a href=\"#Project-Name\">Project Name</a></li></ul></li></ul>"
        );
    }

    #[test]
    fn test_unique_anchors() {
        let lookup = lookup();
        let result = Renderer::new(&lookup).render("h1. Title\n\nh2. Subtitle\n\nh2. Subtitle", &ctx());
        let anchors: Vec<&str> = result.headings.iter().map(|h| h.anchor.as_str()).collect();
        assert_eq!(anchors, vec!["Title", "Subtitle", "Subtitle-2"]);
        assert!(result.html.contains("<a name=\"Subtitle-2\"></a>"));
    }

    #[test]
    fn test_empty_toc_renders_nothing() {
        assert_eq!(textilize("{{>toc}}\n\nNo headings"), "<p>No headings</p>");
    }

    #[test]
    fn test_toc_includes_included_headings() {
        let html = textilize("{{toc}}\n\nh1. Included\n\n{{include(Child 1)}}");
        assert!(html.starts_with(
            "<ul class=\"toc\"><li><a href=\"#Included\">Included</a></li><li><a href=\"#Child-page-1\">Child page 1</a></li></ul>"
        ));
        assert!(html.contains("<p>child text</p>"));
    }

    #[test]
    fn test_section_edit_links() {
        let text = "h1. Title\n\nLorem ipsum.\n\nh2. Subtitle with a [[Wiki]] link\n\nh2. Subtitle with *some* _modifiers_\n\nh2. Subtitle with @inline code@\n\n<pre>\nsome code\n\nh2. heading inside pre\n\n<h2>html heading inside pre</h2>\n</pre>\n\nh2. Subtitle after pre tag";
        let ctx = ctx().with_edit_sections(SectionEditLinks::new(
            "/projects/1/wiki/Test/edit?section={section}",
        ));
        let html = render_with(text, &ctx).replace('\n', "");
        assert!(html.contains(
            "<div class=\"contextual\" id=\"section-4\" title=\"Edit this section\"><a href=\"/projects/1/wiki/Test/edit?section=4\"><img alt=\"Edit\" src=\"/images/edit.png\" /></a></div><a name=\"Subtitle-with-inline-code\"></a><h2 >Subtitle with <code>inline code</code><a href=\"#Subtitle-with-inline-code\" class=\"wiki-anchor\">&para;</a></h2>"
        ));
        assert!(html.contains(
            "<div class=\"contextual\" id=\"section-5\" title=\"Edit this section\"><a href=\"/projects/1/wiki/Test/edit?section=5\"><img alt=\"Edit\" src=\"/images/edit.png\" /></a></div><a name=\"Subtitle-after-pre-tag\"></a>"
        ));
        assert!(!html.contains("section-6"));
    }

    #[test]
    fn test_included_headings_are_not_sections() {
        let ctx = ctx().with_edit_sections(SectionEditLinks::new("/edit?section={section}"));
        let html = render_with("{{include(Another page)}}\n\nh1. Own", &ctx);
        assert!(html.starts_with("<a name=\"Another-page\"></a>"));
        assert!(html.contains("id=\"section-1\""));
        assert!(!html.contains("section-2"));
    }

    #[test]
    fn test_html_tags() {
        let cases = [
            ("<div>content</div>", "<p>&lt;div&gt;content&lt;/div&gt;</p>"),
            (
                "<script>some script;</script>",
                "<p>&lt;script&gt;some script;&lt;/script&gt;</p>",
            ),
            ("<pre>\nline 1\nline2</pre>", "<pre>\nline 1\nline2</pre>"),
            (
                "<pre><code>\nline 1\nline2</code></pre>",
                "<pre><code>\nline 1\nline2</code></pre>",
            ),
            ("<pre><div>content</div></pre>", "<pre>&lt;div&gt;content&lt;/div&gt;</pre>"),
            (
                "HTML comment: <!-- no comments -->",
                "<p>HTML comment: &lt;!-- no comments --&gt;</p>",
            ),
            ("<!-- opening comment", "<p>&lt;!-- opening comment</p>"),
            ("<pre class='foo'>some text</pre>", "<pre class='foo'>some text</pre>"),
            ("<pre class=\"foo bar\">some text</pre>", "<pre class=\"foo bar\">some text</pre>"),
            ("<pre onmouseover='alert(1)'>some text</pre>", "<pre>some text</pre>"),
            (
                "<pre><code class=\"\"onmouseover=\"alert(1)\">text</code></pre>",
                "<pre><code>text</code></pre>",
            ),
            ("<pre class=\"\"onmouseover=\"alert(1)\">text</pre>", "<pre>text</pre>"),
        ];
        for (text, expected) in cases {
            assert_eq!(textilize(text), expected, "input: {text}");
        }
    }

    #[test]
    fn test_notextile() {
        assert_eq!(
            textilize("<notextile>no *textile* formatting</notextile>"),
            "no *textile* formatting"
        );
        assert_eq!(
            textilize("<notextile>this is <tag>a tag</tag></notextile>"),
            "this is &lt;tag&gt;a tag&lt;/tag&gt;"
        );
    }

    #[test]
    fn test_pre_content_is_not_parsed() {
        assert_eq!(
            textilize("[[CookBook documentation]]\n\n#1\n\n<pre>\n[[CookBook documentation]]\n\n#1\n</pre>"),
            "<p><a href=\"/projects/ecookbook/wiki/CookBook_documentation\" class=\"wiki-page\">CookBook documentation</a></p>\n<p><a href=\"/issues/1\" class=\"issue tracker-1 status-1\" title=\"Cannot print recipes (New)\">#1</a></p>\n<pre>\n[[CookBook documentation]]\n\n#1\n</pre>"
        );
    }

    #[test]
    fn test_unclosed_pre_is_closed() {
        assert_eq!(textilize("<pre><code>\n"), "<pre><code>\n</code></pre>");
    }

    #[test]
    fn test_syntax_highlighting() {
        let lookup = lookup();
        let renderer = Renderer::new(&lookup).with_highlighter(UpcaseHighlighter);
        let ctx = ctx();
        assert_eq!(
            renderer
                .render("<pre><code class=\"ruby\">\n# code\n</code></pre>", &ctx)
                .html,
            "<pre><code class=\"ruby syntaxhl\"><span class=\"c\">\n# CODE\n</span></code></pre>"
        );
        assert_eq!(
            renderer
                .render("<pre><code class=\"text\">a < b</code></pre>", &ctx)
                .html,
            "<pre><code class=\"text\">a &lt; b</code></pre>"
        );
    }

    #[test]
    fn test_lists() {
        assert_eq!(
            textilize("* one\n** nested\n* two\n\n# first\n# second"),
            "<ul>\n\t<li>one\n<ul>\n\t<li>nested</li>\n</ul></li>\n\t<li>two</li>\n</ul>\n<ol>\n\t<li>first</li>\n\t<li>second</li>\n</ol>"
        );
    }

    #[test]
    fn test_footnotes() {
        assert_eq!(
            textilize("This is some text[1].\n\nfn1. This is the foot note"),
            "<p>This is some text<sup><a href=\"#fn1\">1</a></sup>.</p>\n<p id=\"fn1\" class=\"footnote\"><sup>1</sup> This is the foot note</p>"
        );
    }

    #[test]
    fn test_rules_and_blockquote() {
        assert_eq!(textilize("---"), "<hr />");
        assert_eq!(textilize("Dashes: ---"), "<p>Dashes: ---</p>");
        assert_eq!(
            textilize("bq. quoted *text*"),
            "<blockquote>\n<p>quoted <strong>text</strong></p>\n</blockquote>"
        );
    }

    #[test]
    fn test_registered_macro() {
        let lookup = lookup();
        let renderer = Renderer::new(&lookup).with_macro(HelloMacro);
        let result = renderer.render("{{hello(World)}}\n\n{{hello}}", &ctx());
        assert_eq!(
            result.html,
            "<p>Hello <strong>World</strong></p>\n<div class=\"flash error\">Error executing the <strong>hello</strong> macro (Name required)</div>"
        );
        assert_eq!(
            result.warnings,
            vec!["Error executing the hello macro (Name required)".to_owned()]
        );
    }

    #[test]
    fn test_unknown_macro_is_literal() {
        let lookup = lookup();
        let result = Renderer::new(&lookup).render("{{nothing}}", &ctx());
        assert_eq!(result.html, "<p>{{nothing}}</p>");
        assert_eq!(result.warnings, vec!["Unknown macro: nothing".to_owned()]);
    }

    #[test]
    fn test_macros_disabled() {
        let ctx = ctx().with_macros(false);
        assert_eq!(
            render_with("{{include(Another page)}}", &ctx),
            "<p>{{include(Another page)}}</p>"
        );
    }

    #[test]
    fn test_include_depth_limit() {
        let lookup = lookup()
            .with_wiki_page(WikiPage::new(1, "Level 1", "{{include(Level 2)}}"))
            .with_wiki_page(WikiPage::new(1, "Level 2", "deep"));
        let renderer = Renderer::new(&lookup).with_max_include_depth(1);
        let result = renderer.render("{{include(Level 1)}}", &ctx());
        assert_eq!(
            result.html,
            "<div class=\"flash error\">Error executing the <strong>include</strong> macro (Maximum include depth (1) exceeded)</div>"
        );
    }

    #[test]
    fn test_attachment_recency_and_case() {
        let ctx = ctx().with_attachments(vec![
            Attachment::new(16, "Source.rb", 100),
            Attachment::new(17, "source.RB", 200),
        ]);
        assert_eq!(
            render_with("attachment:SOURCE.rb", &ctx),
            "<p><a href=\"/attachments/download/17/source.RB\" class=\"attachment\">source.RB</a></p>"
        );
    }

    #[test]
    fn test_url_root() {
        let lookup = lookup();
        let renderer = Renderer::new(&lookup).with_routes(DefaultRoutes::new().with_root("/redmine/"));
        assert_eq!(
            renderer.render("#3", &ctx()).html,
            "<p><a href=\"/redmine/issues/3\" class=\"issue tracker-1 status-1\" title=\"Error 281 when updating a recipe (New)\">#3</a></p>"
        );
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("a\r\nb\rc"), "a\nb\nc");
        assert_eq!(normalize("x\u{F0000}y"), "x\u{FFFD}y");
    }

    #[test]
    fn test_render_convenience() {
        let lookup = lookup();
        assert_eq!(render("*bold*", &ctx(), &lookup), "<p><strong>bold</strong></p>");
    }

    #[test]
    fn test_issue_and_changeset_references() {
        assert_links(
            &ctx(),
            &[
                (
                    "#3",
                    "<a href=\"/issues/3\" class=\"issue tracker-1 status-1\" title=\"Error 281 when updating a recipe (New)\">#3</a>",
                ),
                (
                    "#3-14",
                    "<a href=\"/issues/3#note-14\" class=\"issue tracker-1 status-1\" title=\"Error 281 when updating a recipe (New)\">#3-14</a>",
                ),
                (
                    "#3#note-14",
                    "<a href=\"/issues/3#note-14\" class=\"issue tracker-1 status-1\" title=\"Error 281 when updating a recipe (New)\">#3#note-14</a>",
                ),
                (
                    "r1",
                    "<a href=\"/projects/ecookbook/repository/revisions/1\" class=\"changeset\" title=\"My very first commit do not escaping #&lt;&gt;&amp;\">r1</a>",
                ),
                (
                    "foo|r123",
                    "<a href=\"/projects/ecookbook/repository/foo/revisions/123\" class=\"changeset\" title=\"Foo commit\">foo|r123</a>",
                ),
                (
                    "onlinestore:r2",
                    "<a href=\"/projects/onlinestore/repository/revisions/2\" class=\"changeset\" title=\"Onlinestore commit\">onlinestore:r2</a>",
                ),
                (
                    "commit:691322a8",
                    "<a href=\"/projects/ecookbook/repository/revisions/1\" class=\"changeset\" title=\"My very first commit do not escaping #&lt;&gt;&amp;\">691322a8</a>",
                ),
                (
                    "commit:foo|abcd",
                    "<a href=\"/projects/ecookbook/repository/foo/revisions/abcd1234\" class=\"changeset\" title=\"Foo commit\">foo|abcd</a>",
                ),
            ],
        );
    }

    #[test]
    fn test_source_references() {
        assert_links(
            &ctx(),
            &[
                (
                    "source:/some/file",
                    "<a href=\"/projects/ecookbook/repository/entry/some/file\" class=\"source\">source:/some/file</a>",
                ),
                (
                    "source:/some/file@52#L110",
                    "<a href=\"/projects/ecookbook/repository/revisions/52/entry/some/file#L110\" class=\"source\">source:/some/file@52#L110</a>",
                ),
                (
                    "source:foo|some/file",
                    "<a href=\"/projects/ecookbook/repository/foo/entry/some/file\" class=\"source\">source:foo|some/file</a>",
                ),
                (
                    "export:/some/file",
                    "<a href=\"/projects/ecookbook/repository/raw/some/file\" class=\"source download\">export:/some/file</a>",
                ),
                (
                    "onlinestore:source:/some/file",
                    "<a href=\"/projects/onlinestore/repository/entry/some/file\" class=\"source\">onlinestore:source:/some/file</a>",
                ),
            ],
        );
    }

    #[test]
    fn test_object_references() {
        let document = "<a href=\"/documents/1\" class=\"document\">Test document</a>";
        let version = "<a href=\"/versions/2\" class=\"version\">1.0</a>";
        let forum = "<a href=\"/projects/ecookbook/boards/1\" class=\"board\">Help</a>";
        let news = "<a href=\"/news/1\" class=\"news\">eCookbook first release</a>";
        let project = "<a href=\"/projects/onlinestore\" class=\"project\">OnlineStore</a>";
        assert_links(
            &ctx(),
            &[
                ("document#1", document),
                ("document:\"Test document\"", document),
                (
                    "onlinestore:document:\"Other doc\"",
                    "<a href=\"/documents/2\" class=\"document\">Other doc</a>",
                ),
                ("version#2", version),
                ("version:1.0", version),
                ("version:\"1.0\"", version),
                ("forum#1", forum),
                ("forum:Help", forum),
                (
                    "message#4",
                    "<a href=\"/boards/1/topics/4\" class=\"message\">Post 2</a>",
                ),
                (
                    "message#5",
                    "<a href=\"/boards/1/topics/4?r=5#message-5\" class=\"message\">RE: post 2</a>",
                ),
                ("news#1", news),
                ("news:\"eCookbook first release\"", news),
                ("project#2", project),
                ("project:onlinestore", project),
                (
                    "project:\"eCookbook\"",
                    "<a href=\"/projects/ecookbook\" class=\"project\">eCookbook</a>",
                ),
            ],
        );
    }

    #[test]
    fn test_unresolved_references_stay_literal() {
        let lookup = reference_lookup();
        let renderer = Renderer::new(&lookup);
        let ctx = ctx();
        for text in [
            "unknown:#3",
            "unknown:r1",
            "invalid|r123",
            "source:invalid|some/file",
            "commit:ffff",
            "document:\"Other doc\"",
            "version:9.9",
            "message#99",
            "project:unknown",
            "[[unknown:Page]]",
        ] {
            assert_eq!(renderer.render(text, &ctx).html, format!("<p>{text}</p>"), "input: {text}");
        }
    }

    #[test]
    fn test_wiki_links_in_normal_mode() {
        assert_links(
            &ctx(),
            &[
                (
                    "[[CookBook documentation]]",
                    "<a href=\"/projects/ecookbook/wiki/CookBook_documentation\" class=\"wiki-page\">CookBook documentation</a>",
                ),
                (
                    "[[CookBook documentation#Some section]]",
                    "<a href=\"/projects/ecookbook/wiki/CookBook_documentation#Some-section\" class=\"wiki-page\">CookBook documentation</a>",
                ),
                (
                    "[[onlinestore:]]",
                    "<a href=\"/projects/onlinestore/wiki\" class=\"wiki-page\">onlinestore</a>",
                ),
                (
                    "[[onlinestore:Start page]]",
                    "<a href=\"/projects/onlinestore/wiki/Start_page\" class=\"wiki-page\">Start page</a>",
                ),
                (
                    "[[OnlineStore:Start page]]",
                    "<a href=\"/projects/onlinestore/wiki/Start_page\" class=\"wiki-page\">Start page</a>",
                ),
            ],
        );
    }

    #[test]
    fn test_wiki_links_from_a_wiki_page() {
        let ctx = ctx().with_wiki_page(WikiPage::new(1, "CookBook documentation", "h1. CookBook"));
        assert_links(
            &ctx,
            &[
                (
                    "[[CookBook documentation#Some section]]",
                    "<a href=\"#Some-section\" class=\"wiki-page\">CookBook documentation</a>",
                ),
                (
                    "[[#Some section]]",
                    "<a href=\"#Some-section\" class=\"wiki-page\">Some section</a>",
                ),
                (
                    "[[Unknown page]]",
                    "<a href=\"/projects/ecookbook/wiki/Unknown_page?parent=CookBook_documentation\" class=\"wiki-page new\">Unknown page</a>",
                ),
            ],
        );
    }

    #[test]
    fn test_wiki_links_in_local_mode() {
        let ctx = ctx().with_wiki_links(WikiLinkMode::Local);
        assert_links(
            &ctx,
            &[
                (
                    "[[CookBook documentation]]",
                    "<a href=\"CookBook_documentation.html\" class=\"wiki-page\">CookBook documentation</a>",
                ),
                (
                    "[[CookBook documentation#Some section]]",
                    "<a href=\"CookBook_documentation.html#Some-section\" class=\"wiki-page\">CookBook documentation</a>",
                ),
                (
                    "[[Unknown page]]",
                    "<a href=\"Unknown_page.html\" class=\"wiki-page new\">Unknown page</a>",
                ),
            ],
        );
    }

    #[test]
    fn test_wiki_links_in_anchor_mode() {
        let ctx = ctx().with_wiki_links(WikiLinkMode::Anchor);
        assert_links(
            &ctx,
            &[
                (
                    "[[CookBook documentation]]",
                    "<a href=\"#CookBook_documentation\" class=\"wiki-page\">CookBook documentation</a>",
                ),
                (
                    "[[CookBook documentation#Some section]]",
                    "<a href=\"#CookBook_documentation_Some-section\" class=\"wiki-page\">CookBook documentation</a>",
                ),
            ],
        );
    }

    #[test]
    fn test_anchor_mode_links_match_headings() {
        let ctx = ctx()
            .with_wiki_page(WikiPage::new(1, "C++ notes", ""))
            .with_wiki_links(WikiLinkMode::Anchor);
        let html = render_with("h1. Intro\n\n[[#Intro]] and [[C++ notes#Intro]]", &ctx);
        assert!(html.starts_with("<a name=\"C_notes_Intro\"></a>"), "{html}");
        assert_eq!(html.matches("href=\"#C_notes_Intro\"").count(), 3, "{html}");
    }

    #[test]
    fn test_unclosed_code_with_multibyte_text() {
        assert_eq!(textilize("<pre><code>日本語</pre>"), "<pre><code>日本語</code></pre>");
    }
}
