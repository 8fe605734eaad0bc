//! Block macros: `{{name}}` and `{{name(args)}}`.
//!
//! # Architecture
//!
//! Macro blocks are expanded after block parsing and before rendering:
//!
//! 1. `{{toc}}` stays in place as a marker; the renderer fills it in once
//!    every heading is known.
//! 2. `{{include(Page)}}` parses the page's text into blocks and splices
//!    them in, recursively. A stack of pages being included detects cycles,
//!    and nesting is capped at a configurable depth.
//! 3. Any other name is looked up among the registered [`Macro`]s.
//!
//! Failures render as an error box in place of the macro and are recorded
//! as warnings. Unknown macros are left as literal text.

use tx_lookup::{Lookup, Project, WikiPage};

use crate::block::{Block, BlockKind, Origin, parse_blocks};
use crate::context::RenderContext;
use crate::modifiers::Modifiers;
use crate::sanitize::escape_html;

/// Float of a `{{<toc}}` / `{{>toc}}` table of contents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    Left,
    Right,
}

/// A macro invocation occupying a whole block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MacroCall {
    /// Lower-cased macro name.
    pub name: String,
    /// Comma-separated arguments, trimmed.
    pub args: Vec<String>,
    /// The invocation as written.
    pub raw: String,
    pub placement: Option<Placement>,
}

impl MacroCall {
    /// Parse `{{name}}`, `{{name(args)}}`, `{{<name}}` or `{{>name}}`.
    pub fn parse(s: &str) -> Option<Self> {
        let inner = s.strip_prefix("{{")?.strip_suffix("}}")?;
        let (placement, inner) = match inner.as_bytes().first() {
            Some(b'<') => (Some(Placement::Left), &inner[1..]),
            Some(b'>') => (Some(Placement::Right), &inner[1..]),
            _ => (None, inner),
        };
        let name_len = inner
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
            .count();
        if name_len == 0 {
            return None;
        }
        let rest = &inner[name_len..];
        let args = if rest.is_empty() {
            Vec::new()
        } else {
            let args = rest.strip_prefix('(')?.strip_suffix(')')?;
            if args.contains(['\n', '}']) {
                return None;
            }
            args.split(',')
                .map(|a| a.trim().to_owned())
                .filter(|a| !a.is_empty())
                .collect()
        };
        Some(Self {
            name: inner[..name_len].to_ascii_lowercase(),
            args,
            raw: s.to_owned(),
            placement,
        })
    }
}

/// Output from a macro.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MacroOutput {
    /// Trusted HTML placed in the output as is.
    Html(String),
    /// Textile that is parsed and rendered in place of the macro.
    Text(String),
    /// Leave the invocation as literal text.
    Skip,
}

impl MacroOutput {
    #[must_use]
    pub fn html(s: impl Into<String>) -> Self {
        Self::Html(s.into())
    }

    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }
}

/// Macro failure, shown to the reader inside an error box.
#[derive(Debug, thiserror::Error)]
pub enum MacroError {
    #[error("Page not found")]
    PageNotFound,
    #[error("Circular inclusion detected")]
    CircularInclusion,
    #[error("Maximum include depth ({0}) exceeded")]
    DepthExceeded(usize),
    #[error("{0}")]
    Failed(String),
}

/// What a macro sees while expanding.
pub struct MacroContext<'a> {
    pub lookup: &'a dyn Lookup,
    pub render: &'a RenderContext,
    /// Include depth of the block holding the invocation, 0 for the host text.
    pub depth: usize,
}

/// A named block macro.
///
/// # Example
///
/// ```ignore
/// struct HelloMacro;
///
/// impl Macro for HelloMacro {
///     fn name(&self) -> &str { "hello" }
///
///     fn expand(&self, args: &[String], _ctx: &MacroContext<'_>) -> Result<MacroOutput, MacroError> {
///         Ok(MacroOutput::text(format!("Hello *{}*", args.join(", "))))
///     }
/// }
/// ```
pub trait Macro: Send + Sync {
    /// Name used in `{{name}}`, lower-case.
    fn name(&self) -> &str;

    fn expand(&self, args: &[String], ctx: &MacroContext<'_>) -> Result<MacroOutput, MacroError>;
}

/// Identity of a page on the include stack.
type PageKey = (u64, String);

/// Expands macro blocks for one render.
pub(crate) struct MacroExpander<'a> {
    lookup: &'a dyn Lookup,
    ctx: &'a RenderContext,
    macros: &'a [Box<dyn Macro>],
    max_depth: usize,
    stack: Vec<PageKey>,
    warnings: Vec<String>,
}

impl<'a> MacroExpander<'a> {
    pub fn new(
        lookup: &'a dyn Lookup,
        ctx: &'a RenderContext,
        macros: &'a [Box<dyn Macro>],
        max_depth: usize,
    ) -> Self {
        let stack = ctx
            .wiki_page()
            .map(|page| vec![page_key(page)])
            .unwrap_or_default();
        Self {
            lookup,
            ctx,
            macros,
            max_depth,
            stack,
            warnings: Vec::new(),
        }
    }

    /// Expand every macro block, returning the new block list and warnings.
    pub fn expand(mut self, blocks: Vec<Block>) -> (Vec<Block>, Vec<String>) {
        let expanded = self.expand_level(blocks, 0);
        (expanded, self.warnings)
    }

    fn expand_level(&mut self, blocks: Vec<Block>, depth: usize) -> Vec<Block> {
        let mut out = Vec::with_capacity(blocks.len());
        for block in blocks {
            let BlockKind::Macro(call) = &block.kind else {
                out.push(block);
                continue;
            };
            if !self.ctx.macros {
                out.push(literal(&block, call));
                continue;
            }
            match call.name.as_str() {
                "toc" => out.push(block),
                "include" => match self.include(call, depth) {
                    Ok(blocks) => out.extend(blocks),
                    Err(err) => out.push(self.error_block(&block, call, &err)),
                },
                _ => self.expand_registered(block, depth, &mut out),
            }
        }
        out
    }

    fn expand_registered(&mut self, block: Block, depth: usize, out: &mut Vec<Block>) {
        let BlockKind::Macro(call) = &block.kind else {
            return;
        };
        let macros = self.macros;
        let Some(handler) = macros.iter().find(|m| m.name() == call.name) else {
            tracing::debug!(name = %call.name, "Unknown macro left as text");
            self.warnings.push(format!("Unknown macro: {}", call.name));
            out.push(literal(&block, call));
            return;
        };
        let macro_ctx = MacroContext {
            lookup: self.lookup,
            render: self.ctx,
            depth,
        };
        match handler.expand(&call.args, &macro_ctx) {
            Ok(MacroOutput::Html(html)) => out.push(Block {
                kind: BlockKind::Html(html),
                ..block
            }),
            Ok(MacroOutput::Text(text)) => {
                if depth >= self.max_depth {
                    let err = MacroError::DepthExceeded(self.max_depth);
                    out.push(self.error_block(&block, call, &err));
                    return;
                }
                let blocks = parse_with_origin(&text, &block.origin);
                out.extend(self.expand_level(blocks, depth + 1));
            }
            Ok(MacroOutput::Skip) => out.push(literal(&block, call)),
            Err(err) => out.push(self.error_block(&block, call, &err)),
        }
    }

    fn include(&mut self, call: &MacroCall, depth: usize) -> Result<Vec<Block>, MacroError> {
        let spec = call.args.first().ok_or(MacroError::PageNotFound)?;
        let page = self.find_page(spec)?;
        let key = page_key(&page);
        if self.stack.contains(&key) {
            return Err(MacroError::CircularInclusion);
        }
        if depth >= self.max_depth {
            return Err(MacroError::DepthExceeded(self.max_depth));
        }
        tracing::debug!(page = %page.title, depth, "Including wiki page");

        let origin = Origin::Included {
            page: page.title.clone(),
        };
        let blocks = parse_with_origin(&page.text, &origin);
        self.stack.push(key);
        let expanded = self.expand_level(blocks, depth + 1);
        self.stack.pop();
        Ok(expanded)
    }

    /// Resolve `Page` or `project:Page` to a wiki page.
    fn find_page(&self, spec: &str) -> Result<WikiPage, MacroError> {
        let (project, title) = match spec.split_once(':') {
            Some((project, title)) => (self.find_project(project), title),
            None => (self.ctx.project.clone(), spec),
        };
        let project = project.ok_or(MacroError::PageNotFound)?;
        let title = WikiPage::titleize(title.trim());
        if title.is_empty() || !project.has_wiki() {
            return Err(MacroError::PageNotFound);
        }
        self.lookup
            .find_wiki_page(&project, &title)
            .ok_or(MacroError::PageNotFound)
    }

    fn find_project(&self, key: &str) -> Option<Project> {
        let key = key.trim();
        self.lookup
            .find_project(key)
            .or_else(|| self.lookup.find_project_by_name(key))
    }

    fn error_block(&mut self, block: &Block, call: &MacroCall, err: &MacroError) -> Block {
        tracing::warn!(name = %call.name, error = %err, "Macro failed");
        self.warnings
            .push(format!("Error executing the {} macro ({err})", call.name));
        Block {
            kind: BlockKind::Html(format!(
                "<div class=\"flash error\">Error executing the <strong>{}</strong> macro ({})</div>",
                escape_html(&call.name),
                escape_html(&err.to_string())
            )),
            span: block.span.clone(),
            origin: block.origin.clone(),
        }
    }
}

fn page_key(page: &WikiPage) -> PageKey {
    (page.project_id, page.title.to_lowercase())
}

fn parse_with_origin(text: &str, origin: &Origin) -> Vec<Block> {
    let mut blocks = parse_blocks(&crate::renderer::normalize(text));
    for block in &mut blocks {
        block.origin = origin.clone();
    }
    blocks
}

/// The invocation as a plain paragraph.
fn literal(block: &Block, call: &MacroCall) -> Block {
    Block {
        kind: BlockKind::Paragraph {
            modifiers: Modifiers::default(),
            text: call.raw.clone(),
        },
        span: block.span.clone(),
        origin: block.origin.clone(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tx_lookup::MemoryLookup;

    use super::*;

    fn lookup() -> MemoryLookup {
        let project = Project::new(1, "ecookbook", "eCookbook").with_wiki("CookBook_documentation");
        MemoryLookup::new()
            .with_project(project)
            .with_wiki_page(WikiPage::new(1, "Another page", "h1. Included\n\ntext"))
            .with_wiki_page(WikiPage::new(1, "Loop", "{{include(Loop)}}"))
            .with_wiki_page(WikiPage::new(1, "Ping", "{{include(Pong)}}"))
            .with_wiki_page(WikiPage::new(1, "Pong", "{{include(Ping)}}"))
    }

    fn ctx(lookup: &MemoryLookup) -> RenderContext {
        RenderContext::new().with_project(lookup.find_project("ecookbook").unwrap())
    }

    fn expand(text: &str, lookup: &MemoryLookup, ctx: &RenderContext) -> (Vec<Block>, Vec<String>) {
        MacroExpander::new(lookup, ctx, &[], 10).expand(parse_blocks(text))
    }

    #[test]
    fn test_parse_macro_call() {
        let call = MacroCall::parse("{{include(onlinestore:Start page)}}").unwrap();
        assert_eq!(call.name, "include");
        assert_eq!(call.args, vec!["onlinestore:Start page".to_owned()]);
        assert_eq!(call.placement, None);

        let toc = MacroCall::parse("{{>TOC}}").unwrap();
        assert_eq!(toc.name, "toc");
        assert_eq!(toc.placement, Some(Placement::Right));

        assert!(MacroCall::parse("{{}}").is_none());
        assert!(MacroCall::parse("{{toc}} x").is_none());
        assert!(MacroCall::parse("{{name(unclosed}}").is_none());
    }

    #[test]
    fn test_include_splices_blocks() {
        let lookup = lookup();
        let ctx = ctx(&lookup);
        let (blocks, warnings) = expand("before\n\n{{include(Another page)}}", &lookup, &ctx);
        assert!(warnings.is_empty());
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].origin, Origin::Host);
        assert_eq!(
            blocks[1].origin,
            Origin::Included {
                page: "Another_page".to_owned()
            }
        );
        assert!(matches!(blocks[1].kind, BlockKind::Heading { level: 1, .. }));
    }

    #[test]
    fn test_include_missing_page() {
        let lookup = lookup();
        let ctx = ctx(&lookup);
        let (blocks, warnings) = expand("{{include(Nonexistent)}}", &lookup, &ctx);
        assert_eq!(
            blocks[0].kind,
            BlockKind::Html(
                "<div class=\"flash error\">Error executing the <strong>include</strong> macro (Page not found)</div>"
                    .to_owned()
            )
        );
        assert_eq!(
            warnings,
            vec!["Error executing the include macro (Page not found)".to_owned()]
        );
    }

    #[test]
    fn test_include_cycle() {
        let lookup = lookup();
        let ctx = ctx(&lookup);
        let (blocks, warnings) = expand("{{include(Ping)}}", &lookup, &ctx);
        assert_eq!(blocks.len(), 1);
        let BlockKind::Html(html) = &blocks[0].kind else {
            panic!("expected error box");
        };
        assert!(html.contains("Circular inclusion detected"));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_self_include_of_container() {
        let lookup = lookup();
        let ctx = ctx(&lookup).with_wiki_page(WikiPage::new(1, "Another page", ""));
        let (blocks, _) = expand("{{include(Another page)}}", &lookup, &ctx);
        let BlockKind::Html(html) = &blocks[0].kind else {
            panic!("expected error box");
        };
        assert!(html.contains("Circular inclusion detected"));
    }

    #[test]
    fn test_include_depth_limit() {
        let lookup = lookup();
        let ctx = ctx(&lookup);
        let (blocks, _) = MacroExpander::new(&lookup, &ctx, &[], 0)
            .expand(parse_blocks("{{include(Another page)}}"));
        let BlockKind::Html(html) = &blocks[0].kind else {
            panic!("expected error box");
        };
        assert!(html.contains("Maximum include depth (0) exceeded"));
    }

    #[test]
    fn test_macros_disabled() {
        let lookup = lookup();
        let ctx = ctx(&lookup).with_macros(false);
        let (blocks, warnings) = expand("{{include(Another page)}}", &lookup, &ctx);
        assert_eq!(
            blocks[0].kind,
            BlockKind::Paragraph {
                modifiers: Modifiers::default(),
                text: "{{include(Another page)}}".to_owned(),
            }
        );
        assert!(warnings.is_empty());
    }

    struct HelloMacro;

    impl Macro for HelloMacro {
        fn name(&self) -> &str {
            "hello"
        }

        fn expand(
            &self,
            args: &[String],
            _ctx: &MacroContext<'_>,
        ) -> Result<MacroOutput, MacroError> {
            match args.first() {
                Some(name) => Ok(MacroOutput::html(format!("<b>Hello {name}</b>"))),
                None => Err(MacroError::Failed("Name required".to_owned())),
            }
        }
    }

    #[test]
    fn test_registered_macro() {
        let lookup = lookup();
        let ctx = ctx(&lookup);
        let macros: Vec<Box<dyn Macro>> = vec![Box::new(HelloMacro)];
        let (blocks, warnings) = MacroExpander::new(&lookup, &ctx, &macros, 10)
            .expand(parse_blocks("{{hello(world)}}\n\n{{hello}}\n\n{{unknown}}"));
        assert_eq!(blocks[0].kind, BlockKind::Html("<b>Hello world</b>".to_owned()));
        assert!(matches!(&blocks[1].kind, BlockKind::Html(html) if html.contains("(Name required)")));
        assert!(matches!(&blocks[2].kind, BlockKind::Paragraph { text, .. } if text == "{{unknown}}"));
        assert_eq!(warnings.len(), 2);
    }
}
