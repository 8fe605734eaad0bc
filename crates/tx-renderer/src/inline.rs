//! Inline formatting of block text.
//!
//! # Architecture
//!
//! Formatting runs in three passes over a text run:
//!
//! 1. A left-to-right scan replaces atomic constructs (inline code, images,
//!    links, references, autolinks, escaped tokens) with single placeholder
//!    characters from the supplementary private use planes and keeps their
//!    finished HTML aside.
//! 2. Phrase modifiers are applied to the remaining text and everything
//!    else is escaped (see [`crate::span`]).
//! 3. Placeholders are swapped back for their HTML.
//!
//! Input text never contains placeholder characters: the renderer replaces
//! them with U+FFFD before parsing.

use std::borrow::Cow;
use std::fmt::Write;

use percent_encoding::percent_decode_str;
use tx_lookup::Attachment;

use crate::modifiers::Modifiers;
use crate::reference::{
    ReferenceKind, ReferenceToken, is_autolink_lead, is_reference_lead, lex_email, lex_reference,
    lex_url, lex_wiki_link,
};
use crate::resolver::Resolver;
use crate::sanitize::{escape_code, escape_html, find_ignore_case, is_safe_url, parse_tag};
use crate::span::{escape_text, format_spans};

/// First placeholder code point.
const PLACEHOLDER_BASE: u32 = 0xF0000;

/// Last placeholder code point.
const PLACEHOLDER_LAST: u32 = 0x10FFFD;

/// Whether `c` falls in the placeholder range.
pub(crate) fn is_placeholder(c: char) -> bool {
    (PLACEHOLDER_BASE..=PLACEHOLDER_LAST).contains(&u32::from(c))
}

/// Image extensions matched against attachments.
const IMAGE_EXTENSIONS: &[&str] = &["bmp", "gif", "jpg", "jpe", "jpeg", "png"];

/// HTML of atomic tokens, indexed by placeholder.
#[derive(Default)]
struct Tokens {
    html: Vec<String>,
}

impl Tokens {
    fn push(&mut self, html: String) -> Option<char> {
        let index = u32::try_from(self.html.len()).ok()?;
        let code = PLACEHOLDER_BASE.checked_add(index)?;
        if code > PLACEHOLDER_LAST {
            return None;
        }
        let placeholder = char::from_u32(code)?;
        self.html.push(html);
        Some(placeholder)
    }

    fn restore(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            let html = is_placeholder(c)
                .then(|| u32::from(c) - PLACEHOLDER_BASE)
                .and_then(|index| usize::try_from(index).ok())
                .and_then(|index| self.html.get(index));
            match html {
                Some(html) => out.push_str(html),
                None => out.push(c),
            }
        }
        out
    }
}

/// An atomic construct found by the scanner: its end offset and HTML.
type Atom = (usize, String);

/// Formats inline text of one render.
pub(crate) struct InlineFormatter<'a> {
    resolver: &'a Resolver<'a>,
}

impl<'a> InlineFormatter<'a> {
    pub fn new(resolver: &'a Resolver<'a>) -> Self {
        Self { resolver }
    }

    /// Format a text run: spans, images, links and references.
    pub fn format(&self, text: &str) -> String {
        self.run(text, true)
    }

    /// Format a link label: spans and images only.
    fn format_label(&self, text: &str) -> String {
        self.run(text, false)
    }

    fn run(&self, text: &str, links: bool) -> String {
        let mut tokens = Tokens::default();
        let marked = self.scan(text, links, &mut tokens);
        tokens.restore(&format_spans(&marked))
    }

    fn scan(&self, text: &str, links: bool, tokens: &mut Tokens) -> String {
        let mut out = String::with_capacity(text.len());
        let mut pos = 0;
        while let Some(c) = text[pos..].chars().next() {
            if let Some((end, html)) = self.match_atom(text, pos, c, links) {
                match tokens.push(html) {
                    Some(placeholder) => out.push(placeholder),
                    None => out.push_str(&text[pos..end]),
                }
                pos = end;
                continue;
            }
            out.push(c);
            pos += c.len_utf8();
        }
        out
    }

    fn match_atom(&self, text: &str, pos: usize, c: char, links: bool) -> Option<Atom> {
        let prev = text[..pos].chars().next_back();
        let atom = match c {
            '@' => inline_code(text, pos, prev),
            '<' => inline_verbatim(text, pos),
            '!' => self
                .image(text, pos, prev, links)
                .or_else(|| links.then(|| escaped_token(text, pos, prev)).flatten()),
            '"' if links => self.textile_link(text, pos, prev),
            '[' => {
                let wiki = if links { self.wiki_link(text, pos) } else { None };
                wiki.or_else(|| footnote_ref(text, pos, prev))
            }
            _ => None,
        };
        if atom.is_some() || !links {
            return atom;
        }
        self.reference(text, pos, prev)
            .or_else(|| self.autolink(text, pos, prev))
    }

    fn reference(&self, text: &str, pos: usize, prev: Option<char>) -> Option<Atom> {
        if !is_reference_lead(prev) {
            return None;
        }
        let token = lex_reference(text, pos)?;
        Some((pos + token.raw.len(), self.link_or_literal(&token)))
    }

    fn autolink(&self, text: &str, pos: usize, prev: Option<char>) -> Option<Atom> {
        let token = if is_autolink_lead(prev) {
            lex_url(text, pos)
        } else {
            None
        };
        let token = token.or_else(|| {
            let email_lead = prev.is_none_or(|p| {
                !(p.is_alphanumeric() || matches!(p, '_' | '.' | '-' | '+' | '@' | '/' | '&' | ':'))
            });
            if email_lead { lex_email(text, pos) } else { None }
        })?;
        Some((pos + token.raw.len(), self.link_or_literal(&token)))
    }

    fn link_or_literal(&self, token: &ReferenceToken<'_>) -> String {
        match self.resolver.resolve(token) {
            Some(link) => match token.kind {
                ReferenceKind::AutoLinkUrl | ReferenceKind::AutoLinkEmail => {
                    link.to_html_class_first()
                }
                _ => link.to_html(),
            },
            None => escape_text(token.raw),
        }
    }

    fn wiki_link(&self, text: &str, pos: usize) -> Option<Atom> {
        let token = lex_wiki_link(text, pos)?;
        let end = pos + token.raw.len();
        let html = match self.resolver.resolve(&token) {
            Some(mut link) => {
                if let Some(label) = token.label {
                    link.label = self.format_label(label);
                }
                link.to_html()
            }
            None => escape_text(token.raw),
        };
        Some((end, html))
    }

    /// `"label":url` or `"label (title)":url`, on a single line.
    fn textile_link(&self, text: &str, pos: usize, prev: Option<char>) -> Option<Atom> {
        if prev.is_some_and(char::is_alphanumeric) {
            return None;
        }
        let body_start = pos + 1;
        let line_end = text[body_start..]
            .find('\n')
            .map_or(text.len(), |n| body_start + n);
        let mut search = body_start;
        while let Some(offset) = text[search..line_end].find("\":") {
            let quote = search + offset;
            search = quote + 1;
            if quote == body_start {
                continue;
            }
            let Some((url, end)) = link_url(text, quote + 2) else {
                continue;
            };
            if !is_safe_url(url) {
                tracing::debug!(url, "Rejected unsafe link URL");
                return None;
            }
            let (label, title) = split_title(&text[body_start..quote]);
            let mut html = format!("<a href=\"{}\"", escape_html(url));
            if let Some(title) = title {
                let _ = write!(html, " title=\"{}\"", escape_html(title));
            }
            if url.contains("://") {
                html.push_str(" class=\"external\"");
            }
            let _ = write!(html, ">{}</a>", self.format_label(label));
            return Some((end, html));
        }
        None
    }

    /// `!src!`, `!src(title)!`, with modifiers and an optional `:url` link.
    fn image(&self, text: &str, pos: usize, prev: Option<char>, links: bool) -> Option<Atom> {
        let lead_ok = prev.is_none_or(|p| {
            p.is_whitespace() || matches!(p, '>' | '(' | '[' | '|' | '"') || is_placeholder(p)
        });
        if !lead_ok {
            return None;
        }
        let image = ImageSyntax::parse(text, pos)?;
        if !is_safe_url(image.src) {
            tracing::debug!(src = image.src, "Rejected unsafe image source");
            return None;
        }

        let ctx = self.resolver.context();
        let mut src: Cow<'_, str> = Cow::Borrowed(image.src);
        let mut title = image.title.map(str::to_owned);
        if !image.src.contains('/') && has_image_extension(image.src) {
            let filename = percent_decode_str(image.src).decode_utf8_lossy();
            if let Some(attachment) = Attachment::latest(&ctx.attachments, &filename) {
                src = Cow::Owned(self.resolver.routes().attachment_download(attachment));
                if title.is_none() {
                    title = attachment
                        .description
                        .as_deref()
                        .map(|d| d.replace('"', ""))
                        .filter(|d| !d.trim().is_empty());
                }
            }
        }

        let mut html = format!("<img src=\"{}\"", escape_html(&src));
        if let Some(class) = &image.modifiers.class {
            let _ = write!(html, " class=\"{}\"", escape_html(class));
        }
        if let Some(style) = &image.modifiers.style {
            let _ = write!(html, " style=\"{}\"", escape_html(style));
        }
        if let Some(title) = &title {
            let _ = write!(html, " title=\"{}\"", escape_html(title));
        }
        let _ = write!(
            html,
            " alt=\"{}\" />",
            escape_html(title.as_deref().unwrap_or_default())
        );

        let mut end = image.end;
        if links
            && text[end..].starts_with(':')
            && let Some((url, url_end)) = link_url(text, end + 1)
            && is_safe_url(url)
        {
            html = format!("<a href=\"{}\">{html}</a>", escape_html(url));
            end = url_end;
        }

        match image.float {
            Some(ImageFloat::Left) => html = format!("<div style=\"float:left\">{html}</div>"),
            Some(ImageFloat::Right) => html = format!("<div style=\"float:right\">{html}</div>"),
            Some(ImageFloat::Center) => {
                html = format!("<div style=\"text-align:center\">{html}</div>");
            }
            None => {}
        }
        Some((end, html))
    }
}

/// `@code@`, not inside a word.
fn inline_code(text: &str, pos: usize, prev: Option<char>) -> Option<Atom> {
    if prev.is_some_and(char::is_alphanumeric) {
        return None;
    }
    let body_start = pos + 1;
    let mut search = body_start;
    loop {
        let close = search + text[search..].find('@')?;
        let content = &text[body_start..close];
        if content.is_empty() || content.contains('\n') {
            return None;
        }
        let after = text[close + 1..].chars().next();
        if after.is_none_or(|c| !c.is_alphanumeric()) {
            return Some((close + 1, format!("<code>{}</code>", escape_code(content))));
        }
        search = close + 1;
    }
}

/// Inline `<code>` and `<notextile>` elements.
fn inline_verbatim(text: &str, pos: usize) -> Option<Atom> {
    let tag = parse_tag(&text[pos..])?;
    if tag.closing {
        return None;
    }
    let close_tag = match tag.name.as_str() {
        "code" => "</code>",
        "notextile" => "</notextile>",
        _ => return None,
    };
    let start = pos + tag.len;
    let close = start + find_ignore_case(&text[start..], close_tag)?;
    let content = escape_code(&text[start..close]);
    let html = if tag.name == "code" {
        format!("<code{}>{content}</code>", tag.class_attr().unwrap_or_default())
    } else {
        content
    };
    Some((close + close_tag.len(), html))
}

/// `!` before a wiki link, reference, or macro: the token as plain text.
fn escaped_token(text: &str, pos: usize, prev: Option<char>) -> Option<Atom> {
    let next = pos + 1;
    let rest = &text[next..];
    if rest.starts_with("[[") {
        let token = lex_wiki_link(text, next)?;
        return Some((next + token.raw.len(), escape_text(token.raw)));
    }
    if rest.starts_with("{{") {
        let close = rest.find("}}")?;
        let raw = &rest[..close + 2];
        if raw.contains('\n') {
            return None;
        }
        return Some((next + raw.len(), escape_text(raw)));
    }
    if !is_reference_lead(prev) {
        return None;
    }
    let token = lex_reference(text, next)?;
    Some((next + token.raw.len(), escape_text(token.raw)))
}

/// `word[1]`: a reference to footnote 1.
fn footnote_ref(text: &str, pos: usize, prev: Option<char>) -> Option<Atom> {
    if !prev.is_some_and(|p| !p.is_whitespace()) {
        return None;
    }
    let rest = &text[pos + 1..];
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 || rest.as_bytes().get(digits) != Some(&b']') {
        return None;
    }
    let number = &rest[..digits];
    Some((
        pos + 1 + digits + 1,
        format!("<sup><a href=\"#fn{number}\">{number}</a></sup>"),
    ))
}

/// URL of a textile link or linked image, starting at byte `at`.
///
/// Trailing punctuation and an unbalanced `)` are left out.
fn link_url(text: &str, at: usize) -> Option<(&str, usize)> {
    let rest = &text[at..];
    let len = rest
        .find(|c: char| c.is_whitespace() || c == '<' || c == '>')
        .unwrap_or(rest.len());
    let mut url = &rest[..len];
    loop {
        let Some(last) = url.chars().next_back() else {
            break;
        };
        let unbalanced_paren =
            last == ')' && url.matches('(').count() < url.matches(')').count();
        if matches!(last, '.' | ',' | ';' | ':' | '!' | '?' | '\'' | '"') || unbalanced_paren {
            url = &url[..url.len() - last.len_utf8()];
        } else {
            break;
        }
    }
    (!url.is_empty()).then(|| (url, at + url.len()))
}

/// Split `label (title)` into label and title.
fn split_title(label: &str) -> (&str, Option<&str>) {
    let Some(inner_end) = label.strip_suffix(')') else {
        return (label, None);
    };
    let mut depth = 0usize;
    for (i, c) in inner_end.char_indices().rev() {
        match c {
            ')' => depth += 1,
            '(' if depth > 0 => depth -= 1,
            '(' => {
                let before = &label[..i];
                if before.ends_with(char::is_whitespace) && !before.trim().is_empty() {
                    return (before.trim_end(), Some(&inner_end[i + 1..]));
                }
                return (label, None);
            }
            _ => {}
        }
    }
    (label, None)
}

fn has_image_extension(src: &str) -> bool {
    src.rsplit_once('.').is_some_and(|(_, ext)| {
        IMAGE_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known))
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ImageFloat {
    Left,
    Right,
    Center,
}

/// The parts of `!<(class){style}src(title)!`.
#[derive(Debug)]
struct ImageSyntax<'t> {
    float: Option<ImageFloat>,
    modifiers: Modifiers,
    src: &'t str,
    title: Option<&'t str>,
    /// Byte offset after the closing `!`.
    end: usize,
}

impl<'t> ImageSyntax<'t> {
    fn parse(text: &'t str, pos: usize) -> Option<Self> {
        let mut i = pos + 1;
        let float = match text.as_bytes().get(i) {
            Some(b'<') => Some(ImageFloat::Left),
            Some(b'>') => Some(ImageFloat::Right),
            Some(b'=') => Some(ImageFloat::Center),
            _ => None,
        };
        if float.is_some() {
            i += 1;
        }
        let (modifiers, len) = Modifiers::parse(&text[i..], false);
        i += len;
        if len > 0 && text[i..].starts_with(". ") {
            i += 2;
        }

        let src_start = i;
        let rest = &text[src_start..];
        let src_len = rest
            .find(|c: char| c.is_whitespace() || c == '(' || c == '!')
            .unwrap_or(rest.len());
        if src_len == 0 {
            return None;
        }
        let src = &rest[..src_len];
        i += src_len;

        let mut title = None;
        if text[i..].starts_with('(') {
            let close = matching_paren(&text[i..])?;
            title = Some(&text[i + 1..i + close]);
            i += close + 1;
        }
        if !text[i..].starts_with('!') {
            return None;
        }
        Some(Self {
            float,
            modifiers,
            src,
            title,
            end: i + 1,
        })
    }
}

/// Offset of the `)` matching the `(` at the start of `s`, on the same line.
fn matching_paren(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            '\n' => return None,
            _ => {}
        }
    }
    None
}
