//! Block structure of Textile text.
//!
//! Blocks are separated by blank lines, except verbatim containers
//! (`<pre>`, `<notextile>`) which run to their closing tag and may contain
//! blank lines. A block opens with an optional signature (`h2.`, `p.`,
//! `bq.`, `bc.`, `pre.`, `fn1.`) followed by attribute modifiers.

use std::ops::Range;

use crate::macros::MacroCall;
use crate::modifiers::Modifiers;
use crate::sanitize::{find_ignore_case, parse_tag, starts_with_ignore_case};

/// A parsed block with its source location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    /// Byte range in the text the block was parsed from.
    pub span: Range<usize>,
    pub origin: Origin,
}

/// Where a block's text came from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Origin {
    /// The text passed to the renderer.
    #[default]
    Host,
    /// A page pulled in by `{{include}}`.
    Included { page: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph {
        modifiers: Modifiers,
        text: String,
    },
    Heading {
        level: u8,
        modifiers: Modifiers,
        text: String,
    },
    BlockQuote {
        modifiers: Modifiers,
        text: String,
    },
    Pre(Pre),
    /// `<notextile>` content, emitted escaped and otherwise untouched.
    Unparsed(String),
    List(Vec<ListItem>),
    Table(Table),
    Macro(MacroCall),
    Rule,
    FootnoteDef {
        number: u32,
        modifiers: Modifiers,
        text: String,
    },
    /// Trusted HTML produced by a macro.
    Html(String),
}

/// Preformatted block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Pre {
    /// Validated `class` attribute of the `<pre>` tag, with leading space.
    pub class_attr: Option<String>,
    pub code: Option<Code>,
    pub content: String,
}

/// `<code>` wrapper inside a preformatted block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Code {
    /// Validated `class` attribute, with leading space.
    pub class_attr: Option<String>,
    /// Validated class value; its first token names the language.
    pub classes: Option<String>,
}

impl Code {
    pub fn language(&self) -> Option<&str> {
        self.classes.as_deref()?.split_whitespace().next()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListItem {
    /// Nesting depth, starting at 1.
    pub depth: usize,
    pub ordered: bool,
    pub text: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    pub rows: Vec<Vec<TableCell>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableCell {
    pub header: bool,
    pub modifiers: Modifiers,
    pub colspan: Option<u32>,
    pub rowspan: Option<u32>,
    pub text: String,
}

/// Parse text into blocks.
///
/// Line endings must already be normalized to `\n`.
pub fn parse_blocks(text: &str) -> Vec<Block> {
    BlockParser { text, pos: 0 }.parse()
}

struct BlockParser<'a> {
    text: &'a str,
    pos: usize,
}

enum Signature {
    Heading(u8),
    Paragraph,
    BlockQuote,
    BlockCode,
    Pre,
    Footnote(u32),
}

impl<'a> BlockParser<'a> {
    fn parse(mut self) -> Vec<Block> {
        let mut blocks = Vec::new();
        while self.pos < self.text.len() {
            let line = self.line_at(self.pos);
            if line.trim().is_empty() {
                self.pos += line.len() + 1;
                continue;
            }
            let start = self.pos;
            let kind = self.parse_block(line);
            blocks.push(Block {
                kind,
                span: start..self.pos.min(self.text.len()),
                origin: Origin::Host,
            });
        }
        blocks
    }

    fn line_at(&self, pos: usize) -> &'a str {
        let rest = &self.text[pos..];
        rest.find('\n').map_or(rest, |end| &rest[..end])
    }

    fn parse_block(&mut self, line: &'a str) -> BlockKind {
        let trimmed = line.trim_start();
        let indent = line.len() - trimmed.len();

        if starts_with_verbatim(trimmed, "pre")
            && let Some(kind) = self.parse_pre(self.pos + indent)
        {
            return kind;
        }
        if starts_with_ignore_case(trimmed, "<notextile>") {
            return self.parse_notextile(self.pos + indent);
        }
        if is_rule(line) {
            self.pos += line.len() + 1;
            return BlockKind::Rule;
        }
        if is_table_row(line) {
            return self.parse_table();
        }
        if list_marker(line).is_some() {
            return self.parse_list();
        }
        if let Some((signature, modifiers, body_offset)) = parse_signature(line) {
            let first = &line[body_offset..];
            self.pos += line.len() + 1;
            return self.finish_signed(signature, modifiers, first);
        }

        let text = self.collect_lines(line);
        if !text.contains('\n')
            && let Some(call) = MacroCall::parse(text.trim())
        {
            return BlockKind::Macro(call);
        }
        BlockKind::Paragraph {
            modifiers: Modifiers::default(),
            text: text.trim().to_owned(),
        }
    }

    /// Collect `first` and the lines following it up to the end of the block.
    fn collect_lines(&mut self, first: &str) -> String {
        let mut text = first.to_owned();
        self.pos += first.len() + 1;
        self.extend_paragraph(&mut text);
        text
    }

    fn extend_paragraph(&mut self, text: &mut String) {
        while self.pos < self.text.len() {
            let line = self.line_at(self.pos);
            if ends_paragraph(line) {
                break;
            }
            text.push('\n');
            text.push_str(line);
            self.pos += line.len() + 1;
        }
    }

    /// Collect the lines of a verbatim `bc.`/`pre.` block.
    fn collect_verbatim_lines(&mut self, first: &str) -> String {
        let mut text = first.to_owned();
        while self.pos < self.text.len() {
            let line = self.line_at(self.pos);
            if line.trim().is_empty() {
                break;
            }
            text.push('\n');
            text.push_str(line);
            self.pos += line.len() + 1;
        }
        text
    }

    fn finish_signed(&mut self, signature: Signature, modifiers: Modifiers, first: &str) -> BlockKind {
        match signature {
            Signature::BlockCode | Signature::Pre => {
                let content = self.collect_verbatim_lines(first);
                let class = modifiers.class.clone();
                let code = matches!(signature, Signature::BlockCode).then(|| Code {
                    class_attr: class.as_ref().map(|c| format!(" class=\"{c}\"")),
                    classes: class,
                });
                BlockKind::Pre(Pre {
                    class_attr: None,
                    code,
                    content,
                })
            }
            _ => {
                let mut text = first.to_owned();
                self.extend_paragraph(&mut text);
                let text = text.trim().to_owned();
                match signature {
                    Signature::Heading(level) => BlockKind::Heading {
                        level,
                        modifiers,
                        text,
                    },
                    Signature::BlockQuote => BlockKind::BlockQuote { modifiers, text },
                    Signature::Footnote(number) => BlockKind::FootnoteDef {
                        number,
                        modifiers,
                        text,
                    },
                    _ => BlockKind::Paragraph { modifiers, text },
                }
            }
        }
    }

    /// Parse a `<pre>` block starting at byte `at`.
    ///
    /// Nested `<pre>` tags are counted so the block ends at the matching
    /// close tag; an unclosed block runs to the end of the text.
    fn parse_pre(&mut self, at: usize) -> Option<BlockKind> {
        let tag = parse_tag(&self.text[at..])?;
        if tag.name != "pre" || tag.closing {
            return None;
        }
        let pre_class = tag.class_attr();
        let mut content_start = at + tag.len;

        let code = match parse_tag(&self.text[content_start..]) {
            Some(code_tag) if code_tag.name == "code" && !code_tag.closing => {
                content_start += code_tag.len;
                Some(Code {
                    class_attr: code_tag.class_attr(),
                    classes: code_tag.class_value().map(str::to_owned),
                })
            }
            _ => None,
        };

        let (content_end, block_end) = self.find_pre_close(content_start);
        let mut content = &self.text[content_start..content_end];
        if code.is_some() {
            let trimmed = content.trim_end();
            let close = "</code>".len();
            if let Some(at) = trimmed.len().checked_sub(close)
                && trimmed
                    .get(at..)
                    .is_some_and(|tail| tail.eq_ignore_ascii_case("</code>"))
            {
                content = &trimmed[..at];
            }
        }
        self.pos = self.skip_rest_of_line(block_end);
        Some(BlockKind::Pre(Pre {
            class_attr: pre_class,
            code,
            content: content.to_owned(),
        }))
    }

    fn find_pre_close(&self, from: usize) -> (usize, usize) {
        let mut depth = 1usize;
        let mut pos = from;
        while let Some(offset) = self.text[pos..].find('<') {
            let at = pos + offset;
            let rest = &self.text[at..];
            if starts_with_ignore_case(rest, "</pre>") {
                depth -= 1;
                if depth == 0 {
                    return (at, at + 6);
                }
                pos = at + 6;
            } else {
                if starts_with_verbatim(rest, "pre") {
                    depth += 1;
                }
                pos = at + 1;
            }
        }
        (self.text.len(), self.text.len())
    }

    fn parse_notextile(&mut self, at: usize) -> BlockKind {
        let start = at + "<notextile>".len();
        let (content_end, block_end) = match find_ignore_case(&self.text[start..], "</notextile>") {
            Some(offset) => (start + offset, start + offset + "</notextile>".len()),
            None => (self.text.len(), self.text.len()),
        };
        self.pos = self.skip_rest_of_line(block_end);
        BlockKind::Unparsed(self.text[start..content_end].to_owned())
    }

    /// Position after a verbatim block: past the line break when only
    /// whitespace follows the close tag, otherwise right after the tag.
    fn skip_rest_of_line(&self, pos: usize) -> usize {
        let rest = self.line_at(pos);
        if rest.trim().is_empty() {
            pos + rest.len() + 1
        } else {
            pos
        }
    }

    fn parse_table(&mut self) -> BlockKind {
        let mut table = Table::default();
        while self.pos < self.text.len() {
            let line = self.line_at(self.pos);
            if !is_table_row(line) {
                break;
            }
            table.rows.push(parse_row(line.trim()));
            self.pos += line.len() + 1;
        }
        BlockKind::Table(table)
    }

    fn parse_list(&mut self) -> BlockKind {
        let mut items: Vec<ListItem> = Vec::new();
        while self.pos < self.text.len() {
            let line = self.line_at(self.pos);
            if line.trim().is_empty() {
                break;
            }
            if let Some((marker, text)) = list_marker(line) {
                items.push(ListItem {
                    depth: marker.len(),
                    ordered: marker.ends_with('#'),
                    text: text.trim().to_owned(),
                });
            } else if is_rule(line) || is_table_row(line) {
                break;
            } else if let Some(last) = items.last_mut() {
                last.text.push('\n');
                last.text.push_str(line.trim());
            }
            self.pos += line.len() + 1;
        }
        BlockKind::List(items)
    }
}

/// Check whether `s` starts with the opening tag `<name` followed by `>` or whitespace.
fn starts_with_verbatim(s: &str, name: &str) -> bool {
    let Some(rest) = s.strip_prefix('<') else {
        return false;
    };
    starts_with_ignore_case(rest, name)
        && rest[name.len()..]
            .chars()
            .next()
            .is_some_and(|c| c == '>' || c.is_ascii_whitespace())
}

fn ends_paragraph(line: &str) -> bool {
    let trimmed = line.trim_start();
    line.trim().is_empty()
        || starts_with_verbatim(trimmed, "pre")
        || starts_with_ignore_case(trimmed, "<notextile>")
        || is_rule(line)
        || is_table_row(line)
        || list_marker(line).is_some()
}

fn is_rule(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= 3
        && ['-', '*', '_']
            .iter()
            .any(|&marker| trimmed.chars().all(|c| c == marker))
}

fn is_table_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= 2 && trimmed.starts_with('|') && trimmed.ends_with('|')
}

/// Split `* text` / `## text` into the marker run and the item text.
fn list_marker(line: &str) -> Option<(&str, &str)> {
    let marker_len = line.bytes().take_while(|b| matches!(b, b'*' | b'#')).count();
    if marker_len == 0 {
        return None;
    }
    let rest = &line[marker_len..];
    let text = rest.strip_prefix(' ')?;
    if text.trim().is_empty() {
        return None;
    }
    // Mixed runs such as `*#` take their list type from the last character.
    Some((&line[..marker_len], text))
}

/// Read a block signature such as `h2(title).` at the start of `line`.
///
/// Returns the signature, its modifiers and the byte offset of the content.
fn parse_signature(line: &str) -> Option<(Signature, Modifiers, usize)> {
    let word_len = line.bytes().take_while(u8::is_ascii_alphanumeric).count();
    let word = &line[..word_len];
    let signature = match word {
        "p" => Signature::Paragraph,
        "bq" => Signature::BlockQuote,
        "bc" => Signature::BlockCode,
        "pre" => Signature::Pre,
        _ => {
            if let Some(level) = word.strip_prefix('h') {
                match level.parse::<u8>() {
                    Ok(level @ 1..=6) => Signature::Heading(level),
                    _ => return None,
                }
            } else if let Some(number) = word.strip_prefix("fn") {
                Signature::Footnote(number.parse().ok()?)
            } else {
                return None;
            }
        }
    };
    let (modifiers, mods_len) = Modifiers::parse(&line[word_len..], true);
    let after = word_len + mods_len;
    let rest = line[after..].strip_prefix('.')?;
    if rest.is_empty() {
        return Some((signature, modifiers, after + 1));
    }
    if !rest.starts_with([' ', '\t']) {
        return None;
    }
    Some((signature, modifiers, after + 2))
}

fn parse_row(line: &str) -> Vec<TableCell> {
    let inner = &line[1..line.len() - 1];
    split_cells(inner).into_iter().map(parse_cell).collect()
}

/// Split a row on `|`, ignoring pipes inside `[[...]]`.
fn split_cells(inner: &str) -> Vec<&str> {
    let mut cells = Vec::new();
    let bytes = inner.as_bytes();
    let mut start = 0;
    let mut i = 0;
    let mut in_link = false;
    while i < bytes.len() {
        if bytes[i..].starts_with(b"[[") {
            in_link = true;
            i += 2;
            continue;
        }
        if in_link && bytes[i..].starts_with(b"]]") {
            in_link = false;
            i += 2;
            continue;
        }
        if bytes[i] == b'|' && !in_link {
            cells.push(&inner[start..i]);
            start = i + 1;
        }
        i += 1;
    }
    cells.push(&inner[start..]);
    cells
}

fn parse_cell(raw: &str) -> TableCell {
    let mut cell = TableCell::default();
    let bytes = raw.as_bytes();
    let mut i = 0;
    loop {
        match bytes.get(i) {
            Some(b'_') if !cell.header => {
                cell.header = true;
                i += 1;
            }
            Some(b @ (b'\\' | b'/')) => {
                let digits = bytes[i + 1..]
                    .iter()
                    .take_while(|d| d.is_ascii_digit())
                    .count();
                let Ok(span) = raw[i + 1..i + 1 + digits].parse::<u32>() else {
                    break;
                };
                if *b == b'\\' {
                    cell.colspan = Some(span);
                } else {
                    cell.rowspan = Some(span);
                }
                i += 1 + digits;
            }
            _ => {
                let (modifiers, len) = Modifiers::parse(&raw[i..], true);
                if len == 0 {
                    break;
                }
                cell.modifiers = modifiers;
                i += len;
            }
        }
    }
    let rest = &raw[i..];
    let has_signature =
        i > 0 && (rest == "." || rest.starts_with(". ") || rest.starts_with(".\t"));
    if has_signature {
        cell.text = rest[1..].trim().to_owned();
    } else {
        cell = TableCell {
            text: raw.trim().to_owned(),
            ..TableCell::default()
        };
    }
    cell
}
