//! Reference tokens and their lexer.
//!
//! A reference is a short token in running text that names a tracker
//! object: `#124`, `r758`, `document:"Some Doc"`, `sandbox:source:trunk`,
//! `[[Wiki page|label]]`. Each token may carry a `project:` prefix, and
//! repository tokens a `repo|` prefix. Regex lookahead is not available, so
//! the lexer is written by hand to check the boundary after each candidate.

/// Every kind of reference the renderer links.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReferenceKind {
    /// `#124`
    Issue,
    /// `#124#note-6` or `#124-6`
    IssueNote,
    /// `r758`, `repo|r758`
    Revision,
    /// `commit:abcd`
    CommitHash,
    Document,
    Version,
    /// `source:path[@rev][#Lnn]`
    Source,
    /// `export:path[@rev]`
    Export,
    Forum,
    Message,
    News,
    Project,
    WikiLink,
    Attachment,
    /// Bare `http://…` or `www.…` URL.
    AutoLinkUrl,
    /// Bare e-mail address.
    AutoLinkEmail,
}

/// How a token names its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target<'a> {
    /// Digits after `#` (or after `r` for revisions).
    Id(&'a str),
    /// Name, title, path, hash, filename, page, or address.
    Name(&'a str),
}

impl<'a> Target<'a> {
    pub fn as_str(&self) -> &'a str {
        match *self {
            Self::Id(s) | Self::Name(s) => s,
        }
    }
}

/// A lexed reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReferenceToken<'a> {
    pub kind: ReferenceKind,
    /// The token as written.
    pub raw: &'a str,
    /// `project:` prefix, without the colon.
    pub project: Option<&'a str>,
    /// `repo|` prefix of repository tokens, without the pipe.
    pub repository: Option<&'a str>,
    pub target: Target<'a>,
    /// Note number of [`ReferenceKind::IssueNote`].
    pub note: Option<&'a str>,
    /// Explicit label of a wiki link.
    pub label: Option<&'a str>,
}

impl<'a> ReferenceToken<'a> {
    fn new(kind: ReferenceKind, raw: &'a str, target: Target<'a>) -> Self {
        Self {
            kind,
            raw,
            project: None,
            repository: None,
            target,
            note: None,
            label: None,
        }
    }
}

/// Keywords introducing a typed reference.
const KEYWORDS: &[(&str, ReferenceKind)] = &[
    ("attachment", ReferenceKind::Attachment),
    ("document", ReferenceKind::Document),
    ("version", ReferenceKind::Version),
    ("forum", ReferenceKind::Forum),
    ("news", ReferenceKind::News),
    ("message", ReferenceKind::Message),
    ("project", ReferenceKind::Project),
    ("commit", ReferenceKind::CommitHash),
    ("source", ReferenceKind::Source),
    ("export", ReferenceKind::Export),
];

/// Characters after which a reference may start.
pub(crate) fn is_reference_lead(prev: Option<char>) -> bool {
    match prev {
        None => true,
        Some(c) => {
            c.is_whitespace()
                || matches!(c, '(' | ',' | '-' | '[' | '>' | '*' | '_' | '+' | '^' | '~')
        }
    }
}

/// Check the boundary after a reference ending at byte `end`.
///
/// A reference ends at the end of text, whitespace, `,`, `]`, `<`, or a
/// punctuation character not followed by a word character or `/`.
fn is_boundary(text: &str, end: usize) -> bool {
    let mut chars = text[end..].chars();
    let Some(c) = chars.next() else {
        return true;
    };
    if c.is_whitespace() || matches!(c, ',' | ']' | '<') {
        return true;
    }
    c.is_ascii_punctuation()
        && chars
            .next()
            .is_none_or(|n| !(n.is_ascii_alphanumeric() || n == '_' || n == '/'))
}

fn digits_len(s: &str) -> usize {
    s.bytes().take_while(u8::is_ascii_digit).count()
}

/// Length of a `[a-z0-9_-]+` run.
fn identifier_len(s: &str) -> usize {
    s.bytes()
        .take_while(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'_' | b'-'))
        .count()
}

/// Lex a domain reference starting at byte `pos` of `text`.
///
/// The caller checks the character before `pos`. Wiki links and autolinks
/// have their own lexers.
pub(crate) fn lex_reference(text: &str, pos: usize) -> Option<ReferenceToken<'_>> {
    let rest = &text[pos..];
    let project_len = identifier_len(rest);
    if project_len > 0
        && rest.as_bytes().get(project_len) == Some(&b':')
        && let Some(mut token) = lex_body(text, pos + project_len + 1)
    {
        token.project = Some(&rest[..project_len]);
        token.raw = &text[pos..pos + project_len + 1 + token.raw.len()];
        return Some(token);
    }
    lex_body(text, pos)
}

fn lex_body(text: &str, pos: usize) -> Option<ReferenceToken<'_>> {
    let rest = &text[pos..];
    for &(keyword, kind) in KEYWORDS {
        if let Some(after) = rest.strip_prefix(keyword)
            && let Some(token) = lex_keyword(text, pos, keyword.len(), kind, after)
        {
            return Some(token);
        }
    }
    if rest.starts_with('#') {
        return lex_issue(text, pos);
    }
    lex_revision(text, pos)
}

fn lex_issue(text: &str, pos: usize) -> Option<ReferenceToken<'_>> {
    let digits = digits_len(&text[pos + 1..]);
    if digits == 0 {
        return None;
    }
    let id_end = pos + 1 + digits;
    let id = &text[pos + 1..id_end];

    let after = &text[id_end..];
    let note_prefix = if after.starts_with("#note-") {
        Some("#note-".len())
    } else if after.starts_with('-') {
        Some(1)
    } else {
        None
    };
    if let Some(prefix) = note_prefix {
        let note_start = id_end + prefix;
        let note_digits = digits_len(&text[note_start..]);
        let end = note_start + note_digits;
        if note_digits > 0 && is_boundary(text, end) {
            let mut token = ReferenceToken::new(
                ReferenceKind::IssueNote,
                &text[pos..end],
                Target::Id(id),
            );
            token.note = Some(&text[note_start..end]);
            return Some(token);
        }
    }

    is_boundary(text, id_end).then(|| {
        ReferenceToken::new(ReferenceKind::Issue, &text[pos..id_end], Target::Id(id))
    })
}

fn lex_revision(text: &str, pos: usize) -> Option<ReferenceToken<'_>> {
    let rest = &text[pos..];
    let repo_len = identifier_len(rest);
    let (repository, r_at) = if repo_len > 0 && rest.as_bytes().get(repo_len) == Some(&b'|') {
        (Some(&rest[..repo_len]), repo_len + 1)
    } else {
        (None, 0)
    };
    if rest.as_bytes().get(r_at) != Some(&b'r') {
        return None;
    }
    let digits = digits_len(&rest[r_at + 1..]);
    let end = pos + r_at + 1 + digits;
    if digits == 0 || !is_boundary(text, end) {
        return None;
    }
    let mut token = ReferenceToken::new(
        ReferenceKind::Revision,
        &text[pos..end],
        Target::Id(&rest[r_at + 1..r_at + 1 + digits]),
    );
    token.repository = repository;
    Some(token)
}

fn lex_keyword<'a>(
    text: &'a str,
    pos: usize,
    keyword_len: usize,
    kind: ReferenceKind,
    after: &'a str,
) -> Option<ReferenceToken<'a>> {
    let sep_at = pos + keyword_len;
    match after.as_bytes().first()? {
        b'#' => {
            let by_id = matches!(
                kind,
                ReferenceKind::Document
                    | ReferenceKind::Version
                    | ReferenceKind::Forum
                    | ReferenceKind::News
                    | ReferenceKind::Message
                    | ReferenceKind::Project
            );
            let digits = digits_len(&after[1..]);
            let end = sep_at + 1 + digits;
            if !by_id || digits == 0 || !is_boundary(text, end) {
                return None;
            }
            Some(ReferenceToken::new(
                kind,
                &text[pos..end],
                Target::Id(&text[sep_at + 1..end]),
            ))
        }
        b':' => {
            let name_at = sep_at + 1;
            let (name, end) = lex_name(text, name_at)?;
            let mut token = ReferenceToken::new(kind, &text[pos..end], Target::Name(name));
            if matches!(
                kind,
                ReferenceKind::CommitHash | ReferenceKind::Source | ReferenceKind::Export
            ) {
                let repo_len = identifier_len(name);
                if repo_len > 0
                    && name.as_bytes().get(repo_len) == Some(&b'|')
                    && name.len() > repo_len + 1
                {
                    token.repository = Some(&name[..repo_len]);
                    token.target = Target::Name(&name[repo_len + 1..]);
                }
            }
            Some(token)
        }
        _ => None,
    }
}

/// Lex a `"quoted name"` or an unquoted name ending at the first boundary.
///
/// Returns the name and the byte offset after it.
fn lex_name(text: &str, at: usize) -> Option<(&str, usize)> {
    let rest = &text[at..];
    if let Some(quoted) = rest.strip_prefix('"') {
        let close = quoted.find('"')?;
        if close == 0 {
            return None;
        }
        let end = at + 1 + close + 1;
        return is_boundary(text, end).then(|| (&quoted[..close], end));
    }

    for (offset, c) in rest.char_indices() {
        if c.is_whitespace() || c == '<' || c == '>' {
            return None;
        }
        let end = at + offset + c.len_utf8();
        if is_boundary(text, end) {
            return Some((&text[at..end], end));
        }
    }
    None
}

/// Lex `[[page]]`, `[[page|label]]` or `[[project:page]]` at `pos`.
pub(crate) fn lex_wiki_link(text: &str, pos: usize) -> Option<ReferenceToken<'_>> {
    let inner_start = pos + 2;
    let rest = text[pos..].strip_prefix("[[")?;
    let close = rest.find("]]")?;
    let inner = &rest[..close];
    if inner.is_empty() || inner.contains(['\n', '[', ']']) {
        return None;
    }
    let (page, label) = match inner.split_once('|') {
        Some((page, label)) => {
            if label.is_empty() || label.contains('|') {
                return None;
            }
            (page, Some(label))
        }
        None => (inner, None),
    };
    if page.is_empty() {
        return None;
    }
    let end = inner_start + close + 2;
    let (project, page) = match page.split_once(':') {
        Some((project, page)) if !project.is_empty() => (Some(project), page),
        _ => (None, page),
    };
    let mut token = ReferenceToken::new(
        ReferenceKind::WikiLink,
        &text[pos..end],
        Target::Name(page),
    );
    token.project = project;
    token.label = label;
    Some(token)
}

const URL_PROTOCOLS: &[&str] = &["http://", "https://", "ftp://", "ftps://", "sftp://", "www."];

/// Characters after which a bare URL is linked.
pub(crate) fn is_autolink_lead(prev: Option<char>) -> bool {
    match prev {
        None => true,
        Some(c) => {
            c.is_whitespace()
                || matches!(
                    c,
                    '(' | '[' | ',' | ';' | '<' | '>' | '*' | '_' | '+' | '^' | '~' | '-' | '%'
                )
        }
    }
}

/// Lex a bare URL at `pos`.
///
/// Trailing characters other than word characters, `=`, `/`, `;`, and
/// parentheses are left out, as is a closing parenthesis without a match.
pub(crate) fn lex_url(text: &str, pos: usize) -> Option<ReferenceToken<'_>> {
    let rest = &text[pos..];
    let protocol = URL_PROTOCOLS.iter().find(|p| rest.starts_with(**p))?;
    let body_len = rest[protocol.len()..]
        .find(|c: char| c.is_whitespace() || c == '<' || c == '>')
        .unwrap_or(rest.len() - protocol.len());
    let mut url = &rest[..protocol.len() + body_len];
    while let Some(last) = url.chars().next_back() {
        if last.is_alphanumeric() || matches!(last, '_' | '=' | '/' | ';' | '(' | ')') {
            break;
        }
        url = &url[..url.len() - last.len_utf8()];
    }
    if url.ends_with(')') && url.matches('(').count() < url.matches(')').count() {
        url = &url[..url.len() - 1];
    }
    if url.len() <= protocol.len() {
        return None;
    }
    Some(ReferenceToken::new(
        ReferenceKind::AutoLinkUrl,
        url,
        Target::Name(url),
    ))
}

/// Lex a bare e-mail address at `pos`. The caller checks the preceding character.
pub(crate) fn lex_email(text: &str, pos: usize) -> Option<ReferenceToken<'_>> {
    let rest = &text[pos..];
    if !rest.chars().next().is_some_and(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    let local_len = rest
        .find(|c: char| !(c.is_alphanumeric() || matches!(c, '_' | '.' | '!' | '#' | '$' | '%' | '-' | '+' | '/')))
        .unwrap_or(rest.len());
    if rest.as_bytes().get(local_len) != Some(&b'@') {
        return None;
    }
    let domain = &rest[local_len + 1..];
    let mut domain_len = 0;
    let mut labels = 0;
    loop {
        let label = &domain[domain_len..];
        let len = label
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'-')
            .count();
        if len == 0 {
            break;
        }
        labels += 1;
        let next = domain_len + len;
        domain_len = next;
        let more = domain.as_bytes().get(next) == Some(&b'.')
            && domain
                .as_bytes()
                .get(next + 1)
                .is_some_and(u8::is_ascii_alphanumeric);
        if !more {
            break;
        }
        domain_len += 1;
    }
    if labels < 2 {
        return None;
    }
    let address = &rest[..local_len + 1 + domain_len];
    Some(ReferenceToken::new(
        ReferenceKind::AutoLinkEmail,
        address,
        Target::Name(address),
    ))
}
