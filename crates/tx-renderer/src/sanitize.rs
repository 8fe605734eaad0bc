//! HTML escaping and author-markup filtering.
//!
//! Author-supplied tags are never passed through. The only places where
//! raw tag syntax is honoured are the verbatim containers (`<pre>`,
//! `<code>`, `<notextile>`), and for those only a validated `class`
//! attribute survives. Everything else is escaped.

use std::sync::LazyLock;

use regex::Regex;

static SAFE_CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+(?: +[A-Za-z0-9_-]+)*$").unwrap());

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^<>]*>").unwrap());

/// URL schemes allowed in author-written links and images.
const SAFE_SCHEMES: &[&str] = &[
    "http", "https", "ftp", "ftps", "sftp", "mailto", "news", "irc", "ssh", "svn", "git",
];

/// CSS properties accepted in `{...}` style modifiers.
const SAFE_STYLE_PROPERTIES: &[&str] = &[
    "background",
    "background-color",
    "border",
    "border-bottom",
    "border-color",
    "border-left",
    "border-right",
    "border-style",
    "border-top",
    "border-width",
    "color",
    "float",
    "font",
    "font-family",
    "font-size",
    "font-style",
    "font-weight",
    "height",
    "letter-spacing",
    "line-height",
    "margin",
    "margin-bottom",
    "margin-left",
    "margin-right",
    "margin-top",
    "padding",
    "padding-bottom",
    "padding-left",
    "padding-right",
    "padding-top",
    "text-align",
    "text-decoration",
    "text-indent",
    "vertical-align",
    "white-space",
    "width",
];

/// Escape text for use in HTML content or attribute values.
///
/// Escapes `&`, `<`, `>`, and `"`.
pub fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            _ => result.push(c),
        }
    }
    result
}

/// Escape verbatim code content. Quotes are left as typed.
pub(crate) fn escape_code(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            _ => result.push(c),
        }
    }
    result
}

/// Length of the character entity starting at the beginning of `s`.
///
/// Recognizes `&name;`, `&#123;` and `&#x1F;`.
pub(crate) fn entity_len(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    if bytes.first() != Some(&b'&') {
        return None;
    }
    let mut i = 1;
    let numeric = bytes.get(i) == Some(&b'#');
    if numeric {
        i += 1;
        let hex = matches!(bytes.get(i), Some(b'x' | b'X'));
        if hex {
            i += 1;
        }
        let start = i;
        while bytes.get(i).is_some_and(|b| {
            if hex {
                b.is_ascii_hexdigit()
            } else {
                b.is_ascii_digit()
            }
        }) {
            i += 1;
        }
        if i == start {
            return None;
        }
    } else {
        if !bytes.get(i).is_some_and(u8::is_ascii_alphabetic) {
            return None;
        }
        while bytes.get(i).is_some_and(u8::is_ascii_alphanumeric) {
            i += 1;
        }
    }
    (bytes.get(i) == Some(&b';')).then_some(i + 1)
}

/// Remove tags from an HTML fragment.
pub fn strip_tags(html: &str) -> String {
    TAG_RE.replace_all(html, "").into_owned()
}

/// Decode the character entities the renderer itself produces, plus numeric ones.
///
/// Unknown named entities are left untouched.
pub fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let Some(len) = entity_len(rest) else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let body = &rest[1..len - 1];
        let decoded = match body {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            "para" => Some('¶'),
            _ => body.strip_prefix('#').and_then(|num| {
                let code = match num.strip_prefix(['x', 'X']) {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => num.parse().ok(),
                };
                code.and_then(char::from_u32)
            }),
        };
        match decoded {
            Some(c) => out.push(c),
            None => out.push_str(&rest[..len]),
        }
        rest = &rest[len..];
    }
    out.push_str(rest);
    out
}

/// Check a URL against the scheme allowlist.
///
/// Relative URLs are accepted. Control characters and whitespace are ignored
/// while reading the scheme so `java\tscript:` is still caught.
pub(crate) fn is_safe_url(url: &str) -> bool {
    let compact: String = url
        .chars()
        .filter(|c| !c.is_control() && !c.is_whitespace())
        .collect();
    let Some(colon) = compact.find(':') else {
        return true;
    };
    let scheme = &compact[..colon];
    if scheme.contains(['/', '?', '#']) {
        return true;
    }
    let scheme = scheme.to_ascii_lowercase();
    SAFE_SCHEMES.contains(&scheme.as_str())
}

/// Check a class attribute value: space-separated `[A-Za-z0-9_-]` tokens.
pub(crate) fn is_safe_class(value: &str) -> bool {
    SAFE_CLASS_RE.is_match(value)
}

/// Filter an inline style declaration list.
///
/// Keeps declarations whose property is allowlisted and whose value cannot
/// load resources or break out of the attribute. Returns `None` when nothing
/// survives.
pub(crate) fn filter_style(style: &str) -> Option<String> {
    let mut out = String::new();
    for declaration in style.split(';') {
        let Some((property, value)) = declaration.split_once(':') else {
            continue;
        };
        let property = property.trim().to_ascii_lowercase();
        let value = value.trim();
        if value.is_empty() || !SAFE_STYLE_PROPERTIES.contains(&property.as_str()) {
            continue;
        }
        let lowered = value.to_ascii_lowercase();
        if lowered.contains("url(")
            || lowered.contains("expression")
            || lowered.contains("/*")
            || value.contains(['"', '\'', '<', '>', '\\', '&'])
        {
            continue;
        }
        out.push_str(&property);
        out.push(':');
        out.push_str(value);
        out.push(';');
    }
    (!out.is_empty()).then_some(out)
}

/// An attribute of an author-written tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct TagAttr<'a> {
    pub name: String,
    pub value: Option<&'a str>,
    pub quote: Option<char>,
}

/// An author-written tag, as read by [`parse_tag`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Tag<'a> {
    /// Lower-cased tag name.
    pub name: String,
    pub closing: bool,
    pub attrs: Vec<TagAttr<'a>>,
    /// Set when attributes are not separated by whitespace (e.g.
    /// `class="a"onclick="b"`). Malformed tags keep no attributes.
    pub malformed: bool,
    /// Byte length of the whole tag, `<` through `>`.
    pub len: usize,
}

impl Tag<'_> {
    /// The validated `class` attribute, rendered with its original quoting
    /// and a leading space.
    pub fn class_attr(&self) -> Option<String> {
        let value = self.class_value()?;
        let quote = self
            .attrs
            .iter()
            .find(|a| a.name == "class")
            .and_then(|a| a.quote)
            .unwrap_or('"');
        Some(format!(" class={quote}{value}{quote}"))
    }

    /// The validated `class` attribute value.
    pub fn class_value(&self) -> Option<&str> {
        if self.malformed || self.closing {
            return None;
        }
        let value = self.attrs.iter().find(|a| a.name == "class")?.value?;
        is_safe_class(value).then_some(value)
    }
}

/// Read a tag at the start of `s`.
///
/// Returns `None` when `s` does not start with a complete tag, in which case
/// the `<` is ordinary text.
pub(crate) fn parse_tag(s: &str) -> Option<Tag<'_>> {
    let bytes = s.as_bytes();
    if bytes.first() != Some(&b'<') {
        return None;
    }
    let mut i = 1;
    let closing = bytes.get(i) == Some(&b'/');
    if closing {
        i += 1;
    }
    let name_start = i;
    if !bytes.get(i).is_some_and(u8::is_ascii_alphabetic) {
        return None;
    }
    while bytes
        .get(i)
        .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'-')
    {
        i += 1;
    }
    let name = s[name_start..i].to_ascii_lowercase();

    let mut attrs = Vec::new();
    let mut malformed = false;
    loop {
        let ws_start = i;
        while bytes.get(i).is_some_and(u8::is_ascii_whitespace) {
            i += 1;
        }
        let had_space = i > ws_start;
        match bytes.get(i)? {
            b'>' => {
                i += 1;
                break;
            }
            b'/' if bytes.get(i + 1) == Some(&b'>') => {
                i += 2;
                break;
            }
            _ => {}
        }
        if !had_space {
            malformed = true;
        }

        let attr_start = i;
        while bytes.get(i).is_some_and(|b| {
            !b.is_ascii_whitespace() && !matches!(b, b'=' | b'>' | b'/' | b'"' | b'\'' | b'<')
        }) {
            i += 1;
        }
        if i == attr_start {
            // Stray character where an attribute name should be.
            if bytes[i] == b'<' {
                return None;
            }
            malformed = true;
            i += 1;
            continue;
        }
        let attr_name = s[attr_start..i].to_ascii_lowercase();

        let mut j = i;
        while bytes.get(j).is_some_and(u8::is_ascii_whitespace) {
            j += 1;
        }
        if bytes.get(j) != Some(&b'=') {
            attrs.push(TagAttr {
                name: attr_name,
                value: None,
                quote: None,
            });
            continue;
        }
        j += 1;
        while bytes.get(j).is_some_and(u8::is_ascii_whitespace) {
            j += 1;
        }
        let (value, quote) = match bytes.get(j)? {
            q @ (b'"' | b'\'') => {
                let close = s[j + 1..].find(char::from(*q))? + j + 1;
                let value = &s[j + 1..close];
                j = close + 1;
                (value, Some(char::from(*q)))
            }
            _ => {
                let start = j;
                while bytes
                    .get(j)
                    .is_some_and(|b| !b.is_ascii_whitespace() && *b != b'>')
                {
                    j += 1;
                }
                (&s[start..j], None)
            }
        };
        i = j;
        attrs.push(TagAttr {
            name: attr_name,
            value: Some(value),
            quote,
        });
    }

    Some(Tag {
        name,
        closing,
        attrs,
        malformed,
        len: i,
    })
}

/// Case-insensitive ASCII prefix test.
pub(crate) fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Find `needle` in `haystack` ignoring ASCII case.
pub(crate) fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() || hay.len() < needle.len() {
        return None;
    }
    (0..=hay.len() - needle.len()).find(|&i| hay[i..i + needle.len()].eq_ignore_ascii_case(needle))
}
