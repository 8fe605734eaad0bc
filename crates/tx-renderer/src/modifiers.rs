//! Textile attribute modifiers.
//!
//! Blocks, spans, table cells, and images accept a run of modifiers between
//! their marker and content: `(class#id)`, `{style}`, `[lang]`, and for
//! blocks the alignment markers `<`, `>`, `=`, `<>`.

use std::fmt::Write;

use crate::sanitize::{escape_html, filter_style, is_safe_class};

/// Horizontal alignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
    Center,
    Justify,
}

impl Align {
    fn css(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Center => "center",
            Self::Justify => "justify",
        }
    }
}

/// Parsed attribute modifiers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub class: Option<String>,
    pub id: Option<String>,
    /// Filtered style declarations.
    pub style: Option<String>,
    pub lang: Option<String>,
    pub align: Option<Align>,
}

impl Modifiers {
    /// Parse the modifier run at the start of `s`.
    ///
    /// Returns the modifiers and the number of bytes consumed. Parsing stops
    /// at the first thing that is not a well-formed modifier; nothing is
    /// consumed for it.
    pub fn parse(s: &str, allow_align: bool) -> (Self, usize) {
        let mut mods = Self::default();
        let mut pos = 0;
        let bytes = s.as_bytes();
        while let Some(&b) = bytes.get(pos) {
            match b {
                b'(' => {
                    let Some(close) = s[pos..].find(')') else {
                        break;
                    };
                    if !mods.set_class_id(&s[pos + 1..pos + close]) {
                        break;
                    }
                    pos += close + 1;
                }
                b'{' => {
                    let Some(close) = s[pos..].find('}') else {
                        break;
                    };
                    let inner = &s[pos + 1..pos + close];
                    if inner.contains('\n') || inner.trim().is_empty() {
                        break;
                    }
                    if let Some(style) = filter_style(inner) {
                        mods.style = Some(style);
                    }
                    pos += close + 1;
                }
                b'[' => {
                    let Some(close) = s[pos..].find(']') else {
                        break;
                    };
                    let inner = &s[pos + 1..pos + close];
                    if inner.is_empty() || !inner.bytes().all(|c| c.is_ascii_alphabetic() || c == b'-')
                    {
                        break;
                    }
                    mods.lang = Some(inner.to_owned());
                    pos += close + 1;
                }
                b'<' if allow_align => {
                    if bytes.get(pos + 1) == Some(&b'>') {
                        mods.align = Some(Align::Justify);
                        pos += 2;
                    } else {
                        mods.align = Some(Align::Left);
                        pos += 1;
                    }
                }
                b'>' if allow_align => {
                    mods.align = Some(Align::Right);
                    pos += 1;
                }
                b'=' if allow_align => {
                    mods.align = Some(Align::Center);
                    pos += 1;
                }
                _ => break,
            }
        }
        (mods, pos)
    }

    fn set_class_id(&mut self, inner: &str) -> bool {
        let (class, id) = match inner.split_once('#') {
            Some((class, id)) => (class.trim(), Some(id.trim())),
            None => (inner.trim(), None),
        };
        if class.is_empty() && id.is_none_or(str::is_empty) {
            return false;
        }
        if !class.is_empty() && !is_safe_class(class) {
            return false;
        }
        if let Some(id) = id
            && (id.is_empty() || !is_safe_class(id) || id.contains(' '))
        {
            return false;
        }
        if !class.is_empty() {
            self.class = Some(class.to_owned());
        }
        if let Some(id) = id {
            self.id = Some(id.to_owned());
        }
        true
    }

    /// Style attribute value including the alignment declaration.
    pub fn style_value(&self) -> Option<String> {
        let mut style = self.style.clone().unwrap_or_default();
        if let Some(align) = self.align {
            let _ = write!(style, "text-align:{};", align.css());
        }
        (!style.is_empty()).then_some(style)
    }

    /// Render as HTML attributes, each preceded by a space.
    pub fn to_attrs(&self) -> String {
        let mut out = String::new();
        if let Some(class) = &self.class {
            let _ = write!(out, " class=\"{}\"", escape_html(class));
        }
        if let Some(id) = &self.id {
            let _ = write!(out, " id=\"{}\"", escape_html(id));
        }
        if let Some(style) = self.style_value() {
            let _ = write!(out, " style=\"{}\"", escape_html(&style));
        }
        if let Some(lang) = &self.lang {
            let _ = write!(out, " lang=\"{}\"", escape_html(lang));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_class_and_id() {
        let (mods, len) = Modifiers::parse("(note#intro). text", true);
        assert_eq!(len, 12);
        assert_eq!(mods.class.as_deref(), Some("note"));
        assert_eq!(mods.id.as_deref(), Some("intro"));
    }

    #[test]
    fn test_parse_style_and_align() {
        let (mods, len) = Modifiers::parse("{color:red}=. x", true);
        assert_eq!(len, 12);
        assert_eq!(mods.to_attrs(), " style=\"color:red;text-align:center;\"");
    }

    #[test]
    fn test_parse_justify() {
        let (mods, _) = Modifiers::parse("<>", true);
        assert_eq!(mods.align, Some(Align::Justify));
    }

    #[test]
    fn test_align_not_allowed() {
        let (mods, len) = Modifiers::parse(">text", false);
        assert_eq!(len, 0);
        assert_eq!(mods, Modifiers::default());
    }

    #[test]
    fn test_unsafe_class_stops_parsing() {
        let (mods, len) = Modifiers::parse("(a\"onclick). x", true);
        assert_eq!(len, 0);
        assert_eq!(mods, Modifiers::default());
    }

    #[test]
    fn test_unsafe_style_is_dropped() {
        let (mods, len) = Modifiers::parse("{background:url(x)}", true);
        assert_eq!(len, 19);
        assert_eq!(mods.style, None);
    }

    #[test]
    fn test_lang() {
        let (mods, len) = Modifiers::parse("[fr]", false);
        assert_eq!(len, 4);
        assert_eq!(mods.to_attrs(), " lang=\"fr\"");

        let (_, len) = Modifiers::parse("[[Page]]", false);
        assert_eq!(len, 0);
    }
}
