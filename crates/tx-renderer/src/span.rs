//! Phrase modifiers (`*strong*`, `_em_`, `-del-`, ...) and text escaping.
//!
//! Runs after atomic tokens have been replaced by placeholder characters, so
//! markers inside links, code, and URLs are out of reach here.

use std::fmt::Write;

use crate::modifiers::Modifiers;
use crate::sanitize::entity_len;

/// Markers and the element each produces. Double markers come first.
const SPANS: &[(&str, &str)] = &[
    ("**", "b"),
    ("__", "i"),
    ("??", "cite"),
    ("*", "strong"),
    ("_", "em"),
    ("-", "del"),
    ("+", "ins"),
    ("^", "sup"),
    ("~", "sub"),
    ("%", "span"),
];

/// Format phrase modifiers and escape the remaining text.
pub(crate) fn format_spans(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    render(&chars, &mut out);
    out
}

/// Escape text the way unformatted runs are escaped.
pub(crate) fn escape_text(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        i += push_escaped(&chars, i, &mut out);
    }
    out
}

struct SpanMatch<'a> {
    tag: &'static str,
    modifiers: Modifiers,
    content: &'a [char],
    end: usize,
}

fn render(chars: &[char], out: &mut String) {
    let mut i = 0;
    while i < chars.len() {
        if let Some(span) = match_span(chars, i) {
            let _ = write!(out, "<{}{}>", span.tag, span.modifiers.to_attrs());
            render(span.content, out);
            let _ = write!(out, "</{}>", span.tag);
            i = span.end;
            continue;
        }
        i += push_escaped(chars, i, out);
    }
}

/// Escape the character at `i`, returning how many characters were consumed.
fn push_escaped(chars: &[char], i: usize, out: &mut String) -> usize {
    match chars[i] {
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '\n' => out.push_str("<br />"),
        '&' => {
            let lookahead: String = chars[i..chars.len().min(i + 12)].iter().collect();
            match entity_len(&lookahead) {
                Some(len) => {
                    out.push_str(&lookahead[..len]);
                    return len;
                }
                None => out.push_str("&amp;"),
            }
        }
        c => out.push(c),
    }
    1
}

fn match_span(chars: &[char], i: usize) -> Option<SpanMatch<'_>> {
    if i > 0 && chars[i - 1].is_alphanumeric() {
        return None;
    }
    for &(marker, tag) in SPANS {
        let marker: Vec<char> = marker.chars().collect();
        if !chars[i..].starts_with(&marker) {
            continue;
        }
        let open_end = i + marker.len();
        let Some(&first) = chars.get(open_end) else {
            continue;
        };
        if first.is_whitespace() || (marker.len() == 1 && first == marker[0]) {
            continue;
        }
        let Some(close) = find_closer(chars, open_end, &marker) else {
            continue;
        };
        let content = &chars[open_end..close];
        let (modifiers, content) = split_modifiers(content);
        return Some(SpanMatch {
            tag,
            modifiers,
            content,
            end: close + marker.len(),
        });
    }
    None
}

fn find_closer(chars: &[char], from: usize, marker: &[char]) -> Option<usize> {
    let mut j = from + 1;
    while j < chars.len() {
        if chars[j] == '\n' {
            return None;
        }
        if chars[j..].starts_with(marker) {
            let before = chars[j - 1];
            let after = chars.get(j + marker.len()).copied();
            let single = marker.len() == 1;
            let closes = !before.is_whitespace()
                && after.is_none_or(|c| !c.is_alphanumeric())
                && !(single && (after == Some(marker[0]) || before == marker[0]));
            if closes {
                return Some(j);
            }
        }
        j += 1;
    }
    None
}

/// Split leading `(class)`/`{style}`/`[lang]` modifiers off span content.
///
/// Modifiers are only taken when some content remains after them.
fn split_modifiers(content: &[char]) -> (Modifiers, &[char]) {
    if !matches!(content.first(), Some('(' | '{' | '[')) {
        return (Modifiers::default(), content);
    }
    let text: String = content.iter().collect();
    let (modifiers, len) = Modifiers::parse(&text, false);
    let consumed = text[..len].chars().count();
    if len == 0 || consumed >= content.len() {
        return (Modifiers::default(), content);
    }
    (modifiers, &content[consumed..])
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_simple_spans() {
        assert_eq!(format_spans("*strong*"), "<strong>strong</strong>");
        assert_eq!(format_spans("**b** and __i__"), "<b>b</b> and <i>i</i>");
        assert_eq!(format_spans("_em_ -del- +ins+"), "<em>em</em> <del>del</del> <ins>ins</ins>");
        assert_eq!(format_spans("^sup^ ~sub~ ??cite??"), "<sup>sup</sup> <sub>sub</sub> <cite>cite</cite>");
    }

    #[test]
    fn test_nested_spans() {
        assert_eq!(
            format_spans("*_+bold italic underline+_*"),
            "<strong><em><ins>bold italic underline</ins></em></strong>"
        );
    }

    #[test]
    fn test_span_with_style() {
        assert_eq!(
            format_spans("%{color:red}red text%"),
            "<span style=\"color:red;\">red text</span>"
        );
        assert_eq!(
            format_spans("*(note)important*"),
            "<strong class=\"note\">important</strong>"
        );
        assert_eq!(format_spans("*(note)*"), "<strong>(note)</strong>");
    }

    #[test]
    fn test_markers_inside_words_are_text() {
        assert_eq!(format_spans("snake_case_name"), "snake_case_name");
        assert_eq!(format_spans("2*3*4"), "2*3*4");
        assert_eq!(format_spans("a - b - c"), "a - b - c");
        assert_eq!(format_spans("well-known-thing"), "well-known-thing");
    }

    #[test]
    fn test_hyphen_runs_are_not_strike() {
        assert_eq!(format_spans("a --- b"), "a --- b");
        assert_eq!(format_spans("---"), "---");
    }

    #[test]
    fn test_span_does_not_cross_lines() {
        assert_eq!(format_spans("*open\nclose*"), "*open<br />close*");
    }

    #[test]
    fn test_escaping() {
        assert_eq!(
            escape_text("<b>\"x\" & &amp; &#39;</b>"),
            "&lt;b&gt;\"x\" &amp; &amp; &#39;&lt;/b&gt;"
        );
        assert_eq!(format_spans("<script>*x*</script>"), "&lt;script&gt;<strong>x</strong>&lt;/script&gt;");
    }
}
