//! Syntax highlighting plugin.
//!
//! Code blocks tagged with a language (`<pre><code class="ruby">` or
//! `bc(ruby).`) are offered to the registered [`Highlighter`]. Its output is
//! trusted and placed inside the `<code>` element as is, which then gains a
//! `syntaxhl` class. Returning `None` falls back to escaped plain text.
//!
//! # Example
//!
//! ```ignore
//! use tx_renderer::{Highlighter, Renderer};
//!
//! struct KeywordHighlighter;
//!
//! impl Highlighter for KeywordHighlighter {
//!     fn highlight(&self, language: &str, source: &str) -> Option<String> {
//!         (language == "ruby").then(|| source.replace("def", "<span class=\"k\">def</span>"))
//!     }
//! }
//!
//! let renderer = Renderer::new(&lookup).with_highlighter(KeywordHighlighter);
//! ```

/// Turns source code into highlighted HTML.
pub trait Highlighter: Send + Sync {
    /// Highlight `source` written in `language`.
    ///
    /// Returns `None` for unsupported languages. Returned HTML must escape
    /// the source's own markup.
    fn highlight(&self, language: &str, source: &str) -> Option<String>;
}
