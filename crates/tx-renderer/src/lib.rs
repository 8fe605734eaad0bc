//! Textile to safe HTML renderer with tracker reference resolution.
//!
//! Turns wiki text written in a Textile dialect into HTML, linking
//! references to tracker objects (`#3`, `r758`, `document:"Specs"`,
//! `[[Wiki page]]`) through a [`Lookup`](tx_lookup::Lookup) service.
//!
//! # Architecture
//!
//! A render runs as a pipeline:
//!
//! 1. **Blocks**: text is split into paragraphs, headings, lists, tables,
//!    verbatim blocks and macro invocations.
//! 2. **Macros**: `{{include}}` splices other pages in, registered [`Macro`]s
//!    expand, `{{toc}}` stays as a marker.
//! 3. **Inline**: block text gets links, images, references and phrase
//!    formatting. Anything that is not recognized markup is escaped.
//! 4. **Assembly**: headings receive unique anchors (and optional section
//!    edit links), the table of contents is filled in, blocks are joined.
//!
//! Rendering is total: unresolved references, unsafe URLs and malformed
//! markup come out as literal text, and macro failures as an inline error
//! box plus an entry in [`RenderResult::warnings`].
//!
//! # Example
//!
//! ```ignore
//! use tx_lookup::{Issue, MemoryLookup, Project};
//! use tx_renderer::{RenderContext, Renderer};
//!
//! let project = Project::new(1, "ecookbook", "eCookbook").with_wiki("Start");
//! let lookup = MemoryLookup::new()
//!     .with_project(project.clone())
//!     .with_issue(Issue::new(3, 1, "Error 281 when updating a recipe", "New"));
//!
//! let ctx = RenderContext::new().with_project(project);
//! let result = Renderer::new(&lookup).render("Fixed in #3", &ctx);
//! assert!(result.html.contains("href=\"/issues/3\""));
//! ```

mod anchor;
mod block;
mod context;
mod highlight;
mod inline;
mod macros;
mod modifiers;
mod reference;
mod renderer;
mod resolver;
mod routes;
mod sanitize;
mod span;

pub use anchor::{HeadingEntry, sanitize_anchor};
pub use context::{Container, RenderContext, SectionEditLinks, WikiLinkMode};
pub use highlight::Highlighter;
pub use macros::{Macro, MacroContext, MacroError, MacroOutput};
pub use renderer::{DEFAULT_MAX_INCLUDE_DEPTH, RenderResult, Renderer, render};
pub use routes::{DefaultRoutes, RepositoryEntry, Routes, WikiTarget};
pub use sanitize::{decode_entities, escape_html, strip_tags};
