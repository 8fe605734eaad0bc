//! Domain lookup services for the tx wiki renderer.
//!
//! The renderer resolves cross-reference tokens (`#3`, `r12`, `version:1.0`,
//! `[[Wiki page]]`, ...) against live domain objects. This crate defines the
//! narrow read-only interface it calls through, plus the value types the
//! interface hands back.
//!
//! # Architecture
//!
//! The crate provides:
//! - Entity value types ([`Project`], [`Issue`], [`Changeset`], ...) carrying only
//!   the display attributes the renderer needs
//! - [`Lookup`] trait implemented by the host's persistence layer
//! - [`MemoryLookup`], an in-memory implementation that doubles as a test fixture
//!   and can be loaded from a TOML file
//!
//! # Example
//!
//! ```ignore
//! use tx_lookup::{Issue, Lookup, MemoryLookup, Project};
//!
//! let lookup = MemoryLookup::new()
//!     .with_project(Project::new(1, "ecookbook", "eCookbook"))
//!     .with_issue(Issue::new(3, 1, "Error 281 when updating a recipe", "New"));
//!
//! assert!(lookup.find_issue(3).is_some());
//! ```

mod entity;
mod lookup;
mod memory;

pub use entity::{
    Attachment, Board, Changeset, Document, Issue, Message, News, Project, Repository, Version,
    WikiPage,
};
pub use lookup::{ChangesetRef, Lookup, ObjectRef};
pub use memory::{LookupError, MemoryLookup};
