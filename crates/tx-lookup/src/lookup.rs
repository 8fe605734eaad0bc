//! Lookup service trait.

use crate::entity::{
    Board, Changeset, Document, Issue, Message, News, Project, Repository, Version, WikiPage,
};

/// Key for objects addressable either by numeric id or by title.
///
/// Id lookups are global. Title lookups are case-insensitive exact matches
/// within a project and find nothing without one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectRef<'a> {
    Id(u64),
    Title(&'a str),
}

/// Key for changeset lookups within one repository.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangesetRef<'a> {
    /// Exact revision number or name.
    Revision(&'a str),
    /// Prefix of the SCM hash.
    Scmid(&'a str),
}

/// Read-only access to the domain objects referenced from wiki text.
///
/// Implemented by the host's persistence layer. Implementations are expected to
/// apply their own visibility rules: an object the current user cannot see should
/// simply not be found. The renderer never writes through this interface and
/// treats every miss as "leave the token literal".
pub trait Lookup: Send + Sync {
    /// Find a project by its URL identifier.
    fn find_project(&self, identifier: &str) -> Option<Project>;

    fn find_project_by_id(&self, id: u64) -> Option<Project>;

    /// Find a project by display name, case-insensitively.
    fn find_project_by_name(&self, name: &str) -> Option<Project>;

    fn find_issue(&self, id: u64) -> Option<Issue>;

    fn find_version(&self, project: Option<&Project>, key: ObjectRef<'_>) -> Option<Version>;

    fn find_document(&self, project: Option<&Project>, key: ObjectRef<'_>) -> Option<Document>;

    fn find_board(&self, project: Option<&Project>, key: ObjectRef<'_>) -> Option<Board>;

    /// Find a message by id, or by subject among the project's forums.
    fn find_message(&self, project: Option<&Project>, key: ObjectRef<'_>) -> Option<Message>;

    fn find_news(&self, project: Option<&Project>, key: ObjectRef<'_>) -> Option<News>;

    /// Find a repository of `project`.
    ///
    /// With `identifier` set to `None` the project's default repository is
    /// returned (or its only repository when none is flagged as default).
    fn find_repository(&self, project: &Project, identifier: Option<&str>) -> Option<Repository>;

    fn find_changeset(&self, repository: &Repository, key: ChangesetRef<'_>) -> Option<Changeset>;

    /// Find a wiki page by title.
    ///
    /// `title` is already normalized with [`WikiPage::titleize`]; matching is
    /// case-insensitive.
    fn find_wiki_page(&self, project: &Project, title: &str) -> Option<WikiPage>;

    /// Check whether a wiki page exists.
    fn wiki_page_exists(&self, project: &Project, title: &str) -> bool {
        self.find_wiki_page(project, title).is_some()
    }
}
