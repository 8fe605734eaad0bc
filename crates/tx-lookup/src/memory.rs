//! In-memory lookup implementation.
//!
//! Provides [`MemoryLookup`] for unit testing and for hosts (like the `tx` CLI)
//! that render against a fixed data set loaded from a TOML fixture file.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::entity::{
    Attachment, Board, Changeset, Document, Issue, Message, News, Project, Repository, Version,
    WikiPage,
};
use crate::lookup::{ChangesetRef, Lookup, ObjectRef};

/// Error returned when loading fixture data fails.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// Fixture file not found.
    #[error("Fixture file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// In-memory lookup over plain vectors of entities.
///
/// Use the builder methods to configure test data, or [`MemoryLookup::load`]
/// to read a fixture file with one array of tables per entity kind:
///
/// ```toml
/// [[projects]]
/// id = 1
/// identifier = "ecookbook"
/// name = "eCookbook"
/// wiki_start_page = "CookBook_documentation"
///
/// [[issues]]
/// id = 3
/// project_id = 1
/// subject = "Error 281 when updating a recipe"
/// status = "New"
/// ```
///
/// # Example
///
/// ```ignore
/// use tx_lookup::{Lookup, MemoryLookup, Project};
///
/// let lookup = MemoryLookup::new()
///     .with_project(Project::new(1, "ecookbook", "eCookbook").with_wiki("Start"));
/// assert!(lookup.find_project("ecookbook").is_some());
/// ```
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct MemoryLookup {
    projects: Vec<Project>,
    issues: Vec<Issue>,
    versions: Vec<Version>,
    repositories: Vec<Repository>,
    changesets: Vec<Changeset>,
    documents: Vec<Document>,
    boards: Vec<Board>,
    messages: Vec<Message>,
    news: Vec<News>,
    wiki_pages: Vec<WikiPage>,
    attachments: Vec<Attachment>,
}

impl MemoryLookup {
    /// Create an empty lookup.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load fixture data from a TOML file.
    pub fn load(path: &Path) -> Result<Self, LookupError> {
        if !path.exists() {
            return Err(LookupError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let lookup = Self::from_toml(&content)?;
        tracing::debug!(
            path = %path.display(),
            projects = lookup.projects.len(),
            issues = lookup.issues.len(),
            wiki_pages = lookup.wiki_pages.len(),
            "Loaded fixture data"
        );
        Ok(lookup)
    }

    /// Parse fixture data from a TOML string.
    ///
    /// Wiki page titles are normalized after parsing.
    pub fn from_toml(content: &str) -> Result<Self, LookupError> {
        let mut lookup: Self = toml::from_str(content)?;
        for page in &mut lookup.wiki_pages {
            page.title = WikiPage::titleize(&page.title);
        }
        Ok(lookup)
    }

    /// Attachments declared in the fixture data.
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    #[must_use]
    pub fn with_project(mut self, project: Project) -> Self {
        self.projects.push(project);
        self
    }

    #[must_use]
    pub fn with_issue(mut self, issue: Issue) -> Self {
        self.issues.push(issue);
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: Version) -> Self {
        self.versions.push(version);
        self
    }

    #[must_use]
    pub fn with_repository(mut self, repository: Repository) -> Self {
        self.repositories.push(repository);
        self
    }

    #[must_use]
    pub fn with_changeset(mut self, changeset: Changeset) -> Self {
        self.changesets.push(changeset);
        self
    }

    #[must_use]
    pub fn with_document(mut self, document: Document) -> Self {
        self.documents.push(document);
        self
    }

    #[must_use]
    pub fn with_board(mut self, board: Board) -> Self {
        self.boards.push(board);
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    #[must_use]
    pub fn with_news(mut self, news: News) -> Self {
        self.news.push(news);
        self
    }

    #[must_use]
    pub fn with_wiki_page(mut self, page: WikiPage) -> Self {
        self.wiki_pages.push(page);
        self
    }

    #[must_use]
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// Find an entity by id, or by case-insensitive title within `project`.
fn find_scoped<'a, T>(
    items: &'a [T],
    project: Option<&Project>,
    key: ObjectRef<'_>,
    id: impl Fn(&T) -> u64,
    project_id: impl Fn(&T) -> u64,
    title: impl Fn(&T) -> &str,
) -> Option<&'a T> {
    match key {
        ObjectRef::Id(wanted) => items.iter().find(|&item| id(item) == wanted),
        ObjectRef::Title(wanted) => {
            let project = project?;
            let wanted = wanted.to_lowercase();
            items
                .iter()
                .find(|&item| project_id(item) == project.id && title(item).to_lowercase() == wanted)
        }
    }
}

impl Lookup for MemoryLookup {
    fn find_project(&self, identifier: &str) -> Option<Project> {
        self.projects
            .iter()
            .find(|p| p.identifier == identifier)
            .cloned()
    }

    fn find_project_by_id(&self, id: u64) -> Option<Project> {
        self.projects.iter().find(|p| p.id == id).cloned()
    }

    fn find_project_by_name(&self, name: &str) -> Option<Project> {
        let wanted = name.to_lowercase();
        self.projects
            .iter()
            .find(|p| p.name.to_lowercase() == wanted)
            .cloned()
    }

    fn find_issue(&self, id: u64) -> Option<Issue> {
        self.issues.iter().find(|i| i.id == id).cloned()
    }

    fn find_version(&self, project: Option<&Project>, key: ObjectRef<'_>) -> Option<Version> {
        find_scoped(
            &self.versions,
            project,
            key,
            |v| v.id,
            |v| v.project_id,
            |v| v.name.as_str(),
        )
        .cloned()
    }

    fn find_document(&self, project: Option<&Project>, key: ObjectRef<'_>) -> Option<Document> {
        find_scoped(
            &self.documents,
            project,
            key,
            |d| d.id,
            |d| d.project_id,
            |d| d.title.as_str(),
        )
        .cloned()
    }

    fn find_board(&self, project: Option<&Project>, key: ObjectRef<'_>) -> Option<Board> {
        find_scoped(
            &self.boards,
            project,
            key,
            |b| b.id,
            |b| b.project_id,
            |b| b.name.as_str(),
        )
        .cloned()
    }

    fn find_message(&self, project: Option<&Project>, key: ObjectRef<'_>) -> Option<Message> {
        let board_project = |m: &Message| {
            self.boards
                .iter()
                .find(|b| b.id == m.board_id)
                .map_or(0, |b| b.project_id)
        };
        find_scoped(
            &self.messages,
            project,
            key,
            |m| m.id,
            board_project,
            |m| m.subject.as_str(),
        )
        .cloned()
    }

    fn find_news(&self, project: Option<&Project>, key: ObjectRef<'_>) -> Option<News> {
        find_scoped(
            &self.news,
            project,
            key,
            |n| n.id,
            |n| n.project_id,
            |n| n.title.as_str(),
        )
        .cloned()
    }

    fn find_repository(&self, project: &Project, identifier: Option<&str>) -> Option<Repository> {
        let mut repositories = self
            .repositories
            .iter()
            .filter(|r| r.project_id == project.id);
        match identifier {
            Some(identifier) => repositories
                .find(|r| r.identifier.as_deref() == Some(identifier))
                .cloned(),
            None => {
                let all: Vec<&Repository> = repositories.collect();
                all.iter()
                    .find(|r| r.is_default)
                    .or_else(|| if all.len() == 1 { all.first() } else { None })
                    .map(|r| (*r).clone())
            }
        }
    }

    fn find_changeset(&self, repository: &Repository, key: ChangesetRef<'_>) -> Option<Changeset> {
        let mut changesets = self
            .changesets
            .iter()
            .filter(|c| c.repository_id == repository.id);
        let found = match key {
            ChangesetRef::Revision(revision) => changesets.find(|c| c.revision == revision),
            ChangesetRef::Scmid(prefix) => changesets.find(|c| {
                c.scmid
                    .as_deref()
                    .is_some_and(|scmid| scmid.starts_with(prefix))
            }),
        };
        found.cloned()
    }

    fn find_wiki_page(&self, project: &Project, title: &str) -> Option<WikiPage> {
        let wanted = title.to_lowercase();
        self.wiki_pages
            .iter()
            .find(|p| p.project_id == project.id && p.title.to_lowercase() == wanted)
            .cloned()
    }
}
