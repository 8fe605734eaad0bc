//! Domain entity value types.
//!
//! Each type carries only what the renderer reads: identifiers for building
//! URLs and display attributes for link labels and titles.

use serde::{Deserialize, Serialize};

/// A project scope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Numeric project id.
    pub id: u64,
    /// URL identifier (e.g., "ecookbook").
    pub identifier: String,
    /// Display name.
    pub name: String,
    /// Title of the wiki start page, `None` when the project has no wiki.
    #[serde(default)]
    pub wiki_start_page: Option<String>,
}

impl Project {
    /// Create a project without a wiki.
    #[must_use]
    pub fn new(id: u64, identifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            identifier: identifier.into(),
            name: name.into(),
            wiki_start_page: None,
        }
    }

    /// Enable the project wiki with the given start page.
    #[must_use]
    pub fn with_wiki(mut self, start_page: impl Into<String>) -> Self {
        self.wiki_start_page = Some(start_page.into());
        self
    }

    /// Whether the project has a wiki.
    pub fn has_wiki(&self) -> bool {
        self.wiki_start_page.is_some()
    }
}

/// An issue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: u64,
    pub project_id: u64,
    pub subject: String,
    /// Status display name (e.g., "New", "Closed").
    pub status: String,
    #[serde(default = "default_ref_id")]
    pub tracker_id: u64,
    #[serde(default = "default_ref_id")]
    pub status_id: u64,
    /// Whether the status is a closed one.
    #[serde(default)]
    pub closed: bool,
}

fn default_ref_id() -> u64 {
    1
}

impl Issue {
    /// Create an open issue with tracker and status ids of 1.
    #[must_use]
    pub fn new(
        id: u64,
        project_id: u64,
        subject: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            id,
            project_id,
            subject: subject.into(),
            status: status.into(),
            tracker_id: 1,
            status_id: 1,
            closed: false,
        }
    }

    /// Mark the issue as closed with the given status id.
    #[must_use]
    pub fn with_closed_status(mut self, status_id: u64) -> Self {
        self.status_id = status_id;
        self.closed = true;
        self
    }

    /// CSS classes describing the issue's tracker and status.
    ///
    /// ```ignore
    /// assert_eq!(issue.css_classes(), "issue tracker-1 status-5 closed");
    /// ```
    pub fn css_classes(&self) -> String {
        let mut classes = format!(
            "issue tracker-{} status-{}",
            self.tracker_id, self.status_id
        );
        if self.closed {
            classes.push_str(" closed");
        }
        classes
    }
}

/// A project version (milestone).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub id: u64,
    pub project_id: u64,
    pub name: String,
}

/// A source repository attached to a project.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: u64,
    pub project_id: u64,
    /// Repository identifier used in URLs and `repo|` prefixes.
    #[serde(default)]
    pub identifier: Option<String>,
    /// Whether this is the project's main repository.
    #[serde(default)]
    pub is_default: bool,
    /// Whether changesets are identified by their SCM hash (Git, Mercurial)
    /// rather than by revision number.
    #[serde(default)]
    pub uses_scmid: bool,
}

impl Repository {
    /// Identifier to put in URLs, `None` for the default repository.
    pub fn identifier_param(&self) -> Option<String> {
        if self.is_default {
            None
        } else {
            Some(
                self.identifier
                    .clone()
                    .unwrap_or_else(|| self.id.to_string()),
            )
        }
    }
}

/// A commit in a repository.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changeset {
    pub repository_id: u64,
    /// Revision number or name.
    pub revision: String,
    /// SCM hash, when the backend has one.
    #[serde(default)]
    pub scmid: Option<String>,
    /// Commit message.
    #[serde(default)]
    pub comments: String,
}

impl Changeset {
    /// Identifier used in revision URLs for the given repository.
    pub fn identifier<'a>(&'a self, repository: &Repository) -> &'a str {
        match (&self.scmid, repository.uses_scmid) {
            (Some(scmid), true) => scmid,
            _ => &self.revision,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: u64,
    pub project_id: u64,
    pub title: String,
}

/// A forum.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub id: u64,
    pub project_id: u64,
    pub name: String,
}

/// A forum message; replies point at their topic through `parent_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub board_id: u64,
    pub subject: String,
    #[serde(default)]
    pub parent_id: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct News {
    pub id: u64,
    pub project_id: u64,
    pub title: String,
}

/// A wiki page with its current text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiPage {
    pub project_id: u64,
    /// Normalized title (see [`WikiPage::titleize`]).
    pub title: String,
    #[serde(default)]
    pub text: String,
}

impl WikiPage {
    /// Create a page, normalizing its title.
    #[must_use]
    pub fn new(project_id: u64, title: &str, text: impl Into<String>) -> Self {
        Self {
            project_id,
            title: Self::titleize(title),
            text: text.into(),
        }
    }

    /// Normalize a page title the way page URLs spell it.
    ///
    /// Whitespace runs become `_`, the characters `, . / ? ; | :` are removed
    /// and the first letter is upper-cased.
    ///
    /// ```ignore
    /// assert_eq!(WikiPage::titleize("another page"), "Another_page");
    /// ```
    pub fn titleize(title: &str) -> String {
        let mut out = String::with_capacity(title.len());
        let mut in_space = false;
        for c in title.chars() {
            if c.is_whitespace() {
                if !in_space {
                    out.push('_');
                }
                in_space = true;
                continue;
            }
            in_space = false;
            if !matches!(c, ',' | '.' | '/' | '?' | ';' | '|' | ':') {
                out.push(c);
            }
        }
        let mut chars = out.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

/// A file attached to the object being rendered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: u64,
    /// Stored filename, original case preserved.
    pub filename: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Creation time as seconds since Unix epoch.
    #[serde(default)]
    pub created_on: i64,
}

impl Attachment {
    #[must_use]
    pub fn new(id: u64, filename: impl Into<String>, created_on: i64) -> Self {
        Self {
            id,
            filename: filename.into(),
            description: None,
            created_on,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Pick the most recently created attachment named `filename`,
    /// compared case-insensitively. Later entries win ties.
    pub fn latest<'a>(candidates: &'a [Attachment], filename: &str) -> Option<&'a Attachment> {
        let wanted = filename.to_lowercase();
        candidates
            .iter()
            .filter(|a| a.filename.to_lowercase() == wanted)
            .max_by_key(|a| a.created_on)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_titleize() {
        assert_eq!(WikiPage::titleize("Another page"), "Another_page");
        assert_eq!(WikiPage::titleize("another  page"), "Another_page");
        assert_eq!(WikiPage::titleize("CookBook documentation"), "CookBook_documentation");
        assert_eq!(WikiPage::titleize("Version 1.0: notes?"), "Version_10_notes");
        assert_eq!(WikiPage::titleize("école"), "École");
        assert_eq!(WikiPage::titleize(""), "");
    }

    #[test]
    fn test_issue_css_classes() {
        let issue = Issue::new(3, 1, "Error 281", "New");
        assert_eq!(issue.css_classes(), "issue tracker-1 status-1");

        let closed = Issue::new(8, 1, "Closed issue", "Closed").with_closed_status(5);
        assert_eq!(closed.css_classes(), "issue tracker-1 status-5 closed");
    }

    #[test]
    fn test_repository_identifier_param() {
        let default = Repository {
            id: 10,
            project_id: 1,
            identifier: None,
            is_default: true,
            uses_scmid: false,
        };
        assert_eq!(default.identifier_param(), None);

        let named = Repository {
            identifier: Some("hg1".to_owned()),
            is_default: false,
            ..default.clone()
        };
        assert_eq!(named.identifier_param(), Some("hg1".to_owned()));

        let unnamed = Repository {
            identifier: None,
            is_default: false,
            ..default
        };
        assert_eq!(unnamed.identifier_param(), Some("10".to_owned()));
    }

    #[test]
    fn test_changeset_identifier() {
        let svn = Repository {
            id: 10,
            project_id: 1,
            identifier: None,
            is_default: true,
            uses_scmid: false,
        };
        let hg = Repository {
            uses_scmid: true,
            ..svn.clone()
        };
        let changeset = Changeset {
            repository_id: 10,
            revision: "123".to_owned(),
            scmid: Some("abcd".to_owned()),
            comments: String::new(),
        };
        assert_eq!(changeset.identifier(&svn), "123");
        assert_eq!(changeset.identifier(&hg), "abcd");
    }

    #[test]
    fn test_latest_attachment_case_insensitive() {
        let candidates = vec![
            Attachment::new(1, "testfile.PNG", 100),
            Attachment::new(2, "testfile.png", 200),
            Attachment::new(3, "other.png", 300),
        ];
        let found = Attachment::latest(&candidates, "TestFile.png").unwrap();
        assert_eq!(found.id, 2);

        let older_last = vec![
            Attachment::new(2, "testfile.png", 200),
            Attachment::new(1, "testfile.PNG", 100),
        ];
        assert_eq!(Attachment::latest(&older_last, "testfile.png").unwrap().id, 2);
        assert!(Attachment::latest(&candidates, "missing.png").is_none());
    }
}
