//! URL construction for resolved references.
//!
//! Hosts with their own URL scheme implement [`Routes`]; [`DefaultRoutes`]
//! produces tracker-style paths under an optional root.

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use tx_lookup::{Attachment, Project, Repository};

/// Characters escaped inside a path that may contain `/`.
const PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Characters escaped inside a single path segment.
const SEGMENT: &AsciiSet = &PATH.add(b'/');

/// Characters escaped inside a query value.
const QUERY: &AsciiSet = &SEGMENT.add(b'&').add(b'=').add(b'+');

/// Characters escaped inside a fragment.
const FRAGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'%');

pub(crate) fn encode_segment(s: &str) -> String {
    utf8_percent_encode(s, SEGMENT).to_string()
}

pub(crate) fn encode_path(s: &str) -> String {
    utf8_percent_encode(s, PATH).to_string()
}

pub(crate) fn encode_query(s: &str) -> String {
    utf8_percent_encode(s, QUERY).to_string()
}

pub(crate) fn encode_fragment(s: &str) -> String {
    utf8_percent_encode(s, FRAGMENT).to_string()
}

/// A file or raw download inside a repository.
#[derive(Clone, Copy, Debug)]
pub struct RepositoryEntry<'a> {
    pub project: &'a Project,
    pub repository: &'a Repository,
    /// Path inside the repository, `None` for the root.
    pub path: Option<&'a str>,
    pub revision: Option<&'a str>,
    /// Line anchor such as `L10`.
    pub anchor: Option<&'a str>,
    /// Link to the raw download rather than the annotated view.
    pub raw: bool,
}

/// Target of a wiki link.
#[derive(Clone, Copy, Debug)]
pub struct WikiTarget<'a> {
    pub project: &'a Project,
    /// Normalized page title, `None` for the wiki start page.
    pub title: Option<&'a str>,
    /// Parent page suggested for a page that does not exist yet.
    pub parent: Option<&'a str>,
    pub anchor: Option<&'a str>,
}

/// URL scheme for every link the renderer emits.
///
/// Returned strings are URLs, not HTML; the renderer escapes them.
pub trait Routes: Send + Sync {
    fn issue(&self, id: u64, note: Option<u64>) -> String;

    fn changeset(&self, project: &Project, repository: &Repository, revision: &str) -> String;

    fn repository_entry(&self, entry: &RepositoryEntry<'_>) -> String;

    fn document(&self, id: u64) -> String;

    fn version(&self, id: u64) -> String;

    fn board(&self, project: &Project, board_id: u64) -> String;

    /// Link to a forum message. Replies link into their topic.
    fn message(&self, board_id: u64, topic_id: u64, reply_id: Option<u64>) -> String;

    fn news(&self, id: u64) -> String;

    fn project(&self, project: &Project) -> String;

    fn attachment_download(&self, attachment: &Attachment) -> String;

    fn wiki_page(&self, target: &WikiTarget<'_>) -> String;
}

/// Tracker-style URLs (`/issues/3`, `/projects/ecookbook/wiki/Page`).
#[derive(Clone, Debug, Default)]
pub struct DefaultRoutes {
    root: String,
}

impl DefaultRoutes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix every URL with `root` (e.g., `/tracker`).
    #[must_use]
    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into().trim_end_matches('/').to_owned();
        self
    }

    fn repository_base(&self, project: &Project, repository: &Repository) -> String {
        let mut url = format!(
            "{}/projects/{}/repository",
            self.root,
            encode_segment(&project.identifier)
        );
        if let Some(identifier) = repository.identifier_param() {
            url.push('/');
            url.push_str(&encode_segment(&identifier));
        }
        url
    }
}

impl Routes for DefaultRoutes {
    fn issue(&self, id: u64, note: Option<u64>) -> String {
        match note {
            Some(note) => format!("{}/issues/{id}#note-{note}", self.root),
            None => format!("{}/issues/{id}", self.root),
        }
    }

    fn changeset(&self, project: &Project, repository: &Repository, revision: &str) -> String {
        format!(
            "{}/revisions/{}",
            self.repository_base(project, repository),
            encode_segment(revision)
        )
    }

    fn repository_entry(&self, entry: &RepositoryEntry<'_>) -> String {
        let mut url = self.repository_base(entry.project, entry.repository);
        if let Some(revision) = entry.revision {
            url.push_str("/revisions/");
            url.push_str(&encode_segment(revision));
        }
        url.push_str(if entry.raw { "/raw" } else { "/entry" });
        if let Some(path) = entry.path {
            url.push('/');
            url.push_str(&encode_path(path));
        }
        if let Some(anchor) = entry.anchor {
            url.push('#');
            url.push_str(&encode_fragment(anchor));
        }
        url
    }

    fn document(&self, id: u64) -> String {
        format!("{}/documents/{id}", self.root)
    }

    fn version(&self, id: u64) -> String {
        format!("{}/versions/{id}", self.root)
    }

    fn board(&self, project: &Project, board_id: u64) -> String {
        format!(
            "{}/projects/{}/boards/{board_id}",
            self.root,
            encode_segment(&project.identifier)
        )
    }

    fn message(&self, board_id: u64, topic_id: u64, reply_id: Option<u64>) -> String {
        match reply_id {
            Some(reply) => format!(
                "{}/boards/{board_id}/topics/{topic_id}?r={reply}#message-{reply}",
                self.root
            ),
            None => format!("{}/boards/{board_id}/topics/{topic_id}", self.root),
        }
    }

    fn news(&self, id: u64) -> String {
        format!("{}/news/{id}", self.root)
    }

    fn project(&self, project: &Project) -> String {
        format!("{}/projects/{}", self.root, encode_segment(&project.identifier))
    }

    fn attachment_download(&self, attachment: &Attachment) -> String {
        format!(
            "{}/attachments/download/{}/{}",
            self.root,
            attachment.id,
            encode_segment(&attachment.filename)
        )
    }

    fn wiki_page(&self, target: &WikiTarget<'_>) -> String {
        let mut url = format!(
            "{}/projects/{}/wiki",
            self.root,
            encode_segment(&target.project.identifier)
        );
        if let Some(title) = target.title {
            url.push('/');
            url.push_str(&encode_segment(title));
        }
        if let Some(parent) = target.parent {
            url.push_str("?parent=");
            url.push_str(&encode_query(parent));
        }
        if let Some(anchor) = target.anchor {
            url.push('#');
            url.push_str(&encode_fragment(anchor));
        }
        url
    }
}
