//! Resolution of reference tokens into links.
//!
//! Every [`ReferenceKind`] has one resolution function. A token whose target
//! cannot be found (or whose project prefix names an unknown project)
//! resolves to `None` and is left as literal text by the caller.

use std::fmt::Write;

use tx_lookup::{
    Attachment, ChangesetRef, Lookup, ObjectRef, Project, Repository, WikiPage,
};

use crate::anchor::{page_anchor, sanitize_anchor};
use crate::context::{RenderContext, WikiLinkMode};
use crate::reference::{ReferenceKind, ReferenceToken, Target};
use crate::routes::{RepositoryEntry, Routes, WikiTarget, encode_fragment};
use crate::sanitize::escape_html;

/// Longest issue subject or commit message shown in a link title.
const TITLE_MAX_CHARS: usize = 100;

/// Longest message subject shown as a link label.
const MESSAGE_LABEL_MAX_CHARS: usize = 60;

/// A resolved link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedLink {
    pub href: String,
    /// Label HTML.
    pub label: String,
    pub class: Option<String>,
    pub title: Option<String>,
}

impl ResolvedLink {
    fn new(href: String, label: String, class: &str) -> Self {
        Self {
            href,
            label,
            class: Some(class.to_owned()),
            title: None,
        }
    }

    fn with_title(mut self, title: String) -> Self {
        self.title = Some(title);
        self
    }

    /// Render as `<a href=".." class=".." title="..">label</a>`.
    pub fn to_html(&self) -> String {
        let mut out = format!("<a href=\"{}\"", escape_html(&self.href));
        if let Some(class) = &self.class {
            let _ = write!(out, " class=\"{}\"", escape_html(class));
        }
        if let Some(title) = &self.title {
            let _ = write!(out, " title=\"{}\"", escape_html(title));
        }
        let _ = write!(out, ">{}</a>", self.label);
        out
    }

    /// Render with the class attribute first, as autolinks are written.
    pub fn to_html_class_first(&self) -> String {
        let mut out = String::from("<a");
        if let Some(class) = &self.class {
            let _ = write!(out, " class=\"{}\"", escape_html(class));
        }
        let _ = write!(
            out,
            " href=\"{}\">{}</a>",
            escape_html(&self.href),
            self.label
        );
        out
    }
}

/// Truncate to `max` characters, ending with `...` when shortened.
pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_owned();
    }
    let mut out: String = s.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

fn truncate_single_line(s: &str, max: usize) -> String {
    let joined = s.lines().collect::<Vec<_>>().join(" ");
    truncate(&joined, max)
}

/// A `project:` prefix naming no known project.
struct UnknownProject;

/// Resolves tokens against the lookup service for one render.
pub(crate) struct Resolver<'a> {
    lookup: &'a dyn Lookup,
    routes: &'a dyn Routes,
    ctx: &'a RenderContext,
}

impl<'a> Resolver<'a> {
    pub fn new(lookup: &'a dyn Lookup, routes: &'a dyn Routes, ctx: &'a RenderContext) -> Self {
        Self {
            lookup,
            routes,
            ctx,
        }
    }

    pub fn context(&self) -> &RenderContext {
        self.ctx
    }

    pub fn routes(&self) -> &dyn Routes {
        self.routes
    }

    pub fn resolve(&self, token: &ReferenceToken<'_>) -> Option<ResolvedLink> {
        let link = match token.kind {
            ReferenceKind::Issue | ReferenceKind::IssueNote => self.issue(token),
            ReferenceKind::Revision => self.revision(token),
            ReferenceKind::CommitHash => self.commit(token),
            ReferenceKind::Source | ReferenceKind::Export => self.source(token),
            ReferenceKind::Document => self.document(token),
            ReferenceKind::Version => self.version(token),
            ReferenceKind::Forum => self.forum(token),
            ReferenceKind::Message => self.message(token),
            ReferenceKind::News => self.news(token),
            ReferenceKind::Project => self.project(token),
            ReferenceKind::Attachment => self.attachment(token),
            ReferenceKind::WikiLink => self.wiki_link(token),
            ReferenceKind::AutoLinkUrl => Some(Self::url(token)),
            ReferenceKind::AutoLinkEmail => Some(Self::email(token)),
        };
        if link.is_none() {
            tracing::trace!(token = token.raw, kind = ?token.kind, "Reference left unresolved");
        }
        link
    }

    /// Project a token resolves against, `Ok(None)` when there is none.
    fn scope(&self, token: &ReferenceToken<'_>) -> Result<Option<Project>, UnknownProject> {
        match token.project {
            Some(identifier) => self
                .lookup
                .find_project(identifier)
                .map(Some)
                .ok_or(UnknownProject),
            None => Ok(self.ctx.project.clone()),
        }
    }

    fn scoped_project(&self, token: &ReferenceToken<'_>) -> Option<Project> {
        self.scope(token).ok().flatten()
    }

    fn project_prefix(token: &ReferenceToken<'_>) -> String {
        token.project.map(|p| format!("{p}:")).unwrap_or_default()
    }

    fn repo_prefix(token: &ReferenceToken<'_>) -> String {
        token.repository.map(|r| format!("{r}|")).unwrap_or_default()
    }

    fn object_key<'t>(token: &ReferenceToken<'t>) -> Option<ObjectRef<'t>> {
        match token.target {
            Target::Id(digits) => digits.parse().ok().map(ObjectRef::Id),
            Target::Name(name) => Some(ObjectRef::Title(name)),
        }
    }

    fn issue(&self, token: &ReferenceToken<'_>) -> Option<ResolvedLink> {
        self.scope(token).ok()?;
        let digits = token.target.as_str();
        let id: u64 = digits.parse().ok()?;
        // `#03` does not name issue 3.
        if id.to_string() != digits {
            return None;
        }
        let issue = self.lookup.find_issue(id)?;
        let note = match token.note {
            Some(note) => Some(note.parse::<u64>().ok()?),
            None => None,
        };
        let label = &token.raw[Self::project_prefix(token).len()..];
        let title = format!(
            "{} ({})",
            truncate(&issue.subject, TITLE_MAX_CHARS),
            issue.status
        );
        Some(
            ResolvedLink::new(
                self.routes.issue(id, note),
                escape_html(label),
                &issue.css_classes(),
            )
            .with_title(title),
        )
    }

    fn repository(&self, project: &Project, token: &ReferenceToken<'_>) -> Option<Repository> {
        self.lookup.find_repository(project, token.repository)
    }

    fn revision(&self, token: &ReferenceToken<'_>) -> Option<ResolvedLink> {
        let project = self.scoped_project(token)?;
        let repository = self.repository(&project, token)?;
        let changeset = self
            .lookup
            .find_changeset(&repository, ChangesetRef::Revision(token.target.as_str()))?;
        Some(
            ResolvedLink::new(
                self.routes
                    .changeset(&project, &repository, &changeset.revision),
                escape_html(token.raw),
                "changeset",
            )
            .with_title(truncate_single_line(&changeset.comments, TITLE_MAX_CHARS)),
        )
    }

    fn commit(&self, token: &ReferenceToken<'_>) -> Option<ResolvedLink> {
        let project = self.scoped_project(token)?;
        let repository = self.repository(&project, token)?;
        let hash = token.target.as_str();
        let changeset = self
            .lookup
            .find_changeset(&repository, ChangesetRef::Scmid(hash))?;
        let label = format!(
            "{}{}{hash}",
            Self::project_prefix(token),
            Self::repo_prefix(token)
        );
        Some(
            ResolvedLink::new(
                self.routes.changeset(
                    &project,
                    &repository,
                    changeset.identifier(&repository),
                ),
                escape_html(&label),
                "changeset",
            )
            .with_title(truncate_single_line(&changeset.comments, TITLE_MAX_CHARS)),
        )
    }

    fn source(&self, token: &ReferenceToken<'_>) -> Option<ResolvedLink> {
        let project = self.scoped_project(token)?;
        let repository = self.repository(&project, token)?;
        let raw = token.kind == ReferenceKind::Export;
        let location = SourceLocation::parse(token.target.as_str());
        let entry = RepositoryEntry {
            project: &project,
            repository: &repository,
            path: location.path.as_deref(),
            revision: location.revision,
            anchor: if raw { None } else { location.anchor },
            raw,
        };
        let class = if raw { "source download" } else { "source" };
        Some(ResolvedLink::new(
            self.routes.repository_entry(&entry),
            escape_html(token.raw),
            class,
        ))
    }

    fn document(&self, token: &ReferenceToken<'_>) -> Option<ResolvedLink> {
        let project = self.scope(token).ok()?;
        let document = self
            .lookup
            .find_document(project.as_ref(), Self::object_key(token)?)?;
        Some(ResolvedLink::new(
            self.routes.document(document.id),
            escape_html(&document.title),
            "document",
        ))
    }

    fn version(&self, token: &ReferenceToken<'_>) -> Option<ResolvedLink> {
        let project = self.scope(token).ok()?;
        let version = self
            .lookup
            .find_version(project.as_ref(), Self::object_key(token)?)?;
        Some(ResolvedLink::new(
            self.routes.version(version.id),
            escape_html(&version.name),
            "version",
        ))
    }

    fn forum(&self, token: &ReferenceToken<'_>) -> Option<ResolvedLink> {
        let project = self.scope(token).ok()?;
        let board = self
            .lookup
            .find_board(project.as_ref(), Self::object_key(token)?)?;
        let board_project = self.lookup.find_project_by_id(board.project_id)?;
        Some(ResolvedLink::new(
            self.routes.board(&board_project, board.id),
            escape_html(&board.name),
            "board",
        ))
    }

    fn message(&self, token: &ReferenceToken<'_>) -> Option<ResolvedLink> {
        let project = self.scope(token).ok()?;
        let message = self
            .lookup
            .find_message(project.as_ref(), Self::object_key(token)?)?;
        let href = match message.parent_id {
            Some(topic) => self
                .routes
                .message(message.board_id, topic, Some(message.id)),
            None => self.routes.message(message.board_id, message.id, None),
        };
        Some(ResolvedLink::new(
            href,
            escape_html(&truncate(&message.subject, MESSAGE_LABEL_MAX_CHARS)),
            "message",
        ))
    }

    fn news(&self, token: &ReferenceToken<'_>) -> Option<ResolvedLink> {
        let project = self.scope(token).ok()?;
        let news = self
            .lookup
            .find_news(project.as_ref(), Self::object_key(token)?)?;
        Some(ResolvedLink::new(
            self.routes.news(news.id),
            escape_html(&news.title),
            "news",
        ))
    }

    fn project(&self, token: &ReferenceToken<'_>) -> Option<ResolvedLink> {
        self.scope(token).ok()?;
        let project = match token.target {
            Target::Id(digits) => self.lookup.find_project_by_id(digits.parse().ok()?),
            Target::Name(name) => self
                .lookup
                .find_project(name)
                .or_else(|| self.lookup.find_project(&name.to_lowercase()))
                .or_else(|| self.lookup.find_project_by_name(name)),
        }?;
        Some(ResolvedLink::new(
            self.routes.project(&project),
            escape_html(&project.name),
            "project",
        ))
    }

    fn attachment(&self, token: &ReferenceToken<'_>) -> Option<ResolvedLink> {
        self.scope(token).ok()?;
        let attachment = Attachment::latest(&self.ctx.attachments, token.target.as_str())?;
        Some(ResolvedLink::new(
            self.routes.attachment_download(attachment),
            escape_html(&attachment.filename),
            "attachment",
        ))
    }

    fn wiki_link(&self, token: &ReferenceToken<'_>) -> Option<ResolvedLink> {
        let project = match token.project {
            Some(key) => self
                .lookup
                .find_project(key)
                .or_else(|| self.lookup.find_project_by_name(key))?,
            None => self.ctx.project.clone()?,
        };
        if !project.has_wiki() {
            return None;
        }

        let spec = token.target.as_str();
        let (page, anchor) = match spec.split_once('#') {
            Some((page, anchor)) if !anchor.is_empty() => (page, Some(anchor)),
            _ => (spec, None),
        };
        let anchor_name = anchor.map(sanitize_anchor).filter(|a| !a.is_empty());
        if page.trim().is_empty() && token.project.is_none() {
            // `[[#anchor]]` points into the rendered document itself.
            let anchor_name = anchor_name?;
            return Some(ResolvedLink::new(
                self.same_document_href(&anchor_name),
                escape_html(anchor.unwrap_or_default()),
                "wiki-page",
            ));
        }
        let title = (!page.trim().is_empty()).then(|| WikiPage::titleize(page.trim()));
        let exists = match &title {
            Some(title) => self.lookup.wiki_page_exists(&project, title),
            None => project
                .wiki_start_page
                .as_deref()
                .is_some_and(|start| self.lookup.wiki_page_exists(&project, &WikiPage::titleize(start))),
        };

        let label = if page.trim().is_empty() {
            escape_html(token.project.unwrap_or(&project.identifier))
        } else {
            escape_html(page)
        };
        let href = self.wiki_href(&project, title.as_deref(), anchor_name.as_deref(), exists);
        let class = if exists { "wiki-page" } else { "wiki-page new" };
        Some(ResolvedLink::new(href, label, class))
    }

    fn wiki_href(
        &self,
        project: &Project,
        title: Option<&str>,
        anchor: Option<&str>,
        exists: bool,
    ) -> String {
        let container = self.ctx.wiki_page();
        let same_page = match (container, title) {
            (Some(page), Some(title)) => {
                page.project_id == project.id && page.title.eq_ignore_ascii_case(title)
            }
            _ => false,
        };
        if let Some(anchor) = anchor
            && same_page
            && self.ctx.wiki_links != WikiLinkMode::Anchor
        {
            return format!("#{}", encode_fragment(anchor));
        }

        match self.ctx.wiki_links {
            WikiLinkMode::Normal => {
                let parent = container
                    .filter(|page| !exists && page.project_id == project.id)
                    .map(|page| page.title.as_str());
                self.routes.wiki_page(&WikiTarget {
                    project,
                    title,
                    parent,
                    anchor,
                })
            }
            WikiLinkMode::Local => {
                let mut href = format!("{}.html", title.unwrap_or_default());
                if let Some(anchor) = anchor {
                    href.push('#');
                    href.push_str(&encode_fragment(anchor));
                }
                href
            }
            WikiLinkMode::Anchor => {
                let name = title.map_or_else(|| project.identifier.clone(), str::to_owned);
                match anchor {
                    Some(anchor) => format!("#{}", encode_fragment(&page_anchor(&name, anchor))),
                    None => format!("#{name}"),
                }
            }
        }
    }

    fn same_document_href(&self, anchor: &str) -> String {
        match (self.ctx.wiki_links, self.ctx.wiki_page()) {
            (WikiLinkMode::Anchor, Some(page)) => {
                format!("#{}", encode_fragment(&page_anchor(&page.title, anchor)))
            }
            _ => format!("#{}", encode_fragment(anchor)),
        }
    }

    fn url(token: &ReferenceToken<'_>) -> ResolvedLink {
        let raw = token.raw;
        let href = if raw.starts_with("www.") {
            format!("http://{raw}")
        } else {
            raw.to_owned()
        };
        ResolvedLink::new(href, escape_html(raw), "external")
    }

    fn email(token: &ReferenceToken<'_>) -> ResolvedLink {
        ResolvedLink::new(
            format!("mailto:{}", token.raw),
            escape_html(token.raw),
            "email",
        )
    }
}

/// `path[@revision][#Lnn]` of a source or export reference.
#[derive(Debug, PartialEq, Eq)]
struct SourceLocation<'a> {
    /// Path with leading separators and empty segments removed.
    path: Option<String>,
    revision: Option<&'a str>,
    anchor: Option<&'a str>,
}

impl<'a> SourceLocation<'a> {
    fn parse(spec: &'a str) -> Self {
        let mut rest = spec.trim_start_matches(['/', '\\']);

        let mut anchor = None;
        if let Some(hash) = rest.rfind("#L") {
            let line = &rest[hash + 2..];
            if !line.is_empty() && line.bytes().all(|b| b.is_ascii_digit()) {
                anchor = Some(&rest[hash + 1..]);
                rest = &rest[..hash];
            }
        }

        let mut revision = None;
        if let Some(at) = rest.rfind('@') {
            let rev = &rest[at + 1..];
            if !rev.is_empty() && !rev.contains(['/', '\\']) {
                revision = Some(rev);
                rest = &rest[..at];
            }
        }

        let path = rest
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("/");
        Self {
            path: (!path.is_empty()).then_some(path),
            revision,
            anchor,
        }
    }
}
