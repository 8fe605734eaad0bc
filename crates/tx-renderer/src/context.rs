//! Per-render settings.

use tx_lookup::{Attachment, Project, WikiPage};

/// How wiki links are turned into URLs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum WikiLinkMode {
    /// Links into the web application.
    #[default]
    Normal,
    /// Links between exported files (`Page.html#anchor`).
    Local,
    /// Links to anchors of a single exported document (`#Page_anchor`).
    Anchor,
}

/// The object whose text is being rendered.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Container {
    WikiPage(WikiPage),
}

/// Settings for per-section edit links.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionEditLinks {
    /// URL with a `{section}` placeholder for the 1-based section number.
    pub url_template: String,
    /// Tooltip of the edit link.
    pub title: String,
    /// Image shown as the edit link.
    pub icon: String,
}

impl SectionEditLinks {
    #[must_use]
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
            title: "Edit this section".to_owned(),
            icon: "/images/edit.png".to_owned(),
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    /// Edit URL for a section.
    pub fn url(&self, section: usize) -> String {
        self.url_template.replace("{section}", &section.to_string())
    }
}

/// Everything a render depends on besides the text and the lookup service.
///
/// # Example
///
/// ```ignore
/// let ctx = RenderContext::new()
///     .with_project(project)
///     .with_wiki_links(WikiLinkMode::Local)
///     .with_macros(false);
/// ```
#[derive(Clone, Debug)]
pub struct RenderContext {
    /// Project that unqualified references resolve against.
    pub project: Option<Project>,
    /// Attachments of the rendered object, for `attachment:` and images.
    pub attachments: Vec<Attachment>,
    pub container: Option<Container>,
    pub wiki_links: WikiLinkMode,
    /// Expand `{{macro}}` blocks. When off, macros stay literal.
    pub macros: bool,
    /// Emit heading anchors and collect the table of contents.
    pub headings: bool,
    /// Emit section edit links. Off when `None`.
    pub edit_sections: Option<SectionEditLinks>,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderContext {
    /// Create a context with no project, macros and heading anchors on.
    #[must_use]
    pub fn new() -> Self {
        Self {
            project: None,
            attachments: Vec::new(),
            container: None,
            wiki_links: WikiLinkMode::Normal,
            macros: true,
            headings: true,
            edit_sections: None,
        }
    }

    #[must_use]
    pub fn with_project(mut self, project: Project) -> Self {
        self.project = Some(project);
        self
    }

    #[must_use]
    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    #[must_use]
    pub fn with_container(mut self, container: Container) -> Self {
        self.container = Some(container);
        self
    }

    /// Render as the text of a wiki page.
    #[must_use]
    pub fn with_wiki_page(self, page: WikiPage) -> Self {
        self.with_container(Container::WikiPage(page))
    }

    #[must_use]
    pub fn with_wiki_links(mut self, mode: WikiLinkMode) -> Self {
        self.wiki_links = mode;
        self
    }

    #[must_use]
    pub fn with_macros(mut self, enabled: bool) -> Self {
        self.macros = enabled;
        self
    }

    #[must_use]
    pub fn with_headings(mut self, enabled: bool) -> Self {
        self.headings = enabled;
        self
    }

    #[must_use]
    pub fn with_edit_sections(mut self, links: SectionEditLinks) -> Self {
        self.edit_sections = Some(links);
        self
    }

    /// The container wiki page, if rendering one.
    pub(crate) fn wiki_page(&self) -> Option<&WikiPage> {
        match &self.container {
            Some(Container::WikiPage(page)) => Some(page),
            None => None,
        }
    }
}
