//! Options shared by the rendering commands.

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use tx_config::{CliSettings, Config};
use tx_lookup::{Lookup, MemoryLookup, WikiPage};
use tx_renderer::{DefaultRoutes, RenderContext, Renderer, SectionEditLinks, WikiLinkMode};

use crate::error::CliError;

/// Wiki link style accepted on the command line.
#[derive(Clone, Copy, ValueEnum)]
pub(crate) enum WikiLinksArg {
    Normal,
    Local,
    Anchor,
}

impl From<WikiLinksArg> for WikiLinkMode {
    fn from(arg: WikiLinksArg) -> Self {
        match arg {
            WikiLinksArg::Normal => Self::Normal,
            WikiLinksArg::Local => Self::Local,
            WikiLinksArg::Anchor => Self::Anchor,
        }
    }
}

/// Render options, each overriding the matching `tx.toml` value.
#[derive(Args)]
pub(crate) struct RenderOptions {
    /// Path to configuration file (default: auto-discover tx.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Identifier of the project references resolve against.
    #[arg(short, long, env = "TX_PROJECT")]
    project: Option<String>,

    /// How wiki links are written.
    #[arg(long, value_enum)]
    wiki_links: Option<WikiLinksArg>,

    /// Prefix for generated application URLs.
    #[arg(long)]
    url_root: Option<String>,

    /// TOML fixture file with tracker data.
    #[arg(short, long)]
    fixtures: Option<PathBuf>,

    /// Leave `{{macro}}` blocks unexpanded.
    #[arg(long)]
    no_macros: bool,

    /// Title of the wiki page the text belongs to.
    #[arg(long)]
    page: Option<String>,
}

impl RenderOptions {
    fn cli_settings(&self) -> CliSettings {
        CliSettings {
            project: self.project.clone(),
            wiki_links: self.wiki_links.map(Into::into),
            macros: self.no_macros.then_some(false),
            url_root: self.url_root.clone(),
            fixtures: self.fixtures.clone(),
        }
    }
}

/// Configuration and tracker data for one invocation.
pub(crate) struct Session {
    config: Config,
    lookup: MemoryLookup,
    page: Option<String>,
}

impl Session {
    /// Load configuration and fixture data.
    pub(crate) fn open(options: &RenderOptions) -> Result<Self, CliError> {
        let config = Config::load(options.config.as_deref(), Some(&options.cli_settings()))?;
        if let Some(path) = &config.config_path {
            tracing::info!(path = %path.display(), "Loaded configuration");
        }

        let lookup = match &config.fixtures_path {
            Some(path) => {
                tracing::info!(path = %path.display(), "Loading fixtures");
                MemoryLookup::load(path)?
            }
            None => MemoryLookup::new(),
        };

        Ok(Self {
            config,
            lookup,
            page: options.page.clone(),
        })
    }

    /// Renderer bound to the fixture data.
    pub(crate) fn renderer(&self) -> Renderer<'_> {
        let render = &self.config.render;
        Renderer::new(&self.lookup)
            .with_routes(DefaultRoutes::new().with_root(render.url_root.clone()))
            .with_max_include_depth(render.max_include_depth)
    }

    /// Build the render context from configuration.
    pub(crate) fn context(&self) -> Result<RenderContext, CliError> {
        let render = &self.config.render;
        let mut ctx = RenderContext::new()
            .with_attachments(self.lookup.attachments().to_vec())
            .with_wiki_links(render.wiki_links)
            .with_macros(render.macros)
            .with_headings(render.headings);

        let project = match &render.project {
            Some(identifier) => Some(self.lookup.find_project(identifier).ok_or_else(|| {
                CliError::Validation(format!("Unknown project: {identifier}"))
            })?),
            None => None,
        };

        if let Some(title) = &self.page {
            let Some(project) = &project else {
                return Err(CliError::Validation(
                    "--page requires a project".to_owned(),
                ));
            };
            let page = self
                .lookup
                .find_wiki_page(project, &WikiPage::titleize(title))
                .unwrap_or_else(|| WikiPage::new(project.id, title, ""));
            ctx = ctx.with_wiki_page(page);
        }

        if let Some(project) = project {
            ctx = ctx.with_project(project);
        }

        if let Some(edit) = &render.edit_sections {
            ctx = ctx.with_edit_sections(
                SectionEditLinks::new(edit.url.clone())
                    .with_title(edit.title.clone())
                    .with_icon(edit.icon.clone()),
            );
        }

        Ok(ctx)
    }
}

/// Read the document from `file`, or from stdin when absent or `-`.
pub(crate) fn read_input(file: Option<&Path>) -> Result<String, CliError> {
    match file {
        Some(path) if path != Path::new("-") => Ok(std::fs::read_to_string(path)?),
        _ => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}
