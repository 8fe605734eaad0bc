//! Configuration management for tx.
//!
//! Parses `tx.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `render.url_root`
//! - `render.edit_sections.url`
//! - `fixtures.path`

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tx_renderer::WikiLinkMode;

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "tx.toml";

/// Placeholder for the section number in edit URLs.
pub const SECTION_PLACEHOLDER: &str = "{section}";

/// Upper bound for `render.max_include_depth`.
const MAX_INCLUDE_DEPTH_LIMIT: usize = 100;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override the acting project.
    pub project: Option<String>,
    /// Override the wiki link style.
    pub wiki_links: Option<WikiLinkMode>,
    /// Override macro expansion.
    pub macros: Option<bool>,
    /// Override the URL root.
    pub url_root: Option<String>,
    /// Override the fixture file.
    pub fixtures: Option<PathBuf>,
}

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Render options.
    pub render: RenderConfig,
    /// Fixture data (paths are relative strings from TOML).
    fixtures: Option<FixturesConfigRaw>,

    /// Resolved path of the fixture file (set after loading).
    #[serde(skip)]
    pub fixtures_path: Option<PathBuf>,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Render options.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Identifier of the acting project.
    pub project: Option<String>,
    /// Wiki link style.
    pub wiki_links: WikiLinkMode,
    /// Whether `{{macro}}` blocks are expanded.
    pub macros: bool,
    /// Whether headings get anchors.
    pub headings: bool,
    /// Limit for nested includes.
    pub max_include_depth: usize,
    /// Prefix of every generated application URL.
    pub url_root: String,
    /// Section edit links (optional section).
    pub edit_sections: Option<EditSectionsConfig>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            project: None,
            wiki_links: WikiLinkMode::Normal,
            macros: true,
            headings: true,
            max_include_depth: 10,
            url_root: String::new(),
            edit_sections: None,
        }
    }
}

/// Section edit link configuration.
#[derive(Debug, Deserialize)]
pub struct EditSectionsConfig {
    /// Edit URL containing a `{section}` placeholder.
    pub url: String,
    /// Tooltip of the edit link.
    #[serde(default = "default_edit_title")]
    pub title: String,
    /// Icon of the edit link.
    #[serde(default = "default_edit_icon")]
    pub icon: String,
}

fn default_edit_title() -> String {
    "Edit this section".to_owned()
}

fn default_edit_icon() -> String {
    "/images/edit.png".to_owned()
}

/// Raw fixtures configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct FixturesConfigRaw {
    path: Option<String>,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`render.url_root`").
        field: String,
        /// Error message (e.g., "${`TX_ROOT`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `tx.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values. The result is
    /// validated last.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the final configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(project) = &settings.project {
            self.render.project = Some(project.clone());
        }
        if let Some(wiki_links) = settings.wiki_links {
            self.render.wiki_links = wiki_links;
        }
        if let Some(macros) = settings.macros {
            self.render.macros = macros;
        }
        if let Some(url_root) = &settings.url_root {
            self.render.url_root.clone_from(url_root);
        }
        if let Some(fixtures) = &settings.fixtures {
            self.fixtures_path = Some(fixtures.clone());
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        Self::discover_from(&current)
    }

    fn discover_from(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILENAME))
            .find(|candidate| candidate.exists())
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let render = &self.render;
        if let Some(project) = &render.project {
            require_non_empty(project, "render.project")?;
        }
        if render.max_include_depth == 0 {
            return Err(ConfigError::Validation(
                "render.max_include_depth must be greater than 0".to_owned(),
            ));
        }
        if render.max_include_depth > MAX_INCLUDE_DEPTH_LIMIT {
            return Err(ConfigError::Validation(format!(
                "render.max_include_depth cannot exceed {MAX_INCLUDE_DEPTH_LIMIT}"
            )));
        }
        if let Some(edit) = &render.edit_sections
            && !edit.url.contains(SECTION_PLACEHOLDER)
        {
            return Err(ConfigError::Validation(format!(
                "render.edit_sections.url must contain {SECTION_PLACEHOLDER}"
            )));
        }
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.render.url_root = expand::expand_env(&self.render.url_root, "render.url_root")?;

        if let Some(ref mut edit) = self.render.edit_sections {
            edit.url = expand::expand_env(&edit.url, "render.edit_sections.url")?;
        }

        if let Some(ref mut fixtures) = self.fixtures
            && let Some(ref path) = fixtures.path
        {
            fixtures.path = Some(expand::expand_env(path, "fixtures.path")?);
        }

        Ok(())
    }

    /// Resolve the fixture path relative to the config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        self.fixtures_path = self
            .fixtures
            .as_ref()
            .and_then(|f| f.path.as_deref())
            .map(|path| config_dir.join(path));
    }
}
