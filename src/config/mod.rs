//! Site configuration management for `site.toml`.
//!
//! # Sections
//!
//! | Section     | Purpose                                          |
//! |-------------|--------------------------------------------------|
//! | `[site]`    | Common page metadata (name, base URL)            |
//! | `[build]`   | Content/output paths, sitemap, formatter, CSS    |
//! | `[serve]`   | Development server (port, interface, watch)      |
//! | `[[icons]]` | Named SVG icons and the links they attach to     |
//!
//! # Example
//!
//! ```toml
//! [site]
//! name = "hermannm.dev"
//! description = "Hermann Mørkrid's personal website."
//! base_url = "https://hermannm.dev"
//! issues_link = "https://github.com/hermannm/hermannm.dev/issues"
//!
//! [build]
//! project_dirs = ["projects", "companies"]
//!
//! [serve]
//! port = 8080
//!
//! [[icons]]
//! name = "GitHub"
//! path = "content/icons/github.svg"
//! link_prefixes = ["https://github.com"]
//! ```

mod build;
pub mod defaults;
mod icons;
mod serve;
mod site;

pub use build::{BuildConfig, TrailingSlash};
pub use icons::IconConfig;
pub use serve::ServeConfig;
pub use site::SiteSection;

use crate::cli::{Cli, Commands};
use crate::content::validate;
use crate::error::SiteError;
use crate::pages::icons::GITHUB_ICON;
use anyhow::{Context, Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing site.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Site-wide page metadata
    #[serde(default)]
    pub site: SiteSection,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Development server settings
    #[serde(default)]
    pub serve: ServeConfig,

    /// Icon table, in declaration order
    #[serde(default)]
    pub icons: Vec<IconConfig>,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(SiteError::Toml)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|err| SiteError::io(path, err))?;
        let mut config = Self::from_str(&content)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        config.config_path = path.to_path_buf();
        Ok(config)
    }

    /// Load the config file named on the command line, apply CLI overrides
    /// and validate the result.
    pub fn load(cli: &Cli) -> Result<Self> {
        let root = cli.root.as_deref().unwrap_or(Path::new("./"));
        let config_path = root.join(&cli.config);
        if !config_path.is_file() {
            bail!(SiteError::Config(format!(
                "config file not found: {}",
                config_path.display()
            )));
        }

        let mut config = Self::from_path(&config_path)?;
        config.update_with_cli(cli);
        config.validate()?;
        Ok(config)
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        self.build.root.as_deref().unwrap_or(Path::new("./"))
    }

    /// Set the root directory path
    pub fn set_root(&mut self, path: &Path) {
        self.build.root = Some(path.to_path_buf())
    }

    /// Absolute path of a file inside the content directory.
    pub fn content_path(&self, relative: &Path) -> PathBuf {
        self.build.content.join(relative)
    }

    /// Directory holding page templates.
    pub fn page_templates_dir(&self) -> PathBuf {
        self.build.templates.join("pages")
    }

    /// Directory holding component templates.
    pub fn component_templates_dir(&self) -> PathBuf {
        self.build.templates.join("components")
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &Cli) {
        let root = cli
            .root
            .as_ref()
            .cloned()
            .unwrap_or_else(|| self.get_root().to_owned());

        self.update_path_with_root(&root, cli);

        let args = cli.build_args();
        if args.clean {
            self.build.clean = true;
        }
        Self::update_option(&mut self.build.minify, args.minify.as_ref());
        Self::update_option(&mut self.build.format.enable, args.format.as_ref());
        Self::update_option(&mut self.build.css.enable, args.css.as_ref());
        Self::update_option(&mut self.build.sitemap.enable, args.sitemap.as_ref());
        Self::update_option(&mut self.site.base_url, args.base_url.as_ref());

        if cli.is_dev() {
            self.build.trailing_slash = TrailingSlash::Mirror;
        }

        if let Commands::Serve {
            interface,
            port,
            watch,
            ..
        } = &cli.command
        {
            Self::update_option(&mut self.serve.interface, interface.as_ref());
            Self::update_option(&mut self.serve.port, port.as_ref());
            Self::update_option(&mut self.serve.watch, watch.as_ref());
        }
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Update all paths relative to root directory and normalize to absolute paths
    fn update_path_with_root(&mut self, root: &Path, cli: &Cli) {
        // Apply CLI overrides first
        Self::update_option(&mut self.build.content, cli.content.as_ref());
        Self::update_option(&mut self.build.output, cli.output.as_ref());

        let root = Self::normalize_path(root);
        self.set_root(&root);

        self.config_path = Self::normalize_path(&root.join(&cli.config));
        self.normalize_paths();
    }

    /// Resolve every configured path against the root.
    pub fn normalize_paths(&mut self) {
        let root = Self::normalize_path(self.get_root());
        self.build.content = Self::normalize_path(&root.join(&self.build.content));
        self.build.output = Self::normalize_path(&root.join(&self.build.output));
        self.build.templates = Self::normalize_path(&root.join(&self.build.templates));
        self.build.css.input = Self::normalize_path(&root.join(&self.build.css.input));

        for icon in &mut self.icons {
            if let Some(path) = &icon.path {
                icon.path = Some(Self::normalize_path(&root.join(path)));
            }
            if let Some(path) = &icon.index_fallback {
                icon.index_fallback = Some(Self::normalize_path(&root.join(path)));
            }
        }
        self.set_root(&root);
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            // For non-existent paths, manually make them absolute
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    /// Validate configuration before building.
    pub fn validate(&self) -> Result<()> {
        let site = &self.site;
        validate::required("[site.name]", &site.name)?;
        validate::required("[site.description]", &site.description)?;
        validate::url("[site.base_url]", &site.base_url)?;
        validate::url("[site.issues_link]", &site.issues_link)?;

        if site.base_url.ends_with('/') {
            bail!(SiteError::Validation(
                "[site.base_url] must not end with a trailing slash".into()
            ));
        }

        self.validate_icons()?;

        if self.build.format.enable {
            Self::check_command_installed("[build.format.command]", &self.build.format.command)?;
        }

        if self.build.css.enable {
            Self::check_command_installed("[build.css.command]", &self.build.css.command)?;

            let input = &self.build.css.input;
            if !input.is_file() {
                bail!(SiteError::Validation(format!(
                    "[build.css.input] not found: {}",
                    input.display()
                )));
            }
        }

        Ok(())
    }

    fn validate_icons(&self) -> Result<()> {
        let mut seen = rustc_hash::FxHashSet::default();

        for icon in &self.icons {
            validate::required("[[icons]].name", &icon.name)?;

            if !seen.insert(icon.name.as_str()) {
                bail!(SiteError::Config(format!(
                    "icon '{}' is declared more than once",
                    icon.name
                )));
            }
            if icon.path.is_none() && icon.index_fallback.is_none() {
                bail!(SiteError::Validation(format!(
                    "icon '{}' needs `path` or `index_fallback`",
                    icon.name
                )));
            }
            if let Some(link) = &icon.link {
                validate::url(&format!("icon '{}' link", icon.name), link)?;
            }
        }

        if !seen.contains(GITHUB_ICON) {
            bail!(SiteError::Config(format!(
                "expected icon table to have an entry for '{GITHUB_ICON}'"
            )));
        }

        Ok(())
    }

    /// Check if a command is installed and available
    fn check_command_installed(field: &str, command: &[String]) -> Result<()> {
        let Some(cmd) = command.first() else {
            bail!(SiteError::Validation(format!(
                "{field} must have at least one element"
            )));
        };

        which::which(cmd)
            .with_context(|| format!("`{cmd}` not found. Please install it first."))?;

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::kind_of;

    fn valid_config() -> SiteConfig {
        SiteConfig::from_str(
            r#"
            [site]
            name = "hermannm.dev"
            description = "Personal website"
            base_url = "https://hermannm.dev"
            issues_link = "https://github.com/hermannm/hermannm.dev/issues"

            [[icons]]
            name = "GitHub"
            path = "content/icons/github.svg"
        "#,
        )
        .unwrap()
    }

    #[test]
    fn test_from_str_invalid_toml() {
        let result = SiteConfig::from_str("[site\nname = 1");
        let err = result.unwrap_err();
        assert!(matches!(kind_of(&err), Some(SiteError::Toml(_))));
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = SiteConfig::from_path(Path::new("/nonexistent/site.toml")).unwrap_err();
        assert!(matches!(kind_of(&err), Some(SiteError::Io(..))));
    }

    #[test]
    fn test_get_root_default() {
        let config = SiteConfig::default();
        assert_eq!(config.get_root(), Path::new("./"));
    }

    #[test]
    fn test_set_root() {
        let mut config = SiteConfig::default();
        config.set_root(Path::new("/custom/path"));
        assert_eq!(config.get_root(), Path::new("/custom/path"));
    }

    #[test]
    fn test_validate_ok() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        let mut config = valid_config();
        config.site.base_url = "hermannm.dev".into();
        let err = config.validate().unwrap_err();
        assert!(matches!(kind_of(&err), Some(SiteError::Validation(_))));

        config.site.base_url = "https://hermannm.dev/".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_github_icon() {
        let mut config = valid_config();
        config.icons[0].name = "LinkedIn".into();
        let err = config.validate().unwrap_err();
        assert!(matches!(kind_of(&err), Some(SiteError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_duplicate_icons() {
        let mut config = valid_config();
        config.icons.push(config.icons[0].clone());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_validate_icon_without_any_path() {
        let mut config = valid_config();
        config.icons.push(IconConfig {
            name: "Empty".into(),
            ..Default::default()
        });
        let err = config.validate().unwrap_err();
        assert!(matches!(kind_of(&err), Some(SiteError::Validation(_))));
    }

    #[test]
    fn test_update_with_cli_dev_mode() {
        use clap::Parser;

        let cli = Cli::parse_from([
            "personal-site",
            "--root",
            "/tmp/site",
            "build",
            "--dev",
            "--base-url",
            "http://localhost:8080",
        ]);
        let mut config = valid_config();
        config.update_with_cli(&cli);

        assert_eq!(config.build.trailing_slash, TrailingSlash::Mirror);
        assert_eq!(config.site.base_url, "http://localhost:8080");
        assert!(config.build.output.ends_with("static"));
        assert!(config.build.output.is_absolute());
        assert!(config.icons[0].path.as_ref().unwrap().is_absolute());
    }

    #[test]
    fn test_unknown_top_level_field_rejection() {
        let config = r#"
            [site]
            name = "Test"
            description = "Test"
            base_url = "https://example.com"
            issues_link = "https://example.com/issues"

            [deploy]
            provider = "github"
        "#;
        assert!(SiteConfig::from_str(config).is_err());
    }

    #[test]
    fn test_load_from_root() {
        use clap::Parser;

        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().to_str().unwrap();
        let cli = Cli::parse_from(["personal-site", "--root", root, "build"]);
        let err = SiteConfig::load(&cli).unwrap_err();
        assert!(matches!(kind_of(&err), Some(SiteError::Config(_))));

        fs::write(
            dir.path().join("site.toml"),
            r#"
            [site]
            name = "hermannm.dev"
            description = "Personal website"
            base_url = "https://hermannm.dev"
            issues_link = "https://github.com/hermannm/hermannm.dev/issues"

            [[icons]]
            name = "GitHub"
            path = "content/icons/github.svg"
        "#,
        )
        .unwrap();
        let config = SiteConfig::load(&cli).unwrap();
        assert_eq!(config.site.name, "hermannm.dev");
        assert!(config.build.content.starts_with(config.get_root()));
        assert!(config.config_path.ends_with("site.toml"));
    }
}
