//! `[build]` section configuration.
//!
//! Contains content locations, output policy and the post-build steps.
//!
//! # Example
//!
//! ```toml
//! [build]
//! content = "content"
//! output = "static"
//! index_page = "index_page.md"
//! project_dirs = ["projects", "companies", "libraries-and-tools"]
//! basic_pages = ["404_page.md"]
//! trailing_slash = "redirect"
//!
//! [build.format]
//! enable = true
//! command = ["npx", "prettier", "--write"]
//!
//! [build.css]
//! enable = true
//! input = "styles.css"
//! ```

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[build]` section in site.toml.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Project root directory (usually set via CLI `--root`).
    #[serde(default = "defaults::build::root")]
    #[educe(Default = defaults::build::root())]
    pub root: Option<PathBuf>,

    /// Base content directory (markdown files and icons).
    #[serde(default = "defaults::build::content")]
    #[educe(Default = defaults::build::content())]
    pub content: PathBuf,

    /// Build output directory.
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// Template directory, holding `pages/` and `components/`.
    #[serde(default = "defaults::build::templates")]
    #[educe(Default = defaults::build::templates())]
    pub templates: PathBuf,

    /// Index page markdown file, relative to `content`.
    #[serde(default = "defaults::build::index_page")]
    #[educe(Default = defaults::build::index_page())]
    pub index_page: PathBuf,

    /// Project directories, relative to `content`. Each is one navigation group's source.
    #[serde(default = "defaults::build::project_dirs")]
    #[educe(Default = defaults::build::project_dirs())]
    pub project_dirs: Vec<PathBuf>,

    /// Standalone pages (e.g. the 404 page), relative to `content`.
    #[serde(default = "defaults::build::basic_pages")]
    #[educe(Default = defaults::build::basic_pages())]
    pub basic_pages: Vec<PathBuf>,

    /// How paths without a file extension are written.
    pub trailing_slash: TrailingSlash,

    /// Remove the output directory before building.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub clean: bool,

    /// Minify written HTML. Usually left off when the formatter runs.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub minify: bool,

    /// Sitemap generation settings.
    pub sitemap: SitemapConfig,

    /// HTML formatter run over the output after rendering.
    pub format: FormatConfig,

    /// CSS build step run after rendering.
    pub css: CssConfig,
}

// ============================================================================
// Sub-configurations
// ============================================================================

/// Canonicalization policy for page paths without a file extension.
///
/// Both `/path.html` and `/path/index.html` are written, so that static hosts
/// that resolve `/path` and `/path/` differently serve both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrailingSlash {
    /// `/path/` redirects to the canonical `/path`.
    #[default]
    Redirect,
    /// `/path/` serves the same page without redirecting (dev preview).
    Mirror,
}

/// `[build.sitemap]` section.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SitemapConfig {
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub enable: bool,

    /// Output file, relative to the output directory.
    #[serde(default = "defaults::build::sitemap::path")]
    #[educe(Default = defaults::build::sitemap::path())]
    pub path: PathBuf,
}

/// `[build.format]` section.
///
/// The command receives a glob matching every rendered HTML file as its last argument.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct FormatConfig {
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub enable: bool,

    #[serde(default = "defaults::build::format::command")]
    #[educe(Default = defaults::build::format::command())]
    pub command: Vec<String>,
}

/// `[build.css]` section.
///
/// The command is invoked as `<command> -i <input> -o <output> [--minify]`.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct CssConfig {
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub enable: bool,

    #[serde(default = "defaults::build::css::command")]
    #[educe(Default = defaults::build::css::command())]
    pub command: Vec<String>,

    /// Input stylesheet, relative to the root.
    #[serde(default = "defaults::build::css::input")]
    #[educe(Default = defaults::build::css::input())]
    pub input: PathBuf,

    /// Output stylesheet, relative to the output directory.
    #[serde(default = "defaults::build::css::output")]
    #[educe(Default = defaults::build::css::output())]
    pub output: PathBuf,

    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub minify: bool,
}
