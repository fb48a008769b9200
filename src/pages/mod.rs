//! Page model and rendering.
//!
//! Every page kind decodes a [`PageMeta`] from its frontmatter, then hands it
//! to the shared [`Renderer`], which fills a template and writes the result
//! under the output directory.
//!
//! # Output paths
//!
//! | URL path       | File                   |
//! |----------------|------------------------|
//! | `/`            | `index.html`           |
//! | `/devlog`      | `devlog.html`          |
//! | `/devlog/`     | `devlog/index.html`    |
//! | `/404.html`    | `404.html`             |

pub mod basic;
pub mod gate;
pub mod icons;
pub mod index;
pub mod project;
mod templates;

pub use templates::Templates;

use crate::{
    config::{SiteConfig, TrailingSlash},
    content::{Validate, validate},
    error::SiteError,
    utils::minify::minify_html,
};
use anyhow::{Context, Result, bail};
use gate::Gate;
use icons::IconSet;
use serde::{Deserialize, Serialize};
use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Page Metadata
// ============================================================================

/// Metadata decoded from the `page` part of a frontmatter header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PageMeta {
    pub title: String,

    /// URL path, e.g. `/devlog`. Derived from the slug for project pages.
    #[serde(default)]
    pub path: String,

    /// Template file name. Defaulted per page kind when empty.
    #[serde(default)]
    pub template: String,

    /// Path this page redirects to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_path: Option<String>,

    /// Set by [`PageMeta::set_canonical_url`] before rendering.
    #[serde(skip_deserializing)]
    pub canonical_url: Option<String>,

    /// Go vanity import served from this page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub go_package: Option<GoPackage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GoPackage {
    /// Full import path, e.g. `hermannm.dev/devlog`.
    pub full_name: String,
    #[serde(rename = "githubURL")]
    pub github_url: String,
}

impl PageMeta {
    /// Canonical URL of this page: the bare base URL for `/`.
    pub fn set_canonical_url(&mut self, base_url: &str) {
        self.canonical_url = Some(page_url(base_url, &self.path));
    }

    /// Fill the template when the frontmatter left it empty.
    pub fn default_template(&mut self, template: &str) {
        if self.template.is_empty() {
            self.template = template.to_owned();
        }
    }
}

impl Validate for PageMeta {
    fn validate(&self) -> Result<()> {
        validate::required("page.title", &self.title)?;

        if !self.path.is_empty() && !self.path.starts_with('/') {
            bail!(SiteError::Validation(format!(
                "page.path must start with '/': {}",
                self.path
            )));
        }
        if !self.template.is_empty() {
            validate::filepath("page.template", &self.template)?;
        }
        if let Some(redirect) = &self.redirect_path {
            validate::required("page.redirectPath", redirect)?;
        }
        if let Some(package) = &self.go_package {
            validate::required("page.goPackage.fullName", &package.full_name)?;
            validate::url("page.goPackage.githubURL", &package.github_url)?;
        }
        Ok(())
    }
}

/// Absolute URL for a page path: `base_url + path`, or `base_url` for `/`.
pub fn page_url(base_url: &str, path: &str) -> String {
    if path == "/" {
        base_url.to_owned()
    } else {
        format!("{base_url}{path}")
    }
}

// ============================================================================
// Shared Frontmatter Types
// ============================================================================

/// Labeled link, optionally with an explicit icon name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LinkItem {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Name of an `[[icons]]` entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl Validate for LinkItem {
    fn validate(&self) -> Result<()> {
        validate::required("text", &self.text)?;
        if let Some(link) = &self.link {
            validate::link(&format!("link of '{}'", self.text), link)?;
        }
        Ok(())
    }
}

/// Image with explicit dimensions, e.g. a profile picture or project logo.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Image {
    pub path: String,
    pub alt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl Validate for Image {
    fn validate(&self) -> Result<()> {
        validate::filepath("image path", &self.path)?;
        validate::required(&format!("alt text of '{}'", self.path), &self.alt)
    }
}

// ============================================================================
// Pipeline Handles
// ============================================================================

/// Handles shared by the page tasks of one build.
///
/// Holds no summary sender or receivers, so that channel closure tracks the
/// tasks that own them.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub renderer: Arc<Renderer>,
    pub icons: Gate<IconSet>,
    pub groups: Gate<index::NavigationGroups>,
    pub pages: mpsc::Sender<PageMeta>,
    pub cancel: CancellationToken,
}

impl Pipeline {
    /// Report a page to the sitemap. Returns `false` if the run was cancelled.
    pub async fn publish_page(&self, page: PageMeta) -> bool {
        send_or_cancel(&self.pages, page, &self.cancel).await
    }
}

/// Send on a bounded channel unless the run is cancelled first.
///
/// Returns `false` on cancellation or when the receiver is gone.
pub async fn send_or_cancel<T>(
    tx: &mpsc::Sender<T>,
    value: T,
    cancel: &CancellationToken,
) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        sent = tx.send(value) => sent.is_ok(),
    }
}

// ============================================================================
// Site Data
// ============================================================================

/// Site-wide constants from the `[site]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonData {
    pub site_name: String,
    pub site_description: String,
    pub base_url: String,
    pub issues_link: String,
}

impl CommonData {
    pub fn from_config(config: &SiteConfig) -> Self {
        Self {
            site_name: config.site.name.clone(),
            site_description: config.site.description.clone(),
            base_url: config.site.base_url.clone(),
            issues_link: config.site.issues_link.clone(),
        }
    }
}

/// [`CommonData`] plus the resolved footer icon, shared by every render.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteData<'a> {
    #[serde(flatten)]
    pub common: &'a CommonData,
    pub github_icon: &'a str,
}

impl<'a> SiteData<'a> {
    pub fn new(common: &'a CommonData, icons: &'a IconSet) -> Self {
        Self {
            common,
            github_icon: icons.github_svg(),
        }
    }
}

/// Template context: `{ meta: { common, page }, ..data }`.
#[derive(Serialize)]
struct PageContext<'a, D> {
    meta: MetaContext<'a>,
    #[serde(flatten)]
    data: &'a D,
}

#[derive(Serialize)]
struct MetaContext<'a> {
    common: &'a SiteData<'a>,
    page: &'a PageMeta,
}

// ============================================================================
// Output Paths
// ============================================================================

/// File that a URL path is written to under `out_dir`.
///
/// # Errors
/// [`SiteError::Config`] for paths that are relative or leave `out_dir`.
pub fn output_path(out_dir: &Path, url_path: &str) -> Result<PathBuf> {
    let Some(relative) = url_path.strip_prefix('/') else {
        bail!(SiteError::Config(format!(
            "page path '{url_path}' must start with '/'"
        )));
    };

    let file = if relative.is_empty() {
        PathBuf::from("index.html")
    } else if let Some(dir) = relative.strip_suffix('/') {
        Path::new(dir).join("index.html")
    } else if relative.ends_with(".html") {
        PathBuf::from(relative)
    } else {
        PathBuf::from(format!("{relative}.html"))
    };

    if !file.components().all(|c| matches!(c, Component::Normal(_))) {
        bail!(SiteError::Config(format!(
            "page path '{url_path}' does not name a file inside the output directory"
        )));
    }

    Ok(out_dir.join(file))
}

// ============================================================================
// Renderer
// ============================================================================

/// Shared page writer. One per build, read-only.
#[derive(Debug)]
pub struct Renderer {
    templates: Templates,
    output: PathBuf,
    trailing_slash: TrailingSlash,
    minify: bool,
    common: CommonData,
}

impl Renderer {
    pub fn new(config: &SiteConfig, templates: Templates) -> Self {
        Self {
            templates,
            output: config.build.output.clone(),
            trailing_slash: config.build.trailing_slash,
            minify: config.build.minify,
            common: CommonData::from_config(config),
        }
    }

    pub fn common(&self) -> &CommonData {
        &self.common
    }

    /// Render a page at its path and, for extensionless paths, at `path/`.
    ///
    /// Under [`TrailingSlash::Redirect`] the `path/` copy redirects to `path`.
    pub async fn render_dual<D: Serialize>(
        &self,
        page: &PageMeta,
        icons: &IconSet,
        data: &D,
    ) -> Result<()> {
        if page.path == "/" || page.path.ends_with(".html") {
            return self.render(page, icons, data).await;
        }
        if page.path.ends_with('/') {
            bail!(SiteError::Config(format!(
                "expected page path '{}' not to end with a trailing slash",
                page.path
            )));
        }

        let mut slashed = page.clone();
        slashed.path.push('/');
        if self.trailing_slash == TrailingSlash::Redirect {
            slashed.redirect_path = Some(page.path.clone());
        }

        tokio::try_join!(
            self.render(page, icons, data),
            self.render(&slashed, icons, data)
        )?;
        Ok(())
    }

    /// Render one page to its output file.
    pub async fn render<D: Serialize>(
        &self,
        page: &PageMeta,
        icons: &IconSet,
        data: &D,
    ) -> Result<()> {
        let html = self.render_to_string(page, icons, data)?;
        let path = output_path(&self.output, &page.path)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| SiteError::io(parent, err))?;
        }
        let html = minify_html(&html, self.minify);
        tokio::fs::write(&path, html.as_bytes())
            .await
            .map_err(|err| SiteError::io(&path, err))?;
        Ok(())
    }

    fn render_to_string<D: Serialize>(
        &self,
        page: &PageMeta,
        icons: &IconSet,
        data: &D,
    ) -> Result<String> {
        if page.canonical_url.is_none() {
            bail!(
                "canonical URL must be set before rendering page '{}'",
                page.path
            );
        }

        let site = SiteData::new(&self.common, icons);
        let context = PageContext {
            meta: MetaContext {
                common: &site,
                page,
            },
            data,
        };
        self.templates
            .render(&page.template, &context)
            .with_context(|| format!("failed to render page '{}'", page.path))
    }
}

// ============================================================================
// Tests
// ============================================================================
