//! Project pages.
//!
//! One markdown file per project, under one of the `[build] project_dirs`.
//! Each project task parses its file, waits for the index page's navigation
//! groups and for the icon set, resolves its icons, reports a summary to the
//! index page, then renders `/{slug}`.
//!
//! ```yaml
//! ---
//! name: devlog
//! slug: devlog
//! tagline: Structured logging library for Go.
//! techStack:
//!   - text: Go
//!     usedWith:
//!       - text: slog
//!         link: https://pkg.go.dev/log/slog
//!     usedFor: structured logging
//! linkGroups:
//!   - title: Code
//!     links:
//!       - text: hermannm/devlog
//!         link: https://github.com/hermannm/devlog
//! goPackage:
//!   fullName: hermannm.dev/devlog
//!   githubURL: https://github.com/hermannm/devlog
//! ---
//! ```

use super::{
    GoPackage, Image, LinkItem, PageMeta, Pipeline, send_or_cancel,
    icons::{Icon, IconSet},
};
use crate::{
    content::{Validate, read_markdown, render_markdown, strip_paragraph, validate},
    error::SiteError,
};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

pub const PROJECT_PAGE_TEMPLATE: &str = "project_page.html.jinja";
pub const DEFAULT_TECH_STACK_TITLE: &str = "Built with";

// ============================================================================
// Frontmatter
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProjectFrontmatter {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub tagline: String,
    /// Shown instead of an icon on the index page.
    #[serde(default)]
    pub logo: Option<Image>,
    #[serde(default)]
    pub tech_stack: Vec<TechStackItem>,
    /// Defaults to [`DEFAULT_TECH_STACK_TITLE`] when the tech stack is non-empty.
    #[serde(default)]
    pub tech_stack_title: String,
    #[serde(default)]
    pub link_groups: Vec<LinkGroup>,
    /// Markdown, rendered inline.
    #[serde(default)]
    pub footnote: String,
    #[serde(default)]
    pub go_package: Option<GoPackage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TechStackItem {
    pub text: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub used_with: Vec<LinkItem>,
    /// Required when `used_with` is non-empty.
    #[serde(default)]
    pub used_for: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LinkGroup {
    pub title: String,
    pub links: Vec<LinkItem>,
}

impl Validate for ProjectFrontmatter {
    fn validate(&self) -> Result<()> {
        validate::required("name", &self.name)?;
        validate::required("slug", &self.slug)?;
        if self.slug.contains('/') {
            bail!(SiteError::Validation(format!(
                "slug must not contain '/': {}",
                self.slug
            )));
        }
        if let Some(logo) = &self.logo {
            logo.validate()?;
        }

        for item in &self.tech_stack {
            validate::required("techStack.text", &item.text)?;
            if let Some(link) = &item.link {
                validate::link(&format!("link of '{}'", item.text), link)?;
            }
            for used in &item.used_with {
                used.validate()?;
            }
            if !item.used_with.is_empty() {
                validate::required(&format!("usedFor of '{}'", item.text), &item.used_for)?;
            }
        }
        for group in &self.link_groups {
            validate::required("linkGroups.title", &group.title)?;
            for link in &group.links {
                link.validate()?;
            }
        }
        if let Some(package) = &self.go_package {
            validate::required("goPackage.fullName", &package.full_name)?;
            validate::url("goPackage.githubURL", &package.github_url)?;
        }
        Ok(())
    }
}

// ============================================================================
// Resolved Data
// ============================================================================

/// Project data sent to the index page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub name: String,
    pub slug: String,
    /// Page path, `/{slug}`. Matched against the index page's group slots.
    pub path: String,
    pub tagline: String,
    #[serde(skip)]
    pub content_dir: PathBuf,
    /// Icon markup for the index page.
    pub index_icon: Option<String>,
    pub logo: Option<Image>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedLink {
    pub text: String,
    pub link: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTech {
    pub text: String,
    pub link: Option<String>,
    pub icon: Option<String>,
    pub used_with: Vec<ResolvedLink>,
    pub used_for: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedLinkGroup {
    pub title: String,
    pub links: Vec<ResolvedLink>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectPageData<'a> {
    project: ProjectData<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectData<'a> {
    name: &'a str,
    slug: &'a str,
    tagline: &'a str,
    logo: Option<&'a Image>,
    description: &'a str,
    tech_stack_title: &'a str,
    tech_stack: Vec<ResolvedTech>,
    link_groups: Vec<ResolvedLinkGroup>,
    footnote: &'a str,
    back_link: String,
}

// ============================================================================
// Icon Resolution
// ============================================================================

fn primary_svg(icon: &Icon) -> Result<String> {
    icon.svg.clone().ok_or_else(|| {
        SiteError::Config(format!("icon '{}' has no primary `path`", icon.name)).into()
    })
}

/// Icon for a link: the named icon, else the first icon whose prefixes match.
///
/// # Errors
/// [`SiteError::Config`] if a named icon does not exist.
pub fn resolve_link(icons: &IconSet, item: &LinkItem) -> Result<ResolvedLink> {
    let icon = match &item.icon {
        Some(name) => Some(primary_svg(icons.get(name)?)?),
        None => item
            .link
            .as_deref()
            .and_then(|link| icons.for_url(link))
            .and_then(|icon| icon.svg.clone()),
    };

    Ok(ResolvedLink {
        text: item.text.clone(),
        link: item.link.clone(),
        icon,
    })
}

/// Icon entry for a tech-stack item: the named icon, else the icon named
/// like the item, else the first icon whose prefixes match its link.
pub fn tech_icon<'a>(icons: &'a IconSet, item: &TechStackItem) -> Result<Option<&'a Icon>> {
    if let Some(name) = &item.icon {
        return icons.get(name).map(Some);
    }
    Ok(icons.find(&item.text).or_else(|| {
        item.link
            .as_deref()
            .and_then(|link| icons.for_url(link))
    }))
}

/// Resolve a tech-stack item. A missing link defaults to the icon's link.
pub fn resolve_tech<'a>(
    icons: &'a IconSet,
    item: &TechStackItem,
) -> Result<(ResolvedTech, Option<&'a Icon>)> {
    let entry = tech_icon(icons, item)?;
    let used_with = item
        .used_with
        .iter()
        .map(|used| resolve_link(icons, used))
        .collect::<Result<_>>()?;

    let tech = ResolvedTech {
        text: item.text.clone(),
        link: item
            .link
            .clone()
            .or_else(|| entry.and_then(|icon| icon.link.clone())),
        icon: entry.and_then(|icon| icon.svg.clone()),
        used_with,
        used_for: item.used_for.clone(),
    };
    Ok((tech, entry))
}

/// Icon for the index page.
///
/// A combined icon named by the tech texts joined with `+` wins, e.g.
/// `Kotlin+Go+Rust`; otherwise the first tech icon, preferring its fallback.
pub fn index_icon(icons: &IconSet, tech_stack: &[TechStackItem], entries: &[&Icon]) -> Option<String> {
    let combined = tech_stack
        .iter()
        .map(|item| item.text.as_str())
        .collect::<Vec<_>>()
        .join("+");

    icons
        .find(&combined)
        .and_then(Icon::index_svg)
        .or_else(|| entries.iter().find_map(|icon| icon.index_svg()))
        .map(str::to_owned)
}

// ============================================================================
// Task
// ============================================================================

/// A project markdown file and the project directory it was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSource {
    pub path: PathBuf,
    /// As listed in `[build] project_dirs`, e.g. `projects`.
    pub content_dir: PathBuf,
}

/// Build the page metadata for a project.
pub fn project_page(project: &ProjectFrontmatter, site_name: &str, base_url: &str) -> PageMeta {
    let mut page = PageMeta {
        title: format!("{site_name}/{}", project.slug),
        path: format!("/{}", project.slug),
        template: PROJECT_PAGE_TEMPLATE.to_owned(),
        go_package: project.go_package.clone(),
        ..Default::default()
    };
    page.set_canonical_url(base_url);
    page
}

fn render_footnote(path: &Path, footnote: &str) -> Result<String> {
    if footnote.is_empty() {
        return Ok(String::new());
    }
    let html = render_markdown(footnote).map_err(|err| SiteError::parse(path, err))?;
    Ok(strip_paragraph(&html))
}

/// Parse, wait for groups and icons, resolve, publish, render.
///
/// Returns without output if the run is cancelled.
pub async fn render_project_page(
    pipeline: &Pipeline,
    summaries: &mpsc::Sender<ProjectSummary>,
    source: &ProjectSource,
) -> Result<()> {
    let path = &source.path;
    let (mut project, description) = read_markdown::<ProjectFrontmatter>(path)
        .await
        .with_context(|| format!("failed to read project {}", path.display()))?;

    let common = pipeline.renderer.common();
    let page = project_page(&project, &common.site_name, &common.base_url);
    if !project.tech_stack.is_empty() && project.tech_stack_title.is_empty() {
        project.tech_stack_title = DEFAULT_TECH_STACK_TITLE.to_owned();
    }
    let footnote = render_footnote(path, &project.footnote)?;

    let Some(groups) = pipeline.groups.wait(&pipeline.cancel).await else {
        return Ok(());
    };
    let back_link = groups
        .back_link(&source.content_dir)
        .with_context(|| format!("project '{}'", project.slug))?;

    let Some(icons) = pipeline.icons.wait(&pipeline.cancel).await else {
        return Ok(());
    };

    let mut tech_stack = Vec::with_capacity(project.tech_stack.len());
    let mut entries = Vec::new();
    for item in &project.tech_stack {
        let (tech, entry) = resolve_tech(&icons, item)
            .with_context(|| format!("tech stack of project '{}'", project.slug))?;
        tech_stack.push(tech);
        entries.extend(entry);
    }
    let link_groups = project
        .link_groups
        .iter()
        .map(|group| {
            Ok(ResolvedLinkGroup {
                title: group.title.clone(),
                links: group
                    .links
                    .iter()
                    .map(|link| resolve_link(&icons, link))
                    .collect::<Result<_>>()?,
            })
        })
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("links of project '{}'", project.slug))?;

    let summary = ProjectSummary {
        name: project.name.clone(),
        slug: project.slug.clone(),
        path: page.path.clone(),
        tagline: project.tagline.clone(),
        content_dir: source.content_dir.clone(),
        index_icon: index_icon(&icons, &project.tech_stack, &entries),
        logo: project.logo.clone(),
    };
    if !send_or_cancel(summaries, summary, &pipeline.cancel).await {
        return Ok(());
    }
    if !pipeline.publish_page(page.clone()).await {
        return Ok(());
    }

    let data = ProjectPageData {
        project: ProjectData {
            name: &project.name,
            slug: &project.slug,
            tagline: &project.tagline,
            logo: project.logo.as_ref(),
            description: &description,
            tech_stack_title: &project.tech_stack_title,
            tech_stack,
            link_groups,
            footnote: &footnote,
            back_link,
        },
    };
    pipeline
        .renderer
        .render_dual(&page, &icons, &data)
        .await
        .with_context(|| format!("failed to render page for project '{}'", project.slug))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IconConfig;
    use crate::error::kind_of;
    use crate::pages::icons::{GITHUB_ICON, resolve_icons};
    use std::fs;
    use tempfile::TempDir;

    async fn icon_set(dir: &TempDir) -> IconSet {
        let svg = |name: &str| {
            let path = dir.path().join(format!("{name}.svg"));
            fs::write(&path, format!("<svg>{name}</svg>")).unwrap();
            Some(path)
        };
        let table = vec![
            IconConfig {
                name: GITHUB_ICON.into(),
                path: svg("github"),
                link_prefixes: vec!["https://github.com".into()],
                ..Default::default()
            },
            IconConfig {
                name: "Go".into(),
                path: svg("go"),
                link: Some("https://go.dev".into()),
                link_prefixes: vec!["https://pkg.go.dev".into()],
                ..Default::default()
            },
            IconConfig {
                name: "Rust".into(),
                path: svg("rust"),
                link: Some("https://www.rust-lang.org".into()),
                index_fallback: svg("rust-alt"),
                ..Default::default()
            },
            IconConfig {
                name: "Go+Rust".into(),
                index_fallback: svg("go-rust"),
                ..Default::default()
            },
        ];
        resolve_icons(&table).await.unwrap()
    }

    fn tech(text: &str) -> TechStackItem {
        TechStackItem {
            text: text.into(),
            link: None,
            icon: None,
            used_with: Vec::new(),
            used_for: String::new(),
        }
    }

    #[tokio::test]
    async fn test_resolve_link_by_name_and_prefix() {
        let dir = TempDir::new().unwrap();
        let icons = icon_set(&dir).await;

        let named = LinkItem {
            text: "Source".into(),
            link: Some("https://example.com".into()),
            icon: Some("Go".into()),
        };
        assert_eq!(resolve_link(&icons, &named).unwrap().icon.as_deref(), Some("<svg>go</svg>"));

        let prefixed = LinkItem {
            text: "hermannm/devlog".into(),
            link: Some("https://github.com/hermannm/devlog".into()),
            icon: None,
        };
        assert_eq!(
            resolve_link(&icons, &prefixed).unwrap().icon.as_deref(),
            Some("<svg>github</svg>")
        );

        let plain = LinkItem {
            text: "Blog".into(),
            link: Some("https://example.com".into()),
            icon: None,
        };
        assert_eq!(resolve_link(&icons, &plain).unwrap().icon, None);
    }

    #[tokio::test]
    async fn test_resolve_link_unknown_name() {
        let dir = TempDir::new().unwrap();
        let icons = icon_set(&dir).await;

        let item = LinkItem {
            text: "Zig".into(),
            icon: Some("Zig".into()),
            ..Default::default()
        };
        let err = resolve_link(&icons, &item).unwrap_err();
        assert!(matches!(kind_of(&err), Some(SiteError::Config(_))));
    }

    #[tokio::test]
    async fn test_resolve_tech_defaults_link() {
        let dir = TempDir::new().unwrap();
        let icons = icon_set(&dir).await;

        let (go, entry) = resolve_tech(&icons, &tech("Go")).unwrap();
        assert_eq!(go.link.as_deref(), Some("https://go.dev"));
        assert_eq!(go.icon.as_deref(), Some("<svg>go</svg>"));
        assert_eq!(entry.unwrap().name, "Go");

        let mut slog = tech("slog");
        slog.link = Some("https://pkg.go.dev/log/slog".into());
        let (slog, entry) = resolve_tech(&icons, &slog).unwrap();
        assert_eq!(slog.link.as_deref(), Some("https://pkg.go.dev/log/slog"));
        assert_eq!(entry.unwrap().name, "Go");

        let (other, entry) = resolve_tech(&icons, &tech("Elm")).unwrap();
        assert!(entry.is_none());
        assert_eq!(other.icon, None);
        assert_eq!(other.link, None);
    }

    #[tokio::test]
    async fn test_index_icon_combined_then_first() {
        let dir = TempDir::new().unwrap();
        let icons = icon_set(&dir).await;

        let stack = vec![tech("Go"), tech("Rust")];
        let entries = vec![icons.get("Go").unwrap(), icons.get("Rust").unwrap()];
        assert_eq!(
            index_icon(&icons, &stack, &entries).as_deref(),
            Some("<svg>go-rust</svg>")
        );

        let stack = vec![tech("Rust"), tech("Go")];
        let entries = vec![icons.get("Rust").unwrap(), icons.get("Go").unwrap()];
        assert_eq!(
            index_icon(&icons, &stack, &entries).as_deref(),
            Some("<svg>rust-alt</svg>")
        );

        assert_eq!(index_icon(&icons, &[], &[]), None);
    }

    #[test]
    fn test_project_page() {
        let project: ProjectFrontmatter =
            serde_yaml::from_str("name: devlog\nslug: devlog\n").unwrap();
        let page = project_page(&project, "hermannm.dev", "https://hermannm.dev");
        assert_eq!(page.title, "hermannm.dev/devlog");
        assert_eq!(page.path, "/devlog");
        assert_eq!(page.template, PROJECT_PAGE_TEMPLATE);
        assert_eq!(page.canonical_url.as_deref(), Some("https://hermannm.dev/devlog"));
    }

    #[test]
    fn test_frontmatter_validation() {
        let project: ProjectFrontmatter = serde_yaml::from_str(
            "name: x\nslug: x\ntechStack:\n  - text: Go\n    usedWith: [{text: slog}]\n",
        )
        .unwrap();
        let err = project.validate().unwrap_err();
        assert!(matches!(kind_of(&err), Some(SiteError::Validation(_))));

        let project: ProjectFrontmatter = serde_yaml::from_str("name: x\nslug: a/b\n").unwrap();
        assert!(project.validate().is_err());
    }

    #[test]
    fn test_render_footnote_inline() {
        let html = render_footnote(Path::new("p.md"), "Forked from *upstream*.").unwrap();
        assert_eq!(html, "Forked from <em>upstream</em>.");
        assert_eq!(render_footnote(Path::new("p.md"), "").unwrap(), "");
    }
}
