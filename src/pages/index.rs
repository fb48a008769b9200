//! The index page: personal info plus every project, grouped for navigation.
//!
//! The index publishes its navigation groups as soon as it has parsed them,
//! since project pages need them for their back links. It then collects one
//! summary per project until every declared slot is filled.
//!
//! ```yaml
//! ---
//! page:
//!   title: hermannm.dev
//! birthday: 1999-09-12
//! personalInfo:
//!   - text: ${age} years old
//!   - text: GitHub
//!     link: https://github.com/hermannm
//! groups:
//!   - title: Projects
//!     slug: projects
//!     contentDir: projects
//!     projects: [/devlog, /personal-website]
//! ---
//! ```

use super::{
    Image, LinkItem, PageMeta, Pipeline,
    gate::GatePublisher,
    project::{ProjectSummary, ResolvedLink, resolve_link},
};
use crate::{
    content::{Validate, read_markdown, strip_paragraph, validate},
    error::SiteError,
    utils::date::age_today,
};
use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

pub const INDEX_PAGE_TEMPLATE: &str = "index_page.html.jinja";

const AGE_PLACEHOLDER: &str = "${age}";

// ============================================================================
// Frontmatter
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IndexFrontmatter {
    pub page: PageMeta,
    #[serde(default)]
    pub birthday: Option<NaiveDate>,
    #[serde(default)]
    pub personal_info: Vec<LinkItem>,
    #[serde(default)]
    pub profile_picture_mobile: Option<Image>,
    #[serde(default)]
    pub profile_picture_desktop: Option<Image>,
    #[serde(default)]
    pub groups: Vec<GroupFrontmatter>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GroupFrontmatter {
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub intro: String,
    /// Project page paths, in display order.
    #[serde(default)]
    pub projects: Vec<String>,
    /// Project directory (as in `[build] project_dirs`) the projects come from.
    pub content_dir: PathBuf,
}

impl Validate for IndexFrontmatter {
    fn validate(&self) -> Result<()> {
        self.page.validate()?;

        for item in &self.personal_info {
            item.validate()?;
            if self.birthday.is_none() && item.text.contains(AGE_PLACEHOLDER) {
                bail!(SiteError::Validation(format!(
                    "personal info '{}' uses {AGE_PLACEHOLDER} but no birthday is set",
                    item.text
                )));
            }
        }
        for picture in [&self.profile_picture_mobile, &self.profile_picture_desktop]
            .into_iter()
            .flatten()
        {
            picture.validate()?;
        }

        let mut dirs = rustc_hash::FxHashSet::default();
        for group in &self.groups {
            validate::required("group title", &group.title)?;
            validate::required(&format!("slug of group '{}'", group.title), &group.slug)?;
            if !dirs.insert(&group.content_dir) {
                bail!(SiteError::Validation(format!(
                    "content directory '{}' is used by more than one group",
                    group.content_dir.display()
                )));
            }

            let mut paths = rustc_hash::FxHashSet::default();
            for path in &group.projects {
                if !path.starts_with('/') || !paths.insert(path) {
                    bail!(SiteError::Validation(format!(
                        "group '{}' lists project '{path}' more than once or without a leading '/'",
                        group.title
                    )));
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Navigation Groups
// ============================================================================

/// Group order and content directories, published to project pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationGroups {
    pub groups: Vec<NavigationGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationGroup {
    pub title: String,
    pub slug: String,
    pub content_dir: PathBuf,
}

impl NavigationGroups {
    /// Link from a project page back to its group on the index page.
    ///
    /// The first group is the default tab and links to the bare index.
    ///
    /// # Errors
    /// [`SiteError::Config`] if no group takes projects from `content_dir`.
    pub fn back_link(&self, content_dir: &Path) -> Result<String> {
        match self
            .groups
            .iter()
            .position(|group| group.content_dir == content_dir)
        {
            Some(0) => Ok("/".to_owned()),
            Some(i) => Ok(format!("/#{}", self.groups[i].slug)),
            None => bail!(SiteError::Config(format!(
                "no navigation group for content directory '{}'",
                content_dir.display()
            ))),
        }
    }
}

impl From<&[GroupFrontmatter]> for NavigationGroups {
    fn from(groups: &[GroupFrontmatter]) -> Self {
        Self {
            groups: groups
                .iter()
                .map(|group| NavigationGroup {
                    title: group.title.clone(),
                    slug: group.slug.clone(),
                    content_dir: group.content_dir.clone(),
                })
                .collect(),
        }
    }
}

// ============================================================================
// Project Groups
// ============================================================================

/// One navigation group with a slot per declared project path.
#[derive(Debug, Clone)]
pub struct ProjectGroup {
    pub title: String,
    pub slug: String,
    pub intro: String,
    pub content_dir: PathBuf,
    slots: Vec<Option<ProjectSummary>>,
    by_path: FxHashMap<String, usize>,
}

impl ProjectGroup {
    pub fn new(group: &GroupFrontmatter) -> Self {
        Self {
            title: group.title.clone(),
            slug: group.slug.clone(),
            intro: group.intro.clone(),
            content_dir: group.content_dir.clone(),
            slots: vec![None; group.projects.len()],
            by_path: group
                .projects
                .iter()
                .enumerate()
                .map(|(i, path)| (path.clone(), i))
                .collect(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    fn missing(&self) -> impl Iterator<Item = &str> {
        self.by_path
            .iter()
            .filter(|&(_, &i)| self.slots.get(i).is_some_and(Option::is_none))
            .map(|(path, _)| path.as_str())
    }

    fn put(&mut self, slot: usize, project: ProjectSummary) -> Result<()> {
        let len = self.slots.len();
        let Some(entry) = self.slots.get_mut(slot) else {
            bail!(SiteError::Config(format!(
                "project '{}' maps to slot {slot} of group '{}', which has {len} slots",
                project.path, self.title
            )));
        };
        if entry.is_some() {
            bail!(SiteError::Config(format!(
                "project '{}' was added to group '{}' twice",
                project.path, self.title
            )));
        }
        *entry = Some(project);
        Ok(())
    }
}

/// Every group of the index page, filled as project summaries arrive.
#[derive(Debug, Clone)]
pub struct ProjectGroups {
    groups: Vec<ProjectGroup>,
}

impl ProjectGroups {
    pub fn new(groups: &[GroupFrontmatter]) -> Self {
        Self {
            groups: groups.iter().map(ProjectGroup::new).collect(),
        }
    }

    /// Put a project into its slot.
    ///
    /// Projects from an unknown content directory, or with a path their
    /// group does not list, are left out of the index.
    ///
    /// # Errors
    /// - [`SiteError::Validation`] if the project has no icon or logo to show
    /// - [`SiteError::Config`] if the slot is out of bounds or already filled
    pub fn fill(&mut self, project: ProjectSummary) -> Result<()> {
        let Some(group) = self
            .groups
            .iter_mut()
            .find(|group| group.content_dir == project.content_dir)
        else {
            return Ok(());
        };
        let Some(&slot) = group.by_path.get(&project.path) else {
            return Ok(());
        };

        if project.index_icon.is_none() && project.logo.is_none() {
            bail!(SiteError::Validation(format!(
                "project '{}' has neither an icon nor a logo to show on the index page",
                project.path
            )));
        }
        group.put(slot, project)
    }

    pub fn is_full(&self) -> bool {
        self.groups.iter().all(ProjectGroup::is_full)
    }

    fn missing(&self) -> Vec<String> {
        let mut missing: Vec<String> = self
            .groups
            .iter()
            .flat_map(|group| {
                group
                    .missing()
                    .map(|path| format!("{path} ({})", group.content_dir.display()))
            })
            .collect();
        missing.sort();
        missing
    }

    /// Receive one summary from each of the `project_count` projects.
    ///
    /// Projects not listed in any group are received and ignored, so every
    /// project task can hand off its summary. Returns `Ok(false)` if the run
    /// is cancelled first.
    ///
    /// # Errors
    /// [`SiteError::Config`] naming the unfilled slots if the groups are not
    /// full once every project has reported, or if the projects run out early.
    pub async fn collect(
        &mut self,
        summaries: &mut mpsc::Receiver<ProjectSummary>,
        project_count: usize,
        cancel: &tokio_util::sync::CancellationToken,
    ) -> Result<bool> {
        let mut received = 0;
        while received < project_count {
            let summary = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(false),
                summary = summaries.recv() => summary,
            };
            match summary {
                Some(summary) => {
                    received += 1;
                    self.fill(summary)?;
                }
                // Failed tasks cancel before releasing their sender
                None if cancel.is_cancelled() => return Ok(false),
                None => return Err(self.unfilled_error(received)),
            }
        }

        if self.is_full() {
            Ok(true)
        } else {
            Err(self.unfilled_error(received))
        }
    }

    fn unfilled_error(&self, received: usize) -> anyhow::Error {
        SiteError::Config(format!(
            "index page groups are not full after {received} projects, missing: {}",
            self.missing().join(", ")
        ))
        .into()
    }
}

// ============================================================================
// Rendering
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexPageData<'a> {
    about_me: String,
    personal_info: Vec<ResolvedLink>,
    profile_picture_mobile: Option<&'a Image>,
    profile_picture_desktop: Option<&'a Image>,
    groups: Vec<GroupData<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GroupData<'a> {
    title: &'a str,
    slug: &'a str,
    intro: &'a str,
    projects: Vec<&'a ProjectSummary>,
}

impl<'a> From<&'a ProjectGroup> for GroupData<'a> {
    fn from(group: &'a ProjectGroup) -> Self {
        Self {
            title: &group.title,
            slug: &group.slug,
            intro: &group.intro,
            projects: group.slots.iter().flatten().collect(),
        }
    }
}

/// Replace the age placeholder in personal-info texts.
pub fn set_age(personal_info: &mut [LinkItem], age: i32) {
    let age = age.to_string();
    for item in personal_info {
        item.text = item.text.replacen(AGE_PLACEHOLDER, &age, 1);
    }
}

/// Parse, publish navigation groups, collect project summaries, render.
///
/// Returns without output if the run is cancelled.
pub async fn render_index_page(
    pipeline: &Pipeline,
    content_path: &Path,
    groups_tx: GatePublisher<NavigationGroups>,
    mut summaries: mpsc::Receiver<ProjectSummary>,
    project_count: usize,
) -> Result<()> {
    let (mut index, body) = read_markdown::<IndexFrontmatter>(content_path)
        .await
        .with_context(|| format!("failed to read index page {}", content_path.display()))?;

    groups_tx.publish(NavigationGroups::from(index.groups.as_slice()));
    let mut groups = ProjectGroups::new(&index.groups);

    let mut page = index.page.clone();
    page.path = "/".to_owned();
    page.default_template(INDEX_PAGE_TEMPLATE);
    page.set_canonical_url(&pipeline.renderer.common().base_url);

    if !pipeline.publish_page(page.clone()).await {
        return Ok(());
    }
    if !groups
        .collect(&mut summaries, project_count, &pipeline.cancel)
        .await?
    {
        return Ok(());
    }
    let Some(icons) = pipeline.icons.wait(&pipeline.cancel).await else {
        return Ok(());
    };

    if let Some(birthday) = index.birthday {
        set_age(&mut index.personal_info, age_today(birthday));
    }
    let personal_info = index
        .personal_info
        .iter()
        .map(|item| resolve_link(&icons, item))
        .collect::<Result<Vec<_>>>()
        .context("personal info on index page")?;

    let data = IndexPageData {
        about_me: strip_paragraph(&body),
        personal_info,
        profile_picture_mobile: index.profile_picture_mobile.as_ref(),
        profile_picture_desktop: index.profile_picture_desktop.as_ref(),
        groups: groups.groups.iter().map(GroupData::from).collect(),
    };
    pipeline
        .renderer
        .render(&page, &icons, &data)
        .await
        .context("failed to render index page")
}

// ============================================================================
// Tests
// ============================================================================
