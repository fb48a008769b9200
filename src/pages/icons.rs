//! Icon resolution.
//!
//! Loads every SVG referenced by the `[[icons]]` table into memory and seals
//! the result into an immutable [`IconSet`], published through the icons gate.

use crate::{config::IconConfig, error::SiteError, log};
use anyhow::{Context, Result, bail};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use tokio::task::JoinSet;

/// Icon whose markup is shown in every page's footer.
pub const GITHUB_ICON: &str = "GitHub";

// ============================================================================
// Resolved Icons
// ============================================================================

/// One icon with its SVG markup loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Icon {
    pub name: String,
    /// Primary markup. `None` for index-only entries such as combined badges.
    pub svg: Option<String>,
    pub link: Option<String>,
    /// Markup preferred on the index page.
    pub index_fallback: Option<String>,
    link_prefixes: Vec<String>,
}

impl Icon {
    /// Markup to show on the index page: fallback first, then primary.
    pub fn index_svg(&self) -> Option<&str> {
        self.index_fallback.as_deref().or(self.svg.as_deref())
    }

    fn matches_url(&self, url: &str) -> bool {
        self.link_prefixes
            .iter()
            .any(|prefix| url.starts_with(prefix.as_str()))
    }
}

/// Sealed icon table. Only constructed by [`resolve_icons`].
#[derive(Debug, Default)]
pub struct IconSet {
    icons: Vec<Icon>,
    by_name: FxHashMap<String, usize>,
}

impl IconSet {
    /// Look up an icon by name.
    ///
    /// # Errors
    /// [`SiteError::Config`] if no icon has that name.
    pub fn get(&self, name: &str) -> Result<&Icon> {
        self.find(name).ok_or_else(|| {
            SiteError::Config(format!("no icon named '{name}' in the icon table")).into()
        })
    }

    pub fn find(&self, name: &str) -> Option<&Icon> {
        self.by_name.get(name).map(|&i| &self.icons[i])
    }

    /// First icon, in declaration order, with a link prefix matching `url`.
    pub fn for_url(&self, url: &str) -> Option<&Icon> {
        self.icons.iter().find(|icon| icon.matches_url(url))
    }

    /// Footer icon markup. Presence is checked by [`resolve_icons`].
    pub fn github_svg(&self) -> &str {
        self.find(GITHUB_ICON)
            .and_then(|icon| icon.svg.as_deref())
            .unwrap_or_default()
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Load every SVG of the icon table concurrently.
///
/// Each distinct file is read once, on its own task.
///
/// # Errors
/// - [`SiteError::Io`] if any file cannot be read
/// - [`SiteError::Config`] if the `GitHub` entry or its primary icon is missing
pub async fn resolve_icons(table: &[IconConfig]) -> Result<IconSet> {
    let files = load_files(table).await?;
    let svg = |path: &Option<PathBuf>| path.as_ref().and_then(|p| files.get(p).cloned());

    let mut set = IconSet::default();
    for entry in table {
        if set.by_name.contains_key(&entry.name) {
            bail!(SiteError::Config(format!(
                "icon '{}' is declared more than once",
                entry.name
            )));
        }
        set.by_name.insert(entry.name.clone(), set.icons.len());
        set.icons.push(Icon {
            name: entry.name.clone(),
            svg: svg(&entry.path),
            link: entry.link.clone(),
            index_fallback: svg(&entry.index_fallback),
            link_prefixes: entry.link_prefixes.clone(),
        });
    }

    match set.find(GITHUB_ICON) {
        Some(icon) if icon.svg.is_some() => {
            log!("icons"; "{} icons", set.icons.len());
            Ok(set)
        }
        Some(_) => bail!(SiteError::Config(format!(
            "icon '{GITHUB_ICON}' must have a primary `path`"
        ))),
        None => bail!(SiteError::Config(format!(
            "expected icon table to have an entry for '{GITHUB_ICON}'"
        ))),
    }
}

async fn load_files(table: &[IconConfig]) -> Result<FxHashMap<PathBuf, String>> {
    let mut paths: Vec<&Path> = table
        .iter()
        .flat_map(|entry| [entry.path.as_deref(), entry.index_fallback.as_deref()])
        .flatten()
        .collect();
    paths.sort_unstable();
    paths.dedup();

    let mut tasks = JoinSet::new();
    for path in paths {
        let path = path.to_path_buf();
        tasks.spawn(async move {
            let svg = tokio::fs::read_to_string(&path)
                .await
                .map_err(|err| SiteError::io(&path, err))?;
            Ok::<_, SiteError>((path, svg.trim().to_owned()))
        });
    }

    let mut files = FxHashMap::default();
    while let Some(joined) = tasks.join_next().await {
        let (path, svg) = joined.context("icon loading task panicked")??;
        files.insert(path, svg);
    }
    Ok(files)
}

// ============================================================================
// Tests
// ============================================================================
