//! File system watcher for dev rebuilds.
//!
//! Monitors the content and template directories, the config file and the
//! CSS input, and rebuilds the whole site on change. A failed rebuild is
//! logged and the watcher keeps running.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐    ┌───────────┐    ┌──────────────┐
//! │ notify   │───▶│ Debouncer │───▶│ build_site() │
//! │ events   │    │  (100ms)  │    │              │
//! └──────────┘    └───────────┘    └──────────────┘
//! ```

use crate::{build::build_site, cli::Cli, config::SiteConfig, log};
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::{
    path::{Path, PathBuf},
    sync::mpsc,
    time::{Duration, Instant},
};

// =============================================================================
// Constants
// =============================================================================

/// Editors often emit several events per save.
const DEBOUNCE: Duration = Duration::from_millis(100);

// =============================================================================
// Path Utilities
// =============================================================================

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// `/site/content/projects/devlog.md` → `content/projects/devlog.md`
fn rel_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

const fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    )
}

// =============================================================================
// Debounce State
// =============================================================================

/// Drops repeated events for the path that triggered the last rebuild.
#[derive(Debug, Default)]
struct Debouncer {
    last: Option<(PathBuf, Instant)>,
}

impl Debouncer {
    /// Whether an event for `path` at `now` should trigger a rebuild.
    fn should_rebuild(&mut self, path: &Path, now: Instant) -> bool {
        if let Some((last_path, at)) = &self.last
            && last_path == path
            && now.saturating_duration_since(*at) < DEBOUNCE
        {
            return false;
        }
        self.last = Some((path.to_path_buf(), now));
        true
    }
}

// =============================================================================
// Rebuild
// =============================================================================

/// Rebuild the site, reloading the config first if it was the changed file.
///
/// Returns the config to use for later rebuilds.
fn rebuild(
    config: &'static SiteConfig,
    cli: &Cli,
    changed: &Path,
) -> &'static SiteConfig {
    log!("watch"; "{} changed, rebuilding...", rel_path(changed, config.get_root()));

    let config = if changed == config.config_path.as_path() {
        match SiteConfig::load(cli) {
            Ok(reloaded) => &*Box::leak(Box::new(reloaded)),
            Err(err) => {
                log!("watch"; "config reload failed, keeping previous config");
                log!("error"; "{err:#}");
                return config;
            }
        }
    } else {
        config
    };

    if let Err(err) = build_site(config) {
        log!("watch"; "build failed");
        log!("error"; "{err:#}");
    }
    config
}

// =============================================================================
// Watcher Setup
// =============================================================================

/// Paths to watch, with whether each is a directory.
fn watch_targets(config: &SiteConfig) -> Vec<(&Path, bool)> {
    let build = &config.build;
    let mut targets = vec![
        (build.content.as_path(), true),
        (build.templates.as_path(), true),
        (config.config_path.as_path(), false),
    ];
    if build.css.enable {
        targets.push((build.css.input.as_path(), false));
    }
    targets
}

fn setup_watchers(watcher: &mut impl Watcher, config: &SiteConfig) -> Result<()> {
    let root = config.get_root();
    let mut watched = Vec::new();

    for (path, is_dir) in watch_targets(config) {
        if !path.exists() {
            continue;
        }
        let mode = if is_dir {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(path, mode)
            .with_context(|| format!("Failed to watch {}", path.display()))?;
        watched.push(rel_path(path, root));
    }

    log!("watch"; "{}", watched.join(", "));
    Ok(())
}

// =============================================================================
// Public API
// =============================================================================

/// Start blocking file watcher, rebuilding on every debounced change.
pub fn watch_for_changes_blocking(config: &'static SiteConfig, cli: &Cli) -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx).context("Failed to create file watcher")?;
    setup_watchers(&mut watcher, config)?;

    let mut config = config;
    let mut debouncer = Debouncer::default();

    for event in rx {
        let event = match event {
            Ok(event) if is_relevant(&event) => event,
            Ok(_) => continue,
            Err(err) => {
                log!("watch"; "error: {err}");
                continue;
            }
        };

        let Some(path) = event.paths.iter().find(|path| !is_temp_file(path)) else {
            continue;
        };
        if debouncer.should_rebuild(path, Instant::now()) {
            config = rebuild(config, cli, path);
        }
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
