//! Sitemap generation.
//!
//! Collects the metadata every page task publishes and writes a plain-text
//! sitemap listing one canonical URL per line.
//!
//! # Sitemap Format
//!
//! ```text
//! https://hermannm.dev
//! https://hermannm.dev/devlog
//! https://hermannm.dev/hermannm.dev
//! ```

use crate::{
    config::SiteConfig,
    error::SiteError,
    log,
    pages::{PageMeta, page_url},
};
use anyhow::{Result, bail};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Pages that exist but are never linked to.
const EXCLUDED_PATHS: &[&str] = &["/404", "/404.html"];

// ============================================================================
// Public API
// ============================================================================

/// Receive `page_count` pages and write the sitemap if enabled in config.
///
/// The receiver is drained even when the sitemap is disabled, so page tasks
/// never block on a full channel.
///
/// # Errors
/// [`SiteError::Config`] if the channel closes before every page arrived
/// while the run was not cancelled.
pub async fn build_sitemap(
    config: &SiteConfig,
    mut pages: mpsc::Receiver<PageMeta>,
    page_count: usize,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut sitemap = Sitemap::new(&config.site.base_url);

    while sitemap.received < page_count {
        let page = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            page = pages.recv() => page,
        };
        match page {
            Some(page) => sitemap.add(&page),
            None if cancel.is_cancelled() => return Ok(()),
            None => bail!(SiteError::Config(format!(
                "sitemap received {} of {page_count} pages before all page tasks finished",
                sitemap.received
            ))),
        }
    }

    if config.build.sitemap.enable {
        sitemap.write(config).await?;
    }
    Ok(())
}

// ============================================================================
// Sitemap Implementation
// ============================================================================

/// Sitemap data structure
struct Sitemap<'a> {
    base_url: &'a str,
    /// Full URLs of listed pages
    urls: Vec<String>,
    /// Pages seen, listed or not
    received: usize,
}

impl<'a> Sitemap<'a> {
    fn new(base_url: &'a str) -> Self {
        Self {
            base_url,
            urls: Vec::new(),
            received: 0,
        }
    }

    /// Record a page. Redirects and error pages are counted but not listed.
    fn add(&mut self, page: &PageMeta) {
        self.received += 1;
        if page.redirect_path.is_some() || EXCLUDED_PATHS.contains(&page.path.as_str()) {
            return;
        }
        self.urls.push(page_url(self.base_url, &page.path));
    }

    /// Sorted URLs, one per line.
    fn into_text(mut self) -> String {
        self.urls.sort_unstable();
        self.urls.dedup();

        let mut text = self.urls.join("\n");
        text.push('\n');
        text
    }

    /// Write sitemap to output file.
    async fn write(self, config: &SiteConfig) -> Result<()> {
        let count = self.urls.len();
        let sitemap_path = config.build.output.join(&config.build.sitemap.path);
        if let Some(parent) = sitemap_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| SiteError::io(parent, err))?;
        }

        tokio::fs::write(&sitemap_path, self.into_text())
            .await
            .map_err(|err| SiteError::io(&sitemap_path, err))?;

        log!("sitemap"; "{} ({count} urls)", config.build.sitemap.path.display());
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
