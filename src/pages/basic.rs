//! Standalone pages such as the 404 page.
//!
//! The frontmatter is a bare [`PageMeta`]:
//!
//! ```yaml
//! ---
//! title: Page not found
//! path: /404.html
//! ---
//! ```

use super::{PageMeta, Pipeline};
use crate::{content::read_markdown, error::SiteError};
use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::path::Path;

pub const BASIC_PAGE_TEMPLATE: &str = "basic_page.html.jinja";

#[derive(Debug, Serialize)]
struct BasicPageData {
    content: String,
}

/// Parse, publish to the sitemap, wait for site data, render.
///
/// Returns without output if the run is cancelled.
pub async fn render_basic_page(pipeline: &Pipeline, content_path: &Path) -> Result<()> {
    let (mut page, content) = read_markdown::<PageMeta>(content_path)
        .await
        .with_context(|| format!("failed to read page {}", content_path.display()))?;

    if page.path.is_empty() {
        bail!(SiteError::Validation(format!(
            "page.path is required in {}",
            content_path.display()
        )));
    }
    page.default_template(BASIC_PAGE_TEMPLATE);
    page.set_canonical_url(&pipeline.renderer.common().base_url);

    if !pipeline.publish_page(page.clone()).await {
        return Ok(());
    }
    let Some(icons) = pipeline.icons.wait(&pipeline.cancel).await else {
        return Ok(());
    };

    pipeline
        .renderer
        .render_dual(&page, &icons, &BasicPageData { content })
        .await
        .with_context(|| format!("failed to render page '{}'", page.path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::kind_of;
    use crate::pages::{Renderer, gate::gate, icons::resolve_icons, tests::Fixture};
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    async fn pipeline(fixture: &Fixture) -> (Pipeline, mpsc::Receiver<PageMeta>) {
        let (icons_tx, icons) = gate();
        icons_tx.publish(resolve_icons(&fixture.config.icons).await.unwrap());
        let (_groups_tx, groups) = gate();
        let (pages, pages_rx) = mpsc::channel(4);

        let pipeline = Pipeline {
            renderer: Arc::new(fixture.renderer()),
            icons,
            groups,
            pages,
            cancel: CancellationToken::new(),
        };
        (pipeline, pages_rx)
    }

    #[tokio::test]
    async fn test_render_basic_page() {
        let fixture = Fixture::new();
        fixture.write(
            "content/404_page.md",
            "---\ntitle: Page not found\npath: /404.html\n---\nNothing *here*.\n",
        );
        let (pipeline, mut pages) = pipeline(&fixture).await;

        let path = fixture.config.content_path(Path::new("404_page.md"));
        render_basic_page(&pipeline, &path).await.unwrap();

        let published = pages.recv().await.unwrap();
        assert_eq!(published.path, "/404.html");
        assert_eq!(published.template, BASIC_PAGE_TEMPLATE);
        assert_eq!(
            published.canonical_url.as_deref(),
            Some("https://hermannm.dev/404.html")
        );

        let html = fixture.read_output("404.html");
        assert!(html.contains("<main><p>Nothing <em>here</em>.</p>\n</main>"));
        assert!(html.contains("<svg>gh</svg>"));
    }

    #[tokio::test]
    async fn test_basic_page_requires_path() {
        let fixture = Fixture::new();
        fixture.write("content/about.md", "---\ntitle: About\n---\nHi\n");
        let (pipeline, _pages) = pipeline(&fixture).await;

        let path = fixture.config.content_path(Path::new("about.md"));
        let err = render_basic_page(&pipeline, &path).await.unwrap_err();
        assert!(matches!(kind_of(&err), Some(SiteError::Validation(_))));
    }

    #[tokio::test]
    async fn test_cancelled_basic_page_writes_nothing() {
        let fixture = Fixture::new();
        fixture.write(
            "content/404_page.md",
            "---\ntitle: Page not found\npath: /404\n---\n",
        );
        let (_icons_tx, icons) = gate();
        let (_groups_tx, groups) = gate();
        let (pages, _pages_rx) = mpsc::channel(1);
        let pipeline = Pipeline {
            renderer: Arc::new(fixture.renderer()),
            icons,
            groups,
            pages,
            cancel: CancellationToken::new(),
        };

        let task = {
            let pipeline = pipeline.clone();
            let path = fixture.config.content_path(Path::new("404_page.md"));
            tokio::spawn(async move { render_basic_page(&pipeline, &path).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        pipeline.cancel.cancel();

        task.await.unwrap().unwrap();
        assert!(!fixture.config.build.output.join("404.html").exists());
    }

    #[test]
    fn test_renderer_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Renderer>();
        assert_send_sync::<Pipeline>();
    }
}
