//! Site building orchestration.
//!
//! Spawns one task per content file plus the icon resolver and the sitemap
//! aggregator, then runs the post-build steps.
//!
//! # Architecture
//!
//! ```text
//! build_site()
//!     │
//!     ├── clean output (optional)
//!     │
//!     ├── render_site()
//!     │       │
//!     │       ├── icons ─────────► icons gate ──────────► every page
//!     │       ├── index page ────► groups gate ─────────► project pages
//!     │       │        ▲
//!     │       │        └──── summaries ◄──────────────── project pages
//!     │       ├── project pages ─┐
//!     │       ├── basic pages ───┼─► pages ─► sitemap
//!     │       └── index page ────┘
//!     │
//!     ├── format_html() ──► [build.format] command
//!     │
//!     └── build_css() ────► [build.css] command
//! ```
//!
//! The first failing task cancels the run. Every other task then returns
//! without writing further output.

use crate::{
    config::SiteConfig,
    error::SiteError,
    exec,
    generator::sitemap::build_sitemap,
    log,
    pages::{
        Pipeline, Renderer, Templates,
        basic::render_basic_page,
        gate::gate,
        icons::resolve_icons,
        index::render_index_page,
        project::{ProjectSource, render_project_page},
    },
};
use anyhow::{Context, Result, bail};
use std::{fs, sync::Arc, time::Instant};
use tokio::{sync::mpsc, task::JoinSet};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

/// Build the entire site: render every page, then format and build CSS.
///
/// If `config.build.clean` is true, removes the output directory first.
pub fn build_site(config: &'static SiteConfig) -> Result<()> {
    let started = Instant::now();

    if config.build.clean {
        clean_output(config)?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let page_count = runtime.block_on(render_site(config))?;

    format_html(config)?;
    build_css(config)?;

    log!("build"; "{page_count} pages in {:.2?}", started.elapsed());
    Ok(())
}

/// Remove the output directory, refusing to remove the project root.
fn clean_output(config: &SiteConfig) -> Result<()> {
    let output = &config.build.output;
    if output == config.get_root() {
        bail!(SiteError::Config(format!(
            "refusing to clean output directory {}, it is the project root",
            output.display()
        )));
    }
    if output.exists() {
        fs::remove_dir_all(output).map_err(|err| SiteError::io(output, err))?;
        log!("clean"; "removed {}", output.display());
    }
    Ok(())
}

// ============================================================================
// Content Discovery
// ============================================================================

/// Markdown files directly inside each project directory, sorted by name.
pub fn collect_projects(config: &SiteConfig) -> Result<Vec<ProjectSource>> {
    let mut sources = Vec::new();

    for content_dir in &config.build.project_dirs {
        let dir = config.content_path(content_dir);

        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|err| SiteError::io(&dir, err.into()))?;
            let path = entry.path();
            if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "md") {
                sources.push(ProjectSource {
                    path: path.to_path_buf(),
                    content_dir: content_dir.clone(),
                });
            }
        }
    }

    Ok(sources)
}

// ============================================================================
// Render Pipeline
// ============================================================================

/// Mark the run as failed before the task's channel handles are dropped.
///
/// Receivers treat a closed channel as cancellation only once the token is
/// cancelled, so the order matters.
fn cancel_on_error(cancel: &CancellationToken, result: Result<()>) -> Result<()> {
    if result.is_err() {
        cancel.cancel();
    }
    result
}

/// Render every page and the sitemap. Returns the number of pages.
pub async fn render_site(config: &'static SiteConfig) -> Result<usize> {
    let projects = collect_projects(config)?;
    let project_count = projects.len();
    let page_count = 1 + project_count + config.build.basic_pages.len();

    let cancel = CancellationToken::new();
    let (icons_tx, icons) = gate();
    let (groups_tx, groups) = gate();
    let (pages_tx, pages_rx) = mpsc::channel(page_count.max(1));
    let (summaries_tx, summaries_rx) = mpsc::channel(project_count.max(1));

    let pipeline = Pipeline {
        renderer: Arc::new(Renderer::new(config, Templates::new(config))),
        icons,
        groups,
        pages: pages_tx,
        cancel: cancel.clone(),
    };

    let mut tasks = JoinSet::new();

    tasks.spawn({
        let cancel = cancel.clone();
        async move {
            let result = resolve_icons(&config.icons).await.map(|icons| {
                icons_tx.publish(icons);
            });
            cancel_on_error(&cancel, result)
        }
    });

    tasks.spawn({
        let cancel = cancel.clone();
        async move {
            let result = build_sitemap(config, pages_rx, page_count, &cancel).await;
            cancel_on_error(&cancel, result)
        }
    });

    tasks.spawn({
        let pipeline = pipeline.clone();
        let path = config.content_path(&config.build.index_page);
        async move {
            let result =
                render_index_page(&pipeline, &path, groups_tx, summaries_rx, project_count).await;
            cancel_on_error(&pipeline.cancel, result)
        }
    });

    for source in projects {
        let pipeline = pipeline.clone();
        let summaries = summaries_tx.clone();
        tasks.spawn(async move {
            let result = render_project_page(&pipeline, &summaries, &source).await;
            cancel_on_error(&pipeline.cancel, result)
        });
    }

    for page in &config.build.basic_pages {
        let pipeline = pipeline.clone();
        let path = config.content_path(page);
        tasks.spawn(async move {
            let result = render_basic_page(&pipeline, &path).await;
            cancel_on_error(&pipeline.cancel, result)
        });
    }

    // Only tasks hold senders from here on.
    drop(pipeline);
    drop(summaries_tx);

    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        let result = joined
            .context("render task panicked")
            .and_then(|result| result);
        if let Err(err) = result {
            cancel.cancel();
            first_error.get_or_insert(err);
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(page_count),
    }
}

// ============================================================================
// Post-build Steps
// ============================================================================

/// Run the configured HTML formatter over every rendered page.
fn format_html(config: &SiteConfig) -> Result<()> {
    let format = &config.build.format;
    if !format.enable {
        return Ok(());
    }

    let pattern = config.build.output.join("**").join("*.html");
    exec!(config.get_root(); &format.command; pattern)?;

    log!("format"; "formatted html");
    Ok(())
}

/// Run the configured CSS build: `<command> -i <input> -o <output> [--minify]`.
fn build_css(config: &SiteConfig) -> Result<()> {
    let css = &config.build.css;
    if !css.enable {
        return Ok(());
    }

    let output = config.build.output.join(&css.output);
    exec!(
        config.get_root();
        &css.command;
        "-i", &css.input, "-o", &output, if css.minify { "--minify" } else { "" }
    )?;

    log!("css"; "{}", css.output.display());
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::kind_of;
    use crate::pages::tests::Fixture;
    use std::path::Path;

    const INDEX_TEMPLATE: &str = "{% include \"head.html.jinja\" %}\
        <p>{{ aboutMe|safe }}</p>\
        {% for info in personalInfo %}<li>{{ info.text }}{{ info.icon|safe }}</li>{% endfor %}\
        {% for group in groups %}<section id=\"{{ group.slug }}\">\
        {% for project in group.projects %}<a href=\"{{ project.path }}\">{{ project.name }}</a>{{ project.indexIcon|safe }}{% endfor %}\
        </section>{% endfor %}";

    const PROJECT_TEMPLATE: &str = "{% include \"head.html.jinja\" %}\
        <a class=\"back\" href=\"{{ project.backLink }}\">back</a>\
        <h1>{{ project.name }}</h1><div>{{ project.description|safe }}</div>\
        {% for tech in project.techStack %}<li>{{ tech.text }}{{ tech.icon|safe }}</li>{% endfor %}";

    const INDEX_PAGE: &str = "---\n\
        page:\n  title: hermannm.dev\n\
        personalInfo:\n  - text: GitHub\n    link: https://github.com/hermannm\n\
        groups:\n\
        \x20 - title: Projects\n    slug: projects\n    contentDir: projects\n    projects: [/devlog]\n\
        \x20 - title: Tools\n    slug: tools\n    contentDir: tools\n    projects: [/gadget]\n\
        ---\n\
        I make *things*.\n";

    fn site() -> Fixture {
        let mut fixture = Fixture::new();
        fixture.write("templates/pages/index_page.html.jinja", INDEX_TEMPLATE);
        fixture.write("templates/pages/project_page.html.jinja", PROJECT_TEMPLATE);
        fixture.write("content/icons/go.svg", "<svg>go</svg>");
        fixture.write("content/index_page.md", INDEX_PAGE);
        fixture.write(
            "content/projects/devlog.md",
            "---\nname: devlog\nslug: devlog\ntechStack:\n  - text: Go\n---\nLogging for Go.\n",
        );
        fixture.write(
            "content/tools/gadget.md",
            "---\nname: gadget\nslug: gadget\ntechStack:\n  - text: Go\n---\nA tool.\n",
        );
        fixture.write(
            "content/404_page.md",
            "---\ntitle: Page not found\npath: /404.html\n---\nNothing here.\n",
        );

        fixture.config.build.project_dirs = vec!["projects".into(), "tools".into()];
        fixture.config.icons.push(crate::config::IconConfig {
            name: "Go".into(),
            path: Some(fixture.dir.path().join("content/icons/go.svg")),
            link: Some("https://go.dev".into()),
            ..Default::default()
        });
        fixture
    }

    fn leak(config: &SiteConfig) -> &'static SiteConfig {
        Box::leak(Box::new(config.clone()))
    }

    #[test]
    fn test_collect_projects_sorted_md_only() {
        let fixture = site();
        fixture.write("content/projects/analysis-tool.md", "---\n---\n");
        fixture.write("content/projects/notes.txt", "");
        fixture.write("content/projects/nested/deep.md", "---\n---\n");

        let sources = collect_projects(&fixture.config).unwrap();
        let names: Vec<_> = sources
            .iter()
            .map(|s| s.path.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, ["analysis-tool.md", "devlog.md", "gadget.md"]);
        assert_eq!(sources[2].content_dir, Path::new("tools"));
    }

    #[test]
    fn test_collect_projects_missing_dir() {
        let mut fixture = site();
        fixture.config.build.project_dirs.push("companies".into());

        let err = collect_projects(&fixture.config).unwrap_err();
        assert!(matches!(kind_of(&err), Some(SiteError::Io(..))));
    }

    #[tokio::test]
    async fn test_render_site() {
        let fixture = site();
        let config = leak(&fixture.config);

        let page_count = render_site(config).await.unwrap();
        assert_eq!(page_count, 4);

        let index = fixture.read_output("index.html");
        assert!(index.contains("<p>I make <em>things</em>.</p>"));
        assert!(index.contains("<li>GitHub<svg>gh</svg></li>"));
        assert!(index.contains("<section id=\"projects\"><a href=\"&#x2f;devlog\">devlog</a><svg>go</svg></section>"));

        let devlog = fixture.read_output("devlog.html");
        assert!(devlog.contains("<title>hermannm.dev&#x2f;devlog</title>"));
        assert!(devlog.contains("href=\"&#x2f;\">back</a>"));
        assert!(devlog.contains("<li>Go<svg>go</svg></li>"));
        assert!(fixture.config.build.output.join("devlog/index.html").exists());

        let gadget = fixture.read_output("gadget.html");
        assert!(gadget.contains("href=\"&#x2f;#tools\">back</a>"));

        let sitemap = fixture.read_output("sitemap.txt");
        assert_eq!(
            sitemap,
            "https://hermannm.dev\nhttps://hermannm.dev/devlog\nhttps://hermannm.dev/gadget\n"
        );
        assert!(fixture.read_output("404.html").contains("Nothing here."));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_unlisted_project_still_renders() {
        let fixture = site();
        // Slow to render, so its summary arrives after the groups are full
        let body = "[link](https://example.com) ".repeat(20_000);
        fixture.write(
            "content/projects/zhidden.md",
            &format!("---\nname: zhidden\nslug: zhidden\ntechStack:\n  - text: Go\n---\n{body}\n"),
        );
        let config = leak(&fixture.config);

        let page_count = render_site(config).await.unwrap();
        assert_eq!(page_count, 5);

        assert!(fixture.read_output("zhidden.html").contains("<h1>zhidden</h1>"));
        let index = fixture.read_output("index.html");
        assert!(!index.contains("zhidden"));
        assert!(fixture.read_output("sitemap.txt").contains("https://hermannm.dev/zhidden\n"));
    }

    #[tokio::test]
    async fn test_missing_project_slot_fails_run() {
        let fixture = site();
        fs::remove_file(fixture.dir.path().join("content/tools/gadget.md")).unwrap();
        let config = leak(&fixture.config);

        let err = render_site(config).await.unwrap_err();
        assert!(matches!(kind_of(&err), Some(SiteError::Config(_))));
        assert!(!fixture.config.build.output.join("index.html").exists());
    }

    #[tokio::test]
    async fn test_unknown_icon_fails_run() {
        let fixture = site();
        fixture.write(
            "content/projects/devlog.md",
            "---\nname: devlog\nslug: devlog\ntechStack:\n  - text: Go\n    icon: Zig\n---\n",
        );
        let config = leak(&fixture.config);

        let err = render_site(config).await.unwrap_err();
        assert!(matches!(kind_of(&err), Some(SiteError::Config(_))));
        assert!(!fixture.config.build.output.join("index.html").exists());
    }

    #[tokio::test]
    async fn test_bad_frontmatter_fails_run() {
        let fixture = site();
        fixture.write("content/404_page.md", "no frontmatter\n");
        let config = leak(&fixture.config);

        let err = render_site(config).await.unwrap_err();
        assert!(matches!(kind_of(&err), Some(SiteError::Parse { .. })));
    }

    #[tokio::test]
    async fn test_render_demo_site() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("demo");
        let output = tempfile::TempDir::new().unwrap();
        let mut config = SiteConfig::from_path(&root.join("site.toml")).unwrap();
        config.set_root(&root);
        config.build.output = output.path().to_path_buf();
        config.normalize_paths();
        config.validate().unwrap();
        let config = leak(&config);

        assert_eq!(render_site(config).await.unwrap(), 3);

        let read = |path: &str| fs::read_to_string(output.path().join(path)).unwrap();
        assert_eq!(
            read("sitemap.txt"),
            "https://hermannm.dev\nhttps://hermannm.dev/devlog\n"
        );
        let devlog = read("devlog.html");
        assert!(devlog.contains("name=\"go-import\""));
        assert!(devlog.contains("<figure"));
        assert!(devlog.contains("width=\"800\" height=\"300\""));
        assert!(read("index.html").contains("years old"));
        assert!(read("404.html").contains("Page not found"));
    }

    #[test]
    fn test_clean_output() {
        let mut fixture = site();
        fixture.write("static/stale.html", "old");
        clean_output(&fixture.config).unwrap();
        assert!(!fixture.config.build.output.exists());

        fixture.config.build.output = fixture.config.get_root().to_path_buf();
        let err = clean_output(&fixture.config).unwrap_err();
        assert!(matches!(kind_of(&err), Some(SiteError::Config(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_format_failure_is_external_process_error() {
        let mut fixture = site();
        fixture.config.build.format.enable = true;
        fixture.config.build.format.command =
            vec!["sh".into(), "-c".into(), "echo broken >&2; exit 2".into()];

        let err = format_html(&fixture.config).unwrap_err();
        match kind_of(&err) {
            Some(SiteError::ExternalProcess { stderr, .. }) => assert_eq!(stderr, "broken"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_css_build_arguments() {
        let mut fixture = site();
        let log = fixture.dir.path().join("args.txt");
        fixture.config.build.css.enable = true;
        fixture.config.build.css.command = vec![
            "sh".into(),
            "-c".into(),
            format!("echo \"$@\" > {}", log.display()),
            "tailwindcss".into(),
        ];

        build_css(&fixture.config).unwrap();
        let args = fs::read_to_string(&log).unwrap();
        assert!(args.starts_with("-i "));
        assert!(args.contains(" -o "));
        assert!(args.trim_end().ends_with("--minify"));
    }
}
