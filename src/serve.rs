//! Development server.
//!
//! A lightweight HTTP server for local preview, built on `tiny_http`:
//!
//! - Static file serving from the build output directory
//! - `dir/` resolves to `dir/index.html`, `/path` to `path.html`
//! - Rebuild on change (via the `watch` module)
//! - Graceful shutdown on Ctrl+C
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐
//! │   Main Thread   │     │  Watcher Thread  │
//! │  (HTTP Server)  │     │  (File Monitor)  │
//! └────────┬────────┘     └────────┬─────────┘
//!          │                       │
//!          ▼                       ▼
//!    Serve files             Rebuild site
//!          │                       │
//!          └───────────┬───────────┘
//!                      ▼
//!              config.build.output
//! ```

use crate::{cli::Cli, config::SiteConfig, log, watch::watch_for_changes_blocking};
use anyhow::{Context, Result, anyhow};
use std::{
    fs,
    net::{IpAddr, SocketAddr},
    path::{Component, Path, PathBuf},
    sync::Arc,
};
use tiny_http::{Header, Request, Response, Server, StatusCode};

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

// ============================================================================
// Server Entry Point
// ============================================================================

/// Start the development server with optional file watching.
///
/// Blocks until Ctrl+C is received.
pub fn serve_site(config: &'static SiteConfig, cli: &'static Cli) -> Result<()> {
    let interface: IpAddr = config
        .serve
        .interface
        .parse()
        .with_context(|| format!("invalid interface '{}'", config.serve.interface))?;

    let (server, addr) = try_bind_port(interface, config.serve.port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);

    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    log!("serve"; "http://{}", addr);

    if config.serve.watch {
        std::thread::spawn(move || {
            if let Err(err) = watch_for_changes_blocking(config, cli) {
                log!("watch"; "{err:#}");
            }
        });
    }

    for request in server.incoming_requests() {
        if let Err(err) = handle_request(request, &config.build.output) {
            log!("serve"; "request error: {err}");
        }
    }

    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(err) => last_error = Some(err),
        }
    }

    Err(anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        max_retries,
        base_port,
        base_port.saturating_add(max_retries.saturating_sub(1)),
        last_error.map(|err| err.to_string()).unwrap_or_default()
    ))
}

// ============================================================================
// Request Handling
// ============================================================================

/// Map a request URL onto a file in the output directory.
///
/// Resolution order:
/// 1. Exact file match
/// 2. `{path}.html`, matching how pages without an extension are written
/// 3. Directory with `index.html`
///
/// A trailing slash swaps steps 2 and 3.
/// Query strings are ignored. Paths leaving the output directory never match.
fn resolve_path(serve_root: &Path, url: &str) -> Option<PathBuf> {
    let url_path = urlencoding::decode(url)
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default();
    let path_without_query = url_path.split(['?', '#']).next().unwrap_or_default();
    let request_path = Path::new(path_without_query.trim_matches('/'));

    if !request_path
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
    {
        return None;
    }

    let local_path = serve_root.join(request_path);
    if local_path.is_file() {
        return Some(local_path);
    }

    let index_path = local_path.join("index.html");
    if request_path.as_os_str().is_empty() {
        return index_path.is_file().then_some(index_path);
    }
    let mut html_path = local_path.into_os_string();
    html_path.push(".html");
    let html_path = PathBuf::from(html_path);

    // `/a` prefers `a.html`, `/a/` prefers `a/index.html`
    let candidates = if path_without_query.ends_with('/') {
        [index_path, html_path]
    } else {
        [html_path, index_path]
    };
    candidates.into_iter().find(|path| path.is_file())
}

/// Handle a single HTTP request.
fn handle_request(request: Request, serve_root: &Path) -> Result<()> {
    match resolve_path(serve_root, request.url()) {
        Some(path) => serve_file(request, &path, StatusCode(200)),
        None => {
            let not_found = serve_root.join("404.html");
            if not_found.is_file() {
                serve_file(request, &not_found, StatusCode(404))
            } else {
                let response = Response::from_string("404 Not Found")
                    .with_status_code(404)
                    .with_header(content_type("text/plain; charset=utf-8")?);
                request.respond(response)?;
                Ok(())
            }
        }
    }
}

// ============================================================================
// Response Helpers
// ============================================================================

fn content_type(value: &str) -> Result<Header> {
    Header::from_bytes("Content-Type", value).map_err(|()| anyhow!("invalid header value '{value}'"))
}

/// Serve a file with appropriate content type.
fn serve_file(request: Request, path: &Path, status: StatusCode) -> Result<()> {
    let content = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let response = Response::from_data(content)
        .with_status_code(status)
        .with_header(content_type(guess_content_type(path))?);
    request.respond(response)?;
    Ok(())
}

// ============================================================================
// Content Type Detection
// ============================================================================

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("txt") => "text/plain; charset=utf-8",

        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",

        Some("woff2") => "font/woff2",
        Some("pdf") => "application/pdf",

        _ => "application/octet-stream",
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn output() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("index.html"), "home").unwrap();
        fs::write(root.join("devlog.html"), "devlog").unwrap();
        fs::create_dir_all(root.join("devlog")).unwrap();
        fs::write(root.join("devlog/index.html"), "redirect").unwrap();
        fs::create_dir_all(root.join("img")).unwrap();
        fs::write(root.join("img/profile picture.webp"), "").unwrap();
        dir
    }

    #[test]
    fn test_resolve_path() {
        let dir = output();
        let root = dir.path();

        assert_eq!(resolve_path(root, "/"), Some(root.join("index.html")));
        assert_eq!(resolve_path(root, "/devlog"), Some(root.join("devlog.html")));
        assert_eq!(resolve_path(root, "/devlog/"), Some(root.join("devlog/index.html")));
        assert_eq!(resolve_path(root, "/devlog.html?v=2"), Some(root.join("devlog.html")));
        assert_eq!(
            resolve_path(root, "/img/profile%20picture.webp"),
            Some(root.join("img/profile picture.webp"))
        );
        assert_eq!(resolve_path(root, "/img/"), None);
        assert_eq!(resolve_path(root, "/img"), None);

        fs::create_dir_all(root.join("tools")).unwrap();
        fs::write(root.join("tools/index.html"), "tools").unwrap();
        assert_eq!(resolve_path(root, "/tools"), Some(root.join("tools/index.html")));
        fs::write(root.join("gadget.html"), "gadget").unwrap();
        assert_eq!(resolve_path(root, "/gadget/"), Some(root.join("gadget.html")));
        assert_eq!(resolve_path(root, "/missing"), None);
    }

    #[test]
    fn test_resolve_path_rejects_traversal() {
        let dir = output();
        let nested = dir.path().join("devlog");
        assert_eq!(resolve_path(&nested, "/../index.html"), None);
        assert_eq!(resolve_path(&nested, "/%2e%2e/index.html"), None);
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type(Path::new("a.html")), "text/html; charset=utf-8");
        assert_eq!(guess_content_type(Path::new("sitemap.txt")), "text/plain; charset=utf-8");
        assert_eq!(guess_content_type(Path::new("icon.svg")), "image/svg+xml");
        assert_eq!(guess_content_type(Path::new("blob")), "application/octet-stream");
    }

    #[test]
    fn test_try_bind_port_ephemeral() {
        let localhost: IpAddr = "127.0.0.1".parse().unwrap();
        let (first, addr) = try_bind_port(localhost, 0, 1).unwrap();
        assert_eq!(addr.port(), 0);
        drop(first);
    }
}
