//! Content reading: frontmatter split, decode, validate, and markdown body.
//!
//! Every page kind reads its source through [`read_markdown`], differing only
//! in the frontmatter type it decodes into.

pub mod markdown;
pub mod validate;

pub use markdown::render_markdown;
pub use validate::Validate;

use crate::error::SiteError;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;

const FENCE: &str = "---";

/// Split a `---` fenced YAML header from the markdown body.
///
/// The opening fence must be the first line of the file.
pub fn split_frontmatter<'a>(path: &Path, src: &'a str) -> Result<(&'a str, &'a str)> {
    let src = src.strip_prefix('\u{feff}').unwrap_or(src);

    let rest = src
        .strip_prefix(FENCE)
        .and_then(|rest| rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n')))
        .ok_or_else(|| SiteError::parse(path, "missing `---` frontmatter header"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FENCE {
            return Ok((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }

    Err(SiteError::parse(path, "unterminated frontmatter header").into())
}

/// Decode frontmatter into `T` and render the body, from an in-memory source.
pub fn parse_markdown<T>(path: &Path, src: &str) -> Result<(T, String)>
where
    T: DeserializeOwned + Validate,
{
    let (header, body) = split_frontmatter(path, src)?;

    let meta: T = serde_yaml::from_str(header).map_err(|err| SiteError::parse(path, err))?;
    meta.validate()
        .with_context(|| format!("invalid frontmatter in {}", path.display()))?;

    let html = render_markdown(body).map_err(|err| SiteError::parse(path, err))?;
    Ok((meta, html))
}

/// Read a markdown file with frontmatter.
///
/// # Errors
/// - [`SiteError::Io`] if the file cannot be read
/// - [`SiteError::Parse`] on a malformed header or body
/// - [`SiteError::Validation`] if the decoded header fails its checks
pub async fn read_markdown<T>(path: &Path) -> Result<(T, String)>
where
    T: DeserializeOwned + Validate,
{
    let src = tokio::fs::read_to_string(path)
        .await
        .map_err(|err| SiteError::io(path, err))?;
    parse_markdown(path, &src)
}

/// Remove a single `<p>…</p>` wrapper from rendered HTML.
pub fn strip_paragraph(html: &str) -> String {
    let html = html.trim();
    let html = html.strip_prefix("<p>").unwrap_or(html);
    let html = html.strip_suffix("</p>").unwrap_or(html);
    html.to_owned()
}
