//! Field checks run on decoded frontmatter and configuration.
//!
//! Each helper fails with [`SiteError::Validation`] naming the offending field.

use crate::error::SiteError;
use anyhow::{Result, bail};
use std::path::Path;
use url::Url;

/// A decoded record that can check its own fields.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Field must be non-empty after trimming.
pub fn required(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!(SiteError::Validation(format!("{field} is required")));
    }
    Ok(())
}

/// Field must be an absolute `http` or `https` URL.
pub fn url(field: &str, value: &str) -> Result<()> {
    required(field, value)?;

    match Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        Ok(parsed) => bail!(SiteError::Validation(format!(
            "{field} must use http or https, got scheme '{}'",
            parsed.scheme()
        ))),
        Err(err) => bail!(SiteError::Validation(format!(
            "{field} is not a valid URL ({err}): {value}"
        ))),
    }
}

/// Field must be an http(s) URL, a site-absolute path or a `mailto:` link.
pub fn link(field: &str, value: &str) -> Result<()> {
    if value.starts_with('/') && !value.starts_with("//") {
        return Ok(());
    }
    if let Some(address) = value.strip_prefix("mailto:") {
        return required(field, address);
    }
    url(field, value)
}

/// Field must look like a relative or site-absolute file path.
///
/// The file itself is not required to exist; images are served from the
/// output directory and may be produced by a later step.
pub fn filepath(field: &str, value: &str) -> Result<()> {
    required(field, value)?;

    if value.ends_with('/') || value.contains('\0') || value.contains("://") {
        bail!(SiteError::Validation(format!(
            "{field} is not a file path: {value}"
        )));
    }
    if Path::new(value).file_name().is_none() {
        bail!(SiteError::Validation(format!(
            "{field} has no file name: {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::kind_of;

    #[test]
    fn test_required() {
        assert!(required("title", "Home").is_ok());

        let err = required("title", "  ").unwrap_err();
        assert!(matches!(kind_of(&err), Some(SiteError::Validation(_))));
        assert!(err.to_string().contains("title"));
    }

    #[test]
    fn test_url() {
        assert!(url("link", "https://hermannm.dev").is_ok());
        assert!(url("link", "http://localhost:8080/path").is_ok());
        assert!(url("link", "hermannm.dev").is_err());
        assert!(url("link", "mailto:hello@example.com").is_err());
        assert!(url("link", "").is_err());
    }

    #[test]
    fn test_link() {
        assert!(link("link", "/devlog").is_ok());
        assert!(link("link", "mailto:me@hermannm.dev").is_ok());
        assert!(link("link", "https://github.com/hermannm").is_ok());
        assert!(link("link", "//evil.example").is_err());
        assert!(link("link", "mailto:").is_err());
        assert!(link("link", "devlog").is_err());
    }

    #[test]
    fn test_filepath() {
        assert!(filepath("path", "/img/profile.webp").is_ok());
        assert!(filepath("path", "icons/rust.svg").is_ok());
        assert!(filepath("path", "/img/").is_err());
        assert!(filepath("path", "https://example.com/a.png").is_err());
        assert!(filepath("path", "..").is_err());
    }
}
