//! Error types shared by the build pipeline.
//!
//! Every error is fatal to a build run. Functions return `anyhow::Result` and
//! raise a [`SiteError`] so callers can add page/file context while tests can
//! still recover the kind with `downcast_ref`.

use std::path::PathBuf;
use thiserror::Error;

/// Build-related errors
#[derive(Debug, Error)]
pub enum SiteError {
    /// Malformed frontmatter or markdown body.
    #[error("failed to parse `{}`: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// A decoded record failed a required-field or format check.
    #[error("validation error: {0}")]
    Validation(String),

    /// A referenced icon, project or navigation group does not exist where expected.
    #[error("config error: {0}")]
    Config(String),

    #[error("IO error when accessing `{}`", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("config file parsing error")]
    Toml(#[from] toml::de::Error),

    /// An external command exited non-zero. `stderr` is kept verbatim.
    #[error("command `{command}` failed with {status}\n{stderr}")]
    ExternalProcess {
        command: String,
        status: String,
        stderr: String,
    },
}

impl SiteError {
    pub fn parse(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io(path.into(), err)
    }
}

/// Find the [`SiteError`] inside an `anyhow` chain, if any.
#[cfg(test)]
pub fn kind_of(err: &anyhow::Error) -> Option<&SiteError> {
    err.chain().find_map(|e| e.downcast_ref::<SiteError>())
}
