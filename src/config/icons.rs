//! `[[icons]]` table configuration.
//!
//! Icons are declared in order; that order decides which icon wins when
//! several declare a matching `link_prefixes` entry.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One `[[icons]]` entry in site.toml.
///
/// # Example
/// ```toml
/// [[icons]]
/// name = "Rust"
/// path = "content/icons/rust.svg"
/// link = "https://www.rust-lang.org/"
/// index_fallback = "content/icons/rust-alt.svg"
/// link_prefixes = ["https://docs.rs"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IconConfig {
    /// Lookup key, e.g. `"GitHub"` or a combined key like `"Kotlin+Go+Rust"`.
    pub name: String,

    /// SVG file for the icon, relative to the root.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Default link for tech-stack items that use this icon.
    #[serde(default)]
    pub link: Option<String>,

    /// Alternative SVG used on the index page.
    #[serde(default)]
    pub index_fallback: Option<PathBuf>,

    /// Links starting with any of these get this icon attached.
    #[serde(default)]
    pub link_prefixes: Vec<String>,
}
