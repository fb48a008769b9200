//! `[site]` section configuration.
//!
//! Site-wide constants shared by every rendered page.

use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[site]` section in site.toml - common page metadata.
///
/// # Example
/// ```toml
/// [site]
/// name = "hermannm.dev"
/// description = "Hermann Mørkrid's personal website."
/// base_url = "https://hermannm.dev"
/// issues_link = "https://github.com/hermannm/hermannm.dev/issues"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteSection {
    /// Site name, also used as the prefix of project page titles.
    pub name: String,

    /// Site description for SEO meta tags.
    pub description: String,

    /// Base URL for canonical links and the sitemap, without trailing slash.
    pub base_url: String,

    /// Link shown in page footers for reporting issues with the site.
    pub issues_link: String,
}
