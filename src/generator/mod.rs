//! Site-wide artifacts produced from every page's metadata.

pub mod sitemap;
