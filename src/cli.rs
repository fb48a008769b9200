//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Personal website builder CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Project root directory (default: current directory)
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Output directory path (relative to project root)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Content directory path (relative to project root)
    #[arg(short, long)]
    pub content: Option<PathBuf>,

    /// Config file name (default: site.toml)
    #[arg(short = 'C', long, default_value = "site.toml")]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Shared build arguments for Build and Serve commands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Clean output directory completely before building
    #[arg(long)]
    pub clean: bool,

    /// Minify the html content
    #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub minify: Option<bool>,

    /// Run the configured HTML formatter after rendering
    #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub format: Option<bool>,

    /// Run the configured CSS build after rendering
    #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub css: Option<bool>,

    /// enable sitemap generation
    #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub sitemap: Option<bool>,

    /// Override base URL for the site.
    ///
    /// Useful for preview deployments where the URL differs from production.
    #[arg(long = "base-url")]
    pub base_url: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Render every page into the output directory
    Build {
        #[command(flatten)]
        build_args: BuildArgs,

        /// Build for local preview: `/path/` variants do not redirect to `/path`
        #[arg(long)]
        dev: bool,
    },

    /// Build in dev mode, serve the output, and rebuild on change
    Serve {
        #[command(flatten)]
        build_args: BuildArgs,

        /// Interface to bind on
        #[arg(short, long)]
        interface: Option<String>,

        /// The port you should provide
        #[arg(short, long)]
        port: Option<u16>,

        /// enable watch
        #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
        watch: Option<bool>,
    },
}

impl Cli {
    pub const fn build_args(&self) -> &BuildArgs {
        match &self.command {
            Commands::Build { build_args, .. } | Commands::Serve { build_args, .. } => build_args,
        }
    }

    /// Dev mode suppresses trailing-slash redirects, since the local server
    /// answers both `/path` and `/path/`.
    pub const fn is_dev(&self) -> bool {
        match &self.command {
            Commands::Build { dev, .. } => *dev,
            Commands::Serve { .. } => true,
        }
    }
}
