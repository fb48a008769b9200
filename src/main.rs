//! personal-site - A static site generator for a personal website.

mod build;
mod cli;
mod config;
mod content;
mod error;
mod generator;
mod pages;
mod serve;
mod utils;
mod watch;

use build::build_site;
use clap::Parser;
use cli::{Cli, Commands};
use config::SiteConfig;
use serve::serve_site;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli: &'static Cli = Box::leak(Box::new(Cli::parse()));

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log!("error"; "{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &'static Cli) -> anyhow::Result<()> {
    let config: &'static SiteConfig = Box::leak(Box::new(SiteConfig::load(cli)?));

    match &cli.command {
        Commands::Build { .. } => build_site(config),
        Commands::Serve { .. } => {
            build_site(config)?;
            serve_site(config, cli)
        }
    }
}
