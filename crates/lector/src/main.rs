use std::path::PathBuf;

use crate::prelude::*;
use clap::Parser;

mod anchor;
mod cache;
mod config;
mod error;
mod extract;
mod prelude;
mod report;
mod session;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Extract the readable narrative of PDF documents and anchor selections to it"
)]
pub struct App {
    #[command(subcommand)]
    pub command: SubCommands,

    #[clap(flatten)]
    global: Global,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// TOML settings file with [extraction], [anchor] and [session] tables
    #[clap(long, env = "LECTOR_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Whether to display additional information.
    #[clap(long, env = "LECTOR_VERBOSE", global = true, default_value = "false")]
    verbose: bool,
}

#[derive(Debug, clap::Parser)]
pub enum SubCommands {
    /// Print the narrative text of a document, or its full index as JSON
    Extract(crate::extract::ExtractOptions),

    /// Show what extraction kept and removed on every page
    Report(crate::report::ReportOptions),

    /// Place a selection in a document's narrative
    Anchor(crate::anchor::AnchorOptions),

    /// Serve JSON-lines requests on stdin with a shared index cache
    Session,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    color_eyre::install()?;

    let app = App::parse();
    let settings = config::Settings::load(app.global.config.as_deref())?;

    match app.command {
        SubCommands::Extract(options) => crate::extract::run(options, app.global, settings).await,
        SubCommands::Report(options) => crate::report::run(options, app.global, settings).await,
        SubCommands::Anchor(options) => crate::anchor::run(options, app.global, settings).await,
        SubCommands::Session => crate::session::run(app.global, settings).await,
    }
    .map_err(|err: color_eyre::eyre::Report| eyre!(err))
}
