use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::prelude::*;
use clap::Parser;
use config::AppConfig;
use session::{OpenDocument, Session};

mod cache;
mod config;
mod debounce;
mod document;
mod error;
mod extract;
mod highlight;
mod locate;
mod prelude;
mod render;
mod serve;
mod session;
#[cfg(test)]
mod testing;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Sample citations from PDF, DOCX and text documents and jump back to where they came from"
)]
pub struct App {
    #[command(subcommand)]
    pub command: SubCommands,

    #[clap(flatten)]
    global: Global,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// Path to a TOML configuration file
    #[clap(long, env = "CITELENS_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Whether to display additional information.
    #[clap(long, env = "CITELENS_VERBOSE", global = true, default_value = "false")]
    verbose: bool,
}

impl Global {
    pub fn app_config(&self) -> Result<AppConfig> {
        AppConfig::load(self.config.as_deref())
    }
}

#[derive(Debug, clap::Parser)]
pub enum SubCommands {
    /// Sample citations from a document
    Extract(crate::extract::Options),

    /// Resolve a navigation query to its context and overlay box
    Locate(crate::locate::Options),

    /// Render a page wireframe with the highlight overlay to PNG
    Highlight(crate::highlight::Options),

    /// Serve the HTTP viewer
    Serve(crate::serve::Options),
}

/// Read `path` and open it in `session` under its file name.
pub async fn open_file(session: &Session, path: &Path) -> Result<Arc<OpenDocument>> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_eyre("Path has no file name")?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| f!("Failed to read {}", path.display()))?;
    session
        .open(&name, bytes)
        .await
        .map_err(|e| eyre!(e))
}

/// Parse a navigation query, defaulting `file` to the open document's name.
pub fn parse_query(raw: &str, file: &str) -> Result<citelens_core::HighlightQuery> {
    use citelens_core::{HighlightQuery, QueryError};

    match HighlightQuery::parse(raw) {
        Err(QueryError::Missing("file")) => {
            let raw = raw.trim_start_matches('?');
            HighlightQuery::parse(&f!("file={}&{raw}", urlencoding::encode(file)))
                .map_err(|e| eyre!(e))
        }
        other => other.map_err(|e| eyre!(e)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    color_eyre::install()?;

    let app = App::parse();

    match app.command {
        SubCommands::Extract(options) => crate::extract::run(options, app.global).await,
        SubCommands::Locate(options) => crate::locate::run(options, app.global).await,
        SubCommands::Highlight(options) => crate::highlight::run(options, app.global).await,
        SubCommands::Serve(options) => crate::serve::run(options, app.global).await,
    }
    .map_err(|err: color_eyre::eyre::Report| eyre!(err))
}
