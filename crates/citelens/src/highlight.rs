use std::path::PathBuf;

use citelens_core::HighlightRegion;
use colored::Colorize;

use crate::prelude::{println, *};
use crate::render::{RenderOutcome, RenderScheduler};
use crate::session::Session;

#[derive(Debug, clap::Args, Clone)]
pub struct Options {
    /// Path to a PDF file
    pub path: PathBuf,

    /// Paged navigation query, e.g. `page=1&x=72&y=680&width=200&height=11`
    pub query: String,

    /// Where to write the PNG
    #[arg(short, long, default_value = "highlight.png")]
    pub output: PathBuf,
}

pub async fn run(options: Options, global: crate::Global) -> Result<()> {
    let config = global.app_config()?;
    let session = Session::new(&config);
    let open = crate::open_file(&session, &options.path).await?;

    let query = crate::parse_query(&options.query, &open.document.name)?;
    let located = session.resolve(&query).await.map_err(|e| eyre!(e))?;
    let Some(HighlightRegion::Box { page, bbox }) = located.relocation.region else {
        return Err(eyre!("Highlight rendering needs a paged document and a page query"));
    };

    let job = session
        .render_job(page, Some(bbox))
        .await
        .map_err(|e| eyre!(e))?;
    let scheduler = RenderScheduler::new();
    let png = match scheduler.render("cli", job).await.map_err(|e| eyre!(e))? {
        RenderOutcome::Rendered(png) => png,
        RenderOutcome::Cancelled => return Err(eyre!("Render was cancelled")),
    };

    tokio::fs::write(&options.output, &png)
        .await
        .with_context(|| f!("Failed to write {}", options.output.display()))?;

    println!(
        "{} page {} of {} to {}",
        "Rendered".green().bold(),
        page,
        open.document.name,
        options.output.display().to_string().cyan()
    );
    if global.verbose {
        println!("Context: {}", located.relocation.context.highlighted());
    }
    Ok(())
}
