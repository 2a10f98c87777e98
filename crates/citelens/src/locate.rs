use std::path::PathBuf;

use citelens_core::HighlightRegion;
use colored::Colorize;

use crate::prelude::{println, *};
use crate::session::{Located, Session};

#[derive(Debug, clap::Args, Clone)]
pub struct Options {
    /// Path to a PDF, DOCX or plain text file
    pub path: PathBuf,

    /// Navigation query, e.g. `page=2&x=72&y=600&width=300&height=11` or `text=...`.
    /// `file` defaults to the document's file name.
    pub query: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(options: Options, global: crate::Global) -> Result<()> {
    let config = global.app_config()?;
    let session = Session::new(&config);
    let open = crate::open_file(&session, &options.path).await?;

    let query = crate::parse_query(&options.query, &open.document.name)?;
    if global.verbose {
        println!("Resolving {}", query.to_query_string());
    }
    let located = session.resolve(&query).await.map_err(|e| eyre!(e))?;

    if options.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&located)
                .map_err(|e| eyre!("JSON serialization failed: {}", e))?
        );
    } else {
        println!("{}", format_located(&located));
    }
    Ok(())
}

fn format_located(located: &Located) -> String {
    let mut result = String::new();
    let context = &located.relocation.context;

    result.push_str(&f!("{}\n", "CONTEXT".bright_yellow().bold()));
    for (index, row) in context.rows.iter().enumerate() {
        if index == context.highlight {
            result.push_str(&f!("{} {}\n", ">".green().bold(), row.bold()));
        } else {
            result.push_str(&f!("  {}\n", row.dimmed()));
        }
    }

    match &located.relocation.region {
        Some(HighlightRegion::Box { page, bbox }) => {
            result.push_str(&f!(
                "\n{} page {} at ({}, {}) size {}x{}\n",
                "Region:".bright_white().bold(),
                page,
                bbox.x,
                bbox.y,
                bbox.width,
                bbox.height
            ));
        }
        Some(HighlightRegion::Span {
            line, start, end, ..
        }) => {
            result.push_str(&f!(
                "\n{} line {} bytes {}..{}\n",
                "Region:".bright_white().bold(),
                line,
                start,
                end
            ));
        }
        None => {}
    }

    if let (Some(rect), Some((width, height))) = (located.overlay, located.surface) {
        result.push_str(&f!(
            "{} ({:.1}, {:.1}) size {:.1}x{:.1} on a {}x{} surface\n",
            "Overlay:".bright_white().bold(),
            rect.x,
            rect.y,
            rect.width,
            rect.height,
            width,
            height
        ));
    }
    result
}
