use std::path::PathBuf;

use citelens_core::{Anchor, Citation, SnippetSource};
use colored::Colorize;

use crate::prelude::{println, *};
use crate::session::{OpenDocument, Session};

#[derive(Debug, clap::Args, Clone)]
pub struct Options {
    /// Path to a PDF, DOCX or plain text file
    pub path: PathBuf,

    /// Number of citations to sample
    #[arg(short = 'n', long)]
    pub count: Option<usize>,

    /// Sample from `lines` or `blocks`
    #[arg(long)]
    pub source: Option<SnippetSource>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(options: Options, global: crate::Global) -> Result<()> {
    let mut config = global.app_config()?;
    if let Some(count) = options.count {
        config.sampling.count = count;
    }
    if let Some(source) = options.source {
        config.sampling.source = source;
    }

    if global.verbose {
        println!("Extracting citations from {}...", options.path.display());
    }

    let session = Session::new(&config);
    let open = crate::open_file(&session, &options.path).await?;

    if options.json {
        println!("{}", format_json(&open)?);
    } else {
        output_formatted(&open);
    }
    Ok(())
}

fn format_json(open: &OpenDocument) -> Result<String> {
    serde_json::to_string_pretty(open).map_err(|e| eyre!("JSON serialization failed: {}", e))
}

fn location(citation: &Citation) -> String {
    match citation.snippet.anchor() {
        Anchor::Paged { page, .. } => f!("p. {page}"),
        Anchor::Flowing { paragraph } => f!("¶ {paragraph}"),
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.lines().collect::<Vec<_>>().join(" / ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        f!("{cut}...")
    }
}

fn output_formatted(open: &OpenDocument) {
    let document = &open.document;
    println!(
        "{} {} ({:?}, {} pages)",
        "Document:".bright_white().bold(),
        document.name.cyan().bold(),
        document.kind,
        document.layout.pages.len()
    );
    for message in &document.messages {
        println!("{} {}", "warning:".yellow().bold(), message);
    }

    if open.citations.is_empty() {
        println!("{}", "No citations found".yellow());
        return;
    }

    let mut table = crate::prelude::new_table();
    table.add_row(prettytable::row!["Id", "Type", "Location", "Text"]);
    for citation in &open.citations {
        let kind = citation
            .snippet
            .block_type()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "line".to_string());
        table.add_row(prettytable::row![
            citation.id,
            kind,
            location(citation),
            preview(&citation.text, 80)
        ]);
    }
    table.printstd();

    if let Some(first) = open.citations.first() {
        println!("\n{}:", "To jump back to a citation".bright_white().bold());
        println!(
            "  {}",
            f!(
                "citelens locate {} '{}'",
                document.name,
                open.link(first).to_query_string()
            )
            .cyan()
        );
    }
}
