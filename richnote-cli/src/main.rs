//! Richnote CLI - Terminal tools for richnote documents

mod cli;
mod io;
mod log;
mod ui;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use richnote_core::render::visible_text;
use richnote_core::{Editor, JsonDirStore, NoteStore, SaveWorker, SpanTag, StyleConfig};

use crate::cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();
    log::init()?;

    let config = io::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Show { file } => show(&file, config),
        Commands::Normalize { file, output } => {
            let editor = open(&file, config)?;
            let json = editor.serialize().context("Failed to serialize document")?;
            io::write_output(output.as_ref(), &json)
        }
        Commands::Import {
            file,
            title,
            notes_dir,
        } => {
            let title = title.unwrap_or_else(|| io::title_for(&file));
            let store = match notes_dir {
                Some(dir) => JsonDirStore::new(dir)?,
                None => JsonDirStore::open_default()?,
            };
            import(&file, &title, config, store)
        }
        Commands::View { file } => {
            let editor = open(&file, config)?;
            let mut viewer = ui::Viewer::new(&io::title_for(&file), editor.document());
            ui::run(&mut viewer)
        }
    }
}

fn open(file: &Path, config: StyleConfig) -> Result<Editor> {
    let content = io::load_file(file)?;
    let mut editor = Editor::new(config);
    let report = editor.load(&content);
    info!(file = %file.display(), ?report, "opened document");
    Ok(editor)
}

fn show(file: &Path, config: StyleConfig) -> Result<()> {
    let editor = open(file, config)?;
    let doc = editor.document();

    println!("{}", visible_text(doc));
    println!("---");
    for span in doc.spans().iter().filter(|s| s.tag() != SpanTag::Hidden) {
        let text = doc.slice(span.range).unwrap_or_default();
        let value = span.kind.color().map(|c| c.to_string()).unwrap_or_default();
        println!(
            "{:<14} {:>6}..{:<6} {:<9} {:<10} {:?}",
            span.tag().as_str(),
            span.start(),
            span.end(),
            format!("{:?}", span.origin),
            value,
            text
        );
    }
    Ok(())
}

fn import(file: &Path, title: &str, config: StyleConfig, store: JsonDirStore) -> Result<()> {
    let editor = open(file, config)?;
    let note = editor.snapshot(title).context("Failed to serialize document")?;
    let path = store.path_for(note.id);

    let worker = SaveWorker::spawn(store);
    worker.save(note.clone())?;
    let store = worker.finish()?;

    if store.get(note.id)?.is_none() {
        anyhow::bail!("Note {} was not written to {}", note.id, path.display());
    }
    println!("Imported \"{}\" as {} ({})", note.title, note.id, path.display());
    Ok(())
}
