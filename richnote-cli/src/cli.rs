use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "richnote")]
#[command(version)]
#[command(about = "Inspect, normalize and view richnote documents")]
pub struct Cli {
    /// Style configuration to use instead of ~/.richnote/config.toml
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Prints the visible text and the span table of a document
    Show {
        file: PathBuf,
    },
    /// Loads a document, rebuilds its styling and writes it back as JSON
    Normalize {
        file: PathBuf,
        /// Where to write the result (stdout if omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Stores a document of any supported format as a note
    Import {
        file: PathBuf,
        /// Note title (defaults to the file name)
        #[arg(long)]
        title: Option<String>,
        /// Note directory (defaults to ~/.richnote/notes)
        #[arg(long, value_name = "DIR")]
        notes_dir: Option<PathBuf>,
    },
    /// Opens a read-only terminal viewer
    View {
        file: PathBuf,
    },
}
