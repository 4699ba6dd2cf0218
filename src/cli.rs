use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "dial", about = "Request-body sliders for a chat client's custom API source")]
pub struct Cli {
    /// Host settings file (default: from config, then ./settings.json)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// List collections, their preset bindings and sliders
    List,
    /// Write a collection's sliders to <name>.json
    Export {
        /// Collection to export (default: the active one)
        #[arg(long)]
        collection: Option<String>,
        /// Output directory (default: from config)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Create a new active collection from an exported slider file
    Import {
        /// JSON file holding an array of sliders
        file: PathBuf,
        /// Collection name (default: the file's base name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Apply slider values to a request descriptor (JSON) and print it
    Inject {
        /// Request descriptor file (default: stdin)
        request: Option<PathBuf>,
    },
    /// Act as if the host selected this preset
    Preset {
        name: String,
    },
    /// Bind a preset to the active collection
    Bind {
        /// Preset name (default: the host's current preset)
        preset: Option<String>,
    },
}
