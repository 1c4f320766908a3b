use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory holding book documents and the `cache/` directory.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Show the browser window instead of running headless.
    #[arg(long, global = true)]
    pub headed: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Search(SearchArgs),
    Chapters(ChaptersArgs),
    Read(ReadArgs),
    Shelf {
        #[command(subcommand)]
        command: ShelfCommand,
    },
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Title or keyword to search for.
    pub keyword: String,

    /// Fetch every hit's chapter index and save the books to the shelf.
    #[arg(long)]
    pub save: bool,
}

#[derive(Debug, Args)]
pub struct ChaptersArgs {
    /// Id of a book already on the shelf.
    pub book_id: String,
}

#[derive(Debug, Args)]
pub struct ReadArgs {
    /// Id of a book already on the shelf.
    pub book_id: String,

    /// Zero-based chapter index (default: last read chapter, else 0).
    #[arg(long)]
    pub chapter: Option<usize>,

    /// Bypass the content cache.
    #[arg(long)]
    pub refresh: bool,
}

#[derive(Debug, Subcommand)]
pub enum ShelfCommand {
    List,
    Remove(ShelfRemoveArgs),
}

#[derive(Debug, Args)]
pub struct ShelfRemoveArgs {
    pub book_id: String,
}
