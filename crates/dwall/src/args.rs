//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "dwall")]
#[command(about = "Wallpaper switching by Wi-Fi network or time of day", long_about = None)]
pub struct Cli {
    /// Data directory override (database, images, applied state).
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add a rule at the end of the priority list.
    Add {
        /// User-facing rule label.
        #[arg(long)]
        name: String,

        /// Match when connected to this SSID.
        #[arg(long, conflicts_with = "time")]
        wifi: Option<String>,

        /// Match inside a daily window, e.g. 08:00-18:00 (may cross midnight).
        #[arg(long)]
        time: Option<String>,

        /// Image file to store as this rule's wallpaper.
        image: PathBuf,
    },

    /// Print the priority-ordered rule list.
    List,

    /// Move the rule at FROM to position TO.
    Move { from: usize, to: usize },

    /// Delete the rule at POSITION together with its stored image.
    Remove { position: usize },

    /// Store the fallback wallpaper applied when no rule matches.
    SetDefault {
        /// Image file to store as the default wallpaper.
        image: PathBuf,
    },

    /// Ask the running daemon for its current state.
    Status,
}
