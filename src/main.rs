use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cli;

/// Inspect and combine folded-stack profiles written by countprof sessions.
#[derive(Debug, Parser)]
#[command(name = "countprof", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the hottest call paths and frames in a profile
    Summary {
        /// Profile to read (e.g. `1234.cp`)
        file: PathBuf,
        /// Number of entries per table
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Sum several profiles into one
    Merge {
        /// Destination file
        output: PathBuf,
        /// Profiles to combine
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    countprof_utils::init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Summary { file, top } => cli::summary::run(&file, top),
        Command::Merge { output, files } => cli::merge::run(&output, &files),
    }
}
