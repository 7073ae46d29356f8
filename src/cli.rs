use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "logkeeper", version, about = "Compress and clean up rotated log files")]
pub struct Cli {
    /// Settings file to use instead of the per-user default.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Log directory to manage. Saved to the settings file.
    #[arg(long, global = true, value_name = "DIR")]
    pub dir: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Default, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Run the enabled automatic policies and show the directory.
    #[default]
    Status,
    /// Compress the given files, or every raw log in the directory.
    Compress {
        /// Paths relative to the log directory, or absolute.
        files: Vec<PathBuf>,
    },
    /// Decompress the given files, or every archive in the directory.
    Decompress {
        /// Paths relative to the log directory, or absolute.
        files: Vec<PathBuf>,
    },
    /// Delete files older than the clean threshold.
    Clean {
        /// Override the configured threshold.
        #[arg(long)]
        days: Option<i64>,
        /// Delete instead of moving to the trash.
        #[arg(long)]
        permanent: bool,
    },
    /// Compress raw logs older than the compress threshold.
    Archive {
        /// Override the configured threshold.
        #[arg(long)]
        days: Option<i64>,
    },
}
