//! Command-line interface for plateshot.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::Verbosity;

pub use commands::{
    ConfigCommand, GalleryCommand, ListCommand, OutputFormat, RecognizeCommand, SettingsCommand,
    SortArg, StatusCommand,
};

/// plateshot - Read numberplates from photos
///
/// Sends a photo to a numberplate recognition API and keeps a local
/// gallery of the plates it finds.
#[derive(Debug, Parser)]
#[command(name = "plateshot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Recognize the numberplate in an image and save it
    Recognize(RecognizeCommand),

    /// Browse and manage saved numberplates
    #[command(subcommand)]
    Gallery(GalleryCommand),

    /// View or change the recognition endpoint
    #[command(subcommand)]
    Settings(SettingsCommand),

    /// Show storage and endpoint status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Verbosity from `-q` and `-v`.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}
