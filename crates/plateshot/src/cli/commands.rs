//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::gallery::SortOrder;

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Recognize command arguments.
#[derive(Debug, Args)]
pub struct RecognizeCommand {
    /// Image file to submit, or `-` to read it from stdin
    #[arg(value_name = "IMAGE")]
    pub image: PathBuf,

    /// Keep a copy of the submitted image alongside the result
    #[arg(short, long)]
    pub keep_image: bool,

    /// Output the stored result as JSON
    #[arg(short, long)]
    pub json: bool,
}

impl RecognizeCommand {
    /// Whether the image should be read from stdin.
    #[must_use]
    pub fn from_stdin(&self) -> bool {
        self.image.as_os_str() == "-"
    }
}

/// Gallery commands.
#[derive(Debug, Subcommand)]
pub enum GalleryCommand {
    /// List stored numberplates
    List(ListCommand),

    /// Show a single stored numberplate
    Show {
        /// Result id
        id: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Delete a stored numberplate
    Delete {
        /// Result id
        id: String,
    },

    /// Delete all stored numberplates
    Clear {
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Replace local results with the server's list (mobile API only)
    Sync,
}

/// Gallery list arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Only show plates containing this text (case-insensitive)
    #[arg(short, long)]
    pub search: Option<String>,

    /// Sort order
    #[arg(long, value_enum, default_value = "newest")]
    pub sort: SortArg,

    /// Maximum number of results
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Settings commands.
#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Show the effective recognition endpoint
    Show,

    /// Validate and save the recognition endpoint URL
    SetEndpoint {
        /// Base URL of the recognition API
        url: String,
    },

    /// Forget the saved endpoint
    ClearEndpoint,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Sort order argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortArg {
    /// Most recent first
    Newest,
    /// Oldest first
    Oldest,
    /// By plate text
    Alphabetical,
}

impl From<SortArg> for SortOrder {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Newest => Self::Newest,
            SortArg::Oldest => Self::Oldest,
            SortArg::Alphabetical => Self::Alphabetical,
        }
    }
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}
