//! CLI definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// entity-sync - inter-server sync of software/configuration/image entities
/// between two systems-management servers.
#[derive(Parser, Debug)]
#[command(name = "esync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Source server's database connection string
    #[arg(long, global = true, env = "ESYNC_DATABASE_URL")]
    pub db_url: Option<String>,

    /// Target server's database connection string (import only)
    #[arg(long, global = true, env = "ESYNC_TARGET_DATABASE_URL")]
    pub target_db_url: Option<String>,

    /// This server's product name, stamped into/validated against version.txt
    #[arg(long, global = true, env = "ESYNC_PRODUCT_NAME")]
    pub product_name: Option<String>,

    /// This server's product version, stamped into/validated against version.txt
    #[arg(long, global = true, env = "ESYNC_PRODUCT_VERSION")]
    pub product_version: Option<String>,

    /// Output as structured JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Preview changes without touching the database or filesystem
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export software channels, configuration channels and/or images
    Export(ExportArgs),

    /// Import a previously exported directory into the target server
    Import(ImportArgs),

    /// Print version information
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(clap::Args, Debug, Default)]
pub struct ExportArgs {
    /// Software channel labels to export (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub channels: Vec<String>,

    /// Directory to write the export into
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Export only channel/package/errata metadata, no config or image data
    #[arg(long)]
    pub metadata_only: bool,

    /// Configuration channel labels to export (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub config_labels: Vec<String>,

    /// Include OS image data
    #[arg(long)]
    pub os_images: bool,

    /// Include container image data
    #[arg(long)]
    pub containers: bool,

    /// Only export errata/packages newer than this ISO-8601 timestamp
    #[arg(long)]
    pub starting_date: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ImportArgs {
    /// Directory to import from
    #[arg(long, default_value = ".")]
    pub import_dir: PathBuf,

    /// Username for the target server's XML-RPC API
    #[arg(long, default_value = "admin")]
    pub xml_rpc_user: String,

    /// Password for the target server's XML-RPC API
    #[arg(long, default_value = "admin")]
    pub xml_rpc_password: String,
}
