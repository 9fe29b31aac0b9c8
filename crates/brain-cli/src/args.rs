use clap::{Parser, Subcommand, ValueEnum};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum OutputFormat {
    Plain,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Plain => write!(f, "plain"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Parser)]
#[command(name = "brain")]
#[command(about = "Daemon lifecycle, queue inspection and graph export for the second-brain daemon", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the daemon's config file. Defaults to the platform config
    /// directory (§6).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, global = true, default_value_t = OutputFormat::Plain)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Start or stop the daemon")]
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
    #[command(about = "Inspect or mutate the analysis queue")]
    Queue {
        #[command(subcommand)]
        command: QueueCommand,
    },
    #[command(about = "Rebuild the relational index from the blob store")]
    Index {
        #[command(subcommand)]
        command: IndexCommand,
    },
    #[command(about = "Export nodes as JSON Lines")]
    Export {
        /// Restrict to a project name.
        #[arg(long)]
        project: Option<String>,
        /// Include archived nodes.
        #[arg(long, default_value_t = false)]
        include_archived: bool,
        /// Write to a file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum DaemonCommand {
    #[command(about = "Start the daemon in the foreground")]
    Start,
    #[command(about = "Stop a running daemon")]
    Stop,
}

#[derive(Subcommand)]
pub enum QueueCommand {
    #[command(about = "Show queue counts by status")]
    Status,
    #[command(about = "Force-enqueue a user-triggered job for a segment")]
    Enqueue {
        session_file: PathBuf,
        start: String,
        end: String,
    },
    #[command(about = "Cancel a pending or running job")]
    Cancel { job_id: String },
    #[command(about = "Retry a permanently failed job")]
    Retry { job_id: String },
}

#[derive(Subcommand)]
pub enum IndexCommand {
    #[command(about = "Drop and repopulate the relational index from blobs on disk")]
    Rebuild,
}
