use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use stint_core::SortOrder;

#[derive(Parser)]
#[command(name = "stint")]
#[command(about = "Track what you started and keep two replicas in step")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Local store descriptor (sqlite:PATH, json:PATH, memory, or a bare path)
    #[arg(long, global = true, value_name = "DESCRIPTOR")]
    pub local: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start tracking a new activity
    #[command(alias = "new")]
    Add {
        /// Activity title
        title: Vec<String>,
        /// Tag to attach (repeatable)
        #[arg(short, long = "tag", value_name = "TAG")]
        tags: Vec<String>,
        /// Estimated duration, e.g. "1w 2d", "3h 30m"
        #[arg(short, long, value_name = "DURATION")]
        estimate: Option<String>,
        /// Free text body (read from stdin when piped)
        #[arg(short, long)]
        body: Option<String>,
    },
    /// List tracked activities
    #[command(alias = "ls")]
    List {
        /// Sort order
        #[arg(long, value_enum, default_value_t = SortKey::Modified)]
        sort: SortKey,
        /// Only show activities still in progress
        #[arg(long)]
        active: bool,
        /// Number of activities to show
        #[arg(short, long)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one activity in full
    Show {
        /// Record ID or unique ID prefix
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change an activity; opens $EDITOR on the body when no field is given
    Edit {
        /// Record ID or unique ID prefix
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// Replace tags (repeatable)
        #[arg(short, long = "tag", value_name = "TAG")]
        tags: Vec<String>,
        /// New estimated duration
        #[arg(short, long, value_name = "DURATION")]
        estimate: Option<String>,
        /// New body
        #[arg(short, long)]
        body: Option<String>,
    },
    /// Mark an activity as finished now
    #[command(alias = "done")]
    Finish {
        /// Record ID or unique ID prefix
        id: String,
    },
    /// Delete an activity
    #[command(alias = "rm")]
    Delete {
        /// Record ID or unique ID prefix
        id: String,
    },
    /// Run one reconciliation pass against the remote replica
    Sync {
        /// Output the pass report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Reconcile on the configured interval until Ctrl-C
    Daemon,
    /// Inspect or initialize configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Print the config file location
    Path,
    /// Write a config file
    Init {
        /// Remote store descriptor
        #[arg(long, value_name = "DESCRIPTOR")]
        remote: Option<String>,
        /// Reconciliation interval, e.g. "60s"
        #[arg(long, value_name = "DURATION")]
        interval: Option<String>,
        /// Keep deletions local instead of propagating tombstones
        #[arg(long)]
        no_propagate_deletes: bool,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum SortKey {
    Modified,
    Started,
    Title,
}

impl From<SortKey> for SortOrder {
    fn from(key: SortKey) -> Self {
        match key {
            SortKey::Modified => Self::LastModified,
            SortKey::Started => Self::Started,
            SortKey::Title => Self::Title,
        }
    }
}
