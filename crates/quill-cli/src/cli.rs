use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use quill_core::db::SortOrder;
use quill_core::SyncStatus;

#[derive(Parser)]
#[command(name = "quill")]
#[command(about = "Local-first notes with background sync")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the config file
    #[arg(long = "config", global = true, value_name = "PATH")]
    pub config_path: Option<PathBuf>,

    /// Quick capture: quill "note title"
    #[arg(trailing_var_arg = true)]
    pub note: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new note
    #[command(alias = "new")]
    Add {
        /// Note title
        title: Vec<String>,
        /// Note body (read from piped stdin when omitted)
        #[arg(short, long)]
        body: Option<String>,
        /// Tag to attach; repeatable
        #[arg(short, long = "tag", value_name = "TAG")]
        tags: Vec<String>,
        /// Collection the note belongs to
        #[arg(short, long, value_name = "ID")]
        collection: Option<String>,
    },
    /// List notes from the local index
    List {
        /// Number of notes to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Filter notes by tag name
        #[arg(long)]
        tag: Option<String>,
        /// Filter notes by collection
        #[arg(long, value_name = "ID")]
        collection: Option<String>,
        /// Filter notes by sync status
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
        /// Sort order
        #[arg(long, value_enum, default_value_t = SortArg::Updated)]
        sort: SortArg,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search notes by title, preview and tags
    Search {
        /// Search query
        query: String,
        /// Number of notes to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a full note
    Show {
        /// Note ID or unique ID prefix
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit an existing note; opens the editor on the body when no field is given
    Edit {
        /// Note ID or unique ID prefix
        id: String,
        /// Replace the title
        #[arg(long)]
        title: Option<String>,
        /// Replace the body
        #[arg(long)]
        body: Option<String>,
        /// Replace the tags; repeatable
        #[arg(short, long = "tag", value_name = "TAG")]
        tags: Option<Vec<String>>,
        /// Move to a collection
        #[arg(long, value_name = "ID", conflicts_with = "no_collection")]
        collection: Option<String>,
        /// Remove the note from its collection
        #[arg(long)]
        no_collection: bool,
    },
    /// Delete an existing note
    Delete {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// List tags with note counts
    Tags {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Push queued changes and pull the remote state now
    Sync {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show queue and connectivity status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-queue changes the remote rejected for a note
    Retry {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Keep syncing in the foreground until interrupted
    Watch,
    /// Inspect or change the client configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum StatusArg {
    Pending,
    Syncing,
    Synced,
    Failed,
}

impl From<StatusArg> for SyncStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Pending => Self::Pending,
            StatusArg::Syncing => Self::Syncing,
            StatusArg::Synced => Self::Synced,
            StatusArg::Failed => Self::Failed,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum SortArg {
    Updated,
    Oldest,
    Created,
    Title,
}

impl From<SortArg> for SortOrder {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::Updated => Self::UpdatedDesc,
            SortArg::Oldest => Self::UpdatedAsc,
            SortArg::Created => Self::CreatedDesc,
            SortArg::Title => Self::TitleAsc,
        }
    }
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Print the config file location
    Path,
    /// Update values in the config file
    Set {
        /// Base URL of the remote notes API
        #[arg(long, value_name = "URL")]
        remote_url: Option<String>,
        /// Local database file
        #[arg(long, value_name = "PATH")]
        database_path: Option<PathBuf>,
        /// Per-request timeout in seconds
        #[arg(long, value_name = "SECS")]
        request_timeout_secs: Option<u64>,
        /// Probe and pull interval in seconds
        #[arg(long, value_name = "SECS")]
        sync_interval_secs: Option<u64>,
    },
}
