use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "civic")]
#[command(about = "Offline-first client for municipal community services")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the JSON client config
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Device latitude, used for location-based sync decisions
    #[arg(long, global = true, requires = "lng", allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// Device longitude
    #[arg(long, global = true, requires = "lat", allow_hyphen_values = true)]
    pub lng: Option<f64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store the session locally
    Login {
        #[arg(long, value_name = "EMAIL")]
        email: String,
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Sign out, optionally wiping all user data from this device
    Logout {
        #[arg(long)]
        clear_data: bool,
    },
    /// Refresh cached data from the server when it is stale
    Refresh {
        /// Only refresh this feature (office, info, ticket, appointment, user)
        #[arg(long, value_name = "FEATURE")]
        feature: Option<String>,
        /// Ignore staleness and movement checks
        #[arg(long)]
        force: bool,
    },
    /// Show sync checkpoints and whether each feature is due
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Poll watched tickets and infos for status changes
    StatusCheck,
    /// Manage ticket drafts
    Drafts {
        #[command(subcommand)]
        command: DraftCommands,
    },
    /// Manage local favorites
    Favorites {
        #[command(subcommand)]
        command: FavoriteCommands,
    },
    /// Maintain appointment notes
    Notes {
        #[command(subcommand)]
        command: NoteCommands,
    },
    /// Inspect the client config
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum FavoriteKind {
    Office,
    Info,
    Ticket,
}

#[derive(Subcommand)]
pub enum DraftCommands {
    /// List drafts of the signed-in user
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Save a new draft
    Create {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        address: Option<String>,
        /// Staged image file; repeat for several
        #[arg(long = "image", value_name = "PATH")]
        images: Vec<PathBuf>,
    },
    /// Submit a draft as a ticket
    Promote { local_id: i64 },
    /// Discard a draft
    Delete { local_id: i64 },
}

#[derive(Subcommand)]
pub enum FavoriteCommands {
    /// Toggle a favorite
    Toggle {
        #[arg(value_enum)]
        kind: FavoriteKind,
        id: i64,
    },
    /// List favorited ids
    List {
        #[arg(value_enum)]
        kind: FavoriteKind,
    },
}

#[derive(Subcommand)]
pub enum NoteCommands {
    /// Delete notes older than the retention window
    Purge,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective config
    Show,
    /// Print the config file path
    Path,
}
