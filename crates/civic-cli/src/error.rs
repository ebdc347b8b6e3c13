use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] civic_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Not signed in. Run `civic login --email <EMAIL> --password <PASSWORD>` first.")]
    NotSignedIn,
    #[error("Draft not found: {0}")]
    DraftNotFound(i64),
    #[error("Draft title cannot be empty")]
    EmptyDraftTitle,
    #[error("Invalid coordinates: {0}")]
    InvalidLocation(String),
    #[error("Could not resolve a data directory for the local database")]
    NoDataDir,
}
