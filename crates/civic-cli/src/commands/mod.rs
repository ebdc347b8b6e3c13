pub mod auth_cmd;
pub mod common;
pub mod completions;
pub mod config;
pub mod drafts;
pub mod favorites;
pub mod notes;
pub mod refresh;
pub mod status;
pub mod status_check;
