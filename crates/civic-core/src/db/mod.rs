//! Local store for Civic

mod cache;
mod connection;
mod live;
mod migrations;
mod settings_repository;

pub use cache::{CachedEntity, EntityCache};
pub(crate) use cache::{select_by_owner, upsert_row};
pub use connection::{Database, Table};
pub use live::LiveQuery;
pub(crate) use live::live_query;
pub use settings_repository::SettingsStore;
