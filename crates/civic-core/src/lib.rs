//! civic-core - Core library for Civic
//!
//! Offline-first client core for municipal community services: the sync
//! decision engine, the local cache and its live queries, domain
//! repositories, ticket drafts and the status-change detector. Platform
//! services (location, notifications) and the REST backend are reached
//! through traits.

pub mod clock;
pub mod config;
pub mod db;
pub mod drafts;
pub mod error;
pub mod geo;
pub mod location;
pub mod models;
pub mod notify;
pub mod remote;
pub mod repository;
pub mod services;
pub mod sync;
pub mod util;

#[cfg(test)]
mod test_support;

pub use clock::{Clock, SystemClock};
pub use config::ClientConfig;
pub use error::{
    Error, LocalError, MediaError, Outcome, RemoteError, Result, SecondaryFailure, SinkError,
};
pub use geo::{BoundingBox, Location};
pub use services::{CivicClient, Platform, Sources};
pub use sync::{Feature, SyncCoordinator, SyncParams};
