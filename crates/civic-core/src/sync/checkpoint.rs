//! Persisted sync checkpoints.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geo::Location;

/// Feature domains that keep their own checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    Office,
    Info,
    Ticket,
    Appointment,
    User,
}

impl Feature {
    pub const ALL: [Self; 5] = [
        Self::Office,
        Self::Info,
        Self::Ticket,
        Self::Appointment,
        Self::User,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Office => "office",
            Self::Info => "info",
            Self::Ticket => "ticket",
            Self::Appointment => "appointment",
            Self::User => "user",
        }
    }

    pub(crate) fn time_key(self) -> String {
        format!("{}_last_sync_time", self.as_str())
    }

    pub(crate) fn lat_key(self) -> String {
        format!("{}_last_sync_lat", self.as_str())
    }

    pub(crate) fn lng_key(self) -> String {
        format!("{}_last_sync_lng", self.as_str())
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for Feature {
    type Err = crate::Error;

    fn from_str(value: &str) -> crate::Result<Self> {
        Self::ALL
            .into_iter()
            .find(|feature| feature.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| crate::Error::InvalidInput(format!("unknown feature '{value}'")))
    }
}

/// Last successful sync of one feature.
///
/// Defaults to "never synced, no location".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SyncCheckpoint {
    pub last_sync_time_millis: i64,
    pub last_location: Option<Location>,
}

impl SyncCheckpoint {
    /// Rebuild from the raw key-value entries; a half-written location is
    /// treated as unknown.
    pub(crate) fn from_values(
        time: Option<&str>,
        lat: Option<&str>,
        lng: Option<&str>,
    ) -> Self {
        let last_sync_time_millis = time.and_then(|raw| raw.parse().ok()).unwrap_or(0);
        let lat = lat.and_then(|raw| raw.parse::<f64>().ok());
        let lng = lng.and_then(|raw| raw.parse::<f64>().ok());
        let last_location = match (lat, lng) {
            (Some(latitude), Some(longitude)) => Some(Location::new(latitude, longitude)),
            _ => None,
        };
        Self {
            last_sync_time_millis,
            last_location,
        }
    }
}
