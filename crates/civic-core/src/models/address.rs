//! Address history model

use serde::{Deserialize, Serialize};

use crate::geo::Location;

/// Marker for special address entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AddressKind {
    Home,
}

impl AddressKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Home => "HOME",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "HOME" => Some(Self::Home),
            _ => None,
        }
    }
}

/// A previously used or searched address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressEntry {
    pub id: i64,
    pub user_id: String,
    pub label: String,
    pub location: Location,
    pub kind: Option<AddressKind>,
    pub last_used_at: i64,
}

/// Geocoding result from the address search endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressSuggestion {
    pub label: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl AddressSuggestion {
    pub const fn location(&self) -> Location {
        Location::new(self.latitude, self.longitude)
    }
}
