//! Office model

use serde::{Deserialize, Serialize};

use crate::db::{CachedEntity, Table};
use crate::geo::Location;

/// A municipal office as served by the offices endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Office {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub opening_hours: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl Office {
    pub const fn location(&self) -> Location {
        Location::new(self.latitude, self.longitude)
    }
}

impl CachedEntity for Office {
    const TABLE: Table = Table::Offices;

    fn id(&self) -> i64 {
        self.id
    }

    fn title(&self) -> &str {
        &self.name
    }
}
