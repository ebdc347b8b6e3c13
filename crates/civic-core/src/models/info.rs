//! Informational notice model

use serde::{Deserialize, Serialize};

use crate::db::{CachedEntity, Table};

/// A published notice (road works, events, service changes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Info {
    pub id: i64,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    pub status: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Publication timestamp (Unix ms)
    pub published_at: i64,
}

impl CachedEntity for Info {
    const TABLE: Table = Table::Infos;

    fn id(&self) -> i64 {
        self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn status(&self) -> Option<&str> {
        Some(&self.status)
    }

    fn sort_key(&self) -> i64 {
        self.published_at
    }
}
