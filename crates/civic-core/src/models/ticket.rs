//! Ticket and ticket draft models

use serde::{Deserialize, Serialize};

use crate::db::{CachedEntity, Table};
use crate::error::{Error, Result};
use crate::geo::Location;

/// A citizen-reported issue known to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: i64,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    pub status: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub address: Option<String>,
    /// Reporting user, when the server exposes it
    #[serde(default)]
    pub created_by: Option<String>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
    #[serde(default)]
    pub votes: i64,
    #[serde(default)]
    pub has_voted: bool,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

impl CachedEntity for Ticket {
    const TABLE: Table = Table::Tickets;

    fn id(&self) -> i64 {
        self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn owner_id(&self) -> Option<&str> {
        self.created_by.as_deref()
    }

    fn status(&self) -> Option<&str> {
        Some(&self.status)
    }

    fn sort_key(&self) -> i64 {
        self.updated_at
    }
}

/// Body of the ticket create call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
}

/// Editable fields of a draft.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftInput {
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub location: Option<Location>,
    pub address: Option<String>,
    /// Paths of locally staged image files
    pub image_paths: Vec<String>,
}

/// A ticket authored on this device and not yet submitted.
///
/// `local_id` comes from a separate sequence and never collides with or
/// stands in for a server id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketDraft {
    pub local_id: i64,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub location: Option<Location>,
    pub address: Option<String>,
    pub image_paths: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TicketDraft {
    /// Build the create request, rejecting drafts the server would refuse.
    pub fn to_new_ticket(&self) -> Result<NewTicket> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(Error::InvalidInput("Ticket title cannot be empty".into()));
        }
        let location = self
            .location
            .ok_or_else(|| Error::InvalidInput("Ticket needs a location".into()))?;

        Ok(NewTicket {
            title: title.to_string(),
            description: self.description.trim().to_string(),
            category: self.category.clone(),
            latitude: location.latitude,
            longitude: location.longitude,
            address: self.address.clone(),
        })
    }
}

/// Entry of the unified "my tickets" list.
#[derive(Debug, Clone, PartialEq)]
pub enum MyTicket {
    Remote(Ticket),
    Draft(TicketDraft),
}

impl MyTicket {
    pub fn title(&self) -> &str {
        match self {
            Self::Remote(ticket) => &ticket.title,
            Self::Draft(draft) => &draft.title,
        }
    }

    pub const fn is_draft(&self) -> bool {
        matches!(self, Self::Draft(_))
    }
}
