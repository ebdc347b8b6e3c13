//! Remote data sources.
//!
//! One trait per domain. Every method returns a classified [`RemoteError`]
//! on failure; [`http`] provides the REST implementation.
//!
//! [`RemoteError`]: crate::error::RemoteError

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RemoteResult;
use crate::geo::{BoundingBox, Location};
use crate::models::{
    AddressSuggestion, Appointment, Credentials, Info, NewAppointment, NewTicket, Office, Session,
    Ticket, UserProfile,
};

pub use http::ApiClient;

/// Lightweight current-status payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDto {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Filter for the ticket collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketQuery {
    pub bbox: Option<BoundingBox>,
    /// Also include this user's own tickets regardless of the box
    pub user_id: Option<String>,
}

/// A staged image uploaded to a ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait OfficeSource: Send + Sync {
    async fn list(&self, bbox: Option<BoundingBox>) -> RemoteResult<Vec<Office>>;

    async fn get(&self, id: i64) -> RemoteResult<Office>;
}

#[async_trait]
pub trait InfoSource: Send + Sync {
    async fn list(&self, bbox: Option<BoundingBox>) -> RemoteResult<Vec<Info>>;

    async fn get(&self, id: i64) -> RemoteResult<Info>;

    async fn status(&self, id: i64) -> RemoteResult<Option<StatusDto>>;
}

#[async_trait]
pub trait TicketSource: Send + Sync {
    async fn list(&self, query: &TicketQuery) -> RemoteResult<Vec<Ticket>>;

    async fn get(&self, id: i64) -> RemoteResult<Ticket>;

    async fn status(&self, id: i64) -> RemoteResult<Option<StatusDto>>;

    async fn create(&self, ticket: &NewTicket) -> RemoteResult<Ticket>;

    /// Attach an image; returns the public URL of the stored file.
    async fn upload_image(&self, ticket_id: i64, image: &ImageUpload) -> RemoteResult<String>;

    async fn vote(&self, ticket_id: i64) -> RemoteResult<Ticket>;
}

#[async_trait]
pub trait AppointmentSource: Send + Sync {
    async fn list(&self, user_id: &str) -> RemoteResult<Vec<Appointment>>;

    async fn get(&self, id: i64) -> RemoteResult<Appointment>;

    async fn create(&self, appointment: &NewAppointment) -> RemoteResult<Appointment>;

    async fn cancel(&self, id: i64) -> RemoteResult<()>;
}

#[async_trait]
pub trait AddressSource: Send + Sync {
    async fn search(
        &self,
        query: &str,
        bbox: Option<BoundingBox>,
    ) -> RemoteResult<Vec<AddressSuggestion>>;

    async fn reverse(&self, location: Location) -> RemoteResult<Option<AddressSuggestion>>;
}

#[async_trait]
pub trait UserSource: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> RemoteResult<Session>;

    async fn profile(&self, user_id: &str) -> RemoteResult<UserProfile>;
}
