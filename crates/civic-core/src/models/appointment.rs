//! Appointment and appointment note models

use serde::{Deserialize, Serialize};

use crate::db::{CachedEntity, Table};

/// A booked slot at an office.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: i64,
    pub user_id: String,
    pub office_id: i64,
    pub title: String,
    pub status: String,
    /// Start timestamp (Unix ms)
    pub starts_at: i64,
    #[serde(default)]
    pub ends_at: Option<i64>,
    #[serde(default)]
    pub office_name: Option<String>,
}

impl CachedEntity for Appointment {
    const TABLE: Table = Table::Appointments;

    fn id(&self) -> i64 {
        self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn owner_id(&self) -> Option<&str> {
        Some(&self.user_id)
    }

    fn status(&self) -> Option<&str> {
        Some(&self.status)
    }

    fn sort_key(&self) -> i64 {
        self.starts_at
    }
}

/// Body of the booking call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAppointment {
    pub office_id: i64,
    pub title: String,
    pub starts_at: i64,
}

/// Private note a user keeps for one of their appointments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentNote {
    pub appointment_id: i64,
    pub user_id: String,
    pub content: String,
    /// Start of the annotated appointment; drives retention
    pub appointment_at: i64,
    pub updated_at: i64,
}
