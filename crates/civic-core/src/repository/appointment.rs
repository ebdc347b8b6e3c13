//! Booked appointments and the user's private notes on them.

use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension};

use super::{begin_refresh, RefreshOutcome};
use crate::clock::Clock;
use crate::db::{live_query, Database, EntityCache, LiveQuery, SettingsStore, Table};
use crate::error::{Error, Outcome, Result, SecondaryFailure, SinkError};
use crate::models::{Appointment, AppointmentNote, NewAppointment};
use crate::notify::{Notification, NotificationSink};
use crate::remote::AppointmentSource;
use crate::sync::{Feature, SyncCoordinator};

/// Lead time of the reminder scheduled when booking
const REMINDER_LEAD_MS: i64 = 60 * 60 * 1000;

fn reminder_id(appointment_id: i64) -> String {
    format!("appointment:{appointment_id}")
}

#[derive(Clone)]
pub struct AppointmentRepository {
    cache: EntityCache<Appointment>,
    remote: Arc<dyn AppointmentSource>,
    coordinator: SyncCoordinator,
    settings: SettingsStore,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    note_retention_ms: i64,
}

impl AppointmentRepository {
    pub fn new(
        db: Database,
        remote: Arc<dyn AppointmentSource>,
        coordinator: SyncCoordinator,
        settings: SettingsStore,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        note_retention_ms: i64,
    ) -> Self {
        Self {
            cache: EntityCache::new(db),
            remote,
            coordinator,
            settings,
            sink,
            clock,
            note_retention_ms,
        }
    }

    /// The user's appointments, latest start first
    pub fn appointments(&self, user_id: impl Into<String>) -> LiveQuery<Appointment> {
        self.cache.watch_owner(user_id)
    }

    pub async fn cached(&self, id: i64) -> Result<Option<Appointment>> {
        self.cache.get(id).await
    }

    /// Refresh the user's appointments, then purge expired notes.
    pub async fn refresh_appointments(&self, user_id: &str, force: bool) -> Result<RefreshOutcome> {
        let Some(pending) = begin_refresh(&self.coordinator, Feature::Appointment, force).await?
        else {
            return Ok(RefreshOutcome::Skipped);
        };
        let appointments = self.remote.list(user_id).await?;
        self.cache.replace_all(&appointments).await?;
        let outcome = pending.complete(appointments.len()).await?;

        if let Err(error) = self.purge_expired_notes().await {
            tracing::warn!("Note purge after refresh failed: {error}");
        }
        Ok(outcome)
    }

    pub async fn refresh_entity(&self, id: i64) -> Result<Appointment> {
        let appointment = self.remote.get(id).await?;
        self.cache.upsert(&appointment).await?;
        Ok(appointment)
    }

    pub async fn appointment(&self, id: i64) -> Result<Option<Appointment>> {
        match self.refresh_entity(id).await {
            Ok(appointment) => Ok(Some(appointment)),
            Err(error) => {
                tracing::debug!(id, "Appointment refresh failed, using cache: {error}");
                self.cache.get(id).await
            }
        }
    }

    /// Book an appointment and schedule a reminder an hour before it.
    ///
    /// The booking stands even if the reminder cannot be scheduled.
    pub async fn book(&self, request: &NewAppointment) -> Result<Outcome<Appointment>> {
        let appointment = self.remote.create(request).await?;
        self.cache.upsert(&appointment).await?;
        tracing::info!(id = appointment.id, "Booked appointment");

        let failure = self.schedule_reminder(&appointment).await;
        Ok(Outcome {
            value: appointment,
            secondary_failure: failure,
        })
    }

    async fn schedule_reminder(&self, appointment: &Appointment) -> Option<SecondaryFailure> {
        let settings = match self.settings.notification_settings().await {
            Ok(settings) => settings,
            Err(error) => {
                return Some(SecondaryFailure::ReminderScheduleFailed(SinkError::Unavailable(
                    format!("notification settings unreadable: {error}"),
                )));
            }
        };
        if !(settings.enabled && settings.appointment_reminders) {
            return None;
        }
        let at = appointment.starts_at - REMINDER_LEAD_MS;
        if at <= self.clock.now_millis() {
            return None;
        }

        let notification = Notification {
            id: reminder_id(appointment.id),
            title: appointment.title.clone(),
            message: appointment.office_name.as_ref().map_or_else(
                || "Your appointment starts in one hour".to_string(),
                |office| format!("Your appointment at {office} starts in one hour"),
            ),
        };
        match self.sink.schedule(&notification, at).await {
            Ok(()) => None,
            Err(error) => {
                tracing::warn!(id = appointment.id, "Reminder scheduling failed: {error}");
                Some(error.into())
            }
        }
    }

    /// Cancel remotely, drop the cached row and the pending reminder.
    pub async fn cancel(&self, id: i64) -> Result<Outcome<()>> {
        self.remote.cancel(id).await?;
        self.cache.delete(id).await?;
        tracing::info!(id, "Cancelled appointment");

        match self.sink.cancel_scheduled(&reminder_id(id)).await {
            Ok(()) => Ok(Outcome::complete(())),
            Err(error) => Ok(Outcome::with_failure((), error.into())),
        }
    }

    /// Create or replace the user's note on an appointment.
    ///
    /// The appointment must be cached; its start time drives retention.
    pub async fn save_note(&self, appointment_id: i64, user_id: &str, content: &str) -> Result<AppointmentNote> {
        let appointment = self
            .cache
            .get(appointment_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("appointment {appointment_id}")))?;
        let note = AppointmentNote {
            appointment_id,
            user_id: user_id.to_string(),
            content: content.to_string(),
            appointment_at: appointment.starts_at,
            updated_at: self.clock.now_millis(),
        };
        self.cache
            .database()
            .run_in_transaction(&[Table::AppointmentNotes], |tx| {
                tx.execute(
                    "INSERT INTO appointment_notes
                     (appointment_id, user_id, content, appointment_at, updated_at)
                     VALUES (?, ?, ?, ?, ?)
                     ON CONFLICT(appointment_id, user_id) DO UPDATE SET
                        content = excluded.content,
                        appointment_at = excluded.appointment_at,
                        updated_at = excluded.updated_at",
                    params![
                        note.appointment_id,
                        note.user_id,
                        note.content,
                        note.appointment_at,
                        note.updated_at
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(note)
    }

    pub async fn note(&self, appointment_id: i64, user_id: &str) -> Result<Option<AppointmentNote>> {
        self.cache
            .database()
            .read(|conn| select_note(conn, appointment_id, user_id))
            .await
    }

    pub fn watch_note(&self, appointment_id: i64, user_id: impl Into<String>) -> LiveQuery<AppointmentNote> {
        let user_id = user_id.into();
        live_query(
            self.cache.database().clone(),
            vec![Table::AppointmentNotes],
            move |conn| Ok(select_note(conn, appointment_id, &user_id)?.into_iter().collect()),
        )
    }

    pub async fn delete_note(&self, appointment_id: i64, user_id: &str) -> Result<bool> {
        self.cache
            .database()
            .run_in_transaction(&[Table::AppointmentNotes], |tx| {
                Ok(tx.execute(
                    "DELETE FROM appointment_notes WHERE appointment_id = ? AND user_id = ?",
                    params![appointment_id, user_id],
                )? > 0)
            })
            .await
    }

    /// Delete notes whose appointment lies beyond the retention window.
    pub async fn purge_expired_notes(&self) -> Result<usize> {
        let cutoff = self.clock.now_millis() - self.note_retention_ms;
        let purged = self
            .cache
            .database()
            .run_in_transaction(&[Table::AppointmentNotes], |tx| {
                Ok(tx.execute(
                    "DELETE FROM appointment_notes WHERE appointment_at < ?",
                    [cutoff],
                )?)
            })
            .await?;
        if purged > 0 {
            tracing::info!(purged, "Purged expired appointment notes");
        }
        Ok(purged)
    }
}

fn select_note(conn: &Connection, appointment_id: i64, user_id: &str) -> Result<Option<AppointmentNote>> {
    Ok(conn
        .query_row(
            "SELECT appointment_id, user_id, content, appointment_at, updated_at
             FROM appointment_notes WHERE appointment_id = ? AND user_id = ?",
            params![appointment_id, user_id],
            |row| {
                Ok(AppointmentNote {
                    appointment_id: row.get(0)?,
                    user_id: row.get(1)?,
                    content: row.get(2)?,
                    appointment_at: row.get(3)?,
                    updated_at: row.get(4)?,
                })
            },
        )
        .optional()?)
}
