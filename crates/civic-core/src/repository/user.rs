//! Session, profile and account-level settings.

use std::sync::Arc;

use rusqlite::params;

use super::{begin_refresh, RefreshOutcome};
use crate::clock::Clock;
use crate::db::{Database, SettingsStore, Table};
use crate::error::{Error, Result};
use crate::models::{Credentials, NotificationSettings, Session, UserProfile};
use crate::remote::UserSource;
use crate::sync::{Feature, SyncCoordinator};

const SESSION_KEY: &str = "session";
const PROFILE_KEY: &str = "user_profile";

#[derive(Clone)]
pub struct UserRepository {
    db: Database,
    settings: SettingsStore,
    remote: Arc<dyn UserSource>,
    coordinator: SyncCoordinator,
    clock: Arc<dyn Clock>,
}

impl UserRepository {
    pub fn new(
        db: Database,
        remote: Arc<dyn UserSource>,
        coordinator: SyncCoordinator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settings: SettingsStore::new(db.clone()),
            db,
            remote,
            coordinator,
            clock,
        }
    }

    /// Sign in and persist the session.
    pub async fn login(&self, credentials: &Credentials) -> Result<Session> {
        let session = self.remote.login(credentials).await?;
        self.settings
            .set(SESSION_KEY, &serde_json::to_string(&session)?)
            .await?;
        tracing::info!(user_id = %session.user_id, "Signed in");
        Ok(session)
    }

    /// The stored session, expired or not.
    async fn stored_session(&self) -> Result<Option<Session>> {
        self.settings
            .get(SESSION_KEY)
            .await?
            .map(|raw| serde_json::from_str(&raw).map_err(Error::from))
            .transpose()
    }

    /// The stored session, if it has not expired.
    pub async fn session(&self) -> Result<Option<Session>> {
        let Some(session) = self.stored_session().await? else {
            return Ok(None);
        };
        if session.is_expired(self.clock.now_millis()) {
            tracing::debug!(user_id = %session.user_id, "Stored session expired");
            return Ok(None);
        }
        Ok(Some(session))
    }

    pub async fn current_user_id(&self) -> Result<Option<String>> {
        Ok(self.session().await?.map(|session| session.user_id))
    }

    /// Last fetched profile.
    pub async fn profile(&self) -> Result<Option<UserProfile>> {
        self.settings
            .get(PROFILE_KEY)
            .await?
            .map(|raw| serde_json::from_str(&raw).map_err(Error::from))
            .transpose()
    }

    /// Refresh the signed-in user's profile when stale.
    pub async fn refresh_profile(&self, force: bool) -> Result<RefreshOutcome> {
        let session = self
            .session()
            .await?
            .ok_or_else(|| Error::InvalidInput("Not signed in".into()))?;
        let Some(pending) = begin_refresh(&self.coordinator, Feature::User, force).await? else {
            return Ok(RefreshOutcome::Skipped);
        };
        let profile = self.remote.profile(&session.user_id).await?;
        self.settings
            .set(PROFILE_KEY, &serde_json::to_string(&profile)?)
            .await?;
        pending.complete(1).await
    }

    pub async fn notification_settings(&self) -> Result<NotificationSettings> {
        self.settings.notification_settings().await
    }

    pub async fn save_notification_settings(&self, settings: &NotificationSettings) -> Result<()> {
        self.settings.save_notification_settings(settings).await
    }

    /// Sign out. With `clear_data`, also drop everything stored for the
    /// user: favorites, drafts, notes, address history, the user-scoped
    /// caches and every sync checkpoint.
    ///
    /// Runs as one transaction; a failure leaves the user signed in. An
    /// expired session still identifies whose data to clear.
    pub async fn logout(&self, clear_data: bool) -> Result<()> {
        let user_id = self.stored_session().await?.map(|session| session.user_id);
        let checkpoint_keys: Vec<String> = Feature::ALL
            .into_iter()
            .flat_map(|feature| [feature.time_key(), feature.lat_key(), feature.lng_key()])
            .collect();

        let tables: &[Table] = if clear_data {
            &[
                Table::Settings,
                Table::Favorites,
                Table::TicketDrafts,
                Table::AppointmentNotes,
                Table::AddressHistory,
                Table::Tickets,
                Table::Appointments,
            ]
        } else {
            &[Table::Settings]
        };

        self.db
            .run_in_transaction(tables, |tx| {
                for key in [SESSION_KEY, PROFILE_KEY] {
                    tx.execute("DELETE FROM settings WHERE key = ?", [key])?;
                }
                if !clear_data {
                    return Ok(());
                }
                for key in &checkpoint_keys {
                    tx.execute("DELETE FROM settings WHERE key = ?", [key])?;
                }
                if let Some(user_id) = &user_id {
                    for table in ["favorites", "ticket_drafts", "appointment_notes", "address_history"] {
                        tx.execute(
                            &format!("DELETE FROM {table} WHERE user_id = ?"),
                            params![user_id],
                        )?;
                    }
                }
                tx.execute("DELETE FROM tickets", [])?;
                tx.execute("DELETE FROM appointments", [])?;
                Ok(())
            })
            .await?;

        tracing::info!(clear_data, "Signed out");
        Ok(())
    }
}
