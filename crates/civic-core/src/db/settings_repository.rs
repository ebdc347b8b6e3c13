//! Key-value settings store

use rusqlite::{params, Connection, OptionalExtension};

use super::connection::{Database, Table};
use crate::error::Result;
use crate::models::NotificationSettings;

const NOTIFICATIONS_ENABLED: &str = "notifications_enabled";
const NOTIFY_TICKETS: &str = "notify_tickets";
const NOTIFY_INFOS: &str = "notify_infos";
const NOTIFY_APPOINTMENT_REMINDERS: &str = "notify_appointment_reminders";

/// Key-value primitives over the `settings` table.
#[derive(Clone)]
pub struct SettingsStore {
    db: Database,
}

impl SettingsStore {
    /// Create a new store on the given database
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        self.db.read(|conn| get_value(conn, key)).await
    }

    /// Read several keys under one lock, preserving order.
    pub async fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>> {
        self.db
            .read(|conn| keys.iter().map(|key| get_value(conn, key)).collect())
            .await
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_many(&[(key, value)]).await
    }

    /// Write several keys atomically.
    pub async fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        self.replace(entries, &[]).await
    }

    /// Write `entries` and remove `stale` keys in one transaction.
    pub async fn replace(&self, entries: &[(&str, &str)], stale: &[&str]) -> Result<()> {
        self.db
            .run_in_transaction(&[Table::Settings], |tx| {
                for (key, value) in entries {
                    tx.execute(
                        "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
                        params![key, value],
                    )?;
                }
                for key in stale {
                    tx.execute("DELETE FROM settings WHERE key = ?", [key])?;
                }
                Ok(())
            })
            .await
    }

    /// Remove keys atomically.
    pub async fn remove(&self, keys: &[&str]) -> Result<()> {
        self.replace(&[], keys).await
    }

    /// Load notification settings, falling back to defaults per key
    pub async fn notification_settings(&self) -> Result<NotificationSettings> {
        let values = self
            .get_many(&[
                NOTIFICATIONS_ENABLED,
                NOTIFY_TICKETS,
                NOTIFY_INFOS,
                NOTIFY_APPOINTMENT_REMINDERS,
            ])
            .await?;
        let defaults = NotificationSettings::default();
        let flag = |index: usize, default: bool| {
            values[index].as_deref().map_or(default, parse_flag)
        };

        Ok(NotificationSettings {
            enabled: flag(0, defaults.enabled),
            tickets: flag(1, defaults.tickets),
            infos: flag(2, defaults.infos),
            appointment_reminders: flag(3, defaults.appointment_reminders),
        })
    }

    /// Save notification settings
    pub async fn save_notification_settings(&self, settings: &NotificationSettings) -> Result<()> {
        self.set_many(&[
            (NOTIFICATIONS_ENABLED, bool_str(settings.enabled)),
            (NOTIFY_TICKETS, bool_str(settings.tickets)),
            (NOTIFY_INFOS, bool_str(settings.infos)),
            (
                NOTIFY_APPOINTMENT_REMINDERS,
                bool_str(settings.appointment_reminders),
            ),
        ])
        .await
    }
}

fn get_value(conn: &Connection, key: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row("SELECT value FROM settings WHERE key = ?", [key], |row| {
            row.get(0)
        })
        .optional()?)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

const fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}
