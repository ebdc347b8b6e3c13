//! Address lookup and the per-user address history.

use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::clock::Clock;
use crate::db::{live_query, Database, LiveQuery, Table};
use crate::error::{Error, Result};
use crate::geo::{BoundingBox, Location};
use crate::models::{AddressEntry, AddressKind, AddressSuggestion};
use crate::remote::AddressSource;
use crate::util::normalize_text_option;

const ENTRY_COLUMNS: &str = "id, user_id, label, latitude, longitude, kind, last_used_at";

/// Search goes straight to the remote geocoder; history is local only.
#[derive(Clone)]
pub struct AddressRepository {
    db: Database,
    remote: Arc<dyn AddressSource>,
    clock: Arc<dyn Clock>,
}

impl AddressRepository {
    pub fn new(db: Database, remote: Arc<dyn AddressSource>, clock: Arc<dyn Clock>) -> Self {
        Self { db, remote, clock }
    }

    /// Geocode `query`, optionally restricted to `bbox`. Blank queries
    /// return nothing without a request.
    pub async fn search(&self, query: &str, bbox: Option<BoundingBox>) -> Result<Vec<AddressSuggestion>> {
        let Some(query) = normalize_text_option(Some(query.to_string())) else {
            return Ok(Vec::new());
        };
        Ok(self.remote.search(&query, bbox).await?)
    }

    pub async fn reverse(&self, location: Location) -> Result<Option<AddressSuggestion>> {
        Ok(self.remote.reverse(location).await?)
    }

    /// Remember a used address, bumping it to the top of the history.
    pub async fn record(&self, user_id: &str, suggestion: &AddressSuggestion) -> Result<AddressEntry> {
        let label = required_label(&suggestion.label)?;
        let location = suggestion.location();
        let now = self.clock.now_millis();
        self.db
            .run_in_transaction(&[Table::AddressHistory], |tx| {
                tx.execute(
                    "INSERT INTO address_history (user_id, label, latitude, longitude, last_used_at)
                     VALUES (?, ?, ?, ?, ?)
                     ON CONFLICT(user_id, label) DO UPDATE SET
                        latitude = excluded.latitude,
                        longitude = excluded.longitude,
                        last_used_at = excluded.last_used_at",
                    params![user_id, label, location.latitude, location.longitude, now],
                )?;
                select_by_label(tx, user_id, &label)
            })
            .await
    }

    /// Mark an address as the user's home.
    ///
    /// The previous home is demoted to a plain entry in the same
    /// transaction, so a user never has two.
    pub async fn set_home(&self, user_id: &str, label: &str, location: Location) -> Result<AddressEntry> {
        let label = required_label(label)?;
        let now = self.clock.now_millis();
        let entry = self
            .db
            .run_in_transaction(&[Table::AddressHistory], |tx| {
                tx.execute(
                    "UPDATE address_history SET kind = NULL WHERE user_id = ? AND kind = ?",
                    params![user_id, AddressKind::Home.as_str()],
                )?;
                tx.execute(
                    "INSERT INTO address_history
                     (user_id, label, latitude, longitude, kind, last_used_at)
                     VALUES (?, ?, ?, ?, ?, ?)
                     ON CONFLICT(user_id, label) DO UPDATE SET
                        latitude = excluded.latitude,
                        longitude = excluded.longitude,
                        kind = excluded.kind,
                        last_used_at = excluded.last_used_at",
                    params![
                        user_id,
                        label,
                        location.latitude,
                        location.longitude,
                        AddressKind::Home.as_str(),
                        now
                    ],
                )?;
                select_by_label(tx, user_id, &label)
            })
            .await?;
        tracing::debug!(id = entry.id, "Home address updated");
        Ok(entry)
    }

    pub async fn home(&self, user_id: &str) -> Result<Option<AddressEntry>> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM address_history WHERE user_id = ? AND kind = ?");
        self.db
            .read(|conn| {
                conn.query_row(&sql, params![user_id, AddressKind::Home.as_str()], entry_from_row)
                    .optional()?
                    .transpose()
            })
            .await
    }

    /// Live history: home first, then most recently used.
    pub fn history(&self, user_id: impl Into<String>) -> LiveQuery<AddressEntry> {
        let user_id = user_id.into();
        live_query(self.db.clone(), vec![Table::AddressHistory], move |conn| {
            select_history(conn, &user_id)
        })
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        self.db
            .run_in_transaction(&[Table::AddressHistory], |tx| {
                Ok(tx.execute("DELETE FROM address_history WHERE id = ?", [id])? > 0)
            })
            .await
    }
}

fn required_label(label: &str) -> Result<String> {
    normalize_text_option(Some(label.to_string()))
        .ok_or_else(|| Error::InvalidInput("Address label cannot be empty".into()))
}

fn select_by_label(conn: &Connection, user_id: &str, label: &str) -> Result<AddressEntry> {
    let sql = format!("SELECT {ENTRY_COLUMNS} FROM address_history WHERE user_id = ? AND label = ?");
    conn.query_row(&sql, params![user_id, label], entry_from_row)?
}

fn select_history(conn: &Connection, user_id: &str) -> Result<Vec<AddressEntry>> {
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM address_history WHERE user_id = ?
         ORDER BY kind IS NULL, last_used_at DESC, id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([user_id], entry_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().collect()
}

/// Outer result is the row read; inner result is decoding the kind.
fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<Result<AddressEntry>> {
    let kind: Option<String> = row.get(5)?;
    let entry = AddressEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        label: row.get(2)?,
        location: Location::new(row.get(3)?, row.get(4)?),
        kind: None,
        last_used_at: row.get(6)?,
    };
    Ok(match kind.as_deref() {
        None => Ok(entry),
        Some(raw) => AddressKind::parse(raw)
            .map(|kind| AddressEntry {
                kind: Some(kind),
                ..entry
            })
            .ok_or_else(|| Error::InvalidInput(format!("unknown address kind {raw}"))),
    })
}
