//! Ticket drafts and their promotion to server tickets.
//!
//! A draft lives only on this device, under a local id that never collides
//! with server ids. Promotion submits it, attaches its staged images and
//! swaps the draft row for the created ticket in one transaction. A failed
//! submission leaves the draft as it was.
//!
//! The server id is written onto the draft as soon as the ticket exists, so
//! a promotion interrupted after that point resumes instead of submitting
//! the ticket twice.

use std::path::Path;
use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::db::{live_query, upsert_row, Database, LiveQuery, Table};
use crate::error::{Error, LocalError, MediaError, Outcome, Result, SecondaryFailure};
use crate::geo::Location;
use crate::models::{DraftInput, Ticket, TicketDraft};
use crate::remote::{ImageUpload, TicketSource};

const DRAFT_COLUMNS: &str = "local_id, user_id, title, description, category, latitude, longitude,
     address, image_paths, created_at, updated_at";

#[derive(Clone)]
pub struct DraftManager {
    db: Database,
    remote: Arc<dyn TicketSource>,
    clock: Arc<dyn Clock>,
    promoting: Arc<Mutex<()>>,
}

impl DraftManager {
    pub fn new(db: Database, remote: Arc<dyn TicketSource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            remote,
            clock,
            promoting: Arc::new(Mutex::new(())),
        }
    }

    pub async fn create(&self, user_id: &str, input: DraftInput) -> Result<TicketDraft> {
        let now = self.clock.now_millis();
        let image_paths = serde_json::to_string(&input.image_paths)?;
        let local_id = self
            .db
            .run_in_transaction(&[Table::TicketDrafts], |tx| {
                tx.execute(
                    "INSERT INTO ticket_drafts
                     (user_id, title, description, category, latitude, longitude, address,
                      image_paths, created_at, updated_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    params![
                        user_id,
                        input.title,
                        input.description,
                        input.category,
                        input.location.map(|l| l.latitude),
                        input.location.map(|l| l.longitude),
                        input.address,
                        image_paths,
                        now,
                        now
                    ],
                )?;
                Ok(tx.last_insert_rowid())
            })
            .await?;
        tracing::debug!(local_id, "Created ticket draft");

        Ok(TicketDraft {
            local_id,
            user_id: user_id.to_string(),
            title: input.title,
            description: input.description,
            category: input.category,
            location: input.location,
            address: input.address,
            image_paths: input.image_paths,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace the editable fields of a draft.
    pub async fn update(&self, local_id: i64, input: DraftInput) -> Result<TicketDraft> {
        let now = self.clock.now_millis();
        let image_paths = serde_json::to_string(&input.image_paths)?;
        self.db
            .run_in_transaction(&[Table::TicketDrafts], |tx| {
                let changed = tx.execute(
                    "UPDATE ticket_drafts SET title = ?, description = ?, category = ?,
                     latitude = ?, longitude = ?, address = ?, image_paths = ?, updated_at = ?
                     WHERE local_id = ?",
                    params![
                        input.title,
                        input.description,
                        input.category,
                        input.location.map(|l| l.latitude),
                        input.location.map(|l| l.longitude),
                        input.address,
                        image_paths,
                        now,
                        local_id
                    ],
                )?;
                if changed == 0 {
                    return Err(Error::NotFound(format!("draft {local_id}")));
                }
                select_draft(tx, local_id)?
                    .ok_or_else(|| Error::NotFound(format!("draft {local_id}")))
            })
            .await
    }

    /// Returns whether the draft existed.
    pub async fn delete(&self, local_id: i64) -> Result<bool> {
        self.db
            .run_in_transaction(&[Table::TicketDrafts], |tx| {
                Ok(tx.execute("DELETE FROM ticket_drafts WHERE local_id = ?", [local_id])? > 0)
            })
            .await
    }

    pub async fn get(&self, local_id: i64) -> Result<Option<TicketDraft>> {
        self.db.read(|conn| select_draft(conn, local_id)).await
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<TicketDraft>> {
        self.db.read(|conn| select_drafts(conn, user_id)).await
    }

    /// Live list of the user's drafts, most recently edited first.
    pub fn drafts(&self, user_id: impl Into<String>) -> LiveQuery<TicketDraft> {
        let user_id = user_id.into();
        live_query(self.db.clone(), vec![Table::TicketDrafts], move |conn| {
            select_drafts(conn, &user_id)
        })
    }

    /// Submit a draft as a new ticket.
    ///
    /// On success the draft row is gone and the created ticket is cached
    /// under its server id. Image uploads are best effort: failures are
    /// reported as [`SecondaryFailure::MediaAttachFailed`] while the
    /// promotion stands. If the create call fails nothing changes locally.
    ///
    /// Once the server has the ticket the promotion is never reported as an
    /// error. A failed local swap comes back as
    /// [`SecondaryFailure::LocalSaveFailed`] with the draft kept; promoting
    /// it again fetches the existing ticket instead of creating another.
    pub async fn promote(&self, local_id: i64) -> Result<Outcome<Ticket>> {
        let _promoting = self.promoting.lock().await;
        let draft = self
            .get(local_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("draft {local_id}")))?;
        let request = draft.to_new_ticket()?;
        let remote_id = self.db.read(|conn| select_remote_id(conn, local_id)).await?;

        let (mut ticket, mut secondary_failure) = match remote_id {
            Some(ticket_id) => {
                tracing::info!(local_id, ticket_id, "Resuming interrupted promotion");
                // Images went up with the first attempt.
                (self.remote.get(ticket_id).await?, None)
            }
            None => {
                let mut ticket = match self.remote.create(&request).await {
                    Ok(ticket) => ticket,
                    Err(error) => {
                        tracing::warn!(local_id, "Draft upload failed, keeping draft: {error}");
                        return Err(error.into());
                    }
                };
                self.record_remote_id(local_id, ticket.id).await;
                let failure = self.attach_images(&mut ticket, &draft.image_paths).await;
                (ticket, failure)
            }
        };
        ticket.created_by.get_or_insert_with(|| draft.user_id.clone());

        let swapped = self
            .db
            .run_in_transaction(&[Table::TicketDrafts, Table::Tickets], |tx| {
                tx.execute("DELETE FROM ticket_drafts WHERE local_id = ?", [local_id])?;
                upsert_row(tx, &ticket)
            })
            .await;
        match swapped {
            Ok(()) => tracing::info!(local_id, ticket_id = ticket.id, "Promoted draft"),
            Err(error) => {
                tracing::error!(
                    local_id,
                    ticket_id = ticket.id,
                    "Ticket created but draft swap failed: {error}"
                );
                let error = match error {
                    Error::Local(error) => error,
                    other => LocalError::Unknown(other.to_string()),
                };
                secondary_failure = Some(SecondaryFailure::LocalSaveFailed(error));
            }
        }

        Ok(Outcome {
            value: ticket,
            secondary_failure,
        })
    }

    /// Best effort; without it a retry after a failed swap submits again.
    async fn record_remote_id(&self, local_id: i64, ticket_id: i64) {
        let recorded = self
            .db
            .run_in_transaction(&[], |tx| {
                tx.execute(
                    "UPDATE ticket_drafts SET remote_id = ? WHERE local_id = ?",
                    params![ticket_id, local_id],
                )?;
                Ok(())
            })
            .await;
        if let Err(error) = recorded {
            tracing::warn!(local_id, ticket_id, "Could not record server id on draft: {error}");
        }
    }

    async fn attach_images(&self, ticket: &mut Ticket, paths: &[String]) -> Option<SecondaryFailure> {
        let mut failed = 0;
        let mut last_error = None;

        for path in paths {
            let uploaded = match read_image(path).await {
                Ok(image) => self
                    .remote
                    .upload_image(ticket.id, &image)
                    .await
                    .map_err(MediaError::from),
                Err(error) => Err(error),
            };
            match uploaded {
                Ok(url) => ticket.image_urls.push(url),
                Err(error) => {
                    tracing::warn!(ticket_id = ticket.id, %path, "Image attach failed: {error}");
                    failed += 1;
                    last_error = Some(error);
                }
            }
        }

        last_error.map(|last_error| SecondaryFailure::MediaAttachFailed {
            failed,
            total: paths.len(),
            last_error,
        })
    }
}

async fn read_image(path: &str) -> std::result::Result<ImageUpload, MediaError> {
    let bytes = tokio::fs::read(path).await.map_err(|error| MediaError::Read {
        path: path.to_string(),
        source: error.into(),
    })?;
    let path = Path::new(path);
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("image")
        .to_string();
    let content_type = match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        _ => "application/octet-stream",
    };
    Ok(ImageUpload {
        file_name,
        content_type: content_type.to_string(),
        bytes,
    })
}

/// Server id of a ticket already created from this draft.
fn select_remote_id(conn: &Connection, local_id: i64) -> Result<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT remote_id FROM ticket_drafts WHERE local_id = ?",
            [local_id],
            |row| row.get::<_, Option<i64>>(0),
        )
        .optional()?
        .flatten())
}

fn select_draft(conn: &Connection, local_id: i64) -> Result<Option<TicketDraft>> {
    let sql = format!("SELECT {DRAFT_COLUMNS} FROM ticket_drafts WHERE local_id = ?");
    let row = conn.query_row(&sql, [local_id], DraftRow::from_row).optional()?;
    row.map(DraftRow::into_draft).transpose()
}

/// The user's drafts, most recently edited first.
pub(crate) fn select_drafts(conn: &Connection, user_id: &str) -> Result<Vec<TicketDraft>> {
    let sql = format!(
        "SELECT {DRAFT_COLUMNS} FROM ticket_drafts WHERE user_id = ?
         ORDER BY updated_at DESC, local_id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([user_id], DraftRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(DraftRow::into_draft).collect()
}

struct DraftRow {
    local_id: i64,
    user_id: String,
    title: String,
    description: String,
    category: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    address: Option<String>,
    image_paths: String,
    created_at: i64,
    updated_at: i64,
}

impl DraftRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            local_id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            category: row.get(4)?,
            latitude: row.get(5)?,
            longitude: row.get(6)?,
            address: row.get(7)?,
            image_paths: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn into_draft(self) -> Result<TicketDraft> {
        let location = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Location::new(latitude, longitude)),
            _ => None,
        };
        Ok(TicketDraft {
            local_id: self.local_id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            category: self.category,
            location,
            address: self.address,
            image_paths: serde_json::from_str(&self.image_paths)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
