//! Local favorite marks and favorite-joined cache reads.

use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension};

use crate::clock::Clock;
use crate::db::{live_query, CachedEntity, Database, LiveQuery, Table};
use crate::error::{Error, Result};
use crate::models::{FavoriteMark, FavoriteType, Favorited};

/// Favorites live in their own table keyed by `(user, item, type)`, so they
/// survive replace-all refreshes of the caches they annotate.
#[derive(Clone)]
pub struct FavoriteRepository {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl FavoriteRepository {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Flip the mark; returns whether the item is now a favorite.
    pub async fn toggle(&self, user_id: &str, item_id: i64, item_type: FavoriteType) -> Result<bool> {
        let now = self.clock.now_millis();
        let favorite = self
            .db
            .run_in_transaction(&[Table::Favorites], |tx| {
                let removed = tx.execute(
                    "DELETE FROM favorites WHERE user_id = ? AND item_id = ? AND item_type = ?",
                    params![user_id, item_id, item_type.as_str()],
                )?;
                if removed > 0 {
                    return Ok(false);
                }
                tx.execute(
                    "INSERT INTO favorites (user_id, item_id, item_type, created_at)
                     VALUES (?, ?, ?, ?)",
                    params![user_id, item_id, item_type.as_str(), now],
                )?;
                Ok(true)
            })
            .await?;
        tracing::debug!(item_id, item_type = item_type.as_str(), favorite, "Toggled favorite");
        Ok(favorite)
    }

    pub async fn is_favorite(&self, user_id: &str, item_id: i64, item_type: FavoriteType) -> Result<bool> {
        self.db
            .read(|conn| {
                Ok(conn
                    .query_row(
                        "SELECT 1 FROM favorites WHERE user_id = ? AND item_id = ? AND item_type = ?",
                        params![user_id, item_id, item_type.as_str()],
                        |_| Ok(()),
                    )
                    .optional()?
                    .is_some())
            })
            .await
    }

    /// Favorited item ids, whether or not the item is cached.
    pub async fn ids(&self, user_id: &str, item_type: FavoriteType) -> Result<Vec<i64>> {
        self.db
            .read(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT item_id FROM favorites WHERE user_id = ? AND item_type = ?
                     ORDER BY created_at DESC",
                )?;
                let ids = stmt
                    .query_map(params![user_id, item_type.as_str()], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<i64>>>()?;
                Ok(ids)
            })
            .await
    }

    /// Live list of the user's marks of one type, newest first.
    pub fn watch(&self, user_id: impl Into<String>, item_type: FavoriteType) -> LiveQuery<FavoriteMark> {
        let user_id = user_id.into();
        live_query(self.db.clone(), vec![Table::Favorites], move |conn| {
            select_marks(conn, &user_id, item_type)
        })
    }

    /// Delete every mark of the user.
    pub async fn clear(&self, user_id: &str) -> Result<usize> {
        self.db
            .run_in_transaction(&[Table::Favorites], |tx| {
                Ok(tx.execute("DELETE FROM favorites WHERE user_id = ?", [user_id])?)
            })
            .await
    }
}

fn select_marks(conn: &Connection, user_id: &str, item_type: FavoriteType) -> Result<Vec<FavoriteMark>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, item_id, item_type, created_at FROM favorites
         WHERE user_id = ? AND item_type = ? ORDER BY created_at DESC, item_id ASC",
    )?;
    let rows = stmt
        .query_map(params![user_id, item_type.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(|(user_id, item_id, item_type, created_at)| {
            let item_type = FavoriteType::parse(&item_type)
                .ok_or_else(|| Error::InvalidInput(format!("unknown favorite type {item_type}")))?;
            Ok(FavoriteMark {
                user_id,
                item_id,
                item_type,
                created_at,
            })
        })
        .collect()
}

/// Cached rows of `T` with the user's favorite flag, in cache order.
pub(crate) fn select_favorited<T: CachedEntity>(
    conn: &Connection,
    user_id: &str,
    item_type: FavoriteType,
    favorites_only: bool,
) -> Result<Vec<Favorited<T>>> {
    let sql = format!(
        "SELECT c.payload, f.item_id IS NOT NULL FROM {table} c
         LEFT JOIN favorites f ON f.item_id = c.id AND f.user_id = ?1 AND f.item_type = ?2
         {filter}
         ORDER BY c.sort_key DESC, c.id ASC",
        table = T::TABLE.name(),
        filter = if favorites_only { "WHERE f.item_id IS NOT NULL" } else { "" },
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![user_id, item_type.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(|(payload, is_favorite)| {
            Ok(Favorited {
                item: serde_json::from_str(&payload)?,
                is_favorite,
            })
        })
        .collect()
}

/// Live favorite-joined view of the cache of `T`.
pub(crate) fn watch_favorited<T: CachedEntity>(
    db: &Database,
    user_id: impl Into<String>,
    item_type: FavoriteType,
    favorites_only: bool,
) -> LiveQuery<Favorited<T>> {
    let user_id = user_id.into();
    live_query(db.clone(), vec![T::TABLE, Table::Favorites], move |conn| {
        select_favorited::<T>(conn, &user_id, item_type, favorites_only)
    })
}
