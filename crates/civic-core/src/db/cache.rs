//! Generic mirror of a remote collection.

use std::marker::PhantomData;

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::connection::{Database, Table};
use super::live::{live_query, LiveQuery};
use crate::error::{Error, Result};

/// A remote entity that can be mirrored in a local cache table.
///
/// Rows are stored as JSON payloads; the accessor methods fill the indexed
/// columns the cache queries on.
pub trait CachedEntity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: Table;

    /// Remote numeric identifier
    fn id(&self) -> i64;

    /// Human-readable title used in notifications
    fn title(&self) -> &str;

    /// Owning user, for user-scoped queries
    fn owner_id(&self) -> Option<&str> {
        None
    }

    /// Server-side status used for change detection
    fn status(&self) -> Option<&str> {
        None
    }

    /// Ordering key; rows are listed highest first
    fn sort_key(&self) -> i64 {
        0
    }
}

/// Typed access to the cache table of `T`.
pub struct EntityCache<T> {
    db: Database,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for EntityCache<T> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: CachedEntity> EntityCache<T> {
    pub const fn new(db: Database) -> Self {
        Self {
            db,
            _entity: PhantomData,
        }
    }

    pub const fn database(&self) -> &Database {
        &self.db
    }

    /// All cached rows, highest sort key first
    pub async fn all(&self) -> Result<Vec<T>> {
        self.db.read(select_all::<T>).await
    }

    pub async fn get(&self, id: i64) -> Result<Option<T>> {
        self.db.read(|conn| select_one::<T>(conn, id)).await
    }

    pub async fn by_owner(&self, owner_id: &str) -> Result<Vec<T>> {
        self.db.read(|conn| select_by_owner::<T>(conn, owner_id)).await
    }

    /// Cached status of one row; `None` when the row is absent
    pub async fn status_of(&self, id: i64) -> Result<Option<String>> {
        let sql = format!("SELECT status FROM {} WHERE id = ?", T::TABLE.name());
        self.db
            .read(|conn| {
                Ok(conn
                    .query_row(&sql, [id], |row| row.get::<_, Option<String>>(0))
                    .optional()?
                    .flatten())
            })
            .await
    }

    /// Clear the table and insert `items` in one transaction.
    ///
    /// Readers observe either the old set or the new one, never a partially
    /// cleared table.
    pub async fn replace_all(&self, items: &[T]) -> Result<()> {
        self.db
            .run_in_transaction(&[T::TABLE], |tx| {
                tx.execute(&format!("DELETE FROM {}", T::TABLE.name()), [])?;
                for item in items {
                    upsert_row(tx, item)?;
                }
                Ok(())
            })
            .await?;
        tracing::debug!("Replaced {} cache with {} rows", T::TABLE.name(), items.len());
        Ok(())
    }

    pub async fn upsert(&self, item: &T) -> Result<()> {
        self.db
            .run_in_transaction(&[T::TABLE], |tx| upsert_row(tx, item))
            .await
    }

    pub async fn upsert_many(&self, items: &[T]) -> Result<()> {
        self.db
            .run_in_transaction(&[T::TABLE], |tx| {
                items.iter().try_for_each(|item| upsert_row(tx, item))
            })
            .await
    }

    /// Delete one row; returns whether it existed
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE id = ?", T::TABLE.name());
        self.db
            .run_in_transaction(&[T::TABLE], |tx| Ok(tx.execute(&sql, [id])? > 0))
            .await
    }

    pub async fn clear(&self) -> Result<()> {
        let sql = format!("DELETE FROM {}", T::TABLE.name());
        self.db
            .run_in_transaction(&[T::TABLE], |tx| {
                tx.execute(&sql, [])?;
                Ok(())
            })
            .await
    }

    /// Live view of the whole table
    pub fn watch_all(&self) -> LiveQuery<T> {
        live_query(self.db.clone(), vec![T::TABLE], select_all::<T>)
    }

    /// Live view of the rows owned by `owner_id`
    pub fn watch_owner(&self, owner_id: impl Into<String>) -> LiveQuery<T> {
        let owner_id = owner_id.into();
        live_query(self.db.clone(), vec![T::TABLE], move |conn| {
            select_by_owner::<T>(conn, &owner_id)
        })
    }
}

/// Insert or replace one row; usable inside a larger transaction.
pub(crate) fn upsert_row<T: CachedEntity>(conn: &Connection, item: &T) -> Result<()> {
    let payload = serde_json::to_string(item)?;
    conn.execute(
        &format!(
            "INSERT INTO {} (id, owner_id, status, sort_key, payload) VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                owner_id = excluded.owner_id,
                status = excluded.status,
                sort_key = excluded.sort_key,
                payload = excluded.payload",
            T::TABLE.name()
        ),
        params![
            item.id(),
            item.owner_id(),
            item.status(),
            item.sort_key(),
            payload
        ],
    )?;
    Ok(())
}

pub(crate) fn select_all<T: CachedEntity>(conn: &Connection) -> Result<Vec<T>> {
    let sql = format!(
        "SELECT payload FROM {} ORDER BY sort_key DESC, id ASC",
        T::TABLE.name()
    );
    collect_payloads(conn, &sql, [])
}

pub(crate) fn select_one<T: CachedEntity>(conn: &Connection, id: i64) -> Result<Option<T>> {
    let sql = format!("SELECT payload FROM {} WHERE id = ?", T::TABLE.name());
    let payload: Option<String> = conn
        .query_row(&sql, [id], |row| row.get(0))
        .optional()?;
    payload
        .map(|payload| serde_json::from_str(&payload).map_err(Error::from))
        .transpose()
}

pub(crate) fn select_by_owner<T: CachedEntity>(conn: &Connection, owner_id: &str) -> Result<Vec<T>> {
    let sql = format!(
        "SELECT payload FROM {} WHERE owner_id = ? ORDER BY sort_key DESC, id ASC",
        T::TABLE.name()
    );
    collect_payloads(conn, &sql, [owner_id])
}

fn collect_payloads<T: CachedEntity>(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let payloads = stmt
        .query_map(params, |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    payloads
        .iter()
        .map(|payload| serde_json::from_str(payload).map_err(Error::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Info, Ticket};
    use crate::test_support::{info, ticket};
    use futures::StreamExt;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn setup() -> EntityCache<Ticket> {
        EntityCache::new(Database::open_in_memory().unwrap())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_replace_all_drops_missing_rows() {
        let cache = setup();
        cache
            .replace_all(&[ticket(1, "OPEN"), ticket(2, "OPEN")])
            .await
            .unwrap();
        cache.replace_all(&[ticket(3, "DONE")]).await.unwrap();

        let ids: Vec<i64> = cache.all().await.unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![3]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upsert_updates_single_row() {
        let cache = setup();
        cache
            .replace_all(&[ticket(1, "OPEN"), ticket(2, "OPEN")])
            .await
            .unwrap();
        cache.upsert(&ticket(2, "DONE")).await.unwrap();

        assert_eq!(cache.status_of(1).await.unwrap().as_deref(), Some("OPEN"));
        assert_eq!(cache.status_of(2).await.unwrap().as_deref(), Some("DONE"));
        assert_eq!(cache.status_of(9).await.unwrap(), None);
        assert_eq!(cache.all().await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_by_owner_filters_rows() {
        let cache = setup();
        let mut mine = ticket(1, "OPEN");
        mine.created_by = Some("alice".into());
        cache.replace_all(&[mine.clone(), ticket(2, "OPEN")]).await.unwrap();

        assert_eq!(cache.by_owner("alice").await.unwrap(), vec![mine]);
        assert!(cache.by_owner("bob").await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_rows_sorted_by_sort_key_desc() {
        let cache: EntityCache<Info> = EntityCache::new(Database::open_in_memory().unwrap());
        let mut old = info(1, "ACTIVE");
        old.published_at = 10;
        let mut new = info(2, "ACTIVE");
        new.published_at = 20;
        cache.replace_all(&[old, new]).await.unwrap();

        let ids: Vec<i64> = cache.all().await.unwrap().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_reader_never_sees_empty_table() {
        let cache = setup();
        let first: Vec<Ticket> = (1..=50).map(|id| ticket(id, "OPEN")).collect();
        let second: Vec<Ticket> = (100..=180).map(|id| ticket(id, "OPEN")).collect();
        cache.replace_all(&first).await.unwrap();

        let writer = {
            let cache = cache.clone();
            tokio::spawn(async move {
                for round in 0..20 {
                    let set = if round % 2 == 0 { &second } else { &first };
                    cache.replace_all(set).await.unwrap();
                }
            })
        };

        while !writer.is_finished() {
            let count = cache.all().await.unwrap().len();
            assert!(count == 50 || count == 81, "observed {count} rows");
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_watch_all_reemits_after_write() {
        let cache = setup();
        let mut live = cache.watch_all();

        let initial = live.next().await.unwrap();
        assert!(initial.is_empty());

        cache.replace_all(&[ticket(1, "OPEN")]).await.unwrap();
        let updated = tokio::time::timeout(Duration::from_secs(2), live.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.len(), 1);
    }
}
