//! Live queries over the local store.

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use rusqlite::Connection;
use tokio::sync::broadcast::error::RecvError;

use super::connection::{Database, Table};
use crate::error::Result;

/// A restartable stream of query snapshots.
///
/// Emits the current result immediately, then again after every committed
/// write to one of the watched tables. Query failures are logged and the
/// stream waits for the next change instead of ending.
pub type LiveQuery<T> = BoxStream<'static, Vec<T>>;

pub(crate) fn live_query<T, F>(db: Database, tables: Vec<Table>, query: F) -> LiveQuery<T>
where
    T: Send + 'static,
    F: Fn(&Connection) -> Result<Vec<T>> + Send + Sync + 'static,
{
    // Subscribe before the first snapshot so no write can slip in between.
    let state = LiveState {
        changes: db.subscribe(),
        db,
        tables,
        query: Arc::new(query),
        primed: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.primed && !state.wait_for_change().await {
                return None;
            }
            state.primed = true;

            let query = Arc::clone(&state.query);
            match state.db.read(|conn| query(conn)).await {
                Ok(rows) => return Some((rows, state)),
                Err(error) => {
                    tracing::warn!("Live query on {:?} failed: {error}", state.tables);
                }
            }
        }
    })
    .boxed()
}

struct LiveState<F> {
    db: Database,
    changes: tokio::sync::broadcast::Receiver<Table>,
    tables: Vec<Table>,
    query: Arc<F>,
    primed: bool,
}

impl<F> LiveState<F> {
    /// Wait for a change to a watched table; `false` once the feed is gone.
    async fn wait_for_change(&mut self) -> bool {
        loop {
            match self.changes.recv().await {
                Ok(table) if self.tables.contains(&table) => return true,
                Ok(_) => {}
                // Missed notifications may include ours; re-query.
                Err(RecvError::Lagged(_)) => return true,
                Err(RecvError::Closed) => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn count_favorites(conn: &Connection) -> Result<Vec<i64>> {
        let count = conn.query_row("SELECT COUNT(*) FROM favorites", [], |row| row.get(0))?;
        Ok(vec![count])
    }

    async fn insert_favorite(db: &Database, table: Table, item_id: i64) {
        db.run_in_transaction(&[table], |tx| {
            tx.execute(
                "INSERT INTO favorites (user_id, item_id, item_type, created_at) VALUES ('u', ?, 'OFFICE', 0)",
                [item_id],
            )?;
            Ok(())
        })
        .await
        .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_emits_initial_snapshot_then_changes() {
        let db = Database::open_in_memory().unwrap();
        let mut live = live_query(db.clone(), vec![Table::Favorites], count_favorites);

        assert_eq!(live.next().await, Some(vec![0]));

        insert_favorite(&db, Table::Favorites, 1).await;
        let next = tokio::time::timeout(Duration::from_secs(2), live.next())
            .await
            .unwrap();
        assert_eq!(next, Some(vec![1]));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_ignores_unrelated_tables() {
        let db = Database::open_in_memory().unwrap();
        let mut live = live_query(db.clone(), vec![Table::Favorites], count_favorites);
        assert_eq!(live.next().await, Some(vec![0]));

        // Published as an office change, so the favorites view stays quiet.
        insert_favorite(&db, Table::Offices, 1).await;
        let next = tokio::time::timeout(Duration::from_millis(100), live.next()).await;
        assert!(next.is_err());
    }
}
