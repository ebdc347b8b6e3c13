//! Database connection management

use std::path::Path;
use std::sync::Arc;

use rusqlite::{Connection, Transaction};
use tokio::sync::{broadcast, Mutex};

use super::migrations;
use crate::error::Result;

/// Capacity of the change feed before slow subscribers start lagging
const CHANGE_FEED_CAPACITY: usize = 256;

/// Tables that publish change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Settings,
    Offices,
    Infos,
    Tickets,
    Appointments,
    Favorites,
    TicketDrafts,
    AppointmentNotes,
    AddressHistory,
}

impl Table {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Settings => "settings",
            Self::Offices => "offices",
            Self::Infos => "infos",
            Self::Tickets => "tickets",
            Self::Appointments => "appointments",
            Self::Favorites => "favorites",
            Self::TicketDrafts => "ticket_drafts",
            Self::AppointmentNotes => "appointment_notes",
            Self::AddressHistory => "address_history",
        }
    }
}

struct Inner {
    conn: Mutex<Connection>,
    changes: broadcast::Sender<Table>,
}

/// Shared handle to the local `SQLite` store.
///
/// One connection serialized behind an async mutex: every read and every
/// transaction sees a consistent state, and writers notify live queries
/// only after commit.
#[derive(Clone)]
pub struct Database {
    inner: Arc<Inner>,
}

impl Database {
    /// Open a database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        configure(&conn)?;
        migrations::run(&mut conn)?;
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Ok(Self {
            inner: Arc::new(Inner {
                conn: Mutex::new(conn),
                changes,
            }),
        })
    }

    /// Run a read-only closure against the connection.
    pub async fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.inner.conn.lock().await;
        f(&conn)
    }

    /// Run `f` inside a transaction and notify watchers of `tables` after commit.
    ///
    /// If `f` fails the transaction is rolled back and nothing is published.
    pub async fn run_in_transaction<T>(
        &self,
        tables: &[Table],
        f: impl FnOnce(&Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let value = {
            let mut conn = self.inner.conn.lock().await;
            let tx = conn.transaction()?;
            let value = f(&tx)?;
            tx.commit()?;
            value
        };
        for table in tables {
            // No subscribers is fine.
            let _ = self.inner.changes.send(*table);
        }
        Ok(value)
    }

    /// Subscribe to committed table changes.
    pub fn subscribe(&self) -> broadcast::Receiver<Table> {
        self.inner.changes.subscribe()
    }
}

/// Configure `SQLite` for a single-writer mobile workload
fn configure(conn: &Connection) -> Result<()> {
    // In-memory databases reject WAL; that is fine.
    conn.pragma_update(None, "journal_mode", "WAL").ok();
    conn.pragma_update(None, "synchronous", "NORMAL").ok();
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    fn count_offices(conn: &Connection) -> Result<i64> {
        Ok(conn.query_row("SELECT COUNT(*) FROM offices", [], |row| row.get(0))?)
    }

    #[test]
    fn test_open_in_memory() {
        assert!(Database::open_in_memory().is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_file_creates_parent_dirs() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("civic.db");
        let db = Database::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(db.read(count_offices).await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_transaction_rolls_back_and_stays_silent() {
        let db = Database::open_in_memory().unwrap();
        let mut changes = db.subscribe();

        let result: Result<()> = db
            .run_in_transaction(&[Table::Offices], |tx| {
                tx.execute(
                    "INSERT INTO offices (id, payload) VALUES (1, '{}')",
                    [],
                )?;
                Err(crate::Error::InvalidInput("abort".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(db.read(count_offices).await.unwrap(), 0);
        assert!(changes.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_reader_never_sees_mid_transaction_state() {
        let db = Database::open_in_memory().unwrap();
        db.run_in_transaction(&[Table::Offices], |tx| {
            tx.execute("INSERT INTO offices (id, payload) VALUES (1, '{}')", [])?;
            Ok(())
        })
        .await
        .unwrap();

        let writer = {
            let db = db.clone();
            tokio::spawn(async move {
                db.run_in_transaction(&[Table::Offices], |tx| {
                    tx.execute("DELETE FROM offices", [])?;
                    // Simulated slow write between clear and insert.
                    std::thread::sleep(Duration::from_millis(100));
                    tx.execute("INSERT INTO offices (id, payload) VALUES (2, '{}')", [])?;
                    Ok(())
                })
                .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        let seen = db.read(count_offices).await.unwrap();
        assert_eq!(seen, 1);

        writer.await.unwrap().unwrap();
        assert_eq!(db.read(count_offices).await.unwrap(), 1);
    }
}
