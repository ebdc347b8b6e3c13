//! Database migrations

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension};

/// Current schema version
const CURRENT_VERSION: i32 = 4;

/// Run all pending migrations
pub fn run(conn: &mut Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        apply(conn, 1, V1)?;
    }
    if version < 2 {
        apply(conn, 2, V2)?;
    }
    if version < 3 {
        apply(conn, 3, V3)?;
    }
    if version < 4 {
        apply(conn, 4, V4)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i32>>(0)
        })
        .optional()?
        .flatten()
        .unwrap_or(0);

    Ok(version)
}

fn apply(conn: &mut Connection, version: i32, sql: &str) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(sql)?;
    tx.execute("INSERT INTO schema_version (version) VALUES (?)", [version])?;
    tx.commit()?;

    tracing::info!("Migrated database to version {version} (latest {CURRENT_VERSION})");
    Ok(())
}

/// Version 1: key-value settings and the remote entity caches.
///
/// Cache rows keep the remote payload as JSON next to the few columns the
/// generic cache queries on.
const V1: &str = "
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY
    );
    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS offices (
        id INTEGER PRIMARY KEY,
        owner_id TEXT,
        status TEXT,
        sort_key INTEGER NOT NULL DEFAULT 0,
        payload TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS infos (
        id INTEGER PRIMARY KEY,
        owner_id TEXT,
        status TEXT,
        sort_key INTEGER NOT NULL DEFAULT 0,
        payload TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_infos_sort ON infos(sort_key DESC);
    CREATE TABLE IF NOT EXISTS tickets (
        id INTEGER PRIMARY KEY,
        owner_id TEXT,
        status TEXT,
        sort_key INTEGER NOT NULL DEFAULT 0,
        payload TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_tickets_owner ON tickets(owner_id);
    CREATE INDEX IF NOT EXISTS idx_tickets_sort ON tickets(sort_key DESC);
    CREATE TABLE IF NOT EXISTS appointments (
        id INTEGER PRIMARY KEY,
        owner_id TEXT,
        status TEXT,
        sort_key INTEGER NOT NULL DEFAULT 0,
        payload TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_appointments_owner ON appointments(owner_id);
";

/// Version 2: purely local user data (favorites, drafts, notes).
const V2: &str = "
    CREATE TABLE IF NOT EXISTS favorites (
        user_id TEXT NOT NULL,
        item_id INTEGER NOT NULL,
        item_type TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        PRIMARY KEY (user_id, item_id, item_type)
    );
    CREATE INDEX IF NOT EXISTS idx_favorites_type ON favorites(item_type, user_id);
    CREATE TABLE IF NOT EXISTS ticket_drafts (
        local_id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        category TEXT,
        latitude REAL,
        longitude REAL,
        address TEXT,
        image_paths TEXT NOT NULL DEFAULT '[]',
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_ticket_drafts_user ON ticket_drafts(user_id, updated_at DESC);
    CREATE TABLE IF NOT EXISTS appointment_notes (
        appointment_id INTEGER NOT NULL,
        user_id TEXT NOT NULL,
        content TEXT NOT NULL,
        appointment_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        PRIMARY KEY (appointment_id, user_id)
    );
    CREATE INDEX IF NOT EXISTS idx_appointment_notes_date ON appointment_notes(appointment_at);
";

/// Version 3: address history with a single HOME entry per user.
const V3: &str = "
    CREATE TABLE IF NOT EXISTS address_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        label TEXT NOT NULL,
        latitude REAL NOT NULL,
        longitude REAL NOT NULL,
        kind TEXT,
        last_used_at INTEGER NOT NULL,
        UNIQUE (user_id, label)
    );
    CREATE UNIQUE INDEX IF NOT EXISTS idx_address_history_home
        ON address_history(user_id) WHERE kind = 'HOME';
";

/// Version 4: server id of a ticket already created from a draft.
const V4: &str = "
    ALTER TABLE ticket_drafts ADD COLUMN remote_id INTEGER;
";

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
            [name],
            |row| row.get::<_, bool>(0),
        )
        .unwrap()
    }

    #[test]
    fn test_migrations() {
        let mut conn = Connection::open_in_memory().unwrap();
        run(&mut conn).unwrap();

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migrations_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        run(&mut conn).unwrap();
        run(&mut conn).unwrap(); // Should not fail

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_all_tables_created() {
        let mut conn = Connection::open_in_memory().unwrap();
        run(&mut conn).unwrap();

        for table in [
            "settings",
            "offices",
            "infos",
            "tickets",
            "appointments",
            "favorites",
            "ticket_drafts",
            "appointment_notes",
            "address_history",
        ] {
            assert!(table_exists(&conn, table), "missing table {table}");
        }
    }

    #[test]
    fn test_second_home_address_rejected_by_schema() {
        let mut conn = Connection::open_in_memory().unwrap();
        run(&mut conn).unwrap();

        let insert = "INSERT INTO address_history (user_id, label, latitude, longitude, kind, last_used_at)
                      VALUES ('u1', ?, 0, 0, 'HOME', 0)";
        conn.execute(insert, ["Main St 1"]).unwrap();
        assert!(conn.execute(insert, ["Side St 2"]).is_err());
    }
}
