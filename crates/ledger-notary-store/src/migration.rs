//! Database schema migrations for SQLite.
//!
//! Versioned, forward-only. Each version is applied inside one transaction
//! together with its `schema_migrations` row.

use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection};

use ledger_notary_core::Debit;

use crate::error::{Result, StoreError};
use crate::sqlite::decode_cbor;

/// Current schema version.
pub const CURRENT_VERSION: u32 = 2;

/// Initialize or migrate the database schema.
///
/// Idempotent: calling it on an up-to-date database is a no-op.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    migrate_to(conn, CURRENT_VERSION)
}

fn migrate_to(conn: &mut Connection, target: u32) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current = current_version(conn)?;
    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema v{current} is newer than supported v{CURRENT_VERSION}"
        )));
    }

    if current < target {
        let tx = conn.transaction()?;

        for version in (current + 1)..=target {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
            tracing::debug!(version, "applied schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

/// Highest applied version, 0 for a fresh database.
pub fn current_version(conn: &Connection) -> Result<u32> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        2 => apply_v2(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {version}"
        ))),
    }
}

/// Migration v1: transfers and accounts.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE transfers (
            id TEXT PRIMARY KEY,              -- hyphenated UUID
            debits BLOB NOT NULL,             -- CBOR array of debits
            credits BLOB NOT NULL,            -- CBOR array of credits
            state TEXT NOT NULL CHECK (state IN ('proposed', 'prepared', 'executed', 'rejected')),
            expires_at INTEGER,               -- Unix ms, NULL = never expires
            proposed_at INTEGER,
            prepared_at INTEGER,
            executed_at INTEGER,
            rejected_at INTEGER,
            rejection_reason TEXT,
            created_at INTEGER NOT NULL       -- local insert time
        );

        -- Expiry sweep scans non-terminal rows by deadline
        CREATE INDEX idx_transfers_state_expires ON transfers(state, expires_at);

        CREATE TABLE accounts (
            name TEXT PRIMARY KEY,
            balance TEXT NOT NULL,
            password_hash TEXT,
            is_admin INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );
        "#,
    )?;

    Ok(())
}

/// Migration v2: count of unauthorized debits per transfer, so the expiry
/// scan only visits rows that can actually expire.
fn apply_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "ALTER TABLE transfers ADD COLUMN unauthorized_debits INTEGER NOT NULL DEFAULT 0",
    )?;

    let rows: Vec<(String, Vec<u8>)> = {
        let mut stmt = conn.prepare("SELECT id, debits FROM transfers")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<_>>()?;
        rows
    };
    for (id, debits) in rows {
        let debits: Vec<Debit> = decode_cbor(&debits)?;
        let pending = debits.iter().filter(|d| !d.is_authorized()).count() as i64;
        conn.execute(
            "UPDATE transfers SET unauthorized_debits = ?1 WHERE id = ?2",
            params![pending, id],
        )?;
    }

    conn.execute_batch(
        r#"
        DROP INDEX idx_transfers_state_expires;

        CREATE INDEX idx_transfers_pending_expiry ON transfers(expires_at, id)
            WHERE state IN ('proposed', 'prepared') AND unauthorized_debits > 0;
        "#,
    )?;

    Ok(())
}

pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_fresh_database() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), CURRENT_VERSION);

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert!(tables.contains(&"transfers".to_string()));
        assert!(tables.contains(&"accounts".to_string()));
    }

    #[test]
    fn test_migrate_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let rows: u32 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, CURRENT_VERSION);
    }

    #[test]
    fn test_newer_schema_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, 0)",
            [CURRENT_VERSION + 1],
        )
        .unwrap();

        assert!(matches!(migrate(&mut conn), Err(StoreError::Migration(_))));
    }

    #[test]
    fn test_v2_backfills_unauthorized_debits() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate_to(&mut conn, 1).unwrap();

        let insert = |id: &str, debits: &[Debit]| {
            let mut blob = Vec::new();
            ciborium::into_writer(debits, &mut blob).unwrap();
            conn.execute(
                "INSERT INTO transfers (id, debits, credits, state, expires_at, created_at)
                 VALUES (?1, ?2, x'80', 'prepared', 10, 0)",
                params![id, blob],
            )
            .unwrap();
        };
        insert(
            "pending",
            &[Debit::new("alice", "1").authorized("sig"), Debit::new("carol", "1"), Debit::new("dave", "1")],
        );
        insert("authorized", &[Debit::new("alice", "1").authorized("sig")]);

        migrate(&mut conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), CURRENT_VERSION);

        let count = |id: &str| -> i64 {
            conn.query_row(
                "SELECT unauthorized_debits FROM transfers WHERE id = ?1",
                [id],
                |row| row.get(0),
            )
            .unwrap()
        };
        assert_eq!(count("pending"), 2);
        assert_eq!(count("authorized"), 0);
    }

    #[test]
    fn test_state_check_constraint() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        let res = conn.execute(
            "INSERT INTO transfers (id, debits, credits, state, created_at)
             VALUES ('x', x'', x'', 'bogus', 0)",
            [],
        );
        assert!(res.is_err());
    }
}
