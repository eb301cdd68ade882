// SPDX-FileCopyrightText: 2026 The Registry Authors
// SPDX-License-Identifier: MIT

//! Database connection management.

use std::path::Path;
use std::time::Duration;

use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, OpenFlags, TransactionBehavior};
use tracing::debug;

use crate::error::{Error, Result};
use crate::schema::{MIGRATIONS, SCHEMA_VERSION};

/// A single SQLite connection to the registry database.
///
/// Operations on this type are synchronous; `Database` runs them on the
/// blocking thread pool.
pub struct StoreDb {
    pub(crate) conn: Connection,
}

impl StoreDb {
    /// Open or create the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| Error::DatabaseOpen {
            path: path.to_owned(),
            source: e,
        })?;
        conn.busy_timeout(busy_timeout)?;

        let db = Self { conn };
        db.configure_pragmas()?;
        db.register_functions()?;

        debug!("Opened database at {}", path.display());
        Ok(db)
    }

    /// Configure SQLite pragmas for concurrent readers and a single writer.
    fn configure_pragmas(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            "#,
        )?;
        Ok(())
    }

    /// `casefold(text)`: Unicode lower-casing. SQLite's own `lower()` and
    /// `LIKE` only fold ASCII.
    fn register_functions(&self) -> Result<()> {
        self.conn.create_scalar_function(
            "casefold",
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                let text: Option<String> = ctx.get(0)?;
                Ok(text.map(|t| t.to_lowercase()))
            },
        )?;
        Ok(())
    }

    /// Current `user_version` of the database.
    pub fn schema_version(&self) -> Result<i32> {
        Ok(self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    /// Apply any pending migrations.
    ///
    /// Returns the number of migrations applied.
    pub fn migrate(&mut self) -> Result<usize> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let found: i32 = tx.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if !(0..=SCHEMA_VERSION).contains(&found) {
            return Err(Error::SchemaVersionMismatch {
                supported: SCHEMA_VERSION,
                found,
            });
        }

        let pending = &MIGRATIONS[found as usize..];
        for (offset, sql) in pending.iter().enumerate() {
            tx.execute_batch(sql)?;
            debug!("Applied migration {}", found as usize + offset + 1);
        }
        // PRAGMA does not accept bound parameters.
        tx.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))?;
        tx.commit()?;

        Ok(pending.len())
    }

    /// Check if the database has the servers table.
    pub fn has_schema(&self) -> Result<bool> {
        let count: i32 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='servers'",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Get raw connection (for advanced usage).
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
