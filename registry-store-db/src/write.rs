// SPDX-FileCopyrightText: 2026 The Registry Authors
// SPDX-License-Identifier: MIT

//! Write operations for the registry database.

use registry_core::ServerJson;
use rusqlite::{TransactionBehavior, params};
use tracing::debug;

use crate::connection::StoreDb;
use crate::error::{Error, Result};
use crate::schema::OFFICIAL_PATH;

impl StoreDb {
    /// Insert a new version, first unmarking `old_latest_version_id` if given.
    ///
    /// Both steps commit together or not at all. Callers must hold the
    /// publish lock for the server's name, otherwise two publishers can each
    /// leave a latest version behind.
    pub fn insert_server(
        &mut self,
        server: &ServerJson,
        old_latest_version_id: Option<&str>,
    ) -> Result<()> {
        let official = server.official().ok_or_else(|| {
            Error::invalid_input("server must have registry metadata with serverId and versionId")
        })?;
        if official.server_id.is_empty() || official.version_id.is_empty() {
            return Err(Error::invalid_input(
                "server must have both serverId and versionId in registry metadata",
            ));
        }
        let value = serde_json::to_string(server)?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(old) = old_latest_version_id.filter(|id| !id.is_empty()) {
            let unmarked = tx.execute(
                r#"
                UPDATE servers
                SET value = json_set(value, ?2, json('false'))
                WHERE version_id = ?1
                "#,
                params![old, format!("{OFFICIAL_PATH}.isLatest")],
            )?;
            debug!("Unmarked {unmarked} previous latest row(s) for {old}");
        }

        tx.execute(
            r#"
            INSERT INTO servers (version_id, value)
            VALUES (?1, ?2)
            "#,
            params![official.version_id, value],
        )?;

        // Dropping an uncommitted transaction rolls it back.
        tx.commit()?;
        Ok(())
    }

    /// Replace the document stored under `version_id`.
    ///
    /// Returns `false` when no such version exists.
    pub fn replace_server(&self, version_id: &str, server: &ServerJson) -> Result<bool> {
        if server.version_id() != Some(version_id) {
            return Err(Error::invalid_input(format!(
                "io.modelcontextprotocol.registry/official.versionId must match path id ({version_id})"
            )));
        }
        let value = serde_json::to_string(server)?;

        let rows = self.conn.execute(
            r#"
            UPDATE servers
            SET value = ?1
            WHERE version_id = ?2
            "#,
            params![value, version_id],
        )?;
        Ok(rows > 0)
    }
}
