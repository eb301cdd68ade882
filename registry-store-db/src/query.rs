// SPDX-FileCopyrightText: 2026 The Registry Authors
// SPDX-License-Identifier: MIT

//! Read query operations for the registry database.

use registry_core::ServerJson;
use rusqlite::{OptionalExtension, params, params_from_iter};

use crate::connection::StoreDb;
use crate::error::Result;
use crate::filter::{CompiledFilter, ServerFilter};
use crate::types::{DEFAULT_LIST_LIMIT, ServerPage};

fn decode(value: &str) -> Result<ServerJson> {
    Ok(serde_json::from_str(value)?)
}

impl StoreDb {
    /// List versions matching `filter`, ordered by `version_id`.
    ///
    /// `cursor` is the last `version_id` of the previous page. A non-positive
    /// `limit` selects the default page size.
    pub fn list_servers(
        &self,
        filter: &ServerFilter,
        cursor: Option<&str>,
        limit: i64,
    ) -> Result<ServerPage> {
        let limit = if limit <= 0 { DEFAULT_LIST_LIMIT } else { limit };

        let mut compiled = CompiledFilter::compile(filter);
        if let Some(cursor) = cursor {
            compiled.after_cursor(cursor)?;
        }

        let sql = format!(
            "SELECT version_id, value FROM servers {} ORDER BY version_id LIMIT ?",
            compiled.where_clause()
        );
        let mut args = compiled.params;
        args.push(limit.into());

        let mut stmt = self.conn.prepare_cached(&sql)?;
        let mut rows = stmt.query(params_from_iter(args))?;

        let mut servers = Vec::new();
        let mut last_version_id = None;
        while let Some(row) = rows.next()? {
            let version_id: String = row.get(0)?;
            let value: String = row.get(1)?;
            servers.push(decode(&value)?);
            last_version_id = Some(version_id);
        }

        // A full page means more rows may follow.
        let next_cursor = if servers.len() as i64 >= limit {
            last_version_id
        } else {
            None
        };

        Ok(ServerPage {
            servers,
            next_cursor,
        })
    }

    /// Query one version by its `version_id`.
    pub fn query_by_version_id(&self, version_id: &str) -> Result<Option<ServerJson>> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            SELECT value
            FROM servers
            WHERE version_id = ?1
            "#,
        )?;

        let value: Option<String> = stmt
            .query_row(params![version_id], |row| row.get(0))
            .optional()?;
        value.as_deref().map(decode).transpose()
    }

    /// Query the latest version of a server.
    pub fn query_latest_by_server_id(&self, server_id: &str) -> Result<Option<ServerJson>> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            SELECT value
            FROM servers
            WHERE server_id = ?1 AND is_latest = 1
            ORDER BY julianday(published_at) DESC
            LIMIT 1
            "#,
        )?;

        let value: Option<String> = stmt
            .query_row(params![server_id], |row| row.get(0))
            .optional()?;
        value.as_deref().map(decode).transpose()
    }

    /// Query a specific version string of a server.
    pub fn query_by_server_id_and_version(
        &self,
        server_id: &str,
        version: &str,
    ) -> Result<Option<ServerJson>> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            SELECT value
            FROM servers
            WHERE server_id = ?1 AND version = ?2
            LIMIT 1
            "#,
        )?;

        let value: Option<String> = stmt
            .query_row(params![server_id, version], |row| row.get(0))
            .optional()?;
        value.as_deref().map(decode).transpose()
    }

    /// Query every version of a server, newest publication first.
    pub fn query_versions_by_server_id(&self, server_id: &str) -> Result<Vec<ServerJson>> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            SELECT value
            FROM servers
            WHERE server_id = ?1
            ORDER BY julianday(published_at) DESC, version_id
            "#,
        )?;

        let mut versions = Vec::new();
        let mut rows = stmt.query(params![server_id])?;
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            versions.push(decode(&value)?);
        }
        Ok(versions)
    }

    /// Count stored versions across all servers.
    pub fn count_versions(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM servers", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
