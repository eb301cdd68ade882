// SPDX-FileCopyrightText: 2026 The Registry Authors
// SPDX-License-Identifier: MIT

//! Listing filters and their compilation to SQL predicates.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value as SqlValue;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Listing filter. Every field is optional; active fields are ANDed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerFilter {
    /// Exact server name.
    pub name: Option<String>,
    /// Case-insensitive name substring.
    pub substring_name: Option<String>,
    /// Exact URL of one of the server's remotes.
    pub remote_url: Option<String>,
    /// Only versions updated strictly after this instant.
    pub updated_since: Option<DateTime<Utc>>,
    /// Exact version string.
    pub version: Option<String>,
    /// Only (non-)latest versions.
    pub is_latest: Option<bool>,
}

/// A `WHERE` clause with positional parameters, ready to embed in a query.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct CompiledFilter {
    clauses: Vec<&'static str>,
    pub(crate) params: Vec<SqlValue>,
}

impl CompiledFilter {
    /// Compile `filter`. Clause order follows field order so plans are stable.
    pub(crate) fn compile(filter: &ServerFilter) -> Self {
        let mut compiled = Self::default();

        if let Some(name) = &filter.name {
            compiled.push("name = ?", name.clone());
        }
        if let Some(url) = &filter.remote_url {
            compiled.push(
                "EXISTS (SELECT 1 FROM json_each(servers.value, '$.remotes') AS remote \
                 WHERE json_extract(remote.value, '$.url') = ?)",
                url.clone(),
            );
        }
        if let Some(since) = &filter.updated_since {
            compiled.push(
                "julianday(updated_at) > julianday(?)",
                since.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            );
        }
        if let Some(needle) = &filter.substring_name {
            compiled.push(
                r"casefold(name) LIKE ? ESCAPE '\'",
                format!("%{}%", escape_like(&needle.to_lowercase())),
            );
        }
        if let Some(version) = &filter.version {
            compiled.push("version = ?", version.clone());
        }
        if let Some(is_latest) = filter.is_latest {
            compiled.push("is_latest = ?", i64::from(is_latest));
        }

        compiled
    }

    /// Resume after `cursor`, which must be a version identifier.
    pub(crate) fn after_cursor(&mut self, cursor: &str) -> Result<()> {
        self.push("version_id > ?", canonical_cursor(cursor)?);
        Ok(())
    }

    fn push(&mut self, clause: &'static str, param: impl Into<SqlValue>) {
        self.clauses.push(clause);
        self.params.push(param.into());
    }

    /// The `WHERE ...` text, or an empty string for an unfiltered scan.
    pub(crate) fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }
}

/// Parse a cursor into the lower-case hyphenated form keys are stored in.
///
/// Braced, upper-case, simple and URN spellings of an identifier all resume
/// at the same place.
pub(crate) fn canonical_cursor(cursor: &str) -> Result<String> {
    let id = Uuid::parse_str(cursor)
        .map_err(|e| Error::invalid_input(format!("invalid cursor format: {e}")))?;
    Ok(id.hyphenated().to_string())
}

/// Escape LIKE metacharacters so the needle matches literally.
fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
