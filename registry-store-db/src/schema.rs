// SPDX-FileCopyrightText: 2026 The Registry Authors
// SPDX-License-Identifier: MIT

//! Database schema for published server versions.
//!
//! The JSON body in `value` is the single source of truth. Registry-managed
//! fields are exposed as virtual generated columns so they can be filtered
//! and indexed without being stored twice.

/// JSON path of the registry extension inside a server document.
pub(crate) const OFFICIAL_PATH: &str = r#"$._meta."io.modelcontextprotocol.registry/official""#;

/// Schema migrations, applied in order. Entry `i` moves `user_version` from `i` to `i + 1`.
pub(crate) const MIGRATIONS: &[&str] = &[
    r#"
create table if not exists servers (
    version_id   text primary key not null,
    value        text not null check (json_valid(value)),
    server_id    text generated always as (json_extract(value, '$._meta."io.modelcontextprotocol.registry/official".serverId')) virtual,
    name         text generated always as (json_extract(value, '$.name')) virtual,
    version      text generated always as (json_extract(value, '$.version')) virtual,
    is_latest    integer generated always as (json_extract(value, '$._meta."io.modelcontextprotocol.registry/official".isLatest')) virtual,
    published_at text generated always as (json_extract(value, '$._meta."io.modelcontextprotocol.registry/official".publishedAt')) virtual,
    updated_at   text generated always as (json_extract(value, '$._meta."io.modelcontextprotocol.registry/official".updatedAt')) virtual
);

create index if not exists IndexServersServerId on servers(server_id);
create index if not exists IndexServersName on servers(name);
create index if not exists IndexServersLatest on servers(server_id, is_latest);
"#,
];

/// Schema version this build writes.
pub const SCHEMA_VERSION: i32 = MIGRATIONS.len() as i32;
