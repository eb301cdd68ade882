// SPDX-FileCopyrightText: 2026 The Registry Authors
// SPDX-License-Identifier: MIT

//! Server documents.
//!
//! A published server version is stored as one JSON document. Only the
//! fields the registry itself reasons about are typed: `name`, `version`,
//! and the registry-managed extension under `_meta`. Everything else
//! (packages, remotes, repository, publisher metadata) is kept verbatim in
//! flattened maps so new document fields never need a type change here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// `_meta` key under which the registry keeps its own bookkeeping.
pub const OFFICIAL_META_KEY: &str = "io.modelcontextprotocol.registry/official";

/// Mint a fresh server or version identifier.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// One published version of a server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerJson {
    pub name: String,
    pub version: String,
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ServerMeta>,
    /// Every other document member, preserved as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `_meta` object of a server document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerMeta {
    #[serde(
        rename = "io.modelcontextprotocol.registry/official",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub official: Option<RegistryExtensions>,
    /// Publisher-provided extensions.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Registry-managed fields of a published version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryExtensions {
    /// Identifier shared by every version of one server.
    pub server_id: String,
    /// Identifier of this publication; the storage primary key.
    pub version_id: String,
    pub published_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_latest: bool,
}

impl ServerJson {
    /// Create a bare document with no registry metadata.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            meta: None,
            extra: Map::new(),
        }
    }

    /// The registry extension, if the document has been published.
    pub fn official(&self) -> Option<&RegistryExtensions> {
        self.meta.as_ref().and_then(|m| m.official.as_ref())
    }

    /// Replace the registry extension, keeping any publisher `_meta`.
    pub fn set_official(&mut self, official: RegistryExtensions) {
        self.meta.get_or_insert_with(ServerMeta::default).official = Some(official);
    }

    pub fn server_id(&self) -> Option<&str> {
        self.official().map(|o| o.server_id.as_str())
    }

    pub fn version_id(&self) -> Option<&str> {
        self.official().map(|o| o.version_id.as_str())
    }

    pub fn is_latest(&self) -> bool {
        self.official().is_some_and(|o| o.is_latest)
    }

    /// URLs of all declared remote endpoints.
    pub fn remote_urls(&self) -> Vec<&str> {
        self.extra
            .get("remotes")
            .and_then(Value::as_array)
            .map(|remotes| {
                remotes
                    .iter()
                    .filter_map(|r| r.get("url").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_unknown_fields_survive() {
        let raw = json!({
            "name": "io.github.example/weather",
            "description": "Weather lookups",
            "version": "1.2.0",
            "packages": [{"registryType": "npm", "identifier": "@example/weather"}],
            "remotes": [{"type": "sse", "url": "https://weather.example.com/sse"}],
            "_meta": {
                "io.example/publisher": {"build": 42},
                "io.modelcontextprotocol.registry/official": {
                    "serverId": "0d1f4c6e-1b7a-4e39-9d44-31c3a1f0e5b2",
                    "versionId": "7a2b9c1d-8e3f-4a5b-b6c7-d8e9f0a1b2c3",
                    "publishedAt": "2025-09-01T12:00:00Z",
                    "updatedAt": "2025-09-02T08:30:00Z",
                    "isLatest": true
                }
            }
        });

        let server: ServerJson = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(server.name, "io.github.example/weather");
        assert_eq!(server.version_id(), Some("7a2b9c1d-8e3f-4a5b-b6c7-d8e9f0a1b2c3"));
        assert!(server.is_latest());
        assert_eq!(server.remote_urls(), vec!["https://weather.example.com/sse"]);

        assert_eq!(serde_json::to_value(&server).unwrap(), raw);
    }

    #[test]
    fn test_set_official_keeps_publisher_meta() {
        let mut server: ServerJson = serde_json::from_value(json!({
            "name": "io.github.example/notes",
            "version": "0.1.0",
            "_meta": {"io.example/publisher": {"tool": "cli"}}
        }))
        .unwrap();
        assert!(server.official().is_none());

        let now = Utc::now();
        server.set_official(RegistryExtensions {
            server_id: new_id(),
            version_id: new_id(),
            published_at: now,
            updated_at: now,
            is_latest: false,
        });

        let meta = server.meta.as_ref().unwrap();
        assert!(meta.extra.contains_key("io.example/publisher"));
        assert!(!server.is_latest());
    }

    #[test]
    fn test_new_id_is_uuid() {
        let id = new_id();
        assert!(Uuid::parse_str(&id).is_ok());
        assert_ne!(id, new_id());
    }
}
