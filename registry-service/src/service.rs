// SPDX-FileCopyrightText: 2026 The Registry Authors
// SPDX-License-Identifier: MIT

//! Registry operations on top of the document store.
//!
//! Publishing and editing run under the per-name publish lock so the
//! read-decide-write sequence that maintains the latest flag never overlaps
//! with another writer for the same server. Listings and lookups take no lock.

use chrono::{DateTime, Utc};
use registry_core::{RegistryExtensions, ServerJson, new_id, resolve_latest};
use registry_store_db::lock::PublishLockGuard;
use registry_store_db::{Database, PoolStats, ServerFilter};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{Config, ListingConfig, PublishConfig};
use crate::error::{Result, ServiceError};

/// Query options for [`RegistryService::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Resume after this `versionId`. Empty means start from the beginning.
    pub cursor: Option<String>,
    /// Requested page size, clamped to the configured bounds.
    pub limit: Option<i64>,
    pub updated_since: Option<DateTime<Utc>>,
    /// Case-insensitive name substring.
    pub search: Option<String>,
    /// Exact version, or `"latest"` for latest versions only.
    pub version: Option<String>,
}

/// One page of servers. `metadata` is present only when another page follows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerListResponse {
    pub servers: Vec<ServerJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ListMetadata>,
}

/// Pagination metadata of a non-final page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListMetadata {
    pub next_cursor: String,
    pub count: usize,
}

impl ServerListResponse {
    pub fn next_cursor(&self) -> Option<&str> {
        self.metadata.as_ref().map(|m| m.next_cursor.as_str())
    }

    pub fn count(&self) -> usize {
        self.servers.len()
    }
}

#[derive(Clone)]
pub struct RegistryService {
    db: Database,
    listing: ListingConfig,
    publish: PublishConfig,
}

impl RegistryService {
    pub fn new(db: Database, listing: ListingConfig, publish: PublishConfig) -> Self {
        Self {
            db,
            listing,
            publish,
        }
    }

    /// Open the configured database and wrap it.
    pub async fn open(config: &Config) -> Result<Self> {
        let db = Database::open(&config.database.path, config.database.pool_config()).await?;
        Ok(Self::new(
            db,
            config.listing.clone(),
            config.publish.clone(),
        ))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub async fn list(
        &self,
        options: ListOptions,
        cancel: &CancellationToken,
    ) -> Result<ServerListResponse> {
        let mut filter = ServerFilter {
            substring_name: options.search.filter(|s| !s.is_empty()),
            updated_since: options.updated_since,
            ..ServerFilter::default()
        };
        match options.version {
            Some(version) if version == "latest" => filter.is_latest = Some(true),
            Some(version) => filter.version = Some(version),
            None => {}
        }

        let cursor = options.cursor.as_deref().filter(|c| !c.is_empty());
        let limit = self.listing.clamp(options.limit);
        let page = self.db.list(&filter, cursor, limit, cancel).await?;

        let metadata = page.next_cursor.map(|next_cursor| ListMetadata {
            next_cursor,
            count: page.servers.len(),
        });
        Ok(ServerListResponse {
            servers: page.servers,
            metadata,
        })
    }

    /// Latest version of a server.
    pub async fn get_by_id(&self, server_id: &str, cancel: &CancellationToken) -> Result<ServerJson> {
        Ok(self.db.get_by_server_id(server_id, cancel).await?)
    }

    pub async fn get_by_id_and_version(
        &self,
        server_id: &str,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<ServerJson> {
        Ok(self
            .db
            .get_by_server_id_and_version(server_id, version, cancel)
            .await?)
    }

    /// Every version of a server, newest publication first.
    pub async fn get_versions(
        &self,
        server_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ServerJson>> {
        Ok(self.db.get_all_versions_by_server_id(server_id, cancel).await?)
    }

    /// Publish a new version of `server.name`.
    ///
    /// Any registry metadata carried by `server` is replaced. The stored
    /// document, with its assigned identifiers, is returned.
    pub async fn publish(
        &self,
        server: ServerJson,
        cancel: &CancellationToken,
    ) -> Result<ServerJson> {
        if server.name.trim().is_empty() {
            return Err(ServiceError::invalid_server("name is required"));
        }
        if server.version.trim().is_empty() {
            return Err(ServiceError::invalid_server("version is required"));
        }

        let name = server.name.clone();
        self.db
            .with_publish_lock(&name, cancel, move |lock| {
                self.publish_locked(lock, server, cancel)
            })
            .await
    }

    async fn publish_locked(
        &self,
        lock: PublishLockGuard,
        mut server: ServerJson,
        cancel: &CancellationToken,
    ) -> Result<ServerJson> {
        let current = self.current_latest(&server.name, cancel).await?;

        let server_id = match &current {
            Some(latest) => {
                let official = official_of(latest)?;
                let versions = self
                    .db
                    .get_all_versions_by_server_id(&official.server_id, cancel)
                    .await?;
                if versions.len() >= self.publish.max_versions_per_server {
                    return Err(ServiceError::TooManyVersions {
                        name: server.name,
                        limit: self.publish.max_versions_per_server,
                    });
                }
                if versions.iter().any(|v| v.version == server.version) {
                    return Err(ServiceError::DuplicateVersion {
                        name: server.name,
                        version: server.version,
                    });
                }
                official.server_id.clone()
            }
            None => new_id(),
        };

        let decision = resolve_latest(
            &server.version,
            current.as_ref().map(|latest| latest.version.as_str()),
        );
        let unmark = match &current {
            Some(latest) if decision.unmark_previous => Some(official_of(latest)?.version_id.clone()),
            _ => None,
        };

        let now = Utc::now();
        server.set_official(RegistryExtensions {
            server_id,
            version_id: new_id(),
            published_at: now,
            updated_at: now,
            is_latest: decision.is_latest,
        });

        let stored = self
            .db
            .create_server(&lock, server, unmark.as_deref(), cancel)
            .await?;
        info!(
            "Published {} {} (latest: {})",
            stored.name, stored.version, decision.is_latest
        );
        Ok(stored)
    }

    /// Replace the body of an existing version.
    ///
    /// `name` and `version` cannot change. Registry metadata is carried over
    /// from storage with a fresh `updatedAt`.
    pub async fn edit(
        &self,
        version_id: &str,
        server: ServerJson,
        cancel: &CancellationToken,
    ) -> Result<ServerJson> {
        if server.version_id().is_some_and(|id| id != version_id) {
            return Err(ServiceError::invalid_server(format!(
                "versionId in body does not match {version_id}"
            )));
        }

        // The latest flag is copied from the stored row, so a concurrent
        // publish for the same name must not run in between.
        let existing = self.db.get_by_version_id(version_id, cancel).await?;
        self.db
            .with_publish_lock(&existing.name, cancel, move |lock| {
                self.edit_locked(lock, version_id, server, cancel)
            })
            .await
    }

    async fn edit_locked(
        &self,
        lock: PublishLockGuard,
        version_id: &str,
        mut server: ServerJson,
        cancel: &CancellationToken,
    ) -> Result<ServerJson> {
        let existing = self.db.get_by_version_id(version_id, cancel).await?;
        if server.name != existing.name {
            return Err(ServiceError::invalid_server(format!(
                "cannot rename {} to {}",
                existing.name, server.name
            )));
        }
        if server.version != existing.version {
            return Err(ServiceError::invalid_server(format!(
                "cannot change version {} to {}",
                existing.version, server.version
            )));
        }

        let official = official_of(&existing)?;
        server.set_official(RegistryExtensions {
            updated_at: Utc::now(),
            ..official.clone()
        });

        let stored = self
            .db
            .update_server_locked(&lock, version_id, server, cancel)
            .await?;
        debug!("Edited {} {} ({version_id})", stored.name, stored.version);
        Ok(stored)
    }

    async fn current_latest(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ServerJson>> {
        let filter = ServerFilter {
            name: Some(name.to_owned()),
            is_latest: Some(true),
            ..ServerFilter::default()
        };
        let page = self.db.list(&filter, None, 1, cancel).await?;
        Ok(page.servers.into_iter().next())
    }

    pub async fn count_versions(&self, cancel: &CancellationToken) -> Result<u64> {
        Ok(self.db.count_versions(cancel).await?)
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.db.pool_stats()
    }

    /// Close the connection pool. Idempotent.
    pub fn close(&self) {
        self.db.close();
    }
}

fn official_of(server: &ServerJson) -> Result<&RegistryExtensions> {
    server
        .official()
        .ok_or_else(|| ServiceError::CorruptRecord(format!("{} {}", server.name, server.version)))
}
