// SPDX-FileCopyrightText: 2026 The Registry Authors
// SPDX-License-Identifier: MIT

//! Async handle over the pooled registry database.
//!
//! Every operation checks the caller's cancellation token before touching
//! storage and runs its SQLite work on the blocking thread pool. Reads take
//! no lock; publishes for one name are serialized with [`Database::with_publish_lock`].

use std::future::Future;
use std::path::{Path, PathBuf};

use registry_core::ServerJson;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::connection::StoreDb;
use crate::error::{Error, Result};
use crate::filter::{ServerFilter, canonical_cursor};
use crate::lock::{PublishLockGuard, PublishLocks};
use crate::pool::{ConnectionPool, PoolConfig, PoolStats};
use crate::types::ServerPage;

/// Shared handle to one registry database. Clones share the pool and the
/// publish lock table.
#[derive(Clone)]
pub struct Database {
    pool: ConnectionPool,
    locks: PublishLocks,
    path: PathBuf,
}

impl Database {
    /// Open the database at `path`, warm the pool and apply pending migrations.
    pub async fn open<P: AsRef<Path>>(path: P, config: PoolConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        info!("Opening registry database at {}", path.display());

        let pool = ConnectionPool::open(&path, config).await?;
        let db = Self {
            pool,
            locks: PublishLocks::new(),
            path,
        };

        let applied = db
            .run(&CancellationToken::new(), |store| store.migrate())
            .await?;
        if applied > 0 {
            info!("Applied {applied} schema migration(s)");
        }
        Ok(db)
    }

    /// Run `op` against a pooled connection on the blocking thread pool.
    async fn run<T, F>(&self, cancel: &CancellationToken, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut StoreDb) -> Result<T> + Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let mut guard = self.pool.acquire(cancel).await?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        tokio::task::spawn_blocking(move || {
            let result = op(guard.db());
            if matches!(&result, Err(e) if e.poisons_connection()) {
                guard.mark_broken();
            }
            result
        })
        .await?
    }

    /// List versions matching `filter`, resuming after `cursor`.
    ///
    /// A malformed cursor fails with [`Error::InvalidInput`] before any
    /// connection is taken from the pool. Any spelling of a valid identifier
    /// is accepted.
    pub async fn list(
        &self,
        filter: &ServerFilter,
        cursor: Option<&str>,
        limit: i64,
        cancel: &CancellationToken,
    ) -> Result<ServerPage> {
        let cursor = cursor.map(canonical_cursor).transpose()?;
        let filter = filter.clone();
        self.run(cancel, move |store| {
            store.list_servers(&filter, cursor.as_deref(), limit)
        })
        .await
    }

    /// Get one version by its `versionId`.
    pub async fn get_by_version_id(
        &self,
        version_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ServerJson> {
        let version_id = version_id.to_owned();
        self.run(cancel, move |store| store.query_by_version_id(&version_id))
            .await?
            .ok_or(Error::NotFound)
    }

    /// Get the latest version of a server.
    pub async fn get_by_server_id(
        &self,
        server_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ServerJson> {
        let server_id = server_id.to_owned();
        self.run(cancel, move |store| store.query_latest_by_server_id(&server_id))
            .await?
            .ok_or(Error::NotFound)
    }

    /// Get a specific version string of a server.
    pub async fn get_by_server_id_and_version(
        &self,
        server_id: &str,
        version: &str,
        cancel: &CancellationToken,
    ) -> Result<ServerJson> {
        let server_id = server_id.to_owned();
        let version = version.to_owned();
        self.run(cancel, move |store| {
            store.query_by_server_id_and_version(&server_id, &version)
        })
        .await?
        .ok_or(Error::NotFound)
    }

    /// Get every version of a server, newest publication first.
    ///
    /// A server with no versions does not exist and reports [`Error::NotFound`].
    pub async fn get_all_versions_by_server_id(
        &self,
        server_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ServerJson>> {
        let server_id = server_id.to_owned();
        let versions = self
            .run(cancel, move |store| store.query_versions_by_server_id(&server_id))
            .await?;
        if versions.is_empty() {
            return Err(Error::NotFound);
        }
        Ok(versions)
    }

    /// Atomically insert a new version and unmark `old_latest_version_id`.
    ///
    /// `lock` must be the publish lock for the server's name. The insert
    /// keeps the lock alive until it has committed or rolled back, even if
    /// this future is dropped first.
    pub async fn create_server(
        &self,
        lock: &PublishLockGuard,
        server: ServerJson,
        old_latest_version_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ServerJson> {
        if !lock.covers(&server.name) {
            return Err(Error::invalid_input(format!(
                "publish lock {} does not cover {}",
                lock.key(),
                server.name
            )));
        }
        let lock = lock.clone();
        let old = old_latest_version_id.map(str::to_owned);
        self.run(cancel, move |store| {
            let inserted = store.insert_server(&server, old.as_deref());
            drop(lock);
            inserted?;
            debug!(
                "Inserted {} {} ({})",
                server.name,
                server.version,
                server.version_id().unwrap_or_default()
            );
            Ok(server)
        })
        .await
    }

    /// Replace the document stored under `version_id`.
    ///
    /// The document's embedded `versionId` must equal `version_id`.
    pub async fn update_server(
        &self,
        version_id: &str,
        server: ServerJson,
        cancel: &CancellationToken,
    ) -> Result<ServerJson> {
        self.replace(None, version_id, server, cancel).await
    }

    /// [`Database::update_server`] for callers holding the publish lock.
    ///
    /// Like [`Database::create_server`], the write keeps `lock` alive until it
    /// finishes.
    pub async fn update_server_locked(
        &self,
        lock: &PublishLockGuard,
        version_id: &str,
        server: ServerJson,
        cancel: &CancellationToken,
    ) -> Result<ServerJson> {
        if !lock.covers(&server.name) {
            return Err(Error::invalid_input(format!(
                "publish lock {} does not cover {}",
                lock.key(),
                server.name
            )));
        }
        self.replace(Some(lock.clone()), version_id, server, cancel)
            .await
    }

    async fn replace(
        &self,
        lock: Option<PublishLockGuard>,
        version_id: &str,
        server: ServerJson,
        cancel: &CancellationToken,
    ) -> Result<ServerJson> {
        let version_id = version_id.to_owned();
        self.run(cancel, move |store| {
            let replaced = store.replace_server(&version_id, &server);
            drop(lock);
            if replaced? {
                Ok(server)
            } else {
                Err(Error::NotFound)
            }
        })
        .await
    }

    /// Run `f` while holding the exclusive publish lock for `name`.
    ///
    /// Publishes for the same name never overlap; other names proceed
    /// concurrently. Waiting has no timeout and ends early only when
    /// `cancel` fires. `f` receives the guard to pass to
    /// [`Database::create_server`]. Errors from `f` are returned unchanged.
    /// The lock is released once `f` ends, or its future is dropped, and no
    /// write started under it is still running.
    pub async fn with_publish_lock<T, E, F, Fut>(
        &self,
        name: &str,
        cancel: &CancellationToken,
        f: F,
    ) -> std::result::Result<T, E>
    where
        E: From<Error>,
        F: FnOnce(PublishLockGuard) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let guard = self.locks.lock(name, cancel).await?;
        debug!("Holding publish lock {} for {name}", guard.key());
        f(guard).await
    }

    /// Count stored versions across all servers.
    pub async fn count_versions(&self, cancel: &CancellationToken) -> Result<u64> {
        self.run(cancel, |store| store.count_versions()).await
    }

    /// The publish lock table shared by clones of this handle.
    pub fn publish_locks(&self) -> &PublishLocks {
        &self.locks
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the connection pool. Idempotent.
    pub fn close(&self) {
        self.pool.close();
    }
}
