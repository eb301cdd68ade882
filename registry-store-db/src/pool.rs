// SPDX-FileCopyrightText: 2026 The Registry Authors
// SPDX-License-Identifier: MIT

//! Connection pool for the registry database.
//!
//! - **Invariant**: `active + idle ≤ capacity`
//! - **Resource safety**: connections are always returned via RAII guards
//! - **Recycling**: connections past their idle time or lifetime are closed
//!   instead of reused
//!
//! # Example
//!
//! ```ignore
//! use registry_store_db::pool::{ConnectionPool, PoolConfig};
//!
//! let pool = ConnectionPool::open("/var/lib/registry/registry.sqlite", PoolConfig::default()).await?;
//! let mut guard = pool.acquire(&cancel).await?;
//! let count = guard.db().count_versions()?;
//! // Connection automatically returned when guard is dropped
//! ```

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::connection::StoreDb;
use crate::error::{Error, Result};

/// Configuration for the connection pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Connections opened at startup and kept through idle periods
    pub min_connections: usize,
    /// Maximum number of connections, active plus idle
    pub max_connections: usize,
    /// Maximum time a connection can be idle before being closed
    pub max_idle_time: Duration,
    /// Maximum age of a connection before it is recycled
    pub max_lifetime: Duration,
    /// Timeout for acquiring a connection from the pool
    pub acquire_timeout: Duration,
    /// How long SQLite waits on a locked database before failing
    pub busy_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 5,
            max_connections: 30,
            max_idle_time: Duration::from_secs(30 * 60),
            max_lifetime: Duration::from_secs(2 * 60 * 60),
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub idle: usize,
    pub active: usize,
    pub capacity: usize,
}

/// Internal wrapper for pooled connections
struct PooledConnection {
    db: StoreDb,
    created_at: Instant,
    last_used: Instant,
}

impl PooledConnection {
    fn new(db: StoreDb) -> Self {
        let now = Instant::now();
        Self {
            db,
            created_at: now,
            last_used: now,
        }
    }

    fn is_too_old(&self, max_lifetime: Duration) -> bool {
        self.created_at.elapsed() > max_lifetime
    }

    fn is_idle_expired(&self, max_idle_time: Duration) -> bool {
        self.last_used.elapsed() > max_idle_time
    }
}

struct PoolState {
    /// Idle connections available for reuse
    idle: VecDeque<PooledConnection>,
    /// Count of connections currently in use
    active_count: usize,
    /// Maximum pool capacity
    capacity: usize,
    closed: bool,
}

impl PoolState {
    fn invariant(&self) -> bool {
        self.active_count + self.idle.len() <= self.capacity && self.capacity > 0
    }

    fn total(&self) -> usize {
        self.active_count + self.idle.len()
    }

    /// Remove connections that must not be reused.
    ///
    /// Idle-time expiry never shrinks the pool below its warm reserve.
    fn take_expired(&mut self, config: &PoolConfig) -> Vec<PooledConnection> {
        let mut expired = Vec::new();
        let mut kept = VecDeque::with_capacity(self.idle.len());
        while let Some(conn) = self.idle.pop_front() {
            let reserve_ok = self.total() + kept.len() >= config.min_connections;
            if conn.is_too_old(config.max_lifetime)
                || (reserve_ok && conn.is_idle_expired(config.max_idle_time))
            {
                expired.push(conn);
            } else {
                kept.push_back(conn);
            }
        }
        self.idle = kept;
        expired
    }
}

/// Result of an acquire attempt
enum AcquireResult {
    /// Reusing an idle connection
    Reused(PooledConnection),
    /// A slot was reserved; the caller opens the connection
    Create,
    /// Must wait for a connection to become available
    WaitRequired,
}

struct PoolInner {
    state: Mutex<PoolState>,
    path: PathBuf,
    config: PoolConfig,
    available: Notify,
}

impl PoolInner {
    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        // A panic while holding the lock cannot leave the counters half-updated.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A pool of SQLite connections to one registry database.
///
/// Clones share the same pool.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Open a pool on `path` and warm `min_connections` connections.
    pub async fn open<P: AsRef<Path>>(path: P, config: PoolConfig) -> Result<Self> {
        if config.max_connections == 0 {
            return Err(Error::invalid_input("pool capacity must be positive"));
        }
        if config.min_connections > config.max_connections {
            return Err(Error::invalid_input(
                "min_connections must not exceed max_connections",
            ));
        }

        let state = PoolState {
            idle: VecDeque::new(),
            active_count: 0,
            capacity: config.max_connections,
            closed: false,
        };
        debug_assert!(state.invariant());

        let pool = Self {
            inner: Arc::new(PoolInner {
                state: Mutex::new(state),
                path: path.as_ref().to_path_buf(),
                config,
                available: Notify::new(),
            }),
        };

        for _ in 0..pool.inner.config.min_connections {
            let conn = pool.connect().await?;
            pool.inner.lock_state().idle.push_back(conn);
        }

        info!(
            "Opened connection pool for {} ({} warm, {} max)",
            pool.inner.path.display(),
            pool.inner.config.min_connections,
            pool.inner.config.max_connections
        );
        Ok(pool)
    }

    /// Acquire a connection from the pool.
    ///
    /// Returns an RAII guard that returns the connection when dropped.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<PooledConnectionGuard> {
        let deadline = tokio::time::Instant::now() + self.inner.config.acquire_timeout;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            // Register interest before inspecting state so a release in
            // between is not missed.
            let notified = self.inner.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.try_acquire()? {
                AcquireResult::Reused(conn) => {
                    trace!("Reusing idle connection");
                    return Ok(self.guard(conn));
                }
                AcquireResult::Create => {
                    // Gives the slot back if connecting fails or this future
                    // is dropped mid-connect.
                    let reservation = SlotReservation { pool: Some(self) };
                    match self.connect().await {
                        Ok(conn) => {
                            reservation.commit();
                            debug!("Created new connection");
                            return Ok(self.guard(conn));
                        }
                        Err(e) => {
                            warn!("Failed to create connection: {e}");
                            return Err(e);
                        }
                    }
                }
                AcquireResult::WaitRequired => {
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(Error::Cancelled),
                        _ = tokio::time::sleep_until(deadline) => {
                            return Err(Error::AcquireTimeout(self.inner.config.acquire_timeout));
                        }
                        _ = &mut notified => continue,
                    }
                }
            }
        }
    }

    fn try_acquire(&self) -> Result<AcquireResult> {
        let mut state = self.inner.lock_state();
        debug_assert!(state.invariant());

        if state.closed {
            return Err(Error::PoolClosed);
        }

        let expired = state.take_expired(&self.inner.config);

        let result = if let Some(mut conn) = state.idle.pop_front() {
            state.active_count += 1;
            conn.last_used = Instant::now();
            AcquireResult::Reused(conn)
        } else if state.active_count < state.capacity {
            // Reserve the slot before releasing the lock.
            state.active_count += 1;
            AcquireResult::Create
        } else {
            trace!(
                "Pool at capacity ({}/{}), waiting",
                state.active_count, state.capacity
            );
            AcquireResult::WaitRequired
        };
        debug_assert!(state.invariant());
        drop(state);

        if !expired.is_empty() {
            debug!("Recycled {} expired connection(s)", expired.len());
        }
        Ok(result)
    }

    /// Open a new connection on the blocking thread pool.
    async fn connect(&self) -> Result<PooledConnection> {
        let path = self.inner.path.clone();
        let busy_timeout = self.inner.config.busy_timeout;
        let db = tokio::task::spawn_blocking(move || StoreDb::open(path, busy_timeout)).await??;
        Ok(PooledConnection::new(db))
    }

    fn guard(&self, conn: PooledConnection) -> PooledConnectionGuard {
        PooledConnectionGuard {
            conn: Some(conn),
            pool: Arc::clone(&self.inner),
        }
    }

    fn release_slot(&self) {
        let mut state = self.inner.lock_state();
        state.active_count = state.active_count.saturating_sub(1);
        drop(state);
        self.inner.available.notify_one();
    }

    /// Get current pool statistics.
    pub fn stats(&self) -> PoolStats {
        let state = self.inner.lock_state();
        PoolStats {
            idle: state.idle.len(),
            active: state.active_count,
            capacity: state.capacity,
        }
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.lock_state().closed
    }

    /// Close every idle connection and refuse further acquires.
    ///
    /// Connections in use are closed when their guards drop. Calling this
    /// more than once is a no-op.
    pub fn close(&self) {
        let mut state = self.inner.lock_state();
        if state.closed {
            return;
        }
        state.closed = true;
        let drained: Vec<_> = state.idle.drain(..).collect();
        drop(state);

        let count = drained.len();
        drop(drained);
        self.inner.available.notify_waiters();
        info!("Closed connection pool ({count} idle connection(s))");
    }
}

/// A slot counted in `active_count` whose connection is still being opened.
struct SlotReservation<'a> {
    pool: Option<&'a ConnectionPool>,
}

impl SlotReservation<'_> {
    /// The slot now belongs to a [`PooledConnectionGuard`].
    fn commit(mut self) {
        self.pool = None;
    }
}

impl Drop for SlotReservation<'_> {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            trace!("Releasing unused connection slot");
            pool.release_slot();
        }
    }
}

/// RAII guard that ensures connections are returned to the pool.
pub struct PooledConnectionGuard {
    conn: Option<PooledConnection>,
    pool: Arc<PoolInner>,
}

impl PooledConnectionGuard {
    /// Get the underlying database connection.
    pub fn db(&mut self) -> &mut StoreDb {
        &mut self.conn.as_mut().expect("Connection already taken").db
    }

    /// Mark the connection as broken.
    ///
    /// A broken connection will not be returned to the pool.
    pub fn mark_broken(mut self) {
        self.conn = None;
        warn!("Discarding broken database connection");
    }
}

impl Drop for PooledConnectionGuard {
    fn drop(&mut self) {
        let conn = self.conn.take();
        let mut state = self.pool.lock_state();
        debug_assert!(state.invariant());

        state.active_count = state.active_count.saturating_sub(1);
        let mut discarded = None;
        if let Some(mut conn) = conn {
            if state.closed || conn.is_too_old(self.pool.config.max_lifetime) {
                discarded = Some(conn);
            } else {
                conn.last_used = Instant::now();
                state.idle.push_back(conn);
            }
        }

        debug_assert!(state.invariant());
        drop(state);
        drop(discarded);
        self.pool.available.notify_one();
    }
}
